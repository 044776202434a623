// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Executive ABI definitions, shared between the kernel core and task code.
//!
//! This crate exists for the same reason the equivalent crate exists in a
//! larger kernel: task code and core code need a small set of common types
//! that neither one should be considered the owner of.

#![no_std]

/// Names a task by its fixed table index.
///
/// Index `0` always denotes the root task (see [`TaskId::ROOT`]). Indices
/// `1..=TASK_CNT` denote the non-root tasks configured at build time. Unlike
/// a richer kernel's task id, this one carries no generation number: the task
/// set is fixed at initialization (no restarts, no dynamic creation), so an
/// index alone is a stable identity for the life of the system.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TaskId(pub u16);

impl TaskId {
    /// The root (idle) task, descriptor 0.
    pub const ROOT: Self = Self(0);

    pub const fn new(index: usize) -> Self {
        Self(index as u16)
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl From<usize> for TaskId {
    fn from(index: usize) -> Self {
        Self::new(index)
    }
}

/// A message kind tag. Opaque to the executive; interpreted by task code.
pub type MessageId = u32;

/// A message payload word. Opaque to the executive; interpreted by task code.
pub type Param = u32;

/// Observable lifecycle state of a non-root task, per `spec.md` §4.4.
///
/// The root task has no analogous state machine: it is never `Blocked` and
/// its "started" status is meaningless (it is always current or parked).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TaskState {
    /// `!started && !blocked`. Waiting for a first request or an async start.
    Idle,
    /// `started && !blocked`. Has a live activation and is not waiting on a
    /// synchronous callee.
    Running,
    /// `started && blocked`. Has a live activation parked inside
    /// `task_send_req`, waiting for the callee to return.
    Blocked,
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Idle
    }
}
