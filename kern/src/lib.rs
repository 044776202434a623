// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The architecture-binding layer of the cooperative task executive.
//!
//! `kerncore` implements the executive's logic -- the heap, the mailboxes,
//! the task table, the selection rule -- without knowing how a task's stack
//! is actually started or resumed. This crate supplies that: the three
//! context-switch primitives from `spec.md` §4.5 (`arch`), and the five
//! operations the contract in §4 names (`executive`), wired together at boot
//! by `startup`.
//!
//! Two `arch` backends exist, selected by Cargo feature, default `sim`:
//!
//! - `sim`: one OS thread stands in for each task's stack, coordinated with a
//!   mutex/condvar baton so only one ever runs at a time. This is what makes
//!   the rest of this crate unit-testable on a host.
//! - `arm_m`: real Cortex-M register save/restore. Inert without a linked
//!   board image, same status as the teacher's own `arch::arm_m` outside its
//!   build pipeline.
#![cfg_attr(not(any(test, feature = "sim")), no_std)]

pub mod arch;
pub mod executive;
pub mod startup;

pub use kerncore::{err, heap, message, sched, task};
