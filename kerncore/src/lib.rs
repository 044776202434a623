// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware-independent core of the cooperative task executive.
//!
//! This mirrors the teacher's `kerncore` crate in spirit: a small, portable
//! layer that can be unit-tested on a host without any architecture support.
//! Everything here operates on raw memory handed to it by the caller, or on
//! plain data (queues, descriptors); nothing here knows how to start a task's
//! stack or switch to it. That lives one layer up, in `kern::arch`, because
//! no portable Rust construct expresses "save my registers here, resume that
//! other saved frame" (`spec.md` §9).
//!
//! Allow std-y things to be used in test, same caveat the teacher's
//! `kerncore` documents: rust-analyzer may build with `test` set by default,
//! so it's easy to introduce code incompatible with `no_std` without your
//! editor complaining.
#![cfg_attr(not(test), no_std)]

pub mod err;
pub mod heap;
pub mod message;
pub mod sched;
pub mod task;

pub use abi::{MessageId, Param, TaskId, TaskState};
