// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Task-side convenience library.
//!
//! Wraps the five operations `kern::executive` exposes with an ergonomic
//! `(id, param)` surface, the role the teacher's own `hl`/`sys_*` stubs play
//! over Hubris's syscall ABI. There is no trap here, though: task code and
//! kernel code share one address space and one call stack discipline
//! (`spec.md` §5), so "making a syscall" is just a direct function call
//! into `kern::executive`, and a task's entry function is an ordinary Rust
//! `fn` rather than a linked, separately-relocated image.

#![cfg_attr(not(any(test, feature = "sim")), no_std)]

use core::ptr::NonNull;

pub use abi::{MessageId, Param, TaskId, TaskState};
pub use kerncore::message::{EntryFn, Message};

use unwrap_lite::UnwrapLite;

/// Allocates a message and stamps its `calling` field with the currently
/// running task, the shape a request needs so the target's start branch can
/// resume the right sender on return (`spec.md` §4.2/§4.4).
pub fn malloc(id: MessageId, param: Param) -> NonNull<Message> {
    kern::executive::task_malloc(id, param, Some(kern::executive::current_task()))
}

/// Builds a message with no sender back-reference: used for a task's reply
/// (the value its entry function returns) and for indications, where
/// `calling` plays no role.
pub fn reply(id: MessageId, param: Param) -> NonNull<Message> {
    kern::executive::task_malloc(id, param, None)
}

/// Sends `id`/`param` to `target` as a synchronous request and blocks until
/// it replies, returning the reply's `id`/`param` and freeing the reply
/// message.
///
/// # Panics
/// If called by the root task, or if `target` is out of range -- the same
/// preconditions `kern::executive::task_send_req` enforces.
pub fn send_req(target: TaskId, id: MessageId, param: Param) -> (MessageId, Param) {
    let req = malloc(id, param);
    let reply = kern::executive::task_send_req(target, req).unwrap_lite();
    let (rid, rparam) = unsafe { (reply.as_ref().id, reply.as_ref().param) };
    unsafe { kern::executive::task_free(reply) };
    (rid, rparam)
}

/// Posts `id`/`param` to `target` as an indication without blocking.
/// Silently discarded if `target` is not started (`spec.md` §4.4).
pub fn send_ind(target: TaskId, id: MessageId, param: Param) {
    let ind = reply(id, param);
    kern::executive::task_send_ind(target, ind);
}

/// Starts `target` with `id`/`param` as its first request. Only the root
/// task may call this (`spec.md` §4.4).
pub fn asynch(target: TaskId, id: MessageId, param: Param) {
    let req = reply(id, param);
    kern::executive::task_asynch(target, req);
}

/// Parks the calling task until its next indication arrives, returning its
/// `id`/`param` and freeing the message.
pub fn wait() -> (MessageId, Param) {
    let msg = kern::executive::task_wait().unwrap_lite();
    let (id, param) = unsafe { (msg.as_ref().id, msg.as_ref().param) };
    unsafe { kern::executive::task_free(msg) };
    (id, param)
}

/// The identity of the task currently running -- useful for tasks that want
/// to tag diagnostics with their own id rather than assuming it.
pub fn current_task() -> TaskId {
    kern::executive::current_task()
}
