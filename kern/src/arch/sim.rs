// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-testable backend for the three context-switch primitives.
//!
//! Real hardware switches contexts by saving and restoring a handful of
//! registers and a stack pointer; there is no portable way to do that from
//! safe (or even unsafe-but-portable) Rust on a host, so this backend fakes
//! it with OS threads instead. Each non-root task gets one dedicated
//! thread, spawned lazily the first time it is started and then reused for
//! every later activation -- a real task's stack is reusable across
//! start/resume too, it just doesn't need a fresh OS thread to do it. A
//! mutex/condvar baton per context stands in for "this context's stack
//! pointer is valid and it's their turn to run"; exactly one baton is ever
//! armed at a time, which is what makes this a faithful simulation of the
//! single-CPU cooperative model in `spec.md` §5 rather than real
//! concurrency.
//!
//! The root context runs on whatever thread calls into the executive at
//! boot (see `kern::startup`); it never gets a dedicated worker thread of
//! its own.

use std::sync::{Condvar, Mutex};
use std::thread::{self, JoinHandle};

use core::ptr::NonNull;

use abi::TaskId;
use kerncore::message::{EntryFn, Message};
use unwrap_lite::UnwrapLite;

/// A message pointer, wrapped so it can cross the OS thread boundary the
/// simulator introduces. Sound because the baton protocol guarantees only
/// one side ever holds it at a time, mirroring the real executive's
/// single-thread-of-control invariant (`spec.md` §5).
#[derive(Copy, Clone)]
struct SendMsg(Option<NonNull<Message>>);
unsafe impl Send for SendMsg {}

enum Slot {
    Empty,
    Armed(SendMsg),
}

struct Baton {
    slot: Mutex<Slot>,
    cond: Condvar,
}

impl Baton {
    const fn new() -> Self {
        Baton {
            slot: Mutex::new(Slot::Empty),
            cond: Condvar::new(),
        }
    }

    fn arm_and_wake(&self, msg: Option<NonNull<Message>>) {
        let mut slot = self.slot.lock().unwrap_lite();
        *slot = Slot::Armed(SendMsg(msg));
        self.cond.notify_one();
    }

    fn park(&self) -> Option<NonNull<Message>> {
        let mut slot = self.slot.lock().unwrap_lite();
        loop {
            if let Slot::Armed(SendMsg(msg)) = *slot {
                *slot = Slot::Empty;
                return msg;
            }
            slot = self.cond.wait(slot).unwrap_lite();
        }
    }
}

enum Worker {
    NotSpawned,
    Spawned(JoinHandle<()>),
}

/// The per-task (or per-root) simulated execution context.
pub struct Context {
    id: TaskId,
    entry: Option<EntryFn>,
    baton: Baton,
    worker: Mutex<Worker>,
}

impl Context {
    pub const fn root() -> Self {
        Context {
            id: TaskId::ROOT,
            entry: None,
            baton: Baton::new(),
            worker: Mutex::new(Worker::NotSpawned),
        }
    }

    /// `stack_top` is accepted for signature parity with `arch::arm_m`'s
    /// constructor and ignored: the simulator uses the host's own OS
    /// thread stacks instead of a task-owned stack region.
    pub const fn new(id: TaskId, entry: EntryFn, stack_top: u32) -> Self {
        let _ = stack_top;
        Context {
            id,
            entry: Some(entry),
            baton: Baton::new(),
            worker: Mutex::new(Worker::NotSpawned),
        }
    }
}

/// The persistent worker thread body for a non-root task: waits to be
/// armed, runs one activation of the entry function to completion, then
/// hands the reply to `task_ending_handler` before looping back to wait for
/// the next one. This is the thread-based stand-in for a real task's
/// outermost stack frame.
fn worker_body(id: TaskId, ctx: &'static Context, entry: EntryFn) {
    loop {
        let req = ctx.baton.park();
        let reply = entry(req);
        crate::executive::task_ending_handler(id, reply);
    }
}

fn ensure_spawned(ctx: &'static Context) {
    let mut worker = ctx.worker.lock().unwrap_lite();
    if matches!(*worker, Worker::NotSpawned) {
        let entry = ctx.entry.expect("non-root context must have an entry fn");
        let id = ctx.id;
        let handle = thread::Builder::new()
            .name(std::format!("task{}", id.index()))
            .spawn(move || worker_body(id, ctx, entry))
            .unwrap_lite();
        *worker = Worker::Spawned(handle);
    }
}

/// Starts `target` fresh (spawning its worker thread on first use), delivers
/// `req`, and parks `self_ctx` until something switches back to it.
///
/// # Safety
/// `target` must not already have a live activation, matching the contract
/// `arch::arm_m::context_start` documents.
pub unsafe fn context_start(
    self_ctx: &'static Context,
    target: &'static Context,
    req: Option<NonNull<Message>>,
) -> Option<NonNull<Message>> {
    ensure_spawned(target);
    target.baton.arm_and_wake(req);
    self_ctx.baton.park()
}

/// Resumes `target`, which is already started and parked somewhere in its
/// own call stack, delivers `ind`, and parks `self_ctx` until something
/// switches back to it.
///
/// # Safety
/// `target` must already be started and parked.
pub unsafe fn context_switch(
    self_ctx: &'static Context,
    target: &'static Context,
    ind: Option<NonNull<Message>>,
) -> Option<NonNull<Message>> {
    target.baton.arm_and_wake(ind);
    self_ctx.baton.park()
}

/// Resumes `target` without parking the caller: used from a task's own
/// worker thread right before it loops back to wait for its next
/// activation, so there is nothing of the caller's left to preserve.
///
/// # Safety
/// Must only be called from the finishing task's own trampoline/loop.
pub unsafe fn context_switch2(target: &'static Context, ind: Option<NonNull<Message>>) {
    target.baton.arm_and_wake(ind);
}
