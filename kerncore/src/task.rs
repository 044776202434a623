// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The task table: per-task descriptors and their mailboxes, per `spec.md`
//! §3/§4.3.
//!
//! This module is deliberately ignorant of how a task's stack is started or
//! resumed -- that's architecture work that lives in `kern::arch`. Each
//! descriptor carries an opaque context blob `C` (supplied by the caller)
//! that `kern` uses to stash whatever an architecture needs to remember
//! between switches (a `SavedState` plus an immutable launch template, in the
//! teacher's vocabulary). `kerncore` only ever moves `C` around; it never
//! reads its contents.

use abi::{TaskId, TaskState};

use crate::err::{fail, Fault};
use crate::message::MessageQueue;

/// Descriptor for the root (idle) task, index 0.
///
/// Per `spec.md` §3: no stack of its own, never blocked, never enqueued with
/// requests. It still needs somewhere to save its own registers when it
/// starts another task and parks, hence `ctx`.
pub struct Root<C> {
    pub ctx: C,
}

/// Descriptor for a non-root task, indices `1..=TASK_CNT`.
pub struct Descriptor<C> {
    started: bool,
    blocked: bool,
    /// The descriptor of the task currently blocked on this one, if any
    /// (I5). Set from the delivered message's `calling` field.
    calling: Option<TaskId>,
    req_queue: MessageQueue,
    ind_queue: MessageQueue,
    pub ctx: C,
}

impl<C> Descriptor<C> {
    pub fn new(ctx: C) -> Self {
        Descriptor {
            started: false,
            blocked: false,
            calling: None,
            req_queue: MessageQueue::new(),
            ind_queue: MessageQueue::new(),
            ctx,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn calling(&self) -> Option<TaskId> {
        self.calling
    }

    pub fn req_queue(&mut self) -> &mut MessageQueue {
        &mut self.req_queue
    }

    pub fn req_queue_is_empty(&self) -> bool {
        self.req_queue.is_empty()
    }

    pub fn ind_queue(&mut self) -> &mut MessageQueue {
        &mut self.ind_queue
    }

    /// Observable state per the IDLE/RUNNING/BLOCKED machine in `spec.md`
    /// §4.4.
    pub fn state(&self) -> TaskState {
        match (self.started, self.blocked) {
            (false, false) => TaskState::Idle,
            (true, false) => TaskState::Running,
            (true, true) => TaskState::Blocked,
            (false, true) => fail(Fault::InconsistentCallingState),
        }
    }

    /// IDLE -> RUNNING, either by first request delivery or async start.
    /// Enforces "not already started" (a start on a started task is a
    /// contract violation).
    pub(crate) fn transition_to_running(&mut self, calling: Option<TaskId>) {
        if self.started {
            fail(Fault::AlreadyStarted);
        }
        self.started = true;
        self.blocked = false;
        self.calling = calling;
    }

    /// RUNNING -> BLOCKED, on `task_send_req` to a different task.
    pub(crate) fn transition_to_blocked(&mut self) {
        debug_assert!(self.started && !self.blocked);
        self.blocked = true;
    }

    /// BLOCKED -> RUNNING, when the callee this task is blocked on returns.
    pub(crate) fn transition_to_unblocked(&mut self) {
        if !(self.started && self.blocked) {
            fail(Fault::InconsistentCallingState);
        }
        self.blocked = false;
    }

    /// RUNNING -> IDLE, when the task's entry function returns.
    pub(crate) fn transition_to_idle(&mut self) {
        debug_assert!(self.started && !self.blocked);
        self.started = false;
        self.calling = None;
    }
}

/// The fixed set of task descriptors, indexed `0..=TASK_CNT`.
///
/// `TASK_CNT` is a const generic so host tests can instantiate several
/// differently-sized tables in one process; on target, a single
/// monomorphization is selected by the application's configuration.
pub struct TaskTable<C, const TASK_CNT: usize> {
    root: Root<C>,
    tasks: [Descriptor<C>; TASK_CNT],
}

impl<C, const TASK_CNT: usize> TaskTable<C, TASK_CNT> {
    pub fn new(root_ctx: C, task_ctxs: [C; TASK_CNT]) -> Self {
        TaskTable {
            root: Root { ctx: root_ctx },
            tasks: task_ctxs.map(Descriptor::new),
        }
    }

    pub fn root(&self) -> &Root<C> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Root<C> {
        &mut self.root
    }

    /// Looks up a non-root task by id, failing the contract if `id` is out
    /// of `1..=TASK_CNT` or is the root.
    pub fn task(&self, id: TaskId) -> &Descriptor<C> {
        self.check_range(id);
        &self.tasks[id.index() - 1]
    }

    pub fn task_mut(&mut self, id: TaskId) -> &mut Descriptor<C> {
        self.check_range(id);
        &mut self.tasks[id.index() - 1]
    }

    pub fn task_count(&self) -> usize {
        TASK_CNT
    }

    fn check_range(&self, id: TaskId) {
        if id.is_root() || id.index() > TASK_CNT {
            fail(Fault::TaskIdOutOfRange);
        }
    }

    /// Iterates task ids in ascending index order, starting right after
    /// `previous` and running up to `TASK_CNT` with no wraparound -- the scan
    /// order the selection rule in `spec.md` §4.4 requires. Reaching the end
    /// without a hit is the caller's cue to fall back to the root.
    /// `previous` may be `TaskId::ROOT`.
    pub(crate) fn scan_order(&self, previous: TaskId) -> impl Iterator<Item = TaskId> {
        let start = previous.index(); // 0 for root, else 1..=TASK_CNT
        (start + 1..=TASK_CNT).map(TaskId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transitions() {
        let mut table: TaskTable<u32, 3> = TaskTable::new(0, [0, 0, 0]);
        let t1 = TaskId::new(1);
        assert_eq!(table.task(t1).state(), TaskState::Idle);

        table.task_mut(t1).transition_to_running(None);
        assert_eq!(table.task(t1).state(), TaskState::Running);

        table.task_mut(t1).transition_to_blocked();
        assert_eq!(table.task(t1).state(), TaskState::Blocked);

        table.task_mut(t1).transition_to_unblocked();
        assert_eq!(table.task(t1).state(), TaskState::Running);

        table.task_mut(t1).transition_to_idle();
        assert_eq!(table.task(t1).state(), TaskState::Idle);
    }

    #[test]
    #[should_panic(expected = "AlreadyStarted")]
    fn double_start_is_fatal() {
        let mut table: TaskTable<u32, 2> = TaskTable::new(0, [0, 0]);
        let t1 = TaskId::new(1);
        table.task_mut(t1).transition_to_running(None);
        table.task_mut(t1).transition_to_running(None);
    }

    #[test]
    #[should_panic(expected = "TaskIdOutOfRange")]
    fn out_of_range_id_is_fatal() {
        let table: TaskTable<u32, 2> = TaskTable::new(0, [0, 0]);
        let _ = table.task(TaskId::new(3));
    }

    #[test]
    fn scan_order_wraps_ascending() {
        let table: TaskTable<u32, 3> = TaskTable::new(0, [0, 0, 0]);
        let order: Vec<_> = table
            .scan_order(TaskId::new(2))
            .map(TaskId::index)
            .collect();
        assert_eq!(order, vec![3]);

        let order: Vec<_> = table
            .scan_order(TaskId::ROOT)
            .map(TaskId::index)
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }
}
