// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The selection rule: which task runs next, per `spec.md` §4.4.
//!
//! This is the pure half of the scheduler -- it decides *what* should happen
//! next and pops the relevant message out of a queue, but it never touches a
//! register or a stack. `kern::executive` drives the actual context switch
//! based on the [`Selection`] this returns. Keeping the two separate is what
//! lets this policy be exercised with nothing but a `TaskTable<u32, N>` in a
//! host test, the same way the teacher keeps `task::select`/`priority_scan`
//! free of any switching side effects.

use core::ptr::NonNull;

use abi::TaskId;

use crate::err::{fail, Fault};
use crate::message::Message;
use crate::task::TaskTable;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SchedEvent {
    Start { target: u16 },
    Resume { target: u16 },
    ParkOnRoot,
}

ringbuf::ringbuf!(SCHED_RINGBUF, SchedEvent, 16, SchedEvent::ParkOnRoot);

/// What the selection rule decided should run next.
pub enum Selection {
    /// Deliver `req` to `target`, which has no live activation: a *start*.
    Start {
        target: TaskId,
        req: NonNull<Message>,
    },
    /// Deliver `ind` to `target`, which is already running: a *resume*. The
    /// delivered message is `None` when resuming the root task (the root has
    /// no indication queue; it simply regains control).
    Resume {
        target: TaskId,
        ind: Option<NonNull<Message>>,
    },
    /// Nothing runnable and the current task *is* the root: stay put.
    StayOnRoot,
}

/// Applies the selection rule in `spec.md` §4.4, starting the scan
/// immediately after `previous`.
///
/// This only *chooses*; it does not mutate `started`/`blocked` or perform any
/// switch. The caller is responsible for acting on the `Selection` (starting
/// or resuming the chosen task, updating its state) using `kern::arch`.
pub fn select<C, const TASK_CNT: usize>(
    previous: TaskId,
    table: &mut TaskTable<C, TASK_CNT>,
) -> Selection {
    for candidate in table.scan_order(previous) {
        let desc = table.task_mut(candidate);
        if desc.is_blocked() {
            continue;
        }
        if desc.is_started() {
            if let Some(ind) = desc.ind_queue().dequeue() {
                ringbuf::ringbuf_entry!(
                    SCHED_RINGBUF,
                    SchedEvent::Resume {
                        target: candidate.0
                    }
                );
                return Selection::Resume {
                    target: candidate,
                    ind: Some(ind),
                };
            }
        } else if let Some(req) = desc.req_queue().dequeue() {
            ringbuf::ringbuf_entry!(SCHED_RINGBUF, SchedEvent::Start { target: candidate.0 });
            return Selection::Start {
                target: candidate,
                req,
            };
        }
    }

    // Exhausted 1..=TASK_CNT without a hit: fall back to the root.
    if previous.is_root() {
        Selection::StayOnRoot
    } else {
        ringbuf::ringbuf_entry!(SCHED_RINGBUF, SchedEvent::ParkOnRoot);
        Selection::Resume {
            target: TaskId::ROOT,
            ind: None,
        }
    }
}

/// Asserts the scheduler never picks the root as a *start* target: the root
/// has no `reg_init` to start from, and `spec.md` guarantees `is_root()` is
/// excluded from the request-queue scan (the scan range is `1..=TASK_CNT`).
pub fn debug_assert_never_starts_root(target: TaskId) {
    if target.is_root() {
        fail(Fault::ImpossibleScanState);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use core::ptr::NonNull;

    fn leak_message(id: u32, param: u32, calling: Option<TaskId>) -> NonNull<Message> {
        let boxed = Box::new(Message {
            next: None,
            calling,
            id,
            param,
        });
        NonNull::new(Box::into_raw(boxed)).unwrap()
    }

    #[test]
    fn picks_lowest_index_request_first() {
        let mut table: TaskTable<u32, 3> = TaskTable::new(0, [0, 0, 0]);
        let t2 = TaskId::new(2);
        let t3 = TaskId::new(3);
        unsafe {
            table
                .task_mut(t3)
                .req_queue()
                .enqueue(leak_message(1, 0, None));
            table
                .task_mut(t2)
                .req_queue()
                .enqueue(leak_message(2, 0, None));
        }

        match select(TaskId::ROOT, &mut table) {
            Selection::Start { target, .. } => assert_eq!(target, t2),
            _ => panic!("expected a start"),
        }
    }

    #[test]
    fn falls_back_to_root_when_nothing_runnable() {
        let mut table: TaskTable<u32, 2> = TaskTable::new(0, [0, 0]);
        match select(TaskId::new(1), &mut table) {
            Selection::Resume { target, ind } => {
                assert_eq!(target, TaskId::ROOT);
                assert!(ind.is_none());
            }
            _ => panic!("expected resume-root fallback"),
        }
    }

    #[test]
    fn root_with_no_work_stays_put() {
        let mut table: TaskTable<u32, 2> = TaskTable::new(0, [0, 0]);
        match select(TaskId::ROOT, &mut table) {
            Selection::StayOnRoot => {}
            _ => panic!("expected StayOnRoot"),
        }
    }

    #[test]
    fn blocked_tasks_are_skipped() {
        let mut table: TaskTable<u32, 2> = TaskTable::new(0, [0, 0]);
        let t1 = TaskId::new(1);
        let t2 = TaskId::new(2);
        table.task_mut(t1).transition_to_running(None);
        table.task_mut(t1).transition_to_blocked();
        unsafe {
            table
                .task_mut(t1)
                .ind_queue()
                .enqueue(leak_message(9, 0, None));
        }
        table.task_mut(t2).transition_to_running(None);
        unsafe {
            table
                .task_mut(t2)
                .ind_queue()
                .enqueue(leak_message(7, 42, None));
        }

        match select(TaskId::ROOT, &mut table) {
            Selection::Resume { target, ind } => {
                assert_eq!(target, t2);
                let ind = ind.unwrap();
                assert_eq!(unsafe { ind.as_ref() }.id, 7);
            }
            _ => panic!("expected resume of task 2, skipping blocked task 1"),
        }
    }
}
