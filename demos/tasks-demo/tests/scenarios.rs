// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The six concrete scenarios from `spec.md` §8, driven end to end through
//! `kern::startup::init` + the `sim` backend, with the test function itself
//! acting as the root task.
//!
//! The executive singleton is process-wide, so scenarios share one test
//! binary and must not run concurrently; `TEST_LOCK` serializes them the
//! same way a `static mut` global would need to be serialized by hand in an
//! embedded integration test.

use std::ptr::NonNull;
use std::sync::Mutex;

use abi::{MessageId, Param, TaskId};
use kern::startup::TaskDesc;
use kerncore::message::Message;

static TEST_LOCK: Mutex<()> = Mutex::new(());

fn desc(entry: kerncore::message::EntryFn) -> TaskDesc {
    TaskDesc {
        entry,
        stack_top: 0,
    }
}

// --- Scenario 1: an indication wakes a parked `task_wait`. ---------------

static SCEN1_SEEN: Mutex<Vec<(MessageId, Param)>> = Mutex::new(Vec::new());

fn scen1_task(_req: Option<NonNull<Message>>) -> Option<NonNull<Message>> {
    let (id, param) = userlib::wait();
    SCEN1_SEEN.lock().unwrap().push((id, param));
    None
}

#[test]
fn scenario_1_indication_wakes_waiting_task() {
    let _guard = TEST_LOCK.lock().unwrap();
    SCEN1_SEEN.lock().unwrap().clear();
    tasks_demo::harness::setup([desc(scen1_task)], 4096);

    userlib::asynch(TaskId::new(1), 0, 0);
    userlib::send_ind(TaskId::new(1), 7, 42);

    assert_eq!(*SCEN1_SEEN.lock().unwrap(), vec![(7, 42)]);
}

// --- Scenario 2: synchronous request/reply between two tasks. ------------

static SCEN2_RESULT: Mutex<Option<(MessageId, Param)>> = Mutex::new(None);

fn scen2_task2(req: Option<NonNull<Message>>) -> Option<NonNull<Message>> {
    let req = req.unwrap();
    let param = unsafe { req.as_ref().param };
    unsafe { kern::executive::task_free(req) };
    Some(userlib::reply(99, param + 1))
}

fn scen2_task1(_req: Option<NonNull<Message>>) -> Option<NonNull<Message>> {
    let reply = userlib::send_req(TaskId::new(2), 9, 41);
    *SCEN2_RESULT.lock().unwrap() = Some(reply);
    None
}

#[test]
fn scenario_2_send_req_returns_callee_reply() {
    let _guard = TEST_LOCK.lock().unwrap();
    *SCEN2_RESULT.lock().unwrap() = None;
    tasks_demo::harness::setup([desc(scen2_task1), desc(scen2_task2)], 4096);

    userlib::asynch(TaskId::new(1), 0, 0);

    assert_eq!(*SCEN2_RESULT.lock().unwrap(), Some((99, 42)));
    assert_eq!(
        kern::executive::task_state(TaskId::new(1)),
        abi::TaskState::Idle
    );
    assert_eq!(
        kern::executive::task_state(TaskId::new(2)),
        abi::TaskState::Idle
    );
}

// --- Scenario 3: three sequential starts give three fresh activations. ---

static SCEN3_SEEN: Mutex<Vec<(MessageId, Param)>> = Mutex::new(Vec::new());

fn scen3_task(req: Option<NonNull<Message>>) -> Option<NonNull<Message>> {
    let req = req.expect("start always delivers a request");
    let (id, param) = unsafe { (req.as_ref().id, req.as_ref().param) };
    unsafe { kern::executive::task_free(req) };
    SCEN3_SEEN.lock().unwrap().push((id, param));
    None
}

#[test]
fn scenario_3_sequential_starts_are_independent_activations() {
    let _guard = TEST_LOCK.lock().unwrap();
    SCEN3_SEEN.lock().unwrap().clear();
    tasks_demo::harness::setup([desc(scen3_task)], 4096);

    userlib::asynch(TaskId::new(1), 1, 10);
    userlib::asynch(TaskId::new(1), 2, 20);
    userlib::asynch(TaskId::new(1), 3, 30);

    assert_eq!(
        *SCEN3_SEEN.lock().unwrap(),
        vec![(1, 10), (2, 20), (3, 30)]
    );
}

// --- Scenario 4: an indication to an idle task is silently discarded. ----

fn scen4_task_never_runs(_req: Option<NonNull<Message>>) -> Option<NonNull<Message>> {
    panic!("task 1 is never started in this scenario");
}

#[test]
fn scenario_4_indication_to_idle_task_is_discarded() {
    let _guard = TEST_LOCK.lock().unwrap();
    tasks_demo::harness::setup([desc(scen4_task_never_runs)], 4096);

    userlib::send_ind(TaskId::new(1), 5, 9);

    assert_eq!(
        kern::executive::task_state(TaskId::new(1)),
        abi::TaskState::Idle
    );
}

// --- Scenario 6: a three-level request chain. -----------------------------

static SCEN6_T1: Mutex<Option<(MessageId, Param)>> = Mutex::new(None);
static SCEN6_T2: Mutex<Option<(MessageId, Param)>> = Mutex::new(None);

fn scen6_task3(req: Option<NonNull<Message>>) -> Option<NonNull<Message>> {
    let req = req.unwrap();
    unsafe { kern::executive::task_free(req) };
    Some(userlib::reply(30, 300))
}

fn scen6_task2(req: Option<NonNull<Message>>) -> Option<NonNull<Message>> {
    let req = req.unwrap();
    unsafe { kern::executive::task_free(req) };
    let v3 = userlib::send_req(TaskId::new(3), 20, 200);
    *SCEN6_T2.lock().unwrap() = Some(v3);
    Some(userlib::reply(20, 200))
}

fn scen6_task1(_req: Option<NonNull<Message>>) -> Option<NonNull<Message>> {
    let v2 = userlib::send_req(TaskId::new(2), 10, 100);
    *SCEN6_T1.lock().unwrap() = Some(v2);
    None
}

#[test]
fn scenario_6_three_level_request_chain() {
    let _guard = TEST_LOCK.lock().unwrap();
    *SCEN6_T1.lock().unwrap() = None;
    *SCEN6_T2.lock().unwrap() = None;
    tasks_demo::harness::setup(
        [desc(scen6_task1), desc(scen6_task2), desc(scen6_task3)],
        4096,
    );

    userlib::asynch(TaskId::new(1), 0, 0);

    assert_eq!(*SCEN6_T2.lock().unwrap(), Some((30, 300)));
    assert_eq!(*SCEN6_T1.lock().unwrap(), Some((20, 200)));
    for id in 1..=3 {
        assert_eq!(
            kern::executive::task_state(TaskId::new(id)),
            abi::TaskState::Idle
        );
    }
}
