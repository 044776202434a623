// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Illustrative tasks exercising the executive end to end, plus a small
//! host test harness the integration tests in `tests/` build on.
//!
//! `ping`/`pong` is the smallest possible demonstration of a synchronous
//! request/reply round trip (`spec.md` §8 scenario 2): `pong` always
//! answers with its input parameter plus one, and `ping` forwards whatever
//! it was started with to `pong` and returns the result.

#![cfg_attr(not(any(test, feature = "sim")), no_std)]

use core::ptr::NonNull;

use abi::{MessageId, Param, TaskId};
use kerncore::message::Message;

pub const PING: TaskId = TaskId::new(1);
pub const PONG: TaskId = TaskId::new(2);

const PING_ID: MessageId = 1;
const PONG_ID: MessageId = 2;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DemoEvent {
    Ping(Param),
    Pong(Param),
    None,
}
ringbuf::ringbuf!(DEMO_RINGBUF, DemoEvent, 16, DemoEvent::None);

/// `pong`'s entry point: answers every request with its parameter plus one.
pub fn pong(req: Option<NonNull<Message>>) -> Option<NonNull<Message>> {
    let req = req.expect("pong is only ever started by a request");
    let param = unsafe { req.as_ref().param };
    unsafe { kern::executive::task_free(req) };
    ringbuf::ringbuf_entry!(DEMO_RINGBUF, DemoEvent::Pong(param));
    Some(userlib::reply(PONG_ID, param + 1))
}

/// `ping`'s entry point: forwards its starting parameter to [`PONG`] and
/// returns whatever comes back.
pub fn ping(req: Option<NonNull<Message>>) -> Option<NonNull<Message>> {
    let req = req.expect("ping is only ever started by a request");
    let param = unsafe { req.as_ref().param };
    unsafe { kern::executive::task_free(req) };
    ringbuf::ringbuf_entry!(DEMO_RINGBUF, DemoEvent::Ping(param));
    let (_, reply_param) = userlib::send_req(PONG, PING_ID, param);
    Some(userlib::reply(PING_ID, reply_param))
}

/// Host-only setup helper: builds and installs an [`Executive`][kern::executive::Executive]
/// for `TASK_CNT` tasks with leaked `'static` storage, then hands control
/// back to the caller to act as the root task. Used by `tests/scenarios.rs`
/// and by anything exercising this crate's tasks under the `sim` backend.
#[cfg(feature = "sim")]
pub mod harness {
    use core::mem::MaybeUninit;
    use std::boxed::Box;
    use std::vec;

    use kern::arch::Context;
    use kern::executive::Executive;
    use kern::startup::{self, TaskDesc};
    use kerncore::task::TaskTable;

    pub fn setup<const TASK_CNT: usize>(
        tasks: [TaskDesc; TASK_CNT],
        heap_bytes: usize,
    ) -> &'static mut Executive {
        let table_storage: &'static mut MaybeUninit<TaskTable<Context, TASK_CNT>> =
            Box::leak(Box::new(MaybeUninit::uninit()));
        let exec_storage: &'static mut MaybeUninit<Executive> =
            Box::leak(Box::new(MaybeUninit::uninit()));
        let heap_region: &'static mut [MaybeUninit<u8>] =
            Box::leak(vec![MaybeUninit::uninit(); heap_bytes].into_boxed_slice());
        unsafe { startup::init(table_storage, exec_storage, tasks, heap_region) }
    }
}
