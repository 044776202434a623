// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Executive startup.
//!
//! The application is expected to supply its own fixed-size statics for the
//! task table and the executive singleton (`MaybeUninit`, so they cost no
//! initializer code before `start` runs) and the list of entry points plus a
//! heap region, then call [`start`] exactly once. This mirrors the
//! teacher's own `start_kernel`/`safe_start_kernel` split: a small unsafe
//! shim that hands real statics to a safe function that does the actual
//! assembly, matching `spec.md`'s "single shape specified at compile time"
//! framing (§3).

use core::mem::MaybeUninit;

use abi::TaskId;
use kerncore::message::EntryFn;
use kerncore::task::TaskTable;

use crate::arch::Context;
use crate::executive::{self, Executive, TaskTableOps};

/// One non-root task's fixed configuration.
pub struct TaskDesc {
    pub entry: EntryFn,
    /// Top of this task's stack region. Ignored by the `sim` backend, which
    /// runs each task on a host OS thread instead.
    pub stack_top: u32,
}

/// Builds the executive and installs it as the process-wide singleton, but
/// does not run anything: the caller becomes the root task and drives the
/// system from here by calling into `kern::executive` (or `userlib`)
/// directly, the same way [`start`] hands off to `Executive::idle`.
///
/// Split out from [`start`] so host tests and the `demos` crate can act as
/// the root task themselves -- issuing a handful of `task_asynch`/
/// `task_send_req` calls and then inspecting the result -- without entering
/// an infinite loop.
///
/// # Safety
/// Same as [`start`].
pub unsafe fn init<const TASK_CNT: usize>(
    task_table_storage: &'static mut MaybeUninit<TaskTable<Context, TASK_CNT>>,
    executive_storage: &'static mut MaybeUninit<Executive>,
    tasks: [TaskDesc; TASK_CNT],
    heap_region: &'static mut [MaybeUninit<u8>],
) -> &'static mut Executive {
    let mut heap = kerncore::heap::Heap::uninit();
    let bottom = heap_region.as_mut_ptr().cast::<u8>();
    let top = unsafe { bottom.add(heap_region.len()) };
    unsafe { heap.init(bottom, top) };

    let contexts = core::array::from_fn(|i| {
        Context::new(TaskId::new(i + 1), tasks[i].entry, tasks[i].stack_top)
    });

    let table: &'static mut TaskTable<Context, TASK_CNT> =
        task_table_storage.write(TaskTable::new(Context::root(), contexts));
    let table_ops: &'static mut dyn TaskTableOps = table;

    let exec: &'static mut Executive = executive_storage.write(Executive::new(heap, table_ops));
    unsafe {
        executive::install(exec);
    }
    exec
}

/// Builds the executive, installs it, and runs the root task's idle loop.
/// Never returns.
///
/// # Safety
/// Must be called at most once per boot. `task_table_storage` and
/// `executive_storage` must not be accessed by anything else afterward, and
/// `heap_region` must be valid for reads and writes for the remainder of
/// the program.
pub unsafe fn start<const TASK_CNT: usize>(
    task_table_storage: &'static mut MaybeUninit<TaskTable<Context, TASK_CNT>>,
    executive_storage: &'static mut MaybeUninit<Executive>,
    tasks: [TaskDesc; TASK_CNT],
    heap_region: &'static mut [MaybeUninit<u8>],
) -> ! {
    let exec = unsafe { init(task_table_storage, executive_storage, tasks, heap_region) };
    exec.idle()
}
