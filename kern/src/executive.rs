// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The five operations the executive contract in `spec.md` §4 names:
//! `task_malloc`/`task_free`, `task_asynch`, `task_send_req`,
//! `task_send_ind`, and the `task_ending_handler` trampoline target.
//!
//! Everything here is a thin coordinator: the actual bookkeeping lives in
//! `kerncore` (heap, mailboxes, task table, selection rule); this module's
//! job is to hold the one `'static` task table the whole system shares,
//! enforce the caller-identity rules in `spec.md` §4 (who may call what),
//! and turn a `kerncore::sched::Selection` into an actual switch via
//! `kern::arch`.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicPtr, Ordering};

use abi::{MessageId, Param, TaskId};
use kerncore::err::{fail, Fault};
use kerncore::heap::Heap;
use kerncore::message::Message;
use kerncore::sched::{self, Selection};
use kerncore::task::{Descriptor, Root, TaskTable};

use crate::arch::{self, Context};

/// Erases the task table's `TASK_CNT` const generic behind a trait object,
/// so [`Executive`] itself does not need to carry it around: the
/// application picks `TASK_CNT` once, at the one place it builds a concrete
/// `TaskTable`, and nothing downstream needs to know it.
pub trait TaskTableOps {
    fn select(&mut self, previous: TaskId) -> Selection;
    fn task(&self, id: TaskId) -> &Descriptor<Context>;
    fn task_mut(&mut self, id: TaskId) -> &mut Descriptor<Context>;
    fn root(&self) -> &Root<Context>;
}

impl<const TASK_CNT: usize> TaskTableOps for TaskTable<Context, TASK_CNT> {
    fn select(&mut self, previous: TaskId) -> Selection {
        sched::select(previous, self)
    }
    fn task(&self, id: TaskId) -> &Descriptor<Context> {
        TaskTable::task(self, id)
    }
    fn task_mut(&mut self, id: TaskId) -> &mut Descriptor<Context> {
        TaskTable::task_mut(self, id)
    }
    fn root(&self) -> &Root<Context> {
        TaskTable::root(self)
    }
}

/// Everything the executive needs at runtime, gathered in one place so
/// `kern::startup` can build it once and hand out a `'static` reference.
pub struct Executive {
    heap: Heap,
    table: &'static mut dyn TaskTableOps,
    /// The task the executive is currently running as, so
    /// `task_ending_handler` (running on the dying task's own thread/stack)
    /// knows who just finished without needing it threaded through `arch`.
    current: TaskId,
}

/// The single executive instance, set up once at boot by `kern::startup`
/// and referenced as `'static` from then on -- mirroring the teacher's own
/// `with_task_table`/`set_task_table` pattern of stashing the one true task
/// table behind a static once it's built.
///
/// An `AtomicPtr` purely to give this a safe way to read/write without a
/// `static mut`; there is never any actual concurrent access to worry
/// about, since only the single task currently holding the baton (`spec.md`
/// §5) ever touches the executive.
static EXECUTIVE: AtomicPtr<Executive> = AtomicPtr::new(core::ptr::null_mut());

/// # Safety
/// Must be called exactly once, before any other function in this module,
/// with a reference that remains valid and exclusively owned by the
/// executive for the remainder of the program.
pub(crate) unsafe fn install(exec: &'static mut Executive) {
    EXECUTIVE.store(exec as *mut Executive, Ordering::Relaxed);
}

fn with_exec<R>(f: impl FnOnce(&mut Executive) -> R) -> R {
    let ptr = EXECUTIVE.load(Ordering::Relaxed);
    assert!(!ptr.is_null(), "executive not installed");
    f(unsafe { &mut *ptr })
}

impl Executive {
    pub(crate) fn new(heap: Heap, table: &'static mut dyn TaskTableOps) -> Self {
        Executive {
            heap,
            table,
            current: TaskId::ROOT,
        }
    }

    /// Allocates a message and fills it in, per `spec.md` §4.1/§4.2. May be
    /// called by any task, including the root.
    pub fn task_malloc(
        &mut self,
        id: MessageId,
        param: Param,
        calling: Option<TaskId>,
    ) -> NonNull<Message> {
        let size = core::mem::size_of::<Message>();
        let slot = self.heap.alloc(size);
        unsafe { Message::init(slot.cast(), id, param, calling) }
    }

    /// Frees a message previously returned by `task_malloc`. Per `spec.md`
    /// §4.2/I4, only the task that currently owns a message may free it --
    /// enforced by callers, since the heap itself has no notion of
    /// ownership.
    ///
    /// # Safety
    /// `msg` must not be enqueued anywhere and must not be used again after
    /// this call.
    pub unsafe fn task_free(&mut self, msg: NonNull<Message>) {
        unsafe { self.heap.free(msg.cast()) };
    }

    /// Starts `target` directly with no `calling` sender (`spec.md` §4.4,
    /// the fire-and-forget variant of a start). Only the root task may call
    /// this; `target` must not already be started.
    ///
    /// Unlike `task_send_req`'s general path, this always performs the
    /// *start* switch immediately rather than going through the selection
    /// rule -- the root has nothing else to do until `target` (or some
    /// descendant) eventually parks on an empty scan.
    pub fn task_asynch(
        &mut self,
        target: TaskId,
        req: NonNull<Message>,
    ) -> Option<NonNull<Message>> {
        if self.current != TaskId::ROOT {
            fail(Fault::WrongCaller);
        }
        let previous = self.current;
        self.table.task_mut(target).transition_to_running(None);
        self.current = target;
        let (self_ctx, target_ctx) = self.contexts(previous, target);
        let reply = unsafe { arch::context_start(self_ctx, target_ctx, Some(req)) };
        self.current = previous;
        reply
    }

    /// Sends a synchronous request and blocks the calling task until the
    /// target replies (`spec.md` §4.4). `req.calling` must already be set
    /// to the current task.
    ///
    /// Two branches, mirroring the original `task_send_req`/`task_start`
    /// pair: if `target` is idle with nothing already queued, switch into it
    /// directly rather than going through the general selection scan (which
    /// could otherwise hand the CPU to some unrelated, already-started task
    /// ahead of `target` in scan order instead of the intended callee).
    /// Otherwise queue `req` and let the selection rule decide, since
    /// `target` is already running or has other requests ahead of this one.
    pub fn task_send_req(
        &mut self,
        target: TaskId,
        req: NonNull<Message>,
    ) -> Option<NonNull<Message>> {
        let caller = self.current;
        if caller == TaskId::ROOT {
            fail(Fault::WrongCaller);
        }
        self.table.task_mut(caller).transition_to_blocked();

        let target_idle_and_empty =
            !self.table.task(target).is_started() && self.table.task(target).req_queue_is_empty();
        if target_idle_and_empty {
            self.table
                .task_mut(target)
                .transition_to_running(Some(caller));
            self.current = target;
            let (self_ctx, target_ctx) = self.contexts(caller, target);
            let reply = unsafe { arch::context_start(self_ctx, target_ctx, Some(req)) };
            self.current = caller;
            reply
        } else {
            unsafe {
                self.table.task_mut(target).req_queue().enqueue(req);
            }
            self.run_scheduler()
        }
    }

    /// Posts an indication to `target`'s indication queue without blocking
    /// the caller (`spec.md` §4.4). Any task, including the root, may call
    /// this. If `target` is not started, the indication is silently
    /// discarded (freed) rather than queued -- there is no live activation
    /// left to ever pop it.
    pub fn task_send_ind(&mut self, target: TaskId, ind: NonNull<Message>) {
        if !self.table.task(target).is_started() {
            unsafe { self.heap.free(ind.cast()) };
            return;
        }
        unsafe {
            self.table.task_mut(target).ind_queue().enqueue(ind);
        }
    }

    /// Returns the calling task's next indication, without changing its
    /// `blocked` flag -- the asynchronous-wait counterpart to
    /// `task_send_req`'s synchronous block (`spec.md` §4.4). Only a started,
    /// non-root task may call this.
    ///
    /// If an indication is already sitting in the caller's own `ind_queue`,
    /// it is popped and returned immediately: the selection rule scans
    /// starting strictly after the caller, so it would never examine the
    /// caller's own queue. Only when that queue is empty does this park via
    /// the general selection rule.
    pub fn task_wait(&mut self) -> Option<NonNull<Message>> {
        if self.current == TaskId::ROOT {
            fail(Fault::WrongCaller);
        }
        if let Some(ind) = self.table.task_mut(self.current).ind_queue().dequeue() {
            return Some(ind);
        }
        self.run_scheduler()
    }

    /// Runs the selection rule and performs whichever switch it calls for,
    /// returning once `self.current` (as of the call) is chosen again.
    fn run_scheduler(&mut self) -> Option<NonNull<Message>> {
        let previous = self.current;
        match self.table.select(previous) {
            Selection::Start { target, req } => {
                sched::debug_assert_never_starts_root(target);
                self.table
                    .task_mut(target)
                    .transition_to_running(req_caller(req));
                self.current = target;
                let (self_ctx, target_ctx) = self.contexts(previous, target);
                let reply = unsafe { arch::context_start(self_ctx, target_ctx, Some(req)) };
                self.current = previous;
                reply
            }
            Selection::Resume { target, ind } => {
                if target != TaskId::ROOT {
                    self.table.task_mut(target).transition_to_unblocked();
                }
                self.current = target;
                let (self_ctx, target_ctx) = self.contexts(previous, target);
                let reply = unsafe { arch::context_switch(self_ctx, target_ctx, ind) };
                self.current = previous;
                reply
            }
            Selection::StayOnRoot => None,
        }
    }

    /// Looks up the `arch::Context` for a task id as a `'static` reference,
    /// the shape every `arch` backend's switch primitives expect.
    ///
    /// Safety: `self.table` is `'static` by construction (installed once at
    /// boot by `kern::startup`, never moved or freed), so the `Context`s it
    /// owns outlive every borrow taken here.
    fn ctx(&self, id: TaskId) -> &'static Context {
        let table: &'static dyn TaskTableOps =
            unsafe { &*(&*self.table as *const dyn TaskTableOps) };
        ctx_of(table, id)
    }

    fn contexts(&self, previous: TaskId, target: TaskId) -> (&'static Context, &'static Context) {
        (self.ctx(previous), self.ctx(target))
    }

    /// Bookkeeping run when a task's entry function returns, reached either
    /// via the Cortex-M trampoline or a simulated worker thread's loop.
    ///
    /// Transitions the finishing task back to idle. If `calling` names the
    /// blocked sender of the request this task was handling -- the later,
    /// more defensive variant of this RTOS, where that sender is tracked by
    /// an explicit back-reference rather than an auto-freed message with no
    /// back-reference at all -- the reply is delivered straight into that
    /// sender's own saved context: a targeted resume, not a trip through the
    /// general selection rule, since the sender is sitting `blocked` and the
    /// selection scan always skips blocked tasks. Only when there is no
    /// sender to resume does this fall back to the selection rule, the same
    /// way `run_scheduler` would. On a real architecture the resulting
    /// switch is a direct tail call into the next context and never
    /// returns; the simulated backend's worker thread instead loops back to
    /// wait for its next activation.
    fn finish(&mut self, finishing: TaskId, reply: Option<NonNull<Message>>) {
        if finishing == TaskId::ROOT {
            fail(Fault::WrongCaller);
        }
        let calling = self.table.task(finishing).calling();
        self.table.task_mut(finishing).transition_to_idle();

        if let Some(caller) = calling {
            debug_assert!(!caller.is_root());
            self.table.task_mut(caller).transition_to_unblocked();
            self.current = caller;
            arch_continue(self.ctx(caller), reply);
        } else {
            self.current = finishing;
            match self.table.select(finishing) {
                Selection::Start { target, req } => {
                    sched::debug_assert_never_starts_root(target);
                    self.table
                        .task_mut(target)
                        .transition_to_running(req_caller(req));
                    self.current = target;
                    arch_continue(self.ctx(target), Some(req));
                }
                Selection::Resume { target, ind } => {
                    if target != TaskId::ROOT {
                        self.table.task_mut(target).transition_to_unblocked();
                    }
                    self.current = target;
                    arch_continue(self.ctx(target), ind);
                }
                // A task just finished, so the root (at minimum) is idle
                // and able to resume; `select` always has somewhere to go
                // from a non-root `previous`.
                Selection::StayOnRoot => fail(Fault::ImpossibleScanState),
            }
        }
    }

    /// Runs the scheduler forever from the root: the kernel's idle loop,
    /// entered once `kern::startup` has queued the initial async starts.
    pub fn idle(&mut self) -> ! {
        loop {
            self.run_scheduler();
        }
    }
}

fn ctx_of(table: &'static dyn TaskTableOps, id: TaskId) -> &'static Context {
    if id == TaskId::ROOT {
        &table.root().ctx
    } else {
        &table.task(id).ctx
    }
}

fn req_caller(req: NonNull<Message>) -> Option<TaskId> {
    unsafe { req.as_ref() }.calling
}

/// Entry point the Cortex-M trampoline and the simulated backend's worker
/// threads both call once a task's entry function returns.
pub fn task_ending_handler(finishing: TaskId, reply: Option<NonNull<Message>>) {
    with_exec(|exec| exec.finish(finishing, reply))
}

/// Hands control to `target` via `context_switch2` -- on real hardware this
/// never returns; the simulated backend returns immediately (having just
/// woken `target`'s thread) and relies on its caller being a worker
/// thread's loop that is about to park again on its own.
#[cfg(feature = "arm_m")]
fn arch_continue(target: &'static Context, msg: Option<NonNull<Message>>) -> ! {
    unsafe { arch::context_switch2(target, msg) }
}

#[cfg(not(feature = "arm_m"))]
fn arch_continue(target: &'static Context, msg: Option<NonNull<Message>>) {
    unsafe { arch::context_switch2(target, msg) }
}

/// Free-function facade over the installed [`Executive`], the shape
/// `userlib` is built against so task code never has to name `Executive`
/// or the trait-object table directly.
pub fn current_task() -> TaskId {
    with_exec(|exec| exec.current)
}

pub fn task_malloc(id: MessageId, param: Param, calling: Option<TaskId>) -> NonNull<Message> {
    with_exec(|exec| exec.task_malloc(id, param, calling))
}

/// # Safety
/// Same as [`Executive::task_free`].
pub unsafe fn task_free(msg: NonNull<Message>) {
    with_exec(|exec| unsafe { exec.task_free(msg) })
}

pub fn task_asynch(target: TaskId, req: NonNull<Message>) -> Option<NonNull<Message>> {
    with_exec(|exec| exec.task_asynch(target, req))
}

pub fn task_send_req(target: TaskId, req: NonNull<Message>) -> Option<NonNull<Message>> {
    with_exec(|exec| exec.task_send_req(target, req))
}

pub fn task_send_ind(target: TaskId, ind: NonNull<Message>) {
    with_exec(|exec| exec.task_send_ind(target, ind))
}

pub fn task_wait() -> Option<NonNull<Message>> {
    with_exec(|exec| exec.task_wait())
}

/// Reads a task's observable lifecycle state, for diagnostics and tests --
/// the read-only counterpart of the teacher's `kipc::read_task_status`,
/// minus the trip through the kernel task's own IPC surface this executive
/// has no equivalent of.
pub fn task_state(id: TaskId) -> abi::TaskState {
    with_exec(|exec| exec.table.task(id).state())
}
