// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cortex-M backend for the three context-switch primitives.
//!
//! Unlike a preemptible kernel, this executive never takes an exception to
//! switch tasks: every switch is a direct call from the currently running
//! task's own code, through `kern::executive`, into one of the three
//! functions below. So there is no SVC/PendSV trap layer here -- just a
//! pair of naked functions that save the callee-saved registers of the
//! outgoing context and restore those of the incoming one, in the same
//! style as a `setjmp`/`longjmp` pair.
//!
//! This module is inert outside of a real linked board image, the same
//! status the teacher's own `arch::arm_m` has outside its build pipeline:
//! it compiles under the `arm_m` feature but nothing here has been run on
//! real silicon as part of this exercise.

use core::arch::global_asm;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicPtr, Ordering};

use abi::TaskId;
use kerncore::message::{EntryFn, Message};

/// Callee-saved registers (AAPCS: r4-r11 and the stack pointer) for one
/// suspended context, plus the fixed configuration needed to (re)start it.
///
/// NOTE: `r4_r11` and `sp` must stay the first two fields, in this order;
/// `context_switch_asm`/`context_load_asm` address them positionally.
#[repr(C)]
pub struct Context {
    r4_r11: [u32; 8],
    sp: u32,
    /// Top of this task's stack region, used only the first time it is
    /// started (`spec.md` §4.5: `context_start` is "start from scratch").
    stack_top: u32,
    /// The task's entry function. `None` for the root context, which is
    /// never started via `context_start`.
    entry: Option<EntryFn>,
    id: TaskId,
    /// The message handed to whoever next resumes this context -- the
    /// request or indication a switch delivers, read back out once control
    /// actually returns here. Kept in the `Context` rather than threaded
    /// through a register, since the resuming side of a switch has no
    /// guaranteed register state to read it from otherwise.
    pending: Option<NonNull<Message>>,
}

impl Context {
    pub const fn root() -> Self {
        Context {
            r4_r11: [0; 8],
            sp: 0,
            stack_top: 0,
            entry: None,
            id: TaskId::ROOT,
            pending: None,
        }
    }

    pub const fn new(id: TaskId, entry: EntryFn, stack_top: u32) -> Self {
        Context {
            r4_r11: [0; 8],
            sp: 0,
            stack_top,
            entry: Some(entry),
            id,
            pending: None,
        }
    }
}

/// The exact shape `context_switch_asm`'s `pop {r4-r11, pc}` expects to find
/// at the top of a freshly started task's stack.
#[repr(C)]
struct InitialFrame {
    r4_r11: [u32; 8],
    pc: unsafe extern "C" fn() -> !,
}

/// Starts `target` fresh: synthesizes an initial stack frame that, once
/// switched to, calls `target`'s entry function with `req` and falls into
/// [`trampoline`] when it returns. Saves `self_ctx`'s registers and does not
/// return to the caller until something switches back to `self_ctx`.
///
/// # Safety
/// `target`'s stack region (`[_, target.stack_top)`) must be valid, task-
/// exclusive memory, and `target` must not already have a live activation.
/// `self_ctx` and `target` must not be the same context.
pub unsafe fn context_start(
    self_ctx: &'static Context,
    target: &'static Context,
    req: Option<NonNull<Message>>,
) -> Option<NonNull<Message>> {
    // Every switch runs on the single cooperative thread of control
    // (`spec.md` §5); the raw pointer casts below just give the asm
    // trampoline a stable address to write through, the same role `&mut`
    // would play if two live contexts could ever be borrowed at once.
    let target_mut = target as *const Context as *mut Context;

    // Lay the initial frame at the top of the task's stack, below the
    // 8-byte-aligned initial SP, matching AAPCS stack discipline.
    let frame_addr = (target.stack_top as usize - core::mem::size_of::<InitialFrame>()) & !0x7;
    unsafe {
        (frame_addr as *mut InitialFrame).write(InitialFrame {
            r4_r11: [0; 8],
            pc: trampoline,
        });
        (*target_mut).sp = frame_addr as u32;
        (*target_mut).pending = req;
    }
    ACTIVE.store(target_mut, Ordering::Relaxed);

    let self_mut = self_ctx as *const Context as *mut Context;
    unsafe { context_switch_asm(self_mut, target_mut) };
    unsafe { (*self_mut).pending.take() }
}

/// Resumes `target`, which is already started and parked mid-execution
/// (`spec.md` §4.4: a *resume*, not a *start*). Saves `self_ctx` and does
/// not return until something switches back to it.
///
/// # Safety
/// `target` must have a previously-saved, still-valid `sp`.
pub unsafe fn context_switch(
    self_ctx: &'static Context,
    target: &'static Context,
    ind: Option<NonNull<Message>>,
) -> Option<NonNull<Message>> {
    let target_mut = target as *const Context as *mut Context;
    let self_mut = self_ctx as *const Context as *mut Context;
    unsafe {
        (*target_mut).pending = ind;
    }
    ACTIVE.store(target_mut, Ordering::Relaxed);
    unsafe { context_switch_asm(self_mut, target_mut) };
    unsafe { (*self_mut).pending.take() }
}

/// Switches to `target` without saving the caller's registers: used from
/// inside the dying task's own trampoline, which has no state worth
/// preserving (`spec.md` §4.5).
///
/// # Safety
/// Same as [`context_switch`], and must only be called from the trampoline.
pub unsafe fn context_switch2(target: &'static Context, ind: Option<NonNull<Message>>) -> ! {
    let target_mut = target as *const Context as *mut Context;
    unsafe {
        (*target_mut).pending = ind;
    }
    ACTIVE.store(target_mut, Ordering::Relaxed);
    unsafe { context_load_asm(target_mut) }
}

/// Points at whichever `Context` last received control, so the trampoline
/// (which has no argument register available coming out of the naked
/// switch) can find its own identity and entry function.
static ACTIVE: AtomicPtr<Context> = AtomicPtr::new(core::ptr::null_mut());

/// Lands here after a fresh `context_start` switches in for the first time.
/// Calls the task's entry function, then feeds its reply into
/// `task_ending_handler`, which picks the next thing to run and switches to
/// it directly -- this never returns.
unsafe extern "C" fn trampoline() -> ! {
    let active = unsafe { &mut *ACTIVE.load(Ordering::Relaxed) };
    let req = active.pending.take();
    let reply = (active.entry.expect("trampoline requires an entry fn"))(req);
    crate::executive::task_ending_handler(active.id, reply);
    unreachable!("task_ending_handler must switch away and never return")
}

extern "C" {
    /// Saves `r4-r11`/`sp` of the current context into `self_ctx`, loads
    /// them from `target`, and branches to whatever `target.sp` points at.
    /// Returns once some later switch resumes `self_ctx`.
    fn context_switch_asm(self_ctx: *mut Context, target: *mut Context);

    /// Loads `target`'s saved `r4-r11`/`sp` without saving anything first.
    fn context_load_asm(target: *mut Context) -> !;
}

global_asm! {
    ".section .text.context_switch_asm",
    ".global context_switch_asm",
    ".type context_switch_asm,%function",
    ".thumb_func",
    "context_switch_asm:",
    "  push {{r4-r11, lr}}",
    "  str sp, [r0, #32]",   // self_ctx.sp (offset of the `sp` field)
    "  ldr sp, [r1, #32]",   // target.sp
    "  pop {{r4-r11, pc}}",
}

global_asm! {
    ".section .text.context_load_asm",
    ".global context_load_asm",
    ".type context_load_asm,%function",
    ".thumb_func",
    "context_load_asm:",
    "  ldr sp, [r0, #32]",
    "  pop {{r4-r11, pc}}",
}
