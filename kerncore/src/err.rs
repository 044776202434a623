// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contract violations.
//!
//! `spec.md` §7 splits failures into contract violations (programmer error,
//! abort) and resource exhaustion (also fatal, folded into the same path).
//! There is no recoverable error channel here: nothing in this crate returns
//! `Result`. A `Fault` is raised, `fail()` is called, and execution does not
//! continue past that point.

/// A contract violation detected by an assertion inside the executive core.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Fault {
    /// `mem_alloc` could not find a free block large enough.
    HeapExhausted,
    /// A header's magic word didn't match `FREE` or `USED` as expected:
    /// double free, free of a non-heap pointer, or free-list corruption.
    HeapCorrupt,
    /// A task id named in an API call is out of the `1..=TASK_CNT` range.
    TaskIdOutOfRange,
    /// `task_asynch` or a first request tried to start an already-started
    /// task.
    AlreadyStarted,
    /// An operation reserved for the root task was invoked by a non-root
    /// task, or vice versa.
    WrongCaller,
    /// The scheduler's selection scan reached a state the state machine says
    /// is unreachable (e.g. the root found itself blocked).
    ImpossibleScanState,
    /// The ending handler tried to resume the root task as a blocked sender.
    RootCannotBlock,
    /// A `calling` back-reference pointed at a descriptor that was not
    /// actually `blocked && started` (I5 violated).
    InconsistentCallingState,
}

/// Raises `f` as a fatal fault.
///
/// This just panics: on target, the application links a `#[panic_handler]`
/// (as every `no_std` binary must) that resets the board, mirroring the
/// teacher's `arch::reset`; in host/test builds the standard panic handler
/// turns this into a test failure, so a violated invariant is caught rather
/// than silently corrupting state.
pub fn fail(f: Fault) -> ! {
    panic!("executive contract violation: {f:?}");
}
