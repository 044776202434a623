//! Ring buffer for debugging the executive core.
//!
//! This is a static ring buffer designed to be used to instrument arbitrary
//! contexts inside `kerncore` and `kern` without competing with the message
//! heap for allocations: every entry lives in a fixed-size static array, so
//! recording a trace event never calls into the allocator it might be
//! describing.
//!
//! ## Constraints
//!
//! The type in the ring buffer must implement both `Copy` and `PartialEq`.
//!
//! If you use the variant of the `ringbuf!` macro that leaves the name of the
//! buffer implicit, you can only have one per module. (You can lift this
//! constraint by providing a name.)
//!
//! ## Creating a ring buffer
//!
//! ```
//! ringbuf::ringbuf!(u32, 16, 0);
//! ```
//!
//! Entries are appended with `ringbuf_entry!`:
//!
//! ```
//! # ringbuf::ringbuf!(u32, 16, 0);
//! ringbuf::ringbuf_entry!(42);
//! ```

#![no_std]

use core::cell::UnsafeCell;

/// A minimal `Sync` wrapper around `UnsafeCell`, used only for statics that
/// are never accessed concurrently (true here: the executive is single-CPU
/// cooperative, so ring buffer writes never race).
#[repr(transparent)]
pub struct StaticCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for StaticCell<T> {}

impl<T> StaticCell<T> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// # Safety
    /// The caller must not alias this reference with another live reference
    /// to the same cell. On this executive that means: don't call this from
    /// an interrupt (there are none that touch executive state, see
    /// `spec.md` §5).
    #[allow(clippy::mut_from_ref)]
    pub fn borrow_mut(cell: &Self) -> &mut T {
        unsafe { &mut *cell.0.get() }
    }
}

/// Declares a ring buffer in the current module or context.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a ring buffer named `NAME`,
/// containing entries of type `Type`, with room for `N` such entries, all of
/// which are initialized to `expr`.
///
/// The resulting ring buffer is static, so `NAME` should be uppercase.
///
/// To support the common case of one ring buffer per module, if you omit the
/// name it defaults to `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::StaticCell<$crate::Ringbuf<$t, $n>> =
            $crate::StaticCell::new($crate::Ringbuf {
                last: None,
                buffer: [$crate::RingbufEntry {
                    line: 0,
                    generation: 0,
                    count: 0,
                    payload: $init,
                }; $n],
            });
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {};
    ($t:ty, $n:expr, $init:expr) => {};
}

/// Inserts data into a named ring buffer (declared with the `ringbuf!`
/// macro).
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let (p, buf) = ($payload, &$buf);
        $crate::Ringbuf::entry(&mut *$crate::StaticCell::borrow_mut(buf), line!() as u16, p);
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {};
    ($payload:expr) => {};
}

/// A single ring buffer entry, carrying a payload of arbitrary type.
///
/// When an entry is generated with an identical payload to the most recent
/// entry (same `line` and `payload`), `count` is incremented instead of a new
/// entry being pushed.
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

/// A ring buffer of parametrized type and size. Instantiate it via the
/// [`ringbuf!`] macro rather than directly.
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, { N }> {
    pub fn entry(&mut self, line: u16, payload: T) {
        let ndx = match self.last {
            None => 0,
            Some(last) => {
                let ent = &mut self.buffer[last];
                if ent.line == line && ent.payload == payload {
                    if let Some(new_count) = ent.count.checked_add(1) {
                        ent.count = new_count;
                        return;
                    }
                }
                if last + 1 >= self.buffer.len() {
                    0
                } else {
                    last + 1
                }
            }
        };

        let ent = &mut self.buffer[ndx];
        ent.line = line;
        ent.payload = payload;
        ent.count = 1;
        ent.generation = ent.generation.wrapping_add(1);

        self.last = Some(ndx);
    }

    /// Drains the buffer in oldest-to-newest order. Intended for test
    /// assertions; on target, Humility/GDB read the static directly instead.
    pub fn iter(&self) -> impl Iterator<Item = &RingbufEntry<T>> {
        let start = match self.last {
            None => 0,
            Some(last) => (last + 1) % self.buffer.len(),
        };
        let (tail, head) = self.buffer.split_at(start);
        head.iter().chain(tail.iter()).filter(|e| e.generation != 0)
    }
}
