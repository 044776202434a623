// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The message object and its intrusive FIFO queue, per `spec.md` §4.2/§4.3.

use core::ptr::NonNull;

use abi::{MessageId, Param, TaskId};

/// The shape of a task's entry point, per `spec.md` §4.5/§9: it receives the
/// message that started or last resumed it (`None` only happens when
/// `kern::arch` resumes the root, which has no entry function at all) and
/// returns the reply/indication to deliver when it finishes, if any.
///
/// Plumbing this reply as an explicit return value, rather than through an
/// implicit hardware register the way a bare trampoline would, is a
/// deliberate simplification over the contract this crate's arch backends
/// implement: it keeps `task_ending_handler` a plain function call with a
/// real parameter instead of an asm-level calling convention both backends
/// would otherwise have to agree on by hand.
pub type EntryFn = fn(Option<NonNull<Message>>) -> Option<NonNull<Message>>;

/// A message allocated from the executive heap.
///
/// `next` is the link slot used while the message sits in a queue; it must
/// be `None` whenever the message is not enqueued (I4). `calling` names the
/// sender for requests (used to resume it when the receiver returns) and is
/// `None` for async starts and for indications.
#[derive(Debug)]
#[repr(C)]
pub struct Message {
    pub next: Option<NonNull<Message>>,
    pub calling: Option<TaskId>,
    pub id: MessageId,
    pub param: Param,
}

impl Message {
    /// Writes a fresh message into heap-allocated storage at `slot`.
    ///
    /// # Safety
    /// `slot` must point at writable memory sized and aligned for `Message`,
    /// such as the pointer just returned by `Heap::alloc`.
    pub unsafe fn init(
        slot: NonNull<u8>,
        id: MessageId,
        param: Param,
        calling: Option<TaskId>,
    ) -> NonNull<Message> {
        let slot = slot.cast::<Message>();
        unsafe {
            slot.as_ptr().write(Message {
                next: None,
                calling,
                id,
                param,
            });
        }
        slot
    }
}

/// An intrusive, singly-linked FIFO of messages, threaded through
/// [`Message::next`].
///
/// There is deliberately no tail pointer (`spec.md` §4.3): enqueue is
/// worst-case O(n), which is fine given the shallow queue depths this
/// executive expects and the fact that the scheduler already has to scan the
/// task table on every selection.
#[derive(Debug, Default)]
pub struct MessageQueue {
    head: Option<NonNull<Message>>,
}

impl MessageQueue {
    pub const fn new() -> Self {
        MessageQueue { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Appends `msg` to the tail of the queue.
    ///
    /// # Safety
    /// `msg` must not already be linked into any queue (I4), and must stay
    /// valid until it is dequeued.
    pub unsafe fn enqueue(&mut self, mut msg: NonNull<Message>) {
        unsafe {
            msg.as_mut().next = None;
        }
        match self.head {
            None => self.head = Some(msg),
            Some(head) => {
                let mut cursor = head;
                while let Some(next) = unsafe { cursor.as_ref() }.next {
                    cursor = next;
                }
                unsafe {
                    cursor.as_mut().next = Some(msg);
                }
            }
        }
    }

    /// Pops the head message, if any.
    pub fn dequeue(&mut self) -> Option<NonNull<Message>> {
        let mut head = self.head?;
        let next = unsafe { head.as_ref() }.next;
        self.head = next;
        unsafe {
            head.as_mut().next = None;
        }
        Some(head)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(node) = cursor {
            count += 1;
            cursor = unsafe { node.as_ref() }.next;
        }
        count
    }
}
