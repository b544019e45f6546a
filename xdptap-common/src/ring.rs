//! Reserve/submit/discard contract of the shared ring buffer.
//!
//! The buffer itself (allocation, multi-producer synchronization, space
//! reclamation) belongs to the host. The filter only needs to claim a
//! `RECORD_LEN` slot without blocking and to release it exactly once.

use core::mem::MaybeUninit;

use crate::frame::ReadFault;
use crate::RECORD_LEN;

/// A reserved, not yet published region of the ring buffer.
pub trait RecordSlot {
    /// The reserved bytes. Their contents are unspecified until written.
    fn bytes_mut(&mut self) -> &mut MaybeUninit<[u8; RECORD_LEN]>;

    /// Publishes the slot to the consumer, in reservation order.
    fn submit(self);

    /// Releases the slot without exposing its contents.
    fn discard(self);
}

pub trait RingBuffer {
    type Slot: RecordSlot;

    /// Claims `RECORD_LEN` bytes. Never blocks; `None` when there is no room.
    fn reserve(&self) -> Option<Self::Slot>;

    /// Reserves a slot wrapped in a [`Staged`] guard.
    #[inline(always)]
    fn stage(&self) -> Option<Staged<Self::Slot>> {
        self.reserve().map(Staged::new)
    }
}

/// Owns a reserved slot until it is submitted or discarded.
///
/// A `Staged` that goes out of scope without [`Staged::submit`] discards its
/// slot, so every exit path releases the reservation exactly once.
pub struct Staged<S: RecordSlot> {
    slot: Option<S>,
}

impl<S: RecordSlot> Staged<S> {
    pub fn new(slot: S) -> Self {
        Self { slot: Some(slot) }
    }

    /// Runs `fill` against the record bytes, viewed byte by byte.
    #[inline(always)]
    pub fn write_with<F>(&mut self, fill: F) -> Result<(), ReadFault>
    where
        F: FnOnce(&mut [MaybeUninit<u8>]) -> Result<(), ReadFault>,
    {
        match self.slot.as_mut() {
            Some(slot) => fill(as_byte_slots(slot.bytes_mut())),
            None => Err(ReadFault),
        }
    }

    #[inline(always)]
    pub fn submit(mut self) {
        if let Some(slot) = self.slot.take() {
            slot.submit();
        }
    }

    #[inline(always)]
    pub fn discard(mut self) {
        if let Some(slot) = self.slot.take() {
            slot.discard();
        }
    }
}

#[inline(always)]
fn as_byte_slots(record: &mut MaybeUninit<[u8; RECORD_LEN]>) -> &mut [MaybeUninit<u8>] {
    // SAFETY: `MaybeUninit<[u8; N]>` and `[MaybeUninit<u8>; N]` share size and
    // alignment, and any byte may be left uninitialized in either.
    unsafe { core::slice::from_raw_parts_mut(record.as_mut_ptr().cast(), RECORD_LEN) }
}

impl<S: RecordSlot> Drop for Staged<S> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.discard();
        }
    }
}
