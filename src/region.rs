//! The fixed byte arena shared by every allocator.

extern crate alloc;

use alloc::alloc::{
  Allocator,
  Global,
  Layout,
};
use core::ptr::NonNull;

use getset::CopyGetters;
use tracing::debug;

use crate::{
  error::{
    Error,
    Result,
  },
  pointer::{
    ArenaId,
    Pointer,
  },
};

/// A zeroed, never resized byte buffer obtained once from `A`.
#[derive(CopyGetters)]
pub(crate) struct Region<A: Allocator = Global> {
  allocator: A,
  base: NonNull<u8>,
  layout: Layout,
  #[getset(get_copy = "pub(crate)")]
  id: ArenaId,
  /// Bumped on every bulk reset so checked allocators can spot stale pointers.
  #[getset(get_copy = "pub(crate)")]
  epoch: u32,
}

impl<A: Allocator> Region<A> {
  pub(crate) fn try_new_in(allocator: A, capacity: usize) -> Result<Self> {
    debug_assert!(capacity > 0);

    let layout = Layout::array::<u8>(capacity).map_err(|_| Error::OutOfMemory)?;
    let raw = allocator
      .allocate_zeroed(layout)
      .map_err(|_| Error::OutOfMemory)?;
    let id = ArenaId::next();
    debug!(arena = id.get(), capacity, "arena reserved");

    Ok(Self {
      allocator,
      base: raw.cast::<u8>(),
      layout,
      id,
      epoch: 0,
    })
  }

  pub(crate) fn capacity(&self) -> usize {
    self.layout.size()
  }

  pub(crate) fn allocator(&self) -> &A {
    &self.allocator
  }

  /// Issues a pointer `offset` bytes into the arena.
  ///
  /// The address is computed with wrapping arithmetic so an offset outside
  /// the arena yields a pointer that is only invalid to dereference.
  pub(crate) fn pointer_at(&self, offset: usize) -> Pointer {
    let addr = self.base.as_ptr().wrapping_add(offset);
    Pointer::new(addr, self.id, self.epoch, offset)
  }

  pub(crate) fn advance_epoch(&mut self) {
    self.epoch = self.epoch.wrapping_add(1);
  }

  /// Writes a `u32` at `offset` without alignment requirements.
  ///
  /// Panics if the four bytes fall outside the arena.
  pub(crate) fn write_u32(&mut self, offset: usize, value: u32) {
    assert!(offset + size_of::<u32>() <= self.capacity());
    // SAFETY: the bytes lie inside the arena we own
    unsafe { self.pointer_at(offset).store(value) }
  }

  pub(crate) fn read_u32(&self, offset: usize) -> u32 {
    assert!(offset + size_of::<u32>() <= self.capacity());
    // SAFETY: the bytes lie inside the arena we own and are always initialised
    unsafe { self.pointer_at(offset).load() }
  }
}

impl<A: Allocator> Drop for Region<A> {
  fn drop(&mut self) {
    // SAFETY: base was allocated by this allocator with this layout
    unsafe { self.allocator.deallocate(self.base, self.layout) };
  }
}

// SAFETY: the region owns its buffer exclusively; moving it moves the owner.
unsafe impl<A: Allocator + Send> Send for Region<A> {}
// SAFETY: shared access never writes to the buffer.
unsafe impl<A: Allocator + Sync> Sync for Region<A> {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn region_is_zeroed() {
    let region = Region::try_new_in(Global, 32).unwrap();
    assert_eq!(region.capacity(), 32);
    for offset in (0..32).step_by(4) {
      assert_eq!(region.read_u32(offset), 0);
    }
  }

  #[test]
  fn headers_round_trip_at_odd_offsets() {
    let mut region = Region::try_new_in(Global, 16).unwrap();
    region.write_u32(5, 1234);
    assert_eq!(region.read_u32(5), 1234);
  }

  #[test]
  fn pointers_carry_identity_and_epoch() {
    let mut region = Region::try_new_in(Global, 8).unwrap();
    let before = region.pointer_at(4);
    region.advance_epoch();
    let after = region.pointer_at(4);

    assert_eq!(before.arena(), region.id());
    assert_eq!(before.offset(), 4);
    assert_eq!(before.as_ptr(), after.as_ptr());
    assert_ne!(before.epoch(), after.epoch());
  }

  #[test]
  fn oversized_region_is_out_of_memory() {
    let result = Region::try_new_in(Global, usize::MAX);
    assert_eq!(result.err(), Some(Error::OutOfMemory));
  }
}
