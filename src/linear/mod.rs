//! Bump allocator over a fixed byte arena.
//!
//! Allocation advances a high-water mark and never fails for any reason other
//! than a zero-sized request or running past the end of the arena. Memory is
//! only ever reclaimed in bulk with [`LinearAllocator::free`].

extern crate alloc;

use alloc::alloc::{
  Allocator,
  Global,
};

use tracing::{
  debug,
  trace,
};

use crate::{
  Arena,
  error::{
    Error,
    Result,
  },
  pointer::{
    Pointer,
    TypedPointer,
  },
  region::Region,
};

pub struct LinearAllocator<A: Allocator = Global> {
  region: Region<A>,
  used: usize,
}

impl LinearAllocator<Global> {
  pub fn new(capacity: usize) -> Result<Self> {
    Self::new_in(Global, capacity)
  }
}

impl<A: Allocator> LinearAllocator<A> {
  /// Reserves `capacity` bytes from `allocator`.
  pub fn new_in(allocator: A, capacity: usize) -> Result<Self> {
    if capacity == 0 {
      return Err(Error::InvalidCapacity);
    }

    let region = Region::try_new_in(allocator, capacity)?;
    debug!(arena = region.id().get(), capacity, "linear allocator created");
    Ok(Self { region, used: 0 })
  }

  pub fn capacity(&self) -> usize {
    self.region.capacity()
  }

  pub fn used(&self) -> usize {
    self.used
  }

  pub fn available(&self) -> usize {
    self.capacity() - self.used
  }

  /// Reserves the next `size` bytes of the arena.
  pub fn allocate(&mut self, size: usize) -> Result<Pointer> {
    if size == 0 {
      return Err(Error::NegativeElemSize);
    }

    let start = self.used;
    let end = start
      .checked_add(size)
      .filter(|&end| end <= self.capacity())
      .ok_or(Error::OutOfMemory)?;

    self.used = end;
    trace!(offset = start, size, "linear allocate");
    Ok(self.region.pointer_at(start))
  }

  /// Allocates `size_of::<T>()` bytes and moves `value` into them.
  pub fn alloc<T>(&mut self, value: T) -> Result<TypedPointer<T>> {
    let pointer = self.allocate(size_of::<T>())?.cast::<T>();
    // SAFETY: freshly reserved, in bounds and exactly size_of::<T>() long
    unsafe { pointer.store(value) };
    Ok(pointer)
  }

  /// Resets the high-water mark. Every pointer issued so far dangles.
  pub fn free(&mut self) {
    self.used = 0;
    self.region.advance_epoch();
    debug!(arena = self.region.id().get(), "linear allocator reset");
  }
}

impl<A: Allocator> Arena for LinearAllocator<A> {
  fn capacity(&self) -> usize {
    LinearAllocator::capacity(self)
  }

  fn used(&self) -> usize {
    self.used
  }

  fn free(&mut self) {
    LinearAllocator::free(self)
  }
}
