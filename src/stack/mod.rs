//! LIFO allocator with inline size headers.
//!
//! Every payload is preceded by a [`HEADER_SIZE`]-byte header recording its
//! length, so [`StackAllocator::deallocate`] can pop a frame given nothing
//! but the payload pointer. Frames must be released in reverse allocation
//! order. An unchecked allocator cannot tell when that rule is broken: it
//! reads whatever header precedes the pointer and shrinks the high-water mark
//! by the wrong amount.

extern crate alloc;

use alloc::alloc::{
  Allocator,
  Global,
};

use getset::CopyGetters;
use tracing::{
  debug,
  trace,
};

use crate::{
  Arena,
  config::Validation,
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

/// Width of the length header written before each payload.
pub const HEADER_SIZE: usize = size_of::<u32>();

#[derive(CopyGetters)]
pub struct StackAllocator<A: Allocator = Global> {
  region: Region<A>,
  used: usize,
  #[getset(get_copy = "pub")]
  validation: Validation,
}

impl StackAllocator<Global> {
  pub fn new(capacity: usize) -> Result<Self> {
    Self::new_in(Global, capacity)
  }
}

impl<A: Allocator> StackAllocator<A> {
  pub fn new_in(allocator: A, capacity: usize) -> Result<Self> {
    if capacity == 0 {
      return Err(Error::InvalidCapacity);
    }

    let region = Region::try_new_in(allocator, capacity)?;
    debug!(arena = region.id().get(), capacity, "stack allocator created");
    Ok(Self {
      region,
      used: 0,
      validation: Validation::Unchecked,
    })
  }

  pub fn with_validation(mut self, validation: Validation) -> Self {
    self.validation = validation;
    self
  }

  pub fn capacity(&self) -> usize {
    self.region.capacity()
  }

  /// Bytes in use, headers included.
  pub fn used(&self) -> usize {
    self.used
  }

  pub fn available(&self) -> usize {
    self.capacity().saturating_sub(self.used)
  }

  /// Pushes a frame of `size` payload bytes.
  pub fn allocate(&mut self, size: usize) -> Result<Pointer> {
    if size == 0 {
      return Err(Error::NegativeElemSize);
    }

    // TODO: widen the header to usize to lift the 4 GiB frame limit
    let header = u32::try_from(size).map_err(|_| Error::OutOfMemory)?;

    let start = self.used;
    let end = start
      .checked_add(HEADER_SIZE)
      .and_then(|payload| payload.checked_add(size))
      .filter(|&end| end <= self.capacity())
      .ok_or(Error::OutOfMemory)?;

    self.region.write_u32(start, header);
    self.used = end;

    let payload = start + HEADER_SIZE;
    trace!(offset = payload, size, "stack allocate");
    Ok(self.region.pointer_at(payload))
  }

  /// Allocates `size_of::<T>()` bytes and moves `value` into them.
  pub fn alloc<T>(&mut self, value: T) -> Result<TypedPointer<T>> {
    let pointer = self.allocate(size_of::<T>())?.cast::<T>();
    // SAFETY: freshly reserved, in bounds and exactly size_of::<T>() long
    unsafe { pointer.store(value) };
    Ok(pointer)
  }

  /// Pops the frame whose payload starts at `pointer`.
  ///
  /// `pointer` must be the most recent allocation that has not been popped.
  /// The header is read from this allocator's own arena at
  /// `pointer.offset() - HEADER_SIZE`; offsets with no room for a header
  /// inside the arena are rejected as `InvalidPointer`. Any other pointer is
  /// accepted by an unchecked allocator and leaves the high-water mark
  /// inconsistent, clamped at zero.
  pub fn deallocate(&mut self, pointer: Pointer) -> Result<()> {
    if pointer.is_null() {
      return Err(Error::InvalidPointer);
    }

    let offset = pointer.offset();
    if offset < HEADER_SIZE || offset > self.capacity() {
      return Err(Error::InvalidPointer);
    }

    let size = self.region.read_u32(offset - HEADER_SIZE) as usize;
    if self.validation == Validation::Checked {
      if let Err(err) = self.check_top(&pointer, size) {
        debug!(offset, %err, "stack rejected pointer");
        return Err(err);
      }
    }

    self.used = self.used.saturating_sub(HEADER_SIZE).saturating_sub(size);
    trace!(offset, size, "stack deallocate");
    Ok(())
  }

  fn check_top(&self, pointer: &Pointer, size: usize) -> Result<()> {
    if pointer.arena() != self.region.id() {
      return Err(Error::ForeignPointer);
    }
    if pointer.epoch() != self.region.epoch() {
      return Err(Error::StalePointer);
    }
    if pointer.offset().checked_add(size) != Some(self.used) {
      return Err(Error::OutOfOrder);
    }
    Ok(())
  }

  /// Pops every frame at once. Every pointer issued so far dangles.
  pub fn free(&mut self) {
    self.used = 0;
    self.region.advance_epoch();
    debug!(arena = self.region.id().get(), "stack allocator reset");
  }
}

impl<A: Allocator> Arena for StackAllocator<A> {
  fn capacity(&self) -> usize {
    StackAllocator::capacity(self)
  }

  fn used(&self) -> usize {
    self.used
  }

  fn free(&mut self) {
    StackAllocator::free(self)
  }
}

#[cfg(test)]
mod tests;
