//! Fixed-size block allocator.
//!
//! The arena is carved into `block_count` blocks of `block_size` bytes. Free
//! blocks are kept on an explicit stack of offsets so allocation and release
//! are both O(1) and the order blocks are handed out in is deterministic: a
//! fresh pool walks the arena from the front and a released block is the next
//! one to be reused.
//!
//! By default [`PoolAllocator::deallocate`] trusts its argument completely.
//! Releasing a block twice puts it on the free stack twice and two later
//! allocations will alias. Run the pool with [`Validation::Checked`] to have
//! such pointers rejected instead.

extern crate alloc;

use alloc::{
  alloc::{
    Allocator,
    Global,
  },
  vec::Vec,
};

use getset::CopyGetters;
use tracing::{
  debug,
  trace,
};

use crate::{
  Arena,
  bitmap::Bitmap,
  config::Validation,
  error::{
    Error,
    Result,
  },
  pointer::Pointer,
  region::Region,
};

pub mod typed;

pub use typed::TypedPoolAllocator;

#[derive(CopyGetters)]
pub struct PoolAllocator<A: Allocator = Global> {
  region: Region<A>,
  #[getset(get_copy = "pub")]
  block_size: usize,
  #[getset(get_copy = "pub")]
  block_count: usize,
  #[getset(get_copy = "pub")]
  validation: Validation,
  /// Offsets of free blocks, next to hand out on top.
  free: Vec<usize>,
  /// Blocks currently handed out. Only maintained when checked; its storage
  /// comes from the same allocator as the arena.
  allocated: Option<Bitmap<A>>,
}

impl PoolAllocator<Global> {
  pub fn new(block_size: usize, block_count: usize) -> Result<Self> {
    Self::new_in(Global, block_size, block_count)
  }
}

impl<A: Allocator> PoolAllocator<A> {
  pub fn new_in(allocator: A, block_size: usize, block_count: usize) -> Result<Self> {
    if block_size == 0 || block_count == 0 {
      return Err(Error::NegativeBlockMetric);
    }

    let capacity = block_size
      .checked_mul(block_count)
      .ok_or(Error::OutOfMemory)?;
    let region = Region::try_new_in(allocator, capacity)?;

    let mut free = Vec::new();
    free
      .try_reserve_exact(block_count)
      .map_err(|_| Error::OutOfMemory)?;

    let mut pool = Self {
      region,
      block_size,
      block_count,
      validation: Validation::Unchecked,
      free,
      allocated: None,
    };
    pool.reset_free_list();

    debug!(
      arena = pool.region.id().get(),
      block_size, block_count, "pool allocator created"
    );
    Ok(pool)
  }

  /// Switches the pointer checks performed by [`PoolAllocator::deallocate`].
  ///
  /// Blocks allocated before the switch are tracked correctly as long as the
  /// free stack has not already been corrupted. Free-stack entries that are
  /// not block starts inside this arena are left untracked, so a later
  /// release of such a pointer is rejected.
  pub fn with_validation(mut self, validation: Validation) -> Result<Self>
  where
    A: Clone,
  {
    self.allocated = match validation {
      Validation::Unchecked => None,
      Validation::Checked => {
        let allocator = self.region.allocator().clone();
        let mut bitmap =
          Bitmap::try_new_in(allocator, self.block_count).map_err(|_| Error::OutOfMemory)?;
        for index in 0..self.block_count {
          bitmap.set(index).map_err(|_| Error::InvalidPointer)?;
        }
        for &offset in &self.free {
          if let Some(index) = self.block_index(offset) {
            bitmap.clear(index).map_err(|_| Error::InvalidPointer)?;
          }
        }
        Some(bitmap)
      }
    };
    self.validation = validation;
    Ok(self)
  }

  pub fn capacity(&self) -> usize {
    self.region.capacity()
  }

  /// Number of blocks ready to be handed out.
  ///
  /// After an unchecked double free this can exceed the block count.
  pub fn free_blocks(&self) -> usize {
    self.free.len()
  }

  pub fn allocated_blocks(&self) -> usize {
    self.block_count.saturating_sub(self.free.len())
  }

  pub fn used(&self) -> usize {
    self.allocated_blocks() * self.block_size
  }

  /// Index of the block starting at `offset`, if it is one of ours.
  fn block_index(&self, offset: usize) -> Option<usize> {
    (offset < self.capacity() && offset % self.block_size == 0).then(|| offset / self.block_size)
  }

  /// Whether `pointer` names a whole block inside this pool's arena.
  ///
  /// Unchecked pools can hand out anything that was pushed onto the free
  /// stack, so callers that write through a freshly allocated pointer
  /// without `unsafe` must test it first.
  pub(crate) fn spans_block(&self, pointer: &Pointer) -> bool {
    pointer.arena() == self.region.id() && self.block_index(pointer.offset()).is_some()
  }

  /// Hands out one free block.
  pub fn allocate(&mut self) -> Result<Pointer> {
    let offset = self.free.pop().ok_or(Error::OutOfMemory)?;
    let index = self.block_index(offset);
    if let (Some(allocated), Some(index)) = (self.allocated.as_mut(), index) {
      allocated.set(index).map_err(|_| Error::InvalidPointer)?;
      debug_assert!(allocated.count_ones() <= self.block_count);
    }

    trace!(offset, "pool allocate");
    Ok(self.region.pointer_at(offset))
  }

  /// Returns the block behind `pointer` to the free stack.
  ///
  /// Unchecked pools only reject null pointers. Anything else is pushed as
  /// is, including pointers from other arenas, pointers into the middle of a
  /// block and blocks that are already free.
  pub fn deallocate(&mut self, pointer: Pointer) -> Result<()> {
    if pointer.is_null() {
      return Err(Error::InvalidPointer);
    }

    if self.validation == Validation::Checked {
      self.release_checked(&pointer)?;
    }

    self.free.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
    self.free.push(pointer.offset());
    trace!(offset = pointer.offset(), "pool deallocate");
    Ok(())
  }

  fn release_checked(&mut self, pointer: &Pointer) -> Result<()> {
    let verdict = self.check_owned(pointer);
    if let Err(err) = verdict {
      debug!(offset = pointer.offset(), %err, "pool rejected pointer");
      return Err(err);
    }

    let index = pointer.offset() / self.block_size;
    if let Some(allocated) = self.allocated.as_mut() {
      allocated.clear(index).map_err(|_| Error::InvalidPointer)?;
    }
    Ok(())
  }

  fn check_owned(&self, pointer: &Pointer) -> Result<()> {
    if pointer.arena() != self.region.id() {
      return Err(Error::ForeignPointer);
    }
    if pointer.epoch() != self.region.epoch() {
      return Err(Error::StalePointer);
    }

    let index = self
      .block_index(pointer.offset())
      .ok_or(Error::InvalidPointer)?;
    match self.allocated.as_ref().map(|allocated| allocated.get(index)) {
      Some(Ok(true)) => Ok(()),
      Some(Ok(false)) => Err(Error::DoubleFree),
      _ => Err(Error::InvalidPointer),
    }
  }

  /// Marks every block free again. Every pointer issued so far dangles.
  pub fn free(&mut self) {
    self.reset_free_list();
    self.region.advance_epoch();
    debug!(arena = self.region.id().get(), "pool allocator reset");
  }

  fn reset_free_list(&mut self) {
    let block_size = self.block_size;
    self.free.clear();
    self
      .free
      .extend((0..self.block_count).rev().map(|index| index * block_size));
    if let Some(allocated) = self.allocated.as_mut() {
      allocated.clear_all();
    }
  }
}

impl<A: Allocator> Arena for PoolAllocator<A> {
  fn capacity(&self) -> usize {
    PoolAllocator::capacity(self)
  }

  fn used(&self) -> usize {
    PoolAllocator::used(self)
  }

  fn free(&mut self) {
    PoolAllocator::free(self)
  }
}
