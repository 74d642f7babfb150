extern crate alloc;

use alloc::alloc::{
  Allocator,
  Global,
};

use crate::{
  Arena,
  config::Validation,
  error::{
    Error,
    Result,
  },
  pointer::TypedPointer,
  pool::PoolAllocator,
};

/// A [`PoolAllocator`] whose block size is `size_of::<T>()`.
///
/// Values are moved into the pool bitwise. Their destructors are never run,
/// neither on [`TypedPoolAllocator::deallocate`] nor when the pool is dropped.
pub struct TypedPoolAllocator<T, A: Allocator = Global> {
  pool: PoolAllocator<A>,
  _marker: core::marker::PhantomData<fn() -> T>,
}

impl<T> TypedPoolAllocator<T, Global> {
  pub fn new(block_count: usize) -> Result<Self> {
    Self::new_in(Global, block_count)
  }
}

impl<T, A: Allocator> TypedPoolAllocator<T, A> {
  /// Zero-sized `T` is rejected with `NegativeBlockMetric`.
  pub fn new_in(allocator: A, block_count: usize) -> Result<Self> {
    Ok(Self {
      pool: PoolAllocator::new_in(allocator, size_of::<T>(), block_count)?,
      _marker: core::marker::PhantomData,
    })
  }

  pub fn with_validation(self, validation: Validation) -> Result<Self>
  where
    A: Clone,
  {
    Ok(Self {
      pool: self.pool.with_validation(validation)?,
      _marker: core::marker::PhantomData,
    })
  }

  pub fn allocate(&mut self) -> Result<TypedPointer<T>> {
    Ok(self.pool.allocate()?.cast())
  }

  /// Allocates a block and moves `value` into it.
  ///
  /// If the free stack hands out a block that does not lie inside this
  /// pool's arena, because an unchecked `deallocate` accepted a foreign
  /// pointer, that entry is discarded, nothing is written and the call fails
  /// with `InvalidPointer`.
  pub fn alloc(&mut self, value: T) -> Result<TypedPointer<T>> {
    let pointer = self.pool.allocate()?;
    if !self.pool.spans_block(&pointer) {
      return Err(Error::InvalidPointer);
    }

    let pointer = pointer.cast::<T>();
    // SAFETY: a whole block of size_of::<T>() bytes inside our arena
    unsafe { pointer.store(value) };
    Ok(pointer)
  }

  pub fn deallocate(&mut self, pointer: TypedPointer<T>) -> Result<()> {
    self.pool.deallocate(pointer.pointer())
  }

  pub fn free(&mut self) {
    self.pool.free();
  }

  pub fn block_count(&self) -> usize {
    self.pool.block_count()
  }

  pub fn free_blocks(&self) -> usize {
    self.pool.free_blocks()
  }

  pub fn as_untyped(&self) -> &PoolAllocator<A> {
    &self.pool
  }
}

impl<T, A: Allocator> Arena for TypedPoolAllocator<T, A> {
  fn capacity(&self) -> usize {
    self.pool.capacity()
  }

  fn used(&self) -> usize {
    self.pool.used()
  }

  fn free(&mut self) {
    self.pool.free();
  }
}
