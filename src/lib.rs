//! Fixed-capacity allocators over a single byte arena.
//!
//! Three strategies are provided, each owning one arena reserved once at
//! construction and never resized:
//!
//! - [`LinearAllocator`]: bump allocation, bulk reset only.
//! - [`PoolAllocator`]: fixed-size blocks with O(1) allocate and release, plus
//!   [`TypedPoolAllocator`] sized from a type parameter.
//! - [`StackAllocator`]: LIFO frames with inline size headers.
//!
//! Allocations are addressed through [`Pointer`], an opaque `(arena, offset)`
//! handle. Reading and writing through it is `unsafe`: there are no bounds,
//! type or liveness checks and nothing is aligned. Allocators are plain
//! single-owner values mutated through `&mut self`; share one across threads
//! by wrapping it in a lock.

#![feature(allocator_api)]

extern crate alloc;

pub mod bitmap;
pub mod config;
pub mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod linear;
pub mod pointer;
pub mod pool;
mod region;
pub mod stack;

pub use config::{
  AllocatorConfig,
  AnyAllocator,
  Validation,
};
pub use error::{
  Error,
  Result,
};
pub use linear::LinearAllocator;
pub use pointer::{
  ArenaId,
  Pointer,
  TypedPointer,
};
pub use pool::{
  PoolAllocator,
  TypedPoolAllocator,
};
pub use stack::StackAllocator;

/// Capacity accounting shared by every allocator.
pub trait Arena {
  /// Size of the arena in bytes.
  fn capacity(&self) -> usize;

  /// Bytes currently handed out, including any bookkeeping stored inline.
  fn used(&self) -> usize;

  fn available(&self) -> usize {
    self.capacity().saturating_sub(self.used())
  }

  /// Releases every allocation at once. Previously issued pointers dangle.
  fn free(&mut self);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocators_move_between_threads() {
    let mut pool = PoolAllocator::new(8, 4).unwrap();
    let handle = std::thread::spawn(move || {
      pool.allocate().unwrap();
      pool
    });
    let pool = handle.join().unwrap();
    assert_eq!(pool.allocated_blocks(), 1);
  }

  #[test]
  fn shared_allocator_behind_a_lock() {
    let stack = std::sync::Mutex::new(StackAllocator::new(256).unwrap());
    std::thread::scope(|scope| {
      for _ in 0..4 {
        scope.spawn(|| {
          let mut stack = stack.lock().unwrap();
          let frame = stack.allocate(16).unwrap();
          unsafe { frame.store(7u128) };
          assert_eq!(unsafe { frame.load::<u128>() }, 7);
          stack.deallocate(frame).unwrap();
        });
      }
    });
    assert_eq!(stack.lock().unwrap().used(), 0);
  }

  #[test]
  fn allocators_coexist_independently() {
    let mut a = LinearAllocator::new(8).unwrap();
    let mut b = LinearAllocator::new(8).unwrap();
    let pa = a.allocate(8).unwrap();
    let pb = b.allocate(8).unwrap();
    assert_ne!(pa.arena(), pb.arena());
    a.free();
    assert_eq!(b.used(), 8);
  }
}
