//! C ABI over the three allocators.
//!
//! Handles are opaque and owned by the caller between `*_new` and
//! `*_destroy`. Sizes are signed so that negative requests coming from C are
//! reported the same way zero-sized ones are. Every fallible call returns a
//! [`Status`] and writes its result through an out-parameter.

extern crate alloc;

use alloc::boxed::Box;

use crate::{
  config::Validation,
  error::Error,
  linear::LinearAllocator,
  pointer::Pointer,
  pool::PoolAllocator,
  stack::StackAllocator,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Ok = 0,
  InvalidCapacity,
  NegativeElemSize,
  OutOfMemory,
  NegativeBlockMetric,
  InvalidPointer,
  ForeignPointer,
  StalePointer,
  DoubleFree,
  OutOfOrder,
  Unsupported,
  /// A handle or out-parameter was null.
  NullArgument,
}

impl From<Error> for Status {
  fn from(err: Error) -> Self {
    match err {
      Error::InvalidCapacity => Status::InvalidCapacity,
      Error::NegativeElemSize => Status::NegativeElemSize,
      Error::OutOfMemory => Status::OutOfMemory,
      Error::NegativeBlockMetric => Status::NegativeBlockMetric,
      Error::InvalidPointer => Status::InvalidPointer,
      Error::ForeignPointer => Status::ForeignPointer,
      Error::StalePointer => Status::StalePointer,
      Error::DoubleFree => Status::DoubleFree,
      Error::OutOfOrder => Status::OutOfOrder,
      Error::Unsupported => Status::Unsupported,
    }
  }
}

impl<T> From<Result<T, Error>> for Status {
  fn from(result: Result<T, Error>) -> Self {
    match result {
      Ok(_) => Status::Ok,
      Err(err) => err.into(),
    }
  }
}

pub struct LinearArena(LinearAllocator);
pub struct PoolArena(PoolAllocator);
pub struct StackArena(StackAllocator);

fn positive(value: isize, err: Error) -> Result<usize, Error> {
  usize::try_from(value)
    .ok()
    .filter(|&value| value > 0)
    .ok_or(err)
}

/// Boxes `value` into `*out`.
///
/// # Safety
///
/// `out` must be null or valid for writes.
unsafe fn emit<T>(out: *mut *mut T, value: Result<T, Error>) -> Status {
  if out.is_null() {
    return Status::NullArgument;
  }
  match value {
    Ok(value) => {
      unsafe { out.write(Box::into_raw(Box::new(value))) };
      Status::Ok
    }
    Err(err) => err.into(),
  }
}

/// # Safety
///
/// `out` must be null or valid for writes.
unsafe fn emit_pointer(out: *mut Pointer, value: Result<Pointer, Error>) -> Status {
  if out.is_null() {
    return Status::NullArgument;
  }
  match value {
    Ok(pointer) => {
      unsafe { out.write(pointer) };
      Status::Ok
    }
    Err(err) => err.into(),
  }
}

fn validation(checked: bool) -> Validation {
  if checked {
    Validation::Checked
  } else {
    Validation::Unchecked
  }
}

/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn linear_arena_new(capacity: isize, out: *mut *mut LinearArena) -> Status {
  let arena = positive(capacity, Error::InvalidCapacity)
    .and_then(LinearAllocator::new)
    .map(LinearArena);
  unsafe { emit(out, arena) }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`linear_arena_new`]; `out`
/// must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn linear_arena_allocate(
  arena: *mut LinearArena,
  size: isize,
  out: *mut Pointer,
) -> Status {
  let Some(arena) = (unsafe { arena.as_mut() }) else {
    return Status::NullArgument;
  };
  let pointer = positive(size, Error::NegativeElemSize).and_then(|size| arena.0.allocate(size));
  unsafe { emit_pointer(out, pointer) }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`linear_arena_new`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn linear_arena_used(arena: *const LinearArena) -> usize {
  unsafe { arena.as_ref() }.map_or(0, |arena| arena.0.used())
}

/// # Safety
///
/// `arena` must be null or a live handle from [`linear_arena_new`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn linear_arena_free(arena: *mut LinearArena) {
  if let Some(arena) = unsafe { arena.as_mut() } {
    arena.0.free();
  }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`linear_arena_new`]. It is
/// invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn linear_arena_destroy(arena: *mut LinearArena) {
  if !arena.is_null() {
    drop(unsafe { Box::from_raw(arena) });
  }
}

/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pool_arena_new(
  block_size: isize,
  block_count: isize,
  checked: bool,
  out: *mut *mut PoolArena,
) -> Status {
  let arena = positive(block_size, Error::NegativeBlockMetric)
    .and_then(|size| Ok((size, positive(block_count, Error::NegativeBlockMetric)?)))
    .and_then(|(size, count)| PoolAllocator::new(size, count))
    .and_then(|pool| pool.with_validation(validation(checked)))
    .map(PoolArena);
  unsafe { emit(out, arena) }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`pool_arena_new`]; `out` must
/// be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pool_arena_allocate(arena: *mut PoolArena, out: *mut Pointer) -> Status {
  let Some(arena) = (unsafe { arena.as_mut() }) else {
    return Status::NullArgument;
  };
  unsafe { emit_pointer(out, arena.0.allocate()) }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`pool_arena_new`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pool_arena_deallocate(arena: *mut PoolArena, pointer: Pointer) -> Status {
  match unsafe { arena.as_mut() } {
    Some(arena) => arena.0.deallocate(pointer).into(),
    None => Status::NullArgument,
  }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`pool_arena_new`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pool_arena_used(arena: *const PoolArena) -> usize {
  unsafe { arena.as_ref() }.map_or(0, |arena| arena.0.used())
}

/// # Safety
///
/// `arena` must be null or a live handle from [`pool_arena_new`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pool_arena_free(arena: *mut PoolArena) {
  if let Some(arena) = unsafe { arena.as_mut() } {
    arena.0.free();
  }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`pool_arena_new`]. It is
/// invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pool_arena_destroy(arena: *mut PoolArena) {
  if !arena.is_null() {
    drop(unsafe { Box::from_raw(arena) });
  }
}

/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stack_arena_new(
  capacity: isize,
  checked: bool,
  out: *mut *mut StackArena,
) -> Status {
  let arena = positive(capacity, Error::InvalidCapacity)
    .and_then(StackAllocator::new)
    .map(|stack| StackArena(stack.with_validation(validation(checked))));
  unsafe { emit(out, arena) }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`stack_arena_new`]; `out`
/// must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stack_arena_allocate(
  arena: *mut StackArena,
  size: isize,
  out: *mut Pointer,
) -> Status {
  let Some(arena) = (unsafe { arena.as_mut() }) else {
    return Status::NullArgument;
  };
  let pointer = positive(size, Error::NegativeElemSize).and_then(|size| arena.0.allocate(size));
  unsafe { emit_pointer(out, pointer) }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`stack_arena_new`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stack_arena_deallocate(
  arena: *mut StackArena,
  pointer: Pointer,
) -> Status {
  match unsafe { arena.as_mut() } {
    Some(arena) => arena.0.deallocate(pointer).into(),
    None => Status::NullArgument,
  }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`stack_arena_new`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stack_arena_used(arena: *const StackArena) -> usize {
  unsafe { arena.as_ref() }.map_or(0, |arena| arena.0.used())
}

/// # Safety
///
/// `arena` must be null or a live handle from [`stack_arena_new`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stack_arena_free(arena: *mut StackArena) {
  if let Some(arena) = unsafe { arena.as_mut() } {
    arena.0.free();
  }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`stack_arena_new`]. It is
/// invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stack_arena_destroy(arena: *mut StackArena) {
  if !arena.is_null() {
    drop(unsafe { Box::from_raw(arena) });
  }
}

#[unsafe(no_mangle)]
pub extern "C" fn pointer_null() -> Pointer {
  Pointer::null()
}

#[unsafe(no_mangle)]
pub extern "C" fn pointer_is_null(pointer: Pointer) -> bool {
  pointer.is_null()
}

/// Raw address of the allocation, for C callers to read and write through.
#[unsafe(no_mangle)]
pub extern "C" fn pointer_address(pointer: Pointer) -> *mut u8 {
  pointer.as_ptr()
}
