//! Opaque handles to addresses inside an arena.
//!
//! A [`Pointer`] names a byte offset inside exactly one arena. It does not own
//! anything and knows nothing about the size or type of the bytes it points
//! at. [`Pointer::store`] and [`Pointer::load`] are the only way to touch those
//! bytes and neither checks bounds, type or liveness.

use core::{
  fmt,
  hash::{
    Hash,
    Hasher,
  },
  marker::PhantomData,
  ptr,
  sync::atomic::{
    AtomicU64,
    Ordering,
  },
};

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an arena.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(u64);

impl ArenaId {
  /// Identity carried by null pointers. Never assigned to an arena.
  pub const NONE: ArenaId = ArenaId(0);

  pub(crate) fn next() -> Self {
    ArenaId(NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed))
  }

  pub const fn get(self) -> u64 {
    self.0
  }
}

/// Untyped handle to an allocation.
///
/// Only allocators create non-null pointers. The handle stays `Copy` so it
/// can be passed around freely, which also means nothing stops it from being
/// used after the allocation it names has been released.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pointer {
  addr: *mut u8,
  arena: ArenaId,
  epoch: u32,
  offset: usize,
}

impl Pointer {
  pub const fn null() -> Self {
    Pointer {
      addr: ptr::null_mut(),
      arena: ArenaId::NONE,
      epoch: 0,
      offset: 0,
    }
  }

  pub(crate) const fn new(addr: *mut u8, arena: ArenaId, epoch: u32, offset: usize) -> Self {
    Pointer {
      addr,
      arena,
      epoch,
      offset,
    }
  }

  pub fn is_null(&self) -> bool {
    self.addr.is_null()
  }

  /// Arena that issued this pointer, [`ArenaId::NONE`] for null.
  pub const fn arena(&self) -> ArenaId {
    self.arena
  }

  /// Byte offset from the start of the issuing arena.
  pub const fn offset(&self) -> usize {
    self.offset
  }

  pub(crate) const fn epoch(&self) -> u32 {
    self.epoch
  }

  pub const fn as_ptr(&self) -> *mut u8 {
    self.addr
  }

  /// Binds the pointer to `T`. Nothing is checked.
  pub const fn cast<T>(self) -> TypedPointer<T> {
    TypedPointer::from_pointer(self)
  }

  /// Writes `value` at the pointer's address.
  ///
  /// The write is unaligned and bitwise. `value` is moved into the arena and
  /// its destructor will never run.
  ///
  /// # Safety
  ///
  /// The pointer must be non-null, issued by an arena that is still alive, not
  /// invalidated by a `free` or `deallocate`, and the allocation behind it must
  /// span at least `size_of::<T>()` bytes.
  pub unsafe fn store<T>(self, value: T) {
    // SAFETY: upheld by the caller
    unsafe { ptr::write_unaligned(self.addr.cast::<T>(), value) }
  }

  /// Reads a `T` from the pointer's address.
  ///
  /// # Safety
  ///
  /// Same requirements as [`Pointer::store`]. In addition the bytes must hold
  /// a valid `T`, normally because a `T` was stored there. Loading a non-`Copy`
  /// value twice duplicates ownership.
  pub unsafe fn load<T>(self) -> T {
    // SAFETY: upheld by the caller
    unsafe { ptr::read_unaligned(self.addr.cast::<T>()) }
  }
}

impl Default for Pointer {
  fn default() -> Self {
    Self::null()
  }
}

impl fmt::Debug for Pointer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pointer")
      .field("arena", &self.arena.0)
      .field("epoch", &self.epoch)
      .field("offset", &self.offset)
      .finish()
  }
}

/// A [`Pointer`] bound to a statically known type.
///
/// Removes the need to name `T` at each call site. Adds no runtime
/// information and no guarantee on top of the untyped pointer.
#[repr(transparent)]
pub struct TypedPointer<T> {
  pointer: Pointer,
  _marker: PhantomData<fn() -> T>,
}

impl<T> TypedPointer<T> {
  pub const fn null() -> Self {
    Self::from_pointer(Pointer::null())
  }

  pub(crate) const fn from_pointer(pointer: Pointer) -> Self {
    TypedPointer {
      pointer,
      _marker: PhantomData,
    }
  }

  pub const fn pointer(self) -> Pointer {
    self.pointer
  }

  pub fn is_null(&self) -> bool {
    self.pointer.is_null()
  }

  /// # Safety
  ///
  /// See [`Pointer::store`].
  pub unsafe fn store(self, value: T) {
    unsafe { self.pointer.store(value) }
  }

  /// # Safety
  ///
  /// See [`Pointer::load`].
  pub unsafe fn load(self) -> T {
    unsafe { self.pointer.load() }
  }
}

impl<T> Clone for TypedPointer<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for TypedPointer<T> {}

impl<T> PartialEq for TypedPointer<T> {
  fn eq(&self, other: &Self) -> bool {
    self.pointer == other.pointer
  }
}

impl<T> Eq for TypedPointer<T> {}

impl<T> Hash for TypedPointer<T> {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.pointer.hash(state);
  }
}

impl<T> Default for TypedPointer<T> {
  fn default() -> Self {
    Self::null()
  }
}

impl<T> fmt::Debug for TypedPointer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("TypedPointer").field(&self.pointer).finish()
  }
}

impl<T> From<TypedPointer<T>> for Pointer {
  fn from(typed: TypedPointer<T>) -> Self {
    typed.pointer
  }
}
