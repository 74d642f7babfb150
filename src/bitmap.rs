extern crate alloc;

use alloc::alloc::{
  Allocator,
  Global,
  Layout,
};
use core::ptr::NonNull;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BitmapError {
  #[error("bit index out of bounds")]
  OutOfBounds,
  #[error("bitmap storage could not be allocated")]
  AllocError,
  #[error("bitmap must track at least one bit")]
  InvalidSize,
}

/// Fixed-length bit set used to track which pool blocks are handed out.
pub struct Bitmap<A: Allocator = Global> {
  allocator: A,
  map: NonNull<u8>,
  layout: Layout,
  bits: usize,
}

impl<A: Allocator> Bitmap<A> {
  pub fn try_new_in(allocator: A, bits: usize) -> Result<Self, BitmapError> {
    if bits == 0 {
      return Err(BitmapError::InvalidSize);
    }

    let fields = bits.div_ceil(8);
    let layout = Layout::array::<u8>(fields).map_err(|_| BitmapError::InvalidSize)?;
    let ptr = allocator
      .allocate_zeroed(layout)
      .map_err(|_| BitmapError::AllocError)?;
    Ok(Bitmap {
      allocator,
      map: ptr.cast::<u8>(),
      layout,
      bits,
    })
  }

  fn fields(&self) -> &[u8] {
    // SAFETY: map points to layout.size() initialised bytes owned by self
    unsafe { core::slice::from_raw_parts(self.map.as_ptr(), self.layout.size()) }
  }

  fn fields_mut(&mut self) -> &mut [u8] {
    // SAFETY: as above, and &mut self guarantees exclusivity
    unsafe { core::slice::from_raw_parts_mut(self.map.as_ptr(), self.layout.size()) }
  }

  fn locate(&self, index: usize) -> Result<(usize, u8), BitmapError> {
    if index >= self.bits {
      return Err(BitmapError::OutOfBounds);
    }
    Ok((index / 8, 1 << (index % 8)))
  }

  pub fn set(&mut self, index: usize) -> Result<(), BitmapError> {
    let (byte, mask) = self.locate(index)?;
    self.fields_mut()[byte] |= mask;
    Ok(())
  }

  pub fn get(&self, index: usize) -> Result<bool, BitmapError> {
    let (byte, mask) = self.locate(index)?;
    Ok(self.fields()[byte] & mask != 0)
  }

  pub fn clear(&mut self, index: usize) -> Result<(), BitmapError> {
    let (byte, mask) = self.locate(index)?;
    self.fields_mut()[byte] &= !mask;
    Ok(())
  }

  pub fn clear_all(&mut self) {
    self.fields_mut().fill(0);
  }

  /// Number of set bits.
  pub(crate) fn count_ones(&self) -> usize {
    self
      .fields()
      .iter()
      .map(|byte| byte.count_ones() as usize)
      .sum()
  }
}

impl Bitmap<Global> {
  pub fn try_new(bits: usize) -> Result<Self, BitmapError> {
    Self::try_new_in(Global, bits)
  }
}

impl<A: Allocator> Drop for Bitmap<A> {
  fn drop(&mut self) {
    // SAFETY: map was allocated by this allocator with this layout
    unsafe { self.allocator.deallocate(self.map, self.layout) };
  }
}

// SAFETY: the bitmap owns its storage exclusively.
unsafe impl<A: Allocator + Send> Send for Bitmap<A> {}
unsafe impl<A: Allocator + Sync> Sync for Bitmap<A> {}
