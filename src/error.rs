//! Error values reported by every fallible allocator operation.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Reasons an allocator rejects a request.
///
/// The first five variants are reported in every mode. The pointer checks
/// after them are only produced by allocators running with
/// [`Validation::Checked`](crate::config::Validation::Checked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Error {
  #[error("capacity must be greater than zero")]
  InvalidCapacity,
  #[error("size of element to allocate must be greater than zero")]
  NegativeElemSize,
  #[error("allocator is out of memory")]
  OutOfMemory,
  #[error("negative block metric: size or count")]
  NegativeBlockMetric,
  #[error("invalid pointer")]
  InvalidPointer,

  #[error("pointer was issued by a different arena")]
  ForeignPointer,
  #[error("pointer was issued before the arena was last reset")]
  StalePointer,
  #[error("block is not currently allocated")]
  DoubleFree,
  #[error("pointer is not the most recent stack allocation")]
  OutOfOrder,

  /// Individual deallocation requested from an allocator that only frees in bulk.
  #[error("allocator does not support individual deallocation")]
  Unsupported,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages_are_lowercase_sentences() {
    assert_eq!(Error::OutOfMemory.to_string(), "allocator is out of memory");
    assert_eq!(
      Error::NegativeBlockMetric.to_string(),
      "negative block metric: size or count"
    );
  }
}
