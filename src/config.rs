//! Declarative allocator construction.
//!
//! An [`AllocatorConfig`] describes one allocator and can be read from TOML:
//!
//! ```toml
//! kind = "pool"
//! block_size = 64
//! block_count = 128
//! validation = "checked"
//! ```

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::{
  Arena,
  error::{
    Error,
    Result,
  },
  linear::LinearAllocator,
  pointer::Pointer,
  pool::PoolAllocator,
  stack::StackAllocator,
};

/// Pointer checks performed on deallocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
  /// Trust every pointer. Double frees, foreign pointers and out-of-order
  /// stack pops corrupt the allocator silently.
  #[default]
  Unchecked,
  /// Reject pointers that would corrupt the allocator's bookkeeping.
  Checked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocatorConfig {
  Linear {
    capacity: usize,
  },
  Pool {
    block_size: usize,
    block_count: usize,
    #[serde(default)]
    validation: Validation,
  },
  Stack {
    capacity: usize,
    #[serde(default)]
    validation: Validation,
  },
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid allocator config: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("cannot build allocator: {0}")]
  Build(#[from] Error),
}

impl AllocatorConfig {
  pub fn from_toml_str(source: &str) -> core::result::Result<Self, ConfigError> {
    Ok(toml::from_str(source)?)
  }

  pub fn build(&self) -> Result<AnyAllocator> {
    Ok(match *self {
      AllocatorConfig::Linear { capacity } => {
        AnyAllocator::Linear(LinearAllocator::new(capacity)?)
      }
      AllocatorConfig::Pool {
        block_size,
        block_count,
        validation,
      } => AnyAllocator::Pool(
        PoolAllocator::new(block_size, block_count)?.with_validation(validation)?,
      ),
      AllocatorConfig::Stack {
        capacity,
        validation,
      } => AnyAllocator::Stack(StackAllocator::new(capacity)?.with_validation(validation)),
    })
  }
}

/// One allocator of any kind, as produced by [`AllocatorConfig::build`].
pub enum AnyAllocator {
  Linear(LinearAllocator),
  Pool(PoolAllocator),
  Stack(StackAllocator),
}

impl AnyAllocator {
  /// Allocates `size` bytes.
  ///
  /// A pool serves any request of `1..=block_size` bytes with one whole
  /// block and reports larger requests as `OutOfMemory`.
  pub fn allocate(&mut self, size: usize) -> Result<Pointer> {
    match self {
      AnyAllocator::Linear(linear) => linear.allocate(size),
      AnyAllocator::Stack(stack) => stack.allocate(size),
      AnyAllocator::Pool(pool) => {
        if size == 0 {
          return Err(Error::NegativeElemSize);
        }
        if size > pool.block_size() {
          return Err(Error::OutOfMemory);
        }
        pool.allocate()
      }
    }
  }

  pub fn deallocate(&mut self, pointer: Pointer) -> Result<()> {
    match self {
      AnyAllocator::Linear(_) => Err(Error::Unsupported),
      AnyAllocator::Pool(pool) => pool.deallocate(pointer),
      AnyAllocator::Stack(stack) => stack.deallocate(pointer),
    }
  }

  fn as_arena(&self) -> &dyn Arena {
    match self {
      AnyAllocator::Linear(linear) => linear,
      AnyAllocator::Pool(pool) => pool,
      AnyAllocator::Stack(stack) => stack,
    }
  }
}

impl Arena for AnyAllocator {
  fn capacity(&self) -> usize {
    self.as_arena().capacity()
  }

  fn used(&self) -> usize {
    self.as_arena().used()
  }

  fn free(&mut self) {
    match self {
      AnyAllocator::Linear(linear) => linear.free(),
      AnyAllocator::Pool(pool) => pool.free(),
      AnyAllocator::Stack(stack) => stack.free(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_pool_with_default_validation() {
    let config = AllocatorConfig::from_toml_str(
      r#"
        kind = "pool"
        block_size = 8
        block_count = 3
      "#,
    )
    .unwrap();
    assert_eq!(
      config,
      AllocatorConfig::Pool {
        block_size: 8,
        block_count: 3,
        validation: Validation::Unchecked,
      }
    );
  }

  #[test]
  fn parses_checked_stack() {
    let config = AllocatorConfig::from_toml_str(
      r#"
        kind = "stack"
        capacity = 64
        validation = "checked"
      "#,
    )
    .unwrap();
    let AnyAllocator::Stack(stack) = config.build().unwrap() else {
      panic!("expected a stack allocator");
    };
    assert_eq!(stack.validation(), Validation::Checked);
    assert_eq!(stack.capacity(), 64);
  }

  #[test]
  fn unknown_kind_is_a_parse_error() {
    let err = AllocatorConfig::from_toml_str("kind = \"buddy\"\ncapacity = 8").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
  }

  #[test]
  fn invalid_metrics_surface_at_build() {
    let config = AllocatorConfig::Linear { capacity: 0 };
    assert_eq!(config.build().err(), Some(Error::InvalidCapacity));
  }

  #[test]
  fn toml_round_trip() {
    let config = AllocatorConfig::Stack {
      capacity: 128,
      validation: Validation::Checked,
    };
    let text = toml::to_string(&config).unwrap();
    assert_eq!(AllocatorConfig::from_toml_str(&text).unwrap(), config);
  }

  #[test]
  fn any_allocator_dispatch() {
    let mut pool = AllocatorConfig::Pool {
      block_size: 8,
      block_count: 2,
      validation: Validation::Checked,
    }
    .build()
    .unwrap();
    assert_eq!(pool.allocate(9).unwrap_err(), Error::OutOfMemory);
    assert_eq!(pool.allocate(0).unwrap_err(), Error::NegativeElemSize);
    let p = pool.allocate(8).unwrap();
    assert_eq!(pool.used(), 8);
    pool.deallocate(p).unwrap();
    assert_eq!(pool.deallocate(p), Err(Error::DoubleFree));

    let mut linear = AllocatorConfig::Linear { capacity: 4 }.build().unwrap();
    let q = linear.allocate(4).unwrap();
    assert_eq!(linear.deallocate(q), Err(Error::Unsupported));
    linear.free();
    assert_eq!(linear.available(), 4);
  }
}
