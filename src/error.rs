//! Error types for chunk-resource
//!
//! Allocation-time failures are caller-visible domain errors and surface as
//! [`ChunkError`] values; deallocation-time failures are programmer errors
//! and trip assertions instead (see the resource documentation). Every
//! variant carries only integers or `&'static str` fragments, so building or
//! formatting an error never allocates.

use thiserror::Error;

/// Result type for resource operations
pub type ChunkResult<T> = Result<T, ChunkError>;

/// Errors reported by allocation requests and resource construction
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkError {
    /// Explicit alignment argument is not a positive power of two
    #[error("invalid alignment: {align} is not a power of two")]
    InvalidAlign { align: usize },

    /// Requested alignment is valid but stronger than the pool provides
    #[error("unsupported alignment: {align} exceeds block alignment {block_align}")]
    UnsupportedAlign { align: usize, block_align: usize },

    /// Requested size does not fit in a single block
    #[error("unsupported size: {requested} bytes exceeds block size {block_size}")]
    UnsupportedSize { requested: usize, block_size: usize },

    /// `count * size_of::<T>()` overflows the addressable range
    #[error("array length overflow: {count} elements of {elem_size} bytes")]
    ArrayLength { count: usize, elem_size: usize },

    /// Every block is currently handed out
    #[error("out of memory: all {block_count} blocks are allocated")]
    OutOfMemory { block_count: usize },

    /// Malformed options or an index type too narrow for the block count
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}

impl ChunkError {
    /// Stable error code for categorization
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidAlign { .. } => "CHUNK:ALIGN:INVALID",
            Self::UnsupportedAlign { .. } => "CHUNK:ALIGN:UNSUPPORTED",
            Self::UnsupportedSize { .. } => "CHUNK:SIZE:UNSUPPORTED",
            Self::ArrayLength { .. } => "CHUNK:SIZE:OVERFLOW",
            Self::OutOfMemory { .. } => "CHUNK:POOL:EXHAUSTED",
            Self::InvalidConfig { .. } => "CHUNK:CONFIG:INVALID",
        }
    }

    /// Exhaustion clears up as soon as the caller returns a block; the other
    /// kinds are permanent for a given pool shape.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    // ------------------------------------------------------------------
    // Convenience constructors
    // ------------------------------------------------------------------

    pub(crate) const fn invalid_align(align: usize) -> Self {
        Self::InvalidAlign { align }
    }

    pub(crate) const fn unsupported_align(align: usize, block_align: usize) -> Self {
        Self::UnsupportedAlign { align, block_align }
    }

    pub(crate) const fn unsupported_size(requested: usize, block_size: usize) -> Self {
        Self::UnsupportedSize { requested, block_size }
    }

    pub(crate) const fn array_length(count: usize, elem_size: usize) -> Self {
        Self::ArrayLength { count, elem_size }
    }

    pub(crate) const fn out_of_memory(block_count: usize) -> Self {
        Self::OutOfMemory { block_count }
    }

    pub(crate) const fn invalid_config(reason: &'static str) -> Self {
        Self::InvalidConfig { reason }
    }
}
