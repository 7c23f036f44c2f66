//! Pool shape description and normalisation
//!
//! [`ChunkOptions`] is the value object describing a pool: block size, block
//! alignment and block count. User-facing validation is separated from
//! normalisation so malformed input is rejected with a clear diagnostic,
//! while the pool internals can rely on the stronger post-normalisation
//! invariant that the alignment divides the size, which keeps the pointer
//! arithmetic to a subtraction, a remainder and a shift.

use core::alloc::Layout;
use core::fmt;
use core::mem;

use crate::error::{ChunkError, ChunkResult};
use crate::utils::{align_up, largest_pow2_divisor};

/// Default new-alignment assumed for mainstream targets
///
/// Normalisation never raises the block alignment above this unless the
/// caller asked for more.
pub const MAX_DEFAULT_ALIGN: usize = 16;

/// Shape of a fixed-size block pool
///
/// Field order is significant: the derived ordering is lexicographic on
/// `(block_size, block_align, block_count)`.
///
/// # Examples
///
/// ```
/// use chunk_resource::ChunkOptions;
///
/// let options = ChunkOptions::new(48, 8, 64);
/// assert!(options.is_valid());
/// assert_eq!(options.normalize().block_size, 48);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkOptions {
    /// Usable bytes per block
    pub block_size: usize,
    /// Alignment of every block (power of two)
    pub block_align: usize,
    /// Number of blocks in the pool
    pub block_count: usize,
}

impl ChunkOptions {
    pub const fn new(block_size: usize, block_align: usize, block_count: usize) -> Self {
        Self { block_size, block_align, block_count }
    }

    /// Options sized for `block_count` values of type `T`
    ///
    /// Zero-sized types get one-byte blocks; a pool cannot hand out
    /// zero-sized storage.
    pub fn for_type<T>(block_count: usize) -> Self {
        let size = mem::size_of::<T>().max(1);
        Self::new(size, mem::align_of::<T>(), block_count)
    }

    /// Options matching an existing layout
    pub fn for_layout(layout: Layout, block_count: usize) -> Self {
        Self::new(layout.size().max(1), layout.align(), block_count)
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Checks the construction constraints without normalising
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// As [`is_valid`](Self::is_valid), reporting which constraint failed
    pub fn validate(&self) -> ChunkResult<()> {
        if self.block_size == 0 {
            return Err(ChunkError::invalid_config("block_size must be non-zero"));
        }
        if self.block_count == 0 {
            return Err(ChunkError::invalid_config("block_count must be non-zero"));
        }
        if !self.block_align.is_power_of_two() {
            return Err(ChunkError::invalid_config(
                "block_align must be a power of two",
            ));
        }
        if self.total_bytes().is_none() {
            return Err(ChunkError::invalid_config(
                "block_size * block_count exceeds the addressable range",
            ));
        }
        Ok(())
    }

    /// Total pool storage in bytes, if it is addressable as one allocation
    ///
    /// Bounded by `isize::MAX`, the same limit `Layout` enforces.
    #[must_use]
    pub fn total_bytes(&self) -> Option<usize> {
        self.block_size
            .checked_mul(self.block_count)
            .filter(|&total| total <= isize::MAX as usize)
    }

    // ------------------------------------------------------------------
    // Normalisation
    // ------------------------------------------------------------------

    /// Applies the padding and alignment rules
    ///
    /// The effective size is the smallest multiple of `block_align` not less
    /// than `block_size`. The effective alignment is raised to the largest
    /// power of two dividing that size, capped at
    /// `max(block_align, MAX_DEFAULT_ALIGN)` so the pool never demands more
    /// than the default new-alignment behind the caller's back.
    ///
    /// Idempotent, and never changes `block_count`. Callers must validate
    /// the *result* before building a pool from it: padding the size can
    /// push `block_size * block_count` past the addressable bound.
    #[must_use]
    pub fn normalize(&self) -> Self {
        debug_assert!(self.is_valid());
        let block_size = align_up(self.block_size, self.block_align);
        let natural = largest_pow2_divisor(block_size);
        let cap = self.block_align.max(MAX_DEFAULT_ALIGN);
        Self {
            block_size,
            block_align: natural.min(cap),
            block_count: self.block_count,
        }
    }

    /// True iff normalisation would be a no-op
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.is_valid() && self.normalize() == *self
    }

    // ------------------------------------------------------------------
    // Compatibility
    // ------------------------------------------------------------------

    /// True iff `count` values of `T` fit in a single block
    ///
    /// ```
    /// use chunk_resource::ChunkOptions;
    ///
    /// let options = ChunkOptions::new(16, 8, 4);
    /// assert!(options.fits::<u64>(2));
    /// assert!(!options.fits::<u64>(3));
    /// assert!(!options.fits::<u64>(usize::MAX));
    /// ```
    #[must_use]
    pub fn fits<T>(&self, count: usize) -> bool {
        match count.checked_mul(mem::size_of::<T>()) {
            Some(bytes) => bytes <= self.block_size && mem::align_of::<T>() <= self.block_align,
            None => false,
        }
    }

    /// Layout of a single block. Precondition: normalised options.
    pub(crate) fn block_layout(&self) -> Layout {
        debug_assert!(self.is_normalized());
        Layout::from_size_align(self.block_size, self.block_align)
            .expect("normalized options describe a valid layout")
    }

    /// Layout of the whole block array. Precondition: normalised options.
    pub(crate) fn storage_layout(&self) -> Layout {
        debug_assert!(self.is_normalized());
        let total = self
            .total_bytes()
            .expect("normalized options describe an addressable pool");
        Layout::from_size_align(total, self.block_align)
            .expect("normalized options describe a valid layout")
    }
}

impl fmt::Display for ChunkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{.block_size={}, .block_align={}, .block_count={}}}",
            self.block_size, self.block_align, self.block_count
        )
    }
}
