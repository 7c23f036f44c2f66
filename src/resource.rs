//! The chunk resource façade
//!
//! [`ChunkResource`] composes the validated options, the block pool and the
//! zero-block sentinel into the public allocator API: size/alignment/
//! availability gating on the way in, ownership and double-free checking on
//! the way out.
//!
//! # Use cases
//! - Short-lived objects in hot paths where the general-purpose allocator
//!   is too expensive
//! - Network packet and message buffers of a known maximum size
//! - Scratch storage with predictable worst-case latency
//!
//! # Example
//!
//! ```
//! use chunk_resource::{ChunkOptions, ChunkResource};
//!
//! let mut resource: ChunkResource = ChunkResource::new(ChunkOptions::new(64, 8, 16))?;
//!
//! let ptr = resource.allocate_bytes(48)?;
//! assert!(resource.maybe_owns(ptr.as_ptr()));
//! resource.deallocate_bytes(ptr.as_ptr(), 48);
//! # Ok::<(), chunk_resource::ChunkError>(())
//! ```
//!
//! A resource is single-owner: every mutating operation takes `&mut self`,
//! so the borrow checker enforces the no-sharing model and operations are
//! totally ordered by program order.

use core::fmt;
use core::mem;
use core::ptr::NonNull;

use crate::error::{ChunkError, ChunkResult};
use crate::index::BlockIndex;
use crate::options::ChunkOptions;
use crate::pool::BlockPool;
use crate::sentinel;
use crate::stats::{Counters, ResourceStats};

/// Fixed-size-block memory resource
///
/// Owns `block_count` blocks of `block_size` bytes at `block_align` and
/// hands them out one at a time. Capacity is fixed for the life of the
/// resource; blocks are never split, merged or grown.
///
/// The index type parameter `I` sizes the internal bookkeeping; `usize`
/// (the default) always works, `u8`/`u16`/`u32` shrink the footprint of
/// pools their range can address.
pub struct ChunkResource<I: BlockIndex = usize> {
    /// Normalised options the pool was built from
    options: ChunkOptions,
    pool: BlockPool<I>,
    /// Interned sentinel answering zero-byte requests
    zero_block: NonNull<u8>,
    stats: Counters,
}

// No interior mutability: all writes go through `&mut self`, so handing the
// resource (or shared references to it) across threads is sound.
unsafe impl<I: BlockIndex> Send for ChunkResource<I> {}
unsafe impl<I: BlockIndex> Sync for ChunkResource<I> {}

impl<I: BlockIndex> ChunkResource<I> {
    /// Builds a resource, validating and normalising `options`
    ///
    /// # Errors
    ///
    /// [`ChunkError::InvalidConfig`] when the options are malformed, when
    /// padding pushes the pool past the addressable bound, or when
    /// `block_count` exceeds what the index type `I` can address.
    pub fn new(options: ChunkOptions) -> ChunkResult<Self> {
        options.validate()?;
        let normalized = options.normalize();
        // padding the size can push the total past the addressable bound
        normalized.validate()?;

        let pool = BlockPool::new(&normalized)?;
        let zero_block = sentinel::zero_block_ptr(&normalized);
        tracing::debug!(options = %normalized, "chunk resource created");

        Ok(Self {
            options: normalized,
            pool,
            zero_block,
            stats: Counters::default(),
        })
    }

    /// Resource whose blocks hold `block_count` values of `T`
    pub fn for_type<T>(block_count: usize) -> ChunkResult<Self> {
        Self::new(ChunkOptions::for_type::<T>(block_count))
    }

    // ------------------------------------------------------------------
    // Read-only queries
    // ------------------------------------------------------------------

    /// The normalised options in effect
    #[inline]
    pub fn options(&self) -> ChunkOptions {
        self.options
    }

    /// Blocks currently free
    #[inline]
    pub fn available_blocks(&self) -> usize {
        self.pool.available_count()
    }

    /// Blocks currently handed out
    #[inline]
    pub fn in_use_blocks(&self) -> usize {
        self.options.block_count - self.pool.available_count()
    }

    /// Total storage in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.options.block_size * self.options.block_count
    }

    /// True when every block is handed out
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.pool.available_count() == 0
    }

    /// Cheap containment test: might `ptr` have come from this resource?
    ///
    /// False for null, for the zero-block sentinel and for every foreign
    /// pointer; true for any address inside the block array, aligned or
    /// not.
    #[inline]
    pub fn maybe_owns(&self, ptr: *const u8) -> bool {
        self.pool.is_maybe_owned(ptr)
    }

    /// The distinguished address returned for zero-byte requests
    ///
    /// Shared by every resource with the same normalised options. The bytes
    /// behind it must never be dereferenced.
    #[inline]
    pub fn zero_block_ptr(&self) -> NonNull<u8> {
        self.zero_block
    }

    /// Activity counters and pool occupancy
    pub fn stats(&self) -> ResourceStats {
        let available = self.pool.available_count();
        let block_count = self.options.block_count;
        ResourceStats {
            block_size: self.options.block_size,
            block_align: self.options.block_align,
            block_count,
            available_blocks: available,
            in_use_blocks: block_count - available,
            peak_in_use: self.stats.peak_in_use,
            total_allocations: self.stats.allocations,
            total_deallocations: self.stats.deallocations,
            zero_requests: self.stats.zero_requests,
            failed_allocations: self.stats.failed,
        }
    }

    /// Clears the activity counters; occupancy is unaffected
    pub fn reset_statistics(&mut self) {
        self.stats.reset();
    }

    /// Re-checks the pool's structural invariants
    ///
    /// Intended for tests and debugging; O(block_count).
    pub fn validate(&self) -> Result<(), &'static str> {
        self.pool.validate()
    }

    // ------------------------------------------------------------------
    // Byte allocation
    // ------------------------------------------------------------------

    /// Allocates `size` bytes from the next free block
    ///
    /// Zero-byte requests succeed with the shared sentinel address and do
    /// not consume a block.
    ///
    /// # Errors
    ///
    /// [`ChunkError::UnsupportedSize`] when `size` exceeds the block size,
    /// [`ChunkError::OutOfMemory`] when every block is handed out.
    pub fn allocate_bytes(&mut self, size: usize) -> ChunkResult<NonNull<u8>> {
        let result = self.gate_bytes(size, None);
        if result.is_err() {
            self.stats.record_failure();
        }
        result
    }

    /// As [`allocate_bytes`](Self::allocate_bytes) with an explicit
    /// alignment request
    ///
    /// # Errors
    ///
    /// Additionally [`ChunkError::InvalidAlign`] when `align` is not a
    /// power of two and [`ChunkError::UnsupportedAlign`] when it exceeds
    /// the block alignment.
    pub fn allocate_bytes_aligned(
        &mut self,
        size: usize,
        align: usize,
    ) -> ChunkResult<NonNull<u8>> {
        let result = self.gate_bytes(size, Some(align));
        if result.is_err() {
            self.stats.record_failure();
        }
        result
    }

    /// Non-reporting variant of [`allocate_bytes`](Self::allocate_bytes):
    /// `None` instead of an error
    pub fn try_allocate_bytes(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.allocate_bytes(size).ok()
    }

    /// Non-reporting variant of
    /// [`allocate_bytes_aligned`](Self::allocate_bytes_aligned)
    pub fn try_allocate_bytes_aligned(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        self.allocate_bytes_aligned(size, align).ok()
    }

    fn gate_bytes(&mut self, size: usize, align: Option<usize>) -> ChunkResult<NonNull<u8>> {
        if let Some(align) = align {
            if !align.is_power_of_two() {
                return Err(ChunkError::invalid_align(align));
            }
            if align > self.options.block_align {
                return Err(ChunkError::unsupported_align(align, self.options.block_align));
            }
        }
        if size > self.options.block_size {
            return Err(ChunkError::unsupported_size(size, self.options.block_size));
        }
        if size == 0 {
            self.stats.record_zero_request();
            return Ok(self.zero_block);
        }
        self.obtain_block()
    }

    fn obtain_block(&mut self) -> ChunkResult<NonNull<u8>> {
        if self.pool.available_count() == 0 {
            return Err(ChunkError::out_of_memory(self.options.block_count));
        }
        let ptr = self.pool.obtain_unchecked();
        let in_use = self.options.block_count - self.pool.available_count();
        self.stats.record_allocation(in_use);
        Ok(ptr)
    }

    // ------------------------------------------------------------------
    // Typed allocation
    // ------------------------------------------------------------------

    /// Allocates storage for `count` values of `T` in a single block
    ///
    /// The storage is uninitialised. Requests for zero bytes (zero count or
    /// zero-sized `T`) succeed with the sentinel address, suitably cast,
    /// and do not consume a block.
    ///
    /// # Errors
    ///
    /// [`ChunkError::ArrayLength`] when `count * size_of::<T>()` overflows
    /// the addressable range, [`ChunkError::UnsupportedAlign`] when `T`
    /// needs more alignment than the blocks have,
    /// [`ChunkError::UnsupportedSize`] and [`ChunkError::OutOfMemory`] as
    /// for bytes.
    pub fn allocate_object<T>(&mut self, count: usize) -> ChunkResult<NonNull<T>> {
        let result = self.gate_object::<T>(count, None);
        if result.is_err() {
            self.stats.record_failure();
        }
        result
    }

    /// As [`allocate_object`](Self::allocate_object) with an explicit
    /// alignment request
    ///
    /// A valid alignment weaker than `T`'s natural one is ignored; the
    /// stronger requirement wins.
    pub fn allocate_object_aligned<T>(
        &mut self,
        count: usize,
        align: usize,
    ) -> ChunkResult<NonNull<T>> {
        let result = self.gate_object::<T>(count, Some(align));
        if result.is_err() {
            self.stats.record_failure();
        }
        result
    }

    /// Non-reporting variant of [`allocate_object`](Self::allocate_object)
    pub fn try_allocate_object<T>(&mut self, count: usize) -> Option<NonNull<T>> {
        self.allocate_object::<T>(count).ok()
    }

    /// Non-reporting variant of
    /// [`allocate_object_aligned`](Self::allocate_object_aligned)
    pub fn try_allocate_object_aligned<T>(
        &mut self,
        count: usize,
        align: usize,
    ) -> Option<NonNull<T>> {
        self.allocate_object_aligned::<T>(count, align).ok()
    }

    fn gate_object<T>(&mut self, count: usize, align: Option<usize>) -> ChunkResult<NonNull<T>> {
        if let Some(align) = align {
            if !align.is_power_of_two() {
                return Err(ChunkError::invalid_align(align));
            }
        }
        let elem_size = mem::size_of::<T>();
        let bytes = count
            .checked_mul(elem_size)
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .ok_or(ChunkError::array_length(count, elem_size))?;

        // natural alignment wins over a weaker explicit request
        let required_align = align.unwrap_or(1).max(mem::align_of::<T>());
        if required_align > self.options.block_align {
            return Err(ChunkError::unsupported_align(
                required_align,
                self.options.block_align,
            ));
        }
        if bytes > self.options.block_size {
            return Err(ChunkError::unsupported_size(bytes, self.options.block_size));
        }
        if bytes == 0 {
            self.stats.record_zero_request();
            return Ok(self.zero_block.cast());
        }
        self.obtain_block().map(NonNull::cast)
    }

    // ------------------------------------------------------------------
    // Deallocation
    // ------------------------------------------------------------------

    /// Returns a block previously obtained from this resource
    ///
    /// Null and the zero-block sentinel are accepted and ignored.
    ///
    /// # Panics
    ///
    /// Asserts that any other pointer belongs to this resource and that its
    /// block is currently allocated; handing back a foreign pointer or
    /// freeing the same block twice is a programming error, not a
    /// recoverable condition.
    pub fn deallocate_bytes(&mut self, ptr: *mut u8, size: usize) {
        self.release_block(ptr, size);
    }

    /// Returns a block that held `count` values of `T`
    ///
    /// # Panics
    ///
    /// As [`deallocate_bytes`](Self::deallocate_bytes).
    pub fn deallocate_object<T>(&mut self, ptr: *mut T, count: usize) {
        let bytes = count.saturating_mul(mem::size_of::<T>());
        self.release_block(ptr.cast::<u8>(), bytes);
    }

    fn release_block(&mut self, ptr: *mut u8, size: usize) {
        if ptr.is_null() || ptr == self.zero_block.as_ptr() {
            return;
        }
        assert!(
            self.pool.is_owned(ptr),
            "pointer does not belong to this resource"
        );
        debug_assert!(
            size <= self.options.block_size,
            "deallocation size exceeds block size"
        );
        let token = match self.pool.is_allocated(ptr) {
            Some(token) => token,
            None => panic!("double free: block is already free"),
        };
        self.pool.return_unchecked(token);
        self.stats.record_deallocation();
    }

    /// Reclaims every block at once, as if freshly constructed
    ///
    /// Restores the construction state of the index stack, so allocations
    /// start from block 0 again. Statistics are kept; use
    /// [`reset_statistics`](Self::reset_statistics) to clear them.
    ///
    /// # Safety
    ///
    /// Every pointer previously obtained from this resource becomes
    /// dangling. The caller must ensure none of them is read, written or
    /// deallocated afterwards.
    pub unsafe fn reset(&mut self) {
        self.pool.reset();
    }

    // ------------------------------------------------------------------
    // Defragmentation
    // ------------------------------------------------------------------

    /// Restores ascending allocation order with a full sort of the free
    /// prefix
    ///
    /// O(n log n) in the number of free blocks. After it, allocations walk
    /// the block array from low addresses upward again.
    pub fn defrag(&mut self) {
        self.pool.defrag();
        tracing::trace!(free = self.pool.available_count(), "defragmented free prefix");
    }

    /// As [`defrag`](Self::defrag), assuming the prefix is already
    /// near-sorted
    ///
    /// O(n) when deallocations mostly followed allocation order in reverse,
    /// quadratic when they did not.
    pub fn defrag_optimistic(&mut self) {
        self.pool.defrag_optimistic();
        tracing::trace!(
            free = self.pool.available_count(),
            "defragmented free prefix (optimistic)"
        );
    }
}

/// Identity only: two distinct resources never compare equal.
impl<I: BlockIndex> PartialEq for ChunkResource<I> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }
}

impl<I: BlockIndex> Eq for ChunkResource<I> {}

impl<I: BlockIndex> fmt::Display for ChunkResource<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk_resource<{}>", self.options)
    }
}

impl<I: BlockIndex> fmt::Debug for ChunkResource<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkResource")
            .field("options", &self.options)
            .field("available", &self.pool.available_count())
            .finish()
    }
}

impl<I: BlockIndex> Drop for ChunkResource<I> {
    fn drop(&mut self) {
        let outstanding = self.options.block_count - self.pool.available_count();
        if outstanding > 0 {
            // tolerated: the caller owns teardown order
            tracing::debug!(outstanding, "chunk resource dropped with live allocations");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(size: usize, align: usize, count: usize) -> ChunkResource {
        ChunkResource::new(ChunkOptions::new(size, align, count)).unwrap()
    }

    #[test]
    fn allocate_and_deallocate_round_trip() {
        let mut r = resource(16, 8, 4);
        let ptr = r.allocate_bytes(10).unwrap();
        assert!(r.maybe_owns(ptr.as_ptr()));
        assert_eq!(r.available_blocks(), 3);

        r.deallocate_bytes(ptr.as_ptr(), 10);
        assert_eq!(r.available_blocks(), 4);
    }

    #[test]
    fn normalisation_is_visible_through_options() {
        let r = resource(3, 4, 5);
        assert_eq!(r.options(), ChunkOptions::new(4, 4, 5));
    }

    #[test]
    fn gating_order_checks_align_before_size() {
        let mut r = resource(8, 8, 2);
        // invalid align wins even though the size is oversized too
        let err = r.allocate_bytes_aligned(9, 3).unwrap_err();
        assert!(matches!(err, ChunkError::InvalidAlign { align: 3 }));

        let err = r.allocate_bytes_aligned(9, 16).unwrap_err();
        assert!(matches!(err, ChunkError::UnsupportedAlign { align: 16, .. }));

        let err = r.allocate_bytes_aligned(9, 8).unwrap_err();
        assert!(matches!(err, ChunkError::UnsupportedSize { requested: 9, .. }));
    }

    #[test]
    fn zero_size_requests_share_the_sentinel() {
        let mut r = resource(8, 8, 2);
        let a = r.allocate_bytes(0).unwrap();
        let b = r.allocate_bytes(0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, r.zero_block_ptr());
        assert_eq!(r.available_blocks(), 2);
        assert!(!r.maybe_owns(a.as_ptr()));

        // and gating still applies to zero-size requests
        let err = r.allocate_bytes_aligned(0, 16).unwrap_err();
        assert!(matches!(err, ChunkError::UnsupportedAlign { .. }));
    }

    #[test]
    fn sentinel_deallocation_is_a_no_op() {
        let mut r = resource(8, 8, 2);
        let zero = r.allocate_bytes(0).unwrap();
        r.deallocate_bytes(zero.as_ptr(), 0);
        r.deallocate_bytes(core::ptr::null_mut(), 0);
        assert_eq!(r.available_blocks(), 2);
    }

    #[test]
    fn exhaustion_reports_out_of_memory() {
        let mut r = resource(8, 8, 2);
        let _a = r.allocate_bytes(8).unwrap();
        let _b = r.allocate_bytes(8).unwrap();
        let err = r.allocate_bytes(8).unwrap_err();
        assert!(matches!(err, ChunkError::OutOfMemory { block_count: 2 }));
        assert!(err.is_retryable());

        assert_eq!(r.try_allocate_bytes(8), None);
    }

    #[test]
    fn typed_allocation_respects_natural_alignment() {
        let mut r = resource(64, 8, 4);
        let ptr = r.allocate_object::<u64>(4).unwrap();
        assert_eq!(ptr.as_ptr() as usize % mem::align_of::<u64>(), 0);
        r.deallocate_object(ptr.as_ptr(), 4);

        // a weaker explicit alignment is ignored, the natural one wins
        let ptr = r.allocate_object_aligned::<u64>(2, 1).unwrap();
        assert_eq!(ptr.as_ptr() as usize % mem::align_of::<u64>(), 0);
        r.deallocate_object(ptr.as_ptr(), 2);
    }

    #[test]
    fn typed_allocation_reports_overflow_as_array_length() {
        let mut r = resource(64, 8, 4);
        let err = r.allocate_object::<u64>(usize::MAX / 2).unwrap_err();
        assert!(matches!(err, ChunkError::ArrayLength { .. }));
    }

    #[test]
    fn over_aligned_type_is_rejected() {
        #[repr(align(64))]
        struct Wide([u8; 64]);

        let mut r = resource(64, 8, 4);
        let err = r.allocate_object::<Wide>(1).unwrap_err();
        assert!(matches!(err, ChunkError::UnsupportedAlign { align: 64, .. }));
    }

    #[test]
    fn zero_sized_type_does_not_consume_blocks() {
        let mut r = resource(8, 8, 2);
        let ptr = r.allocate_object::<()>(5).unwrap();
        assert_eq!(r.available_blocks(), 2);
        r.deallocate_object(ptr.as_ptr(), 5);
        assert_eq!(r.available_blocks(), 2);
    }

    #[test]
    fn stats_track_activity() {
        let mut r = resource(8, 8, 2);
        let a = r.allocate_bytes(8).unwrap();
        let b = r.allocate_bytes(8).unwrap();
        let _ = r.allocate_bytes(8); // fails
        let _ = r.allocate_bytes(0); // sentinel
        r.deallocate_bytes(a.as_ptr(), 8);
        r.deallocate_bytes(b.as_ptr(), 8);

        let stats = r.stats();
        assert_eq!(stats.total_allocations, 2);
        assert_eq!(stats.total_deallocations, 2);
        assert_eq!(stats.failed_allocations, 1);
        assert_eq!(stats.zero_requests, 1);
        assert_eq!(stats.peak_in_use, 2);
        assert_eq!(stats.in_use_blocks, 0);

        r.reset_statistics();
        assert_eq!(r.stats().total_allocations, 0);
    }

    #[test]
    fn occupancy_accessors_agree() {
        let mut r = resource(16, 8, 2);
        assert_eq!(r.capacity(), 32);
        assert!(!r.is_exhausted());

        let a = r.allocate_bytes(16).unwrap();
        let b = r.allocate_bytes(16).unwrap();
        assert!(r.is_exhausted());
        assert_eq!(r.in_use_blocks(), 2);

        r.deallocate_bytes(a.as_ptr(), 16);
        r.deallocate_bytes(b.as_ptr(), 16);
        assert_eq!(r.in_use_blocks(), 0);
    }

    #[test]
    fn reset_reclaims_every_block() {
        let mut r = resource(16, 8, 4);
        let first = r.allocate_bytes(16).unwrap();
        let _ = r.allocate_bytes(16).unwrap();
        let _ = r.allocate_bytes(16).unwrap();
        assert_eq!(r.available_blocks(), 1);

        unsafe { r.reset() };
        assert_eq!(r.available_blocks(), 4);
        r.validate().unwrap();

        // allocation starts from block 0 again
        assert_eq!(r.allocate_bytes(16).unwrap(), first);
        r.deallocate_bytes(first.as_ptr(), 16);
    }

    #[test]
    fn equality_is_identity() {
        let r1 = resource(8, 8, 2);
        let r2 = resource(8, 8, 2);
        assert_eq!(r1, r1);
        assert_ne!(r1, r2);
    }

    #[test]
    fn display_uses_normalised_options() {
        let r = resource(3, 4, 5);
        assert_eq!(
            r.to_string(),
            "chunk_resource<{.block_size=4, .block_align=4, .block_count=5}>"
        );
    }

    #[test]
    fn distinct_resources_have_disjoint_storage() {
        let mut r1 = resource(16, 8, 2);
        let mut r2 = resource(16, 8, 2);
        let p1 = r1.allocate_bytes(16).unwrap();
        let p2 = r2.allocate_bytes(16).unwrap();
        assert!(!r1.maybe_owns(p2.as_ptr()));
        assert!(!r2.maybe_owns(p1.as_ptr()));
        r1.deallocate_bytes(p1.as_ptr(), 16);
        r2.deallocate_bytes(p2.as_ptr(), 16);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_is_detected() {
        let mut r = resource(8, 8, 2);
        let ptr = r.allocate_bytes(8).unwrap();
        r.deallocate_bytes(ptr.as_ptr(), 8);
        r.deallocate_bytes(ptr.as_ptr(), 8);
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn foreign_pointer_is_detected() {
        let mut r = resource(8, 8, 2);
        let mut local = 0u64;
        r.deallocate_bytes(&mut local as *mut u64 as *mut u8, 8);
    }

    #[test]
    fn index_type_capacity_is_enforced() {
        let result = ChunkResource::<u8>::new(ChunkOptions::new(8, 8, 300));
        assert!(matches!(result, Err(ChunkError::InvalidConfig { .. })));
        assert!(ChunkResource::<u8>::new(ChunkOptions::new(8, 8, 256)).is_ok());
    }
}
