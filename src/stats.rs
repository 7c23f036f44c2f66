//! Resource statistics
//!
//! Lightweight counters kept by the resource façade. The resource is
//! single-owner, so plain integers suffice; there are no atomics anywhere on
//! the allocation path.

use core::fmt;

/// Snapshot of a resource's activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    /// Size of each block in bytes (normalised)
    pub block_size: usize,
    /// Alignment of each block (normalised)
    pub block_align: usize,
    /// Total number of blocks
    pub block_count: usize,
    /// Blocks currently free
    pub available_blocks: usize,
    /// Blocks currently handed out
    pub in_use_blocks: usize,
    /// High-water mark of blocks simultaneously handed out
    pub peak_in_use: usize,
    /// Successful block allocations performed
    pub total_allocations: u64,
    /// Block deallocations performed
    pub total_deallocations: u64,
    /// Zero-byte requests answered with the sentinel
    pub zero_requests: u64,
    /// Allocation requests rejected (gating or exhaustion)
    pub failed_allocations: u64,
}

impl fmt::Display for ResourceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceStats {{ blocks: {}/{} in use (peak {}), allocs: {}, deallocs: {}, \
             zero: {}, failed: {} }}",
            self.in_use_blocks,
            self.block_count,
            self.peak_in_use,
            self.total_allocations,
            self.total_deallocations,
            self.zero_requests,
            self.failed_allocations
        )
    }
}

/// Mutable counter state behind [`ResourceStats`]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub(crate) allocations: u64,
    pub(crate) deallocations: u64,
    pub(crate) zero_requests: u64,
    pub(crate) failed: u64,
    pub(crate) peak_in_use: usize,
}

impl Counters {
    #[inline]
    pub(crate) fn record_allocation(&mut self, in_use: usize) {
        self.allocations += 1;
        if in_use > self.peak_in_use {
            self.peak_in_use = in_use;
        }
    }

    #[inline]
    pub(crate) fn record_deallocation(&mut self) {
        self.deallocations += 1;
    }

    #[inline]
    pub(crate) fn record_zero_request(&mut self) {
        self.zero_requests += 1;
    }

    #[inline]
    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
