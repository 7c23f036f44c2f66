//! Process-wide zero-block sentinel registry
//!
//! A zero-byte request must succeed without consuming a block, and every
//! zero-byte request against pools of the same shape must come back with the
//! same address. Each distinct normalised [`ChunkOptions`] therefore gets
//! one interned allocation: `block_size` uninitialised bytes at
//! `block_align`, acquired from the global allocator on first use and kept
//! for the life of the process. Only the address matters; the bytes behind
//! it are never read or written through the resource API.
//!
//! The registry lock is taken once per resource construction, never on an
//! allocation or deallocation path.

use std::alloc::{alloc, handle_alloc_error};
use std::collections::HashMap;
use std::ptr::NonNull;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::options::ChunkOptions;

static ZERO_BLOCKS: Lazy<Mutex<HashMap<ChunkOptions, usize>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Interned sentinel address for one normalised options value
///
/// Precondition: `options.is_normalized()`.
pub(crate) fn zero_block_ptr(options: &ChunkOptions) -> NonNull<u8> {
    debug_assert!(options.is_normalized());

    let mut table = ZERO_BLOCKS.lock();
    let addr = *table.entry(*options).or_insert_with(|| {
        let layout = options.block_layout();
        // Deliberately leaked: the sentinel must outlive every resource of
        // this shape, and there is exactly one per shape.
        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }
        ptr as usize
    });

    // Entries only ever hold addresses of successful allocations.
    unsafe { NonNull::new_unchecked(addr as *mut u8) }
}
