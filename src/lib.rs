//! # chunk-resource
//!
//! A fixed-size-block memory resource: pre-reserves an array of uniformly
//! sized, uniformly aligned storage blocks and hands them out one at a
//! time. Intended as a drop-in allocator for short-lived objects in hot
//! paths where a general-purpose allocator is too expensive and the maximum
//! object size is known up front.
//!
//! - O(1) allocation, O(1) expected deallocation (LIFO fast path)
//! - Zero per-block overhead: blocks carry no hidden header
//! - Misuse detection: double-free, foreign pointers and size mismatches
//!   trip assertions instead of corrupting the pool
//! - Zero-byte requests answered with a shared sentinel, never a block
//! - Narrow index types (`u8`/`u16`/`u32`) shrink bookkeeping for small
//!   pools
//!
//! One resource owns one self-contained pool; distinct resources never
//! share storage. A resource is single-owner: all mutation goes through
//! `&mut self`, and there are no locks or atomics on the allocation path.
//!
//! ```
//! use chunk_resource::{ChunkOptions, ChunkResource};
//!
//! let mut buffers: ChunkResource<u8> =
//!     ChunkResource::new(ChunkOptions::new(1500, 8, 32))?;
//!
//! let frame = buffers.allocate_bytes(1200)?;
//! // ... fill and use the buffer ...
//! buffers.deallocate_bytes(frame.as_ptr(), 1200);
//!
//! // restore low-address-first allocation order after churn
//! buffers.defrag();
//! # Ok::<(), chunk_resource::ChunkError>(())
//! ```

pub mod error;
pub mod index;
pub mod options;
pub mod resource;
pub mod stats;
pub mod utils;

mod pool;
mod sentinel;

pub use error::{ChunkError, ChunkResult};
pub use index::{BlockIndex, PoolCounter};
pub use options::{ChunkOptions, MAX_DEFAULT_ALIGN};
pub use resource::ChunkResource;
pub use stats::ResourceStats;
