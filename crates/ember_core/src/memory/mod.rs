//! # Memory Management
//!
//! Chunked free-list pools backing every component storage.
//!
//! ## Design Philosophy
//!
//! Blocks are handed out from fixed-size chunks. Freed blocks go back on
//! the free list and are reused before any new chunk is reserved, so
//! steady-state churn does not touch the general-purpose allocator.

mod pool;

pub use pool::{PoolAllocator, PoolHandle};
