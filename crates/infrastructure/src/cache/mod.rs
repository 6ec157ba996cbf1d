//! Cache implementations
//!
//! - `MokaCache`: In-memory store with TTL and size-based eviction

mod moka_cache;

pub use moka_cache::{MokaCache, MokaCacheConfig};
