//! Resource caching for the renderer.

pub mod key;
pub mod lru;

pub use key::{KeyBytes, ResourceKey};
pub use lru::{CacheError, CacheResult, CacheStats, LruCache, ValueDestructor};
