//! # 缓存模块
//!
//! 缓存键派生、缓存后端（Redis / 内存）以及带故障降级的响应缓存存储

pub mod abstract_cache;
pub mod client;
pub mod keys;
pub mod store;

pub use abstract_cache::{CacheBackend, MemoryBackend, glob_to_regex};
pub use client::RedisBackend;
pub use keys::{CacheKey, DEFAULT_KEY_PREFIX, KeyDeriver};
pub use store::{CacheEntry, CacheStore};
