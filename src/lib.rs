//! # RedBloom - A Shared Bloom Filter for Crawl Deduplication
//!
//! RedBloom keeps a Bloom filter in a Redis string so that many crawler
//! processes can share one "have we seen this request?" answer with bounded
//! memory. Membership answers are "definitely not seen" or "probably seen";
//! a request that was marked visited is never reported as new.
//!
//! ## Architecture
//!
//! The crate is layered bottom-up:
//!
//! - **Store**: the key-value server holding all state, either Redis
//!   ([`RedisStore`]) or an in-process keyspace ([`MemoryStore`])
//! - **BitArray**: a fixed-width bit array under one key, updated by atomic
//!   server-side scripts
//! - **HashLocator**: maps a payload to its k bit offsets with murmur3
//! - **BloomFilter**: composes the locator with a bit array
//! - **Storage**: exact-match visited markers, cookies and a request queue
//! - **BloomStorage**: visited markers backed by the shared filter
//!
//! ## Example Usage
//!
//! ```rust
//! use redbloom::{BloomStorage, FilterParams, MemoryStore, StoreOptions, VisitedStorage};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), redbloom::Error> {
//! let options = StoreOptions::new().prefix("crawler");
//! let storage = BloomStorage::open(Arc::new(MemoryStore::new()), &options, FilterParams::for_capacity(10_000))?;
//!
//! assert!(!storage.is_visited(42)?);
//! storage.visited(42)?;
//! assert!(storage.is_visited(42)?);
//!
//! // Forget every visited request; cookies and the queue stay
//! storage.reset()?;
//! # Ok(())
//! # }
//! ```
//!
//! Against a Redis server, open a [`RedisStore`] instead:
//!
//! ```rust,no_run
//! use redbloom::{BloomStorage, FilterParams, RedisStore, StoreOptions};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), redbloom::Error> {
//! let options = StoreOptions::from_env()?;
//! let store = Arc::new(RedisStore::open(&options)?);
//! let storage = BloomStorage::open(store, &options, FilterParams::default())?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod bitset;
pub mod config;
pub mod error;
pub mod filter;
pub mod keys;
pub mod storage;
pub mod store;
pub mod visited;

// Re-exports
pub use config::{FilterParams, StoreOptions};
pub use error::{Error, Result};
pub use filter::BloomFilter;
pub use keys::KeySpace;
pub use storage::{Storage, VisitedStorage};
pub use store::{MemoryStore, RedisStore};
pub use visited::BloomStorage;
