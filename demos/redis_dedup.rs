//! Shared deduplication against a live Redis server
//!
//! Configure with REDBLOOM_ADDRESS, REDBLOOM_PASSWORD, REDBLOOM_DB,
//! REDBLOOM_PREFIX and REDBLOOM_POOL_SIZE, then run several copies at once:
//! every copy sees the requests the others marked visited.

use anyhow::{Context, Result};
use redbloom::{BloomStorage, FilterParams, RedisStore, StoreOptions, VisitedStorage};
use std::sync::Arc;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    let mut options = StoreOptions::from_env().context("reading REDBLOOM_* settings")?;
    if options.prefix.is_empty() {
        options.prefix = "redbloom_demo".to_string();
    }

    let store = Arc::new(RedisStore::open(&options).with_context(|| format!("connecting to {}", options.address))?);
    let storage = BloomStorage::open(store, &options, FilterParams::for_capacity(1_000_000))?;
    println!("Using filter {} on {}", storage.bloom_key(), options.address);

    let mut fresh = 0;
    for id in 0..1_000u64 {
        if !storage.is_visited(id)? {
            storage.visited(id)?;
            fresh += 1;
        }
    }

    println!("{} of 1000 requests were new to this namespace", fresh);
    println!("Run again to see them all deduplicated, or set REDBLOOM_RESET=1 to start over");

    if std::env::var("REDBLOOM_RESET").is_ok() {
        storage.reset()?;
        println!("Filter reset");
    }

    Ok(())
}
