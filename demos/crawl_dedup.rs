//! Crawl deduplication walk-through on the in-memory store
//!
//! This example demonstrates:
//! - Sizing a filter for an expected crawl
//! - Marking requests visited and skipping duplicates
//! - Queueing requests and storing cookies next to the filter
//! - Resetting the filter between crawls

use anyhow::Result;
use redbloom::{BloomStorage, FilterParams, MemoryStore, StoreOptions, VisitedStorage};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Fingerprint of a request, as a crawler would compute it.
fn request_id(method: &str, url: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    method.hash(&mut hasher);
    url.hash(&mut hasher);
    hasher.finish()
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    println!("=== RedBloom Crawl Dedup Example ===\n");

    let params = FilterParams::for_capacity(10_000);
    println!(
        "Filter: {} bits, {} hashes, ~{:.2e} false positive rate at capacity",
        params.width,
        params.hash_count,
        params.false_positive_rate(10_000)
    );

    let options = StoreOptions::new().prefix("demo");
    let storage = BloomStorage::open(Arc::new(MemoryStore::from_options(&options)), &options, params)?;

    let discovered = [
        "http://example.com/",
        "http://example.com/about",
        "http://example.com/",
        "http://example.com/blog",
        "http://example.com/about",
    ];

    // Enqueue only requests not seen before
    for url in &discovered {
        let id = request_id("GET", url);
        if storage.is_visited(id)? {
            println!("  skip  {}", url);
            continue;
        }
        storage.visited(id)?;
        storage.storage().add_request(url.as_bytes())?;
        println!("  queue {}", url);
    }

    storage.storage().set_cookies("example.com", "session=demo")?;
    println!("\nQueued {} requests", storage.storage().queue_size()?);
    println!("Cookies for example.com: {}", storage.storage().cookies("example.com")?);

    while let Some(request) = storage.storage().get_request()? {
        println!("  fetch {}", String::from_utf8_lossy(&request));
    }

    // A new crawl forgets visited requests but keeps the session
    storage.reset()?;
    println!("\nAfter reset:");
    println!("  visited {}? {}", discovered[0], storage.is_visited(request_id("GET", discovered[0]))?);
    println!("  cookies: {}", storage.storage().cookies("example.com")?);

    storage.clear()?;
    println!("\nNamespace cleared");

    Ok(())
}
