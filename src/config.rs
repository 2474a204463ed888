//! Configuration for RedBloom filters and their backing store.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest bit array a Redis string can address (512MB of bits).
pub const MAX_WIDTH: u64 = 1 << 32;

/// Current layout version of [`FilterParams`].
pub const FORMAT_VERSION: u32 = 1;

/// Hash count used by the default and capacity-derived parameters.
pub const DEFAULT_HASH_COUNT: u32 = 14;

/// Bits allocated per expected element by [`FilterParams::for_capacity`].
pub const BITS_PER_ELEMENT: u64 = 20;

/// Sizing parameters of a filter.
///
/// These are part of the identity of the persisted bit array, like an on-disk
/// format version. Changing `width` or `hash_count` (or the hash function,
/// which is tied to `format_version`) after data has been written makes every
/// earlier membership answer unreliable. Rebuild the filter from source data
/// instead.
///
/// With `hash_count = 14` and `width = 20 * elements` the expected false
/// positive rate is about 6.7e-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Layout version; bumped whenever offsets would be derived differently.
    pub format_version: u32,

    /// Total number of addressable bit positions.
    pub width: u64,

    /// Number of bit positions per element.
    pub hash_count: u32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self { format_version: FORMAT_VERSION, width: MAX_WIDTH, hash_count: DEFAULT_HASH_COUNT }
    }
}

impl FilterParams {
    /// Creates parameters with an explicit width and hash count.
    pub fn new(width: u64, hash_count: u32) -> Self {
        Self { format_version: FORMAT_VERSION, width, hash_count }
    }

    /// Sizes a filter for `expected_elements` at 20 bits per element.
    pub fn for_capacity(expected_elements: u64) -> Self {
        let width = expected_elements.saturating_mul(BITS_PER_ELEMENT).clamp(64, MAX_WIDTH);
        Self::new(width, DEFAULT_HASH_COUNT)
    }

    /// Estimated false positive rate once `elements` distinct items are added.
    ///
    /// p = (1 - e^(-kn/m))^k
    pub fn false_positive_rate(&self, elements: u64) -> f64 {
        if elements == 0 || self.width == 0 {
            return 0.0;
        }

        let k = self.hash_count as f64;
        let n = elements as f64;
        let m = self.width as f64;

        (1.0 - (-k * n / m).exp()).powf(k)
    }

    /// Validates the parameters and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(Error::invalid_argument(format!(
                "unsupported filter format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            )));
        }
        if self.width == 0 || self.width > MAX_WIDTH {
            return Err(Error::invalid_argument(format!(
                "width must be in 1..={}, got {}",
                MAX_WIDTH, self.width
            )));
        }
        // The per-hash discriminator is a single byte.
        if self.hash_count == 0 || self.hash_count > 256 {
            return Err(Error::invalid_argument(format!(
                "hash_count must be in 1..=256, got {}",
                self.hash_count
            )));
        }
        Ok(())
    }
}

/// Connection and namespace options for the backing store.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Server address as `host:port`.
    /// Default: 127.0.0.1:6379
    pub address: String,

    /// Optional password.
    /// Default: None
    pub password: Option<String>,

    /// Logical database index.
    /// Default: 0
    pub db: i64,

    /// Namespace prefix for every key. Lets independent crawls share one database.
    /// Default: ""
    pub prefix: String,

    /// Expiration for exact-match visited keys. After expiry a request may be
    /// visited again.
    /// Default: None (never expire)
    #[serde(with = "opt_millis")]
    pub expires: Option<Duration>,

    /// Maximum number of pooled connections.
    /// Default: 16
    pub pool_size: u32,

    /// Time to wait for a pooled connection.
    /// Default: 5s
    #[serde(with = "millis")]
    pub connection_timeout: Duration,

    /// Script time limit for the in-memory store.
    /// Default: None
    #[serde(with = "opt_millis")]
    pub script_timeout: Option<Duration>,
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("address", &self.address)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("db", &self.db)
            .field("prefix", &self.prefix)
            .field("expires", &self.expires)
            .field("pool_size", &self.pool_size)
            .field("connection_timeout", &self.connection_timeout)
            .field("script_timeout", &self.script_timeout)
            .finish()
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            password: None,
            db: 0,
            prefix: String::new(),
            expires: None,
            pool_size: 16,
            connection_timeout: Duration::from_secs(5),
            script_timeout: None,
        }
    }
}

impl StoreOptions {
    /// Creates a new StoreOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server address.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the logical database index.
    pub fn db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// Sets the key namespace prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the expiration of exact-match visited keys.
    pub fn expires(mut self, expires: Duration) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Sets the connection pool size.
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Sets the connection acquisition timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the script time limit for the in-memory store.
    pub fn script_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout = Some(timeout);
        self
    }

    /// Loads options from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        let options: StoreOptions = serde_json::from_slice(&data)?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from `REDBLOOM_*` environment variables over the defaults.
    ///
    /// Recognized: `REDBLOOM_ADDRESS`, `REDBLOOM_PASSWORD`, `REDBLOOM_DB`,
    /// `REDBLOOM_PREFIX`, `REDBLOOM_POOL_SIZE`.
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();

        if let Ok(address) = std::env::var("REDBLOOM_ADDRESS") {
            options.address = address;
        }
        if let Ok(password) = std::env::var("REDBLOOM_PASSWORD") {
            options.password = Some(password);
        }
        if let Ok(db) = std::env::var("REDBLOOM_DB") {
            options.db = db
                .parse()
                .map_err(|_| Error::invalid_argument(format!("REDBLOOM_DB is not an integer: {}", db)))?;
        }
        if let Ok(prefix) = std::env::var("REDBLOOM_PREFIX") {
            options.prefix = prefix;
        }
        if let Ok(size) = std::env::var("REDBLOOM_POOL_SIZE") {
            options.pool_size = size.parse().map_err(|_| {
                Error::invalid_argument(format!("REDBLOOM_POOL_SIZE is not an integer: {}", size))
            })?;
        }

        options.validate()?;
        Ok(options)
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::invalid_argument("address must not be empty"));
        }
        if self.db < 0 {
            return Err(Error::invalid_argument("db must be >= 0"));
        }
        if self.pool_size == 0 {
            return Err(Error::invalid_argument("pool_size must be > 0"));
        }
        if self.connection_timeout.is_zero() {
            return Err(Error::invalid_argument("connection_timeout must be > 0"));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_params() {
        let params = FilterParams::default();
        assert_eq!(params.width, 1 << 32);
        assert_eq!(params.hash_count, 14);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_for_capacity() {
        let params = FilterParams::for_capacity(1_000_000);
        assert_eq!(params.width, 20_000_000);
        assert_eq!(params.hash_count, 14);

        // Tiny and huge capacities are clamped
        assert_eq!(FilterParams::for_capacity(0).width, 64);
        assert_eq!(FilterParams::for_capacity(u64::MAX).width, MAX_WIDTH);
    }

    #[test]
    fn test_false_positive_rate() {
        let params = FilterParams::for_capacity(10_000);
        let rate = params.false_positive_rate(10_000);
        assert!(rate > 5e-5 && rate < 8e-5, "rate = {}", rate);
        assert_eq!(params.false_positive_rate(0), 0.0);
    }

    #[test]
    fn test_params_validation() {
        assert!(FilterParams::new(1024, 2).validate().is_ok());
        assert!(FilterParams::new(0, 2).validate().is_err());
        assert!(FilterParams::new(MAX_WIDTH + 1, 2).validate().is_err());
        assert!(FilterParams::new(1024, 0).validate().is_err());
        assert!(FilterParams::new(1024, 256).validate().is_ok());
        assert!(FilterParams::new(1024, 257).validate().is_err());

        let mut params = FilterParams::new(1024, 2);
        params.format_version = 99;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_params_serde() {
        let params = FilterParams::new(1024, 2);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"format_version":1,"width":1024,"hash_count":2}"#);
    }

    #[test]
    fn test_default_options() {
        let opts = StoreOptions::default();
        assert_eq!(opts.address, "127.0.0.1:6379");
        assert_eq!(opts.db, 0);
        assert!(opts.password.is_none());
        assert!(opts.expires.is_none());
    }

    #[test]
    fn test_options_builder() {
        let opts = StoreOptions::new()
            .address("redis.local:6380")
            .password("secret")
            .db(3)
            .prefix("crawl")
            .expires(Duration::from_secs(60))
            .pool_size(4);

        assert_eq!(opts.address, "redis.local:6380");
        assert_eq!(opts.password.as_deref(), Some("secret"));
        assert_eq!(opts.db, 3);
        assert_eq!(opts.prefix, "crawl");
        assert_eq!(opts.expires, Some(Duration::from_secs(60)));
        assert_eq!(opts.pool_size, 4);
    }

    #[test]
    fn test_options_validation() {
        let mut opts = StoreOptions::default();
        assert!(opts.validate().is_ok());

        opts.pool_size = 0;
        assert!(opts.validate().is_err());

        opts.pool_size = 1;
        opts.db = -1;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_options_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"address": "10.0.0.5:6379", "prefix": "bl", "expires": 1500}}"#).unwrap();

        let opts = StoreOptions::from_json_file(file.path()).unwrap();
        assert_eq!(opts.address, "10.0.0.5:6379");
        assert_eq!(opts.prefix, "bl");
        assert_eq!(opts.expires, Some(Duration::from_millis(1500)));
        assert_eq!(opts.pool_size, 16);
    }

    #[test]
    fn test_options_from_invalid_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = StoreOptions::from_json_file(file.path());
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_debug_redacts_password() {
        let options = StoreOptions::new().password("hunter2").prefix("crawl");
        let printed = format!("{:?}", options);

        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("crawl"));
        assert!(format!("{:?}", StoreOptions::new()).contains("password: None"));
    }
}
