//! Redis-backed store over an r2d2 connection pool.

use crate::config::StoreOptions;
use crate::store::{Reply, Script, Store};
use crate::{Error, Result};
use parking_lot::RwLock;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Connection pool type used by [`RedisStore`].
pub type RedisPool = r2d2::Pool<redis::Client>;

/// Pooled connection type used by [`RedisStore`].
pub type RedisPoolConnection = r2d2::PooledConnection<redis::Client>;

const DEFAULT_PORT: u16 = 6379;

/// Keys requested per SCAN step.
const SCAN_COUNT: u64 = 1000;

/// A store backed by a Redis server.
///
/// Every call checks a connection out of the pool and returns it when the
/// call finishes, on success and on error. Scripts are sent with EVALSHA and
/// transparently re-sent with EVAL when the server has not cached them yet.
pub struct RedisStore {
    pool: RedisPool,

    /// Loaded script handles keyed by script name
    scripts: RwLock<HashMap<&'static str, redis::Script>>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("pool", &self.pool.state()).finish()
    }
}

/// Builds connection info from `options` without going through a URL, so
/// passwords need no escaping.
pub fn connection_info(options: &StoreOptions) -> Result<ConnectionInfo> {
    let (host, port) = match options.address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                Error::invalid_argument(format!("invalid port in address {}", options.address))
            })?;
            (host.to_string(), port)
        }
        None => (options.address.clone(), DEFAULT_PORT),
    };

    if host.is_empty() {
        return Err(Error::invalid_argument(format!("missing host in address {}", options.address)));
    }

    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host, port),
        redis: RedisConnectionInfo {
            db: options.db,
            password: options.password.clone(),
            ..Default::default()
        },
    })
}

impl RedisStore {
    /// Connects to the server described by `options`.
    ///
    /// The pool opens its connections eagerly, so an unreachable server or a
    /// bad password surfaces here as an error.
    pub fn open(options: &StoreOptions) -> Result<Self> {
        options.validate()?;

        let client = redis::Client::open(connection_info(options)?)?;
        let pool = r2d2::Pool::builder()
            .max_size(options.pool_size)
            .connection_timeout(options.connection_timeout)
            .test_on_check_out(false)
            .build(client)?;

        log::info!("Connected to redis at {} (db {})", options.address, options.db);
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: RedisPool) -> Self {
        Self { pool, scripts: RwLock::new(HashMap::new()) }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    fn conn(&self) -> Result<RedisPoolConnection> {
        Ok(self.pool.get()?)
    }

    fn script_handle(&self, script: &Script) -> redis::Script {
        if let Some(handle) = self.scripts.read().get(script.name()) {
            return handle.clone();
        }

        let handle = redis::Script::new(script.source());
        self.scripts.write().insert(script.name(), handle.clone());
        handle
    }
}

/// Converts a redis value to a reply.
fn to_reply(value: Value) -> Result<Reply> {
    match value {
        Value::Nil => Ok(Reply::Nil),
        Value::Int(n) => Ok(Reply::Int(n)),
        Value::Data(data) => Ok(Reply::Data(data)),
        Value::Bulk(items) => items.into_iter().map(to_reply).collect::<Result<Vec<_>>>().map(Reply::Array),
        Value::Status(status) => Ok(Reply::Status(status)),
        Value::Okay => Ok(Reply::Status("OK".to_string())),
    }
}

/// Milliseconds for a PX argument. PX 0 is rejected by the server, and
/// durations past `u64::MAX` milliseconds saturate.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl Store for RedisStore {
    fn ping(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let _: String = redis::cmd("PING").query(&mut *conn)?;
        Ok(())
    }

    fn eval(&self, script: &Script, keys: &[&str], args: &[String]) -> Result<Reply> {
        let handle = self.script_handle(script);
        let mut invocation = handle.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }

        let mut conn = self.conn()?;
        let value: Value = invocation.invoke(&mut *conn)?;
        to_reply(value)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        Ok(redis::cmd("GET").arg(key).query(&mut *conn)?)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }

        let mut conn = self.conn()?;
        let _: Value = cmd.query(&mut *conn)?;
        Ok(())
    }

    fn del(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        Ok(redis::cmd("DEL").arg(keys).query(&mut *conn)?)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn()?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query(&mut *conn)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn rpush(&self, key: &str, value: &[u8]) -> Result<u64> {
        let mut conn = self.conn()?;
        Ok(redis::cmd("RPUSH").arg(key).arg(value).query(&mut *conn)?)
    }

    fn lpop(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        Ok(redis::cmd("LPOP").arg(key).query(&mut *conn)?)
    }

    fn llen(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn()?;
        Ok(redis::cmd("LLEN").arg(key).query(&mut *conn)?)
    }
}
