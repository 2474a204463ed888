//! Backing stores.
//!
//! A [`Store`] is the network key-value server (or a stand-in for it) that
//! holds the shared bit array and the exact-match sibling keys. Two
//! implementations are provided:
//!
//! - **RedisStore**: a pooled Redis connection; scripts run via EVALSHA/EVAL
//! - **MemoryStore**: an in-process keyspace with Redis semantics that runs
//!   the same Lua scripts in an embedded Lua VM
//!
//! Both run a script atomically with respect to every other command on the
//! store. This is what the filter relies on for all-or-nothing bit updates.

pub mod keyspace;
pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use crate::Result;
use std::time::Duration;

/// A server-side Lua script.
///
/// Scripts see the addressed keys in `KEYS` and the arguments in `ARGV`, and
/// talk to the store through `redis.call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Script {
    name: &'static str,
    source: &'static str,
}

impl Script {
    /// Declares a script.
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    /// Name used in logs and Lua chunk names.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Lua source.
    pub fn source(&self) -> &'static str {
        self.source
    }
}

/// A reply from the store, following the Redis reply model.
///
/// A script returning Lua `false` or `nil` produces [`Reply::Nil`]; Lua `true`
/// produces `Reply::Int(1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Null reply.
    Nil,
    /// Integer reply.
    Int(i64),
    /// Bulk string reply.
    Data(Vec<u8>),
    /// Status reply such as `OK` or `PONG`.
    Status(String),
    /// Array reply.
    Array(Vec<Reply>),
}

impl Reply {
    /// Interprets the reply as a Redis-style boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Reply::Nil => Some(false),
            Reply::Int(n) => Some(*n == 1),
            _ => None,
        }
    }
}

/// Trait for a shared key-value store with atomic server-side scripting.
///
/// Implementations must be safe to share between threads. Every method is a
/// single round trip; nothing is retried.
pub trait Store: Send + Sync {
    /// Checks that the store is reachable.
    fn ping(&self) -> Result<()>;

    /// Runs `script` atomically against `keys` with `args`.
    fn eval(&self, script: &Script, keys: &[&str], args: &[String]) -> Result<Reply>;

    /// Reads a string value. A missing key yields `None`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a string value with an optional time to live.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes keys and returns how many existed.
    fn del(&self, keys: &[String]) -> Result<u64>;

    /// Lists keys matching a glob pattern, without duplicates.
    fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Appends to a list and returns its new length.
    fn rpush(&self, key: &str, value: &[u8]) -> Result<u64>;

    /// Pops the head of a list. An empty or missing list yields `None`.
    fn lpop(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Returns the length of a list.
    fn llen(&self, key: &str) -> Result<u64>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn eval(&self, script: &Script, keys: &[&str], args: &[String]) -> Result<Reply> {
        (**self).eval(script, keys, args)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        (**self).set(key, value, ttl)
    }

    fn del(&self, keys: &[String]) -> Result<u64> {
        (**self).del(keys)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        (**self).keys(pattern)
    }

    fn rpush(&self, key: &str, value: &[u8]) -> Result<u64> {
        (**self).rpush(key, value)
    }

    fn lpop(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).lpop(key)
    }

    fn llen(&self, key: &str) -> Result<u64> {
        (**self).llen(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_as_bool() {
        assert_eq!(Reply::Nil.as_bool(), Some(false));
        assert_eq!(Reply::Int(1).as_bool(), Some(true));
        assert_eq!(Reply::Int(0).as_bool(), Some(false));
        assert_eq!(Reply::Data(b"1".to_vec()).as_bool(), None);
    }
}
