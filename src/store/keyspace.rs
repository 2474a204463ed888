//! In-memory keyspace with Redis command semantics.
//!
//! Implements the subset of commands RedBloom and its scripts use. Bit
//! addressing matches Redis: offset `n` is bit `7 - n % 8` of byte `n / 8`,
//! so a bitmap written here reads back identically from a real server.

use crate::store::Reply;
use crate::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Highest bit offset a Redis string can address.
const MAX_BIT_OFFSET: u64 = (1 << 32) - 1;

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    List(VecDeque<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// A map of keys to string or list values with lazy expiry.
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: HashMap<String, Entry>,
}

fn wrong_type() -> Error {
    Error::command("WRONGTYPE Operation against a key holding the wrong kind of value")
}

fn parse_int(arg: &[u8]) -> Result<i64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Error::command("ERR value is not an integer or out of range"))
}

fn parse_bit_offset(arg: &[u8]) -> Result<u64> {
    let offset = parse_int(arg)
        .map_err(|_| Error::command("ERR bit offset is not an integer or out of range"))?;
    if offset < 0 || offset as u64 > MAX_BIT_OFFSET {
        return Err(Error::command("ERR bit offset is not an integer or out of range"));
    }
    Ok(offset as u64)
}

fn key_arg(arg: &[u8]) -> String {
    String::from_utf8_lossy(arg).into_owned()
}

impl Keyspace {
    /// Creates an empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Returns true if no live keys exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops `key` if it has expired.
    fn expire_if_needed(&mut self, key: &str) {
        let now = Instant::now();
        if self.entries.get(key).map_or(false, |e| e.is_expired(now)) {
            self.entries.remove(key);
        }
    }

    fn lookup(&mut self, key: &str) -> Option<&mut Entry> {
        self.expire_if_needed(key);
        self.entries.get_mut(key)
    }

    /// Runs one command given as raw arguments, command name first.
    pub fn call(&mut self, args: &[Vec<u8>]) -> Result<Reply> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| Error::command("ERR wrong number of arguments"))?;
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();

        let arity = |min: usize| -> Result<()> {
            if rest.len() < min {
                Err(Error::command(format!(
                    "ERR wrong number of arguments for '{}' command",
                    name.to_ascii_lowercase()
                )))
            } else {
                Ok(())
            }
        };

        match name.as_str() {
            "PING" => Ok(Reply::Status("PONG".to_string())),
            "SETBIT" => {
                arity(3)?;
                let offset = parse_bit_offset(&rest[1])?;
                let bit = match rest[2].as_slice() {
                    b"0" => false,
                    b"1" => true,
                    _ => return Err(Error::command("ERR bit is not an integer or out of range")),
                };
                let previous = self.setbit(&key_arg(&rest[0]), offset, bit)?;
                Ok(Reply::Int(previous as i64))
            }
            "GETBIT" => {
                arity(2)?;
                let offset = parse_bit_offset(&rest[1])?;
                Ok(Reply::Int(self.getbit(&key_arg(&rest[0]), offset)? as i64))
            }
            "BITCOUNT" => {
                arity(1)?;
                Ok(Reply::Int(self.bitcount(&key_arg(&rest[0]))? as i64))
            }
            "GET" => {
                arity(1)?;
                Ok(self.get(&key_arg(&rest[0]))?.map_or(Reply::Nil, Reply::Data))
            }
            "SET" => {
                arity(2)?;
                let ttl = match rest.get(2).map(|opt| opt.to_ascii_uppercase()) {
                    None => None,
                    Some(opt) if opt == b"PX" || opt == b"EX" => {
                        let amount = rest
                            .get(3)
                            .ok_or_else(|| Error::command("ERR syntax error"))
                            .and_then(|a| parse_int(a))?;
                        if amount <= 0 {
                            return Err(Error::command("ERR invalid expire time in 'set' command"));
                        }
                        Some(if opt == b"PX" {
                            Duration::from_millis(amount as u64)
                        } else {
                            Duration::from_secs(amount as u64)
                        })
                    }
                    Some(_) => return Err(Error::command("ERR syntax error")),
                };
                self.set(&key_arg(&rest[0]), rest[1].clone(), ttl);
                Ok(Reply::Status("OK".to_string()))
            }
            "DEL" => {
                arity(1)?;
                let keys: Vec<String> = rest.iter().map(|k| key_arg(k)).collect();
                Ok(Reply::Int(self.del(&keys) as i64))
            }
            "EXISTS" => {
                arity(1)?;
                let count = rest.iter().filter(|k| self.lookup(&key_arg(k)).is_some()).count();
                Ok(Reply::Int(count as i64))
            }
            "KEYS" => {
                arity(1)?;
                let keys = self.keys(&key_arg(&rest[0]));
                Ok(Reply::Array(keys.into_iter().map(|k| Reply::Data(k.into_bytes())).collect()))
            }
            "RPUSH" => {
                arity(2)?;
                let key = key_arg(&rest[0]);
                let mut len = 0;
                for value in &rest[1..] {
                    len = self.rpush(&key, value.clone())?;
                }
                Ok(Reply::Int(len as i64))
            }
            "LPOP" => {
                arity(1)?;
                Ok(self.lpop(&key_arg(&rest[0]))?.map_or(Reply::Nil, Reply::Data))
            }
            "LLEN" => {
                arity(1)?;
                Ok(Reply::Int(self.llen(&key_arg(&rest[0]))? as i64))
            }
            other => Err(Error::command(format!("ERR unknown command '{}'", other.to_ascii_lowercase()))),
        }
    }

    /// Sets or clears one bit and returns its previous value.
    pub fn setbit(&mut self, key: &str, offset: u64, bit: bool) -> Result<bool> {
        self.expire_if_needed(key);
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry { value: Value::Bytes(Vec::new()), expires_at: None });

        let bytes = match &mut entry.value {
            Value::Bytes(b) => b,
            Value::List(_) => return Err(wrong_type()),
        };

        let index = (offset / 8) as usize;
        let mask = 1u8 << (7 - (offset % 8));
        if bytes.len() <= index {
            bytes.resize(index + 1, 0);
        }

        let previous = bytes[index] & mask != 0;
        if bit {
            bytes[index] |= mask;
        } else {
            bytes[index] &= !mask;
        }
        Ok(previous)
    }

    /// Reads one bit. Missing keys and offsets past the end read as zero.
    pub fn getbit(&mut self, key: &str, offset: u64) -> Result<bool> {
        match self.lookup(key).map(|e| &e.value) {
            None => Ok(false),
            Some(Value::List(_)) => Err(wrong_type()),
            Some(Value::Bytes(bytes)) => {
                let index = (offset / 8) as usize;
                let mask = 1u8 << (7 - (offset % 8));
                Ok(bytes.get(index).map_or(false, |b| b & mask != 0))
            }
        }
    }

    /// Counts set bits in a string value.
    pub fn bitcount(&mut self, key: &str) -> Result<u64> {
        match self.lookup(key).map(|e| &e.value) {
            None => Ok(0),
            Some(Value::List(_)) => Err(wrong_type()),
            Some(Value::Bytes(bytes)) => Ok(bytes.iter().map(|b| b.count_ones() as u64).sum()),
        }
    }

    /// Reads a string value.
    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.lookup(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::List(_)) => Err(wrong_type()),
            Some(Value::Bytes(bytes)) => Ok(Some(bytes.clone())),
        }
    }

    /// Writes a string value, replacing any previous value and expiry.
    ///
    /// A TTL too large to represent never expires.
    pub fn set(&mut self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries.insert(key.to_string(), Entry { value: Value::Bytes(value), expires_at });
    }

    /// Deletes keys and returns how many were live.
    pub fn del(&mut self, keys: &[String]) -> u64 {
        let now = Instant::now();
        keys.iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|entry| !entry.is_expired(now))
            .count() as u64
    }

    /// Lists live keys matching a glob pattern, sorted.
    pub fn keys(&mut self, pattern: &str) -> Vec<String> {
        let now = Instant::now();
        self.entries.retain(|_, e| !e.is_expired(now));

        let mut keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| glob_match(pattern.as_bytes(), key.as_bytes()))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Appends to a list and returns its new length.
    pub fn rpush(&mut self, key: &str, value: Vec<u8>) -> Result<u64> {
        self.expire_if_needed(key);
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry { value: Value::List(VecDeque::new()), expires_at: None });

        match &mut entry.value {
            Value::List(list) => {
                list.push_back(value);
                Ok(list.len() as u64)
            }
            Value::Bytes(_) => Err(wrong_type()),
        }
    }

    /// Pops the head of a list, removing the key once it is empty.
    pub fn lpop(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let (popped, now_empty) = match self.lookup(key).map(|e| &mut e.value) {
            None => return Ok(None),
            Some(Value::Bytes(_)) => return Err(wrong_type()),
            Some(Value::List(list)) => (list.pop_front(), list.is_empty()),
        };

        if now_empty {
            self.entries.remove(key);
        }
        Ok(popped)
    }

    /// Returns the length of a list.
    pub fn llen(&mut self, key: &str) -> Result<u64> {
        match self.lookup(key).map(|e| &e.value) {
            None => Ok(0),
            Some(Value::Bytes(_)) => Err(wrong_type()),
            Some(Value::List(list)) => Ok(list.len() as u64),
        }
    }
}

/// Undo record for one mutation made by a script.
#[derive(Debug)]
enum Undo {
    /// Restore a key to its previous entry, or remove it if it did not exist.
    Entry { key: String, previous: Option<Entry> },
    /// Restore a single bit.
    Bit { key: String, offset: u64, previous: bool },
}

/// Mutations made by a running script, in order, for rollback on failure.
#[derive(Debug, Default)]
pub struct Journal {
    undo: Vec<Undo>,
}

impl Journal {
    /// Number of recorded mutations.
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Reverts every recorded mutation, newest first.
    pub fn rollback(self, keyspace: &mut Keyspace) {
        for undo in self.undo.into_iter().rev() {
            match undo {
                Undo::Entry { key, previous: Some(entry) } => {
                    keyspace.entries.insert(key, entry);
                }
                Undo::Entry { key, previous: None } => {
                    keyspace.entries.remove(&key);
                }
                Undo::Bit { key, offset, previous } => {
                    // The key held a string when the bit was recorded.
                    let _ = keyspace.setbit(&key, offset, previous);
                }
            }
        }
    }
}

impl Keyspace {
    /// Runs one command like [`Keyspace::call`], recording how to undo it.
    pub fn call_recorded(&mut self, args: &[Vec<u8>], journal: &mut Journal) -> Result<Reply> {
        let name = args.first().map(|n| n.to_ascii_uppercase()).unwrap_or_default();

        match name.as_slice() {
            b"SETBIT" if args.len() >= 4 => {
                let key = key_arg(&args[1]);
                let offset = parse_bit_offset(&args[2])?;
                if self.lookup(&key).is_none() {
                    journal.undo.push(Undo::Entry { key, previous: None });
                } else {
                    let previous = self.getbit(&key, offset)?;
                    journal.undo.push(Undo::Bit { key, offset, previous });
                }
            }
            b"SET" | b"RPUSH" | b"LPOP" if args.len() >= 2 => {
                self.snapshot(key_arg(&args[1]), journal);
            }
            b"DEL" => {
                for key in &args[1..] {
                    self.snapshot(key_arg(key), journal);
                }
            }
            _ => {}
        }

        self.call(args)
    }

    fn snapshot(&mut self, key: String, journal: &mut Journal) {
        self.expire_if_needed(&key);
        let previous = self.entries.get(&key).cloned();
        journal.undo.push(Undo::Entry { key, previous });
    }
}

/// Matches Redis KEYS glob patterns: `*`, `?`, `[abc]`, `[a-z]`, `[^a]` and `\` escapes.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|skip| glob_match(rest, &text[skip..])),
        Some((b'?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((b'[', rest)) => {
            let Some((&c, text_rest)) = text.split_first() else {
                return false;
            };
            let Some(close) = rest.iter().position(|&b| b == b']') else {
                // Unterminated class: treat '[' literally
                return c == b'[' && glob_match(rest, text_rest);
            };

            let (class, after) = (&rest[..close], &rest[close + 1..]);
            let (negate, class) = match class.split_first() {
                Some((b'^', tail)) => (true, tail),
                _ => (false, class),
            };

            let mut matched = false;
            let mut i = 0;
            while i < class.len() {
                if i + 2 < class.len() && class[i + 1] == b'-' {
                    let (lo, hi) = (class[i].min(class[i + 2]), class[i].max(class[i + 2]));
                    matched |= (lo..=hi).contains(&c);
                    i += 3;
                } else {
                    matched |= class[i] == c;
                    i += 1;
                }
            }

            matched != negate && glob_match(after, text_rest)
        }
        Some((b'\\', rest)) if !rest.is_empty() => {
            !text.is_empty() && text[0] == rest[0] && glob_match(&rest[1..], &text[1..])
        }
        Some((&p, rest)) => !text.is_empty() && text[0] == p && glob_match(rest, &text[1..]),
    }
}
