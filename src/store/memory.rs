//! In-process store that runs Lua scripts against a [`Keyspace`].
//!
//! `MemoryStore` behaves like a single Redis server living inside the
//! process. Each script runs in a fresh Lua VM while the keyspace lock is held,
//! so no other command or script can interleave with it. Failed scripts are
//! rolled back from a journal of the mutations they made.
//!
//! # Architecture
//!
//! ```text
//! Script Execution Flow:
//!
//! 1. lock keyspace
//! 2. redis.call(cmd, ...)  →  Journal undo record + Keyspace::call
//! 3. script returns        →  Lua value converted to Reply
//!
//! On success:  journal discarded, lock released
//! On failure:  journal replayed in reverse (automatic rollback)
//! ```

use crate::config::StoreOptions;
use crate::store::keyspace::{Journal, Keyspace};
use crate::store::{Reply, Script, Store};
use crate::{Error, Result};
use mlua::{Lua, Value as LuaValue, Variadic};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// An in-process store with Redis command and scripting semantics.
///
/// # Example
///
/// ```
/// use redbloom::store::{MemoryStore, Script, Store};
///
/// # fn main() -> Result<(), redbloom::Error> {
/// let store = MemoryStore::new();
///
/// let script = Script::new("mark", r#"
///     redis.call("setbit", KEYS[1], ARGV[1], 1)
///     return redis.call("getbit", KEYS[1], ARGV[1])
/// "#);
///
/// let reply = store.eval(&script, &["bits"], &["42".to_string()])?;
/// assert_eq!(reply.as_bool(), Some(true));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    keyspace: Mutex<Keyspace>,

    /// Maximum script execution time
    script_timeout: Option<Duration>,
}

impl MemoryStore {
    /// Creates an empty store with no script time limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with an optional script time limit.
    pub fn with_script_timeout(timeout: Option<Duration>) -> Self {
        Self { keyspace: Mutex::new(Keyspace::new()), script_timeout: timeout }
    }

    /// Creates an empty store configured from `options`.
    pub fn from_options(options: &StoreOptions) -> Self {
        Self::with_script_timeout(options.script_timeout)
    }

    /// Sets the script time limit.
    pub fn set_script_timeout(&mut self, timeout: Option<Duration>) {
        self.script_timeout = timeout;
    }

    /// Gets the current script time limit.
    pub fn script_timeout(&self) -> Option<Duration> {
        self.script_timeout
    }

    /// Number of live keys.
    pub fn key_count(&self) -> usize {
        self.keyspace.lock().len()
    }

    /// Counts the set bits stored under `key`.
    pub fn bit_count(&self, key: &str) -> Result<u64> {
        self.keyspace.lock().bitcount(key)
    }

    fn run_script(&self, keyspace: &mut Keyspace, script: &Script, keys: &[&str], args: &[String]) -> Result<Reply> {
        let start_time = Instant::now();
        let lua = Lua::new();

        if let Some(timeout) = self.script_timeout {
            lua.set_hook(
                mlua::HookTriggers { every_nth_instruction: Some(1000), ..Default::default() },
                move |_lua, _debug| {
                    if start_time.elapsed() > timeout {
                        Err(mlua::Error::RuntimeError("Script execution timeout".to_string()))
                    } else {
                        Ok(())
                    }
                },
            );
        }

        let mut journal = Journal::default();
        let calls = &mut *keyspace;
        let recorded = &mut journal;

        let result = lua.scope(|scope| {
            let call = scope.create_function_mut(move |lua, argv: Variadic<LuaValue<'_>>| {
                let argv = argv.iter().map(command_arg).collect::<mlua::Result<Vec<_>>>()?;
                let reply = calls.call_recorded(&argv, recorded).map_err(mlua::Error::external)?;
                reply_to_lua(lua, reply)
            })?;

            let redis_table = lua.create_table()?;
            redis_table.set("call", call)?;

            let globals = lua.globals();
            globals.set("redis", redis_table)?;
            globals.set("KEYS", lua.create_sequence_from(keys.iter().copied())?)?;
            globals.set("ARGV", lua.create_sequence_from(args.iter().map(String::as_str))?)?;

            let value = lua.load(script.source()).set_name(script.name()).eval::<LuaValue<'_>>()?;
            lua_to_reply(value)
        });

        match result {
            Ok(reply) => {
                log::debug!(
                    "Script {} executed in {:?} ({} mutations)",
                    script.name(),
                    start_time.elapsed(),
                    journal.len()
                );
                Ok(reply)
            }
            Err(e) => {
                log::warn!("Script {} failed, rolling back {} mutations: {}", script.name(), journal.len(), e);
                journal.rollback(keyspace);
                Err(Error::script(format!("{}: {}", script.name(), e)))
            }
        }
    }
}

/// Converts a `redis.call` argument to its wire form.
fn command_arg(value: &LuaValue<'_>) -> mlua::Result<Vec<u8>> {
    match value {
        LuaValue::String(s) => Ok(s.as_bytes().to_vec()),
        LuaValue::Integer(n) => Ok(n.to_string().into_bytes()),
        LuaValue::Number(n) => Ok(n.to_string().into_bytes()),
        other => Err(mlua::Error::RuntimeError(format!(
            "Lua redis() command arguments must be strings or integers, got {}",
            other.type_name()
        ))),
    }
}

/// Converts a command reply to the Lua value a script sees.
fn reply_to_lua<'lua>(lua: &'lua Lua, reply: Reply) -> mlua::Result<LuaValue<'lua>> {
    Ok(match reply {
        Reply::Nil => LuaValue::Boolean(false),
        Reply::Int(n) => LuaValue::Integer(n),
        Reply::Data(data) => LuaValue::String(lua.create_string(&data)?),
        Reply::Status(status) => {
            let table = lua.create_table()?;
            table.set("ok", status)?;
            LuaValue::Table(table)
        }
        Reply::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.into_iter().enumerate() {
                table.raw_set(i + 1, reply_to_lua(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
    })
}

/// Converts a script's return value to a reply.
///
/// `false` and `nil` become [`Reply::Nil`], `true` becomes `Int(1)`, numbers are
/// truncated to integers, and tables become arrays up to the first nil.
fn lua_to_reply(value: LuaValue<'_>) -> mlua::Result<Reply> {
    Ok(match value {
        LuaValue::Nil | LuaValue::Boolean(false) => Reply::Nil,
        LuaValue::Boolean(true) => Reply::Int(1),
        LuaValue::Integer(n) => Reply::Int(n),
        LuaValue::Number(n) => Reply::Int(n as i64),
        LuaValue::String(s) => Reply::Data(s.as_bytes().to_vec()),
        LuaValue::Table(table) => {
            if let Some(status) = table.get::<_, Option<String>>("ok")? {
                Reply::Status(status)
            } else if let Some(err) = table.get::<_, Option<String>>("err")? {
                return Err(mlua::Error::RuntimeError(err));
            } else {
                let items = table
                    .sequence_values::<LuaValue<'_>>()
                    .map(|item| item.and_then(lua_to_reply))
                    .collect::<mlua::Result<Vec<_>>>()?;
                Reply::Array(items)
            }
        }
        other => {
            return Err(mlua::Error::RuntimeError(format!(
                "unsupported script return type {}",
                other.type_name()
            )))
        }
    })
}

impl Store for MemoryStore {
    fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn eval(&self, script: &Script, keys: &[&str], args: &[String]) -> Result<Reply> {
        let mut keyspace = self.keyspace.lock();
        self.run_script(&mut keyspace, script, keys, args)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.keyspace.lock().get(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.keyspace.lock().set(key, value.to_vec(), ttl);
        Ok(())
    }

    fn del(&self, keys: &[String]) -> Result<u64> {
        Ok(self.keyspace.lock().del(keys))
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self.keyspace.lock().keys(pattern))
    }

    fn rpush(&self, key: &str, value: &[u8]) -> Result<u64> {
        self.keyspace.lock().rpush(key, value.to_vec())
    }

    fn lpop(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.keyspace.lock().lpop(key)
    }

    fn llen(&self, key: &str) -> Result<u64> {
        self.keyspace.lock().llen(key)
    }
}
