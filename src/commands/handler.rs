//! Command Dispatcher
//!
//! This module routes decoded requests to the storage engine. Every command is
//! an entry in a static table holding its name, its argument bounds, a usage
//! line and the function that runs it. Dispatch is a case-insensitive lookup in
//! that table followed by an arity check, so adding a command means adding one
//! row and one handler.
//!
//! ## Supported Commands
//!
//! ### Strings and Keys
//! - `SET key value [value ...]` - Set a key (extra tokens are joined with spaces)
//! - `GET key`, `DEL key [key ...]`, `EXISTS key [key ...]`
//! - `INCR key`, `DECR key`
//! - `MSET key value [key value ...]`, `MGET key [key ...]`
//! - `EXPIRE key seconds`, `TTL key`, `PERSIST key`, `TYPE key`
//! - `KEYS [pattern]`, `DUMPALL`
//!
//! ### Collections
//! - `LPUSH key value [value ...]`, `RPOP key`, `LLEN key`
//! - `SADD key member [member ...]`, `SREM key member [member ...]`, `SMEMBERS key`
//! - `HSET key field value`, `HGET key field`, `HDEL key field [field ...]`, `HGETALL key`
//! - `ZADD key score member`, `ZREM key member`, `ZRANGE key start stop`, `ZSCORE key member`
//!
//! ### Server
//! - `PING [message]`, `ECHO message`, `DBSIZE`, `FLUSHDB`, `QUIT`
//! - `COMMANDS`, `HELP` - List usage lines
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │  lookup()   │───>│   arity     │───>│  handler    │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::RespValue;
use crate::storage::{StorageEngine, StoreError};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Errors a command can report to the client.
///
/// Every variant leaves the keyspace unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{0}'")]
    WrongArity(&'static str),

    #[error("value is not an integer or out of range")]
    NotAnInteger,

    #[error("invalid expire time")]
    InvalidExpireTime,

    #[error("value is not a valid float")]
    NotAFloat,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for command handlers.
pub type CommandResult = Result<RespValue, CommandError>;

type HandlerFn = fn(&CommandHandler, &[Bytes]) -> CommandResult;

/// One row of the command table.
struct CommandSpec {
    name: &'static str,
    /// Minimum number of arguments after the command name
    min_args: usize,
    /// Maximum number of arguments, `None` for variadic commands
    max_args: Option<usize>,
    usage: &'static str,
    handler: HandlerFn,
}

impl CommandSpec {
    fn accepts(&self, argc: usize) -> bool {
        argc >= self.min_args && self.max_args.map_or(true, |max| argc <= max)
    }
}

const fn spec(
    name: &'static str,
    min_args: usize,
    max_args: Option<usize>,
    usage: &'static str,
    handler: HandlerFn,
) -> CommandSpec {
    CommandSpec {
        name,
        min_args,
        max_args,
        usage,
        handler,
    }
}

static COMMAND_TABLE: &[CommandSpec] = &[
    // Server
    spec("PING", 0, Some(1), "PING [message]", CommandHandler::cmd_ping),
    spec("ECHO", 1, Some(1), "ECHO message", CommandHandler::cmd_echo),
    spec("DBSIZE", 0, Some(0), "DBSIZE", CommandHandler::cmd_dbsize),
    spec("FLUSHDB", 0, Some(0), "FLUSHDB", CommandHandler::cmd_flushdb),
    spec("QUIT", 0, Some(0), "QUIT", CommandHandler::cmd_quit),
    spec("COMMANDS", 0, Some(0), "COMMANDS", CommandHandler::cmd_commands),
    spec("HELP", 0, Some(0), "HELP", CommandHandler::cmd_commands),
    // Strings
    spec("SET", 2, None, "SET key value", CommandHandler::cmd_set),
    spec("GET", 1, Some(1), "GET key", CommandHandler::cmd_get),
    spec("INCR", 1, Some(1), "INCR key", CommandHandler::cmd_incr),
    spec("DECR", 1, Some(1), "DECR key", CommandHandler::cmd_decr),
    spec("MSET", 2, None, "MSET key value [key value ...]", CommandHandler::cmd_mset),
    spec("MGET", 1, None, "MGET key [key ...]", CommandHandler::cmd_mget),
    // Keys
    spec("DEL", 1, None, "DEL key [key ...]", CommandHandler::cmd_del),
    spec("EXISTS", 1, None, "EXISTS key [key ...]", CommandHandler::cmd_exists),
    spec("EXPIRE", 2, Some(2), "EXPIRE key seconds", CommandHandler::cmd_expire),
    spec("TTL", 1, Some(1), "TTL key", CommandHandler::cmd_ttl),
    spec("PERSIST", 1, Some(1), "PERSIST key", CommandHandler::cmd_persist),
    spec("TYPE", 1, Some(1), "TYPE key", CommandHandler::cmd_type),
    spec("KEYS", 0, Some(1), "KEYS [pattern]", CommandHandler::cmd_keys),
    spec("DUMPALL", 0, Some(0), "DUMPALL", CommandHandler::cmd_dumpall),
    // Lists
    spec("LPUSH", 2, None, "LPUSH key value [value ...]", CommandHandler::cmd_lpush),
    spec("RPOP", 1, Some(1), "RPOP key", CommandHandler::cmd_rpop),
    spec("LLEN", 1, Some(1), "LLEN key", CommandHandler::cmd_llen),
    // Sets
    spec("SADD", 2, None, "SADD key member [member ...]", CommandHandler::cmd_sadd),
    spec("SREM", 2, None, "SREM key member [member ...]", CommandHandler::cmd_srem),
    spec("SMEMBERS", 1, Some(1), "SMEMBERS key", CommandHandler::cmd_smembers),
    // Hashes
    spec("HSET", 3, Some(3), "HSET key field value", CommandHandler::cmd_hset),
    spec("HGET", 2, Some(2), "HGET key field", CommandHandler::cmd_hget),
    spec("HDEL", 2, None, "HDEL key field [field ...]", CommandHandler::cmd_hdel),
    spec("HGETALL", 1, Some(1), "HGETALL key", CommandHandler::cmd_hgetall),
    // Sorted sets
    spec("ZADD", 3, Some(3), "ZADD key score member", CommandHandler::cmd_zadd),
    spec("ZREM", 2, Some(2), "ZREM key member", CommandHandler::cmd_zrem),
    spec("ZRANGE", 3, Some(3), "ZRANGE key start stop", CommandHandler::cmd_zrange),
    spec("ZSCORE", 2, Some(2), "ZSCORE key member", CommandHandler::cmd_zscore),
];

/// Finds a command by name, ignoring ASCII case.
fn lookup(name: &[u8]) -> Option<&'static CommandSpec> {
    COMMAND_TABLE
        .iter()
        .find(|spec| spec.name.as_bytes().eq_ignore_ascii_case(name))
}

/// Returns true if `name` is the command that ends a session.
pub fn is_quit(name: &[u8]) -> bool {
    name.eq_ignore_ascii_case(b"QUIT")
}

/// Returns the usage line of every command, in table order.
pub fn usage_lines() -> impl Iterator<Item = &'static str> {
    COMMAND_TABLE.iter().map(|spec| spec.usage)
}

/// Handles commands by dispatching them to the storage engine.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Executes a command and returns the reply.
    ///
    /// `request` holds the command name followed by its arguments. Errors are
    /// turned into error replies; nothing here closes the connection.
    pub fn execute(&self, request: &[Bytes]) -> RespValue {
        match self.dispatch(request) {
            Ok(reply) => reply,
            Err(err) => RespValue::error(err.to_string()),
        }
    }

    /// Looks up the command, checks its arity and runs it.
    pub fn dispatch(&self, request: &[Bytes]) -> CommandResult {
        let Some((name, args)) = request.split_first() else {
            return Err(CommandError::UnknownCommand(String::new()));
        };

        let spec = lookup(name).ok_or_else(|| {
            CommandError::UnknownCommand(String::from_utf8_lossy(name).into_owned())
        })?;

        if !spec.accepts(args.len()) {
            return Err(CommandError::WrongArity(spec.name));
        }

        trace!(command = spec.name, argc = args.len(), "Dispatching command");
        (spec.handler)(self, args)
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// PING [message]
    fn cmd_ping(&self, args: &[Bytes]) -> CommandResult {
        Ok(match args.first() {
            Some(msg) => RespValue::bulk_string(msg.clone()),
            None => RespValue::pong(),
        })
    }

    /// ECHO message
    fn cmd_echo(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::bulk_string(args[0].clone()))
    }

    fn cmd_dbsize(&self, _args: &[Bytes]) -> CommandResult {
        Ok(RespValue::integer(self.storage.len() as i64))
    }

    fn cmd_flushdb(&self, _args: &[Bytes]) -> CommandResult {
        self.storage.flush();
        Ok(RespValue::ok())
    }

    /// The connection closes itself after sending this reply.
    fn cmd_quit(&self, _args: &[Bytes]) -> CommandResult {
        Ok(RespValue::ok())
    }

    /// COMMANDS / HELP
    fn cmd_commands(&self, _args: &[Bytes]) -> CommandResult {
        let lines = usage_lines().map(|usage| Bytes::from_static(usage.as_bytes()));
        Ok(RespValue::bulk_array(lines))
    }

    // ========================================================================
    // String Commands
    // ========================================================================

    /// SET key value [value ...]
    fn cmd_set(&self, args: &[Bytes]) -> CommandResult {
        let value = match &args[1..] {
            [single] => single.clone(),
            tokens => join_tokens(tokens),
        };
        self.storage.set(args[0].clone(), value);
        Ok(RespValue::ok())
    }

    fn cmd_get(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::optional(self.storage.get(&args[0])))
    }

    fn cmd_incr(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::integer(self.storage.incr(&args[0])?))
    }

    fn cmd_decr(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::integer(self.storage.decr(&args[0])?))
    }

    /// MSET key value [key value ...]
    fn cmd_mset(&self, args: &[Bytes]) -> CommandResult {
        self.storage.mset(args)?;
        Ok(RespValue::ok())
    }

    fn cmd_mget(&self, args: &[Bytes]) -> CommandResult {
        let values = self
            .storage
            .mget(args)
            .into_iter()
            .map(RespValue::optional)
            .collect();
        Ok(RespValue::array(values))
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    fn cmd_del(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::integer(self.storage.delete_many(args) as i64))
    }

    fn cmd_exists(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::integer(self.storage.exists_many(args) as i64))
    }

    /// EXPIRE key seconds
    ///
    /// Seconds must be a non-negative integer; zero expires the key at once.
    fn cmd_expire(&self, args: &[Bytes]) -> CommandResult {
        let seconds = parse_i64(&args[1])
            .filter(|s| *s >= 0)
            .ok_or(CommandError::InvalidExpireTime)?;

        let applied = self
            .storage
            .expire(&args[0], Duration::from_secs(seconds as u64));
        Ok(RespValue::boolean(applied))
    }

    fn cmd_ttl(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::integer(self.storage.ttl(&args[0])))
    }

    fn cmd_persist(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::boolean(self.storage.persist(&args[0])))
    }

    fn cmd_type(&self, args: &[Bytes]) -> CommandResult {
        let name = self
            .storage
            .key_type(&args[0])
            .map(|kind| kind.as_str())
            .unwrap_or("none");
        Ok(RespValue::simple_string(name))
    }

    /// KEYS [pattern]
    fn cmd_keys(&self, args: &[Bytes]) -> CommandResult {
        let pattern = args.first().map(|p| &p[..]);
        Ok(RespValue::bulk_array(self.storage.keys(pattern)))
    }

    /// DUMPALL: every string key and its value, interleaved.
    fn cmd_dumpall(&self, _args: &[Bytes]) -> CommandResult {
        let pairs = self.storage.dump_strings();
        Ok(RespValue::bulk_array(
            pairs.into_iter().flat_map(|(k, v)| [k, v]),
        ))
    }

    // ========================================================================
    // List Commands
    // ========================================================================

    /// LPUSH key value [value ...]
    fn cmd_lpush(&self, args: &[Bytes]) -> CommandResult {
        let len = self.storage.lpush(&args[0], args[1..].to_vec());
        Ok(RespValue::integer(len as i64))
    }

    fn cmd_rpop(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::optional(self.storage.rpop(&args[0])))
    }

    fn cmd_llen(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::integer(self.storage.llen(&args[0]) as i64))
    }

    // ========================================================================
    // Set Commands
    // ========================================================================

    fn cmd_sadd(&self, args: &[Bytes]) -> CommandResult {
        let added = self.storage.sadd(&args[0], args[1..].to_vec());
        Ok(RespValue::integer(added as i64))
    }

    fn cmd_srem(&self, args: &[Bytes]) -> CommandResult {
        let removed = self.storage.srem(&args[0], &args[1..]);
        Ok(RespValue::integer(removed as i64))
    }

    fn cmd_smembers(&self, args: &[Bytes]) -> CommandResult {
        let members = self.storage.smembers(&args[0]).unwrap_or_default();
        Ok(RespValue::bulk_array(members))
    }

    // ========================================================================
    // Hash Commands
    // ========================================================================

    /// HSET key field value
    fn cmd_hset(&self, args: &[Bytes]) -> CommandResult {
        let created = self
            .storage
            .hset(&args[0], args[1].clone(), args[2].clone());
        Ok(RespValue::boolean(created))
    }

    fn cmd_hget(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::optional(self.storage.hget(&args[0], &args[1])))
    }

    fn cmd_hdel(&self, args: &[Bytes]) -> CommandResult {
        let removed = self.storage.hdel(&args[0], &args[1..]);
        Ok(RespValue::integer(removed as i64))
    }

    /// HGETALL key: fields and values interleaved.
    fn cmd_hgetall(&self, args: &[Bytes]) -> CommandResult {
        let hash = self.storage.hgetall(&args[0]).unwrap_or_default();
        Ok(RespValue::bulk_array(
            hash.into_iter().flat_map(|(f, v)| [f, v]),
        ))
    }

    // ========================================================================
    // Sorted Set Commands
    // ========================================================================

    /// ZADD key score member
    fn cmd_zadd(&self, args: &[Bytes]) -> CommandResult {
        let score = parse_f64(&args[1]).ok_or(CommandError::NotAFloat)?;
        let added = self.storage.zadd(&args[0], score, args[2].clone());
        Ok(RespValue::boolean(added))
    }

    fn cmd_zrem(&self, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::boolean(self.storage.zrem(&args[0], &args[1])))
    }

    /// ZRANGE key start stop
    fn cmd_zrange(&self, args: &[Bytes]) -> CommandResult {
        let start = parse_i64(&args[1]).ok_or(CommandError::NotAnInteger)?;
        let stop = parse_i64(&args[2]).ok_or(CommandError::NotAnInteger)?;
        Ok(RespValue::bulk_array(
            self.storage.zrange(&args[0], start, stop),
        ))
    }

    fn cmd_zscore(&self, args: &[Bytes]) -> CommandResult {
        let score = self
            .storage
            .zscore(&args[0], &args[1])
            .map(|s| Bytes::from(s.to_string()));
        Ok(RespValue::optional(score))
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Parses a base-10 `i64` argument.
fn parse_i64(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

/// Parses a float argument, rejecting NaN.
fn parse_f64(arg: &[u8]) -> Option<f64> {
    std::str::from_utf8(arg)
        .ok()?
        .parse::<f64>()
        .ok()
        .filter(|f| !f.is_nan())
}

/// Joins tokens with single spaces.
fn join_tokens(tokens: &[Bytes]) -> Bytes {
    let mut joined = BytesMut::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            joined.extend_from_slice(b" ");
        }
        joined.extend_from_slice(token);
    }
    joined.freeze()
}
