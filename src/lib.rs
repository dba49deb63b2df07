//! # FlashKV - An In-Memory Data-Structure Server
//!
//! FlashKV keeps strings, lists, sets, hashes and sorted sets in memory and
//! serves them over TCP. Clients send either RESP-style arrays or plain text
//! lines; replies are RESP-encoded.
//!
//! ## Features
//!
//! - **Five value types** with a tagged [`storage::Value`]
//! - **Atomic operations**: the whole keyspace sits behind one `RwLock`, so every
//!   command (including multi-key `MSET`) is linearizable
//! - **TTL Support**: Keys can have expiry times with lazy and active cleanup
//! - **Async I/O**: Built on Tokio, one task per connection
//!
//! ## Architecture
//!
//! ```text
//!  TcpListener ──accept──> ConnectionHandler (one task per client)
//!                             │  RequestParser: bytes -> Frame
//!                             │  CommandHandler: Frame -> RespValue
//!                             ▼
//!                     StorageEngine  RwLock<{ values, expires }>
//!                             ▲
//!                             │ cleanup_expired() every interval
//!                      ExpirySweeper (background task)
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use flashkv::storage::{StorageEngine, ExpiryConfig};
//! use flashkv::commands::CommandHandler;
//! use flashkv::connection::{handle_connection, ConnectionConfig, ConnectionStats};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (storage, _sweeper) = StorageEngine::with_sweeper(ExpiryConfig::default());
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         let handler = CommandHandler::new(Arc::clone(&storage));
//!         let stats = Arc::clone(&stats);
//!         tokio::spawn(handle_connection(stream, addr, handler, ConnectionConfig::default(), stats));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request parser and reply encoding
//! - [`storage`]: Value model, keyspace, and expiry sweeper
//! - [`commands`]: Command table and dispatcher
//! - [`connection`]: Client connection management
//! - [`config`]: Command-line configuration for the server binary
//!
//! ## Design Highlights
//!
//! ### Type Coercion
//!
//! A write that needs a different type than the one stored (say `LPUSH` onto a
//! string) replaces the old value with an empty one of the new type and drops
//! its deadline. There is no `WRONGTYPE` error.
//!
//! ### Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: A key past its deadline is invisible to reads and treated as
//!    absent by writes, even before it is removed
//! 2. **Active**: A background task removes expired keys once per interval
//!
//! This ensures memory is reclaimed even for keys that are never accessed again.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::ServerConfig;
pub use connection::{handle_connection, ConnectionConfig, ConnectionStats};
pub use protocol::{Frame, ParseError, RequestParser, RespValue};
pub use storage::{ExpiryConfig, ExpirySweeper, StorageEngine, Value, ValueKind};

/// The default port FlashKV listens on
pub const DEFAULT_PORT: u16 = 6379;

/// The default host FlashKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of FlashKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
