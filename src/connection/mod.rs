//! Connection Handler Module
//!
//! This module manages individual client connections to FlashKV.
//! Each client connection is handled by its own async task; all tasks share
//! one storage engine.
//!
//! ## Task Layout
//!
//! ```text
//!   accept loop (main.rs)
//!     ├── spawn ─> ConnectionHandler ─┐
//!     ├── spawn ─> ConnectionHandler ─┼──> CommandHandler ──> Arc<StorageEngine>
//!     └── spawn ─> ConnectionHandler ─┘
//! ```
//!
//! A handler owns its socket and read buffer. It answers requests strictly in
//! arrival order and exits on QUIT, EOF, an I/O error or the idle timeout.
//! Counters in [`ConnectionStats`] are shared by every handler.
//!
//! ## Example
//!
//! ```ignore
//! use flashkv::connection::{handle_connection, ConnectionConfig, ConnectionStats};
//! use flashkv::commands::CommandHandler;
//! use flashkv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(storage);
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, ConnectionConfig::default(), stats));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionConfig, ConnectionError, ConnectionHandler, ConnectionStats,
};
