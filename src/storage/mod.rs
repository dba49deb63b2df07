//! Storage Engine Module
//!
//! This module provides the keyspace for FlashKV: five value types behind one
//! reader-writer lock, per-key deadlines, and a background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │        RwLock<{ values: key -> Value,                       │
//! │                 expires: key -> Instant }>                  │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use flashkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.lpush(&Bytes::from("queue"), vec![Bytes::from("a"), Bytes::from("b")]);
//! assert_eq!(engine.rpop(b"queue"), Some(Bytes::from("b")));
//!
//! engine.zadd(&Bytes::from("board"), 10.0, Bytes::from("ariz"));
//! assert_eq!(engine.zrange(b"board", 0, -1), vec![Bytes::from("ariz")]);
//! ```

pub mod engine;
pub mod expiry;
pub mod value;

pub use engine::{StorageEngine, StoreError};
pub use expiry::{ExpiryConfig, ExpirySweeper};
pub use value::{normalize_range, SortedSet, Value, ValueKind};
