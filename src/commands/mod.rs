//! Command Handler Module
//!
//! This module implements the command processing layer for FlashKV.
//! It receives decoded requests, executes them against the storage engine,
//! and returns the replies.
//!
//! A request is a non-empty list of byte strings. The first names the
//! command and is matched without regard to ASCII case; the rest are its
//! arguments. Failures come back as [`CommandError`] and are sent to the
//! client as `-ERR` replies, so a bad request never ends the session.

pub mod handler;

pub use handler::{is_quit, usage_lines, CommandError, CommandHandler, CommandResult};
