//! Wire Protocol
//!
//! Requests arrive either as RESP-style arrays of bulk strings or as plain
//! text lines; replies are always RESP-encoded.
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` reply enum and its serialization
//! - `parser`: Incremental request decoder producing `Frame`s
//!
//! ## Example
//!
//! ```
//! use flashkv::protocol::{parse_request, Frame, RespValue};
//! use bytes::Bytes;
//!
//! let (frame, consumed) = parse_request(b"ECHO hello\r\n").unwrap().unwrap();
//! assert_eq!(consumed, 12);
//! assert!(matches!(frame, Frame::Command(ref args) if args.len() == 2));
//!
//! let reply = RespValue::bulk_string(Bytes::from("hello"));
//! assert_eq!(reply.serialize(), b"$5\r\nhello\r\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_request, Frame, ParseError, ParseResult, RequestParser};
pub use types::RespValue;
