//! Incremental Request Parser
//!
//! This module decodes client requests from a connection's read buffer. Two
//! framings are accepted, chosen per request by peeking at the first byte:
//!
//! - `*` starts an array of bulk strings: `*<N>\r\n` then N times `$<len>\r\n<bytes>\r\n`
//! - anything else is a plain line of whitespace-separated tokens ending in `\n`
//!
//! A connection may interleave both framings freely; no state is kept between
//! requests.
//!
//! ## How the Parser Works
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((frame, consumed)))` - Decoded one request, `consumed` bytes were used
//! - `Ok(None)` - Need more data, the request is incomplete
//! - `Err(ParseError)` - The request is malformed
//!
//! This design allows the caller to:
//! 1. Append incoming network data to a buffer
//! 2. Call `parse()` to attempt parsing
//! 3. If successful, advance the buffer by `consumed` bytes
//! 4. If incomplete, wait for more data
//! 5. If error, reply with a protocol error and discard the buffered input

use crate::protocol::types::{prefix, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while decoding a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Length or count line is not a base-10 integer
    #[error("invalid length '{0}'")]
    InvalidLength(String),

    /// An array element did not start with `$`
    #[error("expected '$', got '{0}'")]
    ExpectedBulkString(char),

    /// A negative length or count
    #[error("negative length {0}")]
    NegativeLength(i64),

    /// Bulk data was not followed by CRLF
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    /// A length, count or line exceeds the configured maximum
    #[error("request too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// A length line is not valid UTF-8
    #[error("invalid UTF-8 in length")]
    InvalidUtf8,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of elements in one request array
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Maximum length of a plain-line request, terminator excluded
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// One decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The command name followed by its arguments. Never empty.
    Command(Vec<Bytes>),

    /// A blank line or a zero-element array. Carries no command.
    Empty,
}

impl Frame {
    /// Builds a frame from tokens, mapping no tokens to [`Frame::Empty`].
    fn from_tokens(tokens: Vec<Bytes>) -> Self {
        if tokens.is_empty() {
            Frame::Empty
        } else {
            Frame::Command(tokens)
        }
    }
}

/// A stateless request decoder.
///
/// # Example
///
/// ```
/// use flashkv::protocol::{Frame, RequestParser};
/// use bytes::Bytes;
///
/// let parser = RequestParser::new();
///
/// let (frame, consumed) = parser.parse(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n").unwrap().unwrap();
/// assert_eq!(consumed, 23);
/// assert_eq!(frame, Frame::Command(vec![Bytes::from("GET"), Bytes::from("name")]));
///
/// let (frame, _) = parser.parse(b"GET name\n").unwrap().unwrap();
/// assert_eq!(frame, Frame::Command(vec![Bytes::from("GET"), Bytes::from("name")]));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestParser;

impl RequestParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to decode one request from the front of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        match buf.first() {
            None => Ok(None),
            Some(&prefix::ARRAY) => self.parse_array(buf),
            Some(_) => self.parse_inline(buf),
        }
    }

    /// Parses `*<count>\r\n` followed by `count` bulk strings.
    fn parse_array(&self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        debug_assert!(buf[0] == prefix::ARRAY);

        let Some((count, mut consumed)) = read_length(buf, 1)? else {
            return Ok(None);
        };

        if count > MAX_ARRAY_LEN {
            return Err(ParseError::TooLarge {
                size: count,
                max: MAX_ARRAY_LEN,
            });
        }

        let mut elements = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            match self.parse_bulk_string(&buf[consumed..])? {
                Some((data, element_consumed)) => {
                    elements.push(data);
                    consumed += element_consumed;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((Frame::from_tokens(elements), consumed)))
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&self, buf: &[u8]) -> ParseResult<Option<(Bytes, usize)>> {
        match buf.first() {
            None => return Ok(None),
            Some(&prefix::BULK_STRING) => {}
            Some(&other) => return Err(ParseError::ExpectedBulkString(char::from(other))),
        }

        let Some((length, data_start)) = read_length(buf, 1)? else {
            return Ok(None);
        };

        if length > MAX_BULK_SIZE {
            return Err(ParseError::TooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let total_needed = data_start + length + CRLF.len();
        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[data_start + length..total_needed] != CRLF {
            return Err(ParseError::MissingCrlf);
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
        Ok(Some((data, total_needed)))
    }

    /// Parses one line of whitespace-separated tokens.
    fn parse_inline(&self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        let Some(newline) = find_newline(buf) else {
            if buf.len() > MAX_INLINE_SIZE {
                return Err(ParseError::TooLarge {
                    size: buf.len(),
                    max: MAX_INLINE_SIZE,
                });
            }
            return Ok(None);
        };

        let tokens = buf[..newline]
            .split(|b| b.is_ascii_whitespace())
            .filter(|token| !token.is_empty())
            .map(Bytes::copy_from_slice)
            .collect();

        Ok(Some((Frame::from_tokens(tokens), newline + 1)))
    }
}

/// Reads a length line starting at `start` (just after the type byte).
///
/// Returns the parsed length and the offset just past the line terminator.
/// The line ends at `\n`; surrounding whitespace including `\r` is ignored.
fn read_length(buf: &[u8], start: usize) -> ParseResult<Option<(usize, usize)>> {
    let Some(newline) = find_newline(&buf[start..]) else {
        return Ok(None);
    };

    let line = std::str::from_utf8(&buf[start..start + newline])
        .map_err(|_| ParseError::InvalidUtf8)?
        .trim();

    let length: i64 = line
        .parse()
        .map_err(|_| ParseError::InvalidLength(line.to_string()))?;

    if length < 0 {
        return Err(ParseError::NegativeLength(length));
    }

    Ok(Some((length as usize, start + newline + 1)))
}

/// Finds the position of the first `\n` in the buffer.
#[inline]
fn find_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Helper function to decode a single request from bytes.
pub fn parse_request(buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
    RequestParser::new().parse(buf)
}
