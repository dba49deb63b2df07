//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the keyspace for FlashKV: a map from key to
//! [`Value`] plus a separate map from key to expiry deadline, both guarded by
//! one reader-writer lock.
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: The whole keyspace sits behind a single `RwLock`. Every
//!    public method is one lock acquisition, so each operation is atomic and
//!    multi-key writes like `MSET` are all-or-nothing.
//! 2. **Separate Deadlines**: Expiry lives in its own map. Overwriting a key's
//!    value removes its deadline unless the caller re-applies one.
//! 3. **Lazy Expiry**: Reads treat a key past its deadline as missing even if
//!    the sweeper has not removed it yet. Writes purge such a key first.
//! 4. **Type Coercion**: A write that needs a different type than the one
//!    stored replaces the key with an empty value of the required type and
//!    drops its deadline. No `WRONGTYPE` error is raised.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                RwLock<Keyspace>                       │  │
//! │  │   values:  HashMap<Bytes, Value>                      │  │
//! │  │   expires: HashMap<Bytes, Instant>                    │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Read-only commands take the shared lock; anything that mutates takes the
//! exclusive lock.

use crate::storage::value::{SortedSet, Value, ValueKind};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors returned by storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The stored string does not parse as a base-10 `i64`
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The increment or decrement would leave the `i64` range
    #[error("increment or decrement would overflow")]
    Overflow,

    /// A key/value batch had an odd number of items
    #[error("wrong number of arguments for MSET, expected key value pairs")]
    OddArgumentCount,
}

/// Longest deadline a key can be given (100 years).
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// The guarded state: values and their deadlines.
#[derive(Debug, Default)]
struct Keyspace {
    values: HashMap<Bytes, Value>,
    expires: HashMap<Bytes, Instant>,
}

impl Keyspace {
    /// Checks if the key's deadline has passed.
    #[inline]
    fn is_expired(&self, key: &[u8], now: Instant) -> bool {
        self.expires
            .get(key)
            .map(|deadline| now >= *deadline)
            .unwrap_or(false)
    }

    /// Returns the value for a key that exists and has not expired.
    fn live(&self, key: &[u8], now: Instant) -> Option<&Value> {
        if self.is_expired(key, now) {
            return None;
        }
        self.values.get(key)
    }

    /// Removes a key and its deadline, returning whether a value was present.
    fn remove(&mut self, key: &[u8]) -> bool {
        self.expires.remove(key);
        self.values.remove(key).is_some()
    }

    /// Removes the key if its deadline has passed.
    fn purge_if_expired(&mut self, key: &[u8], now: Instant) {
        if self.is_expired(key, now) {
            self.remove(key);
        }
    }

    /// Writes a string value, clearing any deadline.
    fn put_string(&mut self, key: Bytes, value: Bytes) {
        self.expires.remove(&key);
        self.values.insert(key, Value::String(value));
    }

    /// Returns the value at `key`, creating or replacing it so that it has the
    /// requested kind.
    ///
    /// A replaced value loses its deadline. An existing value of the right kind
    /// keeps it.
    fn slot(&mut self, key: &Bytes, kind: ValueKind, now: Instant) -> &mut Value {
        self.purge_if_expired(key, now);

        match self.values.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let value = entry.into_mut();
                if value.kind() != kind {
                    *value = Value::empty(kind);
                    self.expires.remove(key);
                }
                value
            }
            Entry::Vacant(entry) => entry.insert(Value::empty(kind)),
        }
    }

    fn list_for_write(&mut self, key: &Bytes, now: Instant) -> &mut VecDeque<Bytes> {
        match self.slot(key, ValueKind::List, now) {
            Value::List(list) => list,
            _ => unreachable!("slot returns the requested kind"),
        }
    }

    fn set_for_write(&mut self, key: &Bytes, now: Instant) -> &mut HashSet<Bytes> {
        match self.slot(key, ValueKind::Set, now) {
            Value::Set(set) => set,
            _ => unreachable!("slot returns the requested kind"),
        }
    }

    fn hash_for_write(&mut self, key: &Bytes, now: Instant) -> &mut HashMap<Bytes, Bytes> {
        match self.slot(key, ValueKind::Hash, now) {
            Value::Hash(hash) => hash,
            _ => unreachable!("slot returns the requested kind"),
        }
    }

    fn zset_for_write(&mut self, key: &Bytes, now: Instant) -> &mut SortedSet {
        match self.slot(key, ValueKind::SortedSet, now) {
            Value::SortedSet(zset) => zset,
            _ => unreachable!("slot returns the requested kind"),
        }
    }

    /// Returns an existing, live value for in-place removal operations.
    ///
    /// Unlike [`Keyspace::slot`] this never creates or coerces.
    fn existing_mut(&mut self, key: &[u8], now: Instant) -> Option<&mut Value> {
        self.purge_if_expired(key, now);
        self.values.get_mut(key)
    }

    /// Deletes the key if removals left its collection empty.
    fn drop_if_empty(&mut self, key: &[u8]) {
        if self
            .values
            .get(key)
            .map(Value::is_empty_collection)
            .unwrap_or(false)
        {
            self.remove(key);
        }
    }

    /// Adds `delta` to the integer stored at `key`, treating a missing or
    /// non-string value as 0. The result is stored without a deadline.
    fn incr_by(&mut self, key: &Bytes, delta: i64, now: Instant) -> Result<i64, StoreError> {
        let current = match self.live(key, now) {
            Some(Value::String(s)) => std::str::from_utf8(s)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(StoreError::NotAnInteger)?,
            _ => 0,
        };

        let next = current.checked_add(delta).ok_or(StoreError::Overflow)?;
        self.put_string(key.clone(), Bytes::from(next.to_string()));
        Ok(next)
    }
}

/// The main storage engine for FlashKV.
///
/// This struct is designed to be wrapped in an `Arc` and shared across all
/// client connection tasks and the expiry sweeper. Separate instances are
/// fully independent.
///
/// On its own the engine expires keys lazily, so a key that is never read
/// again keeps its memory. Servers should build it with
/// [`StorageEngine::with_sweeper`], which also starts the background
/// [`ExpirySweeper`](crate::storage::ExpirySweeper) that removes such keys.
///
/// # Example
///
/// ```
/// use flashkv::storage::StorageEngine;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("Ariz"));
/// assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
///
/// engine.expire(b"name", Duration::from_secs(60));
/// assert!(engine.ttl(b"name") > 0);
/// ```
#[derive(Debug, Default)]
pub struct StorageEngine {
    keyspace: RwLock<Keyspace>,
}

impl StorageEngine {
    /// Creates an empty storage engine.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // KEY OPERATIONS
    // ========================================================================

    /// Deletes a key and its deadline.
    ///
    /// # Returns
    ///
    /// Returns `true` if a live key was deleted.
    pub fn delete(&self, key: &[u8]) -> bool {
        let now = Instant::now();
        let mut ks = self.keyspace.write();
        let existed = ks.live(key, now).is_some();
        ks.remove(key);
        existed
    }

    /// Deletes multiple keys, returning how many live keys were removed.
    pub fn delete_many(&self, keys: &[Bytes]) -> u64 {
        let now = Instant::now();
        let mut ks = self.keyspace.write();
        let mut deleted = 0;
        for key in keys {
            if ks.live(key, now).is_some() {
                deleted += 1;
            }
            ks.remove(key);
        }
        deleted
    }

    /// Checks if a key exists and has not expired.
    pub fn exists(&self, key: &[u8]) -> bool {
        let now = Instant::now();
        self.keyspace.read().live(key, now).is_some()
    }

    /// Counts how many of the given keys exist.
    pub fn exists_many(&self, keys: &[Bytes]) -> u64 {
        let now = Instant::now();
        let ks = self.keyspace.read();
        keys.iter().filter(|k| ks.live(k, now).is_some()).count() as u64
    }

    /// Sets the deadline of an existing key to now + `ttl`.
    ///
    /// A zero `ttl` expires the key immediately. A `ttl` longer than
    /// [`MAX_TTL`] is clamped to it.
    ///
    /// # Returns
    ///
    /// Returns `true` if the deadline was set, `false` if the key doesn't exist.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> bool {
        let now = Instant::now();
        let mut ks = self.keyspace.write();
        ks.purge_if_expired(key, now);

        let Some(stored) = ks.values.get_key_value(key).map(|(k, _)| k.clone()) else {
            return false;
        };
        // A deadline the clock cannot represent is never reached
        match now.checked_add(ttl.min(MAX_TTL)) {
            Some(deadline) => {
                ks.expires.insert(stored, deadline);
            }
            None => {
                ks.expires.remove(&stored);
            }
        }
        true
    }

    /// Removes the deadline from a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if a deadline was removed.
    pub fn persist(&self, key: &[u8]) -> bool {
        let now = Instant::now();
        let mut ks = self.keyspace.write();
        ks.purge_if_expired(key, now);
        ks.expires.remove(key).is_some()
    }

    /// Gets the remaining time to live in whole seconds (rounded down).
    ///
    /// # Returns
    ///
    /// - `-2` if the key doesn't exist or has expired
    /// - `-1` if the key exists without a deadline
    /// - the remaining seconds otherwise
    pub fn ttl(&self, key: &[u8]) -> i64 {
        let now = Instant::now();
        let ks = self.keyspace.read();

        if ks.live(key, now).is_none() {
            return -2;
        }
        match ks.expires.get(key) {
            Some(deadline) => deadline.saturating_duration_since(now).as_secs() as i64,
            None => -1,
        }
    }

    /// Returns the type of the value at `key`, if any.
    pub fn key_type(&self, key: &[u8]) -> Option<ValueKind> {
        let now = Instant::now();
        self.keyspace.read().live(key, now).map(Value::kind)
    }

    /// Returns all live keys, optionally filtered by a glob pattern.
    ///
    /// Supported patterns:
    /// - `*` matches everything
    /// - `h*llo` matches hello, hallo, hxllo
    /// - `h?llo` matches hello, hallo, but not hllo
    /// - `h[ae]llo` matches hello and hallo, but not hillo
    ///
    /// **Warning**: This operation scans all keys.
    pub fn keys(&self, pattern: Option<&[u8]>) -> Vec<Bytes> {
        let now = Instant::now();
        let ks = self.keyspace.read();
        let pattern = pattern.map(GlobPattern::new);

        ks.values
            .keys()
            .filter(|key| !ks.is_expired(key, now))
            .filter(|key| pattern.as_ref().map(|p| p.matches(key)).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Returns every live key holding a string, paired with its value.
    pub fn dump_strings(&self) -> Vec<(Bytes, Bytes)> {
        let now = Instant::now();
        let ks = self.keyspace.read();

        ks.values
            .iter()
            .filter(|(key, _)| !ks.is_expired(key, now))
            .filter_map(|(key, value)| value.as_string().map(|v| (key.clone(), v.clone())))
            .collect()
    }

    /// Clears all keys and deadlines.
    pub fn flush(&self) {
        let mut ks = self.keyspace.write();
        ks.values.clear();
        ks.expires.clear();
    }

    /// Returns the number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let ks = self.keyspace.read();
        ks.values.keys().filter(|k| !ks.is_expired(k, now)).count()
    }

    /// Returns true if the database has no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of stored values, including expired ones the
    /// sweeper has not reclaimed yet.
    pub fn stored_len(&self) -> usize {
        self.keyspace.read().values.len()
    }

    /// Removes every key whose deadline has passed.
    ///
    /// This is called by the background expiry sweeper. It holds the write
    /// lock for one scan of the deadline map.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were removed.
    pub fn cleanup_expired(&self) -> u64 {
        let now = Instant::now();
        let mut ks = self.keyspace.write();

        let expired: Vec<Bytes> = ks
            .expires
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            ks.remove(key);
        }

        expired.len() as u64
    }

    // ========================================================================
    // STRING OPERATIONS
    // ========================================================================

    /// Sets a key to a string value, replacing any value and deadline.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.keyspace.write().put_string(key, value);
    }

    /// Gets the string value of a key.
    ///
    /// Returns `None` if the key doesn't exist, has expired, or holds another type.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let now = Instant::now();
        self.keyspace
            .read()
            .live(key, now)
            .and_then(Value::as_string)
            .cloned()
    }

    /// Increments an integer value by 1.
    ///
    /// A missing key counts as 0. The stored result has no deadline.
    pub fn incr(&self, key: &Bytes) -> Result<i64, StoreError> {
        let now = Instant::now();
        self.keyspace.write().incr_by(key, 1, now)
    }

    /// Decrements an integer value by 1.
    pub fn decr(&self, key: &Bytes) -> Result<i64, StoreError> {
        let now = Instant::now();
        self.keyspace.write().incr_by(key, -1, now)
    }

    /// Sets multiple keys from a flat `key value [key value ...]` list.
    ///
    /// All pairs are written under one lock acquisition. An odd-length list is
    /// rejected before anything is written.
    pub fn mset(&self, items: &[Bytes]) -> Result<(), StoreError> {
        if items.len() % 2 != 0 {
            return Err(StoreError::OddArgumentCount);
        }

        let mut ks = self.keyspace.write();
        for pair in items.chunks_exact(2) {
            ks.put_string(pair[0].clone(), pair[1].clone());
        }
        Ok(())
    }

    /// Gets multiple string values, one result per key in input order.
    pub fn mget(&self, keys: &[Bytes]) -> Vec<Option<Bytes>> {
        let now = Instant::now();
        let ks = self.keyspace.read();
        keys.iter()
            .map(|key| ks.live(key, now).and_then(Value::as_string).cloned())
            .collect()
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    /// Pushes values onto the head of a list, keeping their given order:
    /// pushing `[a, b, c]` onto `[x]` yields `[a, b, c, x]`.
    ///
    /// # Returns
    /// The length of the list after the push.
    pub fn lpush(&self, key: &Bytes, values: Vec<Bytes>) -> usize {
        let now = Instant::now();
        let mut ks = self.keyspace.write();
        let list = ks.list_for_write(key, now);

        for value in values.into_iter().rev() {
            list.push_front(value);
        }

        list.len()
    }

    /// Removes and returns the last element of a list.
    ///
    /// Returns `None` if the key is missing, not a list, or empty. A list
    /// emptied by this call is deleted.
    pub fn rpop(&self, key: &[u8]) -> Option<Bytes> {
        let now = Instant::now();
        let mut ks = self.keyspace.write();

        let popped = match ks.existing_mut(key, now) {
            Some(Value::List(list)) => list.pop_back(),
            _ => None,
        };
        ks.drop_if_empty(key);
        popped
    }

    /// Returns the length of a list, or 0 if the key is missing or not a list.
    pub fn llen(&self, key: &[u8]) -> usize {
        let now = Instant::now();
        self.keyspace
            .read()
            .live(key, now)
            .and_then(Value::as_list)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    // ========================================================================
    // SET OPERATIONS
    // ========================================================================

    /// Adds members to a set.
    ///
    /// # Returns
    /// The number of members that were not already present.
    pub fn sadd(&self, key: &Bytes, members: Vec<Bytes>) -> usize {
        let now = Instant::now();
        let mut ks = self.keyspace.write();
        let set = ks.set_for_write(key, now);

        members
            .into_iter()
            .filter(|member| set.insert(member.clone()))
            .count()
    }

    /// Removes members from a set, returning how many were present.
    pub fn srem(&self, key: &[u8], members: &[Bytes]) -> usize {
        let now = Instant::now();
        let mut ks = self.keyspace.write();

        let removed = match ks.existing_mut(key, now) {
            Some(Value::Set(set)) => members.iter().filter(|m| set.remove(*m)).count(),
            _ => 0,
        };
        ks.drop_if_empty(key);
        removed
    }

    /// Returns a copy of all set members, in no particular order.
    ///
    /// Returns `None` if the key is missing or not a set.
    pub fn smembers(&self, key: &[u8]) -> Option<Vec<Bytes>> {
        let now = Instant::now();
        self.keyspace
            .read()
            .live(key, now)
            .and_then(Value::as_set)
            .map(|set| set.iter().cloned().collect())
    }

    // ========================================================================
    // HASH OPERATIONS
    // ========================================================================

    /// Sets a hash field.
    ///
    /// # Returns
    /// `true` if the field is new, `false` if an existing field was overwritten.
    pub fn hset(&self, key: &Bytes, field: Bytes, value: Bytes) -> bool {
        let now = Instant::now();
        let mut ks = self.keyspace.write();
        ks.hash_for_write(key, now).insert(field, value).is_none()
    }

    /// Gets a hash field.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> Option<Bytes> {
        let now = Instant::now();
        self.keyspace
            .read()
            .live(key, now)
            .and_then(Value::as_hash)
            .and_then(|hash| hash.get(field))
            .cloned()
    }

    /// Removes hash fields, returning how many were present.
    pub fn hdel(&self, key: &[u8], fields: &[Bytes]) -> usize {
        let now = Instant::now();
        let mut ks = self.keyspace.write();

        let removed = match ks.existing_mut(key, now) {
            Some(Value::Hash(hash)) => fields
                .iter()
                .filter(|f| hash.remove(&f[..]).is_some())
                .count(),
            _ => 0,
        };
        ks.drop_if_empty(key);
        removed
    }

    /// Returns a copy of every field and value in a hash.
    ///
    /// Returns `None` if the key is missing or not a hash.
    pub fn hgetall(&self, key: &[u8]) -> Option<HashMap<Bytes, Bytes>> {
        let now = Instant::now();
        self.keyspace
            .read()
            .live(key, now)
            .and_then(Value::as_hash)
            .cloned()
    }

    // ========================================================================
    // SORTED SET OPERATIONS
    // ========================================================================

    /// Adds a member with a score, or updates the score of an existing member.
    ///
    /// # Returns
    /// `true` only if the member was newly inserted.
    pub fn zadd(&self, key: &Bytes, score: f64, member: Bytes) -> bool {
        let now = Instant::now();
        let mut ks = self.keyspace.write();
        ks.zset_for_write(key, now).insert(member, score)
    }

    /// Removes a member, returning `true` if it was present.
    pub fn zrem(&self, key: &[u8], member: &[u8]) -> bool {
        let now = Instant::now();
        let mut ks = self.keyspace.write();

        let removed = match ks.existing_mut(key, now) {
            Some(Value::SortedSet(zset)) => zset.remove(member),
            _ => false,
        };
        ks.drop_if_empty(key);
        removed
    }

    /// Returns the members ranked `start..=stop` in ascending (score, member)
    /// order. Negative indexes count from the end.
    ///
    /// A missing key or one of another type yields an empty result.
    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> Vec<Bytes> {
        let now = Instant::now();
        self.keyspace
            .read()
            .live(key, now)
            .and_then(Value::as_sorted_set)
            .map(|zset| zset.range(start, stop))
            .unwrap_or_default()
    }

    /// Returns the score of a sorted-set member.
    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Option<f64> {
        let now = Instant::now();
        self.keyspace
            .read()
            .live(key, now)
            .and_then(Value::as_sorted_set)
            .and_then(|zset| zset.score(member))
    }
}

/// Simple glob pattern matcher for the KEYS command.
struct GlobPattern {
    pattern: Vec<u8>,
}

impl GlobPattern {
    fn new(pattern: &[u8]) -> Self {
        Self {
            pattern: pattern.to_vec(),
        }
    }

    /// Matches with single-star backtracking: on a mismatch only the most
    /// recent `*` is retried, one text byte further on. Runs in
    /// O(pattern * text).
    fn matches(&self, text: &[u8]) -> bool {
        let pattern = &self.pattern[..];
        let (mut p, mut t) = (0, 0);
        // Pattern index just past the last `*`, and the text index it resumes at
        let mut star: Option<(usize, usize)> = None;

        while t < text.len() {
            if pattern.get(p) == Some(&b'*') {
                p += 1;
                star = Some((p, t));
                continue;
            }

            if let Some(width) = Self::match_token(&pattern[p..], text[t]) {
                p += width;
                t += 1;
                continue;
            }

            match star {
                Some((resume_p, resume_t)) => {
                    p = resume_p;
                    t = resume_t + 1;
                    star = Some((resume_p, t));
                }
                None => return false,
            }
        }

        pattern[p..].iter().all(|&c| c == b'*')
    }

    /// Matches one non-star token at the start of `pattern` against `c`.
    ///
    /// Returns the token's width in pattern bytes, or `None` on a mismatch,
    /// an empty pattern, or a malformed token.
    fn match_token(pattern: &[u8], c: u8) -> Option<usize> {
        match *pattern.first()? {
            b'?' => Some(1),
            b'\\' => (pattern.get(1) == Some(&c)).then_some(2),
            b'[' => {
                let mut i = 1;
                let negate = pattern.get(1) == Some(&b'^');
                if negate {
                    i += 1;
                }

                let mut matched = false;
                while i < pattern.len() && pattern[i] != b']' {
                    // Ranges like [a-z]
                    if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
                        if c >= pattern[i] && c <= pattern[i + 2] {
                            matched = true;
                        }
                        i += 3;
                    } else {
                        if pattern[i] == c {
                            matched = true;
                        }
                        i += 1;
                    }
                }

                // Unterminated class
                if i >= pattern.len() {
                    return None;
                }
                (matched != negate).then_some(i + 1)
            }
            literal => (literal == c).then_some(1),
        }
    }
}
