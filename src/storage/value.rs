//! Stored Value Types
//!
//! Every key in the keyspace owns exactly one [`Value`]. The variant decides
//! which commands can read it; writes for a different variant replace it
//! (see [`StorageEngine`](crate::storage::StorageEngine) for the coercion rules).
//!
//! ```text
//! Value
//!  ├── String     Bytes
//!  ├── List       VecDeque<Bytes>       (front/back addressable)
//!  ├── Set        HashSet<Bytes>
//!  ├── Hash       HashMap<Bytes, Bytes>
//!  └── SortedSet  SortedSet             (member -> score, ordered by (score, member))
//! ```

use bytes::Bytes;
use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

/// The discriminant of a [`Value`], used to request a particular type on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    List,
    Set,
    Hash,
    SortedSet,
}

impl ValueKind {
    /// The name reported by the `TYPE` command.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Set => "set",
            ValueKind::Hash => "hash",
            ValueKind::SortedSet => "zset",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value stored under a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    SortedSet(SortedSet),
}

impl Value {
    /// Creates the empty value of the given kind.
    pub fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::String => Value::String(Bytes::new()),
            ValueKind::List => Value::List(VecDeque::new()),
            ValueKind::Set => Value::Set(HashSet::new()),
            ValueKind::Hash => Value::Hash(HashMap::new()),
            ValueKind::SortedSet => Value::SortedSet(SortedSet::new()),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Set(_) => ValueKind::Set,
            Value::Hash(_) => ValueKind::Hash,
            Value::SortedSet(_) => ValueKind::SortedSet,
        }
    }

    /// Returns true for a collection with no elements left.
    ///
    /// Strings are never considered empty: `SET k ""` is a valid value.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Value::String(_) => false,
            Value::List(list) => list.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::Hash(hash) => hash.is_empty(),
            Value::SortedSet(zset) => zset.is_empty(),
        }
    }

    pub fn as_string(&self) -> Option<&Bytes> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&VecDeque<Bytes>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HashSet<Bytes>> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&HashMap<Bytes, Bytes>> {
        match self {
            Value::Hash(hash) => Some(hash),
            _ => None,
        }
    }

    pub fn as_sorted_set(&self) -> Option<&SortedSet> {
        match self {
            Value::SortedSet(zset) => Some(zset),
            _ => None,
        }
    }
}

/// A set of unique members, each carrying a score, kept in `(score, member)` order.
///
/// Two indexes are maintained together: `scores` answers member lookups and
/// `ordered` answers rank queries. Every mutation updates both, so a member is
/// present in one exactly when it is present in the other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<Bytes, f64>,
    ordered: BTreeSet<(OrderedFloat<f64>, Bytes)>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `member` with `score`, or moves an existing member to its new score.
    ///
    /// Returns `true` only when the member was not present before.
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        match self.scores.insert(member.clone(), score) {
            Some(old) if old == score => false,
            Some(old) => {
                self.ordered.remove(&(OrderedFloat(old), member.clone()));
                self.ordered.insert((OrderedFloat(score), member));
                false
            }
            None => {
                self.ordered.insert((OrderedFloat(score), member));
                true
            }
        }
    }

    /// Removes `member`, returning `true` if it was present.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove_entry(member) {
            Some((member, score)) => {
                self.ordered.remove(&(OrderedFloat(score), member));
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Iterates `(member, score)` pairs in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, f64)> + '_ {
        self.ordered.iter().map(|(score, member)| (member, score.0))
    }

    /// Returns the members ranked `start..=stop`, with negative indexes
    /// counting back from the highest rank.
    pub fn range(&self, start: i64, stop: i64) -> Vec<Bytes> {
        match normalize_range(start, stop, self.len()) {
            Some((start, stop)) => self
                .ordered
                .iter()
                .skip(start)
                .take(stop - start + 1)
                .map(|(_, member)| member.clone())
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Resolves an inclusive `[start, stop]` rank range against a collection of `len` items.
///
/// Negative indexes have `len` added once. `start` is clamped to 0 and `stop`
/// to `len - 1`; `None` means the range selects nothing.
pub fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let n = len as i64;
    let mut start = if start < 0 { start + n } else { start };
    let mut stop = if stop < 0 { stop + n } else { stop };

    if start < 0 {
        start = 0;
    }
    if stop > n - 1 {
        stop = n - 1;
    }
    if start > stop || start >= n {
        return None;
    }

    Some((start as usize, stop as usize))
}
