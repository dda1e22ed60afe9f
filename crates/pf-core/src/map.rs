//! Chained string-keyed hash map.
//!
//! Every collection in the interpreter is one of these: per-file assignments
//! and registers, and the cross-file aggregates keyed by date.
//!
//! # Layout
//!
//! - An array of buckets, each a chain of `(key, value)` entries.
//! - The bucket for a key is its djb2 hash modulo the current capacity.
//! - Before every `put`, if `len / capacity >= load_factor` the bucket array
//!   doubles and every entry is rehashed into it.
//!
//! Iteration walks buckets in index order and each chain front to back. That
//! order is unspecified and changes when the map grows.
//!
//! Allocation failures are reported as [`MapError`] instead of aborting the
//! process; a failed grow leaves the map exactly as it was.

use std::fmt;

use thiserror::Error;

/// Bucket count used when a non-positive capacity is requested.
pub const DEFAULT_CAPACITY: usize = 16;

/// Load factor used when the requested one is outside `(0.1, 1.0)`.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Map allocation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    /// The bucket array could not be allocated.
    #[error("failed to allocate {requested} buckets")]
    BucketAlloc { requested: usize },

    /// A chain could not grow to hold a new entry.
    #[error("failed to allocate an entry for key {key:?}")]
    EntryAlloc { key: String },

    /// Doubling the capacity would overflow `usize`.
    #[error("map capacity overflow while growing from {capacity} buckets")]
    CapacityOverflow { capacity: usize },
}

#[derive(Clone)]
struct Entry<V> {
    key: String,
    value: V,
}

type Chain<V> = Vec<Entry<V>>;

/// A string-keyed hash map with separate chaining and doubling growth.
#[derive(Clone)]
pub struct Map<V> {
    buckets: Vec<Chain<V>>,
    len: usize,
    load_factor: f32,
}

/// djb2: `hash * 33 + byte`, seeded with 5381.
fn djb2(key: &str) -> u64 {
    key.bytes().fold(5381_u64, |hash, byte| {
        hash.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}

#[allow(clippy::cast_possible_truncation)]
fn bucket_index(key: &str, capacity: usize) -> usize {
    // capacity fits in u64 on every supported target, and the remainder is
    // strictly below capacity, so the narrowing is lossless.
    (djb2(key) % capacity as u64) as usize
}

fn allocate_buckets<V>(capacity: usize) -> Result<Vec<Chain<V>>, MapError> {
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(capacity)
        .map_err(|_| MapError::BucketAlloc {
            requested: capacity,
        })?;
    buckets.resize_with(capacity, Vec::new);
    Ok(buckets)
}

impl<V> Map<V> {
    /// Creates an empty map with the default capacity and load factor.
    pub fn new() -> Result<Self, MapError> {
        Self::with_capacity_and_load_factor(DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR)
    }

    /// Creates an empty map.
    ///
    /// A zero `capacity` becomes [`DEFAULT_CAPACITY`]; a `load_factor`
    /// outside the open interval `(0.1, 1.0)` becomes [`DEFAULT_LOAD_FACTOR`].
    pub fn with_capacity_and_load_factor(
        capacity: usize,
        load_factor: f32,
    ) -> Result<Self, MapError> {
        let capacity = if capacity > 0 {
            capacity
        } else {
            DEFAULT_CAPACITY
        };
        let load_factor = if load_factor > 0.1 && load_factor < 1.0 {
            load_factor
        } else {
            DEFAULT_LOAD_FACTOR
        };

        Ok(Self {
            buckets: allocate_buckets(capacity)?,
            len: 0,
            load_factor,
        })
    }

    /// Number of live entries.
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub const fn load_factor(&self) -> f32 {
        self.load_factor
    }

    #[allow(clippy::cast_precision_loss)]
    fn needs_grow(&self) -> bool {
        self.len as f32 / self.buckets.len() as f32 >= self.load_factor
    }

    fn index_of(&self, key: &str) -> usize {
        bucket_index(key, self.buckets.len())
    }

    /// Inserts or replaces the value for `key`, returning the previous value.
    ///
    /// The growth check runs before the entry is located, so an update can
    /// also trigger a grow.
    pub fn put(&mut self, key: &str, value: V) -> Result<Option<V>, MapError> {
        if self.needs_grow() {
            self.grow()?;
        }

        let index = self.index_of(key);
        let chain = &mut self.buckets[index];

        if let Some(entry) = chain.iter_mut().find(|entry| entry.key == key) {
            return Ok(Some(std::mem::replace(&mut entry.value, value)));
        }

        chain.try_reserve(1).map_err(|_| MapError::EntryAlloc {
            key: key.to_string(),
        })?;
        chain.push(Entry {
            key: key.to_string(),
            value,
        });
        self.len += 1;
        Ok(None)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.buckets[self.index_of(key)]
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let index = self.index_of(key);
        self.buckets[index]
            .iter_mut()
            .find(|entry| entry.key == key)
            .map(|entry| &mut entry.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let index = self.index_of(key);
        let chain = &mut self.buckets[index];
        let position = chain.iter().position(|entry| entry.key == key)?;
        self.len -= 1;
        Some(chain.swap_remove(position).value)
    }

    /// Keeps only the entries for which `keep` returns `true`.
    ///
    /// `keep` may modify the value it is shown.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &mut V) -> bool,
    {
        let mut removed = 0;
        for chain in &mut self.buckets {
            let before = chain.len();
            chain.retain_mut(|entry| keep(&entry.key, &mut entry.value));
            removed += before - chain.len();
        }
        self.len -= removed;
    }

    /// Calls `f` for every entry in bucket-then-chain order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &V),
    {
        for entry in self.buckets.iter().flatten() {
            f(&entry.key, &entry.value);
        }
    }

    /// Calls `f` for every entry, allowing the value to be changed in place.
    ///
    /// The key set cannot change during the walk.
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&str, &mut V),
    {
        for entry in self.buckets.iter_mut().flatten() {
            f(&entry.key, &mut entry.value);
        }
    }

    /// Returns an iterator over `(key, value)` pairs.
    ///
    /// Each call starts a fresh walk from the first bucket.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            cursor: self.cursor(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns a cursor positioned on the first entry, if any.
    pub fn cursor(&self) -> Cursor<'_, V> {
        let mut cursor = Cursor {
            buckets: &self.buckets,
            position: None,
        };
        cursor.restart();
        cursor
    }

    /// Consumes the map, handing every live value to `release` exactly once.
    pub fn drain_with<F>(self, mut release: F)
    where
        F: FnMut(V),
    {
        for (_, value) in self {
            release(value);
        }
    }

    /// Doubles the bucket array and rehashes every entry into it.
    ///
    /// All memory the new layout needs is reserved before any entry moves, so
    /// an allocation failure leaves the map untouched.
    fn grow(&mut self) -> Result<(), MapError> {
        let old_capacity = self.buckets.len();
        let capacity = old_capacity
            .checked_mul(2)
            .ok_or(MapError::CapacityOverflow {
                capacity: old_capacity,
            })?;

        let mut chain_lengths: Vec<usize> = Vec::new();
        chain_lengths
            .try_reserve_exact(capacity)
            .map_err(|_| MapError::BucketAlloc {
                requested: capacity,
            })?;
        chain_lengths.resize(capacity, 0);
        for entry in self.buckets.iter().flatten() {
            chain_lengths[bucket_index(&entry.key, capacity)] += 1;
        }

        let mut buckets = allocate_buckets::<V>(capacity)?;
        for (chain, &length) in buckets.iter_mut().zip(&chain_lengths) {
            chain
                .try_reserve_exact(length)
                .map_err(|_| MapError::BucketAlloc {
                    requested: capacity,
                })?;
        }

        let expected = self.len;
        self.len = 0;
        for entry in std::mem::take(&mut self.buckets).into_iter().flatten() {
            buckets[bucket_index(&entry.key, capacity)].push(entry);
            self.len += 1;
        }
        debug_assert_eq!(self.len, expected, "rehash lost or duplicated entries");

        self.buckets = buckets;
        tracing::trace!(from = old_capacity, to = capacity, len = self.len, "map grew");
        Ok(())
    }
}

impl Map<u32> {
    /// Adds `count` to the value stored under `key`, inserting it if absent.
    ///
    /// Returns the new total. Totals saturate at `u32::MAX`.
    pub fn add(&mut self, key: &str, count: u32) -> Result<u32, MapError> {
        if let Some(total) = self.get_mut(key) {
            *total = total.saturating_add(count);
            return Ok(*total);
        }
        self.put(key, count)?;
        Ok(count)
    }

    /// Adds every count in `other` into this map.
    pub fn merge_counts(&mut self, other: &Self) -> Result<(), MapError> {
        for (key, &count) in other {
            self.add(key, count)?;
        }
        Ok(())
    }
}

/// Explicit position over a map's entries.
///
/// The cursor reports the entry it is on and moves forward only when
/// [`advance`](Self::advance) is called. It holds a shared borrow, so the map
/// cannot change underneath it.
pub struct Cursor<'a, V> {
    buckets: &'a [Chain<V>],
    /// `(bucket, slot)` of the current entry; `None` once exhausted.
    position: Option<(usize, usize)>,
}

impl<'a, V> Cursor<'a, V> {
    fn seek(&mut self, mut bucket: usize, mut slot: usize) -> bool {
        while bucket < self.buckets.len() {
            if slot < self.buckets[bucket].len() {
                self.position = Some((bucket, slot));
                return true;
            }
            bucket += 1;
            slot = 0;
        }
        self.position = None;
        false
    }

    /// Moves to the first entry again. Returns `false` if the map is empty.
    pub fn restart(&mut self) -> bool {
        self.seek(0, 0)
    }

    /// Moves to the next entry, skipping empty buckets.
    ///
    /// Returns `false` once no further entries exist.
    pub fn advance(&mut self) -> bool {
        match self.position {
            Some((bucket, slot)) => self.seek(bucket, slot + 1),
            None => false,
        }
    }

    pub const fn is_exhausted(&self) -> bool {
        self.position.is_none()
    }

    fn entry(&self) -> Option<&'a Entry<V>> {
        let (bucket, slot) = self.position?;
        self.buckets.get(bucket)?.get(slot)
    }

    pub fn key(&self) -> Option<&'a str> {
        self.entry().map(|entry| entry.key.as_str())
    }

    pub fn value(&self) -> Option<&'a V> {
        self.entry().map(|entry| &entry.value)
    }
}

/// Borrowing iterator returned by [`Map::iter`].
pub struct Iter<'a, V> {
    cursor: Cursor<'a, V>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.cursor.entry()?;
        self.cursor.advance();
        Some((entry.key.as_str(), &entry.value))
    }
}

impl<'a, V> IntoIterator for &'a Map<V> {
    type Item = (&'a str, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owning iterator over `(key, value)` pairs.
pub struct IntoIter<V> {
    entries: std::iter::Flatten<std::vec::IntoIter<Chain<V>>>,
}

impl<V> Iterator for IntoIter<V> {
    type Item = (String, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(|entry| (entry.key, entry.value))
    }
}

impl<V> IntoIterator for Map<V> {
    type Item = (String, V);
    type IntoIter = IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            entries: self.buckets.into_iter().flatten(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Map<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Maps are equal when they hold the same key/value set, whatever their
/// capacity or chain order.
impl<V: PartialEq> PartialEq for Map<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|theirs| theirs == value))
    }
}

impl<V: Eq> Eq for Map<V> {}
