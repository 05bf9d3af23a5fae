//! The fixed-capacity, open-addressed table.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::iter::FusedIterator;
use core::mem;

use log::debug;
use log::trace;
use log::warn;

use crate::digest::Digest;
use crate::digest::Fnv1a;
use crate::error::InsertError;
use crate::error::TableError;

/// A live entry: the table's own copy of the key plus the value.
struct Bucket<V> {
    key: Box<[u8]>,
    value: V,
}

enum Slot<V> {
    /// Never used. Terminates every probe sequence passing through it.
    Empty,
    Occupied(Bucket<V>),
    /// Logically removed. Lookups probe past it; inserts may claim it and
    /// reuse the retained key storage when the new key has the same length.
    Tombstoned(Box<[u8]>),
}

impl<V> Slot<V> {
    #[inline(always)]
    fn bucket(&self) -> Option<&Bucket<V>> {
        match self {
            Slot::Occupied(bucket) => Some(bucket),
            _ => None,
        }
    }

    #[inline(always)]
    fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied(_))
    }

    #[inline(always)]
    fn key_storage(&self) -> usize {
        match self {
            Slot::Empty => 0,
            Slot::Occupied(bucket) => bucket.key.len(),
            Slot::Tombstoned(key) => key.len(),
        }
    }
}

/// Copies `key` into freshly allocated storage of exactly its length.
fn alloc_key(key: &[u8]) -> Result<Box<[u8]>, TableError> {
    let mut storage = Vec::new();
    storage
        .try_reserve_exact(key.len())
        .map_err(|_| TableError::AllocationFailure { bytes: key.len() })?;
    storage.extend_from_slice(key);
    Ok(storage.into_boxed_slice())
}

/// The quadratic probe sequence `(origin + i*i) % capacity` for
/// `i in 0..capacity`.
///
/// `i*i % capacity` is maintained incrementally, so nothing overflows
/// regardless of capacity. For power-of-two capacities only the quadratic
/// residues are ever reached; for a prime capacity congruent to 3 mod 4,
/// exactly `(capacity + 1) / 2` distinct slots are.
#[derive(Clone)]
pub(crate) struct ProbeSeq {
    origin: usize,
    capacity: usize,
    step: usize,
    offset: usize,
}

impl ProbeSeq {
    #[inline(always)]
    fn new(origin: usize, capacity: usize) -> Self {
        debug_assert!(origin < capacity);
        ProbeSeq {
            origin,
            capacity,
            step: 0,
            offset: 0,
        }
    }
}

impl Iterator for ProbeSeq {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.step == self.capacity {
            return None;
        }

        let index = (self.origin + self.offset) % self.capacity;

        // (i + 1)^2 = i^2 + 2i + 1
        let delta = (2 * self.step + 1) % self.capacity;
        self.offset = (self.offset + delta) % self.capacity;
        self.step += 1;

        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.capacity - self.step;
        (remaining, Some(remaining))
    }
}

/// A fixed-capacity hash table keyed by byte strings, using quadratic probing
/// and tombstone deletion.
///
/// The number of slots is chosen at creation and never changes; there is no
/// rehashing. Keys are copied into storage owned by the table. Values are
/// owned by the table while stored and handed back by [`remove`] and
/// [`drain`].
///
/// Every operation hashes the key with the table's [`Digest`] (FNV-1a by
/// default) and walks the slots `(origin + i*i) % capacity`:
///
/// - insertion claims the first empty or tombstoned slot,
/// - lookup and removal stop at the first empty slot, skip tombstones and
///   compare keys in occupied slots.
///
/// Insertion performs no equality check. Inserting a key that is already
/// present stores a second entry further down the probe chain; lookups keep
/// returning the first one until it is removed.
///
/// A table is single-threaded. Share one between threads behind a single
/// `Mutex`, or partition keys over several independent tables.
///
/// ## Example
///
/// ```rust
/// # use quad_hash::HashTable;
/// #
/// let mut table = HashTable::with_capacity(16).unwrap();
/// table.insert(b"alpha", 1).unwrap();
/// table.insert(b"beta", 2).unwrap();
///
/// assert_eq!(table.get(b"alpha"), Some(&1));
/// assert_eq!(table.remove(b"beta"), Some(2));
/// assert_eq!(table.get(b"beta"), None);
///
/// table.remove(b"alpha");
/// table.destroy();
/// ```
///
/// [`remove`]: HashTable::remove
/// [`drain`]: HashTable::drain
pub struct HashTable<V, D = Fnv1a> {
    slots: Box<[Slot<V>]>,
    populated: usize,
    tombstones: usize,
    digest: D,
}

impl<V> HashTable<V, Fnv1a> {
    /// Creates a table with exactly `capacity` slots, hashing keys with the
    /// default-seeded FNV-1a digest.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::AllocationFailure`] if the slot array cannot be
    /// allocated.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    ///
    /// ```rust
    /// # use quad_hash::HashTable;
    /// #
    /// let table: HashTable<u32> = HashTable::with_capacity(100).unwrap();
    /// assert_eq!(table.capacity(), 100);
    /// assert!(table.is_empty());
    /// ```
    pub fn with_capacity(capacity: usize) -> Result<Self, TableError> {
        Self::with_capacity_and_digest(capacity, Fnv1a::default())
    }
}

impl<V, D> HashTable<V, D>
where
    D: Digest,
{
    /// Creates a table with exactly `capacity` slots using `digest` to place
    /// keys.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::AllocationFailure`] if the slot array cannot be
    /// allocated. Nothing is left allocated in that case.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity_and_digest(capacity: usize, digest: D) -> Result<Self, TableError> {
        assert!(capacity > 0, "a hash table needs at least one slot");

        let bytes = capacity.saturating_mul(mem::size_of::<Slot<V>>());
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| TableError::AllocationFailure { bytes })?;
        slots.resize_with(capacity, || Slot::Empty);

        debug!("created hash table with {capacity} slots ({bytes} bytes)");

        Ok(Self {
            slots: slots.into_boxed_slice(),
            populated: 0,
            tombstones: 0,
            digest,
        })
    }

    #[inline(always)]
    fn probe(&self, key: &[u8]) -> ProbeSeq {
        let capacity = self.slots.len();
        let origin = (self.digest.digest(key) % capacity as u64) as usize;
        ProbeSeq::new(origin, capacity)
    }

    fn find_index(&self, key: &[u8]) -> Option<usize> {
        for index in self.probe(key) {
            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Tombstoned(_) => continue,
                Slot::Occupied(bucket) if *bucket.key == *key => return Some(index),
                Slot::Occupied(_) => {}
            }
        }

        None
    }

    /// Inserts `value` under a copy of `key`.
    ///
    /// The value lands in the first empty or tombstoned slot of the key's
    /// probe sequence. Existing entries are never replaced, so callers that
    /// need update semantics should [`remove`] first.
    ///
    /// # Errors
    ///
    /// - [`TableError::ProbeExhausted`] when every probed slot is occupied.
    ///   This can happen before the table is full because quadratic probing
    ///   does not visit every slot.
    /// - [`TableError::AllocationFailure`] when the key storage cannot be
    ///   allocated.
    ///
    /// The table is unchanged on error and the value is returned inside the
    /// [`InsertError`].
    ///
    /// ```rust
    /// # use quad_hash::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(8).unwrap();
    /// table.insert(&42u32.to_le_bytes(), "answer").unwrap();
    /// assert_eq!(table.get(&42u32.to_le_bytes()), Some(&"answer"));
    /// ```
    ///
    /// [`remove`]: HashTable::remove
    pub fn insert(&mut self, key: &[u8], value: V) -> Result<(), InsertError<V>> {
        let Some(index) = self.probe(key).find(|&i| !self.slots[i].is_occupied()) else {
            let probes = self.slots.len();
            warn!(
                "probe sequence exhausted after {probes} probes ({} of {probes} slots occupied)",
                self.populated
            );
            return Err(InsertError::new(TableError::ProbeExhausted { probes }, value));
        };

        let slot = &mut self.slots[index];
        let tombstone_len = match slot {
            Slot::Tombstoned(storage) => Some(storage.len()),
            _ => None,
        };

        let storage = match slot {
            Slot::Tombstoned(storage) if storage.len() == key.len() => {
                storage.copy_from_slice(key);
                mem::take(storage)
            }
            _ => match alloc_key(key) {
                Ok(storage) => storage,
                Err(kind) => return Err(InsertError::new(kind, value)),
            },
        };

        *slot = Slot::Occupied(Bucket {
            key: storage,
            value,
        });

        if let Some(old_len) = tombstone_len {
            if old_len != key.len() {
                trace!(
                    "replaced tombstone storage at slot {index}: {old_len} -> {} bytes",
                    key.len()
                );
            }
            self.tombstones -= 1;
        }
        self.populated += 1;

        Ok(())
    }

    /// Returns a reference to the value stored under `key`.
    ///
    /// ```rust
    /// # use quad_hash::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(8).unwrap();
    /// table.insert(b"k", 1).unwrap();
    /// assert_eq!(table.get(b"k"), Some(&1));
    /// assert_eq!(table.get(b"missing"), None);
    /// ```
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let index = self.find_index(key)?;
        self.slots[index].bucket().map(|bucket| &bucket.value)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        let index = self.find_index(key)?;
        match &mut self.slots[index] {
            Slot::Occupied(bucket) => Some(&mut bucket.value),
            _ => None,
        }
    }

    /// Returns `true` if an entry is stored under `key`.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find_index(key).is_some()
    }

    /// Removes the entry stored under `key` and returns its value.
    ///
    /// The slot becomes a tombstone, keeping its key storage for reuse, so
    /// probe chains passing through it stay intact.
    ///
    /// ```rust
    /// # use quad_hash::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(8).unwrap();
    /// table.insert(b"k", 1).unwrap();
    /// assert_eq!(table.remove(b"k"), Some(1));
    /// assert_eq!(table.remove(b"k"), None);
    /// assert_eq!(table.tombstones(), 1);
    /// ```
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let index = self.find_index(key)?;
        let slot = &mut self.slots[index];

        let Slot::Occupied(Bucket { key, value }) = mem::replace(slot, Slot::Empty) else {
            unreachable!("find_index only yields occupied slots");
        };

        *slot = Slot::Tombstoned(key);
        self.populated -= 1;
        self.tombstones += 1;
        Some(value)
    }
}

impl<V, D> HashTable<V, D> {
    /// Returns the number of slots. Fixed for the lifetime of the table.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of tombstoned slots.
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Returns the ratio of live entries to slots.
    pub fn load_factor(&self) -> f64 {
        self.populated as f64 / self.slots.len() as f64
    }

    /// Returns the digest used to place keys.
    pub fn digest(&self) -> &D {
        &self.digest
    }

    /// Releases the table.
    ///
    /// The table must have been emptied first, by [`remove`]-ing every entry
    /// or with [`drain`]; values still held here would otherwise be dropped
    /// behind the caller's back.
    ///
    /// # Panics
    ///
    /// Panics if the table still holds entries.
    ///
    /// [`remove`]: HashTable::remove
    /// [`drain`]: HashTable::drain
    pub fn destroy(self) {
        assert!(
            self.populated == 0,
            "destroying a hash table that still holds {} entries",
            self.populated
        );
        debug!(
            "destroying hash table with {} slots ({} tombstones)",
            self.slots.len(),
            self.tombstones
        );
    }

    /// Removes every entry, dropping the values, and resets all slots
    /// (tombstones included) to empty.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = Slot::Empty);
        self.populated = 0;
        self.tombstones = 0;
    }

    fn scan_from(&self, start: usize) -> Option<(Cursor, &[u8], &V)> {
        self.slots
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(index, slot)| {
                slot.bucket()
                    .map(|bucket| (Cursor { index }, &*bucket.key, &bucket.value))
            })
    }

    /// Returns the live entry with the lowest slot index, with a cursor for
    /// [`next`](HashTable::next).
    ///
    /// Calling `first` again restarts the walk. The cursor does not borrow
    /// the table; inserting or removing entries other than the one the
    /// cursor points at while walking is unsupported and may cause entries
    /// to be skipped or visited twice.
    ///
    /// ```rust
    /// # use quad_hash::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(32).unwrap();
    /// for i in 0u32..10 {
    ///     table.insert(&i.to_le_bytes(), i).unwrap();
    /// }
    ///
    /// // Visit-and-remove drains the table.
    /// let mut entry = table.first().map(|(c, k, _)| (c, k.to_vec()));
    /// while let Some((cursor, key)) = entry {
    ///     table.remove(&key).unwrap();
    ///     entry = table.next(cursor).map(|(c, k, _)| (c, k.to_vec()));
    /// }
    /// assert!(table.is_empty());
    /// table.destroy();
    /// ```
    pub fn first(&self) -> Option<(Cursor, &[u8], &V)> {
        self.scan_from(0)
    }

    /// Returns the next live entry after `cursor`, in ascending slot order.
    pub fn next(&self, cursor: Cursor) -> Option<(Cursor, &[u8], &V)> {
        self.scan_from(cursor.index + 1)
    }

    /// Returns an iterator over `(key, value)` pairs in ascending slot order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.populated,
        }
    }

    /// Returns an iterator over `(key, value)` pairs with mutable values, in
    /// ascending slot order.
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            slots: self.slots.iter_mut(),
            remaining: self.populated,
        }
    }

    /// Returns an iterator over the stored keys.
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the stored values.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Removes and yields every entry in ascending slot order.
    ///
    /// Every slot, tombstones included, is empty once the iterator has been
    /// dropped, even if it was not run to completion.
    ///
    /// ```rust
    /// # use quad_hash::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(8).unwrap();
    /// table.insert(b"a", 1).unwrap();
    /// table.insert(b"b", 2).unwrap();
    ///
    /// let mut values: Vec<i32> = table.drain().map(|(_, v)| v).collect();
    /// values.sort();
    /// assert_eq!(values, [1, 2]);
    /// table.destroy();
    /// ```
    pub fn drain(&mut self) -> Drain<'_, V, D> {
        Drain {
            table: self,
            index: 0,
        }
    }

    /// Takes an observational snapshot of memory usage and occupied slots.
    pub fn report(&self) -> Report {
        Report {
            fixed_bytes: mem::size_of::<Self>() + self.slots.len() * mem::size_of::<Slot<V>>(),
            key_bytes: self.slots.iter().map(Slot::key_storage).sum(),
            occupied: self
                .slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_occupied())
                .map(|(index, _)| index)
                .collect(),
        }
    }

    /// Writes [`report`](HashTable::report) to stdout, or to the `log` facade
    /// at debug level when built without `std`.
    pub fn dump(&self) {
        let report = self.report();

        cfg_if::cfg_if! {
            if #[cfg(feature = "std")] {
                print!("{report}");
            } else {
                use alloc::string::ToString;

                for line in report.to_string().lines() {
                    debug!("{line}");
                }
            }
        }
    }
}

impl<V, D> fmt::Debug for HashTable<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field(
                "slots",
                &self
                    .slots
                    .chunks(16)
                    .map(|chunk| {
                        chunk
                            .iter()
                            .map(|slot| match slot {
                                Slot::Empty => '.',
                                Slot::Occupied(_) => '#',
                                Slot::Tombstoned(_) => 'x',
                            })
                            .collect::<String>()
                    })
                    .collect::<Vec<_>>(),
            )
            .field("populated", &self.populated)
            .field("tombstones", &self.tombstones)
            .field("capacity", &self.slots.len())
            .finish()
    }
}

/// A position in the slot array returned by [`HashTable::first`] and
/// [`HashTable::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    index: usize,
}

impl Cursor {
    /// Returns the slot index of the entry this cursor points at.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// An iterator over the entries of a [`HashTable`].
///
/// This struct is created by [`HashTable::iter`].
pub struct Iter<'a, V> {
    slots: core::slice::Iter<'a, Slot<V>>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let bucket = self.slots.by_ref().find_map(Slot::bucket)?;
        self.remaining -= 1;
        Some((&*bucket.key, &bucket.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V> FusedIterator for Iter<'_, V> {}

/// A mutable iterator over the entries of a [`HashTable`].
///
/// This struct is created by [`HashTable::iter_mut`].
pub struct IterMut<'a, V> {
    slots: core::slice::IterMut<'a, Slot<V>>,
    remaining: usize,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = (&'a [u8], &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let bucket = self.slots.by_ref().find_map(|slot| match slot {
            Slot::Occupied(bucket) => Some(bucket),
            _ => None,
        })?;
        self.remaining -= 1;
        Some((&*bucket.key, &mut bucket.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IterMut<'_, V> {}

impl<V> FusedIterator for IterMut<'_, V> {}

/// A draining iterator over the entries of a [`HashTable`].
///
/// This struct is created by [`HashTable::drain`]. It yields the owned key
/// storage and value of each entry.
pub struct Drain<'a, V, D> {
    table: &'a mut HashTable<V, D>,
    index: usize,
}

impl<V, D> Iterator for Drain<'_, V, D> {
    type Item = (Box<[u8]>, V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.table.slots.len() {
            let slot = mem::replace(&mut self.table.slots[self.index], Slot::Empty);
            self.index += 1;

            match slot {
                Slot::Occupied(Bucket { key, value }) => {
                    self.table.populated -= 1;
                    return Some((key, value));
                }
                Slot::Tombstoned(_) => self.table.tombstones -= 1,
                Slot::Empty => {}
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.populated, Some(self.table.populated))
    }
}

impl<V, D> Drop for Drain<'_, V, D> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

/// Snapshot produced by [`HashTable::report`].
///
/// Its `Display` form lists the memory usage followed by one
/// `[<index>][ full ]` line per occupied slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    fixed_bytes: usize,
    key_bytes: usize,
    occupied: Vec<usize>,
}

impl Report {
    /// Bytes used by the table header and the slot array.
    pub fn fixed_bytes(&self) -> usize {
        self.fixed_bytes
    }

    /// Bytes of key storage held by occupied and tombstoned slots.
    pub fn key_bytes(&self) -> usize {
        self.key_bytes
    }

    /// Indices of the occupied slots, ascending.
    pub fn occupied(&self) -> &[usize] {
        &self.occupied
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fixed memory usage = {}", self.fixed_bytes)?;
        writeln!(f, "Key storage = {}", self.key_bytes)?;
        for index in &self.occupied {
            writeln!(f, "[{index}][ full ]")?;
        }
        Ok(())
    }
}

#[cfg(feature = "stats")]
impl<V, D> HashTable<V, D>
where
    D: Digest,
{
    /// Returns occupancy and memory statistics.
    pub fn debug_stats(&self) -> crate::stats::DebugStats {
        let report = self.report();
        let capacity = self.slots.len();

        crate::stats::DebugStats {
            populated: self.populated,
            tombstoned: self.tombstones,
            empty: capacity - self.populated - self.tombstones,
            capacity,
            load_factor: self.load_factor(),
            tombstone_ratio: self.tombstones as f64 / capacity as f64,
            fixed_bytes: report.fixed_bytes(),
            key_bytes: report.key_bytes(),
        }
    }

    /// Computes how many probes each live entry needs to be found.
    ///
    /// Bin `n` counts the entries sitting at step `n` of their probe
    /// sequence, so bin 0 holds the entries stored at their origin slot.
    pub fn probe_histogram(&self) -> crate::stats::ProbeHistogram {
        let mut bins: Vec<usize> = Vec::new();

        for (index, slot) in self.slots.iter().enumerate() {
            let Some(bucket) = slot.bucket() else {
                continue;
            };

            if let Some(step) = self.probe(&bucket.key).position(|i| i == index) {
                if bins.len() <= step {
                    bins.resize(step + 1, 0);
                }
                bins[step] += 1;
            }
        }

        crate::stats::ProbeHistogram::new(bins)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;

    use hashbrown::HashMap;
    use hashbrown::HashSet;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn key(k: u32) -> [u8; 4] {
        k.to_le_bytes()
    }

    fn random_seed() -> u64 {
        OsRng.try_next_u64().unwrap()
    }

    #[test]
    fn probe_sequence_is_quadratic() {
        let seq: Vec<usize> = ProbeSeq::new(3, 11).collect();
        let expected: Vec<usize> = (0..11).map(|i| (3 + i * i) % 11).collect();
        assert_eq!(seq, expected);
    }

    #[test]
    fn probe_sequence_covers_only_residues_on_power_of_two() {
        let reached: HashSet<usize> = ProbeSeq::new(0, 16).collect();
        let mut reached: Vec<usize> = reached.into_iter().collect();
        reached.sort();
        assert_eq!(reached, [0, 1, 4, 9]);
    }

    #[test]
    fn probe_sequence_covers_half_of_prime_three_mod_four() {
        let reached: HashSet<usize> = ProbeSeq::new(7, 31).collect();
        assert_eq!(reached.len(), 16);
    }

    #[test]
    fn new_table_is_empty() {
        let table: HashTable<u32> = HashTable::with_capacity(16).unwrap();
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        assert_eq!(table.tombstones(), 0);
        assert!(table.first().is_none());
        assert_eq!(table.iter().count(), 0);
        table.destroy();
    }

    #[test]
    #[should_panic(expected = "at least one slot")]
    fn zero_capacity_is_rejected() {
        let _ = HashTable::<u32>::with_capacity(0);
    }

    #[test]
    fn oversized_capacity_reports_allocation_failure() {
        let err = HashTable::<u64>::with_capacity(usize::MAX / 2).unwrap_err();
        assert!(
            matches!(err, TableError::AllocationFailure { bytes } if bytes > 0),
            "{err:?}"
        );

        let mut table = HashTable::<u64>::with_capacity(8).unwrap();
        table.insert(b"after", 1).unwrap();
        assert_eq!(table.get(b"after"), Some(&1));
        assert_eq!(table.remove(b"after"), Some(1));
        table.destroy();
    }

    #[test]
    fn insert_and_get_eleven_keys() {
        let mut table = HashTable::with_capacity(16).unwrap();
        for k in 0..=10u32 {
            table
                .insert(&key(k), k * 100 + 7)
                .unwrap_or_else(|e| panic!("insert {k} failed: {e} {table:#?}"));
        }

        assert_eq!(table.len(), 11);
        for k in 0..=10u32 {
            assert_eq!(table.get(&key(k)), Some(&(k * 100 + 7)), "{table:#?}");
        }
        assert_eq!(table.get(&key(99)), None);
        assert_eq!(table.capacity(), 16);
    }

    #[test]
    fn remove_then_absent() {
        let mut table = HashTable::with_capacity(64).unwrap();
        for k in 0..20u32 {
            table.insert(&key(k), k).unwrap();
        }

        for k in (0..20u32).step_by(3) {
            assert_eq!(table.remove(&key(k)), Some(k));
            assert_eq!(table.get(&key(k)), None);
            assert_eq!(table.remove(&key(k)), None);
        }

        for k in 0..20u32 {
            let expected = if k % 3 == 0 { None } else { Some(&k) };
            assert_eq!(table.get(&key(k)), expected);
        }
        assert_eq!(table.len(), 13);
        assert_eq!(table.tombstones(), 7);
        assert_eq!(table.capacity(), 64);
    }

    #[test]
    fn remove_tombstones_only_the_matching_entry() {
        let mut table = HashTable::with_capacity_and_digest(16, |_: &[u8]| 5u64).unwrap();
        for (k, v) in [(b"a", 1), (b"b", 2), (b"c", 3)] {
            table.insert(k, v).unwrap();
        }

        assert_eq!(table.remove(b"b"), Some(2));
        assert!(matches!(&table.slots[6], Slot::Tombstoned(k) if **k == *b"b"));
        assert_eq!(table.remove(b"b"), None);
        assert_eq!(table.remove(b"missing"), None);

        assert_eq!(table.get(b"a"), Some(&1));
        assert_eq!(table.get(b"c"), Some(&3));
        assert_eq!(table.len(), 2);
        assert_eq!(table.tombstones(), 1);
    }

    #[test]
    fn tombstone_is_reclaimed_by_colliding_key() {
        let mut table = HashTable::with_capacity_and_digest(16, |_: &[u8]| 5u64).unwrap();

        table.insert(b"A", 'a').unwrap();
        assert_eq!(table.remove(b"A"), Some('a'));
        assert_eq!(table.tombstones(), 1);

        table.insert(b"B", 'b').unwrap();
        assert_eq!(table.get(b"B"), Some(&'b'));
        assert_eq!(table.get(b"A"), None);
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.len(), 1);

        let (cursor, k, _) = table.first().unwrap();
        assert_eq!(cursor.index(), 5);
        assert_eq!(k, b"B");
    }

    #[test]
    fn tombstone_storage_is_reused_for_same_length() {
        let mut table = HashTable::with_capacity_and_digest(8, |_: &[u8]| 2u64).unwrap();

        table.insert(b"abcd", 1).unwrap();
        let before = table.slots[2].bucket().unwrap().key.as_ptr();
        table.remove(b"abcd");

        table.insert(b"wxyz", 2).unwrap();
        let after = table.slots[2].bucket().unwrap().key.as_ptr();
        assert_eq!(before, after);
        assert_eq!(table.get(b"wxyz"), Some(&2));
    }

    #[test]
    fn tombstone_storage_is_replaced_for_other_length() {
        let mut table = HashTable::with_capacity_and_digest(8, |_: &[u8]| 2u64).unwrap();

        table.insert(b"abcd", 1).unwrap();
        table.remove(b"abcd");
        table.insert(b"a much longer key", 2).unwrap();

        let (_, k, v) = table.first().unwrap();
        assert_eq!(k, b"a much longer key");
        assert_eq!(*v, 2);
        assert_eq!(table.report().key_bytes(), b"a much longer key".len());
        assert_eq!(table.get(b"abcd"), None);
    }

    #[test]
    fn lookups_probe_past_tombstones() {
        let mut table = HashTable::with_capacity_and_digest(16, |_: &[u8]| 0u64).unwrap();
        table.insert(b"a", 1).unwrap();
        table.insert(b"b", 2).unwrap();
        table.insert(b"c", 3).unwrap();

        assert_eq!(table.remove(b"a"), Some(1));
        assert_eq!(table.get(b"c"), Some(&3));
        assert_eq!(table.remove(b"b"), Some(2));
        assert_eq!(table.get(b"c"), Some(&3));
        assert_eq!(table.remove(b"c"), Some(3));
        assert!(table.is_empty());
        assert_eq!(table.tombstones(), 3);
        assert_eq!(table.get(b"c"), None);
    }

    #[test]
    fn colliding_keys_exhaust_probe_sequence() {
        let mut table = HashTable::with_capacity_and_digest(16, |_: &[u8]| 5u64).unwrap();

        // Only the quadratic residues {0, 1, 4, 9} are reachable from the
        // origin on a power-of-two table.
        for k in 0..4u32 {
            table.insert(&key(k), k).unwrap();
        }

        let err = table.insert(&key(4), 4).unwrap_err();
        assert_eq!(err.kind(), &TableError::ProbeExhausted { probes: 16 });
        assert_eq!(err.into_value(), 4);

        assert_eq!(table.len(), 4);
        assert_eq!(table.tombstones(), 0);
        for k in 0..4u32 {
            assert_eq!(table.get(&key(k)), Some(&k));
        }
        assert_eq!(table.get(&key(4)), None);
        assert_eq!(table.report().occupied(), [5, 6, 9, 14]);
    }

    #[test]
    fn prime_capacity_reaches_half_the_slots() {
        let mut table = HashTable::with_capacity_and_digest(31, |_: &[u8]| 12u64).unwrap();

        for k in 0..16u32 {
            table.insert(&key(k), k).unwrap();
        }
        assert!(table.insert(&key(16), 16).is_err());
        assert_eq!(table.len(), 16);

        // A freed slot is reachable again.
        table.remove(&key(7)).unwrap();
        table.insert(&key(16), 16).unwrap();
        assert_eq!(table.get(&key(16)), Some(&16));
    }

    #[test]
    fn duplicate_insert_adds_shadowed_entry() {
        let mut table = HashTable::with_capacity(16).unwrap();
        table.insert(b"dup", 1).unwrap();
        table.insert(b"dup", 2).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b"dup"), Some(&1));
        assert_eq!(table.remove(b"dup"), Some(1));
        assert_eq!(table.get(b"dup"), Some(&2));
        assert_eq!(table.remove(b"dup"), Some(2));
        assert_eq!(table.get(b"dup"), None);
    }

    #[test]
    fn keys_compare_by_full_length() {
        let mut table = HashTable::with_capacity_and_digest(8, |_: &[u8]| 1u64).unwrap();
        table.insert(b"ab", 1).unwrap();
        table.insert(b"", 0).unwrap();

        assert_eq!(table.get(b"a"), None);
        assert_eq!(table.get(b"abc"), None);
        assert_eq!(table.get(b"ab"), Some(&1));
        assert_eq!(table.get(b""), Some(&0));
    }

    #[test]
    fn keys_are_copied() {
        let mut table = HashTable::with_capacity(8).unwrap();
        let mut buffer = vec![1u8, 2, 3];
        table.insert(&buffer, "v").unwrap();

        buffer[0] = 9;
        assert_eq!(table.get(&[1, 2, 3]), Some(&"v"));
        assert_eq!(table.get(&buffer), None);
    }

    #[test]
    fn get_mut_and_iter_mut_modify() {
        let mut table = HashTable::with_capacity(32).unwrap();
        for k in 0..8u32 {
            table.insert(&key(k), k).unwrap();
        }

        *table.get_mut(&key(3)).unwrap() += 100;
        for (_, v) in table.iter_mut() {
            *v += 1;
        }

        assert_eq!(table.get(&key(3)), Some(&104));
        assert_eq!(table.get(&key(0)), Some(&1));
        assert!(table.get_mut(&key(77)).is_none());
        assert!(table.contains_key(&key(7)));
        assert!(!table.contains_key(&key(8)));
    }

    #[test]
    fn cursor_visits_every_entry_once_in_slot_order() {
        let mut table = HashTable::with_capacity(101).unwrap();
        for k in 0..40u32 {
            table.insert(&key(k), k).unwrap();
        }
        for k in (0..40u32).step_by(4) {
            table.remove(&key(k));
        }

        let mut seen = Vec::new();
        let mut last = None;
        let mut entry = table.first();
        while let Some((cursor, k, v)) = entry {
            if let Some(last) = last {
                assert!(cursor > last);
            }
            last = Some(cursor);
            seen.push((k.to_vec(), *v));
            entry = table.next(cursor);
        }

        assert_eq!(seen.len(), table.len());
        let from_iter: Vec<_> = table.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
        assert_eq!(seen, from_iter);

        let mut values: Vec<u32> = seen.iter().map(|(_, v)| *v).collect();
        values.sort();
        let expected: Vec<u32> = (0..40).filter(|k| k % 4 != 0).collect();
        assert_eq!(values, expected);
        assert_eq!(table.values().count(), 30);
        assert_eq!(table.keys().count(), 30);
        assert_eq!(table.iter().len(), 30);
    }

    #[test]
    fn cursor_walk_can_remove_current_entry() {
        let mut table = HashTable::with_capacity(1031).unwrap();
        for i in 0..700u32 {
            let k = [i, i + 1, i * 2, i % 100];
            let bytes: Vec<u8> = k.iter().flat_map(|x| x.to_le_bytes()).collect();
            table.insert(&bytes, i).unwrap();
        }
        assert_eq!(table.len(), 700);

        let mut removed = 0;
        let mut entry = table.first().map(|(c, k, _)| (c, k.to_vec()));
        while let Some((cursor, k)) = entry {
            assert!(table.remove(&k).is_some());
            removed += 1;
            entry = table.next(cursor).map(|(c, k, _)| (c, k.to_vec()));
        }

        assert_eq!(removed, 700);
        assert_eq!(table.len(), 0);
        assert_eq!(table.tombstones(), 700);
        table.destroy();
    }

    #[test]
    fn drain_empties_every_slot() {
        let mut table = HashTable::with_capacity(64).unwrap();
        for k in 0..30u32 {
            table.insert(&key(k), k).unwrap();
        }
        for k in 0..10u32 {
            table.remove(&key(k));
        }

        let mut drained: Vec<u32> = table.drain().map(|(_, v)| v).collect();
        drained.sort();
        assert_eq!(drained, (10..30).collect::<Vec<_>>());
        assert!(table.is_empty());
        assert_eq!(table.tombstones(), 0);
        assert!(table.slots.iter().all(|slot| matches!(slot, Slot::Empty)));
        table.destroy();
    }

    #[test]
    fn partially_consumed_drain_still_empties() {
        let mut table = HashTable::with_capacity(16).unwrap();
        for k in 0..6u32 {
            table.insert(&key(k), k).unwrap();
        }

        let first = table.drain().next();
        assert!(first.is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn clear_resets_tombstones() {
        let mut table = HashTable::with_capacity(16).unwrap();
        for k in 0..6u32 {
            table.insert(&key(k), k).unwrap();
        }
        table.remove(&key(0));
        table.clear();

        assert!(table.is_empty());
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.get(&key(1)), None);
        table.destroy();
    }

    #[test]
    #[should_panic(expected = "still holds 1 entries")]
    fn destroy_rejects_live_entries() {
        let mut table = HashTable::with_capacity(4).unwrap();
        table.insert(b"live", ()).unwrap();
        table.destroy();
    }

    #[test]
    fn report_lists_occupied_slots() {
        let mut table = HashTable::with_capacity(16).unwrap();
        for k in 0..=10u32 {
            table.insert(&key(k), k).unwrap();
        }
        table.remove(&key(3));

        let report = table.report();
        let indices: Vec<usize> = {
            let mut out = Vec::new();
            let mut entry = table.first();
            while let Some((cursor, _, _)) = entry {
                out.push(cursor.index());
                entry = table.next(cursor);
            }
            out
        };
        assert_eq!(report.occupied(), indices.as_slice());
        assert_eq!(report.key_bytes(), 11 * 4);

        let text = report.to_string();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            alloc::format!("Fixed memory usage = {}", report.fixed_bytes())
        );
        assert_eq!(lines.next().unwrap(), "Key storage = 44");
        for index in indices {
            assert_eq!(lines.next().unwrap(), alloc::format!("[{index}][ full ]"));
        }
        assert!(lines.next().is_none());

        table.dump();
    }

    #[test]
    fn debug_shows_slot_map() {
        let mut table = HashTable::with_capacity_and_digest(4, |_: &[u8]| 0u64).unwrap();
        table.insert(b"a", 1).unwrap();
        table.insert(b"b", 2).unwrap();
        table.remove(b"a");

        let text = alloc::format!("{table:?}");
        assert!(text.contains("[\"x#..\"]"), "{text}");
        assert!(text.contains("populated: 1"), "{text}");
        assert!(text.contains("tombstones: 1"), "{text}");
    }

    #[test]
    fn random_operations_match_model() {
        let seed = random_seed();
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut table = HashTable::with_capacity(1031).unwrap();
        let mut model: HashMap<[u8; 2], u64> = HashMap::new();

        for step in 0..20_000u64 {
            let k: u16 = rng.random_range(0..600);
            let bytes = k.to_le_bytes();

            match rng.random_range(0..3) {
                0 => {
                    if model.contains_key(&bytes) {
                        continue;
                    }
                    match table.insert(&bytes, step) {
                        Ok(()) => {
                            model.insert(bytes, step);
                        }
                        Err(e) => assert!(
                            matches!(e.kind(), TableError::ProbeExhausted { .. }),
                            "seed {seed}: {e}"
                        ),
                    }
                }
                1 => assert_eq!(table.get(&bytes), model.get(&bytes), "seed {seed}"),
                _ => assert_eq!(table.remove(&bytes), model.remove(&bytes), "seed {seed}"),
            }

            assert_eq!(table.len(), model.len(), "seed {seed}");
            assert_eq!(table.capacity(), 1031);
        }

        let live: HashMap<[u8; 2], u64> = table
            .iter()
            .map(|(k, v)| ([k[0], k[1]], *v))
            .collect();
        assert_eq!(live, model, "seed {seed}");
    }

    #[cfg(feature = "stats")]
    #[test]
    fn stats_account_for_every_slot() {
        let mut table = HashTable::with_capacity_and_digest(16, |_: &[u8]| 5u64).unwrap();
        for k in 0..4u32 {
            table.insert(&key(k), k).unwrap();
        }
        table.remove(&key(1));

        let stats = table.debug_stats();
        assert_eq!(stats.populated, 3);
        assert_eq!(stats.tombstoned, 1);
        assert_eq!(stats.empty, 12);
        assert_eq!(stats.capacity, 16);
        assert_eq!(stats.key_bytes, 16);

        // Keys 0, 2 and 3 sit at probe steps 0, 2 and 3.
        let histogram = table.probe_histogram();
        assert_eq!(histogram.bins(), [1, 0, 1, 1]);
        assert_eq!(histogram.max_probe(), Some(3));
        assert_eq!(histogram.total(), 3);
    }
}
