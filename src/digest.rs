use core::hash::BuildHasher;

/// Maps the raw bytes of a key to the 64-bit value that seeds its probe
/// sequence.
///
/// Implementations must be deterministic: the same bytes must always produce
/// the same digest for a given instance, otherwise entries become
/// unreachable. A [`HashTable`](crate::HashTable) uses a single digest
/// instance for insertion, lookup and removal.
///
/// Any `Fn(&[u8]) -> u64` closure is a digest, which is convenient for
/// forcing collisions:
///
/// ```rust
/// # use quad_hash::HashTable;
/// #
/// let mut table = HashTable::with_capacity_and_digest(8, |_: &[u8]| 3u64).unwrap();
/// table.insert(b"a", 1).unwrap();
/// table.insert(b"b", 2).unwrap();
/// assert_eq!(table.get(b"b"), Some(&2));
/// ```
pub trait Digest {
    /// Computes the digest of `key`.
    fn digest(&self, key: &[u8]) -> u64;
}

impl<F> Digest for F
where
    F: Fn(&[u8]) -> u64,
{
    #[inline(always)]
    fn digest(&self, key: &[u8]) -> u64 {
        self(key)
    }
}

/// Seeded 64-bit FNV-1a.
///
/// The default seed is the standard FNV-1a 64-bit offset basis.
///
/// ```rust
/// # use quad_hash::digest::Digest;
/// # use quad_hash::digest::Fnv1a;
/// #
/// assert_eq!(Fnv1a::default().digest(b""), Fnv1a::OFFSET_BASIS);
/// assert_ne!(Fnv1a::with_seed(7).digest(b"key"), Fnv1a::default().digest(b"key"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fnv1a {
    seed: u64,
}

impl Fnv1a {
    /// The 64-bit FNV offset basis.
    pub const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    /// The 64-bit FNV prime.
    pub const PRIME: u64 = 0x0000_0100_0000_01b3;

    /// Creates a digest starting from `seed` instead of the offset basis.
    pub const fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Returns the seed this digest starts from.
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::with_seed(Self::OFFSET_BASIS)
    }
}

impl Digest for Fnv1a {
    #[inline]
    fn digest(&self, key: &[u8]) -> u64 {
        key.iter().fold(self.seed, |hash, &byte| {
            (hash ^ byte as u64).wrapping_mul(Self::PRIME)
        })
    }
}

/// Adapts any [`BuildHasher`] into a [`Digest`].
///
/// The key is hashed as a byte slice, so the length prefix that `Hash for
/// [u8]` writes is part of the digest. Randomly seeded builders such as
/// `std`'s `RandomState` are fine as long as the same instance is kept for the
/// lifetime of the table, which the table guarantees.
///
/// ```rust
/// # use quad_hash::HashTable;
/// # use quad_hash::digest::BuildHasherDigest;
/// # use std::collections::hash_map::RandomState;
/// #
/// let digest = BuildHasherDigest::new(RandomState::new());
/// let mut table = HashTable::with_capacity_and_digest(31, digest).unwrap();
/// table.insert(b"key", "value").unwrap();
/// assert_eq!(table.get(b"key"), Some(&"value"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BuildHasherDigest<S> {
    hash_builder: S,
}

impl<S> BuildHasherDigest<S> {
    /// Wraps `hash_builder`.
    pub const fn new(hash_builder: S) -> Self {
        Self { hash_builder }
    }

    /// Returns the wrapped hasher builder.
    pub fn hash_builder(&self) -> &S {
        &self.hash_builder
    }
}

impl<S> Digest for BuildHasherDigest<S>
where
    S: BuildHasher,
{
    #[inline]
    fn digest(&self, key: &[u8]) -> u64 {
        self.hash_builder.hash_one(key)
    }
}

/// A [`Digest`] backed by foldhash's fixed-seed fast hasher.
#[cfg(feature = "foldhash")]
pub type FoldDigest = BuildHasherDigest<foldhash::fast::FixedState>;
