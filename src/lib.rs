#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Key digests used to seed probe sequences.
///
/// This module provides the [`Digest`](digest::Digest) trait, the default
/// seeded FNV-1a digest, and an adapter over any `BuildHasher`.
pub mod digest;

mod error;

pub mod hash_table;

/// Occupancy statistics for debugging and tuning.
#[cfg(feature = "stats")]
pub mod stats;

pub use digest::Digest;
pub use digest::Fnv1a;
pub use error::InsertError;
pub use error::TableError;
pub use hash_table::Cursor;
pub use hash_table::HashTable;
pub use hash_table::Report;
