use core::fmt;

use thiserror::Error;

/// Failures a [`HashTable`](crate::HashTable) reports to its caller.
///
/// A missing key is not an error; lookups return `None` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// The allocator could not provide storage for the slot array or for a
    /// key.
    #[error("failed to allocate {bytes} bytes of table storage")]
    AllocationFailure {
        /// Size of the failed request.
        bytes: usize,
    },
    /// Every slot on the key's probe sequence is occupied. The table never
    /// grows, so this is final until entries are removed.
    #[error("no free slot on the probe sequence after {probes} probes")]
    ProbeExhausted {
        /// Number of slots inspected.
        probes: usize,
    },
}

/// A rejected insertion: the reason plus the value that could not be stored,
/// so the caller keeps ownership of it.
///
/// ```rust
/// # use quad_hash::HashTable;
/// # use quad_hash::TableError;
/// #
/// let mut table = HashTable::with_capacity_and_digest(1, |_: &[u8]| 0u64).unwrap();
/// table.insert(b"first", 1).unwrap();
///
/// let err = table.insert(b"second", 2).unwrap_err();
/// assert_eq!(err.kind(), &TableError::ProbeExhausted { probes: 1 });
/// assert_eq!(err.into_value(), 2);
/// ```
#[derive(Error)]
#[error("insert rejected: {kind}")]
pub struct InsertError<V> {
    #[source]
    kind: TableError,
    value: V,
}

impl<V> InsertError<V> {
    pub(crate) fn new(kind: TableError, value: V) -> Self {
        Self { kind, value }
    }

    /// Returns why the insertion failed.
    pub fn kind(&self) -> &TableError {
        &self.kind
    }

    /// Returns the value that was not inserted.
    pub fn into_value(self) -> V {
        self.value
    }

    /// Splits the error into its reason and the rejected value.
    pub fn into_parts(self) -> (TableError, V) {
        (self.kind, self.value)
    }
}

impl<V> fmt::Debug for InsertError<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<V> From<InsertError<V>> for TableError {
    fn from(err: InsertError<V>) -> Self {
        err.kind
    }
}
