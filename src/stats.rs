//! Low-level occupancy statistics, enabled by the `stats` feature.

use alloc::vec::Vec;

/// Occupancy and memory statistics for a [`HashTable`](crate::HashTable).
#[derive(Debug, Clone, PartialEq)]
pub struct DebugStats {
    /// Number of live entries
    pub populated: usize,
    /// Number of tombstoned slots
    pub tombstoned: usize,
    /// Number of never-used slots
    pub empty: usize,
    /// Total number of slots
    pub capacity: usize,
    /// populated / capacity
    pub load_factor: f64,
    /// tombstoned / capacity
    pub tombstone_ratio: f64,
    /// Bytes used by the table header and slot array
    pub fixed_bytes: usize,
    /// Bytes of key storage held by occupied and tombstoned slots
    pub key_bytes: usize,
}

impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.populated,
            self.capacity,
            self.load_factor * 100.0
        );
        println!(
            "Tombstones: {} ({:.2}% of slots)",
            self.tombstoned,
            self.tombstone_ratio * 100.0
        );
        println!("Empty: {}", self.empty);
        println!(
            "Memory: {} bytes fixed, {} bytes of keys",
            self.fixed_bytes, self.key_bytes
        );
    }
}

/// Number of live entries found at each step of their probe sequence.
///
/// Produced by [`HashTable::probe_histogram`](crate::HashTable::probe_histogram).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    bins: Vec<usize>,
}

impl ProbeHistogram {
    pub(crate) fn new(bins: Vec<usize>) -> Self {
        Self { bins }
    }

    /// Entry counts indexed by probe step.
    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    /// Longest probe step any live entry needs, if there are entries.
    pub fn max_probe(&self) -> Option<usize> {
        self.bins.iter().rposition(|&count| count > 0)
    }

    /// Number of entries counted.
    pub fn total(&self) -> usize {
        self.bins.iter().sum()
    }

    /// Mean probe step over all entries.
    pub fn mean(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }

        let weighted: usize = self
            .bins
            .iter()
            .enumerate()
            .map(|(step, &count)| step * count)
            .sum();
        weighted as f64 / total as f64
    }

    /// Pretty-prints the histogram horizontally using stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self.bins.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!(
            "probe histogram ({} entries, mean {:.2}):",
            self.total(),
            self.mean()
        );

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = match units % 8 {
                1 => Some('▏'),
                2 => Some('▎'),
                3 => Some('▍'),
                4 => Some('▌'),
                5 => Some('▋'),
                6 => Some('▊'),
                7 => Some('▉'),
                _ => None,
            };
            bar.extend(partial);
            bar
        };

        for (step, &count) in self.bins.iter().enumerate() {
            println!("{:>3} | {} ({})", step, make_bar(count), count);
        }
    }
}
