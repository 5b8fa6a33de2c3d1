// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer loads data through DatasetSource so
// the HDF5 reader can be swapped for an in-memory source in
// tests without touching the training workflow.

use anyhow::Result;

use crate::domain::split::DatasetSplits;

// ─── DatasetSource ────────────────────────────────────────────────────────────
/// Anything that can produce the training and validation splits.
///
/// Implementations:
///   - Hdf5Loader       → reads `normalized_split` from MNIST.hdf5
///   - InMemorySource   → returns splits built in code (tests only)
pub trait DatasetSource {
    fn load_splits(&self) -> Result<DatasetSplits>;
}

/// A source that hands out splits it already holds.
#[cfg(test)]
pub struct InMemorySource {
    splits: DatasetSplits,
}

#[cfg(test)]
impl InMemorySource {
    pub fn new(splits: DatasetSplits) -> Self {
        Self { splits }
    }
}

#[cfg(test)]
impl DatasetSource for InMemorySource {
    fn load_splits(&self) -> Result<DatasetSplits> {
        Ok(self.splits.clone())
    }
}
