// ============================================================
// Layer 4 — Minibatch Iterator
// ============================================================
// Wraps Burn's DataLoader for one split and remembers how
// many samples it covers, so hooks can size progress bars
// before the first batch arrives.
//
// The last batch of an epoch is partial when the split size
// is not a multiple of the batch size. A shuffled loader
// reshuffles on every call to iter().

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};
use std::sync::Arc;

use crate::data::{
    batcher::{MnistBatch, MnistBatcher},
    dataset::MnistDataset,
};
use crate::domain::split::DataSplit;

pub struct Minibatches<B: Backend> {
    /// Burn DataLoader producing one MnistBatch per step
    loader:      Arc<dyn DataLoader<MnistBatch<B>>>,
    /// Samples in the wrapped split
    num_samples: usize,
    /// Samples per batch; the final batch may hold fewer
    batch_size:  usize,
}

impl<B: Backend> Minibatches<B> {
    /// Build an iterator over `split`. `shuffle_seed` enables per-epoch
    /// shuffling; `None` keeps file order.
    pub fn new(
        split:        DataSplit,
        batch_size:   usize,
        shuffle_seed: Option<u64>,
        device:       B::Device,
    ) -> Result<Self> {
        ensure!(batch_size > 0, "batch size must be positive");

        let num_samples = split.len();
        let batcher     = MnistBatcher::<B>::new(device);

        let mut builder = DataLoaderBuilder::new(batcher)
            .batch_size(batch_size)
            .num_workers(1);
        if let Some(seed) = shuffle_seed {
            builder = builder.shuffle(seed);
        }
        let loader = builder.build(MnistDataset::new(split));

        Ok(Self { loader, num_samples, batch_size })
    }

    pub fn iter(&self) -> impl Iterator<Item = MnistBatch<B>> + '_ {
        self.loader.iter()
    }

    pub fn num_samples(&self) -> usize { self.num_samples }

    /// Batches per epoch, counting a trailing partial batch.
    pub fn num_batches(&self) -> usize {
        self.num_samples.div_ceil(self.batch_size)
    }
}
