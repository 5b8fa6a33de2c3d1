// ============================================================
// Layer 4 — MNIST Batcher
// ============================================================
// Implements Burn's Batcher trait to stack MnistItems into a
// feature matrix and a label vector:
//
//   Input:  Vec of N MnistItems, each with F features
//   Output: MnistBatch { features: [N, F], targets: [N] }
//
// Every item in a split has the same feature count, so the
// rows can be concatenated and reshaped directly.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::MnistItem;

/// A batch ready for the network forward pass.
#[derive(Debug, Clone)]
pub struct MnistBatch<B: Backend> {
    /// Flattened images — shape: [batch_size, features]
    pub features: Tensor<B, 2>,

    /// Class indices — shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Holds the target device so tensors are created on the
/// correct GPU/CPU.
#[derive(Clone, Debug)]
pub struct MnistBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> MnistBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<MnistItem, MnistBatch<B>> for MnistBatcher<B> {
    fn batch(&self, items: Vec<MnistItem>) -> MnistBatch<B> {
        let batch_size   = items.len();
        let feature_size = items.first().map_or(0, |i| i.features.len());

        let features_flat: Vec<f32> = items
            .iter()
            .flat_map(|item| item.features.iter().copied())
            .collect();

        let labels: Vec<i32> = items
            .iter()
            .map(|item| item.label as i32)
            .collect();

        let features = Tensor::<B, 1>::from_floats(features_flat.as_slice(), &self.device)
            .reshape([batch_size, feature_size]);

        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        MnistBatch { features, targets }
    }
}
