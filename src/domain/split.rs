// ============================================================
// Layer 3 — Dataset Splits
// ============================================================
// A split is a dense feature matrix plus one class label per
// row, stored flat so it can be handed to the batcher without
// reshaping:
//
//   features: [s0_f0, s0_f1, ..., s0_fF, s1_f0, ..., sN_fF]
//   labels:   [y0, y1, ..., yN]
//
// MNIST ships pre-split, so there is no shuffling or
// splitting here; the loader reads `training` and
// `validation` straight from the file.

use anyhow::{ensure, Context, Result};

/// One labelled sample borrowed from a split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRef<'a> {
    pub features: &'a [f32],
    pub label:    u32,
}

/// An immutable partition of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSplit {
    features:     Vec<f32>,
    labels:       Vec<u32>,
    feature_size: usize,
}

impl DataSplit {
    /// Build a split, checking that the feature matrix has exactly
    /// one row of `feature_size` values per label.
    pub fn new(features: Vec<f32>, labels: Vec<u32>, feature_size: usize) -> Result<Self> {
        ensure!(!labels.is_empty(), "split contains no samples");
        ensure!(feature_size > 0, "feature size must be positive");
        ensure!(
            features.len() == labels.len() * feature_size,
            "feature count {} does not match {} labels of size {}",
            features.len(),
            labels.len(),
            feature_size,
        );
        Ok(Self { features, labels, feature_size })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn feature_size(&self) -> usize {
        self.feature_size
    }

    /// Highest label + 1, i.e. the smallest class count that covers this split.
    pub fn class_count(&self) -> usize {
        self.labels.iter().copied().max().map_or(0, |m| m as usize + 1)
    }

    /// Fails when some label does not index one of `num_classes` outputs.
    pub fn ensure_classes(&self, num_classes: usize) -> Result<()> {
        let needed = self.class_count();
        ensure!(
            needed <= num_classes,
            "label {} is out of range for {} classes",
            needed - 1,
            num_classes,
        );
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<SampleRef<'_>> {
        let label = *self.labels.get(index)?;
        let start = index * self.feature_size;
        Some(SampleRef {
            features: &self.features[start..start + self.feature_size],
            label,
        })
    }
}

/// The two partitions used by a training run.
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub training:   DataSplit,
    pub validation: DataSplit,
}

impl DatasetSplits {
    pub fn new(training: DataSplit, validation: DataSplit) -> Result<Self> {
        ensure!(
            training.feature_size() == validation.feature_size(),
            "training features have size {} but validation features have size {}",
            training.feature_size(),
            validation.feature_size(),
        );
        Ok(Self { training, validation })
    }

    pub fn feature_size(&self) -> usize {
        self.training.feature_size()
    }

    /// `DataSplit::ensure_classes` for both splits.
    pub fn ensure_classes(&self, num_classes: usize) -> Result<()> {
        self.training
            .ensure_classes(num_classes)
            .context("invalid training targets")?;
        self.validation
            .ensure_classes(num_classes)
            .context("invalid validation targets")?;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_sliced_per_sample() {
        let split = DataSplit::new(vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1], vec![3, 1, 4], 2).unwrap();
        assert_eq!(split.len(), 3);
        let s = split.get(1).unwrap();
        assert_eq!(s.features, &[1.0, 1.1]);
        assert_eq!(s.label, 1);
        assert!(split.get(3).is_none());
        assert_eq!(split.class_count(), 5);
    }

    #[test]
    fn test_labels_must_fit_class_count() {
        let split = DataSplit::new(vec![0.0; 3], vec![0, 7, 1], 1).unwrap();
        assert!(split.ensure_classes(8).is_ok());
        assert!(split.ensure_classes(2).is_err());

        let ok = DataSplit::new(vec![0.0; 2], vec![0, 1], 1).unwrap();
        assert!(DatasetSplits::new(ok.clone(), split.clone()).unwrap().ensure_classes(2).is_err());
        assert!(DatasetSplits::new(split, ok).unwrap().ensure_classes(10).is_ok());
    }

    #[test]
    fn test_rejects_mismatched_counts() {
        assert!(DataSplit::new(vec![0.0; 5], vec![0, 1], 3).is_err());
    }

    #[test]
    fn test_rejects_empty_split() {
        assert!(DataSplit::new(Vec::new(), Vec::new(), 4).is_err());
    }

    #[test]
    fn test_splits_must_agree_on_feature_size() {
        let a = DataSplit::new(vec![0.0; 4], vec![0, 1], 2).unwrap();
        let b = DataSplit::new(vec![0.0; 3], vec![0], 3).unwrap();
        assert!(DatasetSplits::new(a, b).is_err());
    }
}
