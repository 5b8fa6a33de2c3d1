// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Reloads the best checkpoint written during training and
// scores it on the validation split:
//
//   Step 1: Rebuild the network from the checkpoint  (Layer 6)
//   Step 2: Load the validation split                (Layer 4)
//   Step 3: Mean loss + accuracy over all batches    (Layer 5)

use anyhow::{ensure, Result};
use burn::prelude::*;
use std::path::PathBuf;

use crate::data::{
    loader::{Hdf5Loader, DEFAULT_DATA_DIR},
    minibatches::Minibatches,
};
use crate::domain::traits::DatasetSource;
use crate::infra::checkpoint::{CheckpointManager, DEFAULT_CHECKPOINT};
use crate::ml::{
    hooks::evaluate,
    model::NetworkConfig,
    scorers::{Accuracy, Scorer},
    InnerBackend,
};

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    /// Directory holding MNIST.hdf5; only the validation split is scored
    pub data_dir:   PathBuf,
    /// HDF5 checkpoint with its `.json` network config beside it
    pub checkpoint: PathBuf,
    pub batch_size: usize,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        Self {
            data_dir:   PathBuf::from(DEFAULT_DATA_DIR),
            checkpoint: PathBuf::from(DEFAULT_CHECKPOINT),
            batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub samples:  usize,
    pub loss:     f64,
    pub accuracy: f64,
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        let source = Hdf5Loader::from_data_dir(&self.config.data_dir);
        self.execute_with::<InnerBackend>(&source, Default::default())
    }

    pub fn execute_with<B: Backend>(
        &self,
        source: &impl DatasetSource,
        device: B::Device,
    ) -> Result<EvaluationReport> {
        let cfg = &self.config;

        // ── Step 1: Network ───────────────────────────────────────────────────
        let checkpoint = CheckpointManager::new(&cfg.checkpoint);
        let network = checkpoint.load_network::<B>(&device)?;
        let NetworkConfig { input_size, num_classes, .. } = checkpoint.load_config()?;

        // ── Step 2: Validation data ───────────────────────────────────────────
        let validation = source.load_splits()?.validation;
        ensure!(
            validation.feature_size() == input_size,
            "data has {} features per sample, checkpoint expects {}",
            validation.feature_size(),
            input_size,
        );
        validation.ensure_classes(num_classes)?;
        let getter = Minibatches::<B>::new(validation, cfg.batch_size, None, device)?;
        let samples = getter.num_samples();

        // ── Step 3: Score ─────────────────────────────────────────────────────
        let mut scorers: Vec<Box<dyn Scorer<B>>> = vec![Box::new(Accuracy::new())];
        let loss = evaluate(&network, &getter, &mut scorers);
        let accuracy = scorers[0].value();

        tracing::info!("Evaluated {samples} samples: loss={loss:.4} accuracy={accuracy:.4}");
        Ok(EvaluationReport { samples, loss, accuracy })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        split::{DataSplit, DatasetSplits},
        traits::InMemorySource,
    };
    use burn::backend::NdArray;

    fn source(feature_size: usize) -> InMemorySource {
        let split = |n: usize| {
            let features = (0..n * feature_size).map(|i| (i % 5) as f32 / 5.0).collect();
            let labels = (0..n as u32).map(|i| i % 3).collect();
            DataSplit::new(features, labels, feature_size).unwrap()
        };
        InMemorySource::new(DatasetSplits::new(split(4), split(7)).unwrap())
    }

    fn saved_checkpoint(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("best.hdf5");
        let config = NetworkConfig::new(6, vec![5], vec![0.2, 0.5], 3);
        let network = config.init::<NdArray>(&Default::default()).unwrap();
        CheckpointManager::new(&path).save_network(&network, &config).unwrap();
        path
    }

    #[test]
    fn test_evaluate_saved_network() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = EvaluateUseCase::new(EvaluateConfig {
            checkpoint: saved_checkpoint(dir.path()),
            batch_size: 3,
            ..EvaluateConfig::default()
        });

        let report = use_case
            .execute_with::<NdArray>(&source(6), Default::default())
            .unwrap();
        assert_eq!(report.samples, 7);
        assert!((0.0..=1.0).contains(&report.accuracy));
        assert!(report.loss.is_finite());

        // evaluation is deterministic
        let again = use_case
            .execute_with::<NdArray>(&source(6), Default::default())
            .unwrap();
        assert_eq!(report, again);
    }

    #[test]
    fn test_label_outside_checkpoint_classes_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = EvaluateUseCase::new(EvaluateConfig {
            checkpoint: saved_checkpoint(dir.path()),
            ..EvaluateConfig::default()
        });
        let ok  = DataSplit::new(vec![0.0; 6], vec![0], 6).unwrap();
        let bad = DataSplit::new(vec![0.0; 12], vec![1, 7], 6).unwrap();
        let source = InMemorySource::new(DatasetSplits::new(ok, bad).unwrap());

        assert!(use_case.execute_with::<NdArray>(&source, Default::default()).is_err());
    }

    #[test]
    fn test_feature_size_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = EvaluateUseCase::new(EvaluateConfig {
            checkpoint: saved_checkpoint(dir.path()),
            ..EvaluateConfig::default()
        });
        assert!(use_case
            .execute_with::<NdArray>(&source(4), Default::default())
            .is_err());
    }
}
