// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Runs the MNIST-pi experiment end to end:
//
//   Step 1: Seed the backend RNG        (Layer 5 - ml)
//   Step 2: Load both splits            (Layer 4 - data)
//   Step 3: Build minibatch iterators   (Layer 4 - data)
//   Step 4: Build the network           (Layer 5 - ml)
//   Step 5: Build the trainer + hooks   (Layer 5 - ml)
//   Step 6: Train and time it           (Layer 5 - ml)
//
// The report carries what the CLI prints: wall-clock time of
// the training call and the best validation accuracy.

use anyhow::{ensure, Result};
use burn::{prelude::*, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Instant};

use crate::data::{
    loader::{Hdf5Loader, DEFAULT_DATA_DIR},
    minibatches::Minibatches,
};
use crate::domain::{layer::describe_chain, traits::DatasetSource};
use crate::infra::{
    checkpoint::{CheckpointManager, DEFAULT_CHECKPOINT},
    metrics::{MetricsLogger, TrainingLog},
};
use crate::ml::{
    hooks::{Criterion, MonitorScores, ProgressBar, SaveBestNetwork, StopAfterEpoch, WriteMetrics},
    model::{NetworkConfig, OUTPUT_PROJECTION},
    modifiers::ConstrainL2Norm,
    scorers::Accuracy,
    trainer::{momentum_trainer, MomentumStepper},
    TrainBackend,
};

/// Name of the validation monitor; prefixes its log entries.
pub const VALIDATION: &str = "validation";

/// Log entry the save-best hook watches.
pub const VALIDATION_ACCURACY: &str = "validation.Accuracy";

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Directory holding MNIST.hdf5
    pub data_dir:       PathBuf,
    /// Best-network checkpoint; the config sidecar gets a `.json` extension
    pub output:         PathBuf,
    /// Training stops after this many full passes over the data
    pub epochs:         usize,
    /// Samples per minibatch, for training and validation alike
    pub batch_size:     usize,
    pub learning_rate:  f64,
    /// Velocity decay of the momentum stepper
    pub momentum:       f64,
    /// Norm limit for the incoming weights of every output unit
    pub max_col_norm:   f64,
    /// Seeds weight init, dropout masks and training-set shuffling
    pub seed:           u64,
    /// Whether a higher or lower `validation.Accuracy` counts as better
    pub save_criterion: Criterion,
    /// Optional per-epoch metrics CSV
    pub metrics_csv:    Option<PathBuf>,
    /// Layer sizes, dropout rates and init scale
    pub network:        NetworkConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       PathBuf::from(DEFAULT_DATA_DIR),
            output:         PathBuf::from(DEFAULT_CHECKPOINT),
            epochs:         20,
            batch_size:     100,
            learning_rate:  0.1,
            momentum:       0.9,
            max_col_norm:   1.0,
            seed:           42,
            save_criterion: Criterion::Max,
            metrics_csv:    None,
            network:        NetworkConfig::mnist_pi(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Wall-clock seconds spent inside the training loop
    pub elapsed_secs:  f64,
    /// Highest validation accuracy of the run; None when no epoch ran.
    pub best_accuracy: Option<f64>,
    /// Every value the trainer and hooks recorded
    pub log:           TrainingLog,
}

impl TrainReport {
    pub fn epochs(&self) -> usize {
        self.log.epochs()
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train on `<data_dir>/MNIST.hdf5` with the default backend.
    pub fn execute(&self) -> Result<TrainReport> {
        let source = Hdf5Loader::from_data_dir(&self.config.data_dir);
        tracing::info!("Reading data from '{}'", source.path().display());
        self.execute_with::<TrainBackend>(&source, Default::default())
    }

    pub fn execute_with<B: AutodiffBackend>(
        &self,
        source: &impl DatasetSource,
        device: B::Device,
    ) -> Result<TrainReport> {
        let cfg = &self.config;
        ensure!(cfg.batch_size > 0, "batch size must be positive");

        // ── Step 1: Seed ──────────────────────────────────────────────────────
        B::seed(cfg.seed);

        // ── Step 2: Load data ─────────────────────────────────────────────────
        let splits = source.load_splits()?;
        ensure!(
            splits.feature_size() == cfg.network.input_size,
            "data has {} features per sample, network expects {}",
            splits.feature_size(),
            cfg.network.input_size,
        );
        splits.ensure_classes(cfg.network.num_classes)?;
        tracing::info!(
            "Loaded {} training and {} validation samples",
            splits.training.len(),
            splits.validation.len()
        );

        // ── Step 3: Minibatch iterators ───────────────────────────────────────
        // Training data is reshuffled every epoch, validation keeps file order.
        let getter_tr = Minibatches::<B>::new(
            splits.training,
            cfg.batch_size,
            Some(cfg.seed),
            device.clone(),
        )?;
        let getter_va = Minibatches::<B::InnerBackend>::new(
            splits.validation,
            cfg.batch_size,
            None,
            device.clone(),
        )?;

        // ── Step 4: Network ───────────────────────────────────────────────────
        let network = cfg.network.init::<B>(&device)?;
        tracing::info!("Network: {}", describe_chain(&cfg.network.layer_specs()));

        // ── Step 5: Trainer ───────────────────────────────────────────────────
        let stepper = MomentumStepper::new(cfg.learning_rate, cfg.momentum);
        let mut trainer = momentum_trainer::<B>(&stepper);
        trainer.set_weight_modifier(OUTPUT_PROJECTION, ConstrainL2Norm::new(cfg.max_col_norm));

        trainer.add_hook(ProgressBar::new());
        trainer.add_hook(MonitorScores::<B>::new(
            VALIDATION,
            getter_va,
            vec![Box::new(Accuracy::new())],
        ));
        trainer.add_hook(SaveBestNetwork::new(
            "best weights",
            VALIDATION_ACCURACY,
            cfg.save_criterion,
            CheckpointManager::new(&cfg.output),
            cfg.network.clone(),
        ));
        if let Some(path) = &cfg.metrics_csv {
            trainer.add_hook(WriteMetrics::new(MetricsLogger::create(path)?));
        }
        trainer.add_hook(StopAfterEpoch::new(cfg.epochs));

        // ── Step 6: Train ─────────────────────────────────────────────────────
        let start = Instant::now();
        trainer.train(network, &getter_tr)?;
        let elapsed_secs = start.elapsed().as_secs_f64();

        let log = trainer.logs().clone();
        Ok(TrainReport {
            elapsed_secs,
            best_accuracy: log.max(VALIDATION_ACCURACY),
            log,
        })
    }
}
