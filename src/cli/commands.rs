// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Flag defaults are the experiment's constants, so
// `mnist-pi train` and plain `mnist-pi` run the same thing.
//
// Data directory precedence:
//   --data-dir  >  $BRAINSTORM_DATA_DIR  >  ./data

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{
    evaluate_use_case::EvaluateConfig,
    train_use_case::TrainConfig,
};
use crate::data::loader::data_dir_from_env;
use crate::infra::checkpoint::DEFAULT_CHECKPOINT;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the network and save the best checkpoint
    Train(TrainArgs),

    /// Score a saved checkpoint on the validation split
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory containing MNIST.hdf5
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Where the best network is written
    #[arg(long, default_value = DEFAULT_CHECKPOINT)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 0.1)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    /// Seeds weight initialisation, dropout and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Also write per-epoch metrics to this CSV file
    #[arg(long)]
    pub metrics_csv: Option<PathBuf>,
}

impl Default for TrainArgs {
    fn default() -> Self {
        let cfg = TrainConfig::default();
        Self {
            data_dir:      None,
            output:        cfg.output,
            epochs:        cfg.epochs,
            batch_size:    cfg.batch_size,
            learning_rate: cfg.learning_rate,
            momentum:      cfg.momentum,
            seed:          cfg.seed,
            metrics_csv:   None,
        }
    }
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:      data_dir_from_env(a.data_dir),
            output:        a.output,
            epochs:        a.epochs,
            batch_size:    a.batch_size,
            learning_rate: a.learning_rate,
            momentum:      a.momentum,
            seed:          a.seed,
            metrics_csv:   a.metrics_csv,
            ..TrainConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory containing MNIST.hdf5
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Checkpoint written by `train`
    #[arg(long, default_value = DEFAULT_CHECKPOINT)]
    pub checkpoint: PathBuf,

    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            data_dir:   data_dir_from_env(a.data_dir),
            checkpoint: a.checkpoint,
            batch_size: a.batch_size,
        }
    }
}
