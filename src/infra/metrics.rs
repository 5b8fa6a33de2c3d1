// ============================================================
// Layer 6 — Training Log and Metrics CSV
// ============================================================
// TrainingLog is the trainer's record of per-epoch values,
// keyed "<source>.<metric>":
//
//   training.total_loss     mean minibatch loss (trainer)
//   validation.total_loss   mean validation loss (monitor)
//   validation.Accuracy     validation accuracy  (monitor)
//
// MetricsLogger mirrors the log into a CSV file, one row per
// epoch, so learning curves can be plotted after the run:
//
//   epoch,training.total_loss,validation.Accuracy,validation.total_loss
//   1,0.412300,0.951200,0.171100
//   2,0.218800,0.964400,0.126900

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

pub const TRAINING_LOSS: &str = "training.total_loss";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingLog {
    entries: BTreeMap<String, Vec<f64>>,
}

impl TrainingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: impl Into<String>, value: f64) {
        self.entries.entry(key.into()).or_default().push(value);
    }

    /// All values recorded under `key`, oldest first.
    pub fn series(&self, key: &str) -> &[f64] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn last(&self, key: &str) -> Option<f64> {
        self.series(key).last().copied()
    }

    /// Largest value under `key`; NaNs are skipped.
    pub fn max(&self, key: &str) -> Option<f64> {
        self.series(key)
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::max)
    }

    /// Running maximum of `key`: entry i is the best value up to epoch i + 1.
    pub fn running_max(&self, key: &str) -> Vec<f64> {
        let mut best = f64::NEG_INFINITY;
        self.series(key)
            .iter()
            .map(|&v| {
                if v > best {
                    best = v;
                }
                best
            })
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of completed training epochs.
    pub fn epochs(&self) -> usize {
        self.series(TRAINING_LOSS).len()
    }
}

/// Writes one CSV row per epoch. The header is fixed by the keys
/// present when the first row is written.
pub struct MetricsLogger {
    csv_path: PathBuf,
    columns:  Option<Vec<String>>,
}

impl MetricsLogger {
    /// Create (or truncate) the CSV file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = path.into();
        if let Some(dir) = csv_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        File::create(&csv_path)
            .with_context(|| format!("Cannot create metrics file '{}'", csv_path.display()))?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        Ok(Self { csv_path, columns: None })
    }

    /// Append the latest value of every column for `epoch`.
    pub fn log(&mut self, epoch: usize, log: &TrainingLog) -> Result<()> {
        let mut f = fs::OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        if self.columns.is_none() {
            let columns: Vec<String> = log.keys().map(str::to_string).collect();
            writeln!(f, "epoch,{}", columns.join(","))?;
            self.columns = Some(columns);
        }
        let columns = self.columns.as_deref().unwrap_or_default();

        let row: Vec<String> = columns
            .iter()
            .map(|key| log.last(key).map_or_else(String::new, |v| format!("{v:.6}")))
            .collect();
        writeln!(f, "{},{}", epoch, row.join(","))?;

        tracing::debug!("Logged epoch {} metrics to '{}'", epoch, self.csv_path.display());
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
