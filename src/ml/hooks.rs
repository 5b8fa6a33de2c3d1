// ============================================================
// Layer 5 — Training Hooks
// ============================================================
// Observers the trainer calls at fixed points of the loop.
// Hooks run in the order they were added, so a monitor that
// writes `validation.Accuracy` must come before the hook that
// reads it:
//
//   ProgressBar      → per-epoch progress display
//   MonitorScores    → validation loss + scorers into the log
//   SaveBestNetwork  → checkpoint when a logged value improves
//   WriteMetrics     → mirror the log into a CSV file
//   StopAfterEpoch   → ends training after a fixed epoch count
//
// Any hook may return Signal::Stop; the trainer finishes the
// current round of hooks and then stops.

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::{ProgressDrawTarget, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::data::minibatches::Minibatches;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{MetricsLogger, TrainingLog},
};
use crate::ml::model::{MnistPiNetwork, NetworkConfig};
use crate::ml::scorers::Scorer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    Stop,
}

pub trait Hook<B: AutodiffBackend> {
    fn name(&self) -> &str;

    fn on_train_start(&mut self, _network: &MnistPiNetwork<B>, _log: &mut TrainingLog) -> Result<Signal> {
        Ok(Signal::Continue)
    }

    fn on_epoch_start(&mut self, _epoch: usize, _num_batches: usize) -> Result<()> {
        Ok(())
    }

    fn on_batch_end(&mut self, _epoch: usize, _batch: usize, _loss: f64) -> Result<()> {
        Ok(())
    }

    fn on_epoch_end(
        &mut self,
        epoch:   usize,
        network: &MnistPiNetwork<B>,
        log:     &mut TrainingLog,
    ) -> Result<Signal>;

    fn on_train_end(&mut self, _log: &TrainingLog) -> Result<()> {
        Ok(())
    }
}

// ─── ProgressBar ──────────────────────────────────────────────────────────────
/// One indicatif bar per epoch on standard output, advanced after every
/// minibatch.
pub struct ProgressBar {
    /// Bar for the running epoch; None between epochs
    bar:         Option<indicatif::ProgressBar>,
    /// Where each new bar draws
    draw_target: fn() -> ProgressDrawTarget,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stdout)
    }
}

impl ProgressBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_draw_target(draw_target: fn() -> ProgressDrawTarget) -> Self {
        Self { bar: None, draw_target }
    }
}

impl<B: AutodiffBackend> Hook<B> for ProgressBar {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_epoch_start(&mut self, epoch: usize, num_batches: usize) -> Result<()> {
        let bar = indicatif::ProgressBar::with_draw_target(
            Some(num_batches as u64),
            (self.draw_target)(),
        );
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40.cyan/blue}] {pos}/{len} batches ({elapsed}, eta {eta})",
            )?
            .progress_chars("=> "),
        );
        bar.set_message(format!("Epoch {epoch:>3}"));
        self.bar = Some(bar);
        Ok(())
    }

    fn on_batch_end(&mut self, epoch: usize, _batch: usize, loss: f64) -> Result<()> {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("Epoch {epoch:>3} loss={loss:.4}"));
            bar.inc(1);
        }
        Ok(())
    }

    fn on_epoch_end(&mut self, _epoch: usize, _network: &MnistPiNetwork<B>, _log: &mut TrainingLog) -> Result<Signal> {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
        Ok(Signal::Continue)
    }
}

// ─── MonitorScores ────────────────────────────────────────────────────────────
/// Evaluates the network on a held-out iterator after every epoch.
///
/// Records `<name>.total_loss` and `<name>.<scorer>` for each scorer.
/// Evaluation runs on the inner backend, so dropout is disabled.
pub struct MonitorScores<B: AutodiffBackend> {
    name:    String,
    getter:  Minibatches<B::InnerBackend>,
    scorers: Vec<Box<dyn Scorer<B::InnerBackend>>>,
}

impl<B: AutodiffBackend> MonitorScores<B> {
    pub fn new(
        name:    impl Into<String>,
        getter:  Minibatches<B::InnerBackend>,
        scorers: Vec<Box<dyn Scorer<B::InnerBackend>>>,
    ) -> Self {
        Self { name: name.into(), getter, scorers }
    }
}

/// Mean loss and scorer values of `network` over every batch of `getter`.
pub fn evaluate<B: Backend>(
    network: &MnistPiNetwork<B>,
    getter:  &Minibatches<B>,
    scorers: &mut [Box<dyn Scorer<B>>],
) -> f64 {
    scorers.iter_mut().for_each(|s| s.reset());

    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;
    for batch in getter.iter() {
        let logits = network.forward(batch.features);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), batch.targets.clone());
        loss_sum += loss.into_scalar().elem::<f64>();
        batches  += 1;

        for scorer in scorers.iter_mut() {
            scorer.update(logits.clone(), batch.targets.clone());
        }
    }

    if batches > 0 { loss_sum / batches as f64 } else { f64::NAN }
}

impl<B: AutodiffBackend> Hook<B> for MonitorScores<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_epoch_end(&mut self, epoch: usize, network: &MnistPiNetwork<B>, log: &mut TrainingLog) -> Result<Signal> {
        let network = network.valid();
        let loss = evaluate(&network, &self.getter, &mut self.scorers);

        log.record(format!("{}.total_loss", self.name), loss);
        let mut summary = format!("{}.total_loss={loss:.4}", self.name);
        for scorer in &self.scorers {
            let value = scorer.value();
            log.record(format!("{}.{}", self.name, scorer.name()), value);
            summary.push_str(&format!(" {}.{}={value:.4}", self.name, scorer.name()));
        }

        tracing::info!("Epoch {epoch}: {summary}");
        Ok(Signal::Continue)
    }
}

// ─── SaveBestNetwork ──────────────────────────────────────────────────────────
/// Direction in which a logged value counts as better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Max,
    Min,
}

impl Criterion {
    /// Strict improvement; NaN never improves.
    pub fn improves(&self, candidate: f64, best: Option<f64>) -> bool {
        if candidate.is_nan() {
            return false;
        }
        match (self, best) {
            (_, None) => true,
            (Criterion::Max, Some(best)) => candidate > best,
            (Criterion::Min, Some(best)) => candidate < best,
        }
    }
}

/// Writes the network to its checkpoint whenever the last value of
/// `log_name` beats every earlier one.
pub struct SaveBestNetwork {
    name:       String,
    /// Log key compared across epochs, e.g. `validation.Accuracy`
    log_name:   String,
    criterion:  Criterion,
    checkpoint: CheckpointManager,
    /// Written beside the parameters so the network can be rebuilt
    config:     NetworkConfig,
    /// Best value seen so far; None until the first epoch ends
    best:       Option<f64>,
}

impl SaveBestNetwork {
    pub fn new(
        name:       impl Into<String>,
        log_name:   impl Into<String>,
        criterion:  Criterion,
        checkpoint: CheckpointManager,
        config:     NetworkConfig,
    ) -> Self {
        Self {
            name: name.into(),
            log_name: log_name.into(),
            criterion,
            checkpoint,
            config,
            best: None,
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

impl<B: AutodiffBackend> Hook<B> for SaveBestNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_epoch_end(&mut self, epoch: usize, network: &MnistPiNetwork<B>, log: &mut TrainingLog) -> Result<Signal> {
        let value = log
            .last(&self.log_name)
            .with_context(|| format!("'{}' needs '{}' in the log", self.name, self.log_name))?;

        if self.criterion.improves(value, self.best) {
            self.best = Some(value);
            self.checkpoint.save_network(network, &self.config)?;
            tracing::info!(
                "Epoch {epoch}: {}={value:.4} improved, saved {} to '{}'",
                self.log_name,
                self.name,
                self.checkpoint.path().display(),
            );
        }
        Ok(Signal::Continue)
    }

    fn on_train_end(&mut self, _log: &TrainingLog) -> Result<()> {
        match self.best() {
            Some(best) => tracing::info!(
                "Best {}={best:.4}, kept in '{}'",
                self.log_name,
                self.checkpoint.path().display(),
            ),
            None => tracing::warn!("No epoch finished; '{}' was not written", self.checkpoint.path().display()),
        }
        Ok(())
    }
}

// ─── WriteMetrics ─────────────────────────────────────────────────────────────
/// Appends the latest log values to a CSV file after every epoch.
pub struct WriteMetrics {
    logger: MetricsLogger,
}

impl WriteMetrics {
    pub fn new(logger: MetricsLogger) -> Self {
        Self { logger }
    }
}

impl<B: AutodiffBackend> Hook<B> for WriteMetrics {
    fn name(&self) -> &str {
        "metrics"
    }

    fn on_epoch_end(&mut self, epoch: usize, _network: &MnistPiNetwork<B>, log: &mut TrainingLog) -> Result<Signal> {
        self.logger.log(epoch, log)?;
        Ok(Signal::Continue)
    }

    fn on_train_end(&mut self, log: &TrainingLog) -> Result<()> {
        tracing::info!(
            "Wrote {} epochs of metrics to '{}'",
            log.epochs(),
            self.logger.csv_path().display()
        );
        Ok(())
    }
}

// ─── StopAfterEpoch ───────────────────────────────────────────────────────────
pub struct StopAfterEpoch {
    max_epochs: usize,
}

impl StopAfterEpoch {
    pub fn new(max_epochs: usize) -> Self {
        Self { max_epochs }
    }
}

impl<B: AutodiffBackend> Hook<B> for StopAfterEpoch {
    fn name(&self) -> &str {
        "stop"
    }

    fn on_train_start(&mut self, _network: &MnistPiNetwork<B>, _log: &mut TrainingLog) -> Result<Signal> {
        Ok(if self.max_epochs == 0 { Signal::Stop } else { Signal::Continue })
    }

    fn on_epoch_end(&mut self, epoch: usize, _network: &MnistPiNetwork<B>, _log: &mut TrainingLog) -> Result<Signal> {
        if epoch >= self.max_epochs {
            tracing::info!("Stopping after epoch {epoch}");
            Ok(Signal::Stop)
        } else {
            Ok(Signal::Continue)
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn tiny_network() -> (MnistPiNetwork<TestBackend>, NetworkConfig) {
        let config = NetworkConfig::new(4, vec![3], vec![0.0, 0.0], 2);
        (config.init(&Default::default()).unwrap(), config)
    }

    #[test]
    fn test_criterion() {
        assert!(Criterion::Max.improves(0.1, None));
        assert!(Criterion::Max.improves(0.6, Some(0.5)));
        assert!(!Criterion::Max.improves(0.5, Some(0.5)));
        assert!(Criterion::Min.improves(0.4, Some(0.5)));
        assert!(!Criterion::Max.improves(f64::NAN, None));
    }

    #[test]
    fn test_progress_bar_tracks_batches() {
        let (network, _) = tiny_network();
        let mut progress = ProgressBar::with_draw_target(ProgressDrawTarget::hidden);

        Hook::<TestBackend>::on_epoch_start(&mut progress, 1, 3).unwrap();
        for batch in 1..=2 {
            Hook::<TestBackend>::on_batch_end(&mut progress, 1, batch, 0.5).unwrap();
        }
        let bar = progress.bar.clone().unwrap();
        assert_eq!(bar.length(), Some(3));
        assert_eq!(bar.position(), 2);

        let signal = Hook::<TestBackend>::on_epoch_end(&mut progress, 1, &network, &mut TrainingLog::new()).unwrap();
        assert_eq!(signal, Signal::Continue);
        assert!(bar.is_finished());
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_criterion_parses_lowercase() {
        assert_eq!(serde_json::from_str::<Criterion>("\"max\"").unwrap(), Criterion::Max);
        assert_eq!(serde_json::from_str::<Criterion>("\"min\"").unwrap(), Criterion::Min);
    }

    #[test]
    fn test_stop_after_epoch() {
        let (network, _) = tiny_network();
        let mut log  = TrainingLog::new();
        let mut stop = StopAfterEpoch::new(2);
        let hook: &mut dyn Hook<TestBackend> = &mut stop;

        assert_eq!(hook.on_train_start(&network, &mut log).unwrap(), Signal::Continue);
        assert_eq!(hook.on_epoch_end(1, &network, &mut log).unwrap(), Signal::Continue);
        assert_eq!(hook.on_epoch_end(2, &network, &mut log).unwrap(), Signal::Stop);
    }

    #[test]
    fn test_stop_after_zero_epochs() {
        let (network, _) = tiny_network();
        let mut stop = StopAfterEpoch::new(0);
        let hook: &mut dyn Hook<TestBackend> = &mut stop;
        assert_eq!(hook.on_train_start(&network, &mut TrainingLog::new()).unwrap(), Signal::Stop);
    }

    #[test]
    fn test_checkpoint_written_only_on_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = CheckpointManager::new(dir.path().join("best.hdf5"));
        let (network, config) = tiny_network();

        let mut save = SaveBestNetwork::new(
            "best weights",
            "validation.Accuracy",
            Criterion::Max,
            checkpoint.clone(),
            config,
        );
        let mut log = TrainingLog::new();

        for (epoch, accuracy, expect_write) in [
            (1, 0.50, true),
            (2, 0.40, false),
            (3, 0.50, false),
            (4, 0.70, true),
        ] {
            if checkpoint.path().exists() {
                std::fs::remove_file(checkpoint.path()).unwrap();
            }
            log.record("validation.Accuracy", accuracy);
            Hook::<TestBackend>::on_epoch_end(&mut save, epoch, &network, &mut log).unwrap();
            assert_eq!(checkpoint.path().exists(), expect_write, "epoch {epoch}");
        }
        assert_eq!(save.best(), Some(0.70));
    }

    #[test]
    fn test_save_best_requires_logged_value() {
        let dir = tempfile::tempdir().unwrap();
        let (network, config) = tiny_network();
        let mut save = SaveBestNetwork::new(
            "best weights",
            "validation.Accuracy",
            Criterion::Max,
            CheckpointManager::new(dir.path().join("best.hdf5")),
            config,
        );
        let result = Hook::<TestBackend>::on_epoch_end(&mut save, 1, &network, &mut TrainingLog::new());
        assert!(result.is_err());
    }
}
