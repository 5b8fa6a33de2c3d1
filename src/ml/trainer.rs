// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop over a shuffled minibatch iterator, driven by
// hooks. One epoch:
//
//   hooks.on_epoch_start
//   for batch in training data:
//       loss = cross_entropy(net(batch))        (Autodiff backend)
//       net  = stepper.step(net, grad(loss))
//       net  = modifiers applied to named layers
//       hooks.on_batch_end
//   log["training.total_loss"] ← mean minibatch loss
//   hooks.on_epoch_end                          (every hook runs)
//   stop if any hook returned Signal::Stop
//
// Without a hook that stops it, the loop does not end.
//
// Momentum step (dampening 0, no Nesterov):
//   v = μ·v + g
//   θ = θ - lr·v

use anyhow::Result;
use burn::{
    optim::{momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::minibatches::Minibatches;
use crate::infra::metrics::{TrainingLog, TRAINING_LOSS};
use crate::ml::hooks::{Hook, Signal};
use crate::ml::model::MnistPiNetwork;
use crate::ml::modifiers::ConstrainL2Norm;

/// Classic momentum SGD with a fixed learning rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumStepper {
    pub learning_rate: f64,
    pub momentum:      f64,
}

impl Default for MomentumStepper {
    fn default() -> Self {
        Self { learning_rate: 0.1, momentum: 0.9 }
    }
}

impl MomentumStepper {
    pub fn new(learning_rate: f64, momentum: f64) -> Self {
        Self { learning_rate, momentum }
    }

    pub fn init<B: AutodiffBackend>(&self) -> impl Optimizer<MnistPiNetwork<B>, B> {
        SgdConfig::new()
            .with_momentum(Some(
                MomentumConfig::new()
                    .with_momentum(self.momentum)
                    .with_dampening(0.0)
                    .with_nesterov(false),
            ))
            .init::<B, MnistPiNetwork<B>>()
    }
}

pub struct Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<MnistPiNetwork<B>, B>,
{
    optimizer:     O,
    learning_rate: f64,
    modifiers:     Vec<(String, ConstrainL2Norm)>,
    hooks:         Vec<Box<dyn Hook<B>>>,
    log:           TrainingLog,
}

/// Trainer stepping with momentum SGD.
pub fn momentum_trainer<B: AutodiffBackend>(
    stepper: &MomentumStepper,
) -> Trainer<B, impl Optimizer<MnistPiNetwork<B>, B>> {
    Trainer::new(stepper.init::<B>(), stepper.learning_rate)
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<MnistPiNetwork<B>, B>,
{
    pub fn new(optimizer: O, learning_rate: f64) -> Self {
        Self {
            optimizer,
            learning_rate,
            modifiers: Vec::new(),
            hooks: Vec::new(),
            log: TrainingLog::new(),
        }
    }

    /// Hooks run in the order they are added.
    pub fn add_hook(&mut self, hook: impl Hook<B> + 'static) {
        tracing::debug!("Added hook '{}'", hook.name());
        self.hooks.push(Box::new(hook));
    }

    /// Constrain the weights of `layer` after every parameter update.
    pub fn set_weight_modifier(&mut self, layer: impl Into<String>, modifier: ConstrainL2Norm) {
        let layer = layer.into();
        tracing::debug!("Constraining '{layer}' to column norm <= {}", modifier.limit());
        self.modifiers.retain(|(name, _)| *name != layer);
        self.modifiers.push((layer, modifier));
    }

    pub fn logs(&self) -> &TrainingLog {
        &self.log
    }

    pub fn train(
        &mut self,
        mut network: MnistPiNetwork<B>,
        training:    &Minibatches<B>,
    ) -> Result<MnistPiNetwork<B>> {
        // ── Step 1: validate modifiers against the network ────────────────────
        for (layer, modifier) in &self.modifiers {
            network = network.constrain_layer(layer, modifier)?;
        }

        // ── Step 2: start hooks ───────────────────────────────────────────────
        let mut stop = false;
        for hook in self.hooks.iter_mut() {
            if hook.on_train_start(&network, &mut self.log)? == Signal::Stop {
                tracing::info!("Hook '{}' stopped training before the first epoch", hook.name());
                stop = true;
            }
        }

        // ── Step 3: epoch loop ────────────────────────────────────────────────
        let mut epoch = 0usize;
        while !stop {
            epoch += 1;
            let num_batches = training.num_batches();
            for hook in self.hooks.iter_mut() {
                hook.on_epoch_start(epoch, num_batches)?;
            }

            let mut loss_sum = 0.0f64;
            let mut batches  = 0usize;
            for batch in training.iter() {
                let (loss, _) = network.forward_classification(batch.features, batch.targets);
                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

                let grads = GradientsParams::from_grads(loss.backward(), &network);
                network = self.optimizer.step(self.learning_rate, network, grads);
                for (layer, modifier) in &self.modifiers {
                    network = network.constrain_layer(layer, modifier)?;
                }

                loss_sum += loss_val;
                batches  += 1;
                for hook in self.hooks.iter_mut() {
                    hook.on_batch_end(epoch, batches, loss_val)?;
                }
            }

            let mean_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
            self.log.record(TRAINING_LOSS, mean_loss);
            tracing::info!("Epoch {epoch}: {TRAINING_LOSS}={mean_loss:.4}");

            for hook in self.hooks.iter_mut() {
                if hook.on_epoch_end(epoch, &network, &mut self.log)? == Signal::Stop {
                    tracing::debug!("Hook '{}' requested stop after epoch {epoch}", hook.name());
                    stop = true;
                }
            }
        }

        for hook in self.hooks.iter_mut() {
            hook.on_train_end(&self.log)?;
        }
        tracing::info!("Training finished after {} epochs", self.log.epochs());
        Ok(network)
    }
}
