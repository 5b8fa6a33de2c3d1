// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches burn tensors or modules:
//
//   model.rs     — the MNIST-pi network
//                  Dropout(0.2) → Hid1 (1200, ReLU)
//                  Dropout(0.5) → Hid2 (1200, ReLU)
//                  Dropout(0.5) → FC (10) + softmax cross-entropy
//
//   trainer.rs   — hook-driven epoch loop with momentum SGD
//
//   hooks.rs     — progress bar, validation monitor, save-best
//                  checkpointing, CSV metrics, stop after N epochs
//
//   scorers.rs   — metrics accumulated over an evaluation pass
//
//   modifiers.rs — per-unit L2-norm constraint on layer weights
//
// The training backend is Autodiff over NdArray by default, or
// over Wgpu with the `wgpu` feature.

/// Network configuration, layers and parameter access
pub mod model;

/// Epoch loop and momentum stepper
pub mod trainer;

/// Observers called by the trainer
pub mod hooks;

/// Evaluation metrics
pub mod scorers;

/// Post-update weight constraints
pub mod modifiers;

#[cfg(not(feature = "wgpu"))]
pub type InnerBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InnerBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<InnerBackend>;
