// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File formats the training run writes:
//
//   checkpoint.rs — best network as HDF5 parameters plus a JSON
//                   copy of its NetworkConfig, so `evaluate` can
//                   rebuild the architecture before loading
//
//   metrics.rs    — the per-epoch TrainingLog hooks read and
//                   write, and an optional CSV mirror of it

/// Best-network checkpoint saving and loading
pub mod checkpoint;

/// Training log and metrics CSV writer
pub mod metrics;
