// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: each use case wires data
// loading, the network and the trainer together and returns
// a report. Printing belongs to Layer 1.

/// Train the network and keep the best checkpoint
pub mod train_use_case;

/// Score a saved checkpoint on the validation split
pub mod evaluate_use_case;
