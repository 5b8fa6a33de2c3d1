// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types shared by every other layer:
//
//   split.rs  — training/validation feature matrices and labels
//   layer.rs  — framework-free description of the layer chain
//   traits.rs — DatasetSource, the seam between loading and use
//
// No burn types and no file I/O in this layer.

pub mod layer;

pub mod split;

pub mod traits;
