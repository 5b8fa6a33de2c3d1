// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From the HDF5 file on disk to tensor batches:
//
//   MNIST.hdf5
//       │
//       ▼
//   Hdf5Loader        → reads normalized_split/{training,validation}
//       │
//       ▼
//   MnistDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   MnistBatcher      → stacks samples into tensor batches
//       │
//       ▼
//   Minibatches       → DataLoader + batch bookkeeping per split
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the pre-split MNIST file with the hdf5 crate
pub mod loader;

/// Implements Burn's Dataset trait over a DataSplit
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Fixed-size batch iterator used by the trainer and monitors
pub mod minibatches;
