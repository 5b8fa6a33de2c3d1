// ============================================================
// Layer 4 — HDF5 Dataset Loader
// ============================================================
// Reads the pre-split MNIST file produced for this project:
//
//   <data_dir>/MNIST.hdf5
//     └── normalized_split
//           ├── training
//           │     ├── default   (features, float)
//           │     └── targets   (labels, integer)
//           └── validation
//                 ├── default
//                 └── targets
//
// Datasets are stored time-major, e.g. features as
// [1, samples, 28, 28, 1] and targets as [1, samples, 1].
// Only the element counts matter here: the sample count comes
// from the targets and the remaining feature elements are
// split evenly across samples.

use anyhow::{ensure, Context, Result};
use std::path::{Path, PathBuf};

use crate::domain::split::{DataSplit, DatasetSplits};
use crate::domain::traits::DatasetSource;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "BRAINSTORM_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DATA_FILE_NAME: &str = "MNIST.hdf5";

const SPLIT_GROUP: &str = "normalized_split";
const FEATURES_DATASET: &str = "default";
const TARGETS_DATASET: &str = "targets";

/// Pick the data directory: explicit flag, then the environment, then `data`.
pub fn resolve_data_dir(flag: Option<PathBuf>, env_value: Option<String>) -> PathBuf {
    flag.or_else(|| env_value.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// `resolve_data_dir` against the live process environment.
pub fn data_dir_from_env(flag: Option<PathBuf>) -> PathBuf {
    resolve_data_dir(flag, std::env::var(DATA_DIR_ENV).ok())
}

/// Loads the training and validation splits from an HDF5 file.
/// Implements the DatasetSource trait from Layer 3.
pub struct Hdf5Loader {
    path: PathBuf,
}

impl Hdf5Loader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Point the loader at `<dir>/MNIST.hdf5`.
    pub fn from_data_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DATA_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSource for Hdf5Loader {
    fn load_splits(&self) -> Result<DatasetSplits> {
        let file = hdf5::File::open(&self.path)
            .with_context(|| format!("Cannot open data file '{}'", self.path.display()))?;
        let root = file
            .group(SPLIT_GROUP)
            .with_context(|| format!("'{}' has no '{SPLIT_GROUP}' group", self.path.display()))?;

        let training   = read_split(&root, "training")?;
        let validation = read_split(&root, "validation")?;

        tracing::info!(
            "Loaded '{}': {} training, {} validation samples of {} features",
            self.path.display(),
            training.len(),
            validation.len(),
            training.feature_size(),
        );

        DatasetSplits::new(training, validation)
    }
}

fn read_split(root: &hdf5::Group, name: &str) -> Result<DataSplit> {
    let group = root
        .group(name)
        .with_context(|| format!("Missing '{SPLIT_GROUP}/{name}' group"))?;

    let features_ds = group
        .dataset(FEATURES_DATASET)
        .with_context(|| format!("Missing '{name}/{FEATURES_DATASET}' dataset"))?;
    let targets_ds = group
        .dataset(TARGETS_DATASET)
        .with_context(|| format!("Missing '{name}/{TARGETS_DATASET}' dataset"))?;

    tracing::debug!(
        "{name}: features {:?}, targets {:?}",
        features_ds.shape(),
        targets_ds.shape()
    );

    let features: Vec<f32> = features_ds
        .read_raw()
        .with_context(|| format!("Cannot read '{name}/{FEATURES_DATASET}' as float"))?;
    let targets: Vec<i64> = targets_ds
        .read_raw()
        .with_context(|| format!("Cannot read '{name}/{TARGETS_DATASET}' as integer"))?;

    let samples = targets.len();
    ensure!(samples > 0, "'{name}' split has no targets");
    ensure!(
        features.len() % samples == 0,
        "'{name}' has {} feature values, not a multiple of {} samples",
        features.len(),
        samples,
    );

    let labels = targets
        .into_iter()
        .map(|t| u32::try_from(t).with_context(|| format!("'{name}' has invalid label {t}")))
        .collect::<Result<Vec<u32>>>()?;

    let feature_size = features.len() / samples;
    DataSplit::new(features, labels, feature_size)
        .with_context(|| format!("Malformed '{name}' split"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Write a miniature MNIST.hdf5 with the real group layout.
    fn write_mnist_file(dir: &Path, train: usize, valid: usize) -> PathBuf {
        let path = dir.join(DATA_FILE_NAME);
        let file = hdf5::File::create(&path).unwrap();
        let root = file.create_group(SPLIT_GROUP).unwrap();

        for (name, n) in [("training", train), ("validation", valid)] {
            let group = root.create_group(name).unwrap();
            let features: Vec<f32> = (0..n * 784).map(|i| (i % 255) as f32 / 255.0).collect();
            let labels: Vec<u8> = (0..n).map(|i| (i % 10) as u8).collect();
            group
                .new_dataset::<f32>()
                .shape((1, n, 784))
                .create(FEATURES_DATASET)
                .unwrap()
                .write_raw(features.as_slice())
                .unwrap();
            group
                .new_dataset::<u8>()
                .shape((1, n, 1))
                .create(TARGETS_DATASET)
                .unwrap()
                .write_raw(labels.as_slice())
                .unwrap();
        }
        path
    }

    #[test]
    fn test_loads_both_splits() {
        let dir = tempfile::tempdir().unwrap();
        write_mnist_file(dir.path(), 12, 5);

        let splits = Hdf5Loader::from_data_dir(dir.path()).load_splits().unwrap();
        assert_eq!(splits.training.len(), 12);
        assert_eq!(splits.validation.len(), 5);
        assert_eq!(splits.feature_size(), 784);
        let first: Vec<u32> = (0..3).map(|i| splits.training.get(i).unwrap().label).collect();
        assert_eq!(first, [0, 1, 2]);
        assert_eq!(splits.validation.get(4).unwrap().label, 4);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Hdf5Loader::from_data_dir(dir.path()).load_splits().unwrap_err();
        assert!(err.to_string().contains("Cannot open data file"));
    }

    #[test]
    fn test_missing_group_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATA_FILE_NAME);
        hdf5::File::create(&path).unwrap().create_group("other").unwrap();

        let err = Hdf5Loader::new(&path).load_splits().unwrap_err();
        assert!(err.to_string().contains(SPLIT_GROUP));
    }

    #[test]
    fn test_data_dir_defaults_to_data() {
        assert_eq!(resolve_data_dir(None, None), PathBuf::from("data"));
    }

    #[test]
    fn test_data_dir_precedence() {
        assert_eq!(
            resolve_data_dir(None, Some("/mnt/mnist".into())),
            PathBuf::from("/mnt/mnist")
        );
        assert_eq!(
            resolve_data_dir(Some("local".into()), Some("/mnt/mnist".into())),
            PathBuf::from("local")
        );
    }

    #[test]
    fn test_data_file_path() {
        let loader = Hdf5Loader::from_data_dir("data");
        assert_eq!(loader.path(), Path::new("data/MNIST.hdf5"));
    }
}
