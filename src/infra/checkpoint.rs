// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the best network as an HDF5 file plus a
// JSON copy of its NetworkConfig:
//
//   mnist_pi_best.hdf5
//     └── parameters
//           ├── Hid1 / W     [784, 1200]
//           ├── Hid1 / bias  [1200]
//           ├── Hid2 / W     [1200, 1200]
//           ├── Hid2 / bias  [1200]
//           ├── FC   / W     [1200, 10]
//           └── FC   / bias  [10]
//   mnist_pi_best.json   ← network config
//
// Every save is staged in `*.tmp` files and renamed over the
// previous pair, so a run only ever leaves one best checkpoint
// behind, and a failed save keeps the last good one.

use anyhow::{bail, Context, Result};
use burn::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::model::{LayerParameters, MnistPiNetwork, NetworkConfig, ParameterData};

pub const DEFAULT_CHECKPOINT: &str = "mnist_pi_best.hdf5";

const PARAMETERS_GROUP: &str = "parameters";
const WEIGHT_DATASET: &str = "W";
const BIAS_DATASET: &str = "bias";

/// Reads and writes one checkpoint file and its config sidecar.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    path: PathBuf,
}

impl CheckpointManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.with_extension("json")
    }

    /// Overwrite the checkpoint with the parameters of `network`.
    pub fn save_network<B: Backend>(
        &self,
        network: &MnistPiNetwork<B>,
        config:  &NetworkConfig,
    ) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        }

        let layers = network.layer_parameters()?;

        // Write both files next to their targets, then move them into place,
        // so a failed save leaves the previous best untouched.
        let staged = staging_path(&self.path);
        {
            let file = hdf5::File::create(&staged)
                .with_context(|| format!("Cannot create checkpoint '{}'", staged.display()))?;
            let root = file.create_group(PARAMETERS_GROUP)?;
            for layer in &layers {
                let group = root.create_group(&layer.layer)?;
                write_parameter(&group, WEIGHT_DATASET, &layer.weight)?;
                if let Some(bias) = &layer.bias {
                    write_parameter(&group, BIAS_DATASET, bias)?;
                }
            }
        }

        let config_path   = self.config_path();
        let staged_config = staging_path(&config_path);
        fs::write(&staged_config, serde_json::to_string_pretty(config)?)
            .with_context(|| format!("Cannot write config to '{}'", staged_config.display()))?;

        fs::rename(&staged, &self.path)
            .with_context(|| format!("Cannot move checkpoint into '{}'", self.path.display()))?;
        fs::rename(&staged_config, &config_path)
            .with_context(|| format!("Cannot move config into '{}'", config_path.display()))?;

        tracing::debug!("Saved checkpoint '{}'", self.path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<NetworkConfig> {
        let path = self.config_path();
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read network config '{}'. Has a network been saved?", path.display())
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Rebuild the saved network on `device`.
    pub fn load_network<B: Backend>(&self, device: &B::Device) -> Result<MnistPiNetwork<B>> {
        let config = self.load_config()?;

        let file = hdf5::File::open(&self.path)
            .with_context(|| format!("Cannot open checkpoint '{}'", self.path.display()))?;
        let root = file
            .group(PARAMETERS_GROUP)
            .with_context(|| format!("'{}' has no '{PARAMETERS_GROUP}' group", self.path.display()))?;

        let mut layers = Vec::new();
        for name in config.parameter_layers() {
            let group = root
                .group(&name)
                .with_context(|| format!("Checkpoint is missing layer '{name}'"))?;
            let weight = read_parameter(&group, WEIGHT_DATASET)
                .with_context(|| format!("Cannot read '{name}/{WEIGHT_DATASET}'"))?;
            let bias = read_parameter(&group, BIAS_DATASET)
                .with_context(|| format!("Cannot read '{name}/{BIAS_DATASET}'"))?;
            layers.push(LayerParameters { layer: name, weight, bias: Some(bias) });
        }

        tracing::info!("Loaded checkpoint '{}'", self.path.display());
        config.init::<B>(device)?.load_parameters(&layers, device)
    }
}

/// `<path>.tmp`, in the same directory so the final rename stays on one filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_parameter(group: &hdf5::Group, name: &str, data: &ParameterData) -> Result<()> {
    let dataset = match *data.shape.as_slice() {
        [n] => group.new_dataset::<f32>().shape(n).create(name)?,
        [rows, cols] => group.new_dataset::<f32>().shape((rows, cols)).create(name)?,
        _ => bail!("cannot store '{name}' with shape {:?}", data.shape),
    };
    dataset.write_raw(data.values.as_slice())?;
    Ok(())
}

fn read_parameter(group: &hdf5::Group, name: &str) -> Result<ParameterData> {
    let dataset = group.dataset(name)?;
    Ok(ParameterData {
        shape:  dataset.shape(),
        values: dataset.read_raw::<f32>()?,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("best.hdf5"));
        let device = Default::default();

        let config = NetworkConfig::new(6, vec![5], vec![0.2, 0.5], 3);
        let network = config.init::<NdArray>(&device).unwrap();
        manager.save_network(&network, &config).unwrap();

        assert!(manager.path().exists());
        assert!(manager.config_path().exists());

        let restored = manager.load_network::<NdArray>(&device).unwrap();
        assert_eq!(
            restored.layer_parameters().unwrap(),
            network.layer_parameters().unwrap()
        );
    }

    #[test]
    fn test_save_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("best.hdf5"));
        let device = Default::default();

        let config = NetworkConfig::new(4, vec![3], vec![0.0, 0.0], 2);
        let first = config.init::<NdArray>(&device).unwrap();
        let second = config.init::<NdArray>(&device).unwrap();
        manager.save_network(&first, &config).unwrap();
        manager.save_network(&second, &config).unwrap();

        let restored = manager.load_network::<NdArray>(&device).unwrap();
        assert_eq!(
            restored.layer_parameters().unwrap(),
            second.layer_parameters().unwrap()
        );
    }

    #[test]
    fn test_failed_save_keeps_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("best.hdf5"));
        let device = Default::default();

        let config = NetworkConfig::new(4, vec![3], vec![0.0, 0.0], 2);
        let first = config.init::<NdArray>(&device).unwrap();
        manager.save_network(&first, &config).unwrap();
        assert!(!dir.path().join("best.hdf5.tmp").exists());
        assert!(!dir.path().join("best.json.tmp").exists());

        // a directory in the staging spot makes the next save fail
        fs::create_dir(dir.path().join("best.hdf5.tmp")).unwrap();
        let second = config.init::<NdArray>(&device).unwrap();
        assert!(manager.save_network(&second, &config).is_err());

        let restored = manager.load_network::<NdArray>(&device).unwrap();
        assert_eq!(
            restored.layer_parameters().unwrap(),
            first.layer_parameters().unwrap()
        );
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("absent.hdf5"));
        assert!(manager.load_network::<NdArray>(&Default::default()).is_err());
    }
}
