use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::split::DataSplit;

/// One flattened image and its class label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MnistItem {
    pub features: Vec<f32>,
    pub label:    u32,
}

pub struct MnistDataset {
    split: DataSplit,
}

impl MnistDataset {
    pub fn new(split: DataSplit) -> Self { Self { split } }
}

impl Dataset<MnistItem> for MnistDataset {
    fn get(&self, index: usize) -> Option<MnistItem> {
        self.split.get(index).map(|s| MnistItem {
            features: s.features.to_vec(),
            label:    s.label,
        })
    }

    fn len(&self) -> usize {
        self.split.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_follow_split_order() {
        let split   = DataSplit::new(vec![1.0, 2.0, 3.0, 4.0], vec![7, 9], 2).unwrap();
        let dataset = MnistDataset::new(split);
        assert_eq!(dataset.len(), 2);
        let item = dataset.get(1).unwrap();
        assert_eq!(item.features, vec![3.0, 4.0]);
        assert_eq!(item.label, 9);
        assert!(dataset.get(2).is_none());
    }
}
