// ============================================================
// Layer 3 — Layer Specifications
// ============================================================
// A framework-free description of the network topology.
// The ml layer builds burn modules from the same config and
// uses these specs for logging and for naming parameters in
// checkpoint files.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Rectified linear, max(0, x)
    Rel,
}

/// One node in the directed layer chain.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSpec {
    Input { size: usize },
    Dropout { drop_prob: f64 },
    FullyConnected { name: String, size: usize, activation: Activation },
    /// Projection named `projection` followed by softmax cross-entropy.
    Output { projection: String, classes: usize },
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerSpec::Input { size } => write!(f, "Input({size})"),
            LayerSpec::Dropout { drop_prob } => write!(f, "Dropout(p={drop_prob})"),
            LayerSpec::FullyConnected { name, size, activation } => {
                write!(f, "{name}: FullyConnected({size}, {activation:?})")
            }
            LayerSpec::Output { projection, classes } => {
                write!(f, "Output({projection}: FullyConnected({classes}) + softmax)")
            }
        }
    }
}

/// Render a chain as `A >> B >> C`.
pub fn describe_chain(chain: &[LayerSpec]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" >> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_chain() {
        let chain = vec![
            LayerSpec::Input { size: 4 },
            LayerSpec::Dropout { drop_prob: 0.5 },
            LayerSpec::Output { projection: "FC".into(), classes: 2 },
        ];
        assert_eq!(
            describe_chain(&chain),
            "Input(4) >> Dropout(p=0.5) >> Output(FC: FullyConnected(2) + softmax)"
        );
    }
}
