use anyhow::{anyhow, bail, ensure, Context, Result};
use burn::{
    module::Param,
    nn::{
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Initializer,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::domain::layer::{Activation, LayerSpec};
use crate::ml::modifiers::ConstrainL2Norm;

/// Flattened 28x28x1 image.
pub const INPUT_SIZE: usize = 28 * 28;
pub const NUM_CLASSES: usize = 10;
/// Name of the output projection, the layer the norm constraint targets.
pub const OUTPUT_PROJECTION: &str = "FC";

const HIDDEN_PREFIX: &str = "Hid";

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct NetworkConfig {
    pub input_size:   usize,
    pub hidden_sizes: Vec<usize>,
    /// One dropout probability in front of every hidden layer and one in
    /// front of the output projection.
    pub drop_probs:   Vec<f64>,
    pub num_classes:  usize,
    /// Standard deviation of the zero-mean Gaussian used for every parameter.
    #[config(default = 0.01)]
    pub init_std:     f64,
}

impl NetworkConfig {
    /// Two 1200-unit ReLU layers with 0.2 input dropout and 0.5 hidden dropout.
    pub fn mnist_pi() -> Self {
        Self::new(INPUT_SIZE, vec![1200, 1200], vec![0.2, 0.5, 0.5], NUM_CLASSES)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.input_size > 0, "input size must be positive");
        ensure!(self.num_classes > 1, "need at least two classes");
        ensure!(
            self.drop_probs.len() == self.hidden_sizes.len() + 1,
            "expected {} dropout probabilities for {} hidden layers, got {}",
            self.hidden_sizes.len() + 1,
            self.hidden_sizes.len(),
            self.drop_probs.len(),
        );
        ensure!(
            self.hidden_sizes.iter().all(|&s| s > 0),
            "hidden layer sizes must be positive"
        );
        ensure!(
            self.drop_probs.iter().all(|p| (0.0..1.0).contains(p)),
            "dropout probabilities must lie in [0, 1)"
        );
        ensure!(self.init_std > 0.0, "init_std must be positive");
        Ok(())
    }

    /// The directed layer chain, from input to classification output.
    pub fn layer_specs(&self) -> Vec<LayerSpec> {
        let mut chain = vec![LayerSpec::Input { size: self.input_size }];
        for (i, (&size, &drop_prob)) in self.hidden_sizes.iter().zip(&self.drop_probs).enumerate() {
            chain.push(LayerSpec::Dropout { drop_prob });
            chain.push(LayerSpec::FullyConnected {
                name: hidden_name(i),
                size,
                activation: Activation::Rel,
            });
        }
        if let Some(&drop_prob) = self.drop_probs.last() {
            chain.push(LayerSpec::Dropout { drop_prob });
        }
        chain.push(LayerSpec::Output {
            projection: OUTPUT_PROJECTION.to_string(),
            classes:    self.num_classes,
        });
        chain
    }

    /// Names of the layers that own parameters, in forward order.
    pub fn parameter_layers(&self) -> Vec<String> {
        (0..self.hidden_sizes.len())
            .map(hidden_name)
            .chain(std::iter::once(OUTPUT_PROJECTION.to_string()))
            .collect()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<MnistPiNetwork<B>> {
        self.validate()?;

        let initializer = Initializer::Normal { mean: 0.0, std: self.init_std };
        let mut fan_in  = self.input_size;
        let mut hidden  = Vec::with_capacity(self.hidden_sizes.len());

        for (&size, &drop_prob) in self.hidden_sizes.iter().zip(&self.drop_probs) {
            hidden.push(HiddenLayer {
                dropout: DropoutConfig::new(drop_prob).init(),
                linear:  LinearConfig::new(fan_in, size)
                    .with_initializer(initializer.clone())
                    .init(device),
            });
            fan_in = size;
        }

        let output_drop = *self.drop_probs.last().context("missing output dropout")?;
        Ok(MnistPiNetwork {
            hidden,
            output_dropout: DropoutConfig::new(output_drop).init(),
            output: LinearConfig::new(fan_in, self.num_classes)
                .with_initializer(initializer)
                .init(device),
        })
    }
}

fn hidden_name(index: usize) -> String {
    format!("{HIDDEN_PREFIX}{}", index + 1)
}

/// Dropout followed by a ReLU fully-connected layer.
#[derive(Module, Debug)]
pub struct HiddenLayer<B: Backend> {
    pub dropout: Dropout,
    pub linear:  Linear<B>,
}

#[derive(Module, Debug)]
pub struct MnistPiNetwork<B: Backend> {
    /// `Hid1`, `Hid2`, ... in forward order
    pub hidden:         Vec<HiddenLayer<B>>,
    /// Dropout in front of the output projection
    pub output_dropout: Dropout,
    /// The `FC` projection producing class logits
    pub output:         Linear<B>,
}

impl<B: Backend> MnistPiNetwork<B> {
    /// features: [batch, input_size] → logits: [batch, num_classes]
    ///
    /// Dropout is only active on autodiff backends, so the inner-backend
    /// copy returned by `valid()` evaluates deterministically.
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = features;
        for layer in &self.hidden {
            x = relu(layer.linear.forward(layer.dropout.forward(x)));
        }
        self.output.forward(self.output_dropout.forward(x))
    }

    /// Mean softmax cross-entropy over the batch, plus the logits.
    pub fn forward_classification(
        &self,
        features: Tensor<B, 2>,
        targets:  Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(features);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets);
        (loss, logits)
    }

    /// Project the weights of one named fully-connected layer back inside
    /// the norm limit. Biases are left alone.
    pub fn constrain_layer(mut self, name: &str, constraint: &ConstrainL2Norm) -> Result<Self> {
        let linear = self.linear_mut(name)?;
        linear.weight = constraint.constrain(linear.weight.clone());
        Ok(self)
    }

    /// Copy every weight matrix and bias out of the network.
    pub fn layer_parameters(&self) -> Result<Vec<LayerParameters>> {
        let mut layers = Vec::with_capacity(self.hidden.len() + 1);
        for (i, layer) in self.hidden.iter().enumerate() {
            layers.push(LayerParameters::from_linear(hidden_name(i), &layer.linear)?);
        }
        layers.push(LayerParameters::from_linear(OUTPUT_PROJECTION.to_string(), &self.output)?);
        Ok(layers)
    }

    /// Overwrite parameters with previously extracted values. Shapes must
    /// match the layers they replace.
    pub fn load_parameters(mut self, layers: &[LayerParameters], device: &B::Device) -> Result<Self> {
        for params in layers {
            let linear = self.linear_mut(&params.layer)?;
            let current = linear.weight.val().dims().to_vec();
            ensure!(
                params.weight.shape == current,
                "layer '{}' expects weights {:?}, got {:?}",
                params.layer,
                current,
                params.weight.shape,
            );
            linear.weight = Param::from_tensor(params.weight.to_tensor::<B, 2>(device)?);
            linear.bias = params
                .bias
                .as_ref()
                .map(|b| b.to_tensor::<B, 1>(device).map(Param::from_tensor))
                .transpose()?;
        }
        Ok(self)
    }

    fn linear_mut(&mut self, name: &str) -> Result<&mut Linear<B>> {
        if name == OUTPUT_PROJECTION {
            return Ok(&mut self.output);
        }
        let index = self.hidden_index(name)?;
        Ok(&mut self.hidden[index].linear)
    }

    fn hidden_index(&self, name: &str) -> Result<usize> {
        let number: usize = name
            .strip_prefix(HIDDEN_PREFIX)
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| anyhow!("unknown layer '{name}'"))?;
        if number == 0 || number > self.hidden.len() {
            bail!("unknown layer '{name}': network has {} hidden layers", self.hidden.len());
        }
        Ok(number - 1)
    }
}

/// Host copy of one parameter tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterData {
    /// Tensor dimensions, outermost first
    pub shape:  Vec<usize>,
    /// Row-major element values
    pub values: Vec<f32>,
}

impl ParameterData {
    pub fn from_tensor<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Self> {
        let shape = tensor.dims().to_vec();
        let values = tensor
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("cannot read parameter values: {e:?}"))?;
        Ok(Self { shape, values })
    }

    pub fn to_tensor<B: Backend, const D: usize>(&self, device: &B::Device) -> Result<Tensor<B, D>> {
        let dims: [usize; D] = self
            .shape
            .clone()
            .try_into()
            .map_err(|s| anyhow!("expected a {D}-d parameter, got shape {s:?}"))?;
        ensure!(
            dims.iter().product::<usize>() == self.values.len(),
            "shape {:?} does not hold {} values",
            dims,
            self.values.len(),
        );
        Ok(Tensor::<B, 1>::from_floats(self.values.as_slice(), device).reshape(dims))
    }
}

/// `W` and `bias` of one fully-connected layer. `W` is laid out
/// [inputs, outputs].
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParameters {
    /// Layer name as used in checkpoints: `Hid1`, `Hid2`, ..., `FC`
    pub layer:  String,
    /// Weight matrix, shape [inputs, outputs]
    pub weight: ParameterData,
    /// Bias vector, shape [outputs]; None for bias-free layers
    pub bias:   Option<ParameterData>,
}

impl LayerParameters {
    fn from_linear<B: Backend>(layer: String, linear: &Linear<B>) -> Result<Self> {
        Ok(Self {
            layer,
            weight: ParameterData::from_tensor(linear.weight.val())?,
            bias:   linear
                .bias
                .as_ref()
                .map(|b| ParameterData::from_tensor(b.val()))
                .transpose()?,
        })
    }
}
