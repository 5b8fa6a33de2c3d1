use burn::prelude::*;

/// Accumulates a metric over the batches of one evaluation pass.
pub trait Scorer<B: Backend> {
    /// Key the aggregated value is logged under, e.g. `Accuracy`.
    fn name(&self) -> &str;

    fn reset(&mut self);

    fn update(&mut self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>);

    /// Aggregate over everything seen since the last reset.
    fn value(&self) -> f64;
}

/// Fraction of samples whose arg-max prediction equals the target.
#[derive(Debug, Default, Clone)]
pub struct Accuracy {
    correct: usize,
    total:   usize,
}

impl Accuracy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: Backend> Scorer<B> for Accuracy {
    fn name(&self) -> &str {
        "Accuracy"
    }

    fn reset(&mut self) {
        self.correct = 0;
        self.total   = 0;
    }

    fn update(&mut self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) {
        let [batch_size] = targets.dims();

        // argmax(1) returns [batch, 1]; flatten before comparing with [batch]
        let predicted = logits.argmax(1).flatten::<1>(0, 1);
        let correct: i64 = predicted
            .equal(targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();

        self.correct += correct as usize;
        self.total   += batch_size;
    }

    fn value(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_accuracy_over_batches() {
        let device = Default::default();
        let mut acc = Accuracy::new();

        let logits = Tensor::<NdArray, 2>::from_floats([[0.9, 0.1], [0.2, 0.8], [0.7, 0.3]], &device);
        let targets = Tensor::<NdArray, 1, Int>::from_ints([0, 1, 1], &device);
        Scorer::<NdArray>::update(&mut acc, logits, targets);

        let logits = Tensor::<NdArray, 2>::from_floats([[0.1, 0.9]], &device);
        let targets = Tensor::<NdArray, 1, Int>::from_ints([1], &device);
        Scorer::<NdArray>::update(&mut acc, logits, targets);

        assert!((Scorer::<NdArray>::value(&acc) - 0.75).abs() < 1e-12);

        Scorer::<NdArray>::reset(&mut acc);
        assert_eq!(Scorer::<NdArray>::value(&acc), 0.0);
    }
}
