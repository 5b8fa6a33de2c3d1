// ============================================================
// Layer 5 — Weight Modifiers
// ============================================================
// Post-update projections applied to named layers after every
// optimizer step.
//
// ConstrainL2Norm bounds the L2 norm of the incoming weights of
// every unit. Burn stores Linear weights as [inputs, outputs],
// so the incoming vector of unit j is column j:
//
//   norm_j  = sqrt(sum_i W[i, j]^2)
//   W[:, j] = W[:, j] / max(1, norm_j / limit)
//
// Columns already inside the limit are left untouched.

use burn::{module::Param, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstrainL2Norm {
    limit: f64,
}

impl ConstrainL2Norm {
    pub fn new(limit: f64) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    /// Rescale every column of `weights` whose norm exceeds the limit.
    pub fn apply<B: Backend>(&self, weights: Tensor<B, 2>) -> Tensor<B, 2> {
        let divisor = weights
            .clone()
            .powf_scalar(2.0)
            .sum_dim(0)
            .sqrt()
            .div_scalar(self.limit)
            .clamp_min(1.0);
        weights / divisor
    }

    /// Apply the projection to a parameter in place of the optimizer's
    /// value. The parameter id is kept so momentum state stays attached,
    /// and the new value is a fresh leaf so no graph links steps together.
    pub fn constrain<B: Backend>(&self, param: Param<Tensor<B, 2>>) -> Param<Tensor<B, 2>> {
        let constraint = *self;
        param.map(move |weights| {
            let require_grad = weights.is_require_grad();
            constraint
                .apply(weights.detach())
                .set_require_grad(require_grad)
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    fn column_norms<B: Backend>(weights: Tensor<B, 2>) -> Vec<f32> {
        weights
            .powf_scalar(2.0)
            .sum_dim(0)
            .sqrt()
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap()
    }

    #[test]
    fn test_long_columns_are_rescaled() {
        let device = Default::default();
        // column 0 = (3, 4) has norm 5, column 1 = (0.1, 0.2) is inside the limit
        let w = Tensor::<NdArray, 2>::from_floats([[3.0, 0.1], [4.0, 0.2]], &device);
        let out: Vec<f32> = ConstrainL2Norm::new(1.0)
            .apply(w)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();

        let expected = [0.6, 0.1, 0.8, 0.2];
        for (got, want) in out.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{out:?}");
        }
    }

    #[test]
    fn test_norms_bounded_by_limit() {
        let device = Default::default();
        let w = Tensor::<NdArray, 2>::from_floats(
            [[2.0, -1.0, 0.0], [2.0, 3.0, 0.5], [1.0, 0.0, 0.5]],
            &device,
        );
        let limit = 1.5;
        for norm in column_norms(ConstrainL2Norm::new(limit).apply(w)) {
            assert!(norm <= limit as f32 + 1e-5, "norm {norm}");
        }
    }

    #[test]
    fn test_constrained_param_keeps_id_and_grad() {
        let device = Default::default();
        let w = Tensor::<Autodiff<NdArray>, 2>::from_floats([[3.0], [4.0]], &device).require_grad();
        let param = Param::from_tensor(w);
        let id = param.id;

        let constrained = ConstrainL2Norm::new(1.0).constrain(param);
        assert_eq!(constrained.id, id);
        assert!(constrained.val().is_require_grad());
        let norms = column_norms(constrained.val());
        assert!((norms[0] - 1.0).abs() < 1e-6);
    }
}
