use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Activation function applied to a layer's weighted inputs.
///
/// The variants are tags carried by layer configuration; the numerics are
/// column-batch operations over the backing matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Identity,
    Sigmoid,
    TanH,
    ReLU,
    Softmax,
}

impl Activation {
    /// Evaluate the function over a `[features, examples]` matrix of
    /// weighted inputs.
    pub fn evaluate(&self, z: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Identity => z.clone(),
            Activation::Sigmoid => z.mapv(|x| 1. / (1. + (-x).exp())),
            Activation::TanH => z.mapv(f32::tanh),
            Activation::ReLU => z.mapv(|x| x.max(0.)),
            Activation::Softmax => {
                let mut out = z.clone();
                for mut col in out.axis_iter_mut(Axis(1)) {
                    let max = col.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
                    col.mapv_inplace(|v| (v - max).exp());
                    let sum = col.sum();
                    col.mapv_inplace(|v| v / sum);
                }
                out
            }
        }
    }

    /// Derivative with respect to the weighted inputs, given both the
    /// weighted inputs `z` and the outputs `a = evaluate(z)`.
    ///
    /// Softmax reports an identity derivative: it is only ever paired with
    /// cross-entropy, whose output delta already folds in the softmax
    /// Jacobian.
    pub fn derivative(&self, z: &Array2<f32>, a: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Identity | Activation::Softmax => Array2::ones(a.raw_dim()),
            Activation::Sigmoid => a.mapv(|y| y * (1. - y)),
            Activation::TanH => a.mapv(|y| 1. - y * y),
            Activation::ReLU => z.mapv(|x| if x > 0. { 1. } else { 0. }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sigmoid_midpoint() {
        let z = array![[0.]];
        let a = Activation::Sigmoid.evaluate(&z);
        assert!((a[[0, 0]] - 0.5).abs() < 1e-6);
        let d = Activation::Sigmoid.derivative(&z, &a);
        assert!((d[[0, 0]] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn softmax_columns_sum_to_one() {
        let z = array![[1., -3.], [2., 0.], [3., 5.]];
        let a = Activation::Softmax.evaluate(&z);
        for col in a.axis_iter(Axis(1)) {
            assert!((col.sum() - 1.).abs() < 1e-6);
        }
        // largest input keeps the largest probability
        assert!(a[[2, 0]] > a[[1, 0]] && a[[1, 0]] > a[[0, 0]]);
    }

    #[test]
    fn relu_gates_negatives() {
        let z = array![[-1., 2.]];
        let a = Activation::ReLU.evaluate(&z);
        assert_eq!(a, array![[0., 2.]]);
        let d = Activation::ReLU.derivative(&z, &a);
        assert_eq!(d, array![[0., 1.]]);
    }
}
