use ndarray::Array2;

use crate::a_funcs::Activation;

/// Loss paired with the network's output activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    /// Cross-entropy over a normalized output distribution.
    CrossEntropy,
    /// Mean squared error.
    MeanSquared,
}

impl Loss {
    /// The loss implied by the output layer's activation function.
    pub fn for_activation(activation: Option<Activation>) -> Self {
        match activation {
            Some(Activation::Softmax) => Loss::CrossEntropy,
            _ => Loss::MeanSquared,
        }
    }

    /// Average per-example loss over a `[features, examples]` batch.
    pub fn loss(&self, output: &Array2<f32>, labels: &Array2<f32>) -> f32 {
        let m = output.ncols() as f32;
        match self {
            Loss::CrossEntropy => {
                let mut acc = 0.;
                for (a, y) in output.iter().zip(labels.iter()) {
                    if *y != 0. {
                        acc -= y * a.max(1e-12).ln();
                    }
                }
                acc / m
            }
            Loss::MeanSquared => {
                let diff = output - labels;
                diff.mapv(|d| d * d).sum() / (2. * m)
            }
        }
    }

    /// Gradient at the output layer, in activation space. For cross-entropy
    /// this is `output - labels`, which combined with softmax's identity
    /// derivative yields the usual softmax/cross-entropy delta.
    pub fn output_delta(&self, output: &Array2<f32>, labels: &Array2<f32>) -> Array2<f32> {
        output - labels
    }
}
