pub mod convolutional;
pub mod fully_connected;
pub mod max_pooling;

pub use convolutional::{ConvolutionConfig, ConvolutionalLayer};
pub use fully_connected::FullyConnectedLayer;
pub use max_pooling::{MaxPoolingLayer, PoolingConfig};

use std::error::Error;
use std::fmt::Display;

use enum_dispatch::enum_dispatch;
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::a_funcs::Activation;
use crate::context::LayerContext;
use crate::neurons::{Neurons, NeuronsActivation, ShapeMismatch};

/// A single unit of the layer chain. Forward propagation consumes the
/// previous layer's activation batch and produces this layer's, which never
/// carries a bias unit; a layer that wants a bias applies its own
/// [`BiasVector`](crate::axons::BiasVector) to its inputs.
#[enum_dispatch]
pub trait Layer {
    fn name(&self) -> &str;

    /// The shape this layer consumes.
    fn input_neurons(&self) -> Neurons;

    /// The shape this layer produces.
    fn output_neurons(&self) -> Neurons;

    /// The activation function applied to the weighted inputs, if any.
    fn activation(&self) -> Option<Activation>;

    /// Number of learned values held by the layer.
    fn weight_count(&self) -> usize;

    /// Evaluate the layer's output for a batch of examples. In training mode
    /// the layer records whatever backward propagation will need, including
    /// the dropout mask when one was applied.
    fn forward(
        &mut self,
        input: &NeuronsActivation,
        ctx: &mut LayerContext<'_>,
    ) -> Result<NeuronsActivation, ShapeMismatch>;

    /// Distribute `out_grads` (gradients with respect to this layer's output
    /// activations) back to the layer's input, accumulating parameter
    /// gradients along the way. Consumes the caches recorded by the last
    /// training-mode forward pass.
    fn backward(&mut self, out_grads: Array2<f32>) -> Result<Array2<f32>, GradError>;

    /// Update parameters from the accumulated gradients:
    /// `param -= learning_rate * gradient + lambda * param`, with the decay
    /// term applied to weights only, never biases.
    fn apply_gradients(&mut self, learning_rate: f32, lambda: f32);
}

/// The architecture of a layer as a tagged variant, so a whole network can be
/// stored, serialized and dispatched over uniformly.
#[enum_dispatch(Layer)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NetworkLayer {
    FullyConnected(FullyConnectedLayer),
    Convolutional(ConvolutionalLayer),
    MaxPooling(MaxPoolingLayer),
}

/// Backward propagation was requested without a preceding training-mode
/// forward pass to supply its caches.
#[derive(Clone, Debug, Default)]
pub struct GradError;

impl GradError {
    pub fn new() -> Self {
        Self
    }
}

impl Error for GradError {}

impl Display for GradError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Gradients requested before a training-mode forward pass")
    }
}

/// Flat feature index of an image position under the depth-major format.
pub(crate) fn image_index(channel: usize, y: usize, x: usize, height: usize, width: usize) -> usize {
    channel * (height * width) + y * width + x
}

/// Samples an inverted-dropout mask: each unit is retained independently
/// with probability `keep_probability` and scaled by its reciprocal, so
/// inference needs no rescaling.
pub(crate) fn dropout_mask(
    shape: (usize, usize),
    keep_probability: f32,
    rng: &mut SmallRng,
) -> Array2<f32> {
    let scale = 1. / keep_probability;
    Array2::from_shape_fn(shape, |_| {
        if rng.gen::<f32>() < keep_probability {
            scale
        } else {
            0.
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn image_index_is_depth_major() {
        // 2 channels of 3x4
        assert_eq!(image_index(0, 0, 0, 3, 4), 0);
        assert_eq!(image_index(0, 1, 2, 3, 4), 6);
        assert_eq!(image_index(1, 0, 0, 3, 4), 12);
    }

    #[test]
    fn dropout_mask_is_deterministic_and_scaled() {
        let mut a = SmallRng::seed_from_u64(3);
        let mut b = SmallRng::seed_from_u64(3);
        let m1 = dropout_mask((20, 10), 0.8, &mut a);
        let m2 = dropout_mask((20, 10), 0.8, &mut b);
        assert_eq!(m1, m2);
        assert!(m1.iter().all(|&v| v == 0. || (v - 1.25).abs() < 1e-6));
        // with seed 3 and 200 draws at p = 0.8, both outcomes occur
        assert!(m1.iter().any(|&v| v == 0.));
        assert!(m1.iter().any(|&v| v != 0.));
    }
}
