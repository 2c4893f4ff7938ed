use ndarray::{Array2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::a_funcs::Activation;
use crate::axons::{BiasFormat, BiasVector, LayoutSizeMismatch, WeightsFormat, WeightsMatrix};
use crate::context::LayerContext;
use crate::initializer::Initializer;
use crate::layers::{dropout_mask, GradError, Layer};
use crate::neurons::{ActivationFormat, Neurons, NeuronsActivation, ShapeMismatch};

/// Your run of the mill fully connected layer:
/// `output = activation(weights . input + bias)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullyConnectedLayer {
    name: String,
    input: Neurons,
    output: Neurons,
    activation: Activation,
    weights: WeightsMatrix,
    biases: Option<BiasVector>,

    #[serde(skip)]
    cache: Option<Cache>,
    #[serde(skip)]
    grads: Option<Grads>,
}

#[derive(Debug, Clone)]
struct Cache {
    /// Inputs as seen by the weights, dropout already applied.
    inputs: Array2<f32>,
    weighted_inputs: Array2<f32>,
    activations: Array2<f32>,
    mask: Option<Array2<f32>>,
}

#[derive(Debug, Clone)]
struct Grads {
    weights: Array2<f32>,
    biases: Option<Array2<f32>>,
}

impl FullyConnectedLayer {
    /// Builds the layer from pretrained tensors, validating them against the
    /// declared neuron shapes. A bias vector is expected exactly when the
    /// input shape declares a bias unit.
    pub fn new(
        name: impl Into<String>,
        input: Neurons,
        output: Neurons,
        activation: Activation,
        weights: WeightsMatrix,
        biases: Option<BiasVector>,
    ) -> Result<Self, LayoutSizeMismatch> {
        if weights.output_count() != output.count() {
            return Err(LayoutSizeMismatch::NeuronCount {
                side: "output",
                tensor: weights.output_count(),
                neurons: output.count(),
            });
        }
        if weights.input_count() != input.count() {
            return Err(LayoutSizeMismatch::NeuronCount {
                side: "input",
                tensor: weights.input_count(),
                neurons: input.count(),
            });
        }
        if input.has_bias_unit() != biases.is_some() {
            return Err(LayoutSizeMismatch::BiasPresence {
                declared: input.has_bias_unit(),
            });
        }
        if let Some(b) = &biases {
            if b.output_count() != output.count() {
                return Err(LayoutSizeMismatch::NeuronCount {
                    side: "bias",
                    tensor: b.output_count(),
                    neurons: output.count(),
                });
            }
        }
        Ok(Self {
            name: name.into(),
            input,
            output,
            activation,
            weights,
            biases,
            cache: None,
            grads: None,
        })
    }

    /// Builds the layer with freshly initialized weights and a zeroed bias
    /// (when the input shape declares a bias unit).
    pub fn with_random_weights<I: Initializer>(
        name: impl Into<String>,
        input: Neurons,
        output: Neurons,
        activation: Activation,
        mut init: I,
    ) -> Self {
        let weights = WeightsMatrix::from_output_major(
            init.matrix(input.count(), output.count()),
            WeightsFormat::fully_connected(input.count(), output.count()),
        );
        let biases = if input.has_bias_unit() {
            Some(BiasVector::zeroed(
                output.count(),
                BiasFormat::default_bias_format(),
            ))
        } else {
            None
        };
        Self {
            name: name.into(),
            input,
            output,
            activation,
            weights,
            biases,
            cache: None,
            grads: None,
        }
    }

    pub fn weights(&self) -> &WeightsMatrix {
        &self.weights
    }

    pub fn biases(&self) -> Option<&BiasVector> {
        self.biases.as_ref()
    }
}

impl Layer for FullyConnectedLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_neurons(&self) -> Neurons {
        self.input
    }

    fn output_neurons(&self) -> Neurons {
        self.output
    }

    fn activation(&self) -> Option<Activation> {
        Some(self.activation)
    }

    fn weight_count(&self) -> usize {
        self.weights.values().len() + self.biases.as_ref().map_or(0, |b| b.values().len())
    }

    fn forward(
        &mut self,
        input: &NeuronsActivation,
        ctx: &mut LayerContext<'_>,
    ) -> Result<NeuronsActivation, ShapeMismatch> {
        if input.feature_count() != self.input.count() {
            return Err(ShapeMismatch::Features {
                context: format!("input of layer '{}'", self.name),
                expected: self.input.count(),
                received: input.feature_count(),
            });
        }

        let mut x = input.values().clone();
        let mask = if ctx.training && ctx.keep_probability < 1. {
            let mask = dropout_mask((x.nrows(), x.ncols()), ctx.keep_probability, ctx.rng);
            x = &x * &mask;
            Some(mask)
        } else {
            None
        };

        let mut z = self.weights.values().dot(&x);
        if let Some(b) = &self.biases {
            z = z + b.values();
        }
        let a = self.activation.evaluate(&z);

        if ctx.training {
            self.cache = Some(Cache {
                inputs: x,
                weighted_inputs: z,
                activations: a.clone(),
                mask,
            });
        }

        NeuronsActivation::new(
            a,
            Neurons::new(self.output.count(), false),
            ActivationFormat::rows_span_feature_set(),
        )
    }

    fn backward(&mut self, out_grads: Array2<f32>) -> Result<Array2<f32>, GradError> {
        let cache = self.cache.take().ok_or_else(GradError::new)?;
        assert_eq!(out_grads.nrows(), self.output.count());
        assert_eq!(out_grads.ncols(), cache.inputs.ncols());

        let m = cache.inputs.ncols() as f32;
        let deriv = self
            .activation
            .derivative(&cache.weighted_inputs, &cache.activations);
        let dz = &out_grads * &deriv;

        let d_weights = dz.dot(&cache.inputs.t()) / m;
        let d_biases = self
            .biases
            .as_ref()
            .map(|_| (dz.sum_axis(Axis(1)) / m).insert_axis(Axis(1)));

        let mut in_grads = self.weights.values().t().dot(&dz);
        if let Some(mask) = &cache.mask {
            in_grads = &in_grads * mask;
        }

        self.grads = Some(Grads {
            weights: d_weights,
            biases: d_biases,
        });
        Ok(in_grads)
    }

    fn apply_gradients(&mut self, learning_rate: f32, lambda: f32) {
        if let Some(grads) = self.grads.take() {
            Zip::from(self.weights.values_mut())
                .and(&grads.weights)
                .for_each(|w, &g| *w -= learning_rate * g + lambda * *w);
            if let (Some(biases), Some(d_biases)) = (&mut self.biases, &grads.biases) {
                Zip::from(biases.values_mut())
                    .and(d_biases)
                    .for_each(|b, &g| *b -= learning_rate * g);
            }
        }
    }
}
