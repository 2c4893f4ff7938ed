use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::a_funcs::Activation;
use crate::axons::{BiasFormat, BiasVector, LayoutSizeMismatch, WeightsFormat, WeightsMatrix};
use crate::context::LayerContext;
use crate::initializer::Initializer;
use crate::layers::{dropout_mask, image_index, GradError, Layer};
use crate::neurons::{ActivationFormat, Neurons, Neurons3D, NeuronsActivation, ShapeMismatch};

/// Filter geometry of a convolutional layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvolutionConfig {
    pub filter_height: usize,
    pub filter_width: usize,
    pub filter_count: usize,
    pub stride_height: usize,
    pub stride_width: usize,
}

impl Default for ConvolutionConfig {
    fn default() -> Self {
        Self {
            filter_height: 1,
            filter_width: 1,
            filter_count: 1,
            stride_height: 1,
            stride_width: 1,
        }
    }
}

impl ConvolutionConfig {
    pub fn with_filter_height(mut self, filter_height: usize) -> Self {
        self.filter_height = filter_height;
        self
    }

    pub fn with_filter_width(mut self, filter_width: usize) -> Self {
        self.filter_width = filter_width;
        self
    }

    pub fn with_filter_count(mut self, filter_count: usize) -> Self {
        self.filter_count = filter_count;
        self
    }

    pub fn with_stride_height(mut self, stride_height: usize) -> Self {
        self.stride_height = stride_height;
        self
    }

    pub fn with_stride_width(mut self, stride_width: usize) -> Self {
        self.stride_width = stride_width;
        self
    }

    /// Output height/width of a valid-padding convolution over the given
    /// input, or None if the window doesn't fit the stride grid.
    pub fn output_extent(&self, in_height: usize, in_width: usize) -> Option<(usize, usize)> {
        if self.filter_height > in_height || self.filter_width > in_width {
            return None;
        }
        let h = in_height - self.filter_height;
        let w = in_width - self.filter_width;
        if h % self.stride_height != 0 || w % self.stride_width != 0 {
            return None;
        }
        Some((h / self.stride_height + 1, w / self.stride_width + 1))
    }
}

/// A 2D valid-padding convolution over a depth-major image batch:
/// `output = activation(conv(input, filters) + bias)`, one filter per
/// output channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvolutionalLayer {
    name: String,
    input: Neurons3D,
    output: Neurons3D,
    config: ConvolutionConfig,
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

impl ConvolutionalLayer {
    /// Builds the layer from pretrained tensors. The filter blob must hold
    /// one row per output channel and `input_depth * filter_height *
    /// filter_width` columns.
    pub fn new(
        name: impl Into<String>,
        input: Neurons3D,
        output: Neurons3D,
        config: ConvolutionConfig,
        activation: Activation,
        weights: WeightsMatrix,
        biases: Option<BiasVector>,
    ) -> Result<Self, LayoutSizeMismatch> {
        if weights.output_count() != config.filter_count {
            return Err(LayoutSizeMismatch::NeuronCount {
                side: "output",
                tensor: weights.output_count(),
                neurons: config.filter_count,
            });
        }
        let window = input.depth() * config.filter_height * config.filter_width;
        if weights.input_count() != window {
            return Err(LayoutSizeMismatch::NeuronCount {
                side: "input",
                tensor: weights.input_count(),
                neurons: window,
            });
        }
        if input.has_bias_unit() != biases.is_some() {
            return Err(LayoutSizeMismatch::BiasPresence {
                declared: input.has_bias_unit(),
            });
        }
        if let Some(b) = &biases {
            if b.output_count() != config.filter_count {
                return Err(LayoutSizeMismatch::NeuronCount {
                    side: "bias",
                    tensor: b.output_count(),
                    neurons: config.filter_count,
                });
            }
        }
        debug_assert_eq!(
            config.output_extent(input.height(), input.width()),
            Some((output.height(), output.width()))
        );
        debug_assert_eq!(config.filter_count, output.depth());
        Ok(Self {
            name: name.into(),
            input,
            output,
            config,
            activation,
            weights,
            biases,
            cache: None,
            grads: None,
        })
    }

    pub fn with_random_weights<I: Initializer>(
        name: impl Into<String>,
        input: Neurons3D,
        output: Neurons3D,
        config: ConvolutionConfig,
        activation: Activation,
        mut init: I,
    ) -> Self {
        let window = input.depth() * config.filter_height * config.filter_width;
        let weights = WeightsMatrix::from_output_major(
            init.matrix(window, config.filter_count),
            WeightsFormat::convolutional(
                input.depth(),
                config.filter_height,
                config.filter_width,
                config.filter_count,
            ),
        );
        let biases = if input.has_bias_unit() {
            Some(BiasVector::zeroed(
                config.filter_count,
                BiasFormat::output_depth_column(),
            ))
        } else {
            None
        };
        Self {
            name: name.into(),
            input,
            output,
            config,
            activation,
            weights,
            biases,
            cache: None,
            grads: None,
        }
    }

    pub fn config(&self) -> ConvolutionConfig {
        self.config
    }

    pub fn weights(&self) -> &WeightsMatrix {
        &self.weights
    }

    pub fn biases(&self) -> Option<&BiasVector> {
        self.biases.as_ref()
    }

    fn convolve(&self, x: &Array2<f32>) -> Array2<f32> {
        let examples = x.ncols();
        let (in_h, in_w, in_d) = (self.input.height(), self.input.width(), self.input.depth());
        let (out_h, out_w) = (self.output.height(), self.output.width());
        let cfg = &self.config;
        let weights = self.weights.values();

        let mut z = Array2::zeros((self.output.units(), examples));
        for e in 0..examples {
            for f in 0..cfg.filter_count {
                let bias = self.biases.as_ref().map_or(0., |b| b.values()[[f, 0]]);
                for oy in 0..out_h {
                    for ox in 0..out_w {
                        let mut acc = bias;
                        for c in 0..in_d {
                            for ky in 0..cfg.filter_height {
                                for kx in 0..cfg.filter_width {
                                    let iy = oy * cfg.stride_height + ky;
                                    let ix = ox * cfg.stride_width + kx;
                                    acc += x[[image_index(c, iy, ix, in_h, in_w), e]]
                                        * weights
                                            [[f, image_index(c, ky, kx, cfg.filter_height, cfg.filter_width)]];
                                }
                            }
                        }
                        z[[image_index(f, oy, ox, out_h, out_w), e]] = acc;
                    }
                }
            }
        }
        z
    }
}

impl Layer for ConvolutionalLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_neurons(&self) -> Neurons {
        self.input.into()
    }

    fn output_neurons(&self) -> Neurons {
        self.output.into()
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
        if input.feature_count() != self.input.units() {
            return Err(ShapeMismatch::Features {
                context: format!("input of layer '{}'", self.name),
                expected: self.input.units(),
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

        let z = self.convolve(&x);
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
            Neurons::new(self.output.units(), false),
            ActivationFormat::default_image_format(),
        )
    }

    fn backward(&mut self, out_grads: Array2<f32>) -> Result<Array2<f32>, GradError> {
        let cache = self.cache.take().ok_or_else(GradError::new)?;
        assert_eq!(out_grads.nrows(), self.output.units());
        assert_eq!(out_grads.ncols(), cache.inputs.ncols());

        let examples = cache.inputs.ncols();
        let m = examples as f32;
        let deriv = self
            .activation
            .derivative(&cache.weighted_inputs, &cache.activations);
        let dz = &out_grads * &deriv;

        let (in_h, in_w, in_d) = (self.input.height(), self.input.width(), self.input.depth());
        let (out_h, out_w) = (self.output.height(), self.output.width());
        let cfg = &self.config;
        let weights = self.weights.values();

        let mut d_weights = Array2::zeros(weights.raw_dim());
        let mut d_biases = Array2::zeros((cfg.filter_count, 1));
        let mut in_grads = Array2::zeros((self.input.units(), examples));

        for e in 0..examples {
            for f in 0..cfg.filter_count {
                for oy in 0..out_h {
                    for ox in 0..out_w {
                        let g = dz[[image_index(f, oy, ox, out_h, out_w), e]];
                        d_biases[[f, 0]] += g;
                        for c in 0..in_d {
                            for ky in 0..cfg.filter_height {
                                for kx in 0..cfg.filter_width {
                                    let iy = oy * cfg.stride_height + ky;
                                    let ix = ox * cfg.stride_width + kx;
                                    let i_idx = image_index(c, iy, ix, in_h, in_w);
                                    let k_idx = image_index(
                                        c,
                                        ky,
                                        kx,
                                        cfg.filter_height,
                                        cfg.filter_width,
                                    );
                                    d_weights[[f, k_idx]] += g * cache.inputs[[i_idx, e]];
                                    in_grads[[i_idx, e]] += g * weights[[f, k_idx]];
                                }
                            }
                        }
                    }
                }
            }
        }
        d_weights /= m;
        d_biases /= m;

        if let Some(mask) = &cache.mask {
            in_grads = &in_grads * mask;
        }

        self.grads = Some(Grads {
            weights: d_weights,
            biases: self.biases.as_ref().map(|_| d_biases),
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
