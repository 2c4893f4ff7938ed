use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::a_funcs::Activation;
use crate::context::LayerContext;
use crate::layers::{image_index, GradError, Layer};
use crate::neurons::{ActivationFormat, Neurons, Neurons3D, NeuronsActivation, ShapeMismatch};

/// Window geometry of a pooling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolingConfig {
    pub filter_height: usize,
    pub filter_width: usize,
    pub stride_height: usize,
    pub stride_width: usize,
}

impl Default for PoolingConfig {
    fn default() -> Self {
        Self {
            filter_height: 1,
            filter_width: 1,
            stride_height: 1,
            stride_width: 1,
        }
    }
}

impl PoolingConfig {
    pub fn with_filter_height(mut self, filter_height: usize) -> Self {
        self.filter_height = filter_height;
        self
    }

    pub fn with_filter_width(mut self, filter_width: usize) -> Self {
        self.filter_width = filter_width;
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

    /// Output height/width of pooling over the given input, or None if the
    /// window doesn't fit the stride grid.
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

/// Channel-wise max pooling over a depth-major image batch. Carries no
/// learned parameters. With `scale_outputs` set, every pooled value (and the
/// gradient routed back through it) is multiplied by the window area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxPoolingLayer {
    name: String,
    input: Neurons3D,
    output: Neurons3D,
    config: PoolingConfig,
    scale_outputs: bool,

    #[serde(skip)]
    cache: Option<Cache>,
}

#[derive(Debug, Clone)]
struct Cache {
    /// Flat input index of the window maximum, per output unit and example.
    max_indices: Array2<usize>,
}

impl MaxPoolingLayer {
    pub fn new(
        name: impl Into<String>,
        input: Neurons3D,
        output: Neurons3D,
        config: PoolingConfig,
        scale_outputs: bool,
    ) -> Self {
        debug_assert_eq!(input.depth(), output.depth());
        debug_assert_eq!(
            config.output_extent(input.height(), input.width()),
            Some((output.height(), output.width()))
        );
        Self {
            name: name.into(),
            input,
            output,
            config,
            scale_outputs,
            cache: None,
        }
    }

    pub fn config(&self) -> PoolingConfig {
        self.config
    }

    pub fn scale_outputs(&self) -> bool {
        self.scale_outputs
    }

    fn scale(&self) -> f32 {
        if self.scale_outputs {
            (self.config.filter_height * self.config.filter_width) as f32
        } else {
            1.
        }
    }
}

impl Layer for MaxPoolingLayer {
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
        None
    }

    fn weight_count(&self) -> usize {
        0
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

        let x = input.values();
        let examples = x.ncols();
        let (in_h, in_w) = (self.input.height(), self.input.width());
        let (out_h, out_w) = (self.output.height(), self.output.width());
        let cfg = &self.config;
        let scale = self.scale();

        let mut out = Array2::zeros((self.output.units(), examples));
        let mut max_indices = Array2::zeros((self.output.units(), examples));
        for e in 0..examples {
            for c in 0..self.input.depth() {
                for oy in 0..out_h {
                    for ox in 0..out_w {
                        let mut best = f32::NEG_INFINITY;
                        let mut best_idx = 0;
                        for ky in 0..cfg.filter_height {
                            for kx in 0..cfg.filter_width {
                                let iy = oy * cfg.stride_height + ky;
                                let ix = ox * cfg.stride_width + kx;
                                let idx = image_index(c, iy, ix, in_h, in_w);
                                let v = x[[idx, e]];
                                if v > best {
                                    best = v;
                                    best_idx = idx;
                                }
                            }
                        }
                        let o_idx = image_index(c, oy, ox, out_h, out_w);
                        out[[o_idx, e]] = best * scale;
                        max_indices[[o_idx, e]] = best_idx;
                    }
                }
            }
        }

        if ctx.training {
            self.cache = Some(Cache { max_indices });
        }

        NeuronsActivation::new(
            out,
            Neurons::new(self.output.units(), false),
            ActivationFormat::default_image_format(),
        )
    }

    fn backward(&mut self, out_grads: Array2<f32>) -> Result<Array2<f32>, GradError> {
        let cache = self.cache.take().ok_or_else(GradError::new)?;
        assert_eq!(out_grads.nrows(), self.output.units());
        assert_eq!(out_grads.ncols(), cache.max_indices.ncols());

        let scale = self.scale();
        let mut in_grads = Array2::zeros((self.input.units(), out_grads.ncols()));
        for e in 0..out_grads.ncols() {
            for o in 0..out_grads.nrows() {
                in_grads[[cache.max_indices[[o, e]], e]] += out_grads[[o, e]] * scale;
            }
        }
        Ok(in_grads)
    }

    fn apply_gradients(&mut self, _learning_rate: f32, _lambda: f32) {}
}
