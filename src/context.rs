use std::collections::HashMap;

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Per-layer hyperparameter overrides, applied during training only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxonsContext {
    pub keep_probability: f32,
    pub regularisation_lambda: f32,
}

impl Default for AxonsContext {
    fn default() -> Self {
        Self {
            keep_probability: 1.,
            regularisation_lambda: 0.,
        }
    }
}

impl AxonsContext {
    /// Per-unit independent probability of retaining an input activation
    /// during training.
    pub fn with_dropout_keep_probability(&mut self, keep_probability: f32) -> &mut Self {
        assert!(
            keep_probability > 0. && keep_probability <= 1.,
            "keep probability must be in (0, 1]"
        );
        self.keep_probability = keep_probability;
        self
    }

    /// L2 weight-decay strength for this layer's weights.
    pub fn with_regularisation_lambda(&mut self, lambda: f32) -> &mut Self {
        self.regularisation_lambda = lambda;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Inference,
    Training,
}

/// Configuration scope for forward propagation and training over a network.
///
/// A context is created in inference mode; [`as_training_context`] derives
/// the training-mode counterpart carrying epoch count, learning rate and the
/// per-layer overrides. The dropout source is a seeded RNG so that runs with
/// identical configuration are bit-for-bit repeatable.
///
/// [`as_training_context`]: NetworkContext::as_training_context
#[derive(Debug, Clone)]
pub struct NetworkContext {
    mode: Mode,
    training_epochs: usize,
    training_learning_rate: f32,
    axons: HashMap<usize, AxonsContext>,
    seed: u64,
    rng: SmallRng,
}

impl NetworkContext {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            mode: Mode::Inference,
            training_epochs: 0,
            training_learning_rate: 0.,
            axons: HashMap::new(),
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Derives a training-mode copy of this context with a freshly seeded
    /// dropout RNG.
    pub fn as_training_context(&self) -> Self {
        let mut ctx = self.clone();
        ctx.mode = Mode::Training;
        ctx.rng = SmallRng::seed_from_u64(self.seed);
        ctx
    }

    pub fn is_training(&self) -> bool {
        self.mode == Mode::Training
    }

    pub fn set_training_epochs(&mut self, epochs: usize) {
        self.training_epochs = epochs;
    }

    pub fn training_epochs(&self) -> usize {
        self.training_epochs
    }

    pub fn set_training_learning_rate(&mut self, learning_rate: f32) {
        self.training_learning_rate = learning_rate;
    }

    pub fn training_learning_rate(&self) -> f32 {
        self.training_learning_rate
    }

    /// Mutable access to the override for the given layer index, created on
    /// first use.
    pub fn axons_context(&mut self, layer: usize) -> &mut AxonsContext {
        self.axons.entry(layer).or_default()
    }

    /// The effective override for the given layer index.
    pub fn axons(&self, layer: usize) -> AxonsContext {
        self.axons.get(&layer).copied().unwrap_or_default()
    }

    /// The per-layer view handed to `Layer::forward`.
    pub fn layer_context(&mut self, layer: usize) -> LayerContext<'_> {
        let axons = self.axons.get(&layer).copied().unwrap_or_default();
        LayerContext {
            training: self.mode == Mode::Training,
            keep_probability: axons.keep_probability,
            rng: &mut self.rng,
        }
    }
}

impl Default for NetworkContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The slice of a [`NetworkContext`] a single layer sees during forward
/// propagation.
pub struct LayerContext<'a> {
    pub training: bool,
    pub keep_probability: f32,
    pub rng: &'a mut SmallRng,
}
