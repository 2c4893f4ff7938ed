use std::error::Error;
use std::fmt::Display;

use crate::a_funcs::Activation;
use crate::axons::{BiasVector, LayoutSizeMismatch, WeightsMatrix};
use crate::initializer::{Initializer, XavierInit};
use crate::layers::{
    ConvolutionConfig, ConvolutionalLayer, FullyConnectedLayer, MaxPoolingLayer, NetworkLayer,
    PoolingConfig,
};
use crate::network::Network;
use crate::neurons::{Neurons, Neurons3D};

/// A recipe for one layer of a network under construction. Builders declare
/// their endpoint shapes up front so the assembler can check adjacent layers
/// against each other before any layer is materialized.
pub trait LayerBuilder {
    /// The shape the built layer will consume, if declared yet.
    fn input_neurons(&self) -> Option<Neurons>;

    /// The shape the built layer will produce, if declared yet.
    fn output_neurons(&self) -> Option<Neurons>;

    /// Materialize the layer. `index` is the layer's position in the chain,
    /// used for error reporting only.
    fn build_layer(self: Box<Self>, index: usize) -> Result<NetworkLayer, AssemblyError>;
}

/// Assembles a layer chain into a [`Network`], validating that every layer's
/// output shape can feed the next layer's input shape.
pub struct NetworkBuilder {
    name: String,
    layers: Vec<Box<dyn LayerBuilder>>,
}

impl NetworkBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
        }
    }

    /// Appends a layer recipe to the chain.
    pub fn layer(mut self, builder: impl LayerBuilder + 'static) -> Self {
        self.layers.push(Box::new(builder));
        self
    }

    pub fn build(self) -> Result<Network, AssemblyError> {
        if self.layers.is_empty() {
            return Err(AssemblyError::Empty);
        }
        let mut layers = Vec::with_capacity(self.layers.len());
        for (index, builder) in self.layers.into_iter().enumerate() {
            layers.push(builder.build_layer(index)?);
        }
        Network::new(self.name, layers)
    }
}

/// A chain could not be assembled into a network.
#[derive(Debug)]
pub enum AssemblyError {
    /// No layers were provided.
    Empty,
    /// A builder was asked to materialize before all of its required parts
    /// were supplied.
    Underspecified {
        index: usize,
        name: String,
        detail: &'static str,
    },
    /// A layer's output shape cannot feed the next layer's input shape.
    Incompatible {
        index: usize,
        received: Neurons,
        expected: Neurons,
    },
    /// A layer's declared window geometry doesn't produce its declared
    /// output extent.
    Geometry {
        index: usize,
        name: String,
        detail: String,
    },
    /// A layer rejected its parameter tensors.
    Layer {
        index: usize,
        name: String,
        source: LayoutSizeMismatch,
    },
}

impl Error for AssemblyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AssemblyError::Layer { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssemblyError::Empty => f.write_str("Can not assemble a network with no layers"),
            AssemblyError::Underspecified {
                index,
                name,
                detail,
            } => f.write_fmt(format_args!(
                "Layer {} ('{}') is underspecified: {}",
                index, name, detail
            )),
            AssemblyError::Incompatible {
                index,
                received,
                expected,
            } => f.write_fmt(format_args!(
                "Layer {} receives {} features but its predecessor produces {}",
                index,
                expected.count(),
                received.count()
            )),
            AssemblyError::Geometry {
                index,
                name,
                detail,
            } => f.write_fmt(format_args!(
                "Layer {} ('{}') has inconsistent geometry: {}",
                index, name, detail
            )),
            AssemblyError::Layer {
                index,
                name,
                source,
            } => f.write_fmt(format_args!(
                "Layer {} ('{}') rejected its parameters: {}",
                index, name, source
            )),
        }
    }
}

/// Recipe for a [`FullyConnectedLayer`]. Weights come either from an
/// explicit pretrained matrix or from an initializer (Xavier by default).
pub struct FullyConnectedBuilder {
    name: String,
    input: Option<Neurons>,
    output: Option<Neurons>,
    activation: Activation,
    weights: Option<WeightsMatrix>,
    biases: Option<BiasVector>,
    initializer: Option<Box<dyn Initializer>>,
}

impl FullyConnectedBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: None,
            output: None,
            activation: Activation::Identity,
            weights: None,
            biases: None,
            initializer: None,
        }
    }

    pub fn with_input_neurons(mut self, input: Neurons) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output_neurons(mut self, output: Neurons) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_activation_function(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_weights_matrix(mut self, weights: WeightsMatrix) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_bias_vector(mut self, biases: BiasVector) -> Self {
        self.biases = Some(biases);
        self
    }

    pub fn with_initializer(mut self, init: impl Initializer + 'static) -> Self {
        self.initializer = Some(Box::new(init));
        self
    }
}

impl LayerBuilder for FullyConnectedBuilder {
    fn input_neurons(&self) -> Option<Neurons> {
        self.input
    }

    fn output_neurons(&self) -> Option<Neurons> {
        self.output
    }

    fn build_layer(self: Box<Self>, index: usize) -> Result<NetworkLayer, AssemblyError> {
        let underspecified = |detail| AssemblyError::Underspecified {
            index,
            name: self.name.clone(),
            detail,
        };
        let input = self.input.ok_or_else(|| underspecified("no input neurons"))?;
        let output = self
            .output
            .ok_or_else(|| underspecified("no output neurons"))?;

        let name = self.name;
        let layer = match self.weights {
            Some(weights) => FullyConnectedLayer::new(
                name.clone(),
                input,
                output,
                self.activation,
                weights,
                self.biases,
            )
            .map_err(|source| AssemblyError::Layer {
                index,
                name,
                source,
            })?,
            None => FullyConnectedLayer::with_random_weights(
                name,
                input,
                output,
                self.activation,
                self.initializer.unwrap_or_else(|| Box::new(XavierInit::new())),
            ),
        };
        Ok(layer.into())
    }
}

/// Recipe for a [`ConvolutionalLayer`].
pub struct ConvolutionalBuilder {
    name: String,
    input: Option<Neurons3D>,
    output: Option<Neurons3D>,
    config: ConvolutionConfig,
    activation: Activation,
    weights: Option<WeightsMatrix>,
    biases: Option<BiasVector>,
    initializer: Option<Box<dyn Initializer>>,
}

impl ConvolutionalBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: None,
            output: None,
            config: ConvolutionConfig::default(),
            activation: Activation::Identity,
            weights: None,
            biases: None,
            initializer: None,
        }
    }

    pub fn with_input_neurons(mut self, input: Neurons3D) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output_neurons(mut self, output: Neurons3D) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_config(mut self, config: ConvolutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_activation_function(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_weights_matrix(mut self, weights: WeightsMatrix) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_bias_vector(mut self, biases: BiasVector) -> Self {
        self.biases = Some(biases);
        self
    }

    pub fn with_initializer(mut self, init: impl Initializer + 'static) -> Self {
        self.initializer = Some(Box::new(init));
        self
    }
}

impl LayerBuilder for ConvolutionalBuilder {
    fn input_neurons(&self) -> Option<Neurons> {
        self.input.map(Into::into)
    }

    fn output_neurons(&self) -> Option<Neurons> {
        self.output.map(Into::into)
    }

    fn build_layer(self: Box<Self>, index: usize) -> Result<NetworkLayer, AssemblyError> {
        let underspecified = |detail| AssemblyError::Underspecified {
            index,
            name: self.name.clone(),
            detail,
        };
        let input = self.input.ok_or_else(|| underspecified("no input neurons"))?;
        let output = self
            .output
            .ok_or_else(|| underspecified("no output neurons"))?;

        check_window_geometry(
            index,
            &self.name,
            input,
            output,
            self.config.output_extent(input.height(), input.width()),
        )?;
        if self.config.filter_count != output.depth() {
            return Err(AssemblyError::Geometry {
                index,
                name: self.name,
                detail: format!(
                    "{} filters can not produce an output of depth {}",
                    self.config.filter_count,
                    output.depth()
                ),
            });
        }

        let name = self.name;
        let layer = match self.weights {
            Some(weights) => ConvolutionalLayer::new(
                name.clone(),
                input,
                output,
                self.config,
                self.activation,
                weights,
                self.biases,
            )
            .map_err(|source| AssemblyError::Layer {
                index,
                name,
                source,
            })?,
            None => ConvolutionalLayer::with_random_weights(
                name,
                input,
                output,
                self.config,
                self.activation,
                self.initializer.unwrap_or_else(|| Box::new(XavierInit::new())),
            ),
        };
        Ok(layer.into())
    }
}

/// Recipe for a [`MaxPoolingLayer`].
pub struct MaxPoolingBuilder {
    name: String,
    input: Option<Neurons3D>,
    output: Option<Neurons3D>,
    config: PoolingConfig,
    scale_outputs: bool,
}

impl MaxPoolingBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: None,
            output: None,
            config: PoolingConfig::default(),
            scale_outputs: false,
        }
    }

    pub fn with_input_neurons(mut self, input: Neurons3D) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output_neurons(mut self, output: Neurons3D) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_config(mut self, config: PoolingConfig) -> Self {
        self.config = config;
        self
    }

    /// Multiply pooled values by the window area, as some pretrained
    /// parameter sets expect.
    pub fn with_scale_outputs(mut self) -> Self {
        self.scale_outputs = true;
        self
    }
}

impl LayerBuilder for MaxPoolingBuilder {
    fn input_neurons(&self) -> Option<Neurons> {
        self.input.map(Into::into)
    }

    fn output_neurons(&self) -> Option<Neurons> {
        self.output.map(Into::into)
    }

    fn build_layer(self: Box<Self>, index: usize) -> Result<NetworkLayer, AssemblyError> {
        let underspecified = |detail| AssemblyError::Underspecified {
            index,
            name: self.name.clone(),
            detail,
        };
        let input = self.input.ok_or_else(|| underspecified("no input neurons"))?;
        let output = self
            .output
            .ok_or_else(|| underspecified("no output neurons"))?;

        check_window_geometry(
            index,
            &self.name,
            input,
            output,
            self.config.output_extent(input.height(), input.width()),
        )?;
        if input.depth() != output.depth() {
            return Err(AssemblyError::Geometry {
                index,
                name: self.name,
                detail: format!(
                    "pooling preserves depth but input depth {} != output depth {}",
                    input.depth(),
                    output.depth()
                ),
            });
        }

        Ok(MaxPoolingLayer::new(self.name, input, output, self.config, self.scale_outputs).into())
    }
}

fn check_window_geometry(
    index: usize,
    name: &str,
    input: Neurons3D,
    output: Neurons3D,
    extent: Option<(usize, usize)>,
) -> Result<(), AssemblyError> {
    match extent {
        Some((h, w)) if (h, w) == (output.height(), output.width()) => Ok(()),
        Some((h, w)) => Err(AssemblyError::Geometry {
            index,
            name: name.into(),
            detail: format!(
                "window produces a {}x{} output but {}x{} was declared",
                h,
                w,
                output.height(),
                output.width()
            ),
        }),
        None => Err(AssemblyError::Geometry {
            index,
            name: name.into(),
            detail: format!(
                "window does not fit a {}x{} input",
                input.height(),
                input.width()
            ),
        }),
    }
}
