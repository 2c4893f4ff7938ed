pub mod construction;

pub use self::construction::{
    AssemblyError, ConvolutionalBuilder, FullyConnectedBuilder, LayerBuilder, MaxPoolingBuilder,
    NetworkBuilder,
};

use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::a_funcs::Activation;
use crate::context::NetworkContext;
use crate::helpers::column_argmaxs;
use crate::layers::{Layer, NetworkLayer};
use crate::neurons::{Neurons, NeuronsActivation, ShapeMismatch};
use crate::trainer::{MockLogger, Trainer};

/// A feed-forward layer chain. The chain invariant, every layer's output
/// shape feeding the next layer's input shape, is checked on construction
/// and re-checked when a network is deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "NetworkUnvalidated", into = "NetworkUnvalidated")]
pub struct Network {
    name: String,
    layers: Vec<NetworkLayer>,
}

impl Network {
    pub fn new(name: impl Into<String>, layers: Vec<NetworkLayer>) -> Result<Self, AssemblyError> {
        if layers.is_empty() {
            return Err(AssemblyError::Empty);
        }
        for (index, pair) in layers.windows(2).enumerate() {
            let received = pair[0].output_neurons();
            let expected = pair[1].input_neurons();
            if !received.is_compatible_with(&expected) {
                return Err(AssemblyError::Incompatible {
                    index: index + 1,
                    received,
                    expected,
                });
            }
        }
        Ok(Self {
            name: name.into(),
            layers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layers(&self) -> &[NetworkLayer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&NetworkLayer> {
        self.layers.get(index)
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [NetworkLayer] {
        &mut self.layers
    }

    pub fn input_neurons(&self) -> Neurons {
        self.layers[0].input_neurons()
    }

    pub fn output_neurons(&self) -> Neurons {
        self.layers[self.layers.len() - 1].output_neurons()
    }

    /// The activation applied by the final layer, if it has one.
    pub fn output_activation(&self) -> Option<Activation> {
        self.layers[self.layers.len() - 1].activation()
    }

    /// Total learned parameter count over all layers.
    pub fn weight_count(&self) -> usize {
        self.layers.iter().map(|l| l.weight_count()).sum()
    }

    /// Evaluate the whole chain for a batch of examples. In a training-mode
    /// context every layer records what its backward pass will need.
    pub fn forward_propagate(
        &mut self,
        input: &NeuronsActivation,
        ctx: &mut NetworkContext,
    ) -> Result<NeuronsActivation, ShapeMismatch> {
        let mut current = input.clone();
        for (index, layer) in self.layers.iter_mut().enumerate() {
            current = layer.forward(&current, &mut ctx.layer_context(index))?;
        }
        Ok(current)
    }

    /// Percentage of examples whose highest-valued output unit matches the
    /// highest-valued label unit.
    pub fn classification_accuracy(
        &mut self,
        data: &NeuronsActivation,
        labels: &NeuronsActivation,
        ctx: &mut NetworkContext,
    ) -> Result<f32, ShapeMismatch> {
        if data.example_count() != labels.example_count() {
            return Err(ShapeMismatch::Examples {
                expected: data.example_count(),
                received: labels.example_count(),
            });
        }
        let output = self.forward_propagate(data, ctx)?;
        let predicted = column_argmaxs(output.values());
        let target = column_argmaxs(labels.values());
        let correct = predicted
            .iter()
            .zip(target.iter())
            .filter(|(p, t)| p == t)
            .count();
        Ok(correct as f32 / data.example_count() as f32 * 100.)
    }

    /// Train the network in place over the context's configured epoch count,
    /// without progress reporting. Use a [`Trainer`] directly to observe the
    /// per-epoch loss.
    pub fn train(
        &mut self,
        data: &NeuronsActivation,
        labels: &NeuronsActivation,
        ctx: &mut NetworkContext,
    ) -> anyhow::Result<()> {
        Trainer::new(MockLogger).train(self, data, labels, ctx)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create network file {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to serialize network '{}'", self.name))?;
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open network file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to deserialize network from {}", path.display()))
    }
}

/// The raw serialized form of a [`Network`], before the chain invariant has
/// been re-established.
#[derive(Serialize, Deserialize)]
struct NetworkUnvalidated {
    name: String,
    layers: Vec<NetworkLayer>,
}

impl TryFrom<NetworkUnvalidated> for Network {
    type Error = AssemblyError;

    fn try_from(value: NetworkUnvalidated) -> Result<Self, Self::Error> {
        Network::new(value.name, value.layers)
    }
}

impl From<Network> for NetworkUnvalidated {
    fn from(value: Network) -> Self {
        Self {
            name: value.name,
            layers: value.layers,
        }
    }
}
