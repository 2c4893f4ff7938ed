pub mod logger;

pub use self::logger::{LogFile, Logger, MockLogger, StdoutLogger};

use anyhow::ensure;

use crate::context::NetworkContext;
use crate::layers::Layer;
use crate::loss::Loss;
use crate::network::Network;
use crate::neurons::{NeuronsActivation, ShapeMismatch};

/// Full-batch gradient-descent training over a [`Network`].
///
/// Every epoch forward propagates the whole batch, backward propagates the
/// loss gradient through the chain and applies each layer's update with the
/// context's learning rate and that layer's weight-decay override. The loss
/// is chosen from the network's output activation, cross-entropy for a
/// softmax output and mean squared error otherwise.
pub struct Trainer<L: Logger> {
    logger: L,
}

impl<L: Logger> Trainer<L> {
    pub fn new(logger: L) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn train(
        &mut self,
        network: &mut Network,
        data: &NeuronsActivation,
        labels: &NeuronsActivation,
        ctx: &mut NetworkContext,
    ) -> anyhow::Result<()> {
        ensure!(
            ctx.is_training(),
            "training requires a training-mode context, derive one with as_training_context"
        );
        if data.example_count() != labels.example_count() {
            return Err(ShapeMismatch::Examples {
                expected: data.example_count(),
                received: labels.example_count(),
            }
            .into());
        }

        let loss = Loss::for_activation(network.output_activation());
        let learning_rate = ctx.training_learning_rate();

        for epoch in 0..ctx.training_epochs() {
            let output = network.forward_propagate(data, ctx)?;
            let epoch_loss = loss.loss(output.values(), labels.values());

            let mut grads = loss.output_delta(output.values(), labels.values());
            for layer in network.layers_mut().iter_mut().rev() {
                grads = layer.backward(grads)?;
            }
            for (index, layer) in network.layers_mut().iter_mut().enumerate() {
                layer.apply_gradients(learning_rate, ctx.axons(index).regularisation_lambda);
            }

            self.logger.epoch_loss(epoch, epoch_loss);
        }
        Ok(())
    }
}
