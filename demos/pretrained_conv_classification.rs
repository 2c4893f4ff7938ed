//! Assembles a five layer convolutional network from pretrained parameter
//! blobs and classifies a held-out MNIST extract with it.
//!
//! Expects two files relative to the working directory:
//! - `data/trainisfirst1000_testisnext1000.csv`: a header line followed by
//!   2000 rows of the standard `mnist_train.csv` export (label column, then
//!   784 pixel columns); rows 1001 through 2000 are the evaluation slice.
//! - `data/pretrained_conv_weights.json`: a [`WeightStore`] JSON object
//!   mapping `layer{N}Weights`/`layer{N}Biases` to flat row-major arrays,
//!   with the shapes declared in [`pretrained_network`]. One can be exported
//!   from an existing parameter set with [`WeightStore::save`].

use anyhow::Context;
use layered_nn::a_funcs::Activation;
use layered_nn::axons::{BiasFormat, WeightsFormat};
use layered_nn::context::NetworkContext;
use layered_nn::data::{
    load_matrix_from_csv, to_neurons_activation, PixelFeaturesExtractor, SingleDigitLabelExtractor,
};
use layered_nn::helpers::column_argmaxs;
use layered_nn::layers::{ConvolutionConfig, PoolingConfig};
use layered_nn::network::{
    ConvolutionalBuilder, FullyConnectedBuilder, MaxPoolingBuilder, Network, NetworkBuilder,
};
use layered_nn::neurons::{ActivationFormat, Neurons, Neurons3D};
use layered_nn::storage::WeightStore;

const DATA: &str = "data/trainisfirst1000_testisnext1000.csv";
const WEIGHTS: &str = "data/pretrained_conv_weights.json";

fn pretrained_network(store: &WeightStore) -> anyhow::Result<Network> {
    let network = NetworkBuilder::new("pretrained_conv_mnist")
        .layer(
            ConvolutionalBuilder::new("conv1")
                .with_input_neurons(Neurons3D::new(28, 28, 1, true))
                .with_output_neurons(Neurons3D::new(20, 20, 6, false))
                .with_config(
                    ConvolutionConfig::default()
                        .with_filter_height(9)
                        .with_filter_width(9)
                        .with_filter_count(6),
                )
                .with_activation_function(Activation::Sigmoid)
                .with_weights_matrix(store.layer_weights(
                    1,
                    6,
                    81,
                    WeightsFormat::convolutional(1, 9, 9, 6),
                )?)
                .with_bias_vector(store.layer_biases(1, 6, BiasFormat::output_depth_column())?),
        )
        .layer(
            MaxPoolingBuilder::new("pool2")
                .with_input_neurons(Neurons3D::new(20, 20, 6, false))
                .with_output_neurons(Neurons3D::new(10, 10, 6, false))
                .with_config(
                    PoolingConfig::default()
                        .with_filter_height(2)
                        .with_filter_width(2)
                        .with_stride_height(2)
                        .with_stride_width(2),
                )
                .with_scale_outputs(),
        )
        .layer(
            FullyConnectedBuilder::new("dense3")
                .with_input_neurons(Neurons::new(600, true))
                .with_output_neurons(Neurons::new(400, false))
                .with_activation_function(Activation::Sigmoid)
                .with_weights_matrix(store.layer_weights(
                    3,
                    400,
                    600,
                    WeightsFormat::fully_connected(600, 400),
                )?)
                .with_bias_vector(store.layer_biases(3, 400, BiasFormat::default_bias_format())?),
        )
        .layer(
            FullyConnectedBuilder::new("dense4")
                .with_input_neurons(Neurons::new(400, true))
                .with_output_neurons(Neurons::new(100, false))
                .with_activation_function(Activation::Sigmoid)
                .with_weights_matrix(store.layer_weights(
                    4,
                    100,
                    400,
                    WeightsFormat::fully_connected(400, 100),
                )?)
                .with_bias_vector(store.layer_biases(4, 100, BiasFormat::default_bias_format())?),
        )
        .layer(
            FullyConnectedBuilder::new("dense5")
                .with_input_neurons(Neurons::new(100, true))
                .with_output_neurons(Neurons::new(10, false))
                .with_activation_function(Activation::Softmax)
                .with_weights_matrix(store.layer_weights(
                    5,
                    10,
                    100,
                    WeightsFormat::fully_connected(100, 10),
                )?)
                .with_bias_vector(store.layer_biases(5, 10, BiasFormat::default_bias_format())?),
        )
        .build()?;
    Ok(network)
}

fn main() -> anyhow::Result<()> {
    let store = WeightStore::from_file(WEIGHTS)
        .with_context(|| format!("Failed to load pretrained parameters from {}", WEIGHTS))?;
    let mut network = pretrained_network(&store)?;

    // lines [1001, 2001) are the held-out extract; line 0 is the header
    let pixels = load_matrix_from_csv(DATA, &PixelFeaturesExtractor, 1001, 2001)?;
    let test_data = to_neurons_activation(
        pixels,
        Neurons::new(784, false),
        ActivationFormat::default_image_format(),
    )?;
    let digits = load_matrix_from_csv(DATA, &SingleDigitLabelExtractor, 1001, 2001)?;
    let test_labels = to_neurons_activation(
        digits,
        Neurons::new(10, false),
        ActivationFormat::rows_span_feature_set(),
    )?;

    let mut ctx = NetworkContext::new();
    let accuracy = network.classification_accuracy(&test_data, &test_labels, &mut ctx)?;
    println!("test set accuracy: {}%", accuracy);

    let output = network.forward_propagate(&test_data, &mut ctx)?;
    let predicted = column_argmaxs(output.values());
    let actual = column_argmaxs(test_labels.values());
    for example in 0..100 {
        println!(
            "example {}: predicted {} actual {}",
            example, predicted[example], actual[example]
        );
    }
    Ok(())
}
