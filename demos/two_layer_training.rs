//! Trains a two layer perceptron on a small MNIST extract and reports its
//! accuracy on a held-out range of the same file.
//!
//! Expects `data/trainisfirst1000_testisnext1000.csv` relative to the
//! working directory: a header line followed by 2000 rows of the standard
//! `mnist_train.csv` export (label column, then 784 pixel columns in
//! `0..=255`). Any 2000-row slice of the Kaggle/LeCun MNIST CSV works; the
//! first 1000 data rows are trained on, the next 1000 held out.

use anyhow::Context;
use layered_nn::a_funcs::Activation;
use layered_nn::context::NetworkContext;
use layered_nn::data::{
    load_matrix_from_csv, to_neurons_activation, PixelFeaturesExtractor, SingleDigitLabelExtractor,
};
use layered_nn::helpers::column_argmaxs;
use layered_nn::initializer::XavierInit;
use layered_nn::network::{FullyConnectedBuilder, NetworkBuilder};
use layered_nn::neurons::{ActivationFormat, Neurons, NeuronsActivation};
use layered_nn::trainer::{StdoutLogger, Trainer};

const DATA: &str = "data/trainisfirst1000_testisnext1000.csv";

fn features(start: usize, end: usize) -> anyhow::Result<NeuronsActivation> {
    let matrix = load_matrix_from_csv(DATA, &PixelFeaturesExtractor, start, end)
        .with_context(|| format!("Failed to load pixels from {}", DATA))?;
    Ok(to_neurons_activation(
        matrix,
        Neurons::new(784, false),
        ActivationFormat::default_image_format(),
    )?)
}

fn labels(start: usize, end: usize) -> anyhow::Result<NeuronsActivation> {
    let matrix = load_matrix_from_csv(DATA, &SingleDigitLabelExtractor, start, end)
        .with_context(|| format!("Failed to load labels from {}", DATA))?;
    Ok(to_neurons_activation(
        matrix,
        Neurons::new(10, false),
        ActivationFormat::rows_span_feature_set(),
    )?)
}

fn main() -> anyhow::Result<()> {
    // lines [1, 1001) train, [1001, 2001) test; line 0 is the header
    let train_data = features(1, 1001)?;
    let train_labels = labels(1, 1001)?;
    let test_data = features(1001, 2001)?;
    let test_labels = labels(1001, 2001)?;

    let mut network = NetworkBuilder::new("two_layer_mnist")
        .layer(
            FullyConnectedBuilder::new("hidden")
                .with_input_neurons(Neurons::new(784, true))
                .with_output_neurons(Neurons::new(400, false))
                .with_activation_function(Activation::Sigmoid)
                .with_initializer(XavierInit::seeded(1)),
        )
        .layer(
            FullyConnectedBuilder::new("output")
                .with_input_neurons(Neurons::new(400, true))
                .with_output_neurons(Neurons::new(10, false))
                .with_activation_function(Activation::Softmax)
                .with_initializer(XavierInit::seeded(2)),
        )
        .build()?;

    let mut ctx = NetworkContext::with_seed(42);
    ctx.set_training_epochs(400);
    ctx.set_training_learning_rate(0.1);

    let baseline = network.classification_accuracy(&train_data, &train_labels, &mut ctx)?;
    println!("pre-training training set accuracy: {}%", baseline);

    let mut training_ctx = ctx.as_training_context();
    training_ctx
        .axons_context(1)
        .with_dropout_keep_probability(0.8)
        .with_regularisation_lambda(0.);

    Trainer::new(StdoutLogger::new(50)).train(
        &mut network,
        &train_data,
        &train_labels,
        &mut training_ctx,
    )?;

    let train_accuracy = network.classification_accuracy(&train_data, &train_labels, &mut ctx)?;
    let test_accuracy = network.classification_accuracy(&test_data, &test_labels, &mut ctx)?;
    println!("training set accuracy: {}%", train_accuracy);
    println!("test set accuracy: {}%", test_accuracy);

    let output = network.forward_propagate(&test_data, &mut ctx)?;
    let predicted = column_argmaxs(output.values());
    let actual = column_argmaxs(test_labels.values());
    for example in 0..20 {
        println!(
            "example {}: predicted {} actual {}",
            example, predicted[example], actual[example]
        );
    }

    network.save("two_layer_mnist.json")?;
    Ok(())
}
