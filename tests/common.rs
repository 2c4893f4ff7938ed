#![allow(dead_code)]

use layered_nn::a_funcs::Activation;
use layered_nn::initializer::XavierInit;
use layered_nn::network::{FullyConnectedBuilder, Network, NetworkBuilder};
use layered_nn::neurons::{ActivationFormat, Neurons, NeuronsActivation};
use ndarray::Array2;

/// Compares two slices with the given error tolerance. Panics with a
/// diagnostic if they differ or contain a NaN.
pub fn check(expected: &[f32], output: &[f32], tolerance: f32, id: &str) {
    assert_eq!(expected.len(), output.len(), "length mismatch for {}", id);
    for (e, o) in expected.iter().zip(output) {
        if !(f32::abs(e - o) < tolerance) {
            panic!(
                "Evaluation produced incorrect {}.\nexpected: {:?}\nreceived: {:?}",
                id, expected, output
            );
        }
    }
}

/// A feature-major activation batch from a flat feature-major value list.
pub fn batch(values: Vec<f32>, features: usize) -> NeuronsActivation {
    let examples = values.len() / features;
    NeuronsActivation::new(
        Array2::from_shape_vec((features, examples), values).unwrap(),
        Neurons::new(features, false),
        ActivationFormat::rows_span_feature_set(),
    )
    .unwrap()
}

/// Two linearly separable clusters in two dimensions, feature-major.
pub fn separable_data() -> (NeuronsActivation, NeuronsActivation) {
    let data = batch(
        vec![
            0.0, 0.1, 0.2, 0.9, 1.0, 0.8, // feature 0
            0.1, 0.0, 0.1, 1.0, 0.9, 0.8, // feature 1
        ],
        2,
    );
    let labels = batch(
        vec![
            1., 1., 1., 0., 0., 0., // class 0
            0., 0., 0., 1., 1., 1., // class 1
        ],
        2,
    );
    (data, labels)
}

/// A small seeded two layer classifier over two features and two classes.
pub fn small_classifier() -> Network {
    NetworkBuilder::new("classifier")
        .layer(
            FullyConnectedBuilder::new("hidden")
                .with_input_neurons(Neurons::new(2, true))
                .with_output_neurons(Neurons::new(4, false))
                .with_activation_function(Activation::Sigmoid)
                .with_initializer(XavierInit::seeded(1)),
        )
        .layer(
            FullyConnectedBuilder::new("output")
                .with_input_neurons(Neurons::new(4, true))
                .with_output_neurons(Neurons::new(2, false))
                .with_activation_function(Activation::Softmax)
                .with_initializer(XavierInit::seeded(2)),
        )
        .build()
        .unwrap()
}

/// Row-major snapshots of every parameter tensor in the network.
pub fn weight_snapshots(network: &Network) -> Vec<Vec<f32>> {
    use layered_nn::layers::NetworkLayer;

    network
        .layers()
        .iter()
        .flat_map(|layer| match layer {
            NetworkLayer::FullyConnected(l) => {
                let mut tensors = vec![l.weights().to_row_major()];
                if let Some(b) = l.biases() {
                    tensors.push(b.to_row_major());
                }
                tensors
            }
            NetworkLayer::Convolutional(l) => {
                let mut tensors = vec![l.weights().to_row_major()];
                if let Some(b) = l.biases() {
                    tensors.push(b.to_row_major());
                }
                tensors
            }
            NetworkLayer::MaxPooling(_) => Vec::new(),
        })
        .collect()
}
