mod common;

use common::batch;
use layered_nn::a_funcs::Activation;
use layered_nn::context::NetworkContext;
use layered_nn::initializer::WeightInit;
use layered_nn::network::{FullyConnectedBuilder, Network, NetworkBuilder};
use layered_nn::neurons::{Neurons, ShapeMismatch};

/// A network whose single layer passes its input straight through.
fn identity_network(size: usize) -> Network {
    let mut values = vec![0.; size * size];
    for i in 0..size {
        values[i * size + i] = 1.;
    }
    NetworkBuilder::new("identity")
        .layer(
            FullyConnectedBuilder::new("only")
                .with_input_neurons(Neurons::new(size, false))
                .with_output_neurons(Neurons::new(size, false))
                .with_activation_function(Activation::Identity)
                .with_initializer(WeightInit::new(values)),
        )
        .build()
        .unwrap()
}

// `batch` is feature-major: each group of `examples` consecutive values is
// one feature row, so examples read column-wise across the groups.

#[test]
fn all_correct_predictions_score_one_hundred() {
    let mut network = identity_network(3);
    // examples (0.9, 0.1, 0.0) and (0.2, 0.7, 0.1), arg-maxes 0 and 1
    let data = batch(
        vec![
            0.9, 0.2, // feature 0
            0.1, 0.7, // feature 1
            0.0, 0.1, // feature 2
        ],
        3,
    );
    let labels = batch(
        vec![
            1., 0., //
            0., 1., //
            0., 0., //
        ],
        3,
    );
    let accuracy = network
        .classification_accuracy(&data, &labels, &mut NetworkContext::new())
        .unwrap();
    assert_eq!(accuracy, 100.);
}

#[test]
fn all_wrong_predictions_score_zero() {
    let mut network = identity_network(3);
    // arg-maxes 0 and 1, labelled 2 and 0
    let data = batch(
        vec![
            0.9, 0.2, //
            0.1, 0.7, //
            0.0, 0.1, //
        ],
        3,
    );
    let labels = batch(
        vec![
            0., 1., //
            0., 0., //
            1., 0., //
        ],
        3,
    );
    let accuracy = network
        .classification_accuracy(&data, &labels, &mut NetworkContext::new())
        .unwrap();
    assert_eq!(accuracy, 0.);
}

#[test]
fn a_mixed_batch_scores_its_fraction() {
    let mut network = identity_network(2);
    // arg-maxes 0, 1, 0, 1; the last label disagrees
    let data = batch(
        vec![
            0.9, 0.1, 0.8, 0.3, //
            0.1, 0.9, 0.2, 0.7, //
        ],
        2,
    );
    let labels = batch(
        vec![
            1., 0., 1., 1., //
            0., 1., 0., 0., //
        ],
        2,
    );
    let accuracy = network
        .classification_accuracy(&data, &labels, &mut NetworkContext::new())
        .unwrap();
    assert_eq!(accuracy, 75.);
}

#[test]
fn misaligned_example_counts_are_rejected() {
    let mut network = identity_network(2);
    let data = batch(vec![0.9, 0.1, 0.1, 0.9], 2);
    let labels = batch(vec![1., 0.], 2);
    let result = network.classification_accuracy(&data, &labels, &mut NetworkContext::new());
    assert!(matches!(result, Err(ShapeMismatch::Examples { .. })));
}
