mod common;

use layered_nn::a_funcs::Activation;
use layered_nn::axons::{BiasFormat, WeightsFormat};
use layered_nn::context::NetworkContext;
use layered_nn::initializer::XavierInit;
use layered_nn::layers::{ConvolutionConfig, PoolingConfig};
use layered_nn::network::{
    ConvolutionalBuilder, FullyConnectedBuilder, MaxPoolingBuilder, NetworkBuilder,
};
use layered_nn::neurons::{ActivationFormat, Neurons, Neurons3D, NeuronsActivation};
use layered_nn::storage::WeightStore;
use ndarray::Array2;

fn image_batch(examples: usize) -> NeuronsActivation {
    NeuronsActivation::new(
        Array2::from_shape_fn((36, examples), |(i, e)| (i + e) as f32 / 36.),
        Neurons::new(36, false),
        ActivationFormat::default_image_format(),
    )
    .unwrap()
}

#[test]
fn a_conv_pool_dense_chain_produces_a_distribution() {
    let mut network = NetworkBuilder::new("conv_chain")
        .layer(
            ConvolutionalBuilder::new("conv")
                .with_input_neurons(Neurons3D::new(6, 6, 1, true))
                .with_output_neurons(Neurons3D::new(4, 4, 2, false))
                .with_config(
                    ConvolutionConfig::default()
                        .with_filter_height(3)
                        .with_filter_width(3)
                        .with_filter_count(2),
                )
                .with_activation_function(Activation::Sigmoid)
                .with_initializer(XavierInit::seeded(1)),
        )
        .layer(
            MaxPoolingBuilder::new("pool")
                .with_input_neurons(Neurons3D::new(4, 4, 2, false))
                .with_output_neurons(Neurons3D::new(2, 2, 2, false))
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
            FullyConnectedBuilder::new("dense")
                .with_input_neurons(Neurons::new(8, true))
                .with_output_neurons(Neurons::new(3, false))
                .with_activation_function(Activation::Softmax)
                .with_initializer(XavierInit::seeded(2)),
        )
        .build()
        .unwrap();

    let output = network
        .forward_propagate(&image_batch(2), &mut NetworkContext::new())
        .unwrap();
    assert_eq!(output.feature_count(), 3);
    assert_eq!(output.example_count(), 2);
    for column in output.values().columns() {
        let sum: f32 = column.sum();
        assert!((sum - 1.).abs() < 1e-5);
        assert!(column.iter().all(|&v| v >= 0.));
    }
}

#[test]
fn a_chain_assembles_from_stored_parameters() {
    let mut store = WeightStore::new();
    store.insert("layer1Weights", vec![0.1; 2 * 9]);
    store.insert("layer1Biases", vec![0.; 2]);
    store.insert("layer3Weights", vec![0.05; 3 * 8]);
    store.insert("layer3Biases", vec![0.; 3]);

    let mut network = NetworkBuilder::new("stored_chain")
        .layer(
            ConvolutionalBuilder::new("conv")
                .with_input_neurons(Neurons3D::new(6, 6, 1, true))
                .with_output_neurons(Neurons3D::new(4, 4, 2, false))
                .with_config(
                    ConvolutionConfig::default()
                        .with_filter_height(3)
                        .with_filter_width(3)
                        .with_filter_count(2),
                )
                .with_activation_function(Activation::Sigmoid)
                .with_weights_matrix(
                    store
                        .layer_weights(1, 2, 9, WeightsFormat::convolutional(1, 3, 3, 2))
                        .unwrap(),
                )
                .with_bias_vector(
                    store
                        .layer_biases(1, 2, BiasFormat::output_depth_column())
                        .unwrap(),
                ),
        )
        .layer(
            MaxPoolingBuilder::new("pool")
                .with_input_neurons(Neurons3D::new(4, 4, 2, false))
                .with_output_neurons(Neurons3D::new(2, 2, 2, false))
                .with_config(
                    PoolingConfig::default()
                        .with_filter_height(2)
                        .with_filter_width(2)
                        .with_stride_height(2)
                        .with_stride_width(2),
                ),
        )
        .layer(
            FullyConnectedBuilder::new("dense")
                .with_input_neurons(Neurons::new(8, true))
                .with_output_neurons(Neurons::new(3, false))
                .with_activation_function(Activation::Softmax)
                .with_weights_matrix(
                    store
                        .layer_weights(3, 3, 8, WeightsFormat::fully_connected(8, 3))
                        .unwrap(),
                )
                .with_bias_vector(
                    store
                        .layer_biases(3, 3, BiasFormat::default_bias_format())
                        .unwrap(),
                ),
        )
        .build()
        .unwrap();

    // identical filters and uniform weights make every output unit equal
    let output = network
        .forward_propagate(&image_batch(1), &mut NetworkContext::new())
        .unwrap();
    let first = output.values()[[0, 0]];
    assert!(output.values().iter().all(|v| (v - first).abs() < 1e-6));
}
