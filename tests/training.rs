mod common;

use common::{separable_data, small_classifier, weight_snapshots};
use layered_nn::context::NetworkContext;
use layered_nn::trainer::{Logger, MockLogger, Trainer};

struct Capture(Vec<f32>);

impl Logger for Capture {
    fn epoch_loss(&mut self, _epoch: usize, loss: f32) {
        self.0.push(loss);
    }
}

#[test]
fn zero_epochs_leave_the_weights_untouched() {
    let mut network = small_classifier();
    let before = weight_snapshots(&network);

    let (data, labels) = separable_data();
    let mut ctx = NetworkContext::with_seed(7).as_training_context();
    ctx.set_training_epochs(0);
    ctx.set_training_learning_rate(0.5);
    network.train(&data, &labels, &mut ctx).unwrap();

    assert_eq!(before, weight_snapshots(&network));
}

#[test]
fn training_reduces_the_loss() {
    let mut network = small_classifier();
    let (data, labels) = separable_data();
    let mut ctx = NetworkContext::with_seed(7).as_training_context();
    ctx.set_training_epochs(300);
    ctx.set_training_learning_rate(0.5);

    let mut trainer = Trainer::new(Capture(Vec::new()));
    trainer.train(&mut network, &data, &labels, &mut ctx).unwrap();

    let losses = &trainer.logger().0;
    assert_eq!(losses.len(), 300);
    assert!(losses[299] < losses[0]);
}

#[test]
fn training_does_not_hurt_accuracy_on_separable_data() {
    let mut network = small_classifier();
    let (data, labels) = separable_data();
    let mut ctx = NetworkContext::with_seed(7);
    let before = network
        .classification_accuracy(&data, &labels, &mut ctx)
        .unwrap();

    let mut training_ctx = ctx.as_training_context();
    training_ctx.set_training_epochs(300);
    training_ctx.set_training_learning_rate(0.5);
    network.train(&data, &labels, &mut training_ctx).unwrap();

    let after = network
        .classification_accuracy(&data, &labels, &mut ctx)
        .unwrap();
    assert!(after >= before);
}

#[test]
fn dropout_training_is_repeatable() {
    let run = || {
        let mut network = small_classifier();
        let (data, labels) = separable_data();
        let mut ctx = NetworkContext::with_seed(3).as_training_context();
        ctx.set_training_epochs(5);
        ctx.set_training_learning_rate(0.5);
        ctx.axons_context(0).with_dropout_keep_probability(0.5);
        Trainer::new(MockLogger)
            .train(&mut network, &data, &labels, &mut ctx)
            .unwrap();
        weight_snapshots(&network)
    };
    assert_eq!(run(), run());
}

#[test]
fn weight_decay_shrinks_the_weights() {
    let decayed = |lambda: f32| {
        let mut network = small_classifier();
        let (data, labels) = separable_data();
        let mut ctx = NetworkContext::with_seed(7).as_training_context();
        ctx.set_training_epochs(50);
        ctx.set_training_learning_rate(0.1);
        ctx.axons_context(0).with_regularisation_lambda(lambda);
        ctx.axons_context(1).with_regularisation_lambda(lambda);
        Trainer::new(MockLogger)
            .train(&mut network, &data, &labels, &mut ctx)
            .unwrap();
        weight_snapshots(&network)
            .iter()
            .flatten()
            .map(|w| w * w)
            .sum::<f32>()
    };
    assert!(decayed(0.05) < decayed(0.));
}
