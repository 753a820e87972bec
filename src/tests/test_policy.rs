use ndarray::{array, Array2};
use crate::activations::Activation;
use crate::error::AurumError;
use crate::layers::{ActivationLayer, CompileOptions, Dense};
use crate::loss::LossKind;
use crate::optimizer::{OptimizerWrapper, Sgd};
use crate::policy::{Batch, LayerBuilder, Policy, PolicyConfig};

fn small_policy() -> Policy {
    Policy::build(&PolicyConfig::default(), 3, 2, Some(11)).unwrap()
}

#[test]
fn test_policy_clone_is_parameter_disjoint() {
    let original = small_policy();
    let before: Vec<_> = original.learnables().iter().map(|p| p.to_owned()).collect();

    let mut copy = original.clone();
    for mut p in copy.learnables_mut() {
        p.mapv_inplace(|w| w + 1.0);
    }

    let after: Vec<_> = original.learnables().iter().map(|p| p.to_owned()).collect();
    assert_eq!(before, after);
    assert_ne!(copy.learnables()[0], original.learnables()[0]);
}

#[test]
fn test_learnables_follow_layer_order() {
    let policy = small_policy();
    let shapes: Vec<Vec<usize>> = policy.learnables().iter().map(|p| p.shape().to_vec()).collect();
    assert_eq!(
        shapes,
        vec![vec![3, 24], vec![24], vec![24, 24], vec![24], vec![24, 2], vec![2]]
    );
}

#[test]
fn test_fwd_produces_one_value_per_action() {
    let mut policy = small_policy();
    let q = policy.fwd(array![0.1, 0.2, 0.3].view()).unwrap();
    assert_eq!(q.len(), 2);
    assert_eq!(policy.output_size(), Some(2));
}

#[test]
fn test_fwd_rejects_wrong_state_width() {
    let mut policy = small_policy();
    assert!(matches!(
        policy.fwd(array![0.1, 0.2].view()),
        Err(AurumError::Shape { .. })
    ));
}

#[test]
fn test_empty_policy_cannot_run() {
    let mut policy = Policy::new(&PolicyConfig::default());
    assert!(policy.compile(&[2], &CompileOptions::default()).is_err());
    assert!(matches!(
        policy.fwd(array![1.0, 2.0].view()),
        Err(AurumError::NotCompiled { .. })
    ));
}

#[test]
fn test_learn_on_empty_batch() {
    let mut policy = small_policy();
    let batch = Batch::new(Array2::zeros((0, 3)), Array2::zeros((0, 2))).unwrap();
    assert!(matches!(policy.learn(&batch), Err(AurumError::EmptyBatch)));
}

#[test]
fn test_uncompiled_layer_error_propagates_from_learn() {
    let mut policy = Policy::new(&PolicyConfig::default()).with_layer(Dense::new(2, Activation::linear()));
    let batch = Batch::new(array![[1.0, 2.0]], array![[0.0, 0.0]]).unwrap();
    assert!(matches!(policy.learn(&batch), Err(AurumError::NotCompiled { .. })));
}

#[test]
fn test_hand_built_policy_with_softmax_head() {
    let config = PolicyConfig {
        loss: LossKind::CrossEntropy,
        optimizer: OptimizerWrapper::Sgd(Sgd::new(0.5)),
        ..PolicyConfig::default()
    };
    let mut policy = Policy::new(&config)
        .with_layer(Dense::new(3, Activation::linear()))
        .with_layer(ActivationLayer::new(Activation::softmax(&[1])));
    policy.compile(&[2], &CompileOptions::default().with_seed(2)).unwrap();

    let batch = Batch::new(array![[1.0, 0.0], [0.0, 1.0]], array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]).unwrap();
    let first = policy.learn(&batch).unwrap();
    let mut last = first;
    for _ in 0..50 {
        last = policy.learn(&batch).unwrap();
    }
    assert!(last < first);

    let probs = policy.fwd(array![1.0, 0.0].view()).unwrap();
    assert!((probs.sum() - 1.0).abs() < 1e-5);
}

#[test]
fn test_layer_builder_without_hidden_layers_is_single_dense() {
    let builder = LayerBuilder::FullyConnected {
        hidden: vec![],
        hidden_activation: Activation::relu(),
        output_activation: Activation::linear(),
    };
    let layers = builder.build(4);
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].kind(), "dense");
}
