use ndarray::{array, ArrayD, IxDyn};
use crate::activations::{Activation, DEFAULT_LEAKY_ALPHA};
use crate::error::AurumError;

fn zeros(shape: &[usize]) -> ArrayD<f32> {
    ArrayD::zeros(IxDyn(shape))
}

#[test]
fn test_zero_input_fixed_points() {
    let x = zeros(&[3, 4]);
    let cases = [
        (Activation::sigmoid(), 0.5),
        (Activation::tanh(), 0.0),
        (Activation::relu(), 0.0),
        (Activation::default_leaky_relu(), 0.0),
        (Activation::linear(), 0.0),
    ];
    for (activation, expected) in cases {
        let y = activation.fwd(x.view()).unwrap();
        assert_eq!(y.shape(), x.shape());
        assert!(y.iter().all(|&v| (v - expected).abs() < 1e-6), "{}", activation.name());
    }
}

#[test]
fn test_softmax_of_zeros_is_uniform_over_axes() {
    let y = Activation::softmax(&[1]).fwd(zeros(&[2, 4]).view()).unwrap();
    assert!(y.iter().all(|&v| (v - 0.25).abs() < 1e-6));

    let y = Activation::softmax(&[1, 2]).fwd(zeros(&[2, 2, 3]).view()).unwrap();
    assert!(y.iter().all(|&v| (v - 1.0 / 6.0).abs() < 1e-6));
}

#[test]
fn test_softmax_is_stable_for_large_inputs() {
    let x = array![[1000.0f32, 1000.0], [-1000.0, 0.0]].into_dyn();
    let y = Activation::softmax(&[1]).fwd(x.view()).unwrap();
    assert!(y.iter().all(|v| v.is_finite()));
    assert!((y[[0, 0]] - 0.5).abs() < 1e-6);
    assert!((y[[1, 1]] - 1.0).abs() < 1e-6);
}

#[test]
fn test_softmax_rejects_bad_axis_sets() {
    let x = zeros(&[2, 3]);
    assert!(matches!(Activation::softmax(&[]).fwd(x.view()), Err(AurumError::Shape { .. })));
    assert!(matches!(Activation::softmax(&[2]).fwd(x.view()), Err(AurumError::Shape { .. })));
    assert!(matches!(Activation::softmax(&[1, 1]).fwd(x.view()), Err(AurumError::Shape { .. })));
    assert!(Activation::softmax(&[1]).compile(1).is_err());
}

#[test]
fn test_leaky_relu_scales_negatives() {
    let x = array![-2.0f32, 0.0, 3.0].into_dyn();
    let y = Activation::leaky_relu(0.1).fwd(x.view()).unwrap();
    assert_eq!(y, array![-0.2f32, 0.0, 3.0].into_dyn());
    assert_eq!(Activation::default_leaky_relu(), Activation::leaky_relu(DEFAULT_LEAKY_ALPHA));
}

#[test]
fn test_clone_preserves_parameters() {
    let leaky = Activation::leaky_relu(0.3);
    let softmax = Activation::softmax(&[1, 2]);
    assert_eq!(leaky.clone(), leaky);
    assert_eq!(softmax.clone(), softmax);
    assert!(softmax.learnables().is_empty());
}

#[test]
fn test_factories_return_independent_values() {
    let mut a = Activation::leaky_relu(0.2);
    let b = Activation::leaky_relu(0.2);
    if let Activation::LeakyRelu { alpha } = &mut a {
        *alpha = 0.5;
    }
    assert_eq!(b, Activation::leaky_relu(0.2));
}

#[test]
fn test_relu_backward_masks_negative_inputs() {
    let relu = Activation::relu();
    let x = array![-1.0f32, 2.0].into_dyn();
    let y = relu.fwd(x.view()).unwrap();
    let g = array![5.0f32, 5.0].into_dyn();
    let dx = relu.backward(x.view(), y.view(), g.view()).unwrap();
    assert_eq!(dx, array![0.0f32, 5.0].into_dyn());
}
