//! Kernel parity tests - verify the SIMD dense path and the portable loop agree.
//!
//! The detected kernel is compared against a layer forced to
//! `DenseKernel::Portable`. On machines without SIMD both sides take the
//! portable path and the comparison is trivially exact.

use ff_nn::{Activation, Dense, DenseKernel, Flatten, Layer, Model};
use ff_tensor::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TOLERANCE: f32 = 1e-4;

fn assert_tensors_close(portable: &Tensor<f32>, fast: &Tensor<f32>, name: &str) {
    assert_eq!(portable.dims(), fast.dims(), "{name}: shape mismatch");
    for (i, (p, f)) in portable.as_slice().iter().zip(fast.as_slice()).enumerate() {
        let diff = (p - f).abs();
        assert!(
            diff < TOLERANCE * p.abs().max(1.0),
            "{name}[{i}]: portable={p}, fast={f}, diff={diff}"
        );
    }
}

fn random_tensor(rng: &mut StdRng, shape: &[usize]) -> Tensor<f32> {
    let n: usize = shape.iter().product();
    let data = (0..n).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    Tensor::from_vec(data, shape).unwrap()
}

fn dense_pair(rng: &mut StdRng, input_units: usize, output_units: usize) -> (Dense<f32>, Dense<f32>) {
    let kernel = random_tensor(rng, &[input_units, output_units]);
    let bias = random_tensor(rng, &[output_units]);
    let fast = Dense::new(&kernel, &bias).unwrap();
    let portable = fast.clone().with_kernel(DenseKernel::Portable);
    (portable, fast)
}

// ============================================================================
// Dense layer
// ============================================================================

#[test]
fn test_dense_parity_across_sizes() {
    let mut rng = StdRng::seed_from_u64(42);
    let sizes = [(1, 1, 1), (2, 3, 4), (8, 7, 5), (4, 32, 16), (3, 33, 10), (16, 784, 128)];

    for (batch, input_units, output_units) in sizes {
        let (portable, fast) = dense_pair(&mut rng, input_units, output_units);
        let x = random_tensor(&mut rng, &[batch, input_units]);
        assert_tensors_close(
            &portable.apply(&x).unwrap(),
            &fast.apply(&x).unwrap(),
            &format!("dense {batch}x{input_units}->{output_units}"),
        );
    }
}

#[test]
fn test_dense_parity_rank_three_input() {
    let mut rng = StdRng::seed_from_u64(7);
    let (portable, fast) = dense_pair(&mut rng, 20, 9);
    let x = random_tensor(&mut rng, &[3, 4, 20]);
    let expected = portable.apply(&x).unwrap();
    assert_eq!(expected.dims(), &[3, 4, 9]);
    assert_tensors_close(&expected, &fast.apply(&x).unwrap(), "dense rank 3");
}

#[test]
fn test_dense_parity_on_views() {
    let mut rng = StdRng::seed_from_u64(3);
    let (portable, fast) = dense_pair(&mut rng, 12, 6);
    let x = random_tensor(&mut rng, &[10, 12]);
    let view = x.slice(2, 7).unwrap();
    assert_tensors_close(
        &portable.apply(&view).unwrap(),
        &fast.apply(&view).unwrap(),
        "dense on slice",
    );
}

// ============================================================================
// Whole model
// ============================================================================

fn mlp(layers: &[(Dense<f32>, Activation<f32>)]) -> Model<f32> {
    let mut model = Model::new(1);
    let mut last = model.add_layer(Flatten, None).unwrap();
    for (dense, activation) in layers {
        last = model
            .add_layers(
                [Layer::from(dense.clone()), Layer::from(activation.clone())],
                Some(last),
            )
            .unwrap();
    }
    model.set_output(last, 0).unwrap();
    model
}

#[test]
fn test_model_parity() {
    let mut rng = StdRng::seed_from_u64(1234);
    let (p1, f1) = dense_pair(&mut rng, 64, 32);
    let (p2, f2) = dense_pair(&mut rng, 32, 10);

    let portable = mlp(&[(p1, Activation::relu()), (p2, Activation::softmax(-1))]);
    let fast = mlp(&[(f1, Activation::relu()), (f2, Activation::softmax(-1))]);

    let x = random_tensor(&mut rng, &[6, 8, 8]);
    let expected = portable.predict(&x).unwrap();
    let actual = fast.predict(&x).unwrap();
    assert_tensors_close(&expected[0], &actual[0], "mlp");

    for row in 0..6 {
        let sum: f32 = expected[0].sub(row).unwrap().as_slice().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}
