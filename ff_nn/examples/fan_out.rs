//! Branching model example.
//!
//! One shared hidden layer feeds two heads: a softmax classifier and a
//! sigmoid score.

use ff_nn::{Activation, Dense, DenseKernel, Layer, Model};
use ff_tensor::prelude::*;

fn dense(input_units: usize, output_units: usize, scale: f32) -> Dense<f32> {
    let kernel: Vec<f32> = (0..input_units * output_units)
        .map(|i| ((i as f32) * scale).sin())
        .collect();
    let kernel = Tensor::from_vec(kernel, [input_units, output_units]).unwrap();
    Dense::new(&kernel, &Tensor::zeros([output_units])).unwrap()
}

fn main() {
    println!("Dense kernel: {}\n", DenseKernel::detect());

    let mut model = Model::new(2);
    let hidden = model
        .add_layers(
            [Layer::from(dense(4, 8, 0.3)), Activation::relu().into()],
            None,
        )
        .unwrap();
    let classes = model
        .add_layers(
            [Layer::from(dense(8, 3, 0.7)), Activation::softmax(-1).into()],
            Some(hidden),
        )
        .unwrap();
    let score = model
        .add_layers(
            [Layer::from(dense(8, 1, 1.1)), Activation::Sigmoid.into()],
            Some(hidden),
        )
        .unwrap();
    model.set_output(classes, 0).unwrap();
    model.set_output(score, 1).unwrap();

    println!("{model}");

    let batch = Tensor::from_vec(
        vec![
            0.1, 0.2, 0.3, 0.4, //
            1.0, 0.0, -1.0, 0.5, //
            -0.5, 0.25, 0.75, -0.25,
        ],
        [3, 4],
    )
    .unwrap();

    let outputs = model.predict(&batch).unwrap();
    for row in 0..batch.dim(0) {
        let probs = outputs[0].sub(row).unwrap();
        let score = outputs[1].at(&[row, 0]).unwrap();
        println!("sample {row}: classes {:?}, score {score:.4}", probs.as_slice());
    }
}
