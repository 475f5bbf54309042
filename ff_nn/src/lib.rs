//! # ff_nn - Layers and Models for ff_tensor
//!
//! This crate provides the inference building blocks on top of ff_tensor:
//!
//! - **Layers**: Dense (fully connected), Flatten
//! - **Activations**: ReLU, Sigmoid, Softmax, Softplus, Softsign, Tanh, SELU, ELU, Exponential
//! - **Model**: a tree of layers with one input and any number of outputs
//!
//! ## Example: Running a Small Classifier
//!
//! ```
//! use ff_nn::{Activation, Dense, Flatten, Model};
//! use ff_tensor::prelude::*;
//!
//! let hidden = Dense::new(&Tensor::full([4, 8], 0.25f32), &Tensor::zeros([8])).unwrap();
//! let head = Dense::new(&Tensor::full([8, 3], 0.5f32), &Tensor::zeros([3])).unwrap();
//!
//! let mut model = Model::new(1);
//! let flat = model.add_layer(Flatten, None).unwrap();
//! let h = model.add_layer(hidden, Some(flat)).unwrap();
//! let h = model.add_layer(Activation::relu(), Some(h)).unwrap();
//! let logits = model.add_layer(head, Some(h)).unwrap();
//! let probs = model.add_layer(Activation::softmax(-1), Some(logits)).unwrap();
//! model.set_output(probs, 0).unwrap();
//!
//! // Batch of 5 samples, each a 2x2 image
//! let outputs = model.predict(&Tensor::full([5, 2, 2], 1.0)).unwrap();
//! assert_eq!(outputs[0].dims(), &[5, 3]);
//! ```

pub mod activations;
pub mod layers;
pub mod model;

// Re-exports for convenience
pub use activations::{softmax, Activation};
pub use ff_backend_cpu::{DenseKernel, DenseScalar};
pub use layers::{Dense, Flatten, Layer};
pub use model::{Model, NodeId};
