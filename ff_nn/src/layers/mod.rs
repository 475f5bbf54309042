//! Layers that can be placed in a [`Model`](crate::Model).

mod dense;
mod flatten;

use std::fmt;

use ff_backend_cpu::DenseScalar;
use ff_tensor::prelude::*;
use ff_tensor::Result;

use crate::activations::Activation;

pub use dense::Dense;
pub use flatten::Flatten;

/// The closed set of layer kinds a model can hold.
#[derive(Clone, Debug)]
pub enum Layer<T: DenseScalar> {
    Dense(Dense<T>),
    Activation(Activation<T>),
    Flatten(Flatten),
}

impl<T: DenseScalar> Layer<T> {
    /// Forward this layer on `input`, producing a freshly allocated output.
    pub fn apply(&self, input: &Tensor<T>) -> Result<Tensor<T>> {
        match self {
            Layer::Dense(dense) => dense.apply(input),
            Layer::Activation(activation) => activation.apply(input),
            Layer::Flatten(flatten) => flatten.apply(input),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Layer::Dense(_) => "dense",
            Layer::Activation(activation) => activation.name(),
            Layer::Flatten(_) => "flatten",
        }
    }
}

impl<T: DenseScalar> fmt::Display for Layer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Dense(dense) => write!(
                f,
                "dense({} -> {}, {})",
                dense.input_units(),
                dense.output_units(),
                dense.dense_kernel()
            ),
            Layer::Activation(activation) => write!(f, "{activation}"),
            Layer::Flatten(_) => f.write_str("flatten"),
        }
    }
}

impl<T: DenseScalar> From<Dense<T>> for Layer<T> {
    fn from(dense: Dense<T>) -> Self {
        Layer::Dense(dense)
    }
}

impl<T: DenseScalar> From<Activation<T>> for Layer<T> {
    fn from(activation: Activation<T>) -> Self {
        Layer::Activation(activation)
    }
}

impl<T: DenseScalar> From<Flatten> for Layer<T> {
    fn from(flatten: Flatten) -> Self {
        Layer::Flatten(flatten)
    }
}
