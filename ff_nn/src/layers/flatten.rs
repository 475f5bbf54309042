//! Flatten layer.

use ff_tensor::prelude::*;
use ff_tensor::Result;

/// Collapses every axis after the first: `[d0, d1, ..., dn]` becomes
/// `[d0, d1 * ... * dn]`, and a rank-1 `[d0]` becomes `[d0, 1]`.
///
/// The output is a fresh copy of the input's elements in the same order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flatten;

impl Flatten {
    pub fn new() -> Self {
        Flatten
    }

    pub fn apply<T: Scalar>(&self, input: &Tensor<T>) -> Result<Tensor<T>> {
        if input.rank() == 0 {
            return Err(Error::rank_at_least("flatten", 1, 0));
        }
        let rows = input.dim(0);
        let cols = input.shape().stride_after(0);
        input.reshaped([rows, cols])
    }
}
