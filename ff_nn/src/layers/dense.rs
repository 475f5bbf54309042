//! Dense (fully connected) layer.

use ff_backend_cpu::{DenseKernel, DenseScalar};
use ff_tensor::prelude::*;
use ff_tensor::Result;

/// A dense layer: `y = x @ kernel + bias`, applied over the last axis.
///
/// The kernel is given as `[input_units, output_units]` and stored transposed
/// so each output unit reads one contiguous row.
#[derive(Clone, Debug)]
pub struct Dense<T: DenseScalar> {
    kernel: Tensor<T>,
    /// Transposed kernel `[output_units, input_units]`
    kernel_t: Tensor<T>,
    /// Bias vector `[output_units]`
    bias: Tensor<T>,
    input_units: usize,
    output_units: usize,
    dense_kernel: DenseKernel,
}

impl<T: DenseScalar> Dense<T> {
    /// Create a dense layer from a `[input_units, output_units]` kernel and a
    /// `[output_units]` bias. Uses the best kernel for the running CPU.
    pub fn new(kernel: &Tensor<T>, bias: &Tensor<T>) -> Result<Self> {
        if kernel.rank() != 2 {
            return Err(Error::rank("dense kernel", 2, kernel.rank()));
        }
        if bias.rank() != 1 {
            return Err(Error::rank("dense bias", 1, bias.rank()));
        }
        let input_units = kernel.dim(0);
        let output_units = kernel.dim(1);
        if bias.dim(0) != output_units {
            return Err(Error::shape("dense bias", &[output_units], bias.dims()));
        }

        let src = kernel.as_slice();
        let mut transposed = vec![T::zero(); src.len()];
        for j in 0..output_units {
            for i in 0..input_units {
                transposed[j * input_units + i] = src[i * output_units + j];
            }
        }

        Ok(Dense {
            kernel: kernel.clone(),
            kernel_t: Tensor::from_vec(transposed, [output_units, input_units])?,
            bias: bias.clone(),
            input_units,
            output_units,
            dense_kernel: DenseKernel::detect(),
        })
    }

    /// Run this layer through `kernel` instead of the detected one.
    pub fn with_kernel(mut self, kernel: DenseKernel) -> Self {
        self.dense_kernel = kernel;
        self
    }

    /// Forward pass over the last axis.
    ///
    /// Input `[..., input_units]` produces `[..., output_units]`; a rank-1
    /// input is a single row.
    pub fn apply(&self, input: &Tensor<T>) -> Result<Tensor<T>> {
        match input.shape().last() {
            None => return Err(Error::rank_at_least("dense input", 1, 0)),
            Some(d) if d != self.input_units => {
                let expected = input.shape().with_last(self.input_units);
                return Err(Error::shape("dense input", expected.dims(), input.dims()));
            }
            Some(_) => {}
        }

        let shape = input.shape().with_last(self.output_units);
        let mut data = vec![T::zero(); shape.leading() * self.output_units];
        T::dense(
            self.dense_kernel,
            input.as_slice(),
            self.kernel_t.as_slice(),
            self.bias.as_slice(),
            &mut data,
            self.input_units,
            self.output_units,
        );
        Tensor::from_vec(data, shape)
    }

    pub fn input_units(&self) -> usize {
        self.input_units
    }

    pub fn output_units(&self) -> usize {
        self.output_units
    }

    /// The kernel as given, `[input_units, output_units]`.
    pub fn kernel(&self) -> &Tensor<T> {
        &self.kernel
    }

    pub fn bias(&self) -> &Tensor<T> {
        &self.bias
    }

    pub fn dense_kernel(&self) -> DenseKernel {
        self.dense_kernel
    }
}
