//! # ff_tensor - Tensors for Forward Inference
//!
//! This crate provides the data model shared by the rest of the workspace:
//!
//! - [`Tensor`] - row-major n-dimensional array with zero-copy `sub`/`slice` views
//! - [`Shape`] - tensor dimensions
//! - [`Scalar`] and [`DType`] - the ten supported numeric kinds
//! - [`Error`] - the error taxonomy used by tensors, layers and models
//!
//! ## Example
//!
//! ```
//! use ff_tensor::prelude::*;
//!
//! let mut t = Tensor::<f32>::zeros([2, 3]);
//! t.set(&[1, 2], 5.0).unwrap();
//!
//! let row = t.sub(1).unwrap();
//! assert_eq!(row.as_slice(), &[0.0, 0.0, 5.0]);
//!
//! let ints: Tensor<i32> = t.cast();
//! assert_eq!(ints.at(&[1, 2]).unwrap(), 5);
//! ```

pub mod dtype;
pub mod error;
pub mod shape;
pub mod tensor;

pub use dtype::{DType, Scalar};
pub use error::{Error, Result};
pub use shape::Shape;
pub use tensor::Tensor;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dtype::{DType, Scalar};
    pub use crate::error::Error;
    pub use crate::shape::Shape;
    pub use crate::tensor::Tensor;
}
