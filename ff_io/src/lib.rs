//! # ff_io - NumPy Files for ff_tensor
//!
//! Reading and writing tensors in NumPy's binary formats:
//!
//! - [`npy`] - a single array (`.npy`, format versions 1.0 to 3.0)
//! - [`npz`] - a zip archive of `.npy` entries, as written by `numpy.savez`
//!
//! The path helpers below wrap the reader/writer functions with buffered files.
//!
//! ## Example
//!
//! ```no_run
//! use ff_tensor::Tensor;
//!
//! let weights: Vec<Tensor<f32>> = ff_io::load_npz("weights.npz")?;
//! let sample: Tensor<f32> = ff_io::load_npy("sample.npy")?;
//! ff_io::save_npy(&sample, "copy.npy")?;
//! # Ok::<(), ff_io::IoError>(())
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ff_tensor::{DType, Tensor};
use thiserror::Error;

pub mod npy;
pub mod npz;

pub use npy::{NpyElement, NpyHeader};

/// Errors raised while loading or saving NumPy files.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Tensor(#[from] ff_tensor::Error),

    /// The `.npy` preamble or header dictionary is malformed.
    #[error("invalid npy header: {0}")]
    InvalidHeader(String),

    /// The stored element type is not one of the supported numeric kinds.
    #[error("unsupported numeric kind {0:?}")]
    UnsupportedNumericKind(String),

    /// The stored kind differs from the kind the caller asked for.
    #[error("stored numeric kind {found} does not match requested {expected}")]
    DifferentNumericKind { expected: DType, found: DType },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Result alias for file operations.
pub type Result<T> = std::result::Result<T, IoError>;

/// Load a single `.npy` file.
pub fn load_npy<T: NpyElement>(path: impl AsRef<Path>) -> Result<Tensor<T>> {
    let mut reader = BufReader::new(File::open(path)?);
    npy::read_npy(&mut reader)
}

/// Save `tensor` as a version 1.0 little-endian `.npy` file.
pub fn save_npy<T: NpyElement>(tensor: &Tensor<T>, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    npy::write_npy(tensor, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Load every array of an `.npz` archive, in archive order.
pub fn load_npz<T: NpyElement>(path: impl AsRef<Path>) -> Result<Vec<Tensor<T>>> {
    npz::read_npz(BufReader::new(File::open(path)?))
}

/// Save `tensors` as an uncompressed `.npz` archive with entries
/// `arr_0.npy`, `arr_1.npy`, ...
pub fn save_npz<T: NpyElement>(tensors: &[Tensor<T>], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = npz::write_npz(tensors, BufWriter::new(File::create(path)?))?;
    writer.flush()?;
    Ok(())
}
