//! Error types shared by the tensor, layer and model APIs.

use thiserror::Error;

/// Errors raised by tensor operations, layers and models.
///
/// Every variant describes a programmer or configuration error: the offending
/// call is aborted and no partially written output escapes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A tensor's rank disagrees with what the operation needs.
    #[error("{op}: expected rank {expected}, got rank {actual}")]
    RankMismatch {
        op: &'static str,
        expected: String,
        actual: usize,
    },

    /// Dimension sizes disagree.
    #[error("{op}: shape mismatch, expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Flat data length does not match the requested shape.
    #[error("data length {actual} does not match shape with {expected} elements")]
    DataLength { expected: usize, actual: usize },

    /// A coordinate or flat index is past its bound.
    #[error("index {index} out of range for bound {bound}")]
    IndexOutOfRange { index: usize, bound: usize },

    /// An axis argument does not name a dimension of the tensor.
    #[error("axis {axis} out of range for tensor of rank {rank}")]
    AxisOutOfRange { axis: isize, rank: usize },

    /// A node handle that does not belong to this model.
    #[error("unknown node {node}")]
    UnknownNode { node: usize },

    /// Output slot past the number of outputs declared for the model.
    #[error("output index {index} out of range, model declares {outputs} outputs")]
    OutputIndexOutOfRange { index: usize, outputs: usize },

    /// A declared output slot was never bound to a node.
    #[error("output {index} was never set")]
    OutputNotSet { index: usize },
}

/// Result alias for tensor operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Rank mismatch against an exact expected rank.
    pub fn rank(op: &'static str, expected: usize, actual: usize) -> Self {
        Error::RankMismatch {
            op,
            expected: expected.to_string(),
            actual,
        }
    }

    /// Rank mismatch against a minimum rank.
    pub fn rank_at_least(op: &'static str, minimum: usize, actual: usize) -> Self {
        Error::RankMismatch {
            op,
            expected: format!("at least {minimum}"),
            actual,
        }
    }

    /// Shape mismatch between two dimension lists.
    pub fn shape(op: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Error::ShapeMismatch {
            op,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::shape("dense", &[2, 3], &[2, 4]);
        assert_eq!(
            err.to_string(),
            "dense: shape mismatch, expected [2, 3], got [2, 4]"
        );

        let err = Error::rank_at_least("flatten", 1, 0);
        assert_eq!(err.to_string(), "flatten: expected rank at least 1, got rank 0");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(Error::rank("dense", 2, 3), Error::rank("dense", 2, 3));
        assert_ne!(
            Error::OutputNotSet { index: 0 },
            Error::OutputNotSet { index: 1 }
        );
    }
}
