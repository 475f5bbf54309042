//! Activation functions.
//!
//! Every activation allocates a fresh output of the input's shape. ReLU and
//! Softsign compute in the tensor's own kind; the transcendental ones compute
//! in `f64` and narrow the result back, so on integer tensors they mostly
//! produce 0/1 style values. They are meant for floating-point models.

use std::fmt;

use ff_tensor::prelude::*;
use ff_tensor::Result;

const SELU_SCALE: f64 = 1.050_700_987_355_480_5;
const SELU_ALPHA: f64 = 1.673_263_242_354_377_3;

/// The activation catalogue.
#[derive(Clone, Debug, PartialEq)]
pub enum Activation<T: Scalar> {
    /// `x >= max_value -> max_value`, `x >= threshold -> x`,
    /// otherwise `(x - threshold) * negative_slope`.
    Relu {
        max_value: T,
        negative_slope: T,
        threshold: T,
    },
    /// `1 / (1 + exp(-x))`
    Sigmoid,
    /// `exp(x) / Σ exp(x)` along `axis`; negative axes count from the end.
    Softmax { axis: isize },
    /// `ln(exp(x) + 1)`
    Softplus,
    /// `|x| / (|x| + 1)`
    Softsign,
    Tanh,
    /// Scaled ELU with the fixed self-normalizing constants.
    Selu,
    /// `x >= 0 -> x`, otherwise `alpha * (exp(x) - 1)`
    Elu { alpha: T },
    /// `exp(x)`
    Exponential,
}

impl<T: Scalar> Activation<T> {
    /// Plain ReLU: unbounded, zero slope, zero threshold.
    pub fn relu() -> Self {
        Activation::Relu {
            max_value: T::from_f64(f64::INFINITY),
            negative_slope: T::zero(),
            threshold: T::zero(),
        }
    }

    pub fn softmax(axis: isize) -> Self {
        Activation::Softmax { axis }
    }

    pub fn elu(alpha: T) -> Self {
        Activation::Elu { alpha }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Relu { .. } => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Softmax { .. } => "softmax",
            Activation::Softplus => "softplus",
            Activation::Softsign => "softsign",
            Activation::Tanh => "tanh",
            Activation::Selu => "selu",
            Activation::Elu { .. } => "elu",
            Activation::Exponential => "exponential",
        }
    }

    pub fn apply(&self, input: &Tensor<T>) -> Result<Tensor<T>> {
        let zero = T::zero();
        let output = match *self {
            Activation::Relu {
                max_value,
                negative_slope,
                threshold,
            } => input.map(|x| {
                if x >= max_value {
                    max_value
                } else if x >= threshold {
                    x
                } else {
                    x.minus(threshold).times(negative_slope)
                }
            }),
            Activation::Sigmoid => input.map(|x| via_f64(x, |v| 1.0 / (1.0 + (-v).exp()))),
            Activation::Softmax { axis } => return softmax(input, axis),
            Activation::Softplus => input.map(|x| via_f64(x, |v| (v.exp() + 1.0).ln())),
            Activation::Softsign => input.map(|x| {
                let a = if x < zero { zero.minus(x) } else { x };
                a.over(a.plus(T::one()))
            }),
            Activation::Tanh => input.map(|x| via_f64(x, f64::tanh)),
            Activation::Selu => input.map(|x| {
                if x >= zero {
                    via_f64(x, |v| SELU_SCALE * v)
                } else {
                    via_f64(x, |v| SELU_SCALE * SELU_ALPHA * (v.exp() - 1.0))
                }
            }),
            Activation::Elu { alpha } => {
                let alpha = alpha.to_f64();
                input.map(|x| {
                    if x >= zero {
                        x
                    } else {
                        via_f64(x, |v| alpha * (v.exp() - 1.0))
                    }
                })
            }
            Activation::Exponential => input.map(|x| via_f64(x, f64::exp)),
        };
        Ok(output)
    }
}

impl<T: Scalar> fmt::Display for Activation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Relu {
                max_value,
                negative_slope,
                threshold,
            } => write!(
                f,
                "relu(max={max_value:?}, slope={negative_slope:?}, threshold={threshold:?})"
            ),
            Activation::Softmax { axis } => write!(f, "softmax(axis={axis})"),
            Activation::Elu { alpha } => write!(f, "elu(alpha={alpha:?})"),
            other => f.write_str(other.name()),
        }
    }
}

#[inline]
fn via_f64<T: Scalar>(x: T, f: impl Fn(f64) -> f64) -> T {
    T::from_f64(f(x.to_f64()))
}

/// Resolve a possibly negative axis against `rank`.
fn resolve_axis(axis: isize, rank: usize) -> Result<usize> {
    let resolved = if axis < 0 {
        axis + rank as isize
    } else {
        axis
    };
    if resolved < 0 || resolved as usize >= rank {
        return Err(Error::AxisOutOfRange { axis, rank });
    }
    Ok(resolved as usize)
}

/// Softmax along `axis`.
///
/// Two passes per slice: exponentiate and sum, then divide by the sum. Inputs
/// are not shifted by their maximum, so large values overflow to `inf`/`NaN`.
pub fn softmax<T: Scalar>(input: &Tensor<T>, axis: isize) -> Result<Tensor<T>> {
    let axis = resolve_axis(axis, input.rank())?;
    let len = input.dim(axis);
    let post = input.shape().stride_after(axis);
    let block = post * len;

    let src = input.as_slice();
    let mut data = vec![T::zero(); src.len()];

    if !src.is_empty() {
        for pre in (0..src.len()).step_by(block) {
            for p in 0..post {
                let mut sum = T::zero();
                for k in 0..len {
                    let idx = pre + p + k * post;
                    let value = via_f64(src[idx], f64::exp);
                    data[idx] = value;
                    sum = sum.plus(value);
                }
                for k in 0..len {
                    let idx = pre + p + k * post;
                    data[idx] = data[idx].over(sum);
                }
            }
        }
    }

    Tensor::from_vec(data, input.shape().clone())
}
