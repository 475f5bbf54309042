//! CPU dense kernels for ff_tensor with SIMD fast paths.
//!
//! A dense (affine) layer reduces to one batched product:
//! `out[b, j] = bias[j] + Σ_i input[b, i] * kernel_t[j, i]`, where `kernel_t`
//! is the transposed kernel (`[out_units, in_units]`, row per output unit).
//!
//! [`dense_portable`] is the generic loop, valid for every numeric kind.
//! [`DenseKernel`] names the implementation strategy for `f32`; it is detected
//! once per process and may be forced to [`DenseKernel::Portable`] to exercise
//! the fallback on any machine. [`DenseScalar`] routes each numeric kind to its
//! implementation at compile time.

use std::fmt;
use std::sync::OnceLock;

use ff_tensor::Scalar;

mod simd;

/// Implementation strategy for the `f32` dense product.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DenseKernel {
    /// Generic scalar loop, available everywhere.
    Portable,
    /// 256-bit AVX2 with fused multiply-add (x86_64).
    Avx2Fma,
    /// 128-bit NEON (aarch64).
    Neon,
}

impl DenseKernel {
    /// Best kernel for the running CPU. Probed once, then cached.
    pub fn detect() -> Self {
        static DETECTED: OnceLock<DenseKernel> = OnceLock::new();
        *DETECTED.get_or_init(|| {
            let kernel = if simd::has_avx2_fma() {
                DenseKernel::Avx2Fma
            } else if simd::has_neon() {
                DenseKernel::Neon
            } else {
                DenseKernel::Portable
            };
            tracing::debug!(kernel = kernel.name(), "selected dense kernel");
            kernel
        })
    }

    /// Whether the running CPU can execute this kernel.
    pub fn is_available(self) -> bool {
        match self {
            DenseKernel::Portable => true,
            DenseKernel::Avx2Fma => simd::has_avx2_fma(),
            DenseKernel::Neon => simd::has_neon(),
        }
    }

    /// Whether calls through this kernel actually take a SIMD path.
    pub fn is_accelerated(self) -> bool {
        self != DenseKernel::Portable && self.is_available()
    }

    pub fn name(self) -> &'static str {
        match self {
            DenseKernel::Portable => "portable",
            DenseKernel::Avx2Fma => "avx2-fma",
            DenseKernel::Neon => "neon",
        }
    }

    /// Batched `f32` dense product through this kernel. A kernel the CPU cannot
    /// execute degrades to [`dense_portable`].
    ///
    /// # Panics
    /// If the slice lengths do not describe `output.len() / out_units` rows.
    pub fn dense_f32(
        self,
        input: &[f32],
        kernel_t: &[f32],
        bias: &[f32],
        output: &mut [f32],
        in_units: usize,
        out_units: usize,
    ) {
        if out_units == 0 {
            return;
        }
        let handled = match self {
            DenseKernel::Portable => false,
            DenseKernel::Avx2Fma => {
                simd::dense_f32_avx2(input, kernel_t, bias, output, in_units, out_units)
            }
            DenseKernel::Neon => {
                simd::dense_f32_neon(input, kernel_t, bias, output, in_units, out_units)
            }
        };
        if !handled {
            dense_portable(input, kernel_t, bias, output, in_units, out_units);
        }
    }
}

impl fmt::Display for DenseKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generic batched dense product, accumulating in `T`.
///
/// Integer kinds wrap on overflow (see [`Scalar::plus`]).
///
/// # Panics
/// If the slice lengths do not describe `output.len() / out_units` rows.
pub fn dense_portable<T: Scalar>(
    input: &[T],
    kernel_t: &[T],
    bias: &[T],
    output: &mut [T],
    in_units: usize,
    out_units: usize,
) {
    if out_units == 0 {
        return;
    }
    let batch_count = output.len() / out_units;
    assert_eq!(input.len(), batch_count * in_units, "input/output row count mismatch");
    assert_eq!(kernel_t.len(), in_units * out_units, "kernel size mismatch");
    assert_eq!(bias.len(), out_units, "bias size mismatch");

    for batch in 0..batch_count {
        let row = &input[batch * in_units..(batch + 1) * in_units];
        let out_row = &mut output[batch * out_units..(batch + 1) * out_units];

        for (j, out) in out_row.iter_mut().enumerate() {
            let weights = &kernel_t[j * in_units..(j + 1) * in_units];
            let mut acc = bias[j];
            for (&x, &w) in row.iter().zip(weights) {
                acc = acc.plus(x.times(w));
            }
            *out = acc;
        }
    }
}

/// Numeric kinds that can run through a dense layer.
///
/// Every kind uses [`dense_portable`]; `f32` hands the whole batch to the
/// selected [`DenseKernel`].
pub trait DenseScalar: Scalar {
    fn dense(
        _kernel: DenseKernel,
        input: &[Self],
        kernel_t: &[Self],
        bias: &[Self],
        output: &mut [Self],
        in_units: usize,
        out_units: usize,
    ) {
        dense_portable(input, kernel_t, bias, output, in_units, out_units);
    }
}

impl DenseScalar for i8 {}
impl DenseScalar for i16 {}
impl DenseScalar for i32 {}
impl DenseScalar for i64 {}
impl DenseScalar for u8 {}
impl DenseScalar for u16 {}
impl DenseScalar for u32 {}
impl DenseScalar for u64 {}
impl DenseScalar for f64 {}

impl DenseScalar for f32 {
    fn dense(
        kernel: DenseKernel,
        input: &[f32],
        kernel_t: &[f32],
        bias: &[f32],
        output: &mut [f32],
        in_units: usize,
        out_units: usize,
    ) {
        kernel.dense_f32(input, kernel_t, bias, output, in_units, out_units);
    }
}
