//! SIMD-accelerated dense kernels.
//!
//! This module provides the batched `out = bias + input @ kernel_t^T` product
//! using platform-specific SIMD instructions (AVX2+FMA on x86_64, NEON on ARM).
//! Each entry point reports `false` when the instructions are not available so
//! the caller can fall back to the portable loop.

#![allow(unreachable_code)]

/// Check if AVX2 and FMA are available (x86_64 only).
#[cfg(target_arch = "x86_64")]
pub fn has_avx2_fma() -> bool {
    is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
}

#[cfg(not(target_arch = "x86_64"))]
pub fn has_avx2_fma() -> bool {
    false
}

/// Check if NEON is available (ARM only).
#[cfg(target_arch = "aarch64")]
pub fn has_neon() -> bool {
    // NEON is mandatory on aarch64
    true
}

#[cfg(not(target_arch = "aarch64"))]
pub fn has_neon() -> bool {
    false
}

/// The raw-pointer kernels below read exactly these extents.
#[cfg_attr(
    not(any(target_arch = "x86_64", target_arch = "aarch64")),
    allow(dead_code)
)]
fn check_dense_args(
    input: &[f32],
    kernel_t: &[f32],
    bias: &[f32],
    output: &[f32],
    in_units: usize,
    out_units: usize,
) -> usize {
    assert!(out_units > 0, "dense kernel needs at least one output unit");
    assert_eq!(output.len() % out_units, 0, "output is not a whole number of rows");
    let batch_count = output.len() / out_units;
    assert_eq!(input.len(), batch_count * in_units, "input/output row count mismatch");
    assert_eq!(kernel_t.len(), in_units * out_units, "kernel size mismatch");
    assert_eq!(bias.len(), out_units, "bias size mismatch");
    batch_count
}

/// AVX2+FMA dense product. Returns `false` without touching `output` when the
/// CPU lacks the features.
#[cfg_attr(not(target_arch = "x86_64"), allow(unused_variables))]
pub fn dense_f32_avx2(
    input: &[f32],
    kernel_t: &[f32],
    bias: &[f32],
    output: &mut [f32],
    in_units: usize,
    out_units: usize,
) -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        if has_avx2_fma() {
            let batch_count = check_dense_args(input, kernel_t, bias, output, in_units, out_units);
            // SAFETY: features checked above, extents checked by check_dense_args
            unsafe {
                dense_f32_avx2_impl(input, kernel_t, bias, output, batch_count, in_units, out_units)
            };
            return true;
        }
    }
    false
}

/// NEON dense product. Returns `false` on targets without NEON.
#[cfg_attr(not(target_arch = "aarch64"), allow(unused_variables))]
pub fn dense_f32_neon(
    input: &[f32],
    kernel_t: &[f32],
    bias: &[f32],
    output: &mut [f32],
    in_units: usize,
    out_units: usize,
) -> bool {
    #[cfg(target_arch = "aarch64")]
    {
        let batch_count = check_dense_args(input, kernel_t, bias, output, in_units, out_units);
        // SAFETY: NEON is mandatory on aarch64, extents checked by check_dense_args
        unsafe {
            dense_f32_neon_impl(input, kernel_t, bias, output, batch_count, in_units, out_units)
        };
        return true;
    }
    false
}

// === AVX2 implementation (x86_64) ===

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dense_f32_avx2_impl(
    input: &[f32],
    kernel_t: &[f32],
    bias: &[f32],
    output: &mut [f32],
    batch_count: usize,
    in_units: usize,
    out_units: usize,
) {
    use std::arch::x86_64::*;

    const LANES: usize = 8;
    const UNROLL: usize = 4;

    let wide = in_units / (LANES * UNROLL) * (LANES * UNROLL);
    let narrow = in_units / LANES * LANES;

    let out_ptr = output.as_mut_ptr();

    for batch in 0..batch_count {
        let x_ptr = input.as_ptr().add(batch * in_units);

        for j in 0..out_units {
            let w_ptr = kernel_t.as_ptr().add(j * in_units);

            let mut acc0 = _mm256_setzero_ps();
            let mut acc1 = _mm256_setzero_ps();
            let mut acc2 = _mm256_setzero_ps();
            let mut acc3 = _mm256_setzero_ps();

            let mut i = 0;
            while i < wide {
                acc0 = _mm256_fmadd_ps(
                    _mm256_loadu_ps(x_ptr.add(i)),
                    _mm256_loadu_ps(w_ptr.add(i)),
                    acc0,
                );
                acc1 = _mm256_fmadd_ps(
                    _mm256_loadu_ps(x_ptr.add(i + LANES)),
                    _mm256_loadu_ps(w_ptr.add(i + LANES)),
                    acc1,
                );
                acc2 = _mm256_fmadd_ps(
                    _mm256_loadu_ps(x_ptr.add(i + 2 * LANES)),
                    _mm256_loadu_ps(w_ptr.add(i + 2 * LANES)),
                    acc2,
                );
                acc3 = _mm256_fmadd_ps(
                    _mm256_loadu_ps(x_ptr.add(i + 3 * LANES)),
                    _mm256_loadu_ps(w_ptr.add(i + 3 * LANES)),
                    acc3,
                );
                i += LANES * UNROLL;
            }
            while i < narrow {
                acc0 = _mm256_fmadd_ps(
                    _mm256_loadu_ps(x_ptr.add(i)),
                    _mm256_loadu_ps(w_ptr.add(i)),
                    acc0,
                );
                i += LANES;
            }

            let acc = _mm256_add_ps(_mm256_add_ps(acc0, acc1), _mm256_add_ps(acc2, acc3));

            // Horizontal sum of 8 floats
            let low = _mm256_castps256_ps128(acc);
            let high = _mm256_extractf128_ps(acc, 1);
            let sum128 = _mm_add_ps(low, high);
            let sum64 = _mm_add_ps(sum128, _mm_movehl_ps(sum128, sum128));
            let sum32 = _mm_add_ss(sum64, _mm_shuffle_ps(sum64, sum64, 1));
            let mut sum = _mm_cvtss_f32(sum32);

            // Handle remainder
            while i < in_units {
                sum += *x_ptr.add(i) * *w_ptr.add(i);
                i += 1;
            }

            *out_ptr.add(batch * out_units + j) = *bias.get_unchecked(j) + sum;
        }
    }
}

// === NEON implementation (aarch64) ===

#[cfg(target_arch = "aarch64")]
unsafe fn dense_f32_neon_impl(
    input: &[f32],
    kernel_t: &[f32],
    bias: &[f32],
    output: &mut [f32],
    batch_count: usize,
    in_units: usize,
    out_units: usize,
) {
    use std::arch::aarch64::*;

    const LANES: usize = 4;

    let chunks = in_units / LANES;
    let out_ptr = output.as_mut_ptr();

    for batch in 0..batch_count {
        let x_ptr = input.as_ptr().add(batch * in_units);

        for j in 0..out_units {
            let w_ptr = kernel_t.as_ptr().add(j * in_units);
            let mut acc0 = vdupq_n_f32(0.0);
            let mut acc1 = vdupq_n_f32(0.0);

            let mut c = 0;
            while c + 1 < chunks {
                let offset = c * LANES;
                acc0 = vfmaq_f32(acc0, vld1q_f32(x_ptr.add(offset)), vld1q_f32(w_ptr.add(offset)));
                acc1 = vfmaq_f32(
                    acc1,
                    vld1q_f32(x_ptr.add(offset + LANES)),
                    vld1q_f32(w_ptr.add(offset + LANES)),
                );
                c += 2;
            }
            if c < chunks {
                let offset = c * LANES;
                acc0 = vfmaq_f32(acc0, vld1q_f32(x_ptr.add(offset)), vld1q_f32(w_ptr.add(offset)));
            }

            // Horizontal sum
            let mut sum = vaddvq_f32(vaddq_f32(acc0, acc1));

            for i in chunks * LANES..in_units {
                sum += *x_ptr.add(i) * *w_ptr.add(i);
            }

            *out_ptr.add(batch * out_units + j) = *bias.get_unchecked(j) + sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense_portable;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_vec(rng: &mut StdRng, len: usize) -> Vec<f32> {
        (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }

    fn assert_close(expected: &[f32], actual: &[f32]) {
        assert_eq!(expected.len(), actual.len());
        for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
            let tol = 1e-4 * e.abs().max(1.0);
            assert!((e - a).abs() < tol, "element {i}: expected {e}, got {a}");
        }
    }

    fn check_against_portable(
        kernel: fn(&[f32], &[f32], &[f32], &mut [f32], usize, usize) -> bool,
    ) {
        let mut rng = StdRng::seed_from_u64(0);
        let dims = [
            (1, 1, 1),
            (1, 7, 3),
            (3, 8, 2),
            (2, 31, 5),
            (5, 32, 10),
            (4, 33, 9),
            (16, 256, 64),
        ];
        for (batch, in_units, out_units) in dims {
            let input = random_vec(&mut rng, batch * in_units);
            let kernel_t = random_vec(&mut rng, in_units * out_units);
            let bias = random_vec(&mut rng, out_units);

            let mut expected = vec![0.0; batch * out_units];
            dense_portable(&input, &kernel_t, &bias, &mut expected, in_units, out_units);

            let mut actual = vec![0.0; batch * out_units];
            if kernel(&input, &kernel_t, &bias, &mut actual, in_units, out_units) {
                assert_close(&expected, &actual);
            } else {
                assert!(actual.iter().all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn test_avx2_matches_portable() {
        check_against_portable(dense_f32_avx2);
    }

    #[test]
    fn test_neon_matches_portable() {
        check_against_portable(dense_f32_neon);
    }

    #[test]
    fn test_zero_input_units_yields_bias() {
        let bias = vec![1.5, -2.0];
        let mut out = vec![0.0; 4];
        if dense_f32_avx2(&[], &[], &bias, &mut out, 0, 2) || dense_f32_neon(&[], &[], &bias, &mut out, 0, 2) {
            assert_eq!(out, vec![1.5, -2.0, 1.5, -2.0]);
        }
    }
}
