//! Numeric kinds a tensor can hold.
//!
//! [`Scalar`] is implemented for the ten fixed-width kinds (`i8`..`i64`,
//! `u8`..`u64`, `f32`, `f64`). All tensor code is generic over it, so the
//! numeric kind is resolved at compile time; [`DType`] is the runtime tag used
//! where a kind has to be named, e.g. in file headers.

use std::fmt::{self, Debug};

use num_traits::{AsPrimitive, One, Zero};

/// Runtime representation of a tensor's numeric kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl DType {
    /// All supported kinds.
    pub const ALL: [DType; 10] = [
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::F32,
        DType::F64,
    ];

    /// Size in bytes of one element.
    pub const fn size_of(self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub const fn is_signed(self) -> bool {
        !matches!(self, DType::U8 | DType::U16 | DType::U32 | DType::U64)
    }

    /// Rust spelling of the kind.
    pub const fn name(self) -> &'static str {
        match self {
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }

    /// NumPy type code without the byte-order character (`"f4"`, `"i8"`, ...).
    pub const fn npy_code(self) -> &'static str {
        match self {
            DType::I8 => "i1",
            DType::I16 => "i2",
            DType::I32 => "i4",
            DType::I64 => "i8",
            DType::U8 => "u1",
            DType::U16 => "u2",
            DType::U32 => "u4",
            DType::U64 => "u8",
            DType::F32 => "f4",
            DType::F64 => "f8",
        }
    }

    /// Inverse of [`DType::npy_code`].
    pub fn from_npy_code(code: &str) -> Option<DType> {
        DType::ALL.into_iter().find(|d| d.npy_code() == code)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element type of a [`Tensor`](crate::Tensor).
///
/// The arithmetic helpers (`plus`, `minus`, `times`, `over`) follow
/// fixed-width semantics: integer kinds wrap on overflow and division by zero
/// yields zero, floating kinds use IEEE arithmetic. Layer code uses them
/// instead of the operators so that no input value can abort a forward pass.
pub trait Scalar:
    Copy + Debug + Default + PartialOrd + Send + Sync + Zero + One + AsPrimitive<f64> + 'static
{
    /// The runtime tag for this kind.
    const DTYPE: DType;

    /// Narrow an `f64` with `as` semantics (saturating, NaN becomes zero for integers).
    fn from_f64(value: f64) -> Self;

    #[inline]
    fn to_f64(self) -> f64 {
        self.as_()
    }

    fn plus(self, rhs: Self) -> Self;

    fn minus(self, rhs: Self) -> Self;

    fn times(self, rhs: Self) -> Self;

    fn over(self, rhs: Self) -> Self;
}

macro_rules! impl_int_scalar {
    ($($t:ty => $dtype:ident),* $(,)?) => {$(
        impl Scalar for $t {
            const DTYPE: DType = DType::$dtype;

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn plus(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            #[inline]
            fn minus(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }

            #[inline]
            fn times(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }

            #[inline]
            fn over(self, rhs: Self) -> Self {
                if rhs == 0 {
                    0
                } else {
                    self.wrapping_div(rhs)
                }
            }
        }
    )*};
}

macro_rules! impl_float_scalar {
    ($($t:ty => $dtype:ident),* $(,)?) => {$(
        impl Scalar for $t {
            const DTYPE: DType = DType::$dtype;

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn plus(self, rhs: Self) -> Self {
                self + rhs
            }

            #[inline]
            fn minus(self, rhs: Self) -> Self {
                self - rhs
            }

            #[inline]
            fn times(self, rhs: Self) -> Self {
                self * rhs
            }

            #[inline]
            fn over(self, rhs: Self) -> Self {
                self / rhs
            }
        }
    )*};
}

impl_int_scalar!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

impl_float_scalar!(f32 => F32, f64 => F64);
