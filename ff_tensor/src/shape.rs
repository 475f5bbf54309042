//! Tensor shapes.

use std::fmt;

/// Extent of each axis, outermost first.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// The rank-0 shape.
    pub fn scalar() -> Self {
        Shape::default()
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Extent of `axis`.
    ///
    /// # Panics
    ///
    /// If `axis >= self.ndim()`.
    pub fn dim(&self, axis: usize) -> usize {
        self.0[axis]
    }

    pub fn dims(&self) -> &[usize] {
        self.0.as_slice()
    }

    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Element count. Rank 0 holds one element; any zero extent gives zero.
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    pub fn is_scalar(&self) -> bool {
        self.ndim() == 0
    }

    /// Number of rows seen by an operation over the last axis, i.e. the
    /// product of every extent except the last.
    pub fn leading(&self) -> usize {
        match self.0.split_last() {
            Some((_, front)) => front.iter().product(),
            None => 1,
        }
    }

    /// Copy of this shape whose last extent is `dim`. Rank 0 stays rank 0.
    pub fn with_last(&self, dim: usize) -> Shape {
        match self.0.split_last() {
            Some((_, front)) => front.iter().copied().chain([dim]).collect(),
            None => Shape::scalar(),
        }
    }

    /// Distance in elements between consecutive indices along `axis` in
    /// row-major order.
    pub fn stride_after(&self, axis: usize) -> usize {
        self.0.iter().skip(axis + 1).product()
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shape").field(&self.0).finish()
    }
}

/// Python tuple notation: `()`, `(3,)`, `(2, 5)`.
impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dims() {
            [] => f.write_str("()"),
            [only] => write!(f, "({only},)"),
            [first, rest @ ..] => {
                write!(f, "({first}")?;
                rest.iter().try_for_each(|d| write!(f, ", {d}"))?;
                f.write_str(")")
            }
        }
    }
}

impl FromIterator<usize> for Shape {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Shape(iter.into_iter().collect())
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        dims.iter().copied().collect()
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        dims.into_iter().collect()
    }
}
