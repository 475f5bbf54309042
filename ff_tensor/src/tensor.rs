//! The n-dimensional tensor type.

use std::fmt;
use std::sync::Arc;

use num_traits::{AsPrimitive, Zero};

use crate::dtype::{DType, Scalar};
use crate::error::{Error, Result};
use crate::shape::Shape;

/// A row-major n-dimensional array of one numeric kind.
///
/// Storage is reference counted: cloning a tensor, [`Tensor::sub`] and
/// [`Tensor::slice`] all alias the same buffer. Writing through [`Tensor::set`]
/// or [`Tensor::as_mut_slice`] on a shared buffer first copies the visible
/// elements into a buffer of its own, so aliases never observe the write.
#[derive(Clone)]
pub struct Tensor<T: Scalar> {
    shape: Shape,
    storage: Arc<Vec<T>>,
    offset: usize,
}

impl<T: Scalar> Tensor<T> {
    // === Creation ===

    /// Zero-filled tensor of the given shape.
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        Self::full(shape, T::zero())
    }

    /// Tensor of the given shape with every element set to `value`.
    pub fn full(shape: impl Into<Shape>, value: T) -> Self {
        let shape = shape.into();
        let data = vec![value; shape.numel()];
        Tensor {
            shape,
            storage: Arc::new(data),
            offset: 0,
        }
    }

    /// Wrap row-major data in a tensor, checking the element count.
    pub fn from_vec(data: Vec<T>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.numel() {
            return Err(Error::DataLength {
                expected: shape.numel(),
                actual: data.len(),
            });
        }
        Ok(Tensor {
            shape,
            storage: Arc::new(data),
            offset: 0,
        })
    }

    /// Zero-rank tensor holding one value.
    pub fn scalar(value: T) -> Self {
        Self::full(Shape::scalar(), value)
    }

    // === Queries ===

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.ndim()
    }

    /// Size of dimension `axis`.
    ///
    /// # Panics
    ///
    /// If `axis >= self.rank()`. Use [`Tensor::dims`] for a checked lookup.
    pub fn dim(&self, axis: usize) -> usize {
        self.shape.dim(axis)
    }

    /// Number of elements.
    pub fn total_size(&self) -> usize {
        self.shape.numel()
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_scalar()
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Elements in row-major order.
    pub fn as_slice(&self) -> &[T] {
        &self.storage[self.offset..self.offset + self.total_size()]
    }

    /// Mutable elements in row-major order. Detaches from shared storage.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if Arc::strong_count(&self.storage) > 1 {
            let owned = self.as_slice().to_vec();
            self.storage = Arc::new(owned);
            self.offset = 0;
        }
        let (start, len) = (self.offset, self.total_size());
        &mut Arc::make_mut(&mut self.storage)[start..start + len]
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    /// Whether `self` and `other` view the same underlying buffer.
    pub fn shares_storage(&self, other: &Tensor<T>) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    // === Indexing ===

    /// Row-major flat offset of a coordinate.
    pub fn flat_index(&self, indices: &[usize]) -> Result<usize> {
        let dims = self.dims();
        if indices.len() != dims.len() {
            return Err(Error::RankMismatch {
                op: "index",
                expected: dims.len().to_string(),
                actual: indices.len(),
            });
        }
        for (&index, &bound) in indices.iter().zip(dims) {
            if index >= bound {
                return Err(Error::IndexOutOfRange { index, bound });
            }
        }

        let mut idx = indices.first().copied().unwrap_or(0);
        for n in 1..dims.len() {
            idx = dims[n] * idx + indices[n];
        }
        Ok(idx)
    }

    pub fn at(&self, indices: &[usize]) -> Result<T> {
        let idx = self.flat_index(indices)?;
        Ok(self.as_slice()[idx])
    }

    pub fn set(&mut self, indices: &[usize], value: T) -> Result<()> {
        let idx = self.flat_index(indices)?;
        self.as_mut_slice()[idx] = value;
        Ok(())
    }

    pub fn flat_at(&self, index: usize) -> Result<T> {
        self.as_slice()
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index,
                bound: self.total_size(),
            })
    }

    pub fn set_flat_at(&mut self, index: usize, value: T) -> Result<()> {
        let bound = self.total_size();
        match self.as_mut_slice().get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfRange { index, bound }),
        }
    }

    // === Views ===

    /// The rank-1-lower tensor at position `index` of the first axis.
    /// Shares storage with `self`.
    pub fn sub(&self, index: usize) -> Result<Tensor<T>> {
        let first = self.first_axis("sub")?;
        if index >= first {
            return Err(Error::IndexOutOfRange {
                index,
                bound: first,
            });
        }
        let inner = Shape::new(self.dims()[1..].to_vec());
        Ok(Tensor {
            offset: self.offset + inner.numel() * index,
            shape: inner,
            storage: Arc::clone(&self.storage),
        })
    }

    /// Rows `start..end` of the first axis. Shares storage with `self`.
    pub fn slice(&self, start: usize, end: usize) -> Result<Tensor<T>> {
        let first = self.first_axis("slice")?;
        if end > first {
            return Err(Error::IndexOutOfRange {
                index: end,
                bound: first,
            });
        }
        if start > end {
            return Err(Error::IndexOutOfRange {
                index: start,
                bound: end,
            });
        }
        let row = self.shape.stride_after(0);
        let mut dims = self.dims().to_vec();
        dims[0] = end - start;
        Ok(Tensor {
            shape: Shape::new(dims),
            storage: Arc::clone(&self.storage),
            offset: self.offset + row * start,
        })
    }

    fn first_axis(&self, op: &'static str) -> Result<usize> {
        self.dims()
            .first()
            .copied()
            .ok_or_else(|| Error::rank_at_least(op, 1, 0))
    }

    // === Conversion ===

    /// Element-wise conversion to another numeric kind (`as` semantics).
    pub fn cast<U>(&self) -> Tensor<U>
    where
        U: Scalar,
        T: AsPrimitive<U>,
    {
        let data: Vec<U> = self.as_slice().iter().map(|&v| v.as_()).collect();
        Tensor {
            shape: self.shape.clone(),
            storage: Arc::new(data),
            offset: 0,
        }
    }

    /// Copy of this tensor with a new shape of the same element count.
    pub fn reshaped(&self, shape: impl Into<Shape>) -> Result<Tensor<T>> {
        Tensor::from_vec(self.to_vec(), shape)
    }

    /// Freshly allocated tensor of the same shape with `f` applied to each element.
    pub fn map<F>(&self, f: F) -> Tensor<T>
    where
        F: Fn(T) -> T,
    {
        let data: Vec<T> = self.as_slice().iter().map(|&v| f(v)).collect();
        Tensor {
            shape: self.shape.clone(),
            storage: Arc::new(data),
            offset: 0,
        }
    }
}

impl<T: Scalar> PartialEq for Tensor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.as_slice() == other.as_slice()
    }
}

impl<T: Scalar> fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 8;
        let data = self.as_slice();
        let mut dbg = f.debug_struct("Tensor");
        dbg.field("dtype", &T::DTYPE).field("shape", &self.shape);
        if data.len() <= PREVIEW {
            dbg.field("data", &data);
        } else {
            dbg.field("data", &&data[..PREVIEW])
                .field("len", &data.len());
        }
        dbg.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arange(shape: &[usize]) -> Tensor<f32> {
        let n: usize = shape.iter().product();
        Tensor::from_vec((0..n).map(|v| v as f32).collect(), shape).unwrap()
    }

    #[test]
    fn test_zeros() {
        let t = Tensor::<i32>::zeros([2, 3]);
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(t.rank(), 2);
        assert_eq!(t.total_size(), 6);
        assert_eq!(t.as_slice(), &[0; 6]);
    }

    #[test]
    fn test_from_vec_length_checked() {
        let err = Tensor::from_vec(vec![1.0f32, 2.0, 3.0], [2, 2]).unwrap_err();
        assert_eq!(err, Error::DataLength { expected: 4, actual: 3 });
    }

    #[test]
    fn test_scalar_tensor() {
        let t = Tensor::scalar(7u16);
        assert!(t.is_scalar());
        assert_eq!(t.total_size(), 1);
        assert_eq!(t.at(&[]).unwrap(), 7);
    }

    #[test]
    fn test_flat_index_row_major() {
        let t = arange(&[2, 3, 4]);
        assert_eq!(t.flat_index(&[0, 0, 0]).unwrap(), 0);
        assert_eq!(t.flat_index(&[0, 0, 1]).unwrap(), 1);
        assert_eq!(t.flat_index(&[0, 1, 0]).unwrap(), 4);
        assert_eq!(t.flat_index(&[1, 0, 0]).unwrap(), 12);
        assert_eq!(t.flat_index(&[1, 2, 3]).unwrap(), 23);
        assert_eq!(t.at(&[1, 2, 3]).unwrap(), 23.0);
    }

    #[test]
    fn test_index_errors() {
        let mut t = arange(&[2, 3]);
        assert!(matches!(
            t.at(&[1]),
            Err(Error::RankMismatch { actual: 1, .. })
        ));
        assert_eq!(
            t.at(&[0, 3]),
            Err(Error::IndexOutOfRange { index: 3, bound: 3 })
        );
        assert_eq!(
            t.set(&[2, 0], 1.0),
            Err(Error::IndexOutOfRange { index: 2, bound: 2 })
        );
        assert_eq!(
            t.flat_at(6),
            Err(Error::IndexOutOfRange { index: 6, bound: 6 })
        );
        assert_eq!(
            t.set_flat_at(6, 0.0),
            Err(Error::IndexOutOfRange { index: 6, bound: 6 })
        );
    }

    #[test]
    fn test_set_and_get() {
        let mut t = Tensor::<i64>::zeros([3, 2]);
        t.set(&[2, 1], 9).unwrap();
        t.set_flat_at(0, 4).unwrap();
        assert_eq!(t.at(&[2, 1]).unwrap(), 9);
        assert_eq!(t.flat_at(5).unwrap(), 9);
        assert_eq!(t.as_slice(), &[4, 0, 0, 0, 0, 9]);
    }

    #[test]
    fn test_sub_aliases_parent() {
        let t = arange(&[3, 2, 2]);
        let s = t.sub(1).unwrap();
        assert_eq!(s.dims(), &[2, 2]);
        assert_eq!(s.as_slice(), &[4.0, 5.0, 6.0, 7.0]);
        assert!(s.shares_storage(&t));

        let inner = s.sub(1).unwrap();
        assert_eq!(inner.as_slice(), &[6.0, 7.0]);
        assert!(inner.shares_storage(&t));
    }

    #[test]
    fn test_slice_aliases_parent() {
        let t = arange(&[4, 3]);
        let s = t.slice(1, 3).unwrap();
        assert_eq!(s.dims(), &[2, 3]);
        assert_eq!(s.as_slice(), &[3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert!(s.shares_storage(&t));

        let empty = t.slice(2, 2).unwrap();
        assert_eq!(empty.dims(), &[0, 3]);
        assert!(empty.as_slice().is_empty());
    }

    #[test]
    fn test_view_errors() {
        let t = arange(&[2, 3]);
        assert_eq!(
            t.sub(2).unwrap_err(),
            Error::IndexOutOfRange { index: 2, bound: 2 }
        );
        assert_eq!(
            t.slice(0, 3).unwrap_err(),
            Error::IndexOutOfRange { index: 3, bound: 2 }
        );
        assert_eq!(
            t.slice(2, 1).unwrap_err(),
            Error::IndexOutOfRange { index: 2, bound: 1 }
        );
        assert!(matches!(
            Tensor::scalar(1.0f32).sub(0),
            Err(Error::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_write_detaches_shared_view() {
        let t = arange(&[2, 2]);
        let mut row = t.sub(0).unwrap();
        row.set(&[1], 42.0).unwrap();
        assert_eq!(row.as_slice(), &[0.0, 42.0]);
        assert_eq!(t.as_slice(), &[0.0, 1.0, 2.0, 3.0]);
        assert!(!row.shares_storage(&t));
    }

    #[test]
    fn test_cast_round_trip_integers() {
        let t = Tensor::from_vec(vec![-128i8, -1, 0, 1, 127], [5]).unwrap();
        let wide: Tensor<i64> = t.cast();
        assert_eq!(wide.dtype(), DType::I64);
        let back: Tensor<i8> = wide.cast();
        assert_eq!(back, t);
    }

    #[test]
    fn test_cast_narrowing_follows_as() {
        let t = Tensor::from_vec(vec![1.9f64, -2.5, 300.0], [3]).unwrap();
        let ints: Tensor<u8> = t.cast();
        assert_eq!(ints.as_slice(), &[1, 0, 255]);
    }

    #[test]
    fn test_reshaped_copies() {
        let t = arange(&[2, 3]);
        let r = t.reshaped([3, 2]).unwrap();
        assert_eq!(r.dims(), &[3, 2]);
        assert_eq!(r.as_slice(), t.as_slice());
        assert!(!r.shares_storage(&t));
        assert!(t.reshaped([4]).is_err());
    }

    #[test]
    fn test_map_allocates() {
        let t = arange(&[3]);
        let doubled = t.map(|v| v * 2.0);
        assert_eq!(doubled.as_slice(), &[0.0, 2.0, 4.0]);
        assert!(!doubled.shares_storage(&t));
    }
}
