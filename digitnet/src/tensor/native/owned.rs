use crate::tensor::dims::{Dim1, Dim2, Dim3, Dim4, Dims};
use crate::tensor::{ITensor, TensorBase, TensorBaseMut};
use num_traits::Zero;
use rand::Rng;
use rand::distributions::Distribution;
use std::ops::{Index, IndexMut};
use std::slice::{Iter, IterMut};
use std::vec::IntoIter;

#[derive(Clone, PartialEq)]
pub struct Tensor<T, D>
where
    D: Dims,
{
    data: Vec<T>,
    dims: D,
}

pub type Tensor1<T> = Tensor<T, Dim1>;
pub type Tensor2<T> = Tensor<T, Dim2>;
pub type Tensor3<T> = Tensor<T, Dim3>;
pub type Tensor4<T> = Tensor<T, Dim4>;

impl<T, D: Dims> Tensor<T, D> {
    pub fn empty() -> Self {
        Tensor {
            data: Vec::new(),
            dims: D::ZERO,
        }
    }

    pub fn from_vec(data: Vec<T>, dims: D) -> Self {
        assert_eq!(data.len(), dims.tensor_len(), "Data length does not match dims {dims}");
        Tensor { data, dims }
    }

    pub fn from_distribution<R, S>(rng: &mut R, dist: S, dims: D) -> Self
    where
        R: Rng,
        S: Distribution<T>,
    {
        let data: Vec<T> = dist.sample_iter(rng).take(dims.tensor_len()).collect();
        Tensor { data, dims }
    }

    /// reinterprets the data with new dims of the same length
    pub fn reshape<E: Dims>(self, dims: E) -> Tensor<T, E> {
        Tensor::from_vec(self.data, dims)
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        self.data.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        self.data.iter_mut()
    }
}

impl<T> Tensor1<T> {
    pub fn from_vec_1d(data: Vec<T>) -> Self {
        let len = data.len();
        Tensor { data, dims: Dim1(len) }
    }
}

impl<T> Tensor2<T> {
    pub fn from_vec_2d<const N: usize>(vec: Vec<[T; N]>) -> Self {
        let rows = vec.len();
        let data: Vec<T> = vec.into_iter().flatten().collect();
        Tensor { data, dims: Dim2(rows, N) }
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[T] {
        let cols = self.dims.cols();
        &self.data[row * cols..(row + 1) * cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        let cols = self.dims.cols();
        &mut self.data[row * cols..(row + 1) * cols]
    }
}

impl<T: Clone, D: Dims> Tensor<T, D> {
    pub fn filled(value: T, dims: D) -> Self {
        Tensor {
            data: vec![value; dims.tensor_len()],
            dims,
        }
    }
    pub fn resize(&mut self, fill: T, dims: D) {
        if self.dims != dims {
            let new_len = dims.tensor_len();
            if self.data.len() != new_len {
                self.data.resize(new_len, fill);
            }
            self.dims = dims;
        }
    }
    #[inline]
    pub fn resize_major(&mut self, fill: T, size: usize) {
        let dims = self.dims.with_resized_first_axis(size);
        self.resize(fill, dims)
    }
    #[inline]
    pub fn fill(&mut self, fill: T) {
        self.data.fill(fill);
    }
}

impl<T: Zero + Clone, D: Dims> Tensor<T, D> {
    #[inline]
    pub fn zeroed(dims: D) -> Self {
        Self::filled(T::zero(), dims)
    }
    #[inline]
    pub fn fill_zero(&mut self) {
        self.data.fill(T::zero());
    }
}

impl<T, D: Dims> ITensor<D> for Tensor<T, D> {
    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }
    #[inline]
    fn dims(&self) -> &D {
        &self.dims
    }
}

impl<T, D: Dims> AsRef<[T]> for Tensor<T, D> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        &self.data
    }
}

impl<T, D: Dims> AsMut<[T]> for Tensor<T, D> {
    #[inline]
    fn as_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T, D: Dims> TensorBase<T, D> for Tensor<T, D> {}

impl<T, D: Dims> TensorBaseMut<T, D> for Tensor<T, D> {}

impl<T> Index<[usize; 2]> for Tensor2<T> {
    type Output = T;
    #[inline]
    fn index(&self, [row, col]: [usize; 2]) -> &T {
        assert!(col < self.dims.cols(), "Column {col} out of bounds for dims {}", self.dims);
        &self.data[row * self.dims.cols() + col]
    }
}

impl<T> IndexMut<[usize; 2]> for Tensor2<T> {
    #[inline]
    fn index_mut(&mut self, [row, col]: [usize; 2]) -> &mut T {
        assert!(col < self.dims.cols(), "Column {col} out of bounds for dims {}", self.dims);
        let cols = self.dims.cols();
        &mut self.data[row * cols + col]
    }
}

impl<'a, T, D: Dims> IntoIterator for &'a Tensor<T, D> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl<'a, T, D: Dims> IntoIterator for &'a mut Tensor<T, D> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.data.iter_mut()
    }
}

impl<T, D: Dims> IntoIterator for Tensor<T, D> {
    type Item = T;
    type IntoIter = IntoIter<T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

#[macro_export]
macro_rules! tensor {
    ($([$($x:expr),* $(,)*]),+ $(,)*) => {
        $crate::tensor::Tensor2::from_vec_2d(vec![$([$($x,)*],)*])
    };
    ($($x:expr),* $(,)*) => {
        $crate::tensor::Tensor1::from_vec_1d(vec![$($x,)*])
    };
}

#[cfg(test)]
mod test {
    use crate::tensor::{Dim2, Dim4, ITensor, Tensor, TensorBase};

    #[test]
    fn test_tensor_macro() {
        let t = tensor![[1, 2, 3], [4, 5, 6]];
        assert_eq!(t.dims(), &Dim2(2, 3));
        assert_eq!(t[[1, 0]], 4);
        assert_eq!(t.row(0), &[1, 2, 3]);
    }

    #[test]
    fn test_major_slice() {
        let t = Tensor::from_vec((0..24).collect(), Dim4(3, 2, 2, 2));
        let s = t.major_slice(1..3);
        assert_eq!(s.dims(), &Dim4(2, 2, 2, 2));
        assert_eq!(s.as_ref()[0], 8);
        assert_eq!(s.as_ref().len(), 16);
    }

    #[test]
    fn test_resize_major() {
        let mut t = Tensor::<f32, Dim2>::zeroed(Dim2(2, 5));
        t.resize_major(0.0, 4);
        assert_eq!(t.dims(), &Dim2(4, 5));
        assert_eq!(t.len(), 20);
    }

    #[test]
    fn test_reshape() {
        let t = Tensor::from_vec(vec![1.0; 784], Dim4(1, 28, 28, 1)).reshape(Dim2(1, 784));
        assert_eq!(t.dims(), &Dim2(1, 784));
    }
}
