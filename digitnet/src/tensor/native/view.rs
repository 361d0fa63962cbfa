use crate::tensor::{Dims, ITensor, TensorBase, TensorBaseMut};

#[derive(Copy, Clone, PartialEq)]
pub struct TensorView<'a, T, D: Dims> {
    data: &'a [T],
    dims: D,
}

pub type TensorView1<'a, T> = TensorView<'a, T, crate::tensor::Dim1>;
pub type TensorView2<'a, T> = TensorView<'a, T, crate::tensor::Dim2>;
pub type TensorView4<'a, T> = TensorView<'a, T, crate::tensor::Dim4>;

impl<'a, T, D: Dims> TensorView<'a, T, D> {
    pub fn from_slice(data: &'a [T], dims: D) -> Self {
        assert_eq!(
            data.len(),
            dims.tensor_len(),
            "Slice of length {} does not match dims {dims}",
            data.len()
        );
        TensorView { data, dims }
    }

    #[inline]
    pub fn reshape<E: Dims>(self, dims: E) -> TensorView<'a, T, E> {
        TensorView::from_slice(self.data, dims)
    }

    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }
}

impl<T, D: Dims> ITensor<D> for TensorView<'_, T, D> {
    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }
    #[inline]
    fn dims(&self) -> &D {
        &self.dims
    }
}

impl<T, D: Dims> AsRef<[T]> for TensorView<'_, T, D> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        self.data
    }
}

impl<T, D: Dims> TensorBase<T, D> for TensorView<'_, T, D> {}

pub struct TensorViewMut<'a, T, D: Dims> {
    data: &'a mut [T],
    dims: D,
}

impl<'a, T, D: Dims> TensorViewMut<'a, T, D> {
    pub fn from_slice(data: &'a mut [T], dims: D) -> Self {
        assert_eq!(
            data.len(),
            dims.tensor_len(),
            "Slice of length {} does not match dims {dims}",
            data.len()
        );
        TensorViewMut { data, dims }
    }
}

impl<T, D: Dims> ITensor<D> for TensorViewMut<'_, T, D> {
    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }
    #[inline]
    fn dims(&self) -> &D {
        &self.dims
    }
}

impl<T, D: Dims> AsRef<[T]> for TensorViewMut<'_, T, D> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        &*self.data
    }
}

impl<T, D: Dims> AsMut<[T]> for TensorViewMut<'_, T, D> {
    #[inline]
    fn as_mut(&mut self) -> &mut [T] {
        &mut *self.data
    }
}

impl<T, D: Dims> TensorBase<T, D> for TensorViewMut<'_, T, D> {}

impl<T, D: Dims> TensorBaseMut<T, D> for TensorViewMut<'_, T, D> {}
