use crate::tensor::{Dims, ITensor, Tensor, TensorView, TensorViewMut};
use std::ops::Range;
use std::slice::{ChunksExact, ChunksExactMut};

pub trait TensorBase<T, D: Dims>: ITensor<D> + AsRef<[T]> {
    #[inline]
    fn view(&self) -> TensorView<'_, T, D> {
        TensorView::from_slice(self.as_ref(), *self.dims())
    }

    /// reinterprets the same row-major data with different dims of equal length
    #[inline]
    fn view_as<E: Dims>(&self, dims: E) -> TensorView<'_, T, E> {
        TensorView::from_slice(self.as_ref(), dims)
    }

    #[inline]
    fn iter_major_axis(&self) -> ChunksExact<'_, T> {
        self.as_ref().chunks_exact(self.dims().inner_len().max(1))
    }

    /// view of the entries `range` along the first axis
    fn major_slice(&self, range: Range<usize>) -> TensorView<'_, T, D> {
        let inner = self.dims().inner_len();
        assert!(
            range.end <= self.dims().first(),
            "Range {range:?} out of bounds for dims {}",
            self.dims()
        );
        let dims = self.dims().with_resized_first_axis(range.len());
        TensorView::from_slice(&self.as_ref()[range.start * inner..range.end * inner], dims)
    }

    fn to_owned_tensor(&self) -> Tensor<T, D>
    where
        T: Clone,
    {
        Tensor::from_vec(self.as_ref().to_vec(), *self.dims())
    }
}

pub trait TensorBaseMut<T, D: Dims>: TensorBase<T, D> + AsMut<[T]> {
    #[inline]
    fn view_mut(&mut self) -> TensorViewMut<'_, T, D> {
        let dims = *self.dims();
        TensorViewMut::from_slice(self.as_mut(), dims)
    }

    #[inline]
    fn view_as_mut<E: Dims>(&mut self, dims: E) -> TensorViewMut<'_, T, E> {
        TensorViewMut::from_slice(self.as_mut(), dims)
    }

    #[inline]
    fn iter_major_axis_mut(&mut self) -> ChunksExactMut<'_, T> {
        let inner = self.dims().inner_len().max(1);
        self.as_mut().chunks_exact_mut(inner)
    }
}
