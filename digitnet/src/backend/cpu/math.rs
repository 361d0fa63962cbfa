use crate::dtype::DType;
use crate::tensor::{Dim2, ITensor, TensorBase, TensorBaseMut};
use std::cmp::Ordering;

/// index of the largest element, the first one wins on ties
pub fn argmax<T: PartialOrd>(a: &[T]) -> usize {
    let mut best = 0;
    for (i, x) in a.iter().enumerate().skip(1) {
        if x.partial_cmp(&a[best]) == Some(Ordering::Greater) {
            best = i;
        }
    }
    best
}

pub trait DTypeOps: DType {
    #[allow(clippy::too_many_arguments)]
    fn matrix_multiply<A, B, C>(alpha: Self, a: &A, ta: bool, b: &B, tb: bool, beta: Self, c: &mut C)
    where
        A: TensorBase<Self, Dim2>,
        B: TensorBase<Self, Dim2>,
        C: TensorBaseMut<Self, Dim2>;
}

macro_rules! implement_dtype_ops {
    ($t: ident, $g: ident) => {
        impl DTypeOps for $t {
            fn matrix_multiply<A, B, C>(alpha: Self, a: &A, ta: bool, b: &B, tb: bool, beta: Self, c: &mut C)
            where
                A: TensorBase<Self, Dim2>,
                B: TensorBase<Self, Dim2>,
                C: TensorBaseMut<Self, Dim2>,
            {
                let &Dim2(a_rows, a_cols) = a.dims();
                let &Dim2(b_rows, b_cols) = b.dims();
                let (m, k, rsa, csa) = if ta {
                    (a_cols, a_rows, 1, a_cols as isize)
                } else {
                    (a_rows, a_cols, a_cols as isize, 1)
                };
                let (n, rsb, csb) = if tb {
                    assert_eq!(b_cols, k, "Inner dimensions do not match");
                    (b_rows, 1, b_cols as isize)
                } else {
                    assert_eq!(b_rows, k, "Inner dimensions do not match");
                    (b_cols, b_cols as isize, 1)
                };
                assert_eq!(c.dims(), &Dim2(m, n), "Invalid dimensions for output matrix");
                if m == 0 || n == 0 {
                    return;
                }
                let (rsc, csc) = (n as isize, 1);
                // SAFETY: the strides above describe row-major matrices whose
                // lengths were checked against their dims
                unsafe {
                    matrixmultiply::$g(
                        m,
                        k,
                        n,
                        alpha,
                        a.as_ref().as_ptr(),
                        rsa,
                        csa,
                        b.as_ref().as_ptr(),
                        rsb,
                        csb,
                        beta,
                        c.as_mut().as_mut_ptr(),
                        rsc,
                        csc,
                    );
                }
            }
        }
    };
}

implement_dtype_ops!(f32, sgemm);
implement_dtype_ops!(f64, dgemm);
