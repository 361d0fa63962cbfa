use std::fmt::{Debug, Display, Formatter, Write};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim1(pub usize);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim2(pub usize, pub usize);

impl Dim2 {
    #[inline]
    pub fn rows(&self) -> usize {
        self.0
    }
    #[inline]
    pub fn cols(&self) -> usize {
        self.1
    }
}

/// Three axes. Feature maps use it as (height, width, channels).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim3(pub usize, pub usize, pub usize);

impl Dim3 {
    #[inline]
    pub fn height(&self) -> usize {
        self.0
    }
    #[inline]
    pub fn width(&self) -> usize {
        self.1
    }
    #[inline]
    pub fn channels(&self) -> usize {
        self.2
    }
}

/// Four axes, used for NHWC image batches.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim4(pub usize, pub usize, pub usize, pub usize);

pub trait Dims: Copy + Debug + Eq + Display {
    const N: usize;
    const ZERO: Self;
    fn first(&self) -> usize;
    fn tensor_len(&self) -> usize;
    fn as_vec(&self) -> Vec<usize>;
    fn with_resized_first_axis(&self, size: usize) -> Self;

    /// number of elements in one entry of the first axis
    #[inline]
    fn inner_len(&self) -> usize {
        let first = self.first();
        if first == 0 {
            self.with_resized_first_axis(1).tensor_len()
        } else {
            self.tensor_len() / first
        }
    }
}

fn fmt_axes(axes: &[usize], f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_char('(')?;
    for (i, axis) in axes.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        Display::fmt(axis, f)?;
    }
    f.write_char(')')
}

impl Dims for Dim1 {
    const N: usize = 1;
    const ZERO: Self = Dim1(0);
    #[inline]
    fn first(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0]
    }
    fn with_resized_first_axis(&self, size: usize) -> Self {
        Dim1(size)
    }
}

impl Display for Dim1 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_axes(&[self.0], f)
    }
}

impl Dims for Dim2 {
    const N: usize = 2;
    const ZERO: Self = Dim2(0, 0);
    #[inline]
    fn first(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0 * self.1
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0, self.1]
    }
    fn with_resized_first_axis(&self, size: usize) -> Self {
        Dim2(size, self.1)
    }
}

impl Display for Dim2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_axes(&[self.0, self.1], f)
    }
}

impl Dims for Dim3 {
    const N: usize = 3;
    const ZERO: Self = Dim3(0, 0, 0);
    #[inline]
    fn first(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0 * self.1 * self.2
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0, self.1, self.2]
    }
    fn with_resized_first_axis(&self, size: usize) -> Self {
        Dim3(size, self.1, self.2)
    }
}

impl Display for Dim3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_axes(&[self.0, self.1, self.2], f)
    }
}

impl Dims for Dim4 {
    const N: usize = 4;
    const ZERO: Self = Dim4(0, 0, 0, 0);
    #[inline]
    fn first(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0 * self.1 * self.2 * self.3
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0, self.1, self.2, self.3]
    }
    fn with_resized_first_axis(&self, size: usize) -> Self {
        Dim4(size, self.1, self.2, self.3)
    }
}

impl Display for Dim4 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_axes(&[self.0, self.1, self.2, self.3], f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_inner_len() {
        assert_eq!(Dim4(5, 28, 28, 1).inner_len(), 784);
        assert_eq!(Dim4(0, 28, 28, 1).inner_len(), 784);
        assert_eq!(Dim2(3, 10).inner_len(), 10);
        assert_eq!(Dim1(7).inner_len(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(Dim4(1, 28, 28, 1).to_string(), "(1, 28, 28, 1)");
        assert_eq!(Dim2(512, 10).to_string(), "(512, 10)");
    }
}
