//! Bounds-checked strided views over a backing slice.
//!
//! Element `k` of a [`Strided`] lives at `offset + k * stride`; element
//! `(r, c)` of a [`BlockView`] lives at `offset + r * row_stride + c * col_stride`.
//! `row_stride = cols, col_stride = 1` is row-major storage, the swap is
//! column-major, and anything else (e.g. a window into a larger matrix) is a
//! sub-view. Every view is validated once at construction so the hot loops can
//! index without further checks beyond the slice's own.

use crate::error::{CorrError, Result};

/// Index of the last addressed element plus one, or `None` on overflow.
fn required_len(offset: usize, extents: &[(usize, usize)]) -> Option<usize> {
    let mut last = offset;
    for &(len, stride) in extents {
        if len == 0 {
            return Some(0);
        }
        last = last.checked_add((len - 1).checked_mul(stride)?)?;
    }
    last.checked_add(1)
}

fn check_bounds(available: usize, offset: usize, extents: &[(usize, usize)]) -> Result<()> {
    match required_len(offset, extents) {
        Some(required) if required <= available => Ok(()),
        Some(required) => Err(CorrError::OutOfBounds {
            required,
            available,
        }),
        None => Err(CorrError::OutOfBounds {
            required: usize::MAX,
            available,
        }),
    }
}

/// One-dimensional strided view.
#[derive(Debug, Clone, Copy)]
pub struct Strided<'a, T> {
    data: &'a [T],
    offset: usize,
    len: usize,
    stride: usize,
}

impl<'a, T: Copy> Strided<'a, T> {
    pub fn new(data: &'a [T], offset: usize, len: usize, stride: usize) -> Result<Self> {
        if stride == 0 && len > 1 {
            return Err(CorrError::InvalidStride { axis: "view" });
        }
        check_bounds(data.len(), offset, &[(len, stride)])?;
        Ok(Self {
            data,
            offset,
            len,
            stride,
        })
    }

    /// Unit-stride view of the whole slice.
    pub fn contiguous(data: &'a [T]) -> Self {
        Self {
            data,
            offset: 0,
            len: data.len(),
            stride: 1,
        }
    }

    #[inline]
    pub fn get(&self, k: usize) -> T {
        debug_assert!(k < self.len);
        self.data[self.offset + k * self.stride]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        let (data, offset, stride) = (self.data, self.offset, self.stride);
        (0..self.len).map(move |k| data[offset + k * stride])
    }
}

/// Two-dimensional strided view: `rows` observations of `cols` variables.
#[derive(Debug, Clone, Copy)]
pub struct BlockView<'a, T> {
    data: &'a [T],
    offset: usize,
    rows: usize,
    cols: usize,
    row_stride: usize,
    col_stride: usize,
}

impl<'a, T: Copy> BlockView<'a, T> {
    pub fn new(
        data: &'a [T],
        offset: usize,
        rows: usize,
        cols: usize,
        row_stride: usize,
        col_stride: usize,
    ) -> Result<Self> {
        if row_stride == 0 && rows > 1 {
            return Err(CorrError::InvalidStride { axis: "rows" });
        }
        if col_stride == 0 && cols > 1 {
            return Err(CorrError::InvalidStride { axis: "columns" });
        }
        check_bounds(
            data.len(),
            offset,
            &[(rows, row_stride), (cols, col_stride)],
        )?;
        Ok(Self {
            data,
            offset,
            rows,
            cols,
            row_stride,
            col_stride,
        })
    }

    fn exact(data: &'a [T], rows: usize, cols: usize) -> Result<()> {
        let required = rows.checked_mul(cols).unwrap_or(usize::MAX);
        if required != data.len() {
            return Err(CorrError::OutOfBounds {
                required,
                available: data.len(),
            });
        }
        Ok(())
    }

    pub fn row_major(data: &'a [T], rows: usize, cols: usize) -> Result<Self> {
        Self::exact(data, rows, cols)?;
        Self::new(data, 0, rows, cols, cols, 1)
    }

    pub fn column_major(data: &'a [T], rows: usize, cols: usize) -> Result<Self> {
        Self::exact(data, rows, cols)?;
        Self::new(data, 0, rows, cols, 1, rows)
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> T {
        debug_assert!(r < self.rows && c < self.cols);
        self.data[self.offset + r * self.row_stride + c * self.col_stride]
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn col_stride(&self) -> usize {
        self.col_stride
    }

    pub fn row(&self, r: usize) -> Result<Strided<'a, T>> {
        if r >= self.rows {
            return Err(CorrError::OutOfBounds {
                required: r + 1,
                available: self.rows,
            });
        }
        Ok(Strided {
            data: self.data,
            offset: self.offset + r * self.row_stride,
            len: self.cols,
            stride: self.col_stride,
        })
    }

    pub fn column(&self, c: usize) -> Result<Strided<'a, T>> {
        if c >= self.cols {
            return Err(CorrError::OutOfBounds {
                required: c + 1,
                available: self.cols,
            });
        }
        Ok(Strided {
            data: self.data,
            offset: self.offset + c * self.col_stride,
            len: self.rows,
            stride: self.row_stride,
        })
    }

    /// Window of `rows x cols` starting at `(row_start, col_start)`.
    pub fn sub_view(
        &self,
        row_start: usize,
        rows: usize,
        col_start: usize,
        cols: usize,
    ) -> Result<Self> {
        let row_end = row_start.saturating_add(rows);
        if row_end > self.rows {
            return Err(CorrError::OutOfBounds {
                required: row_end,
                available: self.rows,
            });
        }
        let col_end = col_start.saturating_add(cols);
        if col_end > self.cols {
            return Err(CorrError::OutOfBounds {
                required: col_end,
                available: self.cols,
            });
        }
        Ok(Self {
            data: self.data,
            offset: self.offset + row_start * self.row_stride + col_start * self.col_stride,
            rows,
            cols,
            row_stride: self.row_stride,
            col_stride: self.col_stride,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_walks_every_other_element() {
        let data = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let view = Strided::new(&data, 1, 3, 2).unwrap();
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn contiguous_covers_whole_slice() {
        let data = [3.0, 1.0, 2.0];
        let view = Strided::contiguous(&data);
        assert_eq!(view.len(), 3);
        assert_eq!(view.stride(), 1);
        assert_eq!(view.get(2), 2.0);
        assert!(Strided::<f64>::contiguous(&[]).is_empty());
    }

    #[test]
    fn zero_stride_is_rejected_for_more_than_one_element() {
        let data = [1.0, 2.0];
        assert_eq!(
            Strided::new(&data, 0, 2, 0).unwrap_err(),
            CorrError::InvalidStride { axis: "view" }
        );
        assert!(Strided::new(&data, 1, 1, 0).is_ok());
    }

    #[test]
    fn out_of_bounds_view_is_rejected() {
        let data = [1.0; 5];
        assert_eq!(
            Strided::new(&data, 1, 3, 2).unwrap_err(),
            CorrError::OutOfBounds {
                required: 6,
                available: 5
            }
        );
        assert!(BlockView::new(&data, 0, 3, 2, 2, 1).is_err());
    }

    #[test]
    fn row_and_column_major_address_the_same_matrix() {
        // 2 x 3 matrix [[1,2,3],[4,5,6]]
        let rm = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let cm = [1.0, 4.0, 2.0, 5.0, 3.0, 6.0];
        let a = BlockView::row_major(&rm, 2, 3).unwrap();
        let b = BlockView::column_major(&cm, 2, 3).unwrap();
        for r in 0..2 {
            for c in 0..3 {
                assert_eq!(a.get(r, c), b.get(r, c));
            }
        }
        assert_eq!(a.column(1).unwrap().iter().collect::<Vec<_>>(), vec![2.0, 5.0]);
        assert_eq!(b.row(1).unwrap().iter().collect::<Vec<_>>(), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn row_and_column_indices_are_checked() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let block = BlockView::row_major(&data, 2, 3).unwrap();
        assert_eq!(
            block.row(2).unwrap_err(),
            CorrError::OutOfBounds {
                required: 3,
                available: 2
            }
        );
        assert_eq!(
            block.column(3).unwrap_err(),
            CorrError::OutOfBounds {
                required: 4,
                available: 3
            }
        );
        assert_eq!(block.row(0).unwrap().len(), 3);
    }

    #[test]
    fn sub_view_offsets_into_parent() {
        let data: Vec<f64> = (0..12).map(|v| v as f64).collect();
        let full = BlockView::row_major(&data, 3, 4).unwrap();
        let sub = full.sub_view(1, 2, 1, 2).unwrap();
        assert_eq!(sub.get(0, 0), 5.0);
        assert_eq!(sub.get(1, 1), 10.0);
        assert!(full.sub_view(2, 2, 0, 1).is_err());
    }

    #[test]
    fn row_major_requires_exact_length() {
        let data = [1.0; 5];
        assert!(BlockView::row_major(&data, 2, 3).is_err());
    }
}
