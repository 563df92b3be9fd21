//! Streaming accumulator for the Pearson correlation of every column pair.
//!
//! Only per-column totals and one cross-product total per pair are kept, so
//! memory is `O(N + N(N-1)/2)` no matter how many rows go through. Rows can be
//! fed one at a time, as strided blocks, or as ndarray views. Accumulators
//! built on disjoint rows merge into the accumulator of their union, which is
//! how shards are reduced (see [`crate::pearson::par_accumulate`]).

use log::{debug, trace};
use ndarray::{ArrayBase, Data, Ix2};
use num_traits::Float;

use crate::error::{CorrError, Result};
use crate::partial::PartialSum;
use crate::results::PairResults;
use crate::strided::BlockView;
use crate::upper::{checked_upper_triangular_len, pair_index, pairs, row_offset};

#[derive(Debug, Clone, PartialEq)]
pub struct MulticolumnAccumulator<T = f64> {
    columns: usize,
    totals: Vec<T>,
    squared_totals: Vec<T>,
    // pair (i, j) lives at upper::pair_index(columns, i, j)
    cross_totals: Vec<T>,
    row_count: u64,
}

impl<T: Float> MulticolumnAccumulator<T> {
    pub fn new(columns: usize) -> Result<Self> {
        let pair_count = match checked_upper_triangular_len(columns) {
            Some(len) if columns >= 2 => len,
            _ => return Err(CorrError::InvalidSize { size: columns }),
        };
        Ok(Self {
            columns,
            totals: vec![T::zero(); columns],
            squared_totals: vec![T::zero(); columns],
            cross_totals: vec![T::zero(); pair_count],
            row_count: 0,
        })
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> u64 {
        self.row_count
    }

    pub fn totals(&self) -> &[T] {
        &self.totals
    }

    pub fn squared_totals(&self) -> &[T] {
        &self.squared_totals
    }

    pub fn cross_totals(&self) -> &[T] {
        &self.cross_totals
    }

    /// Drops everything accumulated so far, keeping the column count.
    pub fn reset(&mut self) {
        self.totals.fill(T::zero());
        self.squared_totals.fill(T::zero());
        self.cross_totals.fill(T::zero());
        self.row_count = 0;
    }

    fn check_columns(&self, found: usize) -> Result<()> {
        if found != self.columns {
            return Err(CorrError::ColumnCountMismatch {
                expected: self.columns,
                found,
            });
        }
        Ok(())
    }

    /// Adds one observation of every column.
    pub fn accumulate_row(&mut self, row: &[T]) -> Result<()> {
        self.check_columns(row.len())?;
        self.accumulate_with(1, |_, c| row[c]);
        Ok(())
    }

    /// Adds every row of a strided block, whatever its memory layout.
    pub fn accumulate_block(&mut self, block: &BlockView<'_, T>) -> Result<()> {
        self.check_columns(block.cols())?;
        trace!(
            "accumulating {}x{} block (row stride {}, column stride {})",
            block.rows(),
            block.cols(),
            block.row_stride(),
            block.col_stride()
        );
        self.accumulate_with(block.rows(), |r, c| block.get(r, c));
        Ok(())
    }

    /// Adds `rows x cols` elements where `(r, c)` sits at
    /// `data[r * row_stride + c * col_stride]`.
    pub fn accumulate_strided(
        &mut self,
        data: &[T],
        rows: usize,
        cols: usize,
        row_stride: usize,
        col_stride: usize,
    ) -> Result<()> {
        self.check_columns(cols)?;
        let block = BlockView::new(data, 0, rows, cols, row_stride, col_stride)?;
        self.accumulate_block(&block)
    }

    /// Adds every row of an ndarray matrix (rows are observations, columns
    /// are variables). Any layout ndarray can describe is accepted.
    pub fn accumulate_array<S>(&mut self, data: &ArrayBase<S, Ix2>) -> Result<()>
    where
        S: Data<Elem = T>,
    {
        let (n_rows, n_cols) = data.dim();
        self.check_columns(n_cols)?;
        self.accumulate_with(n_rows, |r, c| data[[r, c]]);
        Ok(())
    }

    // Per-column totals first, then per-pair cross products. Each element goes
    // into the same slots in the same order as row-at-a-time accumulation.
    fn accumulate_with<F>(&mut self, rows: usize, get: F)
    where
        F: Fn(usize, usize) -> T,
    {
        let n = self.columns;
        for r in 0..rows {
            for c in 0..n {
                let v = get(r, c);
                self.totals[c] = self.totals[c] + v;
                self.squared_totals[c] = self.squared_totals[c] + v * v;
            }
        }
        for r in 0..rows {
            for a in 0..n - 1 {
                let va = get(r, a);
                let start = row_offset(n, a);
                let span = &mut self.cross_totals[start..start + n - 1 - a];
                for (k, slot) in span.iter_mut().enumerate() {
                    *slot = *slot + va * get(r, a + 1 + k);
                }
            }
        }
        self.row_count += rows as u64;
    }

    /// Folds `other` into `self`.
    pub fn merge_into(&mut self, other: &Self) -> Result<()> {
        if self.columns != other.columns {
            return Err(CorrError::SizeMismatch {
                left: self.columns,
                right: other.columns,
            });
        }
        for (acc, v) in self.totals.iter_mut().zip(&other.totals) {
            *acc = *acc + *v;
        }
        for (acc, v) in self.squared_totals.iter_mut().zip(&other.squared_totals) {
            *acc = *acc + *v;
        }
        for (acc, v) in self.cross_totals.iter_mut().zip(&other.cross_totals) {
            *acc = *acc + *v;
        }
        debug!(
            "merged {} rows into {} rows over {} columns",
            other.row_count, self.row_count, self.columns
        );
        self.row_count += other.row_count;
        Ok(())
    }

    /// Accumulator over the rows of both `a` and `b`. Associative and
    /// commutative, so shards can be reduced in any order and tree shape.
    pub fn merge(a: &Self, b: &Self) -> Result<Self> {
        let mut ans = a.clone();
        ans.merge_into(b)?;
        Ok(ans)
    }

    /// Sufficient statistics of the column pair `(i, j)`, with column `i` as
    /// the first variable.
    pub fn partial(&self, i: usize, j: usize) -> Result<PartialSum<T>> {
        let idx = pair_index(self.columns, i, j)?;
        Ok(PartialSum::from_parts(
            self.row_count,
            self.totals[i],
            self.totals[j],
            self.squared_totals[i],
            self.squared_totals[j],
            self.cross_totals[idx],
        ))
    }

    /// Pearson coefficient of every pair, in canonical pair order.
    pub fn results(&self) -> PairResults<T> {
        let values = pairs(self.columns)
            .zip(&self.cross_totals)
            .map(|((i, j), &cross)| {
                PartialSum::from_parts(
                    self.row_count,
                    self.totals[i],
                    self.totals[j],
                    self.squared_totals[i],
                    self.squared_totals[j],
                    cross,
                )
                .compute()
            })
            .collect();
        PairResults::new(self.columns, values)
    }
}
