use ndarray::Array2;
use num_traits::Float;

use crate::upper::{pair_index, pairs, upper_triangular_len, upper_triangular_len_with_diagonal};

/// Pairwise coefficients stored densely in canonical pair order.
#[derive(Debug, Clone, PartialEq)]
pub struct PairResults<T = f64> {
    columns: usize,
    values: Vec<T>,
}

impl<T: Float> PairResults<T> {
    pub(crate) fn new(columns: usize, values: Vec<T>) -> Self {
        debug_assert_eq!(values.len(), upper_triangular_len(columns));
        Self { columns, values }
    }

    /// Coefficient for the unordered pair `{i, j}`; `None` for `i == j` or
    /// indices outside the accumulator.
    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        pair_index(self.columns, i, j)
            .ok()
            .map(|idx| self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), T)> + '_ {
        pairs(self.columns).zip(self.values.iter().copied())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<T> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Symmetric `columns x columns` matrix with a unit diagonal.
    pub fn to_matrix(&self) -> Array2<T> {
        let mut corr = Array2::<T>::from_elem((self.columns, self.columns), T::one());
        for ((i, j), r) in self.iter() {
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
        corr
    }

    /// Row-major packed upper triangle including the diagonal.
    pub fn to_upper_triangle(&self) -> Vec<T> {
        let mut packed = Vec::with_capacity(upper_triangular_len_with_diagonal(self.columns));
        let mut rest = self.values.as_slice();
        for i in 0..self.columns {
            let (row, tail) = rest.split_at(self.columns - 1 - i);
            packed.push(T::one());
            packed.extend_from_slice(row);
            rest = tail;
        }
        packed
    }
}
