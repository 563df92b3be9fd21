//! Whole-matrix Pearson front-ends built on [`MulticolumnAccumulator`].
//!
//! Rows are observations and columns are variables; the returned matrices are
//! `n_cols x n_cols`.

use log::debug;
use ndarray::{Array2, ArrayBase, Axis, Data, Ix2};
use num_traits::Float;
use rayon::prelude::*;

use crate::accumulator::MulticolumnAccumulator;
use crate::error::Result;
use crate::partial::PartialSum;
use crate::strided::BlockView;

/// Pearson coefficient of two equal-length samples.
pub fn pair<T: Float>(x: &[T], y: &[T]) -> Result<T> {
    Ok(PartialSum::from_slices(x, y)?.compute())
}

pub fn correlation_matrix<S, T>(data: &ArrayBase<S, Ix2>) -> Result<Array2<T>>
where
    S: Data<Elem = T>,
    T: Float,
{
    let mut acc = MulticolumnAccumulator::new(data.ncols())?;
    acc.accumulate_array(data)?;
    Ok(acc.results().to_matrix())
}

pub fn matrix<S, T>(data: &ArrayBase<S, Ix2>) -> Result<Array2<T>>
where
    S: Data<Elem = T>,
    T: Float,
{
    correlation_matrix(data)
}

/// Packed upper triangle (diagonal included), row-major.
pub fn correlation_upper_triangle<S, T>(data: &ArrayBase<S, Ix2>) -> Result<Vec<T>>
where
    S: Data<Elem = T>,
    T: Float,
{
    let mut acc = MulticolumnAccumulator::new(data.ncols())?;
    acc.accumulate_array(data)?;
    Ok(acc.results().to_upper_triangle())
}

/// Splits the rows into shards of `shard_rows`, accumulates each shard on the
/// rayon pool and merges the shards. `shard_rows == 0` picks one shard per
/// worker thread.
pub fn par_accumulate<S, T>(
    data: &ArrayBase<S, Ix2>,
    shard_rows: usize,
) -> Result<MulticolumnAccumulator<T>>
where
    S: Data<Elem = T> + Sync,
    T: Float + Send + Sync,
{
    let (n_rows, n_cols) = data.dim();
    let empty = MulticolumnAccumulator::new(n_cols)?;
    let shard_rows = if shard_rows == 0 {
        n_rows.div_ceil(rayon::current_num_threads()).max(1)
    } else {
        shard_rows
    };
    debug!(
        "accumulating {} rows in shards of {} across {} threads",
        n_rows,
        shard_rows,
        rayon::current_num_threads()
    );

    data.axis_chunks_iter(Axis(0), shard_rows)
        .into_par_iter()
        .map(|shard| -> Result<MulticolumnAccumulator<T>> {
            let mut acc = empty.clone();
            acc.accumulate_array(&shard)?;
            Ok(acc)
        })
        .try_reduce(
            || empty.clone(),
            |mut lhs, rhs| -> Result<MulticolumnAccumulator<T>> {
                lhs.merge_into(&rhs)?;
                Ok(lhs)
            },
        )
}

/// [`par_accumulate`] over a strided block, e.g. one chunk of a stream.
pub fn par_accumulate_block<T>(
    block: &BlockView<'_, T>,
    shard_rows: usize,
) -> Result<MulticolumnAccumulator<T>>
where
    T: Float + Send + Sync,
{
    let rows = block.rows();
    let empty = MulticolumnAccumulator::new(block.cols())?;
    let shard_rows = if shard_rows == 0 {
        rows.div_ceil(rayon::current_num_threads()).max(1)
    } else {
        shard_rows
    };

    (0..rows.div_ceil(shard_rows))
        .into_par_iter()
        .map(|s| -> Result<MulticolumnAccumulator<T>> {
            let start = s * shard_rows;
            let shard = block.sub_view(start, shard_rows.min(rows - start), 0, block.cols())?;
            let mut acc = empty.clone();
            acc.accumulate_block(&shard)?;
            Ok(acc)
        })
        .try_reduce(
            || empty.clone(),
            |mut lhs, rhs| -> Result<MulticolumnAccumulator<T>> {
                lhs.merge_into(&rhs)?;
                Ok(lhs)
            },
        )
}

pub fn par_correlation_matrix<S, T>(data: &ArrayBase<S, Ix2>) -> Result<Array2<T>>
where
    S: Data<Elem = T> + Sync,
    T: Float + Send + Sync,
{
    Ok(par_accumulate(data, 0)?.results().to_matrix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CorrError;

    #[test]
    fn pair_matches_hand_computation() {
        // x = 1..5, y = [2,4,5,4,5]; r = 6 / sqrt(10 * 6)
        let r = pair(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 5.0, 4.0, 5.0]).unwrap();
        assert!((r - 6.0 / 60.0f64.sqrt()).abs() < 1e-12);
        assert!(matches!(
            pair(&[1.0], &[1.0, 2.0]),
            Err(CorrError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn single_column_matrix_is_invalid() {
        let data = Array2::<f64>::zeros((4, 1));
        assert_eq!(
            correlation_matrix(&data).unwrap_err(),
            CorrError::InvalidSize { size: 1 }
        );
    }

    #[test]
    fn upper_triangle_layout() {
        let data = Array2::from_shape_vec((3, 3), vec![1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 3.0, 6.0, 9.0])
            .expect("matrix shape");
        let packed = correlation_upper_triangle(&data).unwrap();
        assert_eq!(packed.len(), 6);
        for v in packed {
            assert!((v - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        let data = Array2::from_shape_fn((97, 4), |(r, c)| {
            let x = r as f64;
            match c {
                0 => x,
                1 => (x * 0.37).sin(),
                2 => x * x - 3.0 * x,
                _ => ((r * 7919) % 13) as f64,
            }
        });
        let seq = correlation_matrix(&data).unwrap();
        for shard_rows in [0, 1, 10, 97, 500] {
            let acc = par_accumulate(&data, shard_rows).unwrap();
            assert_eq!(acc.rows(), 97);
            let par = acc.results().to_matrix();
            for (a, b) in seq.iter().zip(par.iter()) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn parallel_block_matches_sequential_block() {
        let flat: Vec<f64> = (0..60).map(|v| ((v * 37) % 11) as f64 - 0.5 * v as f64).collect();
        let block = BlockView::column_major(&flat, 20, 3).unwrap();
        let mut seq = MulticolumnAccumulator::new(3).unwrap();
        seq.accumulate_block(&block).unwrap();
        for shard_rows in [0, 3, 7, 20] {
            let par = par_accumulate_block(&block, shard_rows).unwrap();
            assert_eq!(par.rows(), 20);
            for ((_, a), (_, b)) in seq.results().iter().zip(par.results().iter()) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn parallel_on_empty_rows_gives_zeros() {
        let data = Array2::<f64>::zeros((0, 3));
        let acc = par_accumulate(&data, 0).unwrap();
        assert_eq!(acc.rows(), 0);
        assert!(acc.results().iter().all(|(_, r)| r == 0.0));
    }
}
