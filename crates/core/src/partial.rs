//! Sufficient statistics of the Pearson correlation coefficient for one pair
//! of columns.
//!
//! See <https://en.wikipedia.org/wiki/Pearson_correlation_coefficient>. The
//! five running sums plus the sample count are enough to recover the
//! coefficient, and two partial sums over disjoint samples combine by
//! field-wise addition. That makes the state cheap to shard across workers and
//! fold back together in any order.

use num_traits::{Float, NumCast};

use crate::error::{CorrError, Result};
use crate::strided::Strided;

/// Converts a sample count into the accumulator's float type.
fn count_as<T: Float>(count: u64) -> T {
    <T as NumCast>::from(count).unwrap_or_else(T::infinity)
}

/// `sum_sq - sum^2 / n`, flushed to zero when it does not exceed the rounding
/// error that summing `n` samples can leave behind (`4 n eps sum_sq`).
fn centered<T: Float>(sum: T, sum_sq: T, n: T) -> T {
    let var = sum_sq - (sum * sum) / n;
    let noise = count_as::<T>(4) * n * T::epsilon() * sum_sq;
    if var <= noise {
        T::zero()
    } else {
        var
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialSum<T = f64> {
    count: u64,
    sum1: T,
    sum2: T,
    sum1_sq: T,
    sum2_sq: T,
    sum_prod: T,
}

impl<T: Float> Default for PartialSum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> PartialSum<T> {
    /// Empty state, the identity of [`merge`](Self::merge).
    pub fn new() -> Self {
        Self {
            count: 0,
            sum1: T::zero(),
            sum2: T::zero(),
            sum1_sq: T::zero(),
            sum2_sq: T::zero(),
            sum_prod: T::zero(),
        }
    }

    /// State holding exactly one observation.
    pub fn single(v1: T, v2: T) -> Self {
        Self {
            count: 1,
            sum1: v1,
            sum2: v2,
            sum1_sq: v1 * v1,
            sum2_sq: v2 * v2,
            sum_prod: v1 * v2,
        }
    }

    pub fn from_parts(count: u64, sum1: T, sum2: T, sum1_sq: T, sum2_sq: T, sum_prod: T) -> Self {
        Self {
            count,
            sum1,
            sum2,
            sum1_sq,
            sum2_sq,
            sum_prod,
        }
    }

    /// Accumulates two equal-length sequences of paired observations.
    pub fn from_slices(v1: &[T], v2: &[T]) -> Result<Self> {
        if v1.len() != v2.len() {
            return Err(CorrError::LengthMismatch {
                left: v1.len(),
                right: v2.len(),
            });
        }
        let mut ans = Self::new();
        ans.extend(v1.iter().copied().zip(v2.iter().copied()));
        Ok(ans)
    }

    /// Same as [`from_slices`](Self::from_slices) over scattered storage,
    /// e.g. two columns of a row-major buffer.
    pub fn from_strided(v1: Strided<'_, T>, v2: Strided<'_, T>) -> Result<Self> {
        if v1.len() != v2.len() {
            return Err(CorrError::LengthMismatch {
                left: v1.len(),
                right: v2.len(),
            });
        }
        let mut ans = Self::new();
        ans.extend(v1.iter().zip(v2.iter()));
        Ok(ans)
    }

    /// Adds one observation.
    #[inline]
    pub fn accumulate(&mut self, v1: T, v2: T) -> &mut Self {
        self.sum1 = self.sum1 + v1;
        self.sum2 = self.sum2 + v2;
        self.sum1_sq = self.sum1_sq + v1 * v1;
        self.sum2_sq = self.sum2_sq + v2 * v2;
        self.sum_prod = self.sum_prod + v1 * v2;
        self.count += 1;
        self
    }

    /// Field-wise sum. Associative and commutative up to rounding.
    pub fn merge(&self, other: &Self) -> Self {
        let mut ans = *self;
        ans.merge_into(other);
        ans
    }

    pub fn merge_into(&mut self, other: &Self) -> &mut Self {
        self.count += other.count;
        self.sum1 = self.sum1 + other.sum1;
        self.sum2 = self.sum2 + other.sum2;
        self.sum1_sq = self.sum1_sq + other.sum1_sq;
        self.sum2_sq = self.sum2_sq + other.sum2_sq;
        self.sum_prod = self.sum_prod + other.sum_prod;
        self
    }

    /// Pearson correlation coefficient of the accumulated samples.
    ///
    /// Returns 0 when nothing was accumulated or when either column has zero
    /// variance. Those cases are statistically undefined, so a 0 here cannot be
    /// told apart from a genuinely uncorrelated pair; check [`count`](Self::count)
    /// and the variances when that distinction matters. A centered sum of
    /// squares within summation rounding of zero counts as zero variance, so a
    /// constant column such as `[0.1; n]` is reported as constant. The result
    /// is not clamped and rounding may put it marginally outside [-1, 1].
    pub fn compute(&self) -> T {
        if self.count == 0 {
            return T::zero();
        }
        let n: T = count_as(self.count);
        let var1 = centered(self.sum1, self.sum1_sq, n);
        let var2 = centered(self.sum2, self.sum2_sq, n);
        if var1 == T::zero() || var2 == T::zero() {
            return T::zero();
        }
        let num = self.sum_prod - (self.sum1 * self.sum2) / n;
        num / (var1 * var2).sqrt()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum1(&self) -> T {
        self.sum1
    }

    pub fn sum2(&self) -> T {
        self.sum2
    }

    pub fn sum1_sq(&self) -> T {
        self.sum1_sq
    }

    pub fn sum2_sq(&self) -> T {
        self.sum2_sq
    }

    pub fn sum_prod(&self) -> T {
        self.sum_prod
    }
}

impl<T: Float> Extend<(T, T)> for PartialSum<T> {
    fn extend<I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) {
        for (v1, v2) in iter {
            self.accumulate(v1, v2);
        }
    }
}
