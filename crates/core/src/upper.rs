//! Linearisation of the strict upper triangle of an `n x n` matrix.
//!
//! Pairs `(a, b)` with `a < b < n` are numbered row by row:
//! `(0,1), (0,2), .., (0,n-1), (1,2), .., (n-2,n-1)`. Row `a` holds `n - 1 - a`
//! pairs and starts at [`row_offset`]`(n, a)`.

use std::fmt;

use crate::error::{CorrError, Result};

/// Number of unordered pairs of distinct values in `[0, n)`, saturating at
/// `usize::MAX` when the count does not fit.
pub fn upper_triangular_len(n: usize) -> usize {
    checked_upper_triangular_len(n).unwrap_or(usize::MAX)
}

/// Number of unordered pairs of distinct values in `[0, n)`, or `None` when
/// it does not fit in `usize`.
pub fn checked_upper_triangular_len(n: usize) -> Option<usize> {
    halved_product(n, n.saturating_sub(1))
}

/// Length of a packed upper triangle that keeps the diagonal.
pub fn upper_triangular_len_with_diagonal(n: usize) -> usize {
    upper_triangular_len(n.saturating_add(1))
}

/// Linear index of the first pair in row `a`. Does not validate `a`; the
/// result is exact whenever `a < n` and `n` has a representable pair count.
#[inline]
pub fn row_offset(n: usize, a: usize) -> usize {
    halved_product(a, n + (n - a - 1)).unwrap_or(usize::MAX)
}

// x * y / 2 for x * y even, halving the even factor first so the product only
// overflows when the result does.
fn halved_product(x: usize, y: usize) -> Option<usize> {
    if x % 2 == 0 {
        (x / 2).checked_mul(y)
    } else {
        x.checked_mul(y / 2)
    }
}

fn triangular(k: usize) -> usize {
    halved_product(k, k + 1).unwrap_or(usize::MAX)
}

/// Largest `k` with `k * (k + 1) / 2 <= m`.
fn inverse_triangular(m: usize) -> usize {
    let mut k = ((8.0 * m as f64 + 1.0).sqrt() - 1.0) as usize / 2;
    while k > 0 && triangular(k) > m {
        k -= 1;
    }
    while triangular(k + 1) <= m {
        k += 1;
    }
    k
}

/// Pair count of `n` columns, rejecting sizes without pairs or whose pair
/// count overflows.
fn checked_size(n: usize) -> Result<usize> {
    match checked_upper_triangular_len(n) {
        Some(limit) if n >= 2 => Ok(limit),
        _ => Err(CorrError::InvalidSize { size: n }),
    }
}

/// Pair at linear position `i`.
pub fn pair_at(n: usize, i: usize) -> Result<(usize, usize)> {
    let limit = checked_size(n)?;
    if i >= limit {
        return Err(CorrError::IndexOutOfRange { index: i, limit });
    }
    // count from the last pair, where row lengths grow 1, 2, 3, ..
    let m = limit - 1 - i;
    let k = inverse_triangular(m);
    let a = n - 2 - k;
    let b = n - 1 - (m - triangular(k));
    Ok((a, b))
}

/// Linear position of the unordered pair `{a, b}`.
pub fn pair_index(n: usize, a: usize, b: usize) -> Result<usize> {
    checked_size(n)?;
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    if a == b || b >= n {
        return Err(CorrError::IndexOutOfRange {
            index: b.max(a),
            limit: n,
        });
    }
    Ok(row_offset(n, a) + (b - a - 1))
}

/// Every pair of `[0, n)` in canonical order. Empty when `n < 2`.
pub fn pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |a| (a + 1..n).map(move |b| (a, b)))
}

/// Cursor over the pairs of `[0, n)`, starting anywhere in canonical order.
///
/// Reaching `(n-2, n-1)` raises the `last` flag; advancing once more marks the
/// cursor finished and leaves the pair in place. Further advances do nothing.
#[derive(Debug, Clone)]
pub struct PairIndex {
    n: usize,
    index: usize,
    first: usize,
    second: usize,
    last: bool,
    finished: bool,
}

impl PairIndex {
    pub fn new(n: usize, index: usize) -> Result<Self> {
        let (first, second) = pair_at(n, index)?;
        Ok(Self {
            n,
            index,
            first,
            second,
            last: index + 1 == upper_triangular_len(n),
            finished: false,
        })
    }

    pub fn first(&self) -> usize {
        self.first
    }

    pub fn second(&self) -> usize {
        self.second
    }

    pub fn as_pair(&self) -> (usize, usize) {
        (self.first, self.second)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn is_last(&self) -> bool {
        self.last
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn advance(&mut self) -> &mut Self {
        if self.last {
            self.finished = true;
            return self;
        }
        self.index += 1;
        if self.second + 1 == self.n {
            self.first += 1;
            self.second = self.first + 1;
        } else {
            self.second += 1;
        }
        if self.first + 2 == self.n && self.second + 1 == self.n {
            self.last = true;
        }
        self
    }
}

impl PartialEq for PairIndex {
    fn eq(&self, other: &Self) -> bool {
        self.n == other.n && self.index == other.index
    }
}

impl Eq for PairIndex {}

impl Iterator for PairIndex {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let pair = self.as_pair();
        self.advance();
        Some(pair)
    }
}

impl fmt::Display for PairIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.first, self.second)
    }
}
