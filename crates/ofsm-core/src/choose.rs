// Memoized binomial coefficients and the combinatorial number system.

use crate::Symbol;

/// Error type for the combinatorial index table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChooseError {
    #[error("binomial coefficient C({n}, {k}) does not fit in 64 bits")]
    Overflow { n: usize, k: usize },
}

/// Triangular table of binomial coefficients C(n, k).
///
/// The table only grows: [`ensure`](Self::ensure) recomputes it whenever a
/// wider range is requested, after which [`get`](Self::get) is a single
/// indexed load.
///
/// Coefficients are stored row-major: `table[n * (max_k + 1) + k]`.
#[derive(Debug, Clone)]
pub struct ChooseTable {
    max_n: usize,
    max_k: usize,
    table: Vec<u64>,
}

impl Default for ChooseTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ChooseTable {
    /// Create a table covering only C(0, 0).
    pub fn new() -> Self {
        Self {
            max_n: 0,
            max_k: 0,
            table: vec![1],
        }
    }

    /// Largest `n` currently covered.
    pub fn max_n(&self) -> usize {
        self.max_n
    }

    /// Largest `k` currently covered.
    pub fn max_k(&self) -> usize {
        self.max_k
    }

    /// Grow the table so that C(i, j) is available for all i <= n, j <= k.
    ///
    /// Does nothing when the range is already covered. On overflow the
    /// existing table is left untouched.
    pub fn ensure(&mut self, n: usize, k: usize) -> Result<(), ChooseError> {
        if n <= self.max_n && k <= self.max_k {
            return Ok(());
        }
        let max_n = n.max(self.max_n);
        let max_k = k.max(self.max_k);
        let width = max_k + 1;
        let mut table = vec![0u64; (max_n + 1) * width];

        for i in 0..=max_n {
            table[i * width] = 1;
            for j in 1..=max_k.min(i) {
                let above_left = table[(i - 1) * width + j - 1];
                let above = table[(i - 1) * width + j];
                table[i * width + j] = above_left
                    .checked_add(above)
                    .ok_or(ChooseError::Overflow { n: i, k: j })?;
            }
        }

        self.max_n = max_n;
        self.max_k = max_k;
        self.table = table;
        Ok(())
    }

    /// C(n, k); zero when `k > n`.
    ///
    /// Panics if `(n, k)` lies outside the range passed to `ensure`.
    #[inline]
    pub fn get(&self, n: usize, k: usize) -> u64 {
        assert!(
            n <= self.max_n && k <= self.max_k,
            "C({n}, {k}) outside ensured range"
        );
        self.table[n * (self.max_k + 1) + k]
    }

    /// Combinatorial-number-system rank of a subset given in strictly
    /// ascending order: `sum C(subset[i], i + 1)`.
    ///
    /// The ranks of all m-subsets of `0..n` are exactly `0..C(n, m)`.
    pub fn rank(&self, ascending: &[Symbol]) -> u64 {
        debug_assert!(ascending.windows(2).all(|w| w[0] < w[1]));
        ascending
            .iter()
            .enumerate()
            .map(|(i, &c)| self.get(c as usize, i + 1))
            .sum()
    }

    /// Rank of `set` with `extra` inserted, without allocating.
    ///
    /// `set` must be ascending and must not contain `extra`.
    pub fn rank_with(&self, set: &[Symbol], extra: Symbol) -> u64 {
        let mut sum = 0;
        let mut position = 1;
        let mut inserted = false;
        for &c in set {
            if !inserted && extra < c {
                sum += self.get(extra as usize, position);
                position += 1;
                inserted = true;
            }
            sum += self.get(c as usize, position);
            position += 1;
        }
        if !inserted {
            sum += self.get(extra as usize, position);
        }
        sum
    }

    /// Inverse of [`rank`](Self::rank): the ascending `k`-subset whose rank
    /// is `rank`, written into `out`.
    ///
    /// Returns `false` if `rank` is not below C(max_n + 1, k), i.e. no such
    /// subset exists within the covered range.
    pub fn unrank(&self, mut rank: u64, k: usize, out: &mut Vec<Symbol>) -> bool {
        out.clear();
        // Members are strictly below `limit`.
        let mut limit = (self.max_n + 1).min(Symbol::MAX as usize + 1);
        for position in (1..=k).rev() {
            let mut c = limit;
            loop {
                if c == 0 {
                    return false;
                }
                c -= 1;
                if self.get(c, position) <= rank {
                    break;
                }
            }
            rank -= self.get(c, position);
            out.push(c as Symbol);
            limit = c;
        }
        out.reverse();
        rank == 0
    }
}
