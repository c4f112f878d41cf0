use serde::{Deserialize, Serialize};

use crate::slicer::Projection;

/// How the partial subset of a slice is selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingPolicy {
    /// Take `k` evenly strided entries of both sorted sequences and pair them
    /// in order. O(k).
    #[default]
    Strided,
    /// Take `k` evenly strided entries of the smaller sequence and inject them
    /// into the larger one with the minimal total squared cost.
    /// O(k * (n_large - k + 1)) time and bits, capped by [`MAX_OPTIMAL_CELLS`].
    Optimal,
}

/// A source/target pair of one slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialMatch {
    /// Index of the point in the source cloud.
    pub source_index: usize,
    /// Index of the point in the target cloud.
    pub target_index: usize,
    /// Projection of the source point.
    pub source_value: f64,
    /// Projection of the target point.
    pub target_value: f64,
}

impl PartialMatch {
    fn new(source: &Projection, target: &Projection) -> Self {
        Self {
            source_index: source.index,
            target_index: target.index,
            source_value: source.value,
            target_value: target.value,
        }
    }

    /// Signed 1d displacement from the source to the target.
    #[inline]
    pub fn offset(&self) -> f64 {
        self.target_value - self.source_value
    }

    /// Squared 1d transport cost.
    #[inline]
    pub fn cost(&self) -> f64 {
        self.offset() * self.offset()
    }
}

/// Number of pairs matched in a slice: `round(ratio * min(ns, nt))`.
pub fn num_matches(num_source: usize, num_target: usize, ratio: f64) -> usize {
    let n = num_source.min(num_target);
    ((ratio * n as f64).round() as usize).min(n)
}

/// `k` evenly strided positions in `[0, len)`, strictly increasing.
///
/// Position `i` is `floor((i + 0.5) * len / k)`.
///
/// PRECONDITION: `k <= len`.
pub fn strided_positions(len: usize, k: usize) -> impl Iterator<Item = usize> {
    (0..k).map(move |i| ((2 * i + 1) * len) / (2 * k))
}

/// Match two sorted projections partially.
///
/// Both inputs must be sorted ascending (see [`crate::slicer::project`]).
/// The result is injective on both sides and holds
/// [`num_matches`] pairs; it is empty when that number rounds to zero.
pub fn match_sorted(
    source: &[Projection],
    target: &[Projection],
    ratio: f64,
    policy: MatchingPolicy,
) -> Vec<PartialMatch> {
    let k = num_matches(source.len(), target.len(), ratio);
    if k == 0 {
        return Vec::new();
    }

    let optimal = policy == MatchingPolicy::Optimal;
    if optimal && optimal_table_cells(source.len(), target.len(), ratio) > MAX_OPTIMAL_CELLS {
        log::warn!(
            "optimal matching of {}x{} points exceeds {} table cells, using strided pairs",
            source.len(),
            target.len(),
            MAX_OPTIMAL_CELLS
        );
    } else if optimal {
        return if source.len() <= target.len() {
            let subset = strided_positions(source.len(), k)
                .map(|i| source[i])
                .collect::<Vec<_>>();
            let assigned = monotone_injection(&subset, target);
            subset
                .iter()
                .zip(assigned)
                .map(|(s, j)| PartialMatch::new(s, &target[j]))
                .collect()
        } else {
            let subset = strided_positions(target.len(), k)
                .map(|j| target[j])
                .collect::<Vec<_>>();
            let assigned = monotone_injection(&subset, source);
            subset
                .iter()
                .zip(assigned)
                .map(|(t, i)| PartialMatch::new(&source[i], t))
                .collect()
        };
    }

    strided_positions(source.len(), k)
        .zip(strided_positions(target.len(), k))
        .map(|(i, j)| PartialMatch::new(&source[i], &target[j]))
        .collect()
}

/// Largest dynamic programming table, in cells, that
/// [`MatchingPolicy::Optimal`] solves for a single slice.
///
/// A cell costs one bit of memory and a few flops, so the cap bounds a slice
/// to 32 MiB of scratch space. Larger slices fall back to strided pairs and
/// the engine rejects such configurations up front.
pub const MAX_OPTIMAL_CELLS: usize = 1 << 28;

/// Number of table cells [`MatchingPolicy::Optimal`] needs for one slice:
/// `k * (n_large - k + 1)` with `k` from [`num_matches`].
pub fn optimal_table_cells(num_source: usize, num_target: usize, ratio: f64) -> usize {
    let k = num_matches(num_source, num_target, ratio);
    if k == 0 {
        return 0;
    }
    let slack = num_source.max(num_target) - k;
    k.saturating_mul(slack + 1)
}

/// Inject the sorted `small` sequence into the sorted `large` one with the
/// minimal sum of squared differences.
///
/// With a convex cost an optimal injection is monotone, so the `i`-th element
/// goes to `i + d_i` with a non-decreasing slack `d_i` in `[0, large - small]`.
///
/// Only one row of costs is alive at a time. For the backtracking each row
/// keeps one bit per slack value, set where the row reaches a new prefix
/// minimum: the best predecessor of `d` is then the last set bit at or
/// before `d`.
fn monotone_injection(small: &[Projection], large: &[Projection]) -> Vec<usize> {
    let k = small.len();
    let slack = large.len() - k;
    let width = slack + 1;

    // row[d]: best cost of the first i + 1 elements with d_i = d
    let mut row = vec![0.0f64; width];
    let mut minima = PrefixMinima::new(k, width);
    for i in 0..k {
        let mut best_prev = f64::INFINITY;
        let mut best_here = f64::INFINITY;
        for d in 0..width {
            let prev = if i == 0 {
                0.0
            } else {
                best_prev = best_prev.min(row[d]);
                best_prev
            };
            let diff = large[i + d].value - small[i].value;
            let cost = prev + diff * diff;
            if d == 0 || cost < best_here {
                best_here = cost;
                minima.set(i, d);
            }
            row[d] = cost;
        }
    }

    let mut assigned = vec![0; k];
    let mut d = slack;
    for i in (0..k).rev() {
        d = minima.last_set_at_or_before(i, d);
        assigned[i] = i + d;
    }
    assigned
}

/// One bit per `(row, slack)` cell of [`monotone_injection`].
struct PrefixMinima {
    width: usize,
    words: Vec<u64>,
}

impl PrefixMinima {
    fn new(rows: usize, width: usize) -> Self {
        Self {
            width,
            words: vec![0; (rows * width).div_ceil(64)],
        }
    }

    #[inline]
    fn set(&mut self, row: usize, d: usize) {
        let bit = row * self.width + d;
        self.words[bit / 64] |= 1u64 << (bit % 64);
    }

    #[inline]
    fn is_set(&self, row: usize, d: usize) -> bool {
        let bit = row * self.width + d;
        self.words[bit / 64] & (1u64 << (bit % 64)) != 0
    }

    // bit 0 of every row is set, so the scan always stops
    fn last_set_at_or_before(&self, row: usize, mut d: usize) -> usize {
        while d > 0 && !self.is_set(row, d) {
            d -= 1;
        }
        d
    }
}

/// Sum of the 1d costs of a match set.
pub fn sliced_cost(matches: &[PartialMatch]) -> f64 {
    matches.iter().map(PartialMatch::cost).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sorted(values: &[f64]) -> Vec<Projection> {
        let mut out = values
            .iter()
            .enumerate()
            .map(|(index, &value)| Projection { value, index })
            .collect::<Vec<_>>();
        out.sort_by(|a, b| a.value.total_cmp(&b.value).then(a.index.cmp(&b.index)));
        out
    }

    fn assert_injective(matches: &[PartialMatch]) {
        let mut src = matches.iter().map(|m| m.source_index).collect::<Vec<_>>();
        let mut dst = matches.iter().map(|m| m.target_index).collect::<Vec<_>>();
        src.sort_unstable();
        dst.sort_unstable();
        src.dedup();
        dst.dedup();
        assert_eq!(src.len(), matches.len());
        assert_eq!(dst.len(), matches.len());
    }

    #[test]
    fn test_full_ratio_is_monotone() {
        let source = sorted(&[0.3, -1.0, 2.0, 0.7, 5.0]);
        let target = sorted(&[1.0, 0.0, -3.0, 4.0, 2.5]);

        for policy in [MatchingPolicy::Strided, MatchingPolicy::Optimal] {
            let matches = match_sorted(&source, &target, 1.0, policy);
            assert_eq!(matches.len(), 5);
            for (i, m) in matches.iter().enumerate() {
                assert_eq!(m.source_index, source[i].index);
                assert_eq!(m.target_index, target[i].index);
            }
        }
    }

    #[test]
    fn test_zero_matches() {
        let source = sorted(&[0.0, 1.0]);
        let target = sorted(&[0.0, 1.0, 2.0]);
        assert_eq!(num_matches(2, 3, 0.2), 0);
        assert!(match_sorted(&source, &target, 0.2, MatchingPolicy::Strided).is_empty());
        assert!(match_sorted(&source, &target, 0.2, MatchingPolicy::Optimal).is_empty());
        assert!(match_sorted(&[], &target, 1.0, MatchingPolicy::Strided).is_empty());
    }

    #[test]
    fn test_strided_positions_increasing() {
        for len in 1..40 {
            for k in 1..=len {
                let pos = strided_positions(len, k).collect::<Vec<_>>();
                assert_eq!(pos.len(), k);
                assert!(pos.windows(2).all(|w| w[0] < w[1]));
                assert!(pos.iter().all(|&p| p < len));
            }
        }
        assert_eq!(strided_positions(10, 5).collect::<Vec<_>>(), vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_partial_unequal_sizes() {
        let source = sorted(&(0..70).map(|i| i as f64 * 0.1).collect::<Vec<_>>());
        let target = sorted(&(0..100).map(|i| (i as f64).sin()).collect::<Vec<_>>());

        for policy in [MatchingPolicy::Strided, MatchingPolicy::Optimal] {
            let matches = match_sorted(&source, &target, 0.5, policy);
            assert_eq!(matches.len(), 35);
            assert_injective(&matches);
        }
    }

    #[test]
    fn test_optimal_not_worse_than_strided() {
        let source = sorted(&[0.0, 0.1, 0.2, 5.0, 5.1, 9.0, 9.5]);
        let target = sorted(&[-4.0, 0.05, 0.12, 0.25, 2.0, 3.0, 5.05, 7.0, 9.2, 9.4, 12.0]);

        for ratio in [0.3, 0.6, 1.0] {
            let strided = match_sorted(&source, &target, ratio, MatchingPolicy::Strided);
            let optimal = match_sorted(&source, &target, ratio, MatchingPolicy::Optimal);
            assert_eq!(strided.len(), optimal.len());
            assert_injective(&optimal);
            assert!(sliced_cost(&optimal) <= sliced_cost(&strided) + 1e-12);
        }
    }

    #[test]
    fn test_optimal_finds_exact_copies() {
        // every source value exists in the target, so the best injection is free
        let source = sorted(&[1.0, 2.0, 3.0]);
        let target = sorted(&[-10.0, 1.0, 1.5, 2.0, 2.5, 3.0, 10.0]);
        let matches = match_sorted(&source, &target, 1.0, MatchingPolicy::Optimal);
        assert_relative_eq!(sliced_cost(&matches), 0.0);
        assert_eq!(
            matches.iter().map(|m| m.target_index).collect::<Vec<_>>(),
            vec![1, 3, 5]
        );
    }

    #[test]
    fn test_optimal_larger_source() {
        let source = sorted(&[-10.0, 1.0, 1.5, 2.0, 2.5, 3.0, 10.0]);
        let target = sorted(&[1.0, 2.0, 3.0]);
        let matches = match_sorted(&source, &target, 1.0, MatchingPolicy::Optimal);
        assert_eq!(matches.len(), 3);
        assert_relative_eq!(sliced_cost(&matches), 0.0);
        assert_eq!(
            matches.iter().map(|m| m.source_index).collect::<Vec<_>>(),
            vec![1, 3, 5]
        );
    }

    // plain O(k * width) table of costs, kept small
    fn full_table_cost(small: &[Projection], large: &[Projection]) -> f64 {
        let k = small.len();
        let width = large.len() - k + 1;
        let mut cost = vec![0.0f64; k * width];
        for i in 0..k {
            let mut best_prev = f64::INFINITY;
            for d in 0..width {
                let prev = if i == 0 {
                    0.0
                } else {
                    best_prev = best_prev.min(cost[(i - 1) * width + d]);
                    best_prev
                };
                let diff = large[i + d].value - small[i].value;
                cost[i * width + d] = prev + diff * diff;
            }
        }
        cost[(k - 1) * width..]
            .iter()
            .fold(f64::INFINITY, |a, &b| a.min(b))
    }

    #[test]
    fn test_optimal_matches_full_table() {
        let source = sorted(&(0..120).map(|i| (i as f64 * 0.37).cos() * 3.0).collect::<Vec<_>>());
        let target = sorted(&(0..310).map(|i| (i as f64 * 0.11).sin() * 4.0).collect::<Vec<_>>());

        let matches = match_sorted(&source, &target, 1.0, MatchingPolicy::Optimal);
        assert_eq!(matches.len(), 120);
        assert_injective(&matches);
        assert_relative_eq!(
            sliced_cost(&matches),
            full_table_cost(&source, &target),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_optimal_large_unbalanced() {
        // 3000 x 4001 cells, far beyond what a dense f64 table should hold per slice
        let source = sorted(&(0..3000).map(|i| (i as f64 * 0.013).sin()).collect::<Vec<_>>());
        let target = sorted(&(0..7000).map(|i| (i as f64 * 0.007).cos() * 1.2).collect::<Vec<_>>());
        assert_eq!(optimal_table_cells(3000, 7000, 1.0), 3000 * 4001);

        let strided = match_sorted(&source, &target, 1.0, MatchingPolicy::Strided);
        let optimal = match_sorted(&source, &target, 1.0, MatchingPolicy::Optimal);
        assert_eq!(optimal.len(), 3000);
        assert_injective(&optimal);
        assert!(optimal.windows(2).all(|w| w[0].target_value <= w[1].target_value));
        assert!(sliced_cost(&optimal) <= sliced_cost(&strided) * (1.0 + 1e-12));
    }

    #[test]
    fn test_optimal_table_cells() {
        assert_eq!(optimal_table_cells(10, 10, 1.0), 10);
        assert_eq!(optimal_table_cells(10, 10, 0.5), 5 * 6);
        assert_eq!(optimal_table_cells(10, 4, 1.0), 4 * 7);
        assert_eq!(optimal_table_cells(10, 10, 0.01), 0);
        // equal sizes with a partial ratio grow quadratically
        assert!(optimal_table_cells(100_000, 100_000, 0.5) > MAX_OPTIMAL_CELLS);
        assert_eq!(optimal_table_cells(usize::MAX, 2, 1.0), usize::MAX);
    }

    #[test]
    fn test_optimal_over_cap_falls_back_to_strided() {
        // 40000 x 40001 cells
        let values = (0..80_000).map(|i| i as f64).collect::<Vec<_>>();
        let source = sorted(&values);
        let target = sorted(&values);
        assert!(optimal_table_cells(80_000, 80_000, 0.5) > MAX_OPTIMAL_CELLS);

        let optimal = match_sorted(&source, &target, 0.5, MatchingPolicy::Optimal);
        let strided = match_sorted(&source, &target, 0.5, MatchingPolicy::Strided);
        assert_eq!(optimal, strided);
    }
}
