use spot_3d::pointcloud::{PointCloud, Scalar};

use crate::sampler::Direction;
use crate::transport::PartialMatch;

/// Running sums of the back-projected displacements of every source point.
#[derive(Debug, Clone)]
pub struct DisplacementAggregator {
    sums: Vec<[f64; 3]>,
    counts: Vec<u32>,
}

impl DisplacementAggregator {
    /// Create an empty accumulator for a cloud of `num_points` points.
    pub fn new(num_points: usize) -> Self {
        Self {
            sums: vec![[0.0; 3]; num_points],
            counts: vec![0; num_points],
        }
    }

    /// Number of source points tracked.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the accumulator tracks no point.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Add the matches of one slice.
    ///
    /// Every matched source point receives `(target_value - source_value) * direction`.
    ///
    /// PRECONDITION: every `source_index` is lower than [`Self::len`].
    pub fn accumulate(&mut self, matches: &[PartialMatch], direction: &Direction) {
        let d = direction.as_array();
        for m in matches {
            let offset = m.offset();
            let sum = &mut self.sums[m.source_index];
            sum[0] += offset * d[0];
            sum[1] += offset * d[1];
            sum[2] += offset * d[2];
            self.counts[m.source_index] += 1;
        }
    }

    /// Add the content of another accumulator of the same size.
    pub fn merge(&mut self, other: &DisplacementAggregator) {
        debug_assert_eq!(self.len(), other.len());
        for (sum, o) in self.sums.iter_mut().zip(other.sums.iter()) {
            sum[0] += o[0];
            sum[1] += o[1];
            sum[2] += o[2];
        }
        for (count, o) in self.counts.iter_mut().zip(other.counts.iter()) {
            *count += o;
        }
    }

    /// Clear the sums and counts, keeping the allocation.
    pub fn clear(&mut self) {
        self.sums.fill([0.0; 3]);
        self.counts.fill(0);
    }

    /// Average the sums. Points never matched get a zero displacement and a
    /// zero weight.
    pub fn finalize(&self) -> Displacements {
        let displacements = self
            .sums
            .iter()
            .zip(self.counts.iter())
            .map(|(sum, &count)| match count {
                0 => [0.0; 3],
                n => {
                    let n = n as f64;
                    [sum[0] / n, sum[1] / n, sum[2] / n]
                }
            })
            .collect();

        Displacements {
            displacements,
            counts: self.counts.clone(),
        }
    }
}

/// Averaged displacement of every source point after one iteration.
#[derive(Debug, Clone)]
pub struct Displacements {
    displacements: Vec<[f64; 3]>,
    counts: Vec<u32>,
}

impl Displacements {
    /// Displacement of every source point.
    pub fn displacements(&self) -> &[[f64; 3]] {
        &self.displacements
    }

    /// Number of slices that matched each source point.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Number of source points matched at least once.
    pub fn num_matched(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Fit weights: the match counts as `f64`.
    pub fn weights(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64).collect()
    }

    /// The estimated target of every source point: position plus displacement.
    ///
    /// PRECONDITION: `cloud` is the cloud the displacements were computed for.
    pub fn pseudo_targets<T: Scalar>(&self, cloud: &PointCloud<T>) -> Vec<[f64; 3]> {
        cloud
            .iter_f64()
            .zip(self.displacements.iter())
            .map(|(p, d)| [p[0] + d[0], p[1] + d[1], p[2] + d[2]])
            .collect()
    }
}
