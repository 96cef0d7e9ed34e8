// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Adaptive binning of the defect-count support
//!
//! Adjacent counts are merged left to right until every participating
//! family expects at least `min_expected` observations in the bin. A family
//! participates only if its total expected mass over the whole support
//! reaches the threshold; otherwise no bin could ever satisfy it.
//!
//! The resulting bins always partition `[0, max]` exactly.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use super::distributions::{DistributionKind, PerDistribution};

/// Minimum number of bins before the uniform fallback kicks in
pub const MIN_BINS: usize = 3;

/// Inclusive range of defect counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bin {
    pub start: u64,
    pub end: u64,
}

impl Bin {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// `"k"` for a single count, `"start-end"` for a range
    pub fn label(&self) -> String {
        self.to_string()
    }

    pub fn width(&self) -> u64 {
        self.end - self.start + 1
    }
}

impl fmt::Display for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Binned observed and expected frequencies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyTable {
    pub bins: Vec<Bin>,
    pub labels: Vec<String>,
    pub observed: Vec<u64>,
    pub expected: PerDistribution<Vec<f64>>,
}

impl FrequencyTable {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Total observations; equals the post-filter sample size
    pub fn sample_size(&self) -> u64 {
        self.observed.iter().sum()
    }

    pub fn expected_for(&self, kind: DistributionKind) -> &[f64] {
        self.expected.get(kind)
    }
}

pub struct AdaptiveBinner {
    min_expected: f64,
}

impl AdaptiveBinner {
    pub fn new(min_expected: f64) -> Self {
        Self { min_expected }
    }

    /// Merge per-count frequencies into bins
    ///
    /// `observed` and every expected vector are indexed by defect count and
    /// must share the same length (`max + 1`).
    pub fn bin(&self, observed: &[u64], expected: &PerDistribution<Vec<f64>>) -> FrequencyTable {
        let support = observed.len();
        let mut bins = self.greedy_bins(support, expected);

        if bins.len() < MIN_BINS {
            debug!(
                "Greedy binning produced {} bins, re-splitting {} counts uniformly",
                bins.len(),
                support
            );
            bins = uniform_bins(support, MIN_BINS);
        }

        let labels = bins.iter().map(Bin::label).collect();
        let observed: Vec<u64> = bins
            .iter()
            .map(|bin| observed[bin.start as usize..=bin.end as usize].iter().sum())
            .collect();
        let expected = expected.map(|_, values| {
            bins.iter()
                .map(|bin| values[bin.start as usize..=bin.end as usize].iter().sum::<f64>())
                .collect::<Vec<f64>>()
        });

        FrequencyTable {
            bins,
            labels,
            observed,
            expected,
        }
    }

    fn greedy_bins(&self, support: usize, expected: &PerDistribution<Vec<f64>>) -> Vec<Bin> {
        if support == 0 {
            return Vec::new();
        }

        let participating: Vec<&[f64]> = expected
            .iter()
            .map(|(_, values)| values.as_slice())
            .filter(|values| values.iter().sum::<f64>() >= self.min_expected)
            .collect();

        let mut bins = Vec::new();
        let mut start = 0usize;
        let mut sums = vec![0.0; participating.len()];

        for k in 0..support {
            for (sum, values) in sums.iter_mut().zip(&participating) {
                *sum += values[k];
            }
            // with no participating family `all` is vacuously true, but then
            // the caller falls back to uniform bins anyway
            if !participating.is_empty() && sums.iter().all(|&s| s >= self.min_expected) {
                bins.push(Bin::new(start as u64, k as u64));
                start = k + 1;
                sums.iter_mut().for_each(|s| *s = 0.0);
            }
        }

        // trailing counts that never reached the threshold join the last bin
        if start < support {
            match bins.last_mut() {
                Some(last) => last.end = support as u64 - 1,
                None => bins.push(Bin::new(0, support as u64 - 1)),
            }
        }

        bins
    }
}

/// `min(count, support)` contiguous bins of near-equal width
///
/// Widths differ by at most one; the leftmost bins take the extra counts.
pub fn uniform_bins(support: usize, count: usize) -> Vec<Bin> {
    let count = count.min(support);
    if count == 0 {
        return Vec::new();
    }
    let width = support / count;
    let remainder = support % count;

    let mut start = 0;
    (0..count)
        .map(|i| {
            let len = if i < remainder { width + 1 } else { width };
            let bin = Bin::new(start as u64, (start + len - 1) as u64);
            start += len;
            bin
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn same(values: Vec<f64>) -> PerDistribution<Vec<f64>> {
        PerDistribution::from_fn(|_| values.clone())
    }

    fn assert_partition(table: &FrequencyTable, support: usize) {
        assert_eq!(table.bins.first().map(|b| b.start), Some(0));
        assert_eq!(table.bins.last().map(|b| b.end), Some(support as u64 - 1));
        for pair in table.bins.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + 1);
            assert!(pair[0].start <= pair[0].end);
        }
        assert_eq!(table.labels.len(), table.observed.len());
        for (_, values) in table.expected.iter() {
            assert_eq!(values.len(), table.len());
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(Bin::new(3, 3).label(), "3");
        assert_eq!(Bin::new(0, 2).label(), "0-2");
        assert_eq!(Bin::new(4, 9).width(), 6);
    }

    #[test]
    fn test_greedy_merges_until_threshold() {
        let observed = vec![1, 3, 6, 8, 7, 5, 2, 1];
        let expected = same(vec![1.0, 3.0, 6.0, 8.0, 7.0, 5.0, 2.0, 1.0]);
        let table = AdaptiveBinner::new(5.0).bin(&observed, &expected);

        // [0-2]=10, [3]=8, [4]=7, [5]=5, trailing [6-7]=3 joins [5]
        assert_eq!(table.labels, vec!["0-2", "3", "4", "5-7"]);
        assert_eq!(table.observed, vec![10, 8, 7, 8]);
        assert_eq!(table.sample_size(), 33);
        assert_partition(&table, observed.len());
    }

    #[test]
    fn test_bin_closes_only_when_every_family_qualifies() {
        let observed = vec![5, 5, 5, 5];
        let expected = PerDistribution {
            poisson: vec![5.0, 5.0, 5.0, 5.0],
            binomial: vec![5.0, 5.0, 5.0, 5.0],
            negative_binomial: vec![2.0, 3.0, 5.0, 10.0],
        };
        let table = AdaptiveBinner::new(5.0).bin(&observed, &expected);

        assert_eq!(table.labels, vec!["0-1", "2", "3"]);
        assert_eq!(table.expected.negative_binomial, vec![5.0, 5.0, 10.0]);
        assert_eq!(table.expected.poisson, vec![10.0, 5.0, 5.0]);
    }

    #[test]
    fn test_family_without_mass_does_not_block_binning() {
        let observed = vec![6, 6, 6, 6];
        let expected = PerDistribution {
            poisson: vec![6.0, 6.0, 6.0, 6.0],
            binomial: vec![0.0; 4],
            negative_binomial: vec![6.0, 6.0, 6.0, 6.0],
        };
        let table = AdaptiveBinner::new(5.0).bin(&observed, &expected);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_uniform_fallback_with_two_distinct_values() {
        // eight batches, four with 0 defects and four with 4
        let observed = vec![4, 0, 0, 0, 4];
        let expected = same(vec![2.0, 2.0, 1.5, 1.5, 1.0]);
        let table = AdaptiveBinner::new(5.0).bin(&observed, &expected);

        assert!(table.len() >= MIN_BINS);
        assert_eq!(table.labels, vec!["0-1", "2-3", "4"]);
        assert_eq!(table.observed, vec![4, 0, 4]);
        assert_eq!(table.expected.poisson, vec![4.0, 3.0, 1.0]);
        assert_partition(&table, observed.len());
    }

    #[test]
    fn test_uniform_bins() {
        assert_eq!(
            uniform_bins(7, 3),
            vec![Bin::new(0, 2), Bin::new(3, 4), Bin::new(5, 6)]
        );
        assert_eq!(
            uniform_bins(6, 3),
            vec![Bin::new(0, 1), Bin::new(2, 3), Bin::new(4, 5)]
        );
        assert_eq!(
            uniform_bins(5, 3),
            vec![Bin::new(0, 1), Bin::new(2, 3), Bin::new(4, 4)]
        );
        assert_eq!(uniform_bins(2, 3), vec![Bin::new(0, 0), Bin::new(1, 1)]);
        assert!(uniform_bins(0, 3).is_empty());
    }

    #[test]
    fn test_single_count_support() {
        let table = AdaptiveBinner::new(5.0).bin(&[12], &same(vec![12.0]));
        assert_eq!(table.labels, vec!["0"]);
        assert_eq!(table.observed, vec![12]);
    }
}
