// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Best-fit selection across the three chi-square results

use serde::Serialize;
use std::cmp::Ordering;

use super::chi_square::ChiSquareResult;
use super::distributions::{DistributionKind, PerDistribution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub best: DistributionKind,
    /// Whether the chosen family itself passed the test
    pub hypothesis_accepted: bool,
}

/// Highest p-value wins, accepted families first
///
/// Ties go to the lower chi-square, then to the earlier family in
/// [`DistributionKind::ALL`].
pub struct DistributionSelector;

impl DistributionSelector {
    pub fn select(results: &PerDistribution<ChiSquareResult>) -> Selection {
        let accepted: Vec<_> = results.iter().filter(|(_, r)| r.is_accepted).collect();
        let pool = if accepted.is_empty() {
            results.iter().collect()
        } else {
            accepted
        };

        // `pool` holds three entries at most and is never empty
        let mut best = pool[0];
        for candidate in &pool[1..] {
            if compare(candidate.1, best.1) == Ordering::Greater {
                best = *candidate;
            }
        }

        Selection {
            best: best.0,
            hypothesis_accepted: best.1.is_accepted,
        }
    }
}

/// `Greater` means `a` is the better fit
fn compare(a: &ChiSquareResult, b: &ChiSquareResult) -> Ordering {
    a.p_value
        .total_cmp(&b.p_value)
        .then_with(|| b.chi_square.total_cmp(&a.chi_square))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(chi_square: f64, p_value: f64, is_accepted: bool) -> ChiSquareResult {
        ChiSquareResult {
            chi_square,
            valid_bins: 6,
            degrees_of_freedom: 4,
            critical_value: 9.487729,
            p_value,
            is_accepted,
        }
    }

    #[test]
    fn test_highest_accepted_p_value_wins() {
        let results = PerDistribution {
            poisson: result(3.0, 0.55, true),
            binomial: result(2.0, 0.73, true),
            negative_binomial: result(12.0, 0.01, false),
        };
        let selection = DistributionSelector::select(&results);
        assert_eq!(selection.best, DistributionKind::Binomial);
        assert!(selection.hypothesis_accepted);
    }

    #[test]
    fn test_p_value_tie_goes_to_lower_chi_square() {
        let results = PerDistribution {
            poisson: result(4.0, 0.4, true),
            binomial: result(3.5, 0.4, true),
            negative_binomial: result(3.0, 0.4, true),
        };
        assert_eq!(
            DistributionSelector::select(&results).best,
            DistributionKind::NegativeBinomial
        );
    }

    #[test]
    fn test_full_tie_goes_to_fixed_order() {
        let results = PerDistribution::from_fn(|_| result(3.0, 0.4, true));
        assert_eq!(DistributionSelector::select(&results).best, DistributionKind::Poisson);
    }

    #[test]
    fn test_all_rejected_still_picks_best() {
        let results = PerDistribution {
            poisson: result(30.0, 0.0001, false),
            binomial: result(25.0, 0.001, false),
            negative_binomial: ChiSquareResult::untestable(2),
        };
        let selection = DistributionSelector::select(&results);
        assert_eq!(selection.best, DistributionKind::Binomial);
        assert!(!selection.hypothesis_accepted);
    }

    #[test]
    fn test_all_untestable_picks_poisson() {
        let results = PerDistribution::from_fn(|_| ChiSquareResult::untestable(1));
        let selection = DistributionSelector::select(&results);
        assert_eq!(selection.best, DistributionKind::Poisson);
        assert!(!selection.hypothesis_accepted);
    }
}
