// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Observed histogram and theoretical expected frequencies

use super::distributions::{DistributionFit, FittedParams, PerDistribution};
use crate::error::AnalysisError;

/// Largest defect count the per-count histogram will cover
pub const MAX_DEFECT_COUNT: u64 = 1_000_000;

/// Counts of each defect value over `0..=max`
pub fn observed_histogram(defects: &[u64]) -> Result<Vec<u64>, AnalysisError> {
    let max = defects.iter().copied().max().unwrap_or(0);
    let mut histogram = vec![0u64; support_len(max)?];
    for &x in defects {
        histogram[x as usize] += 1;
    }
    Ok(histogram)
}

/// Length of `0..=max`, refusing supports too wide to tabulate
fn support_len(max: u64) -> Result<usize, AnalysisError> {
    let too_large = AnalysisError::SupportTooLarge {
        max_defects: max,
        limit: MAX_DEFECT_COUNT,
    };
    if max > MAX_DEFECT_COUNT {
        return Err(too_large);
    }
    usize::try_from(max)
        .ok()
        .and_then(|m| m.checked_add(1))
        .ok_or(too_large)
}

/// `pmf(k) * sample_size` over `0..=max_defects`
///
/// Parameters that statrs rejects give an all-zero vector.
pub fn expected_frequencies(
    params: &FittedParams,
    max_defects: u64,
    sample_size: usize,
) -> Vec<f64> {
    let n = sample_size as f64;
    match params.model() {
        Some(model) => (0..=max_defects).map(|k| model.pmf(k) * n).collect(),
        None => vec![0.0; max_defects as usize + 1],
    }
}

/// Expected frequency vectors for all three fits
pub struct TheoreticalFrequencyBuilder;

impl TheoreticalFrequencyBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        max_defects: u64,
        fits: &PerDistribution<DistributionFit>,
        sample_size: usize,
    ) -> PerDistribution<Vec<f64>> {
        fits.map(|_, fit| expected_frequencies(fit.params(), max_defects, sample_size))
    }
}

impl Default for TheoreticalFrequencyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::distributions::NegBinomialParams;

    #[test]
    fn test_observed_histogram() {
        assert_eq!(
            observed_histogram(&[0, 2, 2, 5, 0, 2]).unwrap(),
            vec![2, 0, 3, 0, 0, 1]
        );
        assert_eq!(observed_histogram(&[0, 0]).unwrap(), vec![2]);
    }

    #[test]
    fn test_histogram_rejects_huge_counts() {
        let limit = observed_histogram(&[0, MAX_DEFECT_COUNT]).unwrap();
        assert_eq!(limit.len(), MAX_DEFECT_COUNT as usize + 1);

        for max_defects in [MAX_DEFECT_COUNT + 1, 10_000_000_000, u64::MAX] {
            assert_eq!(
                observed_histogram(&[3, max_defects]).unwrap_err(),
                AnalysisError::SupportTooLarge {
                    max_defects,
                    limit: MAX_DEFECT_COUNT,
                }
            );
        }
    }

    #[test]
    fn test_poisson_expected() {
        let expected = expected_frequencies(&FittedParams::Poisson { lambda: 1.0 }, 2, 100);
        let e = (-1.0f64).exp() * 100.0;
        assert_eq!(expected.len(), 3);
        assert!((expected[0] - e).abs() < 1e-9);
        assert!((expected[1] - e).abs() < 1e-9);
        assert!((expected[2] - e / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_binomial_expected_is_zero_past_trials() {
        let expected = expected_frequencies(&FittedParams::Binomial { n: 3, p: 0.5 }, 6, 80);
        assert!((expected[0] - 10.0).abs() < 1e-9);
        assert!((expected[1] - 30.0).abs() < 1e-9);
        assert_eq!(&expected[4..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_negative_binomial_expected() {
        let params = FittedParams::NegativeBinomial(NegBinomialParams { r: 1.0, p: 0.5 });
        let expected = expected_frequencies(&params, 3, 16);
        // geometric: 8, 4, 2, 1
        for (got, want) in expected.iter().zip([8.0, 4.0, 2.0, 1.0]) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unusable_params_give_zeros() {
        let params = FittedParams::NegativeBinomial(NegBinomialParams { r: f64::NAN, p: 0.5 });
        assert_eq!(expected_frequencies(&params, 2, 10), vec![0.0; 3]);
    }

    #[test]
    fn test_extreme_rate_never_produces_nan() {
        let expected = expected_frequencies(&FittedParams::Poisson { lambda: 1e300 }, 5, 10);
        assert!(expected.iter().all(|e| e.is_finite() && *e >= 0.0));
    }
}
