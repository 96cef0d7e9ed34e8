// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Pearson chi-square goodness-of-fit test

use serde::Serialize;
use tracing::debug;

use super::distributions::{chi_square_quantile, chi_square_sf};

/// Outcome of one goodness-of-fit test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChiSquareResult {
    /// `f64::INFINITY` when the family could not be tested
    pub chi_square: f64,
    /// Bins whose expected frequency met the minimum
    pub valid_bins: usize,
    /// 0 when the family could not be tested
    pub degrees_of_freedom: usize,
    pub critical_value: f64,
    pub p_value: f64,
    pub is_accepted: bool,
}

impl ChiSquareResult {
    /// Too few usable bins for the number of estimated parameters
    pub fn untestable(valid_bins: usize) -> Self {
        Self {
            chi_square: f64::INFINITY,
            valid_bins,
            degrees_of_freedom: 0,
            critical_value: f64::NAN,
            p_value: 0.0,
            is_accepted: false,
        }
    }

    pub fn is_testable(&self) -> bool {
        self.degrees_of_freedom > 0
    }

    /// Recompute critical value, p-value and acceptance for a new
    /// significance level, keeping the statistic and df
    pub fn reevaluate(&self, alpha: f64) -> Self {
        if !self.is_testable() {
            return *self;
        }
        let df = self.degrees_of_freedom as f64;
        let critical_value = chi_square_quantile(1.0 - alpha, df);
        let p_value = p_value(self.chi_square, df);
        let is_accepted = p_value >= alpha;

        if is_accepted != (self.chi_square < critical_value) {
            debug!(
                "p-value and critical value disagree: chi2={:.6}, crit={:.6}, p={:.6}, alpha={}",
                self.chi_square, critical_value, p_value, alpha
            );
        }

        Self {
            critical_value,
            p_value,
            is_accepted,
            ..*self
        }
    }
}

fn p_value(chi_square: f64, df: f64) -> f64 {
    let p = chi_square_sf(chi_square, df);
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

pub struct ChiSquareEvaluator {
    min_expected: f64,
}

impl ChiSquareEvaluator {
    pub fn new(min_expected: f64) -> Self {
        Self { min_expected }
    }

    /// Test binned observations against one family's expected frequencies
    pub fn evaluate(
        &self,
        observed: &[u64],
        expected: &[f64],
        num_params: usize,
        alpha: f64,
    ) -> ChiSquareResult {
        let mut chi_square = 0.0;
        let mut valid_bins = 0usize;

        for (&o, &e) in observed.iter().zip(expected) {
            if e >= self.min_expected {
                let diff = o as f64 - e;
                chi_square += diff * diff / e;
                valid_bins += 1;
            }
        }

        if valid_bins < num_params + 2 {
            debug!(
                "Only {} valid bins for {} parameters, not testable",
                valid_bins, num_params
            );
            return ChiSquareResult::untestable(valid_bins);
        }

        let degrees_of_freedom = valid_bins.saturating_sub(1 + num_params).max(1);

        ChiSquareResult {
            chi_square,
            valid_bins,
            degrees_of_freedom,
            critical_value: f64::NAN,
            p_value: 0.0,
            is_accepted: false,
        }
        .reevaluate(alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistic_over_valid_bins_only() {
        let evaluator = ChiSquareEvaluator::new(5.0);
        // last bin has e = 2 and is skipped
        let expected = [10.0, 10.0, 10.0, 10.0, 2.0];
        let result = evaluator.evaluate(&[12, 8, 10, 9, 3], &expected, 1, 0.05);

        assert_eq!(result.valid_bins, 4);
        assert!((result.chi_square - (0.4 + 0.4 + 0.0 + 0.1)).abs() < 1e-12);
        assert_eq!(result.degrees_of_freedom, 2);
        assert!((result.critical_value - 5.991465).abs() < 1e-5);
        assert!(result.is_accepted);
        assert!(result.p_value > 0.05 && result.p_value <= 1.0);
    }

    #[test]
    fn test_degrees_of_freedom_floor() {
        let evaluator = ChiSquareEvaluator::new(5.0);
        // 3 valid bins, 1 parameter: 3 - 1 - 1 = 1
        let result = evaluator.evaluate(&[5, 5, 5], &[5.0, 5.0, 5.0], 1, 0.05);
        assert_eq!(result.degrees_of_freedom, 1);
        assert_eq!(result.chi_square, 0.0);
        assert_eq!(result.p_value, 1.0);

        // 4 valid bins, 2 parameters: 4 - 1 - 2 = 1
        let result = evaluator.evaluate(&[5, 5, 5, 5], &[5.0; 4], 2, 0.05);
        assert_eq!(result.degrees_of_freedom, 1);
    }

    #[test]
    fn test_too_few_valid_bins_is_untestable() {
        let evaluator = ChiSquareEvaluator::new(5.0);
        let result = evaluator.evaluate(&[10, 10, 10], &[10.0, 10.0, 1.0], 1, 0.05);

        assert!(!result.is_testable());
        assert_eq!(result.valid_bins, 2);
        assert_eq!(result.chi_square, f64::INFINITY);
        assert_eq!(result.degrees_of_freedom, 0);
        assert_eq!(result.p_value, 0.0);
        assert!(result.critical_value.is_nan());
        assert!(!result.is_accepted);
    }

    #[test]
    fn test_poor_fit_is_rejected() {
        let evaluator = ChiSquareEvaluator::new(5.0);
        let result = evaluator.evaluate(&[40, 0, 0, 40], &[20.0; 4], 1, 0.05);

        assert!((result.chi_square - 80.0).abs() < 1e-12);
        assert!(!result.is_accepted);
        assert!(result.p_value < 1e-10);
    }

    #[test]
    fn test_reevaluate_keeps_statistic() {
        let evaluator = ChiSquareEvaluator::new(5.0);
        let observed = [16, 6, 10, 4, 14];
        let expected = [10.0; 5];
        // chi2 = (36 + 16 + 0 + 36 + 16) / 10 = 10.4, df = 3, p ~ 0.0155
        let strict = evaluator.evaluate(&observed, &expected, 1, 0.05);
        let loose = strict.reevaluate(0.01);

        assert_eq!(strict.chi_square, loose.chi_square);
        assert_eq!(strict.degrees_of_freedom, loose.degrees_of_freedom);
        assert_eq!(strict.p_value, loose.p_value);
        assert!(!strict.is_accepted);
        assert!(loose.is_accepted);
        assert!(loose.critical_value > strict.critical_value);

        assert_eq!(loose.reevaluate(0.05), strict);
    }

    #[test]
    fn test_reevaluate_untestable_is_noop() {
        let result = ChiSquareResult::untestable(1);
        let again = result.reevaluate(0.1);
        assert_eq!(again.chi_square, f64::INFINITY);
        assert!(!again.is_accepted);
    }
}
