// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Upper-tail outlier filtering for defect counts
//!
//! Only large counts are ever removed: small defect counts are never
//! outliers in this domain. Filtering keeps order and multiplicity.

use serde::Serialize;
use tracing::debug;

use super::distributions::FittedParams;
use crate::config::OutlierPolicyKind;
use crate::error::AnalysisError;

/// Rule applied by [`OutlierFilter`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierPolicy {
    /// Keep values `<= Q3 + multiplier * IQR`
    Iqr { multiplier: f64 },
    /// Keep values `<= k*`, the first count whose CDF exceeds `1 - tail`
    TailProbability {
        params: FittedParams,
        tail: f64,
        search_limit: u64,
    },
}

impl OutlierPolicy {
    pub fn kind(&self) -> OutlierPolicyKind {
        match self {
            OutlierPolicy::Iqr { .. } => OutlierPolicyKind::Iqr,
            OutlierPolicy::TailProbability { .. } => OutlierPolicyKind::TailProbability,
        }
    }
}

/// What the filter kept
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierReport {
    /// Retained values in input order
    pub kept: Vec<u64>,
    /// Input positions of the retained values
    pub kept_indices: Vec<usize>,
    pub removed: usize,
    pub upper_bound: f64,
}

/// Summary carried on the analysis result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierSummary {
    /// `None` when outliers were included
    pub policy: Option<OutlierPolicyKind>,
    pub removed: usize,
    pub upper_bound: Option<f64>,
}

impl OutlierSummary {
    pub fn included() -> Self {
        Self {
            policy: None,
            removed: 0,
            upper_bound: None,
        }
    }
}

pub struct OutlierFilter {
    policy: OutlierPolicy,
}

impl OutlierFilter {
    pub fn new(policy: OutlierPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &OutlierPolicy {
        &self.policy
    }

    /// Drop values above the policy's upper bound
    pub fn filter(&self, defects: &[u64]) -> Result<OutlierReport, AnalysisError> {
        let upper_bound = match self.policy {
            OutlierPolicy::Iqr { multiplier } => iqr_upper_bound(defects, multiplier),
            OutlierPolicy::TailProbability {
                params,
                tail,
                search_limit,
            } => tail_cutoff(&params, tail, search_limit) as f64,
        };

        let (kept_indices, kept): (Vec<usize>, Vec<u64>) = defects
            .iter()
            .enumerate()
            .filter(|&(_, &x)| x as f64 <= upper_bound)
            .map(|(i, &x)| (i, x))
            .unzip();
        let removed = defects.len() - kept.len();

        debug!(
            "{} outlier rule: bound={:.3}, removed {} of {}",
            self.policy.kind(),
            upper_bound,
            removed,
            defects.len()
        );

        if kept.is_empty() {
            return Err(AnalysisError::EmptyAfterFiltering {
                removed,
                policy: self.policy.kind(),
            });
        }

        Ok(OutlierReport {
            kept,
            kept_indices,
            removed,
            upper_bound,
        })
    }
}

/// Position-based quartile: `sorted[floor(q * n)]`, no interpolation
fn position_quantile(sorted: &[u64], q: f64) -> u64 {
    let index = ((q * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[index]
}

/// `Q3 + multiplier * (Q3 - Q1)`, infinite for an empty sample
pub fn iqr_upper_bound(defects: &[u64], multiplier: f64) -> f64 {
    if defects.is_empty() {
        return f64::INFINITY;
    }
    let mut sorted = defects.to_vec();
    sorted.sort_unstable();

    let q1 = position_quantile(&sorted, 0.25) as f64;
    let q3 = position_quantile(&sorted, 0.75) as f64;
    q3 + multiplier * (q3 - q1)
}

/// Smallest `k` with `CDF(k) > 1 - tail`, stopping at `search_limit`
///
/// Parameters statrs cannot evaluate yield the limit, which keeps
/// everything up to it.
pub fn tail_cutoff(params: &FittedParams, tail: f64, search_limit: u64) -> u64 {
    let model = match params.model() {
        Some(model) => model,
        None => return search_limit,
    };
    let target = 1.0 - tail;

    (0..search_limit)
        .find(|&k| model.cdf(k) > target)
        .unwrap_or(search_limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iqr(multiplier: f64) -> OutlierFilter {
        OutlierFilter::new(OutlierPolicy::Iqr { multiplier })
    }

    #[test]
    fn test_iqr_removes_high_values_only() {
        // sorted: 1 2 2 3 3 4 5 40; Q1 = sorted[2] = 2, Q3 = sorted[6] = 5
        let defects = [3, 1, 40, 2, 5, 2, 4, 3];
        assert_eq!(iqr_upper_bound(&defects, 1.5), 9.5);

        let report = iqr(1.5).filter(&defects).unwrap();
        assert_eq!(report.kept, vec![3, 1, 2, 5, 2, 4, 3]);
        assert_eq!(report.kept_indices, vec![0, 1, 3, 4, 5, 6, 7]);
        assert_eq!(report.removed, 1);
    }

    #[test]
    fn test_iqr_keeps_everything_without_spread() {
        let defects = [0, 0, 0, 0, 0];
        let report = iqr(1.5).filter(&defects).unwrap();
        assert_eq!(report.kept.len(), 5);
        assert_eq!(report.removed, 0);
    }

    #[test]
    fn test_iqr_preserves_multiplicity() {
        let defects = [2, 2, 2, 3, 3, 50];
        let report = iqr(1.5).filter(&defects).unwrap();
        assert_eq!(report.kept, vec![2, 2, 2, 3, 3]);
    }

    #[test]
    fn test_tail_cutoff_for_poisson() {
        // Poisson(2): CDF(7) = 0.99890, CDF(8) = 0.99976
        let params = FittedParams::Poisson { lambda: 2.0 };
        assert_eq!(tail_cutoff(&params, 0.001, 100), 8);
    }

    #[test]
    fn test_tail_cutoff_hits_search_limit() {
        let params = FittedParams::Poisson { lambda: 500.0 };
        assert_eq!(tail_cutoff(&params, 0.001, 100), 100);
    }

    #[test]
    fn test_tail_policy_filters() {
        let filter = OutlierFilter::new(OutlierPolicy::TailProbability {
            params: FittedParams::Poisson { lambda: 2.0 },
            tail: 0.001,
            search_limit: 100,
        });
        let report = filter.filter(&[1, 3, 8, 9, 0, 25]).unwrap();
        assert_eq!(report.kept, vec![1, 3, 8, 0]);
        assert_eq!(report.removed, 2);
        assert_eq!(report.upper_bound, 8.0);
    }

    #[test]
    fn test_everything_removed_is_fatal() {
        let filter = OutlierFilter::new(OutlierPolicy::TailProbability {
            params: FittedParams::Poisson { lambda: 0.5 },
            tail: 0.001,
            search_limit: 100,
        });
        let err = filter.filter(&[50, 60, 70]).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::EmptyAfterFiltering {
                removed: 3,
                policy: OutlierPolicyKind::TailProbability,
            }
        );
        assert!(err.to_string().contains("sample empty after outlier filtering"));
    }
}
