// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Sample moments and method-of-moments parameter estimates

use serde::Serialize;
use tracing::debug;

use super::distributions::{
    chi_square_quantile, DistributionFit, DistributionKind, FittedParams, NegBinomialParams,
    PerDistribution,
};
use crate::error::AnalysisError;

/// Two-sided 95% normal quantile
const Z_95: f64 = 1.96;

/// Variance must exceed the mean by this factor to count as overdispersed
const OVERDISPERSION_RATIO: f64 = 1.1;

/// Neutral negative binomial success probability
const NEUTRAL_NB_P: f64 = 0.5;

/// Moments of the (filtered) defect-count sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStatistics {
    /// Number of batches in the sample
    pub n: usize,
    pub mean: f64,
    /// Bessel-corrected sample variance
    pub variance: f64,
    pub std_dev: f64,
    /// Pooled defect rate `sum(defects) / sum(total)`
    pub defect_rate: f64,
    pub mean_ci: (f64, f64),
    /// `None` when the chi-square quantiles are unusable (n < 2)
    pub variance_ci: Option<(f64, f64)>,
    pub has_overdispersion: bool,
    /// Items inspected across the sampled batches
    pub total_items: u64,
}

impl SampleStatistics {
    /// Variance-to-mean ratio, `None` for a zero mean
    pub fn dispersion_index(&self) -> Option<f64> {
        if self.mean > 0.0 {
            Some(self.variance / self.mean)
        } else {
            None
        }
    }
}

/// Statistics plus one fit per family
#[derive(Debug, Clone, PartialEq)]
pub struct MomentEstimate {
    pub statistics: SampleStatistics,
    pub fits: PerDistribution<DistributionFit>,
}

/// Method-of-moments estimator
pub struct MomentEstimator {
    overdispersion_ratio: f64,
}

impl Default for MomentEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl MomentEstimator {
    pub fn new() -> Self {
        Self {
            overdispersion_ratio: OVERDISPERSION_RATIO,
        }
    }

    /// Moments and parameter estimates for one defect count per batch
    pub fn estimate(
        &self,
        defects: &[u64],
        total_items: u64,
    ) -> Result<MomentEstimate, AnalysisError> {
        let statistics = self.sample_statistics(defects, total_items)?;
        let fits = PerDistribution::from_fn(|kind| self.fit(kind, &statistics));

        for (_, fit) in fits.iter() {
            debug!(
                "{} estimate: {}{}",
                fit.kind,
                fit.params(),
                if fit.is_degenerate() { " (degenerate)" } else { "" }
            );
        }

        Ok(MomentEstimate { statistics, fits })
    }

    pub fn sample_statistics(
        &self,
        defects: &[u64],
        total_items: u64,
    ) -> Result<SampleStatistics, AnalysisError> {
        if defects.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        let n = defects.len();
        let nf = n as f64;
        let sum: f64 = defects.iter().map(|&x| x as f64).sum();
        let mean = sum / nf;
        let variance = defects
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / (n.saturating_sub(1).max(1)) as f64;

        if !mean.is_finite() || !variance.is_finite() {
            return Err(AnalysisError::NonFiniteMoments { mean, variance });
        }

        let std_dev = variance.sqrt();
        let half_width = Z_95 * (variance / nf).sqrt();
        let defect_rate = if total_items > 0 {
            sum / total_items as f64
        } else {
            0.0
        };

        Ok(SampleStatistics {
            n,
            mean,
            variance,
            std_dev,
            defect_rate,
            mean_ci: (mean - half_width, mean + half_width),
            variance_ci: variance_confidence_interval(variance, n),
            has_overdispersion: variance > self.overdispersion_ratio * mean,
            total_items,
        })
    }

    pub fn fit(&self, kind: DistributionKind, stats: &SampleStatistics) -> DistributionFit {
        match kind {
            DistributionKind::Poisson => fit_poisson(stats),
            DistributionKind::Binomial => fit_binomial(stats),
            DistributionKind::NegativeBinomial => self.fit_negative_binomial(stats),
        }
    }

    fn fit_negative_binomial(&self, stats: &SampleStatistics) -> DistributionFit {
        let mean = stats.mean;
        let variance = stats.variance;
        let neutral = FittedParams::NegativeBinomial(NegBinomialParams {
            r: if mean > 0.0 { mean } else { 1.0 },
            p: NEUTRAL_NB_P,
        });

        if !(variance > self.overdispersion_ratio * mean) {
            let reason = "no overdispersion (variance <= 1.1 x mean)";
            return DistributionFit::degenerate(neutral, reason);
        }

        let params = NegBinomialParams {
            r: mean * mean / (variance - mean),
            p: mean / variance,
        };
        if params.is_valid() {
            DistributionFit::fitted(FittedParams::NegativeBinomial(params))
        } else {
            DistributionFit::degenerate(
                neutral,
                format!("moment estimates out of range (r={}, p={})", params.r, params.p),
            )
        }
    }
}

fn fit_poisson(stats: &SampleStatistics) -> DistributionFit {
    let params = FittedParams::Poisson { lambda: stats.mean };
    if stats.mean > 0.0 {
        DistributionFit::fitted(params)
    } else {
        DistributionFit::degenerate(params, "zero mean")
    }
}

/// Pooled `p` with the average batch size as the trial count
fn fit_binomial(stats: &SampleStatistics) -> DistributionFit {
    if stats.total_items == 0 {
        let params = FittedParams::Binomial { n: 0, p: 0.0 };
        return DistributionFit::degenerate(params, "no inspected items");
    }

    let n = (stats.total_items as f64 / stats.n as f64).round() as u64;
    let params = FittedParams::Binomial {
        n,
        p: stats.defect_rate.clamp(0.0, 1.0),
    };

    if n == 0 {
        DistributionFit::degenerate(params, "average batch size rounds to zero")
    } else if stats.defect_rate == 0.0 {
        DistributionFit::degenerate(params, "no defects observed")
    } else {
        DistributionFit::fitted(params)
    }
}

/// Chi-square interval for the population variance
pub fn variance_confidence_interval(variance: f64, n: usize) -> Option<(f64, f64)> {
    let df = n.saturating_sub(1) as f64;
    let upper_quantile = chi_square_quantile(0.975, df);
    let lower_quantile = chi_square_quantile(0.025, df);

    let usable = |q: f64| q.is_finite() && q > 0.0;
    if !usable(upper_quantile) || !usable(lower_quantile) {
        return None;
    }

    Some((df * variance / upper_quantile, df * variance / lower_quantile))
}
