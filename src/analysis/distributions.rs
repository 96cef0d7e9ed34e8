// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Candidate families, fitted parameters, and the statrs boundary
//!
//! Every probability that leaves this module has already been clamped:
//! NaN, infinite or negative evaluations come back as `0.0`.

use serde::{Deserialize, Serialize};
use statrs::distribution::{
    Binomial, ChiSquared, ContinuousCDF, Discrete, DiscreteCDF, NegativeBinomial, Poisson,
};
use std::fmt;

/// The three candidate families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    Poisson,
    Binomial,
    NegativeBinomial,
}

impl DistributionKind {
    /// Fixed evaluation order, also used to break selection ties
    pub const ALL: [DistributionKind; 3] = [
        DistributionKind::Poisson,
        DistributionKind::Binomial,
        DistributionKind::NegativeBinomial,
    ];

    /// Number of parameters estimated from the data
    pub const fn num_params(self) -> usize {
        match self {
            DistributionKind::Poisson => 1,
            DistributionKind::Binomial => 2,
            DistributionKind::NegativeBinomial => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DistributionKind::Poisson => "Poisson",
            DistributionKind::Binomial => "Binomial",
            DistributionKind::NegativeBinomial => "NegativeBinomial",
        }
    }

    /// Inverse of [`DistributionKind::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per candidate family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerDistribution<T> {
    pub poisson: T,
    pub binomial: T,
    pub negative_binomial: T,
}

impl<T> PerDistribution<T> {
    pub fn from_fn(mut f: impl FnMut(DistributionKind) -> T) -> Self {
        Self {
            poisson: f(DistributionKind::Poisson),
            binomial: f(DistributionKind::Binomial),
            negative_binomial: f(DistributionKind::NegativeBinomial),
        }
    }

    pub fn get(&self, kind: DistributionKind) -> &T {
        match kind {
            DistributionKind::Poisson => &self.poisson,
            DistributionKind::Binomial => &self.binomial,
            DistributionKind::NegativeBinomial => &self.negative_binomial,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(DistributionKind, &T) -> U) -> PerDistribution<U> {
        PerDistribution::from_fn(|kind| f(kind, self.get(kind)))
    }

    /// Entries in [`DistributionKind::ALL`] order
    pub fn iter(&self) -> impl Iterator<Item = (DistributionKind, &T)> {
        DistributionKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

/// Negative binomial parameters in the domain convention
///
/// `p` is the success probability of the mean `r (1 - p) / p`, as produced by
/// the method-of-moments estimate `p = mean / variance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NegBinomialParams {
    pub r: f64,
    pub p: f64,
}

impl NegBinomialParams {
    /// Probability argument for `statrs::distribution::NegativeBinomial`
    ///
    /// statrs counts failures before the r-th success and takes the success
    /// probability, i.e. the same convention as the domain parameter. Libraries
    /// that take the failure probability instead need `1.0 - self.p` here.
    pub fn library_success_probability(&self) -> f64 {
        self.p
    }

    pub fn mean(&self) -> f64 {
        self.r * (1.0 - self.p) / self.p
    }

    pub fn variance(&self) -> f64 {
        self.r * (1.0 - self.p) / (self.p * self.p)
    }

    pub fn is_valid(&self) -> bool {
        self.r.is_finite() && self.r > 0.0 && self.p > 0.0 && self.p < 1.0
    }
}

/// Point estimates for one family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum FittedParams {
    Poisson { lambda: f64 },
    Binomial { n: u64, p: f64 },
    NegativeBinomial(NegBinomialParams),
}

impl FittedParams {
    pub fn kind(&self) -> DistributionKind {
        match self {
            FittedParams::Poisson { .. } => DistributionKind::Poisson,
            FittedParams::Binomial { .. } => DistributionKind::Binomial,
            FittedParams::NegativeBinomial(_) => DistributionKind::NegativeBinomial,
        }
    }

    /// Build an evaluable model, `None` when statrs rejects the parameters
    pub fn model(&self) -> Option<ProbabilityModel> {
        match *self {
            FittedParams::Poisson { lambda } if lambda == 0.0 => {
                Some(ProbabilityModel::PointMass(0))
            }
            FittedParams::Poisson { lambda } => {
                Poisson::new(lambda).ok().map(ProbabilityModel::Poisson)
            }
            FittedParams::Binomial { n, p } => {
                Binomial::new(p, n).ok().map(ProbabilityModel::Binomial)
            }
            FittedParams::NegativeBinomial(params) if params.is_valid() => {
                NegativeBinomial::new(params.r, params.library_success_probability())
                    .ok()
                    .map(ProbabilityModel::NegativeBinomial)
            }
            FittedParams::NegativeBinomial(_) => None,
        }
    }
}

impl fmt::Display for FittedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FittedParams::Poisson { lambda } => write!(f, "Poisson(λ={:.4})", lambda),
            FittedParams::Binomial { n, p } => write!(f, "Binomial(n={}, p={:.4})", n, p),
            FittedParams::NegativeBinomial(nb) => {
                write!(f, "NegativeBinomial(r={:.4}, p={:.4})", nb.r, nb.p)
            }
        }
    }
}

/// Whether a family was genuinely identified by the data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitOutcome {
    Fitted { params: FittedParams },
    /// Neutral parameters kept so frequencies can still be drawn
    Degenerate { params: FittedParams, reason: String },
}

/// Estimated parameters for one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionFit {
    pub kind: DistributionKind,
    pub outcome: FitOutcome,
}

impl DistributionFit {
    pub fn fitted(params: FittedParams) -> Self {
        Self {
            kind: params.kind(),
            outcome: FitOutcome::Fitted { params },
        }
    }

    pub fn degenerate(params: FittedParams, reason: impl Into<String>) -> Self {
        Self {
            kind: params.kind(),
            outcome: FitOutcome::Degenerate {
                params,
                reason: reason.into(),
            },
        }
    }

    pub fn params(&self) -> &FittedParams {
        match &self.outcome {
            FitOutcome::Fitted { params } => params,
            FitOutcome::Degenerate { params, .. } => params,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self.outcome, FitOutcome::Degenerate { .. })
    }

    pub fn num_params(&self) -> usize {
        self.kind.num_params()
    }
}

/// A family with validated statrs parameters
#[derive(Debug, Clone, Copy)]
pub enum ProbabilityModel {
    /// All mass at a single count (Poisson with zero rate)
    PointMass(u64),
    Poisson(Poisson),
    Binomial(Binomial),
    NegativeBinomial(NegativeBinomial),
}

impl ProbabilityModel {
    pub fn pmf(&self, k: u64) -> f64 {
        let raw = match self {
            ProbabilityModel::PointMass(at) => {
                if k == *at {
                    1.0
                } else {
                    0.0
                }
            }
            ProbabilityModel::Poisson(d) => d.pmf(k),
            ProbabilityModel::Binomial(d) => d.pmf(k),
            ProbabilityModel::NegativeBinomial(d) => d.pmf(k),
        };
        clamp_probability(raw)
    }

    pub fn cdf(&self, k: u64) -> f64 {
        let raw = match self {
            ProbabilityModel::PointMass(at) => {
                if k >= *at {
                    1.0
                } else {
                    0.0
                }
            }
            ProbabilityModel::Poisson(d) => d.cdf(k),
            ProbabilityModel::Binomial(d) => d.cdf(k),
            ProbabilityModel::NegativeBinomial(d) => d.cdf(k),
        };
        clamp_probability(raw).min(1.0)
    }
}

/// Map NaN, infinite and negative values to zero
pub fn clamp_probability(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Chi-square CDF, NaN when `df` is not positive
pub fn chi_square_cdf(x: f64, df: f64) -> f64 {
    match ChiSquared::new(df) {
        Ok(_) if x <= 0.0 => 0.0,
        Ok(d) => d.cdf(x),
        Err(_) => f64::NAN,
    }
}

/// Upper tail `1 - CDF`, NaN when `df` is not positive
pub fn chi_square_sf(x: f64, df: f64) -> f64 {
    match ChiSquared::new(df) {
        Ok(_) if x <= 0.0 => 1.0,
        Ok(_) if x == f64::INFINITY => 0.0,
        Ok(d) => d.sf(x),
        Err(_) => f64::NAN,
    }
}

const QUANTILE_ITERATIONS: usize = 200;

/// Chi-square quantile by bisection on the CDF
///
/// statrs' generic `inverse_cdf` only runs 16 bisection steps, which is too
/// coarse for critical values. Returns NaN for `df <= 0` or `prob` outside (0, 1).
pub fn chi_square_quantile(prob: f64, df: f64) -> f64 {
    if !(prob > 0.0 && prob < 1.0) {
        return f64::NAN;
    }
    let dist = match ChiSquared::new(df) {
        Ok(d) => d,
        Err(_) => return f64::NAN,
    };

    let mut low = 0.0_f64;
    let mut high = df.max(1.0);
    while dist.cdf(high) < prob {
        low = high;
        high *= 2.0;
        if !high.is_finite() {
            return f64::NAN;
        }
    }

    for _ in 0..QUANTILE_ITERATIONS {
        let mid = 0.5 * (low + high);
        if dist.cdf(mid) < prob {
            low = mid;
        } else {
            high = mid;
        }
        if high - low <= 1e-12 * high.max(1.0) {
            break;
        }
    }

    0.5 * (low + high)
}
