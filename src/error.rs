// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Fatal analysis errors
//!
//! Anything in here aborts the whole run. Problems confined to one
//! distribution (too few valid bins, unusable parameters) are not errors;
//! they show up as an infinite chi-square on that distribution's result.

use thiserror::Error;

use crate::config::OutlierPolicyKind;

/// Precondition failures that stop an analysis run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// No batch records were supplied
    #[error("no batch records supplied")]
    EmptyInput,

    /// A record reports more defects than inspected items
    #[error("record {index} reports {defects} defects out of {total} items")]
    InvalidRecord {
        index: usize,
        total: u64,
        defects: u64,
    },

    /// Summing the inspected items overflows a 64-bit count
    #[error("total inspected items overflows a 64-bit count")]
    ItemCountOverflow,

    /// Largest defect count is too wide for a per-count histogram
    #[error("largest defect count {max_defects} exceeds the supported maximum of {limit}")]
    SupportTooLarge { max_defects: u64, limit: u64 },

    /// Outlier filtering removed every value
    #[error("sample empty after outlier filtering ({removed} values removed by the {policy} rule)")]
    EmptyAfterFiltering {
        removed: usize,
        policy: OutlierPolicyKind,
    },

    /// Mean or variance came out NaN or infinite
    #[error("sample moments are not finite (mean={mean}, variance={variance})")]
    NonFiniteMoments { mean: f64, variance: f64 },

    /// Significance level outside (0, 1)
    #[error("significance level {0} must lie strictly between 0 and 1")]
    InvalidSignificance(f64),

    /// IQR multiplier is not a positive finite number
    #[error("outlier threshold {0} must be a positive finite number")]
    InvalidThreshold(f64),

    /// Tail probability outside (0, 1)
    #[error("tail probability {0} must lie strictly between 0 and 1")]
    InvalidTailProbability(f64),

    /// Minimum expected frequency is not a positive finite number
    #[error("minimum expected frequency {0} must be a positive finite number")]
    InvalidMinExpected(f64),
}
