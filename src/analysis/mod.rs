// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Analysis module - distribution fitting and goodness-of-fit testing

mod binning;
mod chi_square;
mod distributions;
mod frequencies;
mod outliers;
mod selection;
mod statistics;

pub use binning::*;
pub use chi_square::*;
pub use distributions::*;
pub use frequencies::*;
pub use outliers::*;
pub use selection::*;
pub use statistics::*;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{validate_significance, AnalysisConfig, OutlierPolicyKind};
use crate::error::AnalysisError;

/// One inspected batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Items inspected
    pub total: u64,
    /// Defective items found, never more than `total`
    pub defects: u64,
}

impl BatchRecord {
    pub fn new(total: u64, defects: u64) -> Self {
        Self { total, defects }
    }
}

/// Everything one analysis run produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub statistics: SampleStatistics,
    pub fits: PerDistribution<DistributionFit>,
    pub chi_square: PerDistribution<ChiSquareResult>,
    pub frequencies: FrequencyTable,
    pub best: DistributionKind,
    pub best_fit: DistributionFit,
    /// Whether the selected family passed the test
    pub hypothesis_accepted: bool,
    pub significance_level: f64,
    pub outliers: OutlierSummary,
    /// Fewer batches than the configured reliability minimum
    pub small_sample_warning: bool,
}

impl AnalysisResult {
    pub fn best_test(&self) -> &ChiSquareResult {
        self.chi_square.get(self.best)
    }

    /// Same bins and statistics judged at another significance level
    pub fn with_significance(&self, alpha: f64) -> Result<Self, AnalysisError> {
        validate_significance(alpha)?;

        let chi_square = self.chi_square.map(|_, result| result.reevaluate(alpha));
        let selection = DistributionSelector::select(&chi_square);

        Ok(Self {
            chi_square,
            best: selection.best,
            best_fit: self.fits.get(selection.best).clone(),
            hypothesis_accepted: selection.hypothesis_accepted,
            significance_level: alpha,
            ..self.clone()
        })
    }
}

/// The fitting pipeline
///
/// Stateless between runs: the same records and configuration always give
/// the same result.
pub struct AnalysisEngine {
    config: AnalysisConfig,
    estimator: MomentEstimator,
    frequency_builder: TheoreticalFrequencyBuilder,
    binner: AdaptiveBinner,
    evaluator: ChiSquareEvaluator,
}

impl AnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            binner: AdaptiveBinner::new(config.min_expected_frequency),
            evaluator: ChiSquareEvaluator::new(config.min_expected_frequency),
            estimator: MomentEstimator::new(),
            frequency_builder: TheoreticalFrequencyBuilder::new(),
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(&self, records: &[BatchRecord]) -> Result<AnalysisResult, AnalysisError> {
        self.config.validate()?;
        validate_records(records)?;

        let alpha = self.config.significance_level;
        let defects: Vec<u64> = records.iter().map(|r| r.defects).collect();

        let (sample, kept_items, outliers) = if self.config.include_outliers {
            let items = total_items(records)?;
            (defects, items, OutlierSummary::included())
        } else {
            let filter = OutlierFilter::new(self.outlier_policy(records, &defects)?);
            let report = filter.filter(&defects)?;
            let items = total_items(report.kept_indices.iter().map(|&i| &records[i]))?;
            if report.removed > 0 {
                info!(
                    "Removed {} outlier batches above {:.2} ({} rule)",
                    report.removed,
                    report.upper_bound,
                    filter.policy().kind()
                );
            }
            let summary = OutlierSummary {
                policy: Some(filter.policy().kind()),
                removed: report.removed,
                upper_bound: Some(report.upper_bound),
            };
            (report.kept, items, summary)
        };

        let MomentEstimate { statistics, fits } = self.estimator.estimate(&sample, kept_items)?;
        debug!(
            "Sample moments: n={}, mean={:.4}, variance={:.4}, rate={:.6}",
            statistics.n, statistics.mean, statistics.variance, statistics.defect_rate
        );

        let small_sample_warning = statistics.n < self.config.min_reliable_batches;
        if small_sample_warning {
            warn!(
                "Only {} batches analysed; at least {} are recommended for a reliable test",
                statistics.n, self.config.min_reliable_batches
            );
        }

        let observed = observed_histogram(&sample)?;
        let max_defects = observed.len() as u64 - 1;
        let expected = self.frequency_builder.build(max_defects, &fits, statistics.n);
        let frequencies = self.binner.bin(&observed, &expected);
        debug!("Binned support 0..={} into {} bins", max_defects, frequencies.len());

        let chi_square = PerDistribution::from_fn(|kind| {
            if fits.get(kind).params().model().is_none() {
                return ChiSquareResult::untestable(0);
            }
            self.evaluator.evaluate(
                &frequencies.observed,
                frequencies.expected_for(kind),
                kind.num_params(),
                alpha,
            )
        });
        for (kind, result) in chi_square.iter() {
            debug!(
                "{}: chi2={:.4}, df={}, p={:.4}, accepted={}",
                kind,
                result.chi_square,
                result.degrees_of_freedom,
                result.p_value,
                result.is_accepted
            );
        }

        let selection = DistributionSelector::select(&chi_square);
        info!(
            "Best fit: {} (p={:.4}, {})",
            fits.get(selection.best).params(),
            chi_square.get(selection.best).p_value,
            if selection.hypothesis_accepted { "accepted" } else { "rejected" }
        );

        Ok(AnalysisResult {
            best_fit: fits.get(selection.best).clone(),
            best: selection.best,
            hypothesis_accepted: selection.hypothesis_accepted,
            significance_level: alpha,
            statistics,
            fits,
            chi_square,
            frequencies,
            outliers,
            small_sample_warning,
        })
    }

    fn outlier_policy(
        &self,
        records: &[BatchRecord],
        defects: &[u64],
    ) -> Result<OutlierPolicy, AnalysisError> {
        Ok(match self.config.outlier_policy {
            OutlierPolicyKind::Iqr => OutlierPolicy::Iqr {
                multiplier: self.config.outlier_threshold,
            },
            OutlierPolicyKind::TailProbability => {
                let items = total_items(records)?;
                let raw = self.estimator.sample_statistics(defects, items)?;
                let fit = self.estimator.fit(self.config.tail_distribution, &raw);
                OutlierPolicy::TailProbability {
                    params: *fit.params(),
                    tail: self.config.tail_probability,
                    search_limit: self.config.tail_search_limit,
                }
            }
        })
    }
}

/// Run the pipeline once with the given settings
pub fn analyze(
    records: &[BatchRecord],
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    AnalysisEngine::new(config.clone()).analyze(records)
}

fn total_items<'a, I>(records: I) -> Result<u64, AnalysisError>
where
    I: IntoIterator<Item = &'a BatchRecord>,
{
    records
        .into_iter()
        .try_fold(0u64, |sum, r| sum.checked_add(r.total))
        .ok_or(AnalysisError::ItemCountOverflow)
}

fn validate_records(records: &[BatchRecord]) -> Result<(), AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    match records.iter().position(|r| r.defects > r.total) {
        Some(index) => Err(AnalysisError::InvalidRecord {
            index,
            total: records[index].total,
            defects: records[index].defects,
        }),
        None => Ok(()),
    }
}
