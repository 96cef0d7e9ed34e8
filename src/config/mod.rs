// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::analysis::DistributionKind;
use crate::error::AnalysisError;
use crate::simulator::SimulationProfile;

/// Significance levels the dashboard lets users pick from
pub const SIGNIFICANCE_UI_RANGE: (f64, f64) = (0.001, 0.20);

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Analyse simulated batches instead of an input file
    pub demo_mode: bool,

    /// Fitting pipeline configuration
    pub analysis: AnalysisConfig,

    /// Demo data generator configuration
    pub simulator: SimulatorConfig,

    /// History database configuration
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "defectfit".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            demo_mode: false,
            analysis: AnalysisConfig::default(),
            simulator: SimulatorConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("defectfit"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Which rule the outlier filter applies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutlierPolicyKind {
    /// Drop values above `Q3 + k * IQR`
    Iqr,
    /// Drop values beyond the upper tail quantile of a fitted distribution
    TailProbability,
}

impl fmt::Display for OutlierPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierPolicyKind::Iqr => write!(f, "IQR"),
            OutlierPolicyKind::TailProbability => write!(f, "tail-probability"),
        }
    }
}

/// Fitting pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Significance level (alpha) of the goodness-of-fit test
    pub significance_level: f64,

    /// Keep outliers in the sample (skips filtering entirely)
    pub include_outliers: bool,

    /// Rule used when outliers are filtered
    pub outlier_policy: OutlierPolicyKind,

    /// IQR multiplier for the IQR rule
    pub outlier_threshold: f64,

    /// Upper tail mass cut off by the tail-probability rule
    pub tail_probability: f64,

    /// Family fitted to the raw sample for the tail-probability rule
    pub tail_distribution: DistributionKind,

    /// Largest cut-off the tail-probability search will reach
    pub tail_search_limit: u64,

    /// Minimum expected count per bin
    pub min_expected_frequency: f64,

    /// Batch count below which results are flagged as unreliable
    pub min_reliable_batches: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            include_outliers: true,
            outlier_policy: OutlierPolicyKind::Iqr,
            outlier_threshold: 1.5,
            tail_probability: 0.001,
            tail_distribution: DistributionKind::Poisson,
            tail_search_limit: 100,
            min_expected_frequency: 5.0,
            min_reliable_batches: 30,
        }
    }
}

impl AnalysisConfig {
    /// Check the numeric settings the pipeline depends on
    pub fn validate(&self) -> Result<(), AnalysisError> {
        validate_significance(self.significance_level)?;

        if !(self.outlier_threshold.is_finite() && self.outlier_threshold > 0.0) {
            return Err(AnalysisError::InvalidThreshold(self.outlier_threshold));
        }
        if !(self.tail_probability > 0.0 && self.tail_probability < 1.0) {
            return Err(AnalysisError::InvalidTailProbability(self.tail_probability));
        }
        if !(self.min_expected_frequency.is_finite() && self.min_expected_frequency > 0.0) {
            return Err(AnalysisError::InvalidMinExpected(self.min_expected_frequency));
        }

        let (low, high) = SIGNIFICANCE_UI_RANGE;
        if self.significance_level < low || self.significance_level > high {
            warn!(
                "Significance level {} is outside the usual range [{}, {}]",
                self.significance_level, low, high
            );
        }

        Ok(())
    }
}

/// Reject significance levels outside (0, 1)
pub fn validate_significance(alpha: f64) -> Result<(), AnalysisError> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidSignificance(alpha))
    }
}

/// Demo data configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Number of batches to generate
    pub batches: usize,

    /// Items inspected per batch
    pub batch_size: u64,

    /// RNG seed
    pub seed: u64,

    /// Defect-generating process
    pub profile: SimulationProfile,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            batches: 100,
            batch_size: 100,
            seed: 42,
            profile: SimulationProfile::Poisson { mean: 5.0 },
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Record each completed analysis
    pub enabled: bool,

    /// Database path
    pub path: PathBuf,

    /// Retention period in days
    pub retention_days: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("./data/defectfit.db"),
            retention_days: 90,
        }
    }
}
