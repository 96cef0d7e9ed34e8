// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! defectfit - Defect-Count Distribution Fitting
//!
//! Decides which discrete distribution best explains batch-level defect
//! counts:
//! - Poisson, Binomial and Negative Binomial fitted by the method of moments
//! - IQR or tail-probability outlier filtering
//! - Adaptive binning so every bin meets the minimum expected frequency
//! - Pearson chi-square goodness-of-fit with p-value based selection
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Analysis Pipeline                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐  ┌──────────┐  ┌────────────┐  ┌────────────┐   │
//! │  │ Outlier │→ │ Moment   │→ │ Frequency  │→ │ Adaptive   │   │
//! │  │ Filter  │  │ Estimator│  │ Builder    │  │ Binner     │   │
//! │  └─────────┘  └──────────┘  └────────────┘  └────────────┘   │
//! │                                                    ↓         │
//! │                   ┌──────────────┐  ┌──────────────────┐     │
//! │                   │ Distribution │← │ Chi-Square       │     │
//! │                   │ Selector     │  │ Evaluator (x3)   │     │
//! │                   └──────────────┘  └──────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//!        ↓                     ↓                      ↓
//!   ┌─────────┐         ┌────────────┐         ┌────────────┐
//!   │ Engine  │ ──────→ │ Event Bus  │         │  History   │
//!   │ Worker  │         └────────────┘         │  Store     │
//!   └─────────┘                                └────────────┘
//! ```

#![allow(dead_code)]

pub mod analysis;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod simulator;

// Re-exports for convenience
pub use analysis::{analyze, AnalysisEngine, AnalysisResult, BatchRecord, DistributionKind};
pub use config::Config;
pub use core::{AnalysisWorker, Engine, EventBus};
pub use db::{Database, HistoryStore, MemoryHistory};
pub use error::AnalysisError;
pub use simulator::BatchSimulator;

/// defectfit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// defectfit name
pub const NAME: &str = "defectfit";
