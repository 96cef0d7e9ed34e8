// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Application engine - owns the last valid result

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::EventBus;
use crate::analysis::{analyze, AnalysisResult, BatchRecord};
use crate::config::{validate_significance, AnalysisConfig, Config};
use crate::db::{HistoryEntry, HistoryStore};

pub struct Engine {
    pub config: Arc<Config>,
    analysis_config: RwLock<AnalysisConfig>,
    last_result: RwLock<Option<AnalysisResult>>,
    /// Number of `run` calls started so far
    generation: AtomicU64,
    event_bus: Arc<EventBus>,
    history: Option<Arc<dyn HistoryStore>>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            analysis_config: RwLock::new(config.analysis.clone()),
            config: Arc::new(config),
            last_result: RwLock::new(None),
            generation: AtomicU64::new(0),
            event_bus: Arc::new(EventBus::default()),
            history: None,
        }
    }

    /// Record every successful run to `store`
    pub fn with_history(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub async fn analysis_config(&self) -> AnalysisConfig {
        self.analysis_config.read().await.clone()
    }

    /// Analyse `records` off the async executor
    ///
    /// A failed run leaves the previous result in place. A run overtaken by
    /// a later call is discarded and returns an error.
    pub async fn run(&self, records: Vec<BatchRecord>) -> Result<AnalysisResult> {
        let generation = self.next_generation();
        let config = self.analysis_config().await;
        info!("Analysing {} batches (run {})", records.len(), generation);

        let outcome = tokio::task::spawn_blocking(move || analyze(&records, &config))
            .await
            .map_err(|e| anyhow!("analysis task panicked: {}", e))?;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("Analysis failed, keeping previous result: {}", e);
                self.event_bus.publish_failed(&e.to_string());
                return Err(e.into());
            }
        };

        let result = self
            .commit(generation, result)
            .await?
            .ok_or_else(|| anyhow!("analysis run {} was superseded by a newer run", generation))?;
        self.event_bus.publish_completed(&result);

        if let Some(history) = &self.history {
            // history is best effort; the result stands either way
            let recorded =
                HistoryEntry::from_result(&result).and_then(|entry| history.record(&entry));
            if let Err(e) = recorded {
                warn!("Failed to record analysis history: {}", e);
            }
        }

        Ok(result)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store the result of run `generation` unless a later run has started
    ///
    /// The stored copy is judged at the significance level in force now,
    /// not the one the run started with.
    async fn commit(
        &self,
        generation: u64,
        result: AnalysisResult,
    ) -> Result<Option<AnalysisResult>> {
        let mut last = self.last_result.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarded stale analysis run {}", generation);
            return Ok(None);
        }

        let alpha = self.analysis_config.read().await.significance_level;
        let result = if result.significance_level == alpha {
            result
        } else {
            debug!(
                "Significance changed to {} during run {}, re-judging",
                alpha, generation
            );
            result.with_significance(alpha)?
        };

        *last = Some(result.clone());
        Ok(Some(result))
    }

    pub async fn last_result(&self) -> Option<AnalysisResult> {
        self.last_result.read().await.clone()
    }

    /// Change alpha for future runs and re-judge the current result
    pub async fn set_significance(&self, alpha: f64) -> Result<Option<AnalysisResult>> {
        validate_significance(alpha)?;
        self.analysis_config.write().await.significance_level = alpha;

        let mut last = self.last_result.write().await;
        let updated = match last.as_ref() {
            Some(current) => Some(current.with_significance(alpha)?),
            None => None,
        };
        *last = updated.clone();

        self.event_bus.publish_significance(alpha, updated.as_ref().map(|r| r.best));
        info!("Significance level set to {}", alpha);

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlierPolicyKind;
    use crate::core::EventPayload;
    use crate::db::{HistoryFilter, MemoryHistory};

    fn records() -> Vec<BatchRecord> {
        [0usize, 2, 4, 7, 9, 9, 7, 5, 3, 2, 1, 1]
            .iter()
            .enumerate()
            .flat_map(|(k, &count)| {
                std::iter::repeat(BatchRecord::new(100, k as u64)).take(count)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_run_stores_result_and_history() {
        let history = Arc::new(MemoryHistory::new());
        let engine = Engine::new(Config::default()).with_history(history.clone());
        let mut events = engine.event_bus().subscribe_events();

        let result = engine.run(records()).await.unwrap();
        assert_eq!(engine.last_result().await, Some(result.clone()));

        let event = events.recv().await.unwrap();
        assert!(matches!(event.payload, EventPayload::Completed { batches: 50, .. }));

        let entries = history.query(&HistoryFilter::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].best_distribution, result.best);
        assert_eq!(entries[0].batch_count, 50);
    }

    #[tokio::test]
    async fn test_failed_run_keeps_previous_result() {
        let mut config = Config::default();
        config.analysis.include_outliers = false;
        config.analysis.outlier_policy = OutlierPolicyKind::TailProbability;
        let engine = Engine::new(config);

        let first = engine.run(records()).await.unwrap();
        let mut events = engine.event_bus().subscribe_events();

        let outliers_only: Vec<_> = (0..5).map(|i| BatchRecord::new(1000, 400 + i)).collect();
        let err = engine.run(outliers_only).await.unwrap_err();
        assert!(err.to_string().contains("sample empty after outlier filtering"));

        assert_eq!(engine.last_result().await, Some(first));
        let event = events.recv().await.unwrap();
        assert!(matches!(event.payload, EventPayload::Failed { .. }));
    }

    #[tokio::test]
    async fn test_set_significance_rejudges_last_result() {
        let engine = Engine::new(Config::default());
        assert_eq!(engine.set_significance(0.1).await.unwrap(), None);

        let result = engine.run(records()).await.unwrap();
        let updated = engine.set_significance(0.2).await.unwrap().unwrap();

        assert_eq!(updated.significance_level, 0.2);
        assert_eq!(updated.frequencies, result.frequencies);
        assert_eq!(engine.analysis_config().await.significance_level, 0.2);

        assert!(engine.set_significance(1.0).await.is_err());
        assert_eq!(engine.analysis_config().await.significance_level, 0.2);
    }

    #[tokio::test]
    async fn test_superseded_run_is_discarded() {
        let engine = Engine::new(Config::default());
        let mut events = engine.event_bus().subscribe_events();

        let older_generation = engine.next_generation();
        let older = analyze(&records(), &engine.analysis_config().await).unwrap();

        let newer = engine.run(records()[..40].to_vec()).await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap().payload,
            EventPayload::Completed { batches: 40, .. }
        ));

        assert_eq!(engine.commit(older_generation, older).await.unwrap(), None);
        assert_eq!(engine.last_result().await, Some(newer));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_result_stored_at_current_significance() {
        let engine = Engine::new(Config::default());

        let generation = engine.next_generation();
        let computed = analyze(&records(), &engine.analysis_config().await).unwrap();
        assert_eq!(computed.significance_level, 0.05);

        // changed while the run was still in flight
        assert_eq!(engine.set_significance(0.2).await.unwrap(), None);

        let stored = engine.commit(generation, computed.clone()).await.unwrap().unwrap();
        assert_eq!(stored.significance_level, 0.2);
        assert_eq!(stored, computed.with_significance(0.2).unwrap());
        assert_eq!(engine.last_result().await, Some(stored));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_significance_change_during_run() {
        let engine = Arc::new(Engine::new(Config::default()));
        let many: Vec<_> = records().into_iter().cycle().take(500_000).collect();

        let running = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run(many).await })
        };
        engine.set_significance(0.2).await.unwrap();

        let result = running.await.unwrap().unwrap();
        assert_eq!(result.significance_level, 0.2);
        assert_eq!(engine.last_result().await.map(|r| r.significance_level), Some(0.2));
        assert_eq!(engine.analysis_config().await.significance_level, 0.2);
    }
}
