// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Background analysis where only the latest submission is published

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::analysis::{analyze, AnalysisResult, BatchRecord};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;

/// A finished run
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    pub generation: u64,
    pub outcome: Result<Arc<AnalysisResult>, AnalysisError>,
}

/// Handle to a submitted run
pub struct Submission {
    pub generation: u64,
    pub handle: JoinHandle<()>,
}

pub struct AnalysisWorker {
    config: AnalysisConfig,
    generation: Arc<AtomicU64>,
    output_tx: Arc<watch::Sender<Option<WorkerOutput>>>,
}

impl AnalysisWorker {
    pub fn new(config: AnalysisConfig) -> Self {
        let (output_tx, _) = watch::channel(None);
        Self {
            config,
            generation: Arc::new(AtomicU64::new(0)),
            output_tx: Arc::new(output_tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<WorkerOutput>> {
        self.output_tx.subscribe()
    }

    /// Generation of the most recent submission
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a run; any earlier run still in flight becomes stale
    pub fn submit(&self, records: Vec<BatchRecord>) -> Submission {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = self.generation.clone();
        let output_tx = self.output_tx.clone();
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            let task = tokio::task::spawn_blocking(move || analyze(&records, &config));
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Analysis run {} did not finish: {}", generation, e);
                    return;
                }
            };

            let published = output_tx.send_if_modified(|current| {
                if latest.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *current = Some(WorkerOutput {
                    generation,
                    outcome: outcome.map(Arc::new),
                });
                true
            });

            if !published {
                debug!("Discarded stale analysis run {}", generation);
            }
        });

        Submission { generation, handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(defects: &[u64]) -> Vec<BatchRecord> {
        defects.iter().map(|&d| BatchRecord::new(50, d)).collect()
    }

    #[tokio::test]
    async fn test_publishes_completed_run() {
        let worker = AnalysisWorker::new(AnalysisConfig::default());
        let rx = worker.subscribe();

        let submission = worker.submit(records(&[1, 2, 2, 3, 4, 1, 0, 2]));
        assert_eq!(submission.generation, 1);
        submission.handle.await.unwrap();

        let output = rx.borrow().clone().unwrap();
        assert_eq!(output.generation, 1);
        assert_eq!(output.outcome.unwrap().statistics.n, 8);
    }

    #[tokio::test]
    async fn test_latest_submission_wins() {
        let worker = AnalysisWorker::new(AnalysisConfig::default());
        let rx = worker.subscribe();

        let first = worker.submit(records(&[1, 2, 3]));
        let second = worker.submit(records(&[0, 0, 5, 5, 5]));
        assert_eq!(worker.generation(), 2);

        first.handle.await.unwrap();
        second.handle.await.unwrap();

        let output = rx.borrow().clone().unwrap();
        assert_eq!(output.generation, 2);
        assert_eq!(output.outcome.unwrap().statistics.n, 5);
    }

    #[tokio::test]
    async fn test_errors_are_published() {
        let worker = AnalysisWorker::new(AnalysisConfig::default());
        let rx = worker.subscribe();

        worker.submit(Vec::new()).handle.await.unwrap();

        let output = rx.borrow().clone().unwrap();
        assert_eq!(output.outcome.unwrap_err(), AnalysisError::EmptyInput);
    }
}
