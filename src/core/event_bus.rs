// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Event bus for analysis notifications

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::analysis::{AnalysisResult, DistributionKind};

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    AnalysisCompleted,
    AnalysisFailed,
    SignificanceChanged,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EventPayload {
    Completed {
        best: DistributionKind,
        hypothesis_accepted: bool,
        p_value: f64,
        batches: usize,
    },
    Failed {
        message: String,
    },
    SignificanceChanged {
        alpha: f64,
        best: Option<DistributionKind>,
    },
}

/// Central event bus for pub/sub communication
pub struct EventBus {
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    pub fn publish_completed(&self, result: &AnalysisResult) {
        self.publish_event(
            EventType::AnalysisCompleted,
            EventPayload::Completed {
                best: result.best,
                hypothesis_accepted: result.hypothesis_accepted,
                p_value: result.best_test().p_value,
                batches: result.statistics.n,
            },
        );
    }

    pub fn publish_failed(&self, message: &str) {
        self.publish_event(
            EventType::AnalysisFailed,
            EventPayload::Failed {
                message: message.to_string(),
            },
        );
    }

    pub fn publish_significance(&self, alpha: f64, best: Option<DistributionKind>) {
        self.publish_event(
            EventType::SignificanceChanged,
            EventPayload::SignificanceChanged { alpha, best },
        );
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_numbered_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe_events();

        bus.publish_failed("sample empty after outlier filtering");
        bus.publish_significance(0.1, None);

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(first.event_type, EventType::AnalysisFailed);
        assert_eq!(second.id, 1);
        assert_eq!(
            second.payload,
            EventPayload::SignificanceChanged { alpha: 0.1, best: None }
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish_failed("nobody listening");
    }
}
