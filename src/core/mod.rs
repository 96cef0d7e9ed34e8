// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Core module - engine state, events and background runs

mod engine;
mod event_bus;
mod worker;

pub use engine::Engine;
pub use event_bus::{Event, EventBus, EventPayload, EventType};
pub use worker::{AnalysisWorker, Submission, WorkerOutput};
