//! Frame pipeline.
//!
//! `FrameController` owns the synchronous per-frame state: admission, the
//! in-flight guard, aggregation, triage and statistics. `Pipeline` drives it
//! from a single tokio task and exposes the session through `PipelineHandle`.
//!
//! Frames arriving while a classification is pending, during cooldown, or
//! while paused are dropped. They are never queued.

mod controller;
mod task;

pub use controller::{
    Admission, Completion, DropCounters, DropReason, FrameController, PipelineSnapshot,
    StepReport, Ticket,
};
pub use task::{Pipeline, PipelineEvent, PipelineHandle};
