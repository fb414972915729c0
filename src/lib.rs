//! Trash Sentinel
//!
//! Streaming waste-detection triage. Camera frames are classified by a
//! pluggable backend; the largest detection of each batch is checked against
//! the categories the current bin accepts, and an unaccepted object held close
//! to the camera raises a rejection followed by a fixed cooldown.
//!
//! # Module Structure
//!
//! - `frame`: RGB frame buffers and frame dimensions
//! - `detect`: detection types, the `ClassifierBackend` trait, built-in backends, registry
//! - `proximity`: "close to the camera" test
//! - `aggregate`: latest batch and the active (largest) detection
//! - `triage`: accept/reject decision and the cooldown state machine
//! - `stats`: detection/rejection counters and acceptance rate
//! - `bins`: bin presets and accepted-category sets
//! - `notify`: rejection notification sinks
//! - `pipeline`: the frame pipeline session
//! - `ingest`: frame sources
//! - `config`: layered daemon configuration

pub mod aggregate;
pub mod bins;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod proximity;
pub mod stats;
pub mod triage;

pub use aggregate::DetectionAggregator;
pub use bins::{AcceptedCategories, BinPreset};
pub use config::{BackendKind, SentinelConfig};
pub use detect::{BackendRegistry, BoundingBox, ClassifierBackend, Detection};
pub use frame::{Frame, FrameSize};
pub use ingest::{SourceConfig, SyntheticSource};
pub use notify::Notifier;
pub use pipeline::{Pipeline, PipelineEvent, PipelineHandle, PipelineSnapshot};
pub use proximity::{is_close, CLOSENESS_THRESHOLD};
pub use stats::{Statistics, StatisticsSnapshot};
pub use triage::{Rejection, TriageEngine, TriageState, Verdict, COOLDOWN};
