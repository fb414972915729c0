use anyhow::Result;
use async_trait::async_trait;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Classifier backend trait.
///
/// A backend maps one frame to zero or more detections, in no particular order.
/// The pipeline holds exactly one active backend and never calls `detect` again
/// before the previous call resolved.
///
/// # Failure contract
///
/// Classification failure is expected and recoverable:
/// - A backend whose model is not loaded (or failed to load) returns `Ok(vec![])`.
/// - A per-call failure may return `Err`; the pipeline logs it and treats the
///   frame as an empty batch. Errors never reach triage or statistics.
#[async_trait]
pub trait ClassifierBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run classification on a frame. Must not retain the frame beyond the call
    /// unless it clones the shared pixel handle.
    async fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Whether model state is loaded and ready to classify.
    fn is_ready(&self) -> bool {
        true
    }

    /// Drop cached model state and load it again.
    fn reload(&mut self) -> Result<()> {
        Ok(())
    }
}
