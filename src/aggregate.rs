//! Latest classifier batch plus the frame size it refers to.

use crate::detect::{largest_index, Detection};
use crate::frame::FrameSize;

/// Holds the most recent detection batch and derives the active detection.
///
/// Batches are replaced wholesale; nothing is tracked across frames.
#[derive(Debug, Default)]
pub struct DetectionAggregator {
    detections: Vec<Detection>,
    largest: Option<usize>,
    frame_size: FrameSize,
}

impl DetectionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored batch and recompute the largest detection.
    pub fn replace(&mut self, detections: Vec<Detection>) {
        self.largest = largest_index(&detections);
        self.detections = detections;
    }

    /// Store new frame dimensions. Returns `true` only when they changed.
    pub fn update_frame_size(&mut self, size: FrameSize) -> bool {
        if size == self.frame_size {
            return false;
        }
        self.frame_size = size;
        true
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    /// Largest-area detection of the current batch.
    pub fn largest(&self) -> Option<&Detection> {
        self.largest.and_then(|idx| self.detections.get(idx))
    }

    /// Category of the largest-area detection.
    pub fn active_detection(&self) -> Option<&str> {
        self.largest().map(|d| d.category.as_str())
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }
}
