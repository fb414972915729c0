//! Accept/reject decision and the rejection cooldown state machine.
//!
//! ```text
//!   Monitoring --(largest detection unaccepted AND close)--> RejectedCooldown
//!   RejectedCooldown --(COOLDOWN elapsed since entry)--> Monitoring
//! ```
//!
//! Only the largest detection of a batch is evaluated. The cooldown deadline is
//! fixed when the state is entered; nothing in-session moves it.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::bins::AcceptedCategories;
use crate::detect::{BoundingBox, Detection};
use crate::frame::FrameSize;
use crate::proximity::{closeness_ratio, is_close};

/// Time spent in `RejectedCooldown` before monitoring resumes.
pub const COOLDOWN: Duration = Duration::from_millis(3000);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriageState {
    #[default]
    Monitoring,
    RejectedCooldown,
}

/// Details of a rejected detection, handed to notification consumers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub category: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Box area over frame area at decision time.
    pub closeness: f64,
}

/// Outcome of evaluating one batch.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    /// Empty batch.
    NoDetection,
    /// Largest detection is in the accepted set.
    Permitted,
    /// Largest detection is not accepted but too far away to matter.
    Distant,
    /// Largest detection was rejected; cooldown started.
    Rejected(Rejection),
    /// Evaluated during cooldown; ignored.
    Suspended,
}

#[derive(Clone, Copy, Debug)]
struct Cooldown {
    deadline: Instant,
}

/// Triage engine. One per pipeline session.
#[derive(Debug)]
pub struct TriageEngine {
    accepted: AcceptedCategories,
    cooldown: Option<Cooldown>,
}

impl TriageEngine {
    pub fn new(accepted: AcceptedCategories) -> Self {
        Self {
            accepted,
            cooldown: None,
        }
    }

    pub fn state(&self) -> TriageState {
        match self.cooldown {
            Some(_) => TriageState::RejectedCooldown,
            None => TriageState::Monitoring,
        }
    }

    pub fn accepted(&self) -> &AcceptedCategories {
        &self.accepted
    }

    /// Replace the accepted set. Takes effect from the next evaluation.
    pub fn set_accepted(&mut self, accepted: AcceptedCategories) {
        self.accepted = accepted;
    }

    /// Evaluate the largest detection of a batch.
    pub fn evaluate(
        &mut self,
        largest: Option<&Detection>,
        frame: FrameSize,
        now: Instant,
    ) -> Verdict {
        if self.cooldown.is_some() {
            return Verdict::Suspended;
        }
        let Some(detection) = largest else {
            return Verdict::NoDetection;
        };
        if self.accepted.contains(&detection.category) {
            return Verdict::Permitted;
        }
        if !is_close(&detection.bbox, frame.width, frame.height) {
            return Verdict::Distant;
        }

        self.cooldown = Some(Cooldown {
            deadline: now + COOLDOWN,
        });
        Verdict::Rejected(Rejection {
            category: detection.category.clone(),
            confidence: detection.confidence,
            bbox: detection.bbox,
            closeness: closeness_ratio(&detection.bbox, frame).unwrap_or_default(),
        })
    }

    /// When the running cooldown ends, if any.
    pub fn cooldown_deadline(&self) -> Option<Instant> {
        self.cooldown.map(|c| c.deadline)
    }

    /// Time left in the running cooldown.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown
            .map(|c| c.deadline.saturating_duration_since(now))
    }

    /// Return to `Monitoring` once the cooldown deadline has passed.
    ///
    /// Returns `true` exactly once per cooldown, on the call that ends it.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.cooldown {
            Some(c) if now >= c.deadline => {
                self.cooldown = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: FrameSize = FrameSize::new(640, 480);

    fn det(category: &str, w: f32, h: f32) -> Detection {
        Detection::new(category, 0.9, BoundingBox::new(100.0, 100.0, w, h))
    }

    fn accepting(categories: &[&str]) -> TriageEngine {
        TriageEngine::new(categories.iter().copied().collect())
    }

    #[test]
    fn far_unaccepted_object_is_distant() {
        let mut engine = accepting(&[]);
        let verdict = engine.evaluate(Some(&det("metal", 200.0, 150.0)), FRAME, Instant::now());
        assert_eq!(verdict, Verdict::Distant);
        assert_eq!(engine.state(), TriageState::Monitoring);
    }

    #[test]
    fn close_unaccepted_object_is_rejected() {
        let mut engine = accepting(&["glass"]);
        let now = Instant::now();
        let verdict = engine.evaluate(Some(&det("metal", 400.0, 300.0)), FRAME, now);
        let Verdict::Rejected(rejection) = verdict else {
            panic!("expected rejection, got {:?}", verdict);
        };
        assert_eq!(rejection.category, "metal");
        assert!((rejection.closeness - 0.390625).abs() < 1e-9);
        assert_eq!(engine.state(), TriageState::RejectedCooldown);
        assert_eq!(engine.cooldown_deadline(), Some(now + COOLDOWN));
    }

    #[test]
    fn close_accepted_object_is_permitted() {
        let mut engine = accepting(&["metal"]);
        let verdict = engine.evaluate(Some(&det("metal", 400.0, 300.0)), FRAME, Instant::now());
        assert_eq!(verdict, Verdict::Permitted);
        assert_eq!(engine.state(), TriageState::Monitoring);
    }

    #[test]
    fn empty_batch_is_no_detection() {
        let mut engine = accepting(&[]);
        assert_eq!(engine.evaluate(None, FRAME, Instant::now()), Verdict::NoDetection);
    }

    #[test]
    fn cooldown_suspends_and_expires_once() {
        let mut engine = accepting(&[]);
        let start = Instant::now();
        let close = det("glass", 500.0, 400.0);
        assert!(matches!(
            engine.evaluate(Some(&close), FRAME, start),
            Verdict::Rejected(_)
        ));

        let mid = start + Duration::from_millis(2999);
        assert_eq!(engine.evaluate(Some(&close), FRAME, mid), Verdict::Suspended);
        assert!(!engine.expire(mid));
        assert_eq!(engine.cooldown_remaining(mid), Some(Duration::from_millis(1)));

        let end = start + COOLDOWN;
        assert!(engine.expire(end));
        assert!(!engine.expire(end));
        assert_eq!(engine.state(), TriageState::Monitoring);
        assert_eq!(engine.cooldown_remaining(end), None);
    }

    #[test]
    fn accepted_set_change_applies_to_next_batch() {
        let mut engine = accepting(&["metal"]);
        let close = det("metal", 400.0, 300.0);
        assert_eq!(engine.evaluate(Some(&close), FRAME, Instant::now()), Verdict::Permitted);
        engine.set_accepted(AcceptedCategories::empty());
        assert!(matches!(
            engine.evaluate(Some(&close), FRAME, Instant::now()),
            Verdict::Rejected(_)
        ));
    }
}
