use anyhow::Result;
use serde::Serialize;
use tokio::time::Instant;

use crate::aggregate::DetectionAggregator;
use crate::bins::AcceptedCategories;
use crate::detect::{sanitize, Detection};
use crate::frame::FrameSize;
use crate::stats::{Statistics, StatisticsSnapshot};
use crate::triage::{TriageEngine, TriageState, Verdict};

/// Why a frame was not classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// A previous classification has not resolved yet.
    InFlight,
    /// Triage is in its rejection cooldown.
    Cooldown,
    /// The frame source asked the pipeline to pause.
    Paused,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DropCounters {
    pub in_flight: u64,
    pub cooldown: u64,
    pub paused: u64,
}

/// Permission to run one classification. Must be handed back to `complete`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    seq: u64,
    /// Set when this frame changed the stored frame size.
    pub resized: Option<FrameSize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Classify(Ticket),
    Dropped(DropReason),
}

/// Result of applying one classification.
#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    pub verdict: Verdict,
    /// Valid detections applied to the aggregator.
    pub detections: usize,
    /// The backend call failed and was treated as an empty batch.
    pub failed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    Applied(StepReport),
    /// The ticket belongs to a replaced backend or an abandoned call.
    Discarded,
}

/// Read-only view of a pipeline session for display consumers.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineSnapshot {
    pub state: TriageState,
    pub active_detection: Option<String>,
    pub detections: Vec<Detection>,
    pub frame_size: FrameSize,
    pub statistics: StatisticsSnapshot,
    pub accepted: AcceptedCategories,
    pub paused: bool,
    pub in_flight: bool,
    pub backend: String,
    /// Whether the backend had its model or client loaded at the last step.
    pub backend_ready: bool,
    pub dropped: DropCounters,
}

/// Synchronous core of the frame pipeline.
///
/// Owns the aggregator, triage engine and statistics, and the explicit
/// in-flight guard. It never awaits: the async task asks `admit` whether a frame
/// may be classified, runs the backend, then hands the result to `complete`,
/// which applies aggregator, triage and statistics in that order.
#[derive(Debug)]
pub struct FrameController {
    aggregator: DetectionAggregator,
    triage: TriageEngine,
    stats: Statistics,
    in_flight: Option<(u64, u64)>,
    paused: bool,
    generation: u64,
    next_seq: u64,
    dropped: DropCounters,
}

impl FrameController {
    pub fn new(accepted: AcceptedCategories) -> Self {
        Self {
            aggregator: DetectionAggregator::new(),
            triage: TriageEngine::new(accepted),
            stats: Statistics::new(),
            in_flight: None,
            paused: false,
            generation: 0,
            next_seq: 0,
            dropped: DropCounters::default(),
        }
    }

    /// Decide whether a frame of `size` may be classified now.
    pub fn admit(&mut self, size: FrameSize) -> Admission {
        let reason = if self.paused {
            Some(DropReason::Paused)
        } else if self.triage.state() == TriageState::RejectedCooldown {
            Some(DropReason::Cooldown)
        } else if self.in_flight.is_some() {
            Some(DropReason::InFlight)
        } else {
            None
        };

        if let Some(reason) = reason {
            match reason {
                DropReason::InFlight => self.dropped.in_flight += 1,
                DropReason::Cooldown => self.dropped.cooldown += 1,
                DropReason::Paused => self.dropped.paused += 1,
            }
            log::trace!("frame dropped: {:?}", reason);
            return Admission::Dropped(reason);
        }

        let resized = self.aggregator.update_frame_size(size).then_some(size);
        self.next_seq += 1;
        self.in_flight = Some((self.generation, self.next_seq));
        Admission::Classify(Ticket {
            generation: self.generation,
            seq: self.next_seq,
            resized,
        })
    }

    /// Apply a classification result.
    ///
    /// A backend error is logged and treated as an empty batch: the active
    /// detection is cleared and neither triage nor statistics change.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<Detection>>,
        now: Instant,
    ) -> Completion {
        if self.in_flight != Some((ticket.generation, ticket.seq)) {
            log::debug!(
                "discarding stale classification (generation {}, current {})",
                ticket.generation,
                self.generation
            );
            return Completion::Discarded;
        }
        self.in_flight = None;

        let (batch, failed) = match result {
            Ok(batch) => (sanitize(batch), false),
            Err(e) => {
                log::warn!("classifier call failed, treating frame as empty: {:#}", e);
                (Vec::new(), true)
            }
        };
        let detections = batch.len();

        self.aggregator.replace(batch);
        if detections == 0 {
            return Completion::Applied(StepReport {
                verdict: Verdict::NoDetection,
                detections,
                failed,
            });
        }

        let verdict = self.triage.evaluate(
            self.aggregator.largest(),
            self.aggregator.frame_size(),
            now,
        );
        if verdict != Verdict::Suspended {
            self.stats.record_batch(matches!(verdict, Verdict::Rejected(_)));
        }

        Completion::Applied(StepReport {
            verdict,
            detections,
            failed,
        })
    }

    /// Invalidate the pending classification of the previous backend, if any.
    /// Returns `true` when a call was pending.
    pub fn switch_backend(&mut self) -> bool {
        self.generation += 1;
        self.in_flight.take().is_some()
    }

    /// End the cooldown if its deadline has passed.
    pub fn expire_cooldown(&mut self, now: Instant) -> bool {
        self.triage.expire(now)
    }

    pub fn cooldown_deadline(&self) -> Option<Instant> {
        self.triage.cooldown_deadline()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_accepted(&mut self, accepted: AcceptedCategories) {
        self.triage.set_accepted(accepted);
    }

    pub fn accepted(&self) -> &AcceptedCategories {
        self.triage.accepted()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn state(&self) -> TriageState {
        self.triage.state()
    }

    pub fn aggregator(&self) -> &DetectionAggregator {
        &self.aggregator
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn dropped(&self) -> DropCounters {
        self.dropped
    }

    pub fn snapshot(&self, backend: &str, backend_ready: bool) -> PipelineSnapshot {
        PipelineSnapshot {
            state: self.triage.state(),
            active_detection: self.aggregator.active_detection().map(str::to_string),
            detections: self.aggregator.detections().to_vec(),
            frame_size: self.aggregator.frame_size(),
            statistics: self.stats.snapshot(),
            accepted: self.triage.accepted().clone(),
            paused: self.paused,
            in_flight: self.in_flight.is_some(),
            backend: backend.to_string(),
            backend_ready,
            dropped: self.dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::triage::COOLDOWN;
    use anyhow::anyhow;
    use std::time::Duration;

    const FRAME: FrameSize = FrameSize::new(640, 480);

    fn det(category: &str, w: f32, h: f32) -> Detection {
        Detection::new(category, 0.8, BoundingBox::new(100.0, 100.0, w, h))
    }

    fn controller(accepted: &[&str]) -> FrameController {
        FrameController::new(accepted.iter().copied().collect())
    }

    fn ticket(ctl: &mut FrameController) -> Ticket {
        match ctl.admit(FRAME) {
            Admission::Classify(ticket) => ticket,
            other => panic!("frame not admitted: {:?}", other),
        }
    }

    fn applied(completion: Completion) -> StepReport {
        match completion {
            Completion::Applied(report) => report,
            Completion::Discarded => panic!("completion discarded"),
        }
    }

    #[test]
    fn guard_drops_frames_while_in_flight() {
        let mut ctl = controller(&["metal"]);
        let t = ticket(&mut ctl);
        assert_eq!(ctl.admit(FRAME), Admission::Dropped(DropReason::InFlight));
        assert_eq!(ctl.admit(FRAME), Admission::Dropped(DropReason::InFlight));
        assert_eq!(ctl.dropped().in_flight, 2);

        applied(ctl.complete(t, Ok(Vec::new()), Instant::now()));
        assert!(matches!(ctl.admit(FRAME), Admission::Classify(_)));
    }

    #[test]
    fn scenario_a_small_box_never_rejects() {
        let mut ctl = controller(&[]);
        let t = ticket(&mut ctl);
        let report = applied(ctl.complete(t, Ok(vec![det("metal", 200.0, 150.0)]), Instant::now()));
        assert_eq!(report.verdict, Verdict::Distant);
        assert_eq!(ctl.statistics().detection_count(), 1);
        assert_eq!(ctl.statistics().rejection_count(), 0);
    }

    #[test]
    fn scenario_b_close_unaccepted_box_starts_cooldown() {
        let mut ctl = controller(&["glass"]);
        let t = ticket(&mut ctl);
        let now = Instant::now();
        let report = applied(ctl.complete(t, Ok(vec![det("metal", 400.0, 300.0)]), now));
        assert!(matches!(report.verdict, Verdict::Rejected(_)));
        assert_eq!(ctl.state(), TriageState::RejectedCooldown);
        assert_eq!(ctl.statistics().rejection_count(), 1);
        assert_eq!(ctl.admit(FRAME), Admission::Dropped(DropReason::Cooldown));

        assert!(!ctl.expire_cooldown(now + Duration::from_millis(2999)));
        assert!(ctl.expire_cooldown(now + COOLDOWN));
        assert!(matches!(ctl.admit(FRAME), Admission::Classify(_)));
    }

    #[test]
    fn scenario_c_only_largest_detection_counts() {
        let mut ctl = controller(&["metal"]);
        let t = ticket(&mut ctl);
        // glass: 250x200 = 50000, metal: 300x300 = 90000
        let batch = vec![det("glass", 250.0, 200.0), det("metal", 300.0, 300.0)];
        let report = applied(ctl.complete(t, Ok(batch), Instant::now()));
        assert_eq!(report.verdict, Verdict::Permitted);
        assert_eq!(ctl.aggregator().active_detection(), Some("metal"));
        assert_eq!(ctl.aggregator().detections().len(), 2);
        assert_eq!(ctl.statistics().rejection_count(), 0);
    }

    #[test]
    fn scenario_e_failure_clears_active_without_counting() {
        let mut ctl = controller(&[]);
        let t = ticket(&mut ctl);
        applied(ctl.complete(t, Ok(vec![det("paper", 10.0, 10.0)]), Instant::now()));
        assert_eq!(ctl.aggregator().active_detection(), Some("paper"));

        let t = ticket(&mut ctl);
        let report = applied(ctl.complete(t, Err(anyhow!("inference crashed")), Instant::now()));
        assert!(report.failed);
        assert_eq!(report.verdict, Verdict::NoDetection);
        assert_eq!(ctl.aggregator().active_detection(), None);
        assert_eq!(ctl.statistics().detection_count(), 1);
        assert_eq!(ctl.statistics().rejection_count(), 0);
    }

    #[test]
    fn all_malformed_batch_is_empty() {
        let mut ctl = controller(&[]);
        let t = ticket(&mut ctl);
        let report = applied(ctl.complete(
            t,
            Ok(vec![det("metal", f32::NAN, 300.0), det("glass", -5.0, 300.0)]),
            Instant::now(),
        ));
        assert_eq!(report.verdict, Verdict::NoDetection);
        assert_eq!(report.detections, 0);
        assert_eq!(ctl.statistics().detection_count(), 0);
    }

    #[test]
    fn detection_count_is_per_batch() {
        let mut ctl = controller(&["metal"]);
        let t = ticket(&mut ctl);
        let batch = vec![det("metal", 10.0, 10.0), det("metal", 20.0, 20.0)];
        applied(ctl.complete(t, Ok(batch), Instant::now()));
        assert_eq!(ctl.statistics().detection_count(), 1);
    }

    #[test]
    fn switching_backend_discards_pending_result() {
        let mut ctl = controller(&[]);
        let stale = ticket(&mut ctl);
        assert!(ctl.switch_backend());
        assert!(!ctl.is_in_flight());

        let fresh = ticket(&mut ctl);
        assert_eq!(
            ctl.complete(stale, Ok(vec![det("metal", 600.0, 450.0)]), Instant::now()),
            Completion::Discarded
        );
        assert_eq!(ctl.state(), TriageState::Monitoring);
        assert!(ctl.is_in_flight());
        applied(ctl.complete(fresh, Ok(Vec::new()), Instant::now()));
    }

    #[test]
    fn paused_frames_are_dropped_before_anything_else() {
        let mut ctl = controller(&[]);
        ctl.set_paused(true);
        assert_eq!(
            ctl.admit(FrameSize::new(1280, 720)),
            Admission::Dropped(DropReason::Paused)
        );
        // Dropped frames do not touch the stored frame size.
        assert_eq!(ctl.aggregator().frame_size(), FRAME);
        ctl.set_paused(false);
        let t = match ctl.admit(FrameSize::new(1280, 720)) {
            Admission::Classify(t) => t,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(t.resized, Some(FrameSize::new(1280, 720)));
    }

    #[test]
    fn proximity_uses_the_frame_that_was_classified() {
        let mut ctl = controller(&[]);
        let t = match ctl.admit(FrameSize::new(1920, 1080)) {
            Admission::Classify(t) => t,
            other => panic!("unexpected {:?}", other),
        };
        // Close on 640x480, distant on 1920x1080.
        let report = applied(ctl.complete(t, Ok(vec![det("metal", 400.0, 300.0)]), Instant::now()));
        assert_eq!(report.verdict, Verdict::Distant);
    }
}
