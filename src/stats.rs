//! Running detection/rejection counters.

use serde::{Deserialize, Serialize};

/// Monotonic counters. `rejection_count <= detection_count` always holds
/// because a rejection is only ever recorded together with its batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    detection_count: u64,
    rejection_count: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one processed non-empty batch, and whether it caused a rejection.
    pub fn record_batch(&mut self, rejected: bool) {
        self.detection_count += 1;
        if rejected {
            self.rejection_count += 1;
        }
    }

    pub fn detection_count(&self) -> u64 {
        self.detection_count
    }

    pub fn rejection_count(&self) -> u64 {
        self.rejection_count
    }

    /// Percentage of batches not rejected, rounded half up. Zero before the
    /// first batch.
    pub fn acceptance_rate(&self) -> u32 {
        acceptance_rate(self.detection_count, self.rejection_count)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            detection_count: self.detection_count,
            rejection_count: self.rejection_count,
            acceptance_rate: self.acceptance_rate(),
        }
    }
}

/// `round(100 * (detections - rejections) / detections)`, or 0 with no detections.
pub fn acceptance_rate(detections: u64, rejections: u64) -> u32 {
    if detections == 0 {
        return 0;
    }
    let accepted = u128::from(detections.saturating_sub(rejections));
    let total = u128::from(detections);
    ((200 * accepted + total) / (2 * total)) as u32
}

/// Counters as shown to the statistics display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub detection_count: u64,
    pub rejection_count: u64,
    pub acceptance_rate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_zero_without_detections() {
        assert_eq!(Statistics::new().acceptance_rate(), 0);
    }

    #[test]
    fn seven_of_ten_is_seventy_percent() {
        assert_eq!(acceptance_rate(10, 3), 70);
    }

    #[test]
    fn rate_rounds_half_up() {
        // 1/8 accepted = 12.5%
        assert_eq!(acceptance_rate(8, 7), 13);
        // 2/3 accepted = 66.67%
        assert_eq!(acceptance_rate(3, 1), 67);
        // 1/3 accepted = 33.33%
        assert_eq!(acceptance_rate(3, 2), 33);
        assert_eq!(acceptance_rate(5, 5), 0);
        assert_eq!(acceptance_rate(5, 0), 100);
    }

    #[test]
    fn record_batch_keeps_invariant() {
        let mut stats = Statistics::new();
        for i in 0..20 {
            stats.record_batch(i % 3 == 0);
            assert!(stats.rejection_count() <= stats.detection_count());
        }
        assert_eq!(stats.detection_count(), 20);
        assert_eq!(stats.rejection_count(), 7);
    }

    #[test]
    fn repeated_reads_are_stable() {
        let mut stats = Statistics::new();
        stats.record_batch(false);
        stats.record_batch(true);
        stats.record_batch(false);
        let first = stats.snapshot();
        assert_eq!(first, stats.snapshot());
        assert_eq!(first.acceptance_rate, 67);
    }
}
