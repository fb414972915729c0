//! Rejection notification sinks.
//!
//! The pipeline calls the notifier once per rejection, synchronously, on the
//! pipeline task. Notifiers must not block and must not queue alerts.

use std::io::Write;
use std::time::Duration;

use crate::triage::Rejection;

/// Short alert tone played on rejection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlertTone {
    pub frequency_hz: f32,
    pub duration: Duration,
    pub attack: Duration,
    pub peak_gain: f32,
}

/// 440 Hz sine, half a second, fast attack with linear fade out.
pub const REJECTION_TONE: AlertTone = AlertTone {
    frequency_hz: 440.0,
    duration: Duration::from_millis(500),
    attack: Duration::from_millis(10),
    peak_gain: 0.5,
};

pub trait Notifier: Send {
    fn rejected(&mut self, rejection: &Rejection);
}

/// Logs each rejection.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn rejected(&mut self, rejection: &Rejection) {
        log::warn!(
            "REJECT {} (conf={:.2}, covers {:.0}% of frame)",
            rejection.category,
            rejection.confidence,
            rejection.closeness * 100.0
        );
    }
}

/// Rings the terminal bell once per rejection, then logs it.
pub struct BellNotifier<W: Write + Send> {
    out: W,
    tone: AlertTone,
    rung: u64,
}

impl BellNotifier<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> BellNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            tone: REJECTION_TONE,
            rung: 0,
        }
    }

    pub fn rung(&self) -> u64 {
        self.rung
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Notifier for BellNotifier<W> {
    fn rejected(&mut self, rejection: &Rejection) {
        if let Err(e) = self.out.write_all(b"\x07").and_then(|_| self.out.flush()) {
            log::debug!("alert bell failed: {}", e);
        }
        self.rung += 1;
        log::warn!(
            "REJECT {} (conf={:.2}) alert {}Hz/{}ms",
            rejection.category,
            rejection.confidence,
            self.tone.frequency_hz,
            self.tone.duration.as_millis()
        );
    }
}
