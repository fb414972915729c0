use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;

use crate::detect::backend::ClassifierBackend;
use crate::detect::labels::SYNTHETIC_CATEGORIES;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Minimum spacing between two detection opportunities.
pub const DEFAULT_SYNTHETIC_INTERVAL: Duration = Duration::from_millis(2000);

/// Chance that an eligible call produces detections.
pub const DEFAULT_HIT_PROBABILITY: f64 = 0.7;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub interval: Duration,
    pub hit_probability: f64,
    pub categories: Vec<String>,
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNTHETIC_INTERVAL,
            hit_probability: DEFAULT_HIT_PROBABILITY,
            categories: SYNTHETIC_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            seed: None,
        }
    }
}

/// Synthetic backend for development and tests.
///
/// Emulates an intermittent detector: at most one detection opportunity per
/// `interval`, and each opportunity yields 1-2 roughly centred boxes with
/// probability `hit_probability`. All other calls return nothing. Boxes always
/// lie inside the frame.
pub struct SyntheticBackend {
    config: SyntheticConfig,
    rng: StdRng,
    last_opportunity: Option<Instant>,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            last_opportunity: None,
        }
    }

    fn opportunity_due(&self, now: Instant) -> bool {
        match self.last_opportunity {
            Some(last) => now.duration_since(last) > self.config.interval,
            None => true,
        }
    }

    fn generate(&mut self, frame: &Frame) -> Vec<Detection> {
        if self.config.categories.is_empty() {
            return Vec::new();
        }
        let width = frame.width() as f32;
        let height = frame.height() as f32;
        let count = self.rng.gen_range(1..=2);

        (0..count)
            .map(|_| {
                let box_w = (width * self.rng.gen_range(0.2..0.5)).floor();
                let box_h = (height * self.rng.gen_range(0.2..0.5)).floor();
                let x = ((width - box_w) * self.rng.gen_range(0.3..0.7)).floor();
                let y = ((height - box_h) * self.rng.gen_range(0.3..0.7)).floor();
                let idx = self.rng.gen_range(0..self.config.categories.len());
                let confidence = self.rng.gen_range(0.6..0.9);
                Detection::new(
                    self.config.categories[idx].clone(),
                    confidence,
                    BoundingBox::new(x, y, box_w, box_h),
                )
            })
            .collect()
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

#[async_trait]
impl ClassifierBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let now = Instant::now();
        if !self.opportunity_due(now) {
            return Ok(Vec::new());
        }
        self.last_opportunity = Some(now);

        if self.rng.gen_bool(self.config.hit_probability.clamp(0.0, 1.0)) {
            Ok(self.generate(frame))
        } else {
            Ok(Vec::new())
        }
    }
}
