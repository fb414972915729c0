use serde::{Deserialize, Serialize};

/// Axis-aligned box in source-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box area in square pixels, computed in `f64`.
    pub fn area(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }

    fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

/// One classified object instance. Immutable once a backend produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub category: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(category: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            category: category.into(),
            confidence,
            bbox,
        }
    }

    /// True when the detection can safely reach the aggregator.
    pub fn is_valid(&self) -> bool {
        !self.category.trim().is_empty()
            && self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
            && self.bbox.is_well_formed()
    }
}

/// Drop malformed detections from a backend batch.
///
/// A batch that is empty after filtering is treated exactly like an empty batch.
pub fn sanitize(batch: Vec<Detection>) -> Vec<Detection> {
    let before = batch.len();
    let valid: Vec<Detection> = batch.into_iter().filter(Detection::is_valid).collect();
    if valid.len() != before {
        log::debug!(
            "dropped {} malformed detection(s) from classifier output",
            before - valid.len()
        );
    }
    valid
}

/// Index of the largest-area detection. Ties keep the first occurrence.
pub fn largest_index(batch: &[Detection]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, detection) in batch.iter().enumerate() {
        let area = detection.bbox.area();
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((idx, area)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(category: &str, w: f32, h: f32) -> Detection {
        Detection::new(category, 0.8, BoundingBox::new(0.0, 0.0, w, h))
    }

    #[test]
    fn sanitize_drops_malformed_entries() {
        let batch = vec![
            det("metal", 10.0, 10.0),
            det("glass", f32::NAN, 10.0),
            det("paper", -1.0, 10.0),
            Detection::new("plastic", 1.5, BoundingBox::new(0.0, 0.0, 5.0, 5.0)),
            Detection::new("", 0.9, BoundingBox::new(0.0, 0.0, 5.0, 5.0)),
            Detection::new("trash", 0.9, BoundingBox::new(f32::INFINITY, 0.0, 5.0, 5.0)),
        ];
        let valid = sanitize(batch);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].category, "metal");
    }

    #[test]
    fn zero_area_boxes_are_valid() {
        assert!(det("metal", 0.0, 0.0).is_valid());
    }

    #[test]
    fn largest_index_prefers_first_on_tie() {
        let batch = vec![
            det("a", 10.0, 10.0),
            det("b", 20.0, 5.0),
            det("c", 4.0, 25.0),
            det("d", 5.0, 5.0),
        ];
        assert_eq!(largest_index(&batch), Some(0));
        assert_eq!(largest_index(&[]), None);
    }

    #[test]
    fn largest_index_picks_biggest_area() {
        let batch = vec![det("glass", 250.0, 200.0), det("metal", 300.0, 300.0)];
        assert_eq!(largest_index(&batch), Some(1));
    }
}
