//! Output decoding for the model-backed classifiers.
//!
//! Kept free of any inference runtime so the conversion rules can be tested
//! without model files.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::detect::labels::map_remote_label;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::{Frame, FrameSize};

/// Local model detections must score strictly above this.
pub const LOCAL_CONFIDENCE_FLOOR: f32 = 0.5;

/// Remote classifications must score strictly above this.
pub const REMOTE_CONFIDENCE_FLOOR: f32 = 0.4;

/// Fraction of each frame dimension covered by the placeholder box of a
/// whole-frame classification.
pub const PLACEHOLDER_BOX_FRACTION: f32 = 0.5;

/// Resample an RGB frame to a `[3, height, width]` planar buffer scaled to 0..1.
///
/// Uses nearest-neighbour sampling; model inputs are small enough that the
/// difference to bilinear filtering does not matter for classification.
pub fn resize_to_chw(frame: &Frame, width: u32, height: u32) -> Vec<f32> {
    let (w, h) = (width as usize, height as usize);
    let mut out = vec![0.0f32; 3 * w * h];
    let sx = frame.width() as f32 / width as f32;
    let sy = frame.height() as f32 / height as f32;
    for y in 0..h {
        let src_y = ((y as f32 + 0.5) * sy) as u32;
        for x in 0..w {
            let src_x = ((x as f32 + 0.5) * sx) as u32;
            let rgb = frame.pixel(src_x, src_y);
            for (channel, value) in rgb.iter().enumerate() {
                out[channel * w * h + y * w + x] = f32::from(*value) / 255.0;
            }
        }
    }
    out
}

/// Decode raw detector outputs.
///
/// `boxes` holds `n` rows of normalized `(x1, y1, x2, y2)`; `scores` holds `n`
/// rows of one score per class in `labels`. Each row keeps its arg-max class
/// when that score clears `floor`.
pub fn decode_boxes(
    boxes: &[f32],
    scores: &[f32],
    labels: &[String],
    frame: FrameSize,
    floor: f32,
) -> Result<Vec<Detection>> {
    if labels.is_empty() {
        return Err(anyhow!("model has no class labels configured"));
    }
    if boxes.len() % 4 != 0 {
        return Err(anyhow!("box tensor length {} is not a multiple of 4", boxes.len()));
    }
    let rows = boxes.len() / 4;
    if scores.len() != rows * labels.len() {
        return Err(anyhow!(
            "score tensor has {} values, expected {} rows x {} classes",
            scores.len(),
            rows,
            labels.len()
        ));
    }

    let fw = frame.width as f32;
    let fh = frame.height as f32;
    let mut detections = Vec::new();
    for (row, coords) in boxes.chunks_exact(4).enumerate() {
        let row_scores = &scores[row * labels.len()..(row + 1) * labels.len()];
        let Some((class_idx, confidence)) = arg_max(row_scores) else {
            continue;
        };
        if confidence <= floor {
            continue;
        }
        let (x1, y1, x2, y2) = (coords[0], coords[1], coords[2], coords[3]);
        detections.push(Detection::new(
            labels[class_idx].clone(),
            confidence,
            BoundingBox::new(x1 * fw, y1 * fh, (x2 - x1) * fw, (y2 - y1) * fh),
        ));
    }
    Ok(detections)
}

fn arg_max(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best
}

/// One label/score pair from a whole-frame image classifier.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Classification {
    pub label: String,
    pub score: f32,
}

/// Convert whole-frame classifications into detections.
///
/// Classifiers give no location, so every kept result gets the same centred
/// placeholder box covering half of the frame in each dimension.
pub fn classifications_to_detections(
    results: &[Classification],
    frame: FrameSize,
) -> Vec<Detection> {
    let width = frame.width as f32 * PLACEHOLDER_BOX_FRACTION;
    let height = frame.height as f32 * PLACEHOLDER_BOX_FRACTION;
    let bbox = BoundingBox::new(
        (frame.width as f32 - width) / 2.0,
        (frame.height as f32 - height) / 2.0,
        width,
        height,
    );

    results
        .iter()
        .filter(|result| result.score > REMOTE_CONFIDENCE_FLOOR)
        .map(|result| Detection::new(map_remote_label(&result.label), result.score, bbox))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["glass".to_string(), "metal".to_string()]
    }

    #[test]
    fn resize_produces_planar_normalized_values() {
        // 2x1 frame: red then blue.
        let frame = Frame::new(vec![255, 0, 0, 0, 0, 255], 2, 1).unwrap();
        let out = resize_to_chw(&frame, 4, 2);
        assert_eq!(out.len(), 3 * 4 * 2);
        // Red plane: left half 1.0, right half 0.0 on both rows.
        assert_eq!(&out[0..8], &[1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        // Blue plane mirrors it.
        assert_eq!(&out[16..24], &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn decodes_normalized_boxes_into_pixels() {
        let boxes = [0.25, 0.5, 0.75, 1.0];
        let scores = [0.1, 0.9];
        let out = decode_boxes(&boxes, &scores, &labels(), FrameSize::new(640, 480), 0.5).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, "metal");
        assert_eq!(out[0].bbox, BoundingBox::new(160.0, 240.0, 320.0, 240.0));
    }

    #[test]
    fn floor_is_strict() {
        let boxes = [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.5, 0.5];
        let scores = [0.5, 0.2, 0.3, 0.51];
        let out = decode_boxes(&boxes, &scores, &labels(), FrameSize::new(100, 100), 0.5).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, "metal");
        assert_eq!(out[0].confidence, 0.51);
    }

    #[test]
    fn mismatched_tensors_are_errors() {
        assert!(decode_boxes(&[0.0; 5], &[], &labels(), FrameSize::new(1, 1), 0.5).is_err());
        assert!(decode_boxes(&[0.0; 4], &[0.9], &labels(), FrameSize::new(1, 1), 0.5).is_err());
        assert!(decode_boxes(&[0.0; 4], &[0.9], &[], FrameSize::new(1, 1), 0.5).is_err());
    }

    #[test]
    fn classifications_get_centred_half_frame_box() {
        let results = vec![
            Classification {
                label: "Metal".to_string(),
                score: 0.8,
            },
            Classification {
                label: "Cups".to_string(),
                score: 0.4,
            },
            Classification {
                label: "Rubble".to_string(),
                score: 0.41,
            },
        ];
        let out = classifications_to_detections(&results, FrameSize::new(640, 480));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].category, "recyclables");
        assert_eq!(out[0].bbox, BoundingBox::new(160.0, 120.0, 320.0, 240.0));
        assert_eq!(out[1].category, "general-waste");
    }
}
