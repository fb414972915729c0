//! Closeness test: how much of the frame a bounding box covers.

use crate::detect::BoundingBox;
use crate::frame::FrameSize;

/// A box is close when it covers strictly more than this fraction of the frame.
pub const CLOSENESS_THRESHOLD: f64 = 0.25;

/// Box area divided by frame area. `None` for a zero-area frame.
pub fn closeness_ratio(bbox: &BoundingBox, frame: FrameSize) -> Option<f64> {
    if frame.is_empty() {
        return None;
    }
    Some(bbox.area() / frame.area() as f64)
}

/// True when `bbox` covers more than a quarter of a `frame_width` x
/// `frame_height` frame. A zero-area frame is never close.
pub fn is_close(bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> bool {
    closeness_ratio(bbox, FrameSize::new(frame_width, frame_height))
        .is_some_and(|ratio| ratio > CLOSENESS_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(width: f32, height: f32) -> BoundingBox {
        BoundingBox::new(100.0, 100.0, width, height)
    }

    #[test]
    fn small_box_is_not_close() {
        // 30000 / 307200 ~ 0.098
        assert!(!is_close(&sized(200.0, 150.0), 640, 480));
    }

    #[test]
    fn large_box_is_close() {
        // 120000 / 307200 ~ 0.39
        assert!(is_close(&sized(400.0, 300.0), 640, 480));
    }

    #[test]
    fn exact_threshold_is_not_close() {
        // 320x240 is exactly a quarter of 640x480.
        assert_eq!(
            closeness_ratio(&sized(320.0, 240.0), FrameSize::new(640, 480)),
            Some(0.25)
        );
        assert!(!is_close(&sized(320.0, 240.0), 640, 480));
        assert!(is_close(&sized(321.0, 240.0), 640, 480));
    }

    #[test]
    fn zero_area_frame_is_never_close() {
        assert!(!is_close(&sized(10.0, 10.0), 0, 480));
        assert!(!is_close(&sized(10.0, 10.0), 640, 0));
        assert_eq!(closeness_ratio(&sized(10.0, 10.0), FrameSize::new(0, 0)), None);
    }

    #[test]
    fn box_position_does_not_matter() {
        let a = BoundingBox::new(0.0, 0.0, 400.0, 300.0);
        let b = BoundingBox::new(600.0, 400.0, 400.0, 300.0);
        assert_eq!(is_close(&a, 640, 480), is_close(&b, 640, 480));
    }
}
