//! Frame buffers handed to classifier backends.
//!
//! - `Frame`: RGB pixel buffer plus dimensions. Pixels are shared behind an `Arc`
//!   so a backend that classifies off the pipeline task can keep the frame alive
//!   without copying it.
//! - `FrameSize`: the dimensions the proximity test divides by.
//!
//! Backends receive `&Frame` and must treat the pixels as read-only.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Interleaved RGB, one byte per channel.
pub const RGB_CHANNELS: usize = 3;

/// Frame size assumed before the first frame arrives.
pub const DEFAULT_FRAME_SIZE: FrameSize = FrameSize::new(640, 480);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel area in `u64` so 65535x65535 frames do not overflow.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        DEFAULT_FRAME_SIZE
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured frame.
///
/// Construction rejects zero dimensions and buffers whose length is not
/// `width * height * 3`, so every backend can rely on both.
#[derive(Clone)]
pub struct Frame {
    pixels: Arc<[u8]>,
    size: FrameSize,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let size = FrameSize::new(width, height);
        if size.is_empty() {
            return Err(anyhow!("frame dimensions must be non-zero, got {}", size));
        }
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(RGB_CHANNELS))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes for a {} frame, received {}",
                expected_len,
                size,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels: pixels.into(),
            size,
        })
    }

    /// Frame with every pixel set to `rgb`.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let count = (width as usize).saturating_mul(height as usize);
        let mut pixels = Vec::with_capacity(count.saturating_mul(RGB_CHANNELS));
        for _ in 0..count {
            pixels.extend_from_slice(&rgb);
        }
        Self::new(pixels, width, height)
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGB value at `(x, y)`. Coordinates are clamped to the frame.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let x = x.min(self.size.width - 1) as usize;
        let y = y.min(self.size.height - 1) as usize;
        let idx = (y * self.size.width as usize + x) * RGB_CHANNELS;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }
}

// Pixel content is never logged.
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("size", &self.size)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dimensions() {
        assert!(Frame::new(Vec::new(), 0, 480).is_err());
        assert!(Frame::new(Vec::new(), 640, 0).is_err());
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        let err = Frame::new(vec![0u8; 10], 2, 2).unwrap_err();
        assert!(err.to_string().contains("expected 12 RGB bytes"));
    }

    #[test]
    fn pixel_lookup_is_clamped() {
        let mut pixels = vec![0u8; 2 * 2 * 3];
        pixels[9..12].copy_from_slice(&[7, 8, 9]);
        let frame = Frame::new(pixels, 2, 2).unwrap();
        assert_eq!(frame.pixel(1, 1), [7, 8, 9]);
        assert_eq!(frame.pixel(10, 10), [7, 8, 9]);
        assert_eq!(frame.pixel(0, 0), [0, 0, 0]);
    }

    #[test]
    fn debug_does_not_dump_pixels() {
        let frame = Frame::filled(4, 3, [255, 0, 0]).unwrap();
        let rendered = format!("{:?}", frame);
        assert!(rendered.contains("bytes: 36"));
        assert!(!rendered.contains("255"));
    }
}
