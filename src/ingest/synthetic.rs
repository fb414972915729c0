use anyhow::{anyhow, Result};
use std::time::Duration;

use crate::frame::{Frame, FrameSize, RGB_CHANNELS};

/// Frames between two scene changes.
const SCENE_PERIOD: u64 = 50;

#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub width: u32,
    pub height: u32,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 10,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
}

/// Synthetic camera.
///
/// Produces a flat background with a bright block that moves a little every
/// frame and jumps to a new position every `SCENE_PERIOD` frames.
pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic source dimensions must be non-zero"));
        }
        if config.target_fps == 0 {
            return Err(anyhow!("synthetic source fps must be at least 1"));
        }
        Ok(Self {
            config,
            frame_count: 0,
            scene_state: 0,
        })
    }

    pub fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: {}x{} @ {} fps",
            self.config.width,
            self.config.height,
            self.config.target_fps
        );
        Ok(())
    }

    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.config.width, self.config.height)
    }

    /// Time between frames at the target rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.config.target_fps
    }

    /// Change the produced frame size, e.g. to emulate a camera rotation.
    pub fn resize(&mut self, size: FrameSize) -> Result<()> {
        if size.is_empty() {
            return Err(anyhow!("synthetic source dimensions must be non-zero"));
        }
        self.config.width = size.width;
        self.config.height = size.height;
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        if self.frame_count.is_multiple_of(SCENE_PERIOD) {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let pixels = self.generate_pixels();
        Frame::new(pixels, self.config.width, self.config.height)
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let (w, h) = (self.config.width as usize, self.config.height as usize);
        let background = 40u8.wrapping_add(self.scene_state.wrapping_mul(16));
        let mut pixels = vec![background; w * h * RGB_CHANNELS];

        let block_w = (w / 4).max(1);
        let block_h = (h / 4).max(1);
        let drift = (self.frame_count % SCENE_PERIOD) as usize;
        let x0 = (usize::from(self.scene_state) * 37 + drift) % (w - block_w + 1);
        let y0 = (usize::from(self.scene_state) * 23 + drift / 2) % (h - block_h + 1);
        for y in y0..y0 + block_h {
            let row = y * w * RGB_CHANNELS;
            for x in x0..x0 + block_w {
                let i = row + x * RGB_CHANNELS;
                pixels[i..i + RGB_CHANNELS].copy_from_slice(&[220, 200, 60]);
            }
        }
        pixels
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
        }
    }
}
