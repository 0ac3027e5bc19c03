//! Synthetic frame source (`stub://`).
//!
//! Produces a deterministic scene that changes every `scene_change_every`
//! frames, with a tracking schedule that mimics a world-tracking session:
//! no tracking while the session starts, limited tracking while it
//! initialises, then normal tracking with occasional short dropouts.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, SourceStats};
use crate::config::SourceSettings;
use crate::frame::{Frame, LimitedReason, TrackingQuality};

/// Configuration for the synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub warmup_frames: u64,
    pub limited_frames: u64,
    pub dropout_rate: f32,
    /// Length of each tracking dropout, in frames.
    pub dropout_len: u64,
    pub scene_change_every: u64,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            width: 64,
            height: 48,
            warmup_frames: 0,
            limited_frames: 0,
            dropout_rate: 0.0,
            dropout_len: 5,
            scene_change_every: 30,
            max_frames: None,
            seed: Some(0),
        }
    }
}

impl From<&SourceSettings> for SyntheticConfig {
    fn from(settings: &SourceSettings) -> Self {
        Self {
            url: settings.url.clone(),
            width: settings.width,
            height: settings.height,
            warmup_frames: settings.warmup_frames,
            limited_frames: settings.limited_frames,
            dropout_rate: settings.dropout_rate,
            seed: settings.seed,
            ..Self::default()
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    frame_count: u64,
    frames_tracked: u64,
    scene_state: u8,
    dropout_remaining: u64,
    dropout_reason: LimitedReason,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            frame_count: 0,
            frames_tracked: 0,
            scene_state: 0,
            dropout_remaining: 0,
            dropout_reason: LimitedReason::ExcessiveMotion,
        }
    }

    /// Tracking quality for the frame about to be produced.
    fn next_tracking(&mut self) -> TrackingQuality {
        let n = self.frame_count;
        if n <= self.config.warmup_frames {
            return TrackingQuality::NotAvailable;
        }
        if n <= self.config.warmup_frames + self.config.limited_frames {
            return TrackingQuality::Limited(LimitedReason::Initializing);
        }
        if self.dropout_remaining > 0 {
            self.dropout_remaining -= 1;
            return TrackingQuality::Limited(self.dropout_reason);
        }
        if self.config.dropout_rate > 0.0 && self.rng.gen::<f32>() < self.config.dropout_rate {
            self.dropout_remaining = self.config.dropout_len.saturating_sub(1);
            self.dropout_reason = if self.rng.gen_bool(0.5) {
                LimitedReason::ExcessiveMotion
            } else {
                LimitedReason::InsufficientFeatures
            };
            return TrackingQuality::Limited(self.dropout_reason);
        }
        TrackingQuality::Normal
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        if self.config.scene_change_every > 0
            && self.frame_count % self.config.scene_change_every == 0
        {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let state = self.scene_state as usize;
        let mut pixels = vec![0u8; width * height * 3];
        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) * 3;
                pixels[idx] = ((x * 255 / width.max(1)) ^ state) as u8;
                pixels[idx + 1] = ((y * 255 / height.max(1)) + state * 37) as u8;
                pixels[idx + 2] = (state * 91) as u8;
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!("SyntheticSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .config
            .max_frames
            .is_some_and(|max| self.frame_count >= max)
        {
            return Ok(None);
        }
        self.frame_count += 1;
        let tracking = self.next_tracking();
        if tracking.needs_coaching() {
            log::debug!("frame {}: point the camera at a textured surface", self.frame_count);
        }
        if tracking.is_normal() {
            self.frames_tracked += 1;
        }
        let pixels = self.generate_pixels();
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
            tracking,
        )
        .map(Some)
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_tracked: self.frames_tracked,
            url: self.config.url.clone(),
        }
    }
}
