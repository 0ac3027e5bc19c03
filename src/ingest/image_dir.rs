//! Still images from a local directory, replayed as a frame stream.
//!
//! Files are read in lexical order. Images carry no tracking information, so
//! every frame is reported as tracked.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceStats};
use crate::frame::{Frame, TrackingQuality};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct ImageDirSource {
    root: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
    frame_count: u64,
    healthy: bool,
}

impl ImageDirSource {
    pub fn new<P: AsRef<Path>>(root: P, looping: bool) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(anyhow!("image directory {} does not exist", root.display()));
        }
        Ok(Self {
            root,
            files: Vec::new(),
            cursor: 0,
            looping,
            frame_count: 0,
            healthy: false,
        })
    }

    fn scan(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to read image directory {}", self.root.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl FrameSource for ImageDirSource {
    fn connect(&mut self) -> Result<()> {
        self.files = self.scan()?;
        if self.files.is_empty() {
            return Err(anyhow!("no images found in {}", self.root.display()));
        }
        self.cursor = 0;
        self.healthy = true;
        log::info!(
            "ImageDirSource: {} images from {}",
            self.files.len(),
            self.root.display()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.healthy {
            return Err(anyhow!("image directory source not connected"));
        }
        if self.cursor >= self.files.len() {
            if !self.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let path = &self.files[self.cursor];
        self.cursor += 1;
        let image = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        self.frame_count += 1;
        Frame::new(
            image.into_raw(),
            width,
            height,
            self.frame_count,
            TrackingQuality::Normal,
        )
        .map(Some)
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_tracked: self.frame_count,
            url: self.root.display().to_string(),
        }
    }
}
