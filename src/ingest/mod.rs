//! Frame sources.
//!
//! - Synthetic source (`stub://` URLs) with a scripted tracking schedule
//! - Image directory source (feature: ingest-image)
//!
//! Sources deliver frames in capture order, each tagged with the tracking
//! quality at capture time. They never decide whether a frame is classified;
//! that is the frame slot's job.

#[cfg(feature = "ingest-image")]
pub mod image_dir;
pub mod synthetic;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::config::SourceSettings;
use crate::frame::Frame;

#[cfg(feature = "ingest-image")]
pub use image_dir::ImageDirSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Statistics for a frame source.
#[derive(Clone, Debug, Serialize)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub frames_tracked: u64,
    pub url: String,
}

/// A continuous, time-ordered supply of frames.
pub trait FrameSource: Send {
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Open the source named by `settings.url`.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    if settings.url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig::from(settings))));
    }
    if settings.url.contains("://") {
        return Err(anyhow!(
            "unsupported source url '{}' (expected stub:// or a local directory)",
            settings.url
        ));
    }
    #[cfg(feature = "ingest-image")]
    {
        Ok(Box::new(ImageDirSource::new(&settings.url, true)?))
    }
    #[cfg(not(feature = "ingest-image"))]
    {
        Err(anyhow!(
            "image directory sources require the ingest-image feature"
        ))
    }
}
