use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::classify::preprocess::{CropPolicy, Orientation};
use crate::classify::result::ClassificationResult;
use crate::frame::Frame;

/// Processor affinity requested from the inference backend.
///
/// `CpuOnly` leaves GPU headroom for rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeUnits {
    #[default]
    CpuOnly,
    All,
}

/// Per-request hints passed alongside each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InferenceHints {
    pub orientation: Orientation,
    pub crop: CropPolicy,
    pub compute_units: ComputeUnits,
}

/// Classifier backend trait.
///
/// Backends receive a borrowed frame and must not retain its pixels past the
/// call. They return a ranked list; an error means "no result this cycle" and
/// is never retried by the caller.
pub trait ClassifierBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Classify one frame.
    fn classify(&mut self, frame: &Frame, hints: &InferenceHints) -> Result<ClassificationResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
