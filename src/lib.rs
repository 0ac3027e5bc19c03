//! Scene Labeler
//!
//! Continuously classifies camera frames and lets the user drop the latest
//! label into the world as a text bubble or a matching 3D model.
//!
//! # Architecture
//!
//! The loop keeps three guarantees by construction:
//!
//! 1. **At most one frame in flight**: the frame slot admits a new frame only
//!    when empty and only when tracking is normal. Everything else is dropped.
//! 2. **Release exactly once**: a taken frame is held by a guard whose drop
//!    frees the slot, on success, failure or panic alike.
//! 3. **Consistent reads**: the interactive side always sees a complete
//!    label snapshot, never a mix of two classifications.
//!
//! # Module Structure
//!
//! - `frame`: Frames, tracking quality, the single-slot hand-off
//! - `ingest`: Frame sources (synthetic, image directory)
//! - `classify`: Backends, preprocessing, the classifier worker
//! - `select`: Turning ranked classifications into a display/placement label
//! - `prediction`: Latest-label cell shared with the interactive side
//! - `placement`, `spatial`, `scene`, `assets`: Tap-to-place
//! - `pipeline`: Wiring for the continuous loop
//! - `config`, `ui`: Runtime configuration and terminal output

pub mod assets;
pub mod classify;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod placement;
pub mod prediction;
pub mod scene;
pub mod select;
pub mod spatial;
pub mod ui;

pub use assets::{AssetStore, DirAssetStore, MemoryAssetStore, ModelAsset};
pub use classify::{
    BackendRegistry, Classification, ClassificationResult, ClassifierBackend, ClassifierInvoker,
    InferenceHints, StubBackend,
};
pub use config::{AppConfig, PolicyKind};
pub use frame::{Frame, FrameSlot, InFlightFrame, LimitedReason, OfferOutcome, TrackingQuality};
pub use ingest::{open_source, FrameSource, SyntheticConfig, SyntheticSource};
pub use pipeline::{pump_frames, FrameFeeder, Pipeline, PipelineReport};
pub use placement::{PlacementMode, PlacementOutcome, PlacementSettings, PlacementTrigger, UiEvent};
pub use prediction::{prediction_cell, PredictionReader, PredictionWriter};
pub use scene::{EntityKind, MemoryScene, SceneGraph};
pub use select::{ResultSelector, SelectedLabel, SelectionPolicy};
pub use spatial::{FloorPlaneQuery, ScreenPoint, SpatialQuery};
