use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::assets::DEFAULT_ASSET_EXTENSION;
use crate::classify::{ComputeUnits, CropPolicy, DeviceOrientation, InferenceHints};
use crate::placement::{PlacementMode, PlacementSettings, DEFAULT_MODEL_SCALE};
use crate::select::{ResultSelector, SelectionPolicy, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::spatial::PlaneAlignment;

const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_WARMUP_FRAMES: u64 = 15;
const DEFAULT_LIMITED_FRAMES: u64 = 15;
const DEFAULT_DROPOUT_RATE: f32 = 0.02;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INPUT_SIZE: u32 = 224;
const DEFAULT_TOP_K: usize = 5;
const DEFAULT_ASSET_DIR: &str = "assets";

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    source: Option<SourceConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    selection: Option<SelectionConfigFile>,
    placement: Option<PlacementConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    warmup_frames: Option<u64>,
    limited_frames: Option<u64>,
    dropout_rate: Option<f32>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    top_k: Option<usize>,
    crop: Option<CropPolicy>,
    compute_units: Option<ComputeUnits>,
    device_orientation: Option<DeviceOrientation>,
    fallback_to_stub: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct SelectionConfigFile {
    policy: Option<PolicyKind>,
    threshold: Option<f32>,
    placeholder: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PlacementConfigFile {
    mode: Option<PlacementMode>,
    alignment: Option<PlaneAlignment>,
    asset_dir: Option<PathBuf>,
    asset_extension: Option<String>,
    model_scale: Option<f32>,
}

/// Which result-selection policy to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    ThresholdedTop1,
    Top2Parsed,
}

impl FromStr for PolicyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thresholded_top1" | "top1" => Ok(PolicyKind::ThresholdedTop1),
            "top2_parsed" | "top2" => Ok(PolicyKind::Top2Parsed),
            other => Err(anyhow!(
                "unknown selection policy '{}' (expected thresholded_top1 or top2_parsed)",
                other
            )),
        }
    }
}

impl FromStr for PlacementMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(PlacementMode::Text),
            "model" => Ok(PlacementMode::Model),
            other => Err(anyhow!(
                "unknown placement mode '{}' (expected text or model)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: SourceSettings,
    pub classifier: ClassifierSettings,
    pub selection: SelectionSettings,
    pub placement: PlacementConfig,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    /// Synthetic source: frames with no tracking at startup.
    pub warmup_frames: u64,
    /// Synthetic source: frames with limited tracking after warm-up.
    pub limited_frames: u64,
    /// Synthetic source: chance per frame of a short tracking dropout.
    pub dropout_rate: f32,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub top_k: usize,
    pub crop: CropPolicy,
    pub compute_units: ComputeUnits,
    pub device_orientation: DeviceOrientation,
    pub fallback_to_stub: bool,
}

#[derive(Debug, Clone)]
pub struct SelectionSettings {
    pub policy: PolicyKind,
    pub threshold: f32,
    pub placeholder: String,
}

#[derive(Debug, Clone)]
pub struct PlacementConfig {
    pub mode: PlacementMode,
    pub alignment: PlaneAlignment,
    pub asset_dir: PathBuf,
    pub asset_extension: String,
    pub model_scale: f32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            target_fps: DEFAULT_TARGET_FPS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            warmup_frames: DEFAULT_WARMUP_FRAMES,
            limited_frames: DEFAULT_LIMITED_FRAMES,
            dropout_rate: DEFAULT_DROPOUT_RATE,
            seed: None,
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: None,
            labels_path: None,
            input_width: DEFAULT_INPUT_SIZE,
            input_height: DEFAULT_INPUT_SIZE,
            top_k: DEFAULT_TOP_K,
            crop: CropPolicy::default(),
            compute_units: ComputeUnits::default(),
            device_orientation: DeviceOrientation::default(),
            fallback_to_stub: false,
        }
    }
}

impl ClassifierSettings {
    pub fn hints(&self) -> InferenceHints {
        InferenceHints {
            orientation: self.device_orientation.into(),
            crop: self.crop,
            compute_units: self.compute_units,
        }
    }
}

impl SelectionSettings {
    pub fn policy(&self) -> SelectionPolicy {
        match self.policy {
            PolicyKind::ThresholdedTop1 => SelectionPolicy::ThresholdedTop1 {
                threshold: self.threshold,
            },
            PolicyKind::Top2Parsed => SelectionPolicy::Top2Parsed,
        }
    }

    pub fn selector(&self) -> ResultSelector {
        ResultSelector::new(self.policy(), self.placeholder.clone())
    }
}

impl PlacementConfig {
    pub fn settings(&self) -> PlacementSettings {
        PlacementSettings {
            mode: self.mode,
            alignment: self.alignment,
            model_scale: self.model_scale,
        }
    }
}

impl AppConfig {
    /// Load from the file named by `LABELER_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LABELER_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit file path taking the place of `LABELER_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => AppConfigFile::default(),
        };
        let alignment_pinned = file_cfg
            .placement
            .as_ref()
            .is_some_and(|placement| placement.alignment.is_some());
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env(alignment_pinned)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let source = file.source.unwrap_or_default();
        let classifier = file.classifier.unwrap_or_default();
        let selection = file.selection.unwrap_or_default();
        let placement = file.placement.unwrap_or_default();

        let mode = placement.mode.unwrap_or_default();
        Self {
            source: SourceSettings {
                url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                width: source.width.unwrap_or(DEFAULT_WIDTH),
                height: source.height.unwrap_or(DEFAULT_HEIGHT),
                warmup_frames: source.warmup_frames.unwrap_or(DEFAULT_WARMUP_FRAMES),
                limited_frames: source.limited_frames.unwrap_or(DEFAULT_LIMITED_FRAMES),
                dropout_rate: source.dropout_rate.unwrap_or(DEFAULT_DROPOUT_RATE),
                seed: source.seed,
            },
            classifier: ClassifierSettings {
                backend: classifier
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: classifier.model_path,
                labels_path: classifier.labels_path,
                input_width: classifier.input_width.unwrap_or(DEFAULT_INPUT_SIZE),
                input_height: classifier.input_height.unwrap_or(DEFAULT_INPUT_SIZE),
                top_k: classifier.top_k.unwrap_or(DEFAULT_TOP_K),
                crop: classifier.crop.unwrap_or_default(),
                compute_units: classifier.compute_units.unwrap_or_default(),
                device_orientation: classifier.device_orientation.unwrap_or_default(),
                fallback_to_stub: classifier.fallback_to_stub.unwrap_or(false),
            },
            selection: SelectionSettings {
                policy: selection.policy.unwrap_or_default(),
                threshold: selection.threshold.unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                placeholder: selection.placeholder.unwrap_or_default(),
            },
            placement: PlacementConfig {
                mode,
                alignment: placement
                    .alignment
                    .unwrap_or_else(|| PlacementSettings::for_mode(mode).alignment),
                asset_dir: placement
                    .asset_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_DIR)),
                asset_extension: placement
                    .asset_extension
                    .unwrap_or_else(|| DEFAULT_ASSET_EXTENSION.to_string()),
                model_scale: placement.model_scale.unwrap_or(DEFAULT_MODEL_SCALE),
            },
        }
    }

    /// `alignment_pinned`: the file set `placement.alignment`, so a mode
    /// override leaves it alone.
    fn apply_env(&mut self, alignment_pinned: bool) -> Result<()> {
        if let Ok(url) = std::env::var("LABELER_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(policy) = std::env::var("LABELER_POLICY") {
            if !policy.trim().is_empty() {
                self.selection.policy = policy.parse()?;
            }
        }
        if let Ok(threshold) = std::env::var("LABELER_THRESHOLD") {
            self.selection.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("LABELER_THRESHOLD must be a number between 0 and 1"))?;
        }
        if let Ok(mode) = std::env::var("LABELER_PLACEMENT_MODE") {
            if !mode.trim().is_empty() {
                self.placement.mode = mode.parse()?;
                if !alignment_pinned {
                    self.placement.alignment =
                        PlacementSettings::for_mode(self.placement.mode).alignment;
                }
            }
        }
        if let Ok(dir) = std::env::var("LABELER_ASSET_DIR") {
            if !dir.trim().is_empty() {
                self.placement.asset_dir = PathBuf::from(dir);
            }
        }
        if let Ok(path) = std::env::var("LABELER_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.classifier.model_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.selection.threshold) {
            return Err(anyhow!("selection threshold must be between 0 and 1"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.source.dropout_rate) {
            return Err(anyhow!("source dropout_rate must be between 0 and 1"));
        }
        if self.classifier.input_width == 0 || self.classifier.input_height == 0 {
            return Err(anyhow!("classifier input dimensions must be non-zero"));
        }
        if self.classifier.top_k == 0 {
            return Err(anyhow!("classifier top_k must be at least 1"));
        }
        if self.classifier.backend == "tract"
            && self.classifier.model_path.is_none()
            && !self.classifier.fallback_to_stub
        {
            return Err(anyhow!("classifier.model_path is required for the tract backend"));
        }
        if !(self.placement.model_scale > 0.0) {
            return Err(anyhow!("placement model_scale must be positive"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
