use std::sync::Mutex;

use tempfile::NamedTempFile;

use scene_labeler::classify::{ComputeUnits, CropPolicy, DeviceOrientation, Orientation};
use scene_labeler::config::{AppConfig, PolicyKind};
use scene_labeler::placement::PlacementMode;
use scene_labeler::select::SelectionPolicy;
use scene_labeler::spatial::PlaneAlignment;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LABELER_CONFIG",
        "LABELER_SOURCE_URL",
        "LABELER_POLICY",
        "LABELER_THRESHOLD",
        "LABELER_PLACEMENT_MODE",
        "LABELER_ASSET_DIR",
        "LABELER_MODEL_PATH",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AppConfig::load().expect("load defaults");

    assert_eq!(cfg.source.url, "stub://camera");
    assert_eq!(cfg.source.target_fps, 30);
    assert_eq!(cfg.classifier.backend, "stub");
    assert_eq!(cfg.classifier.crop, CropPolicy::CenterCrop);
    assert_eq!(cfg.classifier.compute_units, ComputeUnits::CpuOnly);
    assert_eq!(cfg.classifier.hints().orientation, Orientation::Right);
    assert_eq!(
        cfg.selection.policy(),
        SelectionPolicy::ThresholdedTop1 { threshold: 0.5 }
    );
    assert_eq!(cfg.placement.mode, PlacementMode::Text);
    assert_eq!(cfg.placement.alignment, PlaneAlignment::Any);
    assert_eq!(cfg.placement.model_scale, 0.001);
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "source": {
                "url": "stub://kitchen",
                "target_fps": 15,
                "width": 320,
                "height": 240,
                "seed": 42
            },
            "classifier": {
                "top_k": 3,
                "crop": "scale_fit",
                "device_orientation": "landscape_left"
            },
            "selection": {
                "policy": "top2_parsed",
                "placeholder": "THIS IS SPARTA"
            },
            "placement": {
                "mode": "model",
                "asset_dir": "/srv/models"
            }
        }"#,
    );

    std::env::set_var("LABELER_CONFIG", file.path());
    std::env::set_var("LABELER_SOURCE_URL", "stub://garage");
    std::env::set_var("LABELER_ASSET_DIR", "/opt/models");

    let cfg = AppConfig::load().expect("load config");

    assert_eq!(cfg.source.url, "stub://garage");
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.source.width, 320);
    assert_eq!(cfg.source.seed, Some(42));
    assert_eq!(cfg.classifier.top_k, 3);
    assert_eq!(cfg.classifier.crop, CropPolicy::ScaleFit);
    assert_eq!(cfg.classifier.device_orientation, DeviceOrientation::LandscapeLeft);
    assert_eq!(cfg.classifier.hints().orientation, Orientation::Up);
    assert_eq!(cfg.selection.policy, PolicyKind::Top2Parsed);
    assert_eq!(cfg.selection.selector().placeholder().display, "THIS IS SPARTA");
    assert_eq!(cfg.placement.mode, PlacementMode::Model);
    assert_eq!(cfg.placement.alignment, PlaneAlignment::Horizontal);
    assert_eq!(cfg.placement.asset_dir.to_str(), Some("/opt/models"));

    clear_env();
}

#[test]
fn loads_toml_config_from_explicit_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
[selection]
policy = "thresholded_top1"
threshold = 0.7

[placement]
mode = "text"
alignment = "horizontal"
"#,
    );

    let cfg = AppConfig::load_from(Some(file.path())).expect("load toml");
    assert_eq!(
        cfg.selection.policy(),
        SelectionPolicy::ThresholdedTop1 { threshold: 0.7 }
    );
    assert_eq!(cfg.placement.alignment, PlaneAlignment::Horizontal);
}

#[test]
fn env_overrides_policy_and_mode() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LABELER_POLICY", "top2");
    std::env::set_var("LABELER_PLACEMENT_MODE", "model");
    std::env::set_var("LABELER_MODEL_PATH", "/models/mobilenet.onnx");

    let cfg = AppConfig::load().expect("load config");
    assert_eq!(cfg.selection.policy(), SelectionPolicy::Top2Parsed);
    assert_eq!(cfg.placement.mode, PlacementMode::Model);
    assert_eq!(cfg.placement.alignment, PlaneAlignment::Horizontal);
    assert_eq!(
        cfg.classifier.model_path.as_deref().and_then(|p| p.to_str()),
        Some("/models/mobilenet.onnx")
    );

    clear_env();
}

#[test]
fn mode_override_keeps_alignment_set_in_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{ "placement": { "mode": "text", "alignment": "vertical" } }"#,
    );
    std::env::set_var("LABELER_PLACEMENT_MODE", "model");

    let cfg = AppConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.placement.mode, PlacementMode::Model);
    assert_eq!(cfg.placement.alignment, PlaneAlignment::Vertical);
    assert_eq!(cfg.placement.settings().alignment, PlaneAlignment::Vertical);

    let file = write_config(".json", r#"{ "placement": { "mode": "text" } }"#);
    let cfg = AppConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.placement.alignment, PlaneAlignment::Horizontal);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LABELER_THRESHOLD", "1.5");
    assert!(AppConfig::load().is_err());
    std::env::set_var("LABELER_THRESHOLD", "abc");
    assert!(AppConfig::load().is_err());
    clear_env();

    std::env::set_var("LABELER_POLICY", "top3");
    assert!(AppConfig::load().is_err());
    clear_env();

    let file = write_config(".json", r#"{ "source": { "target_fps": 0 } }"#);
    assert!(AppConfig::load_from(Some(file.path())).is_err());

    let file = write_config(".json", r#"{ "classifier": { "backend": "tract" } }"#);
    let err = AppConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("model_path"));

    let file = write_config(".json", "{ not json");
    assert!(AppConfig::load_from(Some(file.path())).is_err());

    let missing = std::env::temp_dir().join("labeler-config-does-not-exist.json");
    assert!(AppConfig::load_from(Some(&missing)).is_err());
}
