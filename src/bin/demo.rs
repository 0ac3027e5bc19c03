//! demo - scripted end-to-end run on synthetic frames
//!
//! Streams synthetic frames through the stub classifier, taps the screen a
//! few times while it runs, resets the scene, and prints a JSON summary.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use scene_labeler::assets::{
    AssetStore, DirAssetStore, MemoryAssetStore, DEFAULT_ASSET_EXTENSION,
};
use scene_labeler::classify::STUB_LABELS;
use scene_labeler::config::{AppConfig, PolicyKind};
use scene_labeler::select::first_synonym;
use scene_labeler::ui::Ui;
use scene_labeler::{
    pump_frames, BackendRegistry, FloorPlaneQuery, MemoryScene, Pipeline, PlacementMode,
    PlacementOutcome, PlacementSettings, PlacementTrigger, SceneGraph, ScreenPoint,
    SyntheticConfig, SyntheticSource, UiEvent,
};

const VIEW_WIDTH: f32 = 390.0;
const VIEW_HEIGHT: f32 = 844.0;
const MAX_TAPS: i64 = 1000;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Duration in seconds for synthetic frames.
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    /// Frames per second for the synthetic source.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Selection policy: thresholded_top1 or top2_parsed.
    #[arg(long)]
    policy: Option<PolicyKind>,
    /// Placement mode: text or model.
    #[arg(long)]
    mode: Option<PlacementMode>,
    /// Directory of model assets (model mode). Defaults to the stub labels.
    #[arg(long)]
    assets: Option<PathBuf>,
    /// Number of taps spread over the run.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(..=MAX_TAPS))]
    taps: u32,
    /// Optional deterministic seed for the synthetic source.
    #[arg(long)]
    seed: Option<u64>,
    /// Write the JSON summary here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Terminal output: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
}

#[derive(Serialize)]
struct TapRecord {
    at_ms: u128,
    label: String,
    outcome: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    let ui = Ui::from_args(args.ui.as_deref());

    let mut cfg = AppConfig::load_from(None)?;
    if let Some(policy) = args.policy {
        cfg.selection.policy = policy;
    }
    if let Some(mode) = args.mode {
        cfg.placement.mode = mode;
        cfg.placement.alignment = PlacementSettings::for_mode(mode).alignment;
    }

    let pipeline = {
        let _stage = ui.stage("start stub classifier");
        let backend = BackendRegistry::with_builtin().build("stub", &cfg.classifier)?;
        Pipeline::start(backend, cfg.selection.selector(), cfg.classifier.hints())?
    };

    let total_frames = args.seconds.saturating_mul(args.fps as u64);
    let mut source = SyntheticSource::new(SyntheticConfig {
        url: "stub://demo".to_string(),
        width: 320,
        height: 240,
        warmup_frames: (args.fps / 2) as u64,
        limited_frames: (args.fps / 2) as u64,
        dropout_rate: 0.02,
        max_frames: Some(total_frames),
        seed: Some(args.seed.unwrap_or(0)),
        ..SyntheticConfig::default()
    });

    let assets: Box<dyn AssetStore> = match &args.assets {
        Some(dir) => Box::new(DirAssetStore::new(dir, DEFAULT_ASSET_EXTENSION)?),
        None => Box::new(MemoryAssetStore::new(
            STUB_LABELS.iter().map(|label| first_synonym(label)),
        )),
    };
    let trigger = PlacementTrigger::new(
        Box::new(FloorPlaneQuery::new(VIEW_WIDTH, VIEW_HEIGHT)),
        assets,
        pipeline.reader(),
        cfg.placement.settings(),
    );
    let mut scene = MemoryScene::new();
    let reader = pipeline.reader();

    let run = ui.stage("stream frames + scripted taps");
    let started = Instant::now();
    let tap_slots = args.taps.saturating_add(1);
    let tap_gap = Duration::from_secs(args.seconds) / tap_slots;
    let (pumped, taps) = std::thread::scope(|scope| -> Result<_> {
        let feeder = pipeline.feeder();
        let never = AtomicBool::new(false);
        let fps = args.fps;
        let pump = scope.spawn(move || pump_frames(&mut source, &feeder, fps, &never, None));

        let mut taps = Vec::new();
        for i in 0..args.taps {
            std::thread::sleep(tap_gap);
            let x = VIEW_WIDTH * (i + 1) as f32 / tap_slots as f32;
            let label = reader.latest().placement;
            let outcome = trigger.handle(UiEvent::Tap(ScreenPoint::new(x, 700.0)), &mut scene);
            taps.push(TapRecord {
                at_ms: started.elapsed().as_millis(),
                label,
                outcome: format!("{:?}", outcome),
            });
        }

        let pumped = pump
            .join()
            .map_err(|_| anyhow!("frame thread panicked"))??;
        Ok((pumped, taps))
    })?;
    drop(run);

    pipeline.wait_idle(Duration::from_secs(2));
    let final_label = reader.latest();
    let placed = scene.entities().to_vec();
    let cleared = match trigger.handle(UiEvent::Reset, &mut scene) {
        PlacementOutcome::Cleared(n) => n,
        _ => 0,
    };
    let report = pipeline.stop()?;

    let summary = serde_json::json!({
        "policy": format!("{:?}", cfg.selection.policy),
        "mode": cfg.placement.mode,
        "frames": pumped,
        "slot": report.slot,
        "invoker": report.invoker,
        "final_label": {
            "display": final_label.display,
            "placement": final_label.placement,
            "confidence": final_label.confidence,
            "frame_sequence": final_label.frame_sequence,
        },
        "taps": taps,
        "placed": placed,
        "cleared": cleared,
        "remaining": scene.len(),
    });
    let rendered = serde_json::to_string_pretty(&summary)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("demo: summary written to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
