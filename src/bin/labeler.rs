//! labeler - continuous scene classification with tap-to-place
//!
//! Frames flow from the configured source into the classifier in the
//! background. Commands on stdin drive the interactive side:
//!
//! - `tap X Y`: place the latest label at view coordinates (X, Y)
//! - `reset`: remove everything placed so far
//! - `quit`: stop

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use scene_labeler::assets::{AssetStore, DirAssetStore, MemoryAssetStore};
use scene_labeler::config::AppConfig;
use scene_labeler::ui::Ui;
use scene_labeler::{
    open_source, pump_frames, BackendRegistry, FloorPlaneQuery, MemoryScene, Pipeline,
    PlacementOutcome, PlacementTrigger, SceneGraph, ScreenPoint, UiEvent,
};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "LABELER_CONFIG")]
    config: Option<PathBuf>,
    /// Terminal output: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
    /// View size used to map taps into the world, as WIDTHxHEIGHT.
    #[arg(long, default_value = "390x844")]
    viewport: String,
}

enum Command {
    Event(UiEvent),
    Quit,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = AppConfig::load_from(args.config.as_deref())?;
    let (view_width, view_height) = parse_viewport(&args.viewport)?;
    let ui = Ui::from_args(args.ui.as_deref());

    let backend = {
        let _stage = ui.stage("load classifier");
        BackendRegistry::with_builtin().build_configured(&cfg.classifier)?
    };
    let pipeline = Pipeline::start(backend, cfg.selection.selector(), cfg.classifier.hints())?;
    let shutdown = pipeline.shutdown_flag();

    let mut source = open_source(&cfg.source)?;
    source.connect()?;
    let feeder = pipeline.feeder();
    let pump_shutdown = pipeline.shutdown_flag();
    let fps = cfg.source.target_fps;
    let pump = std::thread::Builder::new()
        .name("frames".to_string())
        .spawn(move || pump_frames(source.as_mut(), &feeder, fps, &pump_shutdown, None))
        .context("failed to spawn frame thread")?;

    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Command::Quit);
    })
    .context("error setting Ctrl-C handler")?;
    spawn_stdin_reader(tx)?;

    let assets: Box<dyn AssetStore> =
        match DirAssetStore::new(&cfg.placement.asset_dir, &cfg.placement.asset_extension) {
            Ok(store) => {
                log::info!("model assets from {}", store.root().display());
                Box::new(store)
            }
            Err(e) => {
                log::warn!("{:#}; model placement will find no assets", e);
                Box::new(MemoryAssetStore::default())
            }
        };
    let trigger = PlacementTrigger::new(
        Box::new(FloorPlaneQuery::new(view_width, view_height)),
        assets,
        pipeline.reader(),
        cfg.placement.settings(),
    );
    let mut scene = MemoryScene::new();
    let mut status = ui.status_line(pipeline.reader());

    log::info!(
        "labeler running: source={} mode={:?} (commands: tap X Y | reset | quit)",
        cfg.source.url,
        cfg.placement.mode
    );

    while !shutdown.load(Ordering::SeqCst) {
        status.refresh();
        match rx.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(Command::Event(event)) => {
                let outcome = trigger.handle(event, &mut scene);
                status.println(&describe(&outcome));
            }
            Ok(Command::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        if pump.is_finished() {
            log::info!("frame source stopped");
            break;
        }
    }

    shutdown.store(true, Ordering::SeqCst);
    let pumped = pump
        .join()
        .map_err(|_| anyhow!("frame thread panicked"))??;
    status.finish();
    let report = pipeline.stop()?;

    log::info!(
        "frames delivered={} accepted={} classified={} failed={} panicked={} placed={}",
        pumped.delivered,
        report.slot.accepted,
        report.invoker.classified,
        report.invoker.failed,
        report.invoker.panicked,
        scene.len()
    );
    Ok(())
}

fn spawn_stdin_reader(tx: mpsc::Sender<Command>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        if tx.send(command).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("{}", e),
                }
            }
            let _ = tx.send(Command::Quit);
        })
        .context("failed to spawn stdin thread")?;
    Ok(())
}

fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    match verb {
        "tap" => {
            let x = parse_coord(parts.next())?;
            let y = parse_coord(parts.next())?;
            Ok(Some(Command::Event(UiEvent::Tap(ScreenPoint::new(x, y)))))
        }
        "reset" => Ok(Some(Command::Event(UiEvent::Reset))),
        "quit" | "q" | "exit" => Ok(Some(Command::Quit)),
        other => Err(anyhow!("unknown command '{}' (tap X Y | reset | quit)", other)),
    }
}

fn parse_coord(value: Option<&str>) -> Result<f32> {
    value
        .ok_or_else(|| anyhow!("usage: tap X Y"))?
        .parse()
        .map_err(|_| anyhow!("tap coordinates must be numbers"))
}

fn parse_viewport(value: &str) -> Result<(f32, f32)> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| anyhow!("viewport must look like 390x844"))?;
    let w: f32 = w.trim().parse().context("invalid viewport width")?;
    let h: f32 = h.trim().parse().context("invalid viewport height")?;
    if w <= 0.0 || h <= 0.0 {
        return Err(anyhow!("viewport dimensions must be positive"));
    }
    Ok((w, h))
}

fn describe(outcome: &PlacementOutcome) -> String {
    match outcome {
        PlacementOutcome::Placed(id) => format!("placed entity #{}", id.0),
        PlacementOutcome::NoIntersection => "no surface under tap".to_string(),
        PlacementOutcome::EmptyLabel => "nothing recognised yet".to_string(),
        PlacementOutcome::AssetNotFound(label) => format!("no model for '{}'", label),
        PlacementOutcome::Cleared(n) => format!("cleared {} entities", n),
    }
}
