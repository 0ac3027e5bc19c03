//! The continuous classification loop.
//!
//! - `Pipeline`: owns the frame slot, the prediction cell and the classifier
//!   worker thread.
//! - `FrameFeeder`: cloneable handle for whatever delivers frames.
//! - `pump_frames`: drives a `FrameSource` into a feeder at a target rate.
//!
//! Frame delivery never blocks on classification. A frame offered while the
//! slot is occupied is dropped on the spot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::classify::{ClassifierBackend, ClassifierInvoker, InferenceHints, InvokerStats};
use crate::frame::{Frame, FrameSlot, OfferOutcome, SlotStats};
use crate::ingest::FrameSource;
use crate::prediction::{prediction_cell, PredictionReader};
use crate::select::ResultSelector;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Final counters from a stopped pipeline.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct PipelineReport {
    pub slot: SlotStats,
    pub invoker: InvokerStats,
}

/// Handle for submitting frames to a running pipeline.
#[derive(Clone)]
pub struct FrameFeeder {
    slot: Arc<FrameSlot>,
}

impl FrameFeeder {
    pub fn offer(&self, frame: Frame) -> OfferOutcome {
        self.slot.offer(frame)
    }
}

pub struct Pipeline {
    slot: Arc<FrameSlot>,
    reader: PredictionReader,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<InvokerStats>>,
}

impl Pipeline {
    /// Start the classifier worker. The prediction cell starts out holding
    /// the selector's placeholder.
    pub fn start(
        backend: Box<dyn ClassifierBackend>,
        selector: ResultSelector,
        hints: InferenceHints,
    ) -> Result<Self> {
        let slot = Arc::new(FrameSlot::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let (writer, reader) = prediction_cell(selector.placeholder());
        log::info!(
            "starting pipeline: backend={} policy={:?}",
            backend.name(),
            selector.policy()
        );
        let invoker = ClassifierInvoker::new(backend, selector, writer, hints);
        let worker = invoker.spawn(Arc::clone(&slot), Arc::clone(&shutdown))?;
        Ok(Self {
            slot,
            reader,
            shutdown,
            worker: Some(worker),
        })
    }

    pub fn offer(&self, frame: Frame) -> OfferOutcome {
        self.slot.offer(frame)
    }

    pub fn feeder(&self) -> FrameFeeder {
        FrameFeeder {
            slot: Arc::clone(&self.slot),
        }
    }

    pub fn reader(&self) -> PredictionReader {
        self.reader.clone()
    }

    pub fn slot_stats(&self) -> SlotStats {
        self.slot.stats()
    }

    /// Flag shared with the worker; setting it stops the loop.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Block until the slot is empty or `timeout` elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.slot.is_empty() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(IDLE_POLL_INTERVAL);
        }
        true
    }

    /// Stop the worker and collect final counters.
    pub fn stop(mut self) -> Result<PipelineReport> {
        self.shutdown.store(true, Ordering::SeqCst);
        let invoker = match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("classifier worker panicked"))?,
            None => InvokerStats::default(),
        };
        let report = PipelineReport {
            slot: self.slot.stats(),
            invoker,
        };
        log::info!(
            "pipeline stopped: offered={} accepted={} dropped_busy={} dropped_untracked={} classified={} failed={}",
            report.slot.offered,
            report.slot.accepted,
            report.slot.dropped_busy,
            report.slot.dropped_untracked,
            report.invoker.classified,
            report.invoker.failed
        );
        Ok(report)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Counters from one `pump_frames` run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PumpStats {
    pub delivered: u64,
    pub accepted: u64,
    pub dropped_busy: u64,
    pub dropped_untracked: u64,
}

/// Read frames from `source` and offer them until the source ends,
/// `max_frames` have been delivered, or `shutdown` is set.
///
/// `fps == 0` delivers frames as fast as the source produces them.
pub fn pump_frames(
    source: &mut dyn FrameSource,
    feeder: &FrameFeeder,
    fps: u32,
    shutdown: &AtomicBool,
    max_frames: Option<u64>,
) -> Result<PumpStats> {
    let interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
    let mut stats = PumpStats::default();
    let mut last_health_log = Instant::now();
    let mut next_tick = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        if max_frames.is_some_and(|max| stats.delivered >= max) {
            break;
        }
        let Some(frame) = source.next_frame()? else {
            log::info!("frame source exhausted after {} frames", stats.delivered);
            break;
        };
        stats.delivered += 1;
        match feeder.offer(frame) {
            OfferOutcome::Accepted => stats.accepted += 1,
            OfferOutcome::DroppedBusy => stats.dropped_busy += 1,
            OfferOutcome::DroppedUntracked => stats.dropped_untracked += 1,
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let source_stats = source.stats();
            log::info!(
                "source health={} frames={} tracked={} delivered={} accepted={} busy={} untracked={} url={}",
                source.is_healthy(),
                source_stats.frames_captured,
                source_stats.frames_tracked,
                stats.delivered,
                stats.accepted,
                stats.dropped_busy,
                stats.dropped_untracked,
                source_stats.url
            );
            last_health_log = Instant::now();
        }

        if let Some(interval) = interval {
            next_tick += interval;
            let now = Instant::now();
            if next_tick > now {
                std::thread::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }
    }
    Ok(stats)
}
