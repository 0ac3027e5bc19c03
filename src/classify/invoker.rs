use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::frame::{Frame, FrameSlot, InFlightFrame};
use crate::prediction::PredictionWriter;
use crate::select::{ResultSelector, SelectedLabel};

use super::backend::{ClassifierBackend, InferenceHints};
use super::result::ClassificationResult;

/// How long the worker blocks on an empty slot before rechecking shutdown.
const SLOT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Counters kept by the classification worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InvokerStats {
    /// Classifications that produced at least one entry.
    pub classified: u64,
    /// Backend returned an error.
    pub failed: u64,
    /// Backend succeeded with an empty list.
    pub empty: u64,
    /// Backend panicked.
    pub panicked: u64,
}

impl InvokerStats {
    pub fn attempts(&self) -> u64 {
        self.classified + self.failed + self.empty + self.panicked
    }
}

/// Runs one classification at a time and publishes the selected label.
///
/// Owns the backend outright; the model is constructed once at startup and
/// moved in.
pub struct ClassifierInvoker {
    backend: Box<dyn ClassifierBackend>,
    selector: ResultSelector,
    writer: PredictionWriter,
    hints: InferenceHints,
    stats: InvokerStats,
}

impl ClassifierInvoker {
    pub fn new(
        backend: Box<dyn ClassifierBackend>,
        selector: ResultSelector,
        writer: PredictionWriter,
        hints: InferenceHints,
    ) -> Self {
        Self {
            backend,
            selector,
            writer,
            hints,
            stats: InvokerStats::default(),
        }
    }

    pub fn stats(&self) -> InvokerStats {
        self.stats
    }

    /// Classify one frame. Failures are logged and become an empty result.
    pub fn classify(&mut self, frame: &Frame) -> ClassificationResult {
        let backend = &mut self.backend;
        let hints = &self.hints;
        match catch_unwind(AssertUnwindSafe(|| backend.classify(frame, hints))) {
            Ok(Ok(result)) if result.is_empty() => {
                log::debug!("frame {}: no classifications", frame.sequence);
                self.stats.empty += 1;
                result
            }
            Ok(Ok(result)) => {
                self.stats.classified += 1;
                result
            }
            Ok(Err(e)) => {
                log::warn!(
                    "frame {}: {} classification failed: {:#}",
                    frame.sequence,
                    self.backend.name(),
                    e
                );
                self.stats.failed += 1;
                ClassificationResult::empty()
            }
            Err(_) => {
                log::error!(
                    "frame {}: {} backend panicked",
                    frame.sequence,
                    self.backend.name()
                );
                self.stats.panicked += 1;
                ClassificationResult::empty()
            }
        }
    }

    /// Classify a taken frame, publish the selection, then release the slot.
    pub fn process(&mut self, in_flight: InFlightFrame<'_>) -> SelectedLabel {
        let frame = in_flight.frame();
        let result = self.classify(frame);
        let mut label = self.selector.select(&result);
        label.frame_sequence = Some(frame.sequence);
        log::debug!(
            "frame {}: {:?} ({:.2}) {:?} after capture",
            frame.sequence,
            label.placement,
            label.confidence,
            frame.age()
        );
        self.writer.publish(label.clone());
        in_flight.release();
        label
    }

    /// Run the worker loop on a dedicated thread until `shutdown` is set.
    pub fn spawn(
        mut self,
        slot: Arc<FrameSlot>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<JoinHandle<InvokerStats>> {
        std::thread::Builder::new()
            .name("classifier".to_string())
            .spawn(move || {
                log::info!("classifier worker started ({})", self.backend.name());
                while !shutdown.load(Ordering::SeqCst) {
                    if let Some(in_flight) = slot.wait_take(SLOT_POLL_INTERVAL) {
                        self.process(in_flight);
                    }
                }
                log::info!("classifier worker stopped: {:?}", self.stats);
                self.stats
            })
            .context("failed to spawn classifier thread")
    }
}
