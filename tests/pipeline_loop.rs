use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use scene_labeler::classify::{
    Classification, ClassificationResult, ClassifierBackend, InferenceHints, StubBackend,
};
use scene_labeler::frame::{Frame, LimitedReason, OfferOutcome, TrackingQuality};
use scene_labeler::ingest::{SyntheticConfig, SyntheticSource};
use scene_labeler::pipeline::{pump_frames, Pipeline};
use scene_labeler::select::{ResultSelector, SelectionPolicy};

const WAIT: Duration = Duration::from_secs(5);

fn frame(sequence: u64, tracking: TrackingQuality) -> Frame {
    Frame::new(vec![0; 8 * 8 * 3], 8, 8, sequence, tracking).unwrap()
}

/// Fails on odd-numbered frames, panics on multiples of five.
struct FlakyBackend {
    calls: Arc<AtomicUsize>,
}

impl ClassifierBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn classify(&mut self, frame: &Frame, _hints: &InferenceHints) -> Result<ClassificationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if frame.sequence % 5 == 0 {
            panic!("backend crashed on frame {}", frame.sequence);
        }
        if frame.sequence % 2 == 1 {
            return Err(anyhow!("inference failed"));
        }
        Ok(ClassificationResult::from_ranked(vec![
            Classification::new("ball, toy", 0.8),
            Classification::new("cup", 0.1),
        ]))
    }
}

/// Holds each frame until told to continue.
struct GatedBackend {
    gate: Arc<AtomicBool>,
}

impl ClassifierBackend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn classify(
        &mut self,
        _frame: &Frame,
        _hints: &InferenceHints,
    ) -> Result<ClassificationResult> {
        while !self.gate.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(ClassificationResult::from_ranked(vec![Classification::new(
            "tabby, tabby cat",
            0.9,
        )]))
    }
}

#[test]
fn every_outcome_releases_the_slot() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::start(
        Box::new(FlakyBackend {
            calls: Arc::clone(&calls),
        }),
        ResultSelector::new(SelectionPolicy::Top2Parsed, "THIS IS SPARTA"),
        InferenceHints::default(),
    )
    .unwrap();

    for sequence in 1..=10 {
        assert_eq!(
            pipeline.offer(frame(sequence, TrackingQuality::Normal)),
            OfferOutcome::Accepted
        );
        assert!(pipeline.wait_idle(WAIT), "slot stuck after frame {}", sequence);

        let label = pipeline.reader().latest();
        assert_eq!(label.frame_sequence, Some(sequence));
        if sequence % 5 == 0 || sequence % 2 == 1 {
            assert_eq!(label.display, "THIS IS SPARTA");
        } else {
            assert_eq!(label.display, "ball, toy - 0.80\ncup - 0.10");
            assert_eq!(label.placement, "ball");
        }
    }

    let report = pipeline.stop().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(report.slot.accepted, 10);
    assert_eq!(report.slot.released, 10);
    assert_eq!(report.invoker.classified, 4);
    assert_eq!(report.invoker.panicked, 2);
    assert_eq!(report.invoker.failed, 4);
}

#[test]
fn frames_offered_during_classification_are_dropped() {
    let gate = Arc::new(AtomicBool::new(false));
    let pipeline = Pipeline::start(
        Box::new(GatedBackend {
            gate: Arc::clone(&gate),
        }),
        ResultSelector::default(),
        InferenceHints::default(),
    )
    .unwrap();

    assert_eq!(
        pipeline.offer(frame(1, TrackingQuality::Normal)),
        OfferOutcome::Accepted
    );
    for sequence in 2..=6 {
        assert_eq!(
            pipeline.offer(frame(sequence, TrackingQuality::Normal)),
            OfferOutcome::DroppedBusy
        );
    }
    gate.store(true, Ordering::SeqCst);
    assert!(pipeline.wait_idle(WAIT));

    let label = pipeline.reader().latest();
    assert_eq!(label.frame_sequence, Some(1));
    assert_eq!(label.placement, "tabby");
    assert_eq!(label.display, "I'm 90.0% sure this is a/an tabby");

    let report = pipeline.stop().unwrap();
    assert_eq!(report.slot.offered, 6);
    assert_eq!(report.slot.dropped_busy, 5);
    assert_eq!(report.invoker.attempts(), 1);
}

#[test]
fn untracked_frames_never_reach_the_backend() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::start(
        Box::new(FlakyBackend {
            calls: Arc::clone(&calls),
        }),
        ResultSelector::default(),
        InferenceHints::default(),
    )
    .unwrap();

    let untracked = [
        TrackingQuality::NotAvailable,
        TrackingQuality::Limited(LimitedReason::Initializing),
        TrackingQuality::Limited(LimitedReason::ExcessiveMotion),
        TrackingQuality::Limited(LimitedReason::InsufficientFeatures),
        TrackingQuality::Limited(LimitedReason::Relocalizing),
    ];
    for (i, tracking) in untracked.into_iter().enumerate() {
        assert_eq!(
            pipeline.offer(frame(i as u64 + 1, tracking)),
            OfferOutcome::DroppedUntracked
        );
    }

    let report = pipeline.stop().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.slot.accepted, 0);
    assert_eq!(report.slot.dropped_untracked, 5);
}

#[test]
fn continuous_stream_keeps_the_books_balanced() {
    let pipeline = Pipeline::start(
        Box::new(StubBackend::new()),
        ResultSelector::default(),
        InferenceHints::default(),
    )
    .unwrap();
    let mut source = SyntheticSource::new(SyntheticConfig {
        warmup_frames: 10,
        limited_frames: 10,
        dropout_rate: 0.1,
        max_frames: Some(300),
        seed: Some(3),
        ..SyntheticConfig::default()
    });

    let stopped = AtomicBool::new(false);
    let pumped = pump_frames(&mut source, &pipeline.feeder(), 0, &stopped, None).unwrap();
    assert!(pipeline.wait_idle(WAIT));
    let report = pipeline.stop().unwrap();

    assert_eq!(pumped.delivered, 300);
    assert!(pumped.dropped_untracked >= 20);
    assert_eq!(report.slot.offered, 300);
    assert_eq!(report.slot.accepted, pumped.accepted);
    assert_eq!(report.slot.released, report.slot.accepted);
    assert_eq!(report.slot.outstanding(), 0);
    assert_eq!(report.invoker.attempts(), report.slot.accepted);
}
