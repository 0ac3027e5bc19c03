use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::classify::backend::{ClassifierBackend, InferenceHints};
use crate::classify::result::{Classification, ClassificationResult};
use crate::frame::Frame;

/// Labels reported by the stub backend. Synonym lists use commas, the way
/// ImageNet-style class names do.
pub const STUB_LABELS: &[&str] = &[
    "ball, toy",
    "coffee mug, cup",
    "tabby, tabby cat",
    "golden retriever, dog",
    "potted plant",
    "laptop, notebook computer",
    "water bottle",
    "sneaker, running shoe",
];

/// Stub backend for testing and demos.
///
/// Scores are derived from a SHA-256 of the pixels, so identical frames always
/// classify identically and changing scenes change the ranking.
pub struct StubBackend {
    labels: Vec<String>,
    top_k: usize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::with_labels(STUB_LABELS.iter().map(|l| l.to_string()).collect())
    }

    pub fn with_labels(labels: Vec<String>) -> Self {
        Self { labels, top_k: 5 }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&mut self, frame: &Frame, _hints: &InferenceHints) -> Result<ClassificationResult> {
        let digest: [u8; 32] = Sha256::digest(frame.pixels()).into();

        // Sharpen so one label usually dominates.
        let raw: Vec<f32> = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let byte = digest[i % digest.len()] as f32 / 255.0;
                byte.powi(8) + 1e-3
            })
            .collect();
        let total: f32 = raw.iter().sum();

        let entries = self
            .labels
            .iter()
            .zip(raw)
            .map(|(label, score)| Classification::new(label.clone(), score / total))
            .collect();

        Ok(ClassificationResult::from_ranked(entries).truncated(self.top_k))
    }
}
