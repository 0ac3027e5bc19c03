#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::classify::backend::{ClassifierBackend, ComputeUnits, InferenceHints};
use crate::classify::preprocess::{prepare, to_planar_f32};
use crate::classify::result::{Classification, ClassificationResult};
use crate::frame::Frame;

/// Tract-based backend for ONNX image classifiers.
///
/// Expects a model taking `1x3xHxW` f32 input in 0..1 and producing one score
/// per class. Class names come from a newline-separated labels file. Tract
/// runs on the CPU, which satisfies both compute-unit hints.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    labels: Vec<String>,
    input_width: u32,
    input_height: u32,
    top_k: usize,
}

impl TractBackend {
    /// Load an ONNX model and its labels from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>, L: AsRef<Path>>(
        model_path: P,
        labels_path: L,
        input_width: u32,
        input_height: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let labels_path = labels_path.as_ref();
        let labels = load_labels(labels_path)?;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({} labels, input {}x{})",
            model_path.display(),
            labels.len(),
            input_width,
            input_height
        );

        Ok(Self {
            model,
            labels,
            input_width,
            input_height,
            top_k: 5,
        })
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn build_input(&self, frame: &Frame, hints: &InferenceHints) -> Result<Tensor> {
        let prepared = prepare(
            frame.pixels(),
            frame.width,
            frame.height,
            hints.orientation,
            hints.crop,
            self.input_width,
            self.input_height,
        )?;
        let planar = to_planar_f32(&prepared);
        let input = tract_ndarray::Array4::from_shape_vec(
            (1, 3, self.input_height as usize, self.input_width as usize),
            planar,
        )
        .context("input tensor shape mismatch")?;
        Ok(input.into_tensor())
    }

    fn extract_ranking(&self, outputs: TVec<TValue>) -> Result<ClassificationResult> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let scores: Vec<f32> = scores.iter().copied().collect();
        if scores.len() != self.labels.len() {
            return Err(anyhow!(
                "model produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            ));
        }
        let probabilities = if scores.iter().all(|s| (0.0..=1.0).contains(s)) {
            scores
        } else {
            softmax(&scores)
        };
        let entries = self
            .labels
            .iter()
            .zip(probabilities)
            .map(|(label, p)| Classification::new(label.clone(), p))
            .collect();
        Ok(ClassificationResult::from_ranked(entries).truncated(self.top_k))
    }
}

impl ClassifierBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn classify(&mut self, frame: &Frame, hints: &InferenceHints) -> Result<ClassificationResult> {
        let input = self.build_input(frame, hints)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_ranking(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let hints = InferenceHints {
            compute_units: ComputeUnits::CpuOnly,
            ..InferenceHints::default()
        };
        let blank = Frame::new(
            vec![0; self.input_width as usize * self.input_height as usize * 3],
            self.input_width,
            self.input_height,
            0,
            crate::frame::TrackingQuality::Normal,
        )?;
        self.classify(&blank, &hints).map(|_| ())
    }
}

fn load_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labels file {}", path.display()))?;
    let labels: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(anyhow!("labels file {} is empty", path.display()));
    }
    Ok(labels)
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
