//! Reducing a ranked classification list to one label.
//!
//! Two policies are supported and chosen by configuration:
//!
//! - `ThresholdedTop1`: best entry strictly above a confidence threshold.
//! - `Top2Parsed`: two best entries rendered as text, with the placement label
//!   parsed back out of that text.

use serde::{Deserialize, Serialize};

use crate::classify::ClassificationResult;

/// Confidence threshold used when none is configured.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Separates the label from the confidence in `Top2Parsed` display lines.
const CONFIDENCE_DELIMITER: char = '-';
/// Separates synonyms inside a class name ("tabby, tabby cat").
const SYNONYM_DELIMITER: char = ',';

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionPolicy {
    ThresholdedTop1 { threshold: f32 },
    Top2Parsed,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::ThresholdedTop1 {
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// The label currently shown to the user and used for placement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectedLabel {
    /// Text for the on-screen status line.
    pub display: String,
    /// Identifier used for text bubbles and asset lookup. Already trimmed.
    pub placement: String,
    pub confidence: f32,
    /// Frame this label was derived from; `None` for the startup placeholder.
    pub frame_sequence: Option<u64>,
}

impl SelectedLabel {
    pub fn placeholder(text: &str) -> Self {
        Self {
            display: text.to_string(),
            placement: text.trim().to_string(),
            confidence: 0.0,
            frame_sequence: None,
        }
    }
}

/// Applies a `SelectionPolicy`.
#[derive(Clone, Debug)]
pub struct ResultSelector {
    policy: SelectionPolicy,
    placeholder: String,
}

impl ResultSelector {
    pub fn new(policy: SelectionPolicy, placeholder: impl Into<String>) -> Self {
        Self {
            policy,
            placeholder: placeholder.into(),
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn placeholder(&self) -> SelectedLabel {
        SelectedLabel::placeholder(&self.placeholder)
    }

    /// Reduce `result` to a single label. Never fails; an empty list yields the
    /// placeholder.
    pub fn select(&self, result: &ClassificationResult) -> SelectedLabel {
        match self.policy {
            SelectionPolicy::ThresholdedTop1 { threshold } => self.thresholded(result, threshold),
            SelectionPolicy::Top2Parsed => self.top2_parsed(result),
        }
    }

    fn thresholded(&self, result: &ClassificationResult, threshold: f32) -> SelectedLabel {
        let best = result
            .entries()
            .iter()
            .find(|entry| entry.confidence > threshold);
        let Some(best) = best else {
            return self.placeholder();
        };
        let label = first_synonym(&best.label).to_string();
        if label.is_empty() {
            return self.placeholder();
        }
        SelectedLabel {
            display: format!(
                "I'm {:.1}% sure this is a/an {}",
                best.confidence * 100.0,
                label
            ),
            placement: label,
            confidence: best.confidence,
            frame_sequence: None,
        }
    }

    fn top2_parsed(&self, result: &ClassificationResult) -> SelectedLabel {
        let display = format_top2(result);
        if display.is_empty() {
            return self.placeholder();
        }
        let placement = derive_placement_label(&display);
        if placement.is_empty() {
            return SelectedLabel {
                display,
                ..self.placeholder()
            };
        }
        SelectedLabel {
            display,
            placement,
            confidence: result.top().map(|c| c.confidence).unwrap_or(0.0),
            frame_sequence: None,
        }
    }
}

impl Default for ResultSelector {
    fn default() -> Self {
        Self::new(SelectionPolicy::default(), "")
    }
}

/// `"<label> - <confidence>"` for the two best entries, one per line.
pub fn format_top2(result: &ClassificationResult) -> String {
    result
        .entries()
        .iter()
        .take(2)
        .map(|c| format!("{} {} {:.2}", c.label, CONFIDENCE_DELIMITER, c.confidence))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text before the first `-`, then before the first `,`, trimmed.
///
/// Class names containing a hyphen are cut at the hyphen.
pub fn derive_placement_label(display: &str) -> String {
    let before_confidence = display.split(CONFIDENCE_DELIMITER).next().unwrap_or("");
    first_synonym(before_confidence).to_string()
}

/// Text before the first ',' in a synonym list, trimmed.
pub fn first_synonym(label: &str) -> &str {
    label.split(SYNONYM_DELIMITER).next().unwrap_or("").trim()
}
