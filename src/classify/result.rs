use serde::Serialize;

/// One (label, confidence) pair produced by a classifier backend.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Classification {
    pub label: String,
    /// Confidence in 0.0..=1.0.
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: sanitize_confidence(confidence),
        }
    }
}

/// Ranked classifications, descending confidence.
///
/// Entries with equal confidence keep the order the backend produced them in.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClassificationResult {
    entries: Vec<Classification>,
}

impl ClassificationResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rank `entries` by confidence. The sort is stable.
    pub fn from_ranked(entries: Vec<Classification>) -> Self {
        let mut entries: Vec<Classification> = entries
            .into_iter()
            .map(|mut entry| {
                entry.confidence = sanitize_confidence(entry.confidence);
                entry
            })
            .collect();
        entries.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Self { entries }
    }

    /// Keep only the `k` best entries.
    pub fn truncated(mut self, k: usize) -> Self {
        self.entries.truncate(k);
        self
    }

    pub fn entries(&self) -> &[Classification] {
        &self.entries
    }

    pub fn top(&self) -> Option<&Classification> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn sanitize_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_is_descending_and_stable() {
        let result = ClassificationResult::from_ranked(vec![
            Classification::new("dog", 0.3),
            Classification::new("cat", 0.9),
            Classification::new("cow", 0.3),
        ]);
        let labels: Vec<&str> = result.entries().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["cat", "dog", "cow"]);
    }

    #[test]
    fn confidences_are_clamped() {
        let result = ClassificationResult::from_ranked(vec![
            Classification {
                label: "over".into(),
                confidence: 1.7,
            },
            Classification {
                label: "nan".into(),
                confidence: f32::NAN,
            },
        ]);
        assert_eq!(result.entries()[0].confidence, 1.0);
        assert_eq!(result.entries()[1].confidence, 0.0);
    }

    #[test]
    fn truncation_keeps_best() {
        let result = ClassificationResult::from_ranked(vec![
            Classification::new("a", 0.1),
            Classification::new("b", 0.5),
            Classification::new("c", 0.4),
        ])
        .truncated(2);
        assert_eq!(result.len(), 2);
        assert_eq!(result.top().unwrap().label, "b");
    }
}
