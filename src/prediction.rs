//! Latest-prediction cell.
//!
//! One writer (the classification worker) and any number of readers (the
//! interactive side). Reads return a full snapshot, so display text, placement
//! label and confidence always belong to the same classification.

use std::sync::{Arc, PoisonError, RwLock};

use crate::select::SelectedLabel;

struct Cell {
    label: SelectedLabel,
    /// Incremented on every publish.
    version: u64,
}

/// Create a cell initialised to `initial`.
pub fn prediction_cell(initial: SelectedLabel) -> (PredictionWriter, PredictionReader) {
    let cell = Arc::new(RwLock::new(Cell {
        label: initial,
        version: 0,
    }));
    (
        PredictionWriter {
            cell: Arc::clone(&cell),
        },
        PredictionReader { cell },
    )
}

/// The single writer. Deliberately not `Clone`.
pub struct PredictionWriter {
    cell: Arc<RwLock<Cell>>,
}

impl PredictionWriter {
    /// Replace the current label. Returns the new version.
    pub fn publish(&self, label: SelectedLabel) -> u64 {
        let mut cell = self.cell.write().unwrap_or_else(PoisonError::into_inner);
        cell.label = label;
        cell.version += 1;
        cell.version
    }

    pub fn reader(&self) -> PredictionReader {
        PredictionReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Read handle for the interactive context.
#[derive(Clone)]
pub struct PredictionReader {
    cell: Arc<RwLock<Cell>>,
}

impl PredictionReader {
    /// Snapshot of the latest label.
    pub fn latest(&self) -> SelectedLabel {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .label
            .clone()
    }

    /// Snapshot together with its version.
    pub fn latest_versioned(&self) -> (SelectedLabel, u64) {
        let cell = self.cell.read().unwrap_or_else(PoisonError::into_inner);
        (cell.label.clone(), cell.version)
    }

    pub fn version(&self) -> u64 {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }
}
