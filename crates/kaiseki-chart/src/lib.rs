//! Kaiseki Chart - combinability matrix for one sentence
//!
//! Owns the upper-triangular chart over span boundaries: diagonal cells
//! are atomic bunsetsu (always terminal), cells with j > i are combinable
//! spans carrying a display text and pred-count summaries. The summaries
//! are informational only: they are recomputed and overwritten whenever
//! that exact cell is re-expanded, never otherwise mutated.

pub mod selection;

pub use selection::{CellExpansion, CellState};

use kaiseki_core::{BunsetsuItem, KaisekiError, Result};
use kaiseki_gateway::wire::{CandidateTree, CellWire, ChartResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Pred-count summary
// ============================================================================

/// Candidate counts bucketed by the binary pred classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredSummary {
    pub pred1: u32,
    pub pred0: u32,
}

impl PredSummary {
    /// Summarize a whole candidate list by root pred value.
    /// Unclassified roots count toward neither bucket.
    pub fn from_tree_list(trees: &[CandidateTree]) -> Self {
        let pred1 = trees.iter().filter(|t| t.root_pred == Some(1)).count() as u32;
        let pred0 = trees.iter().filter(|t| t.root_pred == Some(0)).count() as u32;
        Self { pred1, pred0 }
    }
}

// ============================================================================
// Chart cells
// ============================================================================

/// A combinable (j > i) chart cell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartCell {
    /// Display text for the span
    pub text: String,

    /// Pred-count summary, overwritten on each expansion of this cell
    pub counts: PredSummary,
}

/// Read view of one chart position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell<'a> {
    /// Atomic bunsetsu on the diagonal, never expandable
    Diagonal(&'a str),
    /// Combinable span
    Combinable(&'a ChartCell),
}

// ============================================================================
// Chart model
// ============================================================================

/// The combinability matrix for one sentence
#[derive(Debug, Clone, Default)]
pub struct ChartModel {
    n: usize,
    bunsetsu_texts: Vec<String>,
    cells: BTreeMap<(usize, usize), ChartCell>,
}

impl ChartModel {
    /// Build the model from a successful chart-service result.
    ///
    /// Fails with `StageFailure` when the service reported non-success.
    pub fn from_chart_result(result: &ChartResult) -> Result<Self> {
        if !result.is_success() {
            return Err(KaisekiError::StageFailure(format!(
                "chart build failed: {}",
                result.message.as_deref().unwrap_or("unknown")
            )));
        }

        let texts: Vec<String> = result
            .input_data
            .bunsetsu
            .iter()
            .map(|b| b.surface())
            .collect();

        Self::set_chart(&result.cky_data.matrix, texts)
    }

    /// Populate the chart from a raw matrix and the bunsetsu surface texts
    pub fn set_chart(matrix: &[Vec<Option<CellWire>>], bunsetsu_texts: Vec<String>) -> Result<Self> {
        if bunsetsu_texts.is_empty() {
            return Err(KaisekiError::InputError(
                "cannot build a chart from an empty segmentation".to_string(),
            ));
        }

        let n = bunsetsu_texts.len();
        let mut cells = BTreeMap::new();

        for (i, row) in matrix.iter().enumerate().take(n) {
            for (j, wire) in row.iter().enumerate().take(n) {
                if j <= i {
                    continue;
                }
                let wire = wire.clone().unwrap_or_default();
                cells.insert(
                    (i, j),
                    ChartCell {
                        text: wire.text.unwrap_or_default(),
                        counts: PredSummary {
                            pred1: wire.expanded_pred1_count.unwrap_or(0),
                            pred0: wire.expanded_pred0_count.unwrap_or(0),
                        },
                    },
                );
            }
        }

        tracing::debug!(n, cells = cells.len(), "chart populated");
        Ok(Self {
            n,
            bunsetsu_texts,
            cells,
        })
    }

    /// Number of bunsetsu (matrix dimension)
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// What is cell (i, j)? `None` for out-of-range or lower-triangle
    /// positions.
    pub fn cell(&self, i: usize, j: usize) -> Option<Cell<'_>> {
        if i >= self.n || j >= self.n || j < i {
            return None;
        }
        if i == j {
            return Some(Cell::Diagonal(&self.bunsetsu_texts[i]));
        }
        self.cells.get(&(i, j)).map(Cell::Combinable)
    }

    /// Expansion is offered only for combinable cells
    pub fn is_expandable(&self, i: usize, j: usize) -> bool {
        matches!(self.cell(i, j), Some(Cell::Combinable(_)))
    }

    /// Overwrite the pred-count summary at (i, j).
    ///
    /// Invoked exactly once per successful expansion of that cell; counts
    /// never accumulate. Returns false (no-op) for non-combinable
    /// positions.
    pub fn update_cell_counts(&mut self, i: usize, j: usize, counts: PredSummary) -> bool {
        match self.cells.get_mut(&(i, j)) {
            Some(cell) => {
                cell.counts = counts;
                true
            }
            None => {
                tracing::debug!(i, j, "count update for non-combinable cell ignored");
                false
            }
        }
    }
}

/// A segmentation can feed the chart builder only when it is non-empty
/// and holds at least one resolved bunsetsu list. A sentence still
/// pending remote analysis must surface a "not parsed" state instead of
/// an empty chart.
pub fn ensure_buildable(segmentation: &[BunsetsuItem]) -> Result<()> {
    if segmentation.is_empty() || segmentation.iter().all(|b| b.bunsetu.is_empty()) {
        return Err(KaisekiError::InputError(
            "sentence not parsed yet".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
