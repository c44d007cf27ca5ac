//! Per-cell expansion and candidate-tree selection state machine.
//!
//! States: Unexpanded → Expanding → {Terminal | Expanded(active)}.
//! A gateway failure drops back to Unexpanded and the cell stays
//! re-clickable. Within Expanded, selection moves by index; an invalid
//! index is a silent no-op.

use kaiseki_core::{KaisekiError, Result, TreeNode};
use kaiseki_gateway::wire::{CandidateTree, ExpandedCell};

use crate::PredSummary;

/// Expansion state of one chart cell
#[derive(Debug, Default)]
pub enum CellState {
    #[default]
    Unexpanded,
    Expanding,
    /// No further expansion possible (atomic span)
    Terminal,
    Expanded {
        trees: Vec<CandidateTree>,
        active: usize,
    },
}

/// State machine for one expanded cell
#[derive(Debug)]
pub struct CellExpansion {
    cell: (usize, usize),
    state: CellState,
}

impl CellExpansion {
    pub fn new(cell: (usize, usize)) -> Self {
        Self {
            cell,
            state: CellState::Unexpanded,
        }
    }

    pub fn cell(&self) -> (usize, usize) {
        self.cell
    }

    pub fn state(&self) -> &CellState {
        &self.state
    }

    /// User clicked the cell: enter Expanding. Re-expanding a cell that
    /// already resolved is allowed; the new result overwrites the old.
    pub fn begin(&mut self) {
        self.state = CellState::Expanding;
    }

    /// Apply the gateway result for this cell.
    ///
    /// Non-success and empty non-terminal results drop back to
    /// Unexpanded with an error so the cell can be clicked again.
    pub fn complete(&mut self, result: ExpandedCell) -> Result<&CellState> {
        if !result.is_success() {
            self.state = CellState::Unexpanded;
            return Err(KaisekiError::StageFailure(format!(
                "cell ({}, {}) expansion failed: {}",
                self.cell.0,
                self.cell.1,
                result.message.as_deref().unwrap_or("unknown")
            )));
        }

        if result.is_terminal {
            self.state = CellState::Terminal;
            return Ok(&self.state);
        }

        if result.tree_list.is_empty() {
            self.state = CellState::Unexpanded;
            return Err(KaisekiError::EmptyResult(format!(
                "expand-cell ({}, {})",
                self.cell.0, self.cell.1
            )));
        }

        // Default active index is 0
        self.state = CellState::Expanded {
            trees: result.tree_list,
            active: 0,
        };
        Ok(&self.state)
    }

    /// Gateway transport failure: back to Unexpanded, re-clickable
    pub fn fail(&mut self) {
        self.state = CellState::Unexpanded;
    }

    /// Switch the active candidate. Out-of-range indices leave the state
    /// untouched and return None.
    pub fn select_tree(&mut self, idx: usize) -> Option<&CandidateTree> {
        match &mut self.state {
            CellState::Expanded { trees, active } if idx < trees.len() => {
                *active = idx;
                Some(&trees[idx])
            }
            _ => {
                tracing::debug!(idx, "tree selection ignored");
                None
            }
        }
    }

    /// Currently active candidate, when the cell is expanded
    pub fn active_tree(&self) -> Option<&CandidateTree> {
        match &self.state {
            CellState::Expanded { trees, active } => trees.get(*active),
            _ => None,
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        match &self.state {
            CellState::Expanded { active, .. } => Some(*active),
            _ => None,
        }
    }

    /// Pred-count summary over the whole candidate list, not just the
    /// active tree
    pub fn summary(&self) -> Option<PredSummary> {
        match &self.state {
            CellState::Expanded { trees, .. } => Some(PredSummary::from_tree_list(trees)),
            _ => None,
        }
    }

    /// The active tree's node structure, for downstream consumers
    pub fn active_node(&self) -> Option<&TreeNode> {
        self.active_tree().map(|t| &t.tree)
    }
}

// ============================================================================
// Tests
// ============================================================================
