//! Kaiseki Session - one sentence's annotation session
//!
//! Owns every slice of interactive state (segmentation, chart, cell
//! expansion, matching session, verification run, triple registry) and
//! maps user [`Intent`]s to state transitions. Single-threaded and
//! cooperative: no two gateway calls ever run in parallel, but results
//! may arrive after the user has moved on, so every asynchronous
//! completion is committed through a generation-checked ticket and
//! stale results are discarded.

pub mod intent;

pub use intent::Intent;

use kaiseki_chart::{ensure_buildable, CellExpansion, CellState, ChartModel};
use kaiseki_core::{
    AppConfig, KaisekiError, Ontology, Result, Segmentation, SentenceStatus, Triple,
};
use kaiseki_gateway::{ExpandedCell, Gateway};
use kaiseki_matching::MatchingSession;
use kaiseki_verify::{run_pipeline, TripleRegistry, VerificationRun, Verdict};
use std::time::Duration;

// ============================================================================
// Completion tickets
// ============================================================================

/// Ticket for an in-flight cell expansion.
///
/// Committing a result requires the ticket still to match the session's
/// current expansion generation; otherwise the result is stale and is
/// discarded without mutating display state.
#[derive(Debug)]
pub struct ExpansionTicket {
    cell: (usize, usize),
    generation: u64,
}

impl ExpansionTicket {
    pub fn cell(&self) -> (usize, usize) {
        self.cell
    }
}

/// Ticket for an in-flight verification run
#[derive(Debug)]
pub struct VerifyTicket {
    pub triple: Triple,
    generation: u64,
}

// ============================================================================
// Session
// ============================================================================

/// All interactive state for one open sentence
pub struct AnnotationSession {
    config: AppConfig,
    ontology: Ontology,

    text: String,
    segmentation: Segmentation,
    status: Option<SentenceStatus>,

    chart: Option<ChartModel>,
    expansion: Option<CellExpansion>,
    matching: MatchingSession,
    verification: Option<VerificationRun>,
    registry: TripleRegistry,

    expand_generation: u64,
    verify_generation: u64,
}

impl AnnotationSession {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            ontology: Ontology::new(),
            text: String::new(),
            segmentation: Vec::new(),
            status: None,
            chart: None,
            expansion: None,
            matching: MatchingSession::new(),
            verification: None,
            registry: TripleRegistry::new(),
            expand_generation: 0,
            verify_generation: 0,
        }
    }

    pub fn set_ontology(&mut self, ontology: Ontology) {
        self.ontology = ontology;
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    pub fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    pub fn sentence_status(&self) -> Option<SentenceStatus> {
        self.status
    }

    pub fn chart(&self) -> Option<&ChartModel> {
        self.chart.as_ref()
    }

    pub fn expansion(&self) -> Option<&CellExpansion> {
        self.expansion.as_ref()
    }

    pub fn matching(&self) -> &MatchingSession {
        &self.matching
    }

    pub fn verification(&self) -> Option<&VerificationRun> {
        self.verification.as_ref()
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.verification.as_ref().map(|run| run.verdict)
    }

    pub fn registry(&self) -> &TripleRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Sentence lifecycle
    // ------------------------------------------------------------------------

    /// Segment a new sentence, replacing all downstream state.
    ///
    /// Transient failures retry a bounded number of times with a fixed
    /// delay; exhausting the attempts marks the sentence Pending so the
    /// batch continues and the user can resubmit. Blank input fails
    /// immediately without retrying.
    pub async fn load_sentence(
        &mut self,
        gateway: &dyn Gateway,
        text: impl Into<String>,
    ) -> Result<SentenceStatus> {
        self.text = text.into();
        self.reset_downstream();
        self.segmentation.clear();
        self.status = None;

        let attempts = self.config.service.segment_retry_attempts.max(1);
        let delay = Duration::from_millis(self.config.service.segment_retry_delay_ms);

        for attempt in 1..=attempts {
            match gateway.segment(&self.text).await {
                Ok(segmentation) => {
                    tracing::info!(bunsetsu = segmentation.len(), "sentence segmented");
                    self.segmentation = segmentation;
                    self.status = Some(SentenceStatus::Ready);
                    return Ok(SentenceStatus::Ready);
                }
                Err(e @ KaisekiError::InputError(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "segmentation attempt failed");
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.status = Some(SentenceStatus::Pending);
        Ok(SentenceStatus::Pending)
    }

    /// Build the combinability chart for the loaded segmentation
    pub async fn build_chart(&mut self, gateway: &dyn Gateway) -> Result<()> {
        ensure_buildable(&self.segmentation)?;

        let result = gateway.build_chart(&self.segmentation).await?;
        self.chart = Some(ChartModel::from_chart_result(&result)?);
        self.reset_downstream();
        Ok(())
    }

    fn reset_downstream(&mut self) {
        self.expansion = None;
        self.matching = MatchingSession::new();
        self.verification = None;
        self.expand_generation += 1;
        self.verify_generation += 1;
    }

    // ------------------------------------------------------------------------
    // Intent dispatch
    // ------------------------------------------------------------------------

    /// Apply one user intent.
    ///
    /// Intents against vanished indices or ids are silent no-ops; every
    /// other failure is scoped to the triggering gesture and leaves
    /// surrounding state untouched.
    pub async fn dispatch(&mut self, gateway: &dyn Gateway, intent: Intent) -> Result<()> {
        tracing::debug!(?intent, "dispatching intent");
        match intent {
            Intent::SelectCell { i, j } => {
                let ticket = match self.begin_expansion(i, j) {
                    Some(ticket) => ticket,
                    None => return Ok(()),
                };
                let threshold = self.config.service.pred_threshold;
                let result = gateway.expand_cell(&self.segmentation, (i, j), threshold).await;
                self.commit_expansion(gateway, &ticket, result).await?;
                Ok(())
            }

            Intent::SelectTree { index } => {
                let tree = match self.expansion.as_mut().and_then(|e| e.select_tree(index)) {
                    Some(tree) => tree.tree.clone(),
                    None => return Ok(()),
                };
                self.publish_counts();
                self.matching
                    .activate_tree(gateway, tree, self.segmentation.clone())
                    .await
            }

            Intent::TogglePattern { id } => {
                self.matching.toggle_selection(gateway, id).await?;
                Ok(())
            }

            Intent::SelectAllMatched => {
                self.matching.select_all_matched(gateway).await?;
                Ok(())
            }

            Intent::DeselectAll => {
                self.matching.deselect_all();
                Ok(())
            }

            Intent::SelectTriple { index } => {
                let ticket = match self.begin_verification(index) {
                    Some(ticket) => ticket,
                    None => return Ok(()),
                };
                let run = run_pipeline(gateway, ticket.triple.clone(), &self.ontology).await;
                self.commit_verification(&ticket, run);
                Ok(())
            }

            Intent::RegisterTriple => match &self.verification {
                Some(run) => {
                    self.registry.register(run)?;
                    Ok(())
                }
                None => {
                    tracing::debug!("registration without a verified triple ignored");
                    Ok(())
                }
            },

            Intent::DeleteTriple { id } => {
                self.registry.delete(id);
                Ok(())
            }

            Intent::ClearRegistry => {
                self.registry.clear();
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Cell expansion (three-phase)
    // ------------------------------------------------------------------------

    /// Start expanding cell (i, j). Non-expandable cells (diagonal,
    /// out of range, no chart yet) yield no ticket.
    pub fn begin_expansion(&mut self, i: usize, j: usize) -> Option<ExpansionTicket> {
        let expandable = self
            .chart
            .as_ref()
            .map(|c| c.is_expandable(i, j))
            .unwrap_or(false);
        if !expandable {
            tracing::debug!(i, j, "expansion of non-combinable cell ignored");
            return None;
        }

        let mut expansion = CellExpansion::new((i, j));
        expansion.begin();
        self.expansion = Some(expansion);

        self.expand_generation += 1;
        Some(ExpansionTicket {
            cell: (i, j),
            generation: self.expand_generation,
        })
    }

    /// Commit an expansion result. Stale tickets (a newer expansion has
    /// started since) discard the result and return `Ok(false)`.
    ///
    /// Entering the Expanded state publishes the cell's pred-count
    /// summary and hands the default active tree to the matching session.
    pub async fn commit_expansion(
        &mut self,
        gateway: &dyn Gateway,
        ticket: &ExpansionTicket,
        result: Result<ExpandedCell>,
    ) -> Result<bool> {
        if ticket.generation != self.expand_generation {
            tracing::debug!(cell = ?ticket.cell, "stale expansion result discarded");
            return Ok(false);
        }
        let expansion = match self.expansion.as_mut() {
            Some(expansion) if expansion.cell() == ticket.cell => expansion,
            _ => {
                tracing::debug!(cell = ?ticket.cell, "expansion no longer current");
                return Ok(false);
            }
        };

        let expanded = match result {
            Ok(expanded) => expanded,
            Err(e) => {
                expansion.fail();
                return Err(e);
            }
        };
        expansion.complete(expanded)?;

        if let CellState::Expanded { .. } = expansion.state() {
            self.publish_counts();
            if let Some(tree) = self.expansion.as_ref().and_then(|e| e.active_node()) {
                let tree = tree.clone();
                self.matching
                    .activate_tree(gateway, tree, self.segmentation.clone())
                    .await?;
            }
        }
        Ok(true)
    }

    /// Overwrite the chart's pred-count summary for the expanded cell
    fn publish_counts(&mut self) {
        let (cell, summary) = match self.expansion.as_ref() {
            Some(expansion) => match expansion.summary() {
                Some(summary) => (expansion.cell(), summary),
                None => return,
            },
            None => return,
        };
        if let Some(chart) = self.chart.as_mut() {
            chart.update_cell_counts(cell.0, cell.1, summary);
        }
    }

    // ------------------------------------------------------------------------
    // Verification (three-phase)
    // ------------------------------------------------------------------------

    /// Select the extracted triple at `index` for verification.
    ///
    /// Discards the previous run immediately; any of its still-in-flight
    /// results become stale. Vanished indices yield no ticket.
    pub fn begin_verification(&mut self, index: usize) -> Option<VerifyTicket> {
        let triple = match self.matching.triples().get(index) {
            Some(triple) => triple.clone(),
            None => {
                tracing::debug!(index, "verification of vanished triple ignored");
                return None;
            }
        };

        self.verification = None;
        self.verify_generation += 1;
        Some(VerifyTicket {
            triple,
            generation: self.verify_generation,
        })
    }

    /// Commit a finished run; stale tickets discard it
    pub fn commit_verification(&mut self, ticket: &VerifyTicket, run: VerificationRun) -> bool {
        if ticket.generation != self.verify_generation {
            tracing::debug!(triple = %ticket.triple, "stale verification result discarded");
            return false;
        }
        self.verification = Some(run);
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_ticket_without_chart() {
        let mut session = AnnotationSession::new(AppConfig::default());
        assert!(session.begin_expansion(0, 2).is_none());
    }

    #[test]
    fn test_verify_ticket_requires_extraction() {
        let mut session = AnnotationSession::new(AppConfig::default());
        assert!(session.begin_verification(0).is_none());
    }
}
