//! Kaiseki Matching - pattern catalog cache and matching session
//!
//! One session per active tree. Activation fetches the catalog (once per
//! process lifetime of the session value) and runs a classification-only
//! matching call; selection changes re-invoke matching with the explicit
//! id list. An empty selection never touches the network.

use kaiseki_core::{PatternDescriptor, Result, Segmentation, TreeNode, Triple};
use kaiseki_gateway::Gateway;
use std::collections::{BTreeMap, BTreeSet};

/// Classification of one catalog pattern against the active tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternStatus {
    /// Matched against the current tree, selectable
    Light,
    /// Not matched, shown grayed out
    Disabled,
}

/// Matching state for the currently active tree.
///
/// The catalog is fetched lazily on first activation and cached for the
/// life of the session value; it is never mutated afterwards.
#[derive(Debug, Default)]
pub struct MatchingSession {
    catalog: Option<BTreeMap<u64, PatternDescriptor>>,
    tree: Option<TreeNode>,
    segmentation: Segmentation,
    light: BTreeSet<u64>,
    selected: BTreeSet<u64>,
    triples: Vec<Triple>,
}

impl MatchingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a newly active tree and classify the catalog against it.
    ///
    /// Discards the previous tree's classification, selection, and
    /// extraction result before the call, so a failed classification
    /// leaves an empty (not stale) session.
    pub async fn activate_tree(
        &mut self,
        gateway: &dyn Gateway,
        tree: TreeNode,
        segmentation: Segmentation,
    ) -> Result<()> {
        self.light.clear();
        self.selected.clear();
        self.triples.clear();

        if self.catalog.is_none() {
            self.catalog = Some(gateway.list_patterns().await?);
        }

        let outcome = gateway.match_patterns(&tree, &segmentation, None).await?;
        tracing::debug!(light = outcome.light_patterns.len(), "tree classified");

        self.light = outcome.light_patterns;
        self.tree = Some(tree);
        self.segmentation = segmentation;
        Ok(())
    }

    /// The cached catalog; empty before the first successful activation
    pub fn catalog(&self) -> &BTreeMap<u64, PatternDescriptor> {
        static EMPTY: BTreeMap<u64, PatternDescriptor> = BTreeMap::new();
        self.catalog.as_ref().unwrap_or(&EMPTY)
    }

    pub fn status_of(&self, id: u64) -> PatternStatus {
        if self.light.contains(&id) {
            PatternStatus::Light
        } else {
            PatternStatus::Disabled
        }
    }

    /// Matched patterns, ascending by id
    pub fn matched_patterns(&self) -> Vec<(u64, &PatternDescriptor)> {
        self.catalog()
            .iter()
            .filter(|(id, _)| self.light.contains(id))
            .map(|(id, d)| (*id, d))
            .collect()
    }

    /// Unmatched patterns, ascending by id
    pub fn disabled_patterns(&self) -> Vec<(u64, &PatternDescriptor)> {
        self.catalog()
            .iter()
            .filter(|(id, _)| !self.light.contains(id))
            .map(|(id, d)| (*id, d))
            .collect()
    }

    pub fn is_selected(&self, id: u64) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected_ids(&self) -> Vec<u64> {
        self.selected.iter().copied().collect()
    }

    /// Most recent extraction result
    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    /// Toggle one pattern in or out of the selection and refresh the
    /// extraction. Ids outside the catalog are ignored.
    pub async fn toggle_selection(&mut self, gateway: &dyn Gateway, id: u64) -> Result<&[Triple]> {
        if !self.catalog().contains_key(&id) {
            tracing::debug!(id, "toggle for unknown pattern ignored");
            return Ok(&self.triples);
        }

        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
        self.refresh(gateway).await?;
        Ok(&self.triples)
    }

    /// Select exactly the matched group and refresh the extraction
    pub async fn select_all_matched(&mut self, gateway: &dyn Gateway) -> Result<&[Triple]> {
        self.selected = self.light.clone();
        self.refresh(gateway).await?;
        Ok(&self.triples)
    }

    /// Clear the selection. Purely local: the extraction result becomes
    /// empty without a network call.
    pub fn deselect_all(&mut self) {
        self.selected.clear();
        self.triples.clear();
    }

    async fn refresh(&mut self, gateway: &dyn Gateway) -> Result<()> {
        if self.selected.is_empty() {
            self.triples.clear();
            return Ok(());
        }

        let tree = match &self.tree {
            Some(tree) => tree,
            None => {
                tracing::debug!("extraction requested before any tree was activated");
                self.triples.clear();
                return Ok(());
            }
        };

        let ids = self.selected_ids();
        let outcome = gateway
            .match_patterns(tree, &self.segmentation, Some(&ids))
            .await?;
        tracing::debug!(triples = outcome.triples.len(), "extraction refreshed");
        self.triples = outcome.triples;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
