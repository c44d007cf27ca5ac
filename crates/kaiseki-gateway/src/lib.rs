//! Kaiseki Gateway - typed boundary to the remote services
//!
//! The workbench orchestrates five analysis operations (segmentation,
//! chart building, cell expansion, pattern catalog, pattern matching) and
//! four LLM-backed verification stages. This crate owns the wire formats
//! and exposes them behind the [`Gateway`] trait so that every downstream
//! component can be driven by a mock in tests.
//!
//! The gateway is a pure boundary: no state, no retry. Non-2xx responses
//! surface as `ServiceError` with the numeric status code.

pub mod client;
pub mod wire;

pub use client::HttpGateway;
pub use wire::{
    CandidateTree, CellWire, ChartResult, ExpandedCell, MatchOutcome, Stage1Response,
    Stage2Response, Step3Response, Step4Response,
};

use async_trait::async_trait;
use kaiseki_core::{
    BunsetsuItem, Orientation, PatternDescriptor, Relation, Result, Segmentation, TreeNode, Triple,
};
use std::collections::BTreeMap;

/// Remote operations used by the annotation workbench.
///
/// Each call is a single request/response; callers own retry policy and
/// stale-result suppression.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Segment raw text into bunsetsu.
    ///
    /// Fails with `InputError` on blank text, `ServiceError` on non-2xx,
    /// and `EmptyResult` when the service returns a structurally valid
    /// zero-length result.
    async fn segment(&self, text: &str) -> Result<Segmentation>;

    /// Build the combinability chart for a completed segmentation.
    /// Callers must check `status == "success"` on the result.
    async fn build_chart(&self, segmentation: &[BunsetsuItem]) -> Result<ChartResult>;

    /// Expand cell (i, j) into ranked candidate trees.
    /// `pred_threshold` is an opaque ranking parameter forwarded as-is.
    async fn expand_cell(
        &self,
        segmentation: &[BunsetsuItem],
        cell: (usize, usize),
        pred_threshold: u32,
    ) -> Result<ExpandedCell>;

    /// Fetch the pattern catalog. Callers cache this after first success.
    async fn list_patterns(&self) -> Result<BTreeMap<u64, PatternDescriptor>>;

    /// Match patterns against a tree.
    ///
    /// With `selected` absent the service classifies applicability only;
    /// with a non-empty selection it extracts triples for exactly those
    /// patterns.
    async fn match_patterns(
        &self,
        tree: &TreeNode,
        segmentation: &[BunsetsuItem],
        selected: Option<&[u64]>,
    ) -> Result<MatchOutcome>;

    /// Stage 1: does the triple's predicate match a defined relation?
    async fn verify_definition(
        &self,
        triple: &Triple,
        relations: &[Relation],
    ) -> Result<Stage1Response>;

    /// Stage 2: detect the orientation pattern (A or B).
    async fn verify_direction(
        &self,
        triple: &Triple,
        relation: &Relation,
    ) -> Result<Stage2Response>;

    /// Stage 3: generate representative samples for the relation's
    /// domain and object_class concepts.
    async fn generate_samples(&self, relation: &Relation) -> Result<Step3Response>;

    /// Stage 4: class-membership and paraphrase verification.
    async fn verify_membership(
        &self,
        triple: &Triple,
        pattern: Orientation,
        relation: &Relation,
        samples: &Step3Response,
    ) -> Result<Step4Response>;
}
