//! Wire formats for the remote analysis and verification services.
//!
//! Duck-typed shapes from the services (positional triples, bare-string
//! pattern descriptors, string-or-number ids) are normalized here, at the
//! gateway boundary. Nothing past this module branches on wire shape.

use kaiseki_core::{
    BunsetsuItem, Orientation, PatternDescriptor, Provenance, Relation, TreeNode, Triple,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct SegmentRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChartRequest<'a> {
    pub data: &'a [BunsetsuItem],
}

#[derive(Debug, Serialize)]
pub(crate) struct ExpandCellRequest<'a> {
    pub data: &'a [BunsetsuItem],
    pub cell: [usize; 2],
    pub pred_threshold: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct MatchingRequest<'a> {
    pub tree: &'a TreeNode,
    pub bunsetsu_list: &'a [BunsetsuItem],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_patterns: Option<&'a [u64]>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Stage1Request<'a> {
    pub triple: &'a Triple,
    pub relations: &'a [Relation],
}

#[derive(Debug, Serialize)]
pub(crate) struct Stage2Request<'a> {
    pub triple: &'a Triple,
    pub relation: &'a Relation,
}

#[derive(Debug, Serialize)]
pub(crate) struct Step3Request<'a> {
    pub relation: &'a Relation,
}

#[derive(Debug, Serialize)]
pub(crate) struct Step4Request<'a> {
    pub triple: &'a Triple,
    pub pattern: Orientation,
    pub relation: &'a Relation,
    pub sample_domain: &'a str,
    pub sample_object_class: &'a str,
}

// ============================================================================
// Chart responses
// ============================================================================

/// One combinable cell as serialized by the chart service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CellWire {
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub expanded_pred1_count: Option<u32>,

    #[serde(default)]
    pub expanded_pred0_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CkyData {
    pub matrix: Vec<Vec<Option<CellWire>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputEcho {
    pub bunsetsu: Vec<BunsetsuItem>,
}

/// Response of `POST /api/cky`
#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub status: String,

    pub cky_data: CkyData,

    /// Echo of the segmentation the chart was built from
    pub input_data: InputEcho,

    #[serde(default)]
    pub message: Option<String>,
}

impl ChartResult {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// One ranked candidate derivation for an expanded cell
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateTree {
    pub tree_number: u32,

    /// Root-level pred classifier value, absent when unclassified
    #[serde(default)]
    pub root_pred: Option<u8>,

    #[serde(default)]
    pub left_split: String,

    #[serde(default)]
    pub right_split: String,

    pub tree: TreeNode,
}

/// Response of `POST /api/cky/expand-cell`
#[derive(Debug, Clone, Deserialize)]
pub struct ExpandedCell {
    pub status: String,

    #[serde(default)]
    pub is_terminal: bool,

    #[serde(default)]
    pub cell_text: String,

    #[serde(default)]
    pub tree_list: Vec<CandidateTree>,

    #[serde(default)]
    pub message: Option<String>,
}

impl ExpandedCell {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ============================================================================
// Pattern catalog
// ============================================================================

/// Catalog entries arrive either as full descriptors or bare strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum PatternWire {
    Descriptor(PatternDescriptor),
    Bare(String),
}

impl PatternWire {
    fn into_descriptor(self) -> PatternDescriptor {
        match self {
            Self::Descriptor(d) => d,
            Self::Bare(text) => PatternDescriptor::new(text),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatternsResponse {
    #[serde(default)]
    pub patterns: BTreeMap<String, PatternWire>,
}

impl PatternsResponse {
    /// Normalize string-keyed catalog into numeric ids; entries with
    /// non-numeric ids are dropped with a warning.
    pub fn into_catalog(self) -> BTreeMap<u64, PatternDescriptor> {
        self.patterns
            .into_iter()
            .filter_map(|(key, wire)| match key.parse::<u64>() {
                Ok(id) => Some((id, wire.into_descriptor())),
                Err(_) => {
                    tracing::warn!(pattern_id = %key, "skipping non-numeric pattern id");
                    None
                }
            })
            .collect()
    }
}

// ============================================================================
// Matching
// ============================================================================

/// Triples arrive either as named objects or positional arrays
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum TripleWire {
    Named {
        subject: String,
        predicate: String,
        object: String,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        pattern_id: Option<IdWire>,
        #[serde(default)]
        bindings: Option<BTreeMap<String, String>>,
    },
    Positional(Vec<String>),
}

/// Ids arrive as numbers or strings depending on service version
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdWire {
    Num(u64),
    Str(String),
}

impl IdWire {
    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.parse().ok(),
        }
    }
}

impl TripleWire {
    /// Normalize to the canonical record; positional arrays shorter than
    /// three elements are not triples.
    pub fn into_triple(self) -> Option<Triple> {
        match self {
            Self::Named {
                subject,
                predicate,
                object,
                pattern,
                pattern_id,
                bindings,
            } => {
                let mut triple = Triple::new(subject, predicate, object);
                let pattern_id = pattern_id.and_then(|id| id.as_u64());
                if pattern.is_some() || pattern_id.is_some() || bindings.is_some() {
                    triple = triple.with_provenance(Provenance {
                        pattern_id,
                        pattern_text: pattern,
                        bindings: bindings.unwrap_or_default(),
                    });
                }
                Some(triple)
            }
            Self::Positional(mut parts) => {
                if parts.len() < 3 {
                    return None;
                }
                let object = parts.remove(2);
                let predicate = parts.remove(1);
                let subject = parts.remove(0);
                Some(Triple::new(subject, predicate, object))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MatchingResponse {
    pub status: String,

    #[serde(default)]
    pub triples: Vec<TripleWire>,

    /// Pattern-id → classification ("light" means matched; anything
    /// else, including absence, means not matched)
    #[serde(default)]
    pub pattern_status: BTreeMap<String, String>,

    #[serde(default)]
    pub message: Option<String>,
}

/// Normalized outcome of a matching call
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub status: String,

    /// Extracted triples, canonical shape
    pub triples: Vec<Triple>,

    /// Pattern ids classified as matched against the current tree
    pub light_patterns: BTreeSet<u64>,
}

impl MatchOutcome {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

impl MatchingResponse {
    pub fn into_outcome(self) -> MatchOutcome {
        let light_patterns = self
            .pattern_status
            .iter()
            .filter(|(_, status)| status.as_str() == "light")
            .filter_map(|(id, _)| id.parse::<u64>().ok())
            .collect();

        let triples = self
            .triples
            .into_iter()
            .filter_map(TripleWire::into_triple)
            .collect();

        MatchOutcome {
            status: self.status,
            triples,
            light_patterns,
        }
    }
}

// ============================================================================
// Verification stages
// ============================================================================

/// Response of `POST /api/verify/stage1` (definition check)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stage1Response {
    #[serde(default)]
    pub matched: bool,

    #[serde(default, rename = "matchedRelation")]
    pub matched_relation: Option<Relation>,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub gemini_response: Option<String>,
}

/// Response of `POST /api/verify/stage2` (direction detection)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stage2Response {
    /// Absent means valid; only an explicit `false` is a failure
    #[serde(default)]
    pub valid: Option<bool>,

    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub reasoning: String,

    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub gemini_response: Option<String>,
}

impl Stage2Response {
    pub fn is_valid(&self) -> bool {
        self.valid != Some(false)
    }

    /// Detected orientation; pattern defaults to A when unstated
    pub fn orientation(&self) -> Option<Orientation> {
        if !self.is_valid() {
            return None;
        }
        match self.pattern.as_deref() {
            None => Some(Orientation::A),
            Some(p) => p.parse().ok(),
        }
    }
}

/// Response of `POST /api/verify/step3` (sample generation)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Step3Response {
    #[serde(default)]
    pub sample_domain: String,

    #[serde(default)]
    pub sample_object_class: String,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub gemini_response: Option<String>,
}

/// Response of `POST /api/verify/step4` (class-membership check)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Step4Response {
    #[serde(default)]
    pub valid: bool,

    #[serde(default)]
    pub subject_class: bool,

    #[serde(default)]
    pub object_class: bool,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub gemini_response: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
