//! Kaiseki Core - Domain models and shared types
//!
//! This crate defines the core abstractions used throughout the kaiseki
//! annotation workbench:
//! - Segmentation models (bunsetsu, morphemes)
//! - Derivation trees returned by the chart service
//! - Triples and pattern provenance
//! - Ontology (concepts and typed relations)
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{AppConfig, ConfigError, LoggingConfig, ServiceConfig};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for kaiseki operations
#[derive(Error, Debug)]
pub enum KaisekiError {
    /// Empty or whitespace-only text submitted to an operation
    #[error("Empty input: {0}")]
    InputError(String),

    /// Remote service answered with a non-2xx status
    #[error("Service error: HTTP {status}")]
    ServiceError { status: u16 },

    /// Structurally valid but empty payload where non-empty is required
    #[error("Empty result from {0}")]
    EmptyResult(String),

    /// Transport or response-parse failure at the gateway
    #[error("Gateway error: {0}")]
    GatewayError(String),

    /// A verification stage explicitly reported failure
    #[error("Stage failure: {0}")]
    StageFailure(String),

    /// Operation against an index/id that no longer exists.
    /// Callers treat this as a silent no-op, never surfaced to the user.
    #[error("Stale selection: {0}")]
    SelectionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, KaisekiError>;

// ============================================================================
// Segmentation Models
// ============================================================================

/// Morpheme type tag assigned by the segmentation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MorphType {
    /// Content-bearing stem
    Core,
    /// Functional morpheme (particles, auxiliaries)
    Func,
    /// Sahen verbal noun
    Sahen,
    Other,
}

impl std::fmt::Display for MorphType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Func => write!(f, "func"),
            Self::Sahen => write!(f, "sahen"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A single morpheme within a bunsetsu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Morpheme {
    pub text: String,

    #[serde(rename = "type")]
    pub morph_type: MorphType,
}

impl Morpheme {
    pub fn new(text: impl Into<String>, morph_type: MorphType) -> Self {
        Self {
            text: text.into(),
            morph_type,
        }
    }
}

/// One bunsetsu: an ordered sequence of morphemes.
///
/// Invariant: the concatenation of the morpheme texts, in order, yields
/// the bunsetsu's surface text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BunsetsuItem {
    pub bunsetu: Vec<Morpheme>,
}

impl BunsetsuItem {
    pub fn new(morphemes: Vec<Morpheme>) -> Self {
        Self { bunsetu: morphemes }
    }

    /// Surface text of this bunsetsu
    pub fn surface(&self) -> String {
        self.bunsetu.iter().map(|m| m.text.as_str()).collect()
    }

    /// Type tags of the constituent morphemes, in order
    pub fn morph_types(&self) -> Vec<MorphType> {
        self.bunsetu.iter().map(|m| m.morph_type).collect()
    }
}

/// A sentence's bunsetsu segmentation, consumed here as read-only input
pub type Segmentation = Vec<BunsetsuItem>;

/// Remote-analysis status of one sentence in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentenceStatus {
    /// Segmentation resolved and editable
    Ready,
    /// Remote analysis failed after retries; the sentence can be resubmitted
    Pending,
}

// ============================================================================
// Derivation Trees
// ============================================================================

/// Color tag attached to a tree node by the chart service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeColor {
    Green,
    Red,
    #[default]
    Gray,
}

/// A node in a candidate derivation tree.
///
/// Trees are immutable once returned by the expansion service; selection
/// among candidates operates by index only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub text: String,

    #[serde(default)]
    pub color: NodeColor,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,

    /// Binary predicate-classifier value at this node, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pred: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a leaf node
    pub fn leaf(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: NodeColor::Gray,
            types: None,
            pred: None,
            confidence: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_pred(mut self, pred: u8) -> Self {
        self.pred = Some(pred);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

// ============================================================================
// Triples and Pattern Provenance
// ============================================================================

/// Where a triple was extracted from: the matched pattern and its
/// slot bindings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_text: Option<String>,

    /// Slot-name → bound surface string
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, String>,
}

/// A (subject, predicate, object) assertion extracted from a parse tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            provenance: None,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Bindings whose slot names follow the letter+digits convention
    /// (X1, Y2, ...). Auxiliary bindings are filtered out for display.
    pub fn core_bindings(&self) -> BTreeMap<&str, &str> {
        let slot_re = regex::Regex::new(r"^[A-Z][0-9]+$").expect("static slot regex");

        self.provenance
            .as_ref()
            .map(|p| {
                p.bindings
                    .iter()
                    .filter(|(name, _)| slot_re.is_match(name))
                    .map(|(name, value)| (name.as_str(), value.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}

// ============================================================================
// Pattern Catalog
// ============================================================================

/// A lexico-syntactic pattern from the remote catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDescriptor {
    /// Representative textual form, e.g. "[X1]は[X2]を[Y]"
    pub representative_pattern: String,

    /// Functional category tag, when the catalog provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func: Option<String>,
}

impl PatternDescriptor {
    pub fn new(representative_pattern: impl Into<String>) -> Self {
        Self {
            representative_pattern: representative_pattern.into(),
            func: None,
        }
    }
}

// ============================================================================
// Ontology Models
// ============================================================================

/// A named concept in the active ontology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub name: String,
}

/// A typed relation: label with domain and object-class concepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub label: String,

    /// Concept name the relation's subject must belong to
    pub domain: String,

    /// Concept name the relation's object must belong to
    pub object_class: String,

    #[serde(default)]
    pub description: String,
}

impl Relation {
    pub fn new(
        label: impl Into<String>,
        domain: impl Into<String>,
        object_class: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            domain: domain.into(),
            object_class: object_class.into(),
            description: String::new(),
        }
    }
}

/// The user-editable ontology consumed by the verification pipeline.
///
/// Relation labels are intended unique (enforced by the external editor);
/// lookups here tolerate duplicates by taking the first match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ontology {
    #[serde(default)]
    pub concepts: BTreeMap<String, Concept>,

    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Ontology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_concept(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.concepts.insert(name.clone(), Concept { name });
    }

    pub fn add_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    /// First relation whose label matches, trimmed
    pub fn find_relation(&self, label: &str) -> Option<&Relation> {
        let label = label.trim();
        self.relations.iter().find(|r| r.label.trim() == label)
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

// ============================================================================
// Orientation (Pattern A/B)
// ============================================================================

/// Orientation of a triple relative to a relation's declared
/// domain/object_class.
///
/// Pattern A: subject maps to the domain concept, object to the
/// object_class concept. Pattern B is the reverse mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    A,
    B,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

impl std::str::FromStr for Orientation {
    type Err = KaisekiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            other => Err(KaisekiError::StageFailure(format!(
                "unknown orientation pattern: {other}"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bunsetsu_surface_concatenation() {
        let item = BunsetsuItem::new(vec![
            Morpheme::new("食べ", MorphType::Core),
            Morpheme::new("た", MorphType::Func),
        ]);
        assert_eq!(item.surface(), "食べた");
        assert_eq!(item.morph_types(), vec![MorphType::Core, MorphType::Func]);
    }

    #[test]
    fn test_triple_core_bindings_filter() {
        let mut bindings = BTreeMap::new();
        bindings.insert("X1".to_string(), "猫".to_string());
        bindings.insert("Y2".to_string(), "食べた".to_string());
        bindings.insert("aux_marker".to_string(), "を".to_string());

        let triple = Triple::new("猫", "食べた", "魚").with_provenance(Provenance {
            pattern_id: Some(3),
            pattern_text: Some("[X1]が[X2]を[Y2]".to_string()),
            bindings,
        });

        let core = triple.core_bindings();
        assert_eq!(core.len(), 2);
        assert_eq!(core.get("X1"), Some(&"猫"));
        assert!(!core.contains_key("aux_marker"));
    }

    #[test]
    fn test_triple_core_bindings_without_provenance() {
        let triple = Triple::new("a", "b", "c");
        assert!(triple.core_bindings().is_empty());
    }

    #[test]
    fn test_ontology_duplicate_labels_first_wins() {
        let mut ontology = Ontology::new();
        ontology.add_relation(Relation::new("食べた", "動物", "食物"));
        ontology.add_relation(Relation::new("食べた", "人間", "料理"));

        let found = ontology.find_relation("食べた").unwrap();
        assert_eq!(found.domain, "動物");
    }

    #[test]
    fn test_orientation_parse() {
        assert_eq!("A".parse::<Orientation>().unwrap(), Orientation::A);
        assert_eq!("b".parse::<Orientation>().unwrap(), Orientation::B);
        assert!("C".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_morpheme_serde_type_tag() {
        let json = r#"{"text":"猫","type":"core"}"#;
        let m: Morpheme = serde_json::from_str(json).unwrap();
        assert_eq!(m.morph_type, MorphType::Core);
        assert_eq!(serde_json::to_string(&m).unwrap(), json);
    }

    #[test]
    fn test_tree_node_defaults_from_sparse_json() {
        let json = r#"{"text":"猫が魚を食べた"}"#;
        let node: TreeNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.color, NodeColor::Gray);
        assert!(node.is_leaf());
        assert!(node.pred.is_none());
    }
}
