//! End-to-end session tests against a scripted gateway.

use async_trait::async_trait;
use kaiseki_chart::{Cell, CellState, PredSummary};
use kaiseki_core::{
    AppConfig, BunsetsuItem, KaisekiError, Morpheme, MorphType, Ontology, Orientation,
    PatternDescriptor, Relation, Result, Segmentation, SentenceStatus, TreeNode, Triple,
};
use kaiseki_gateway::{
    ChartResult, ExpandedCell, Gateway, MatchOutcome, Stage1Response, Stage2Response,
    Step3Response, Step4Response,
};
use kaiseki_session::{AnnotationSession, Intent};
use kaiseki_verify::{run_pipeline, Verdict};
use serde_json::json;
use tokio_test::assert_ok;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Scripted gateway
// ============================================================================

struct ScriptedGateway {
    /// Segmentation calls that fail before the first success
    segment_failures: AtomicUsize,
    segment_calls: AtomicUsize,

    /// Queued expansion results, popped per expand_cell call
    expansions: Mutex<VecDeque<ExpandedCell>>,

    stage1_calls: AtomicUsize,
    stage2_calls: AtomicUsize,
}

impl ScriptedGateway {
    fn new() -> Self {
        Self {
            segment_failures: AtomicUsize::new(0),
            segment_calls: AtomicUsize::new(0),
            expansions: Mutex::new(VecDeque::new()),
            stage1_calls: AtomicUsize::new(0),
            stage2_calls: AtomicUsize::new(0),
        }
    }

    fn with_segment_failures(failures: usize) -> Self {
        let gateway = Self::new();
        gateway.segment_failures.store(failures, Ordering::SeqCst);
        gateway
    }

    fn queue_expansion(&self, expanded: ExpandedCell) {
        self.expansions.lock().unwrap().push_back(expanded);
    }
}

fn segmentation() -> Segmentation {
    vec![
        BunsetsuItem::new(vec![Morpheme::new("猫が", MorphType::Core)]),
        BunsetsuItem::new(vec![Morpheme::new("魚を", MorphType::Core)]),
        BunsetsuItem::new(vec![Morpheme::new("食べた", MorphType::Core)]),
    ]
}

fn chart_result() -> ChartResult {
    serde_json::from_value(json!({
        "status": "success",
        "cky_data": {
            "matrix": [
                [null, {"text": "猫が魚を"}, {"text": "猫が魚を食べた"}],
                [null, null, {"text": "魚を食べた"}],
                [null, null, null]
            ]
        },
        "input_data": {
            "bunsetsu": segmentation()
        }
    }))
    .unwrap()
}

fn expansion_with_counts(pred1: usize, pred0: usize) -> ExpandedCell {
    let trees: Vec<serde_json::Value> = (0..pred1 + pred0)
        .map(|n| {
            json!({
                "tree_number": n + 1,
                "root_pred": if n < pred1 { 1 } else { 0 },
                "left_split": "猫が",
                "right_split": "魚を食べた",
                "tree": TreeNode::leaf("猫が魚を食べた").with_pred(1),
            })
        })
        .collect();

    serde_json::from_value(json!({
        "status": "success",
        "is_terminal": false,
        "cell_text": "猫が魚を食べた",
        "tree_list": trees,
    }))
    .unwrap()
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn segment(&self, text: &str) -> Result<Segmentation> {
        if text.trim().is_empty() {
            return Err(KaisekiError::InputError("blank".into()));
        }
        let call = self.segment_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.segment_failures.load(Ordering::SeqCst) {
            return Err(KaisekiError::ServiceError { status: 503 });
        }
        Ok(segmentation())
    }

    async fn build_chart(&self, _segmentation: &[BunsetsuItem]) -> Result<ChartResult> {
        Ok(chart_result())
    }

    async fn expand_cell(
        &self,
        _segmentation: &[BunsetsuItem],
        _cell: (usize, usize),
        _pred_threshold: u32,
    ) -> Result<ExpandedCell> {
        self.expansions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| KaisekiError::GatewayError("no scripted expansion".into()))
    }

    async fn list_patterns(&self) -> Result<BTreeMap<u64, PatternDescriptor>> {
        let mut catalog = BTreeMap::new();
        catalog.insert(0, PatternDescriptor::new("[X1]が[X2]を[Y]"));
        catalog.insert(5, PatternDescriptor::new("[X1]は[Y]"));
        Ok(catalog)
    }

    async fn match_patterns(
        &self,
        _tree: &TreeNode,
        _segmentation: &[BunsetsuItem],
        selected: Option<&[u64]>,
    ) -> Result<MatchOutcome> {
        match selected {
            None => Ok(MatchOutcome {
                status: "success".into(),
                triples: vec![],
                light_patterns: [0].into_iter().collect(),
            }),
            Some(_) => {
                let mut bindings = std::collections::BTreeMap::new();
                bindings.insert("X1".to_string(), "猫".to_string());
                bindings.insert("X2".to_string(), "魚".to_string());
                bindings.insert("aux_marker".to_string(), "を".to_string());
                let triple =
                    Triple::new("猫", "食べた", "魚").with_provenance(kaiseki_core::Provenance {
                        pattern_id: Some(0),
                        pattern_text: Some("[X1]が[X2]を[Y]".to_string()),
                        bindings,
                    });
                Ok(MatchOutcome {
                    status: "success".into(),
                    triples: vec![triple],
                    light_patterns: BTreeSet::new(),
                })
            }
        }
    }

    async fn verify_definition(
        &self,
        triple: &Triple,
        relations: &[Relation],
    ) -> Result<Stage1Response> {
        self.stage1_calls.fetch_add(1, Ordering::SeqCst);
        let matched = relations
            .iter()
            .find(|r| r.label == triple.predicate)
            .cloned();
        Ok(Stage1Response {
            matched: matched.is_some(),
            matched_relation: matched,
            ..Default::default()
        })
    }

    async fn verify_direction(
        &self,
        _triple: &Triple,
        _relation: &Relation,
    ) -> Result<Stage2Response> {
        self.stage2_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Stage2Response {
            valid: Some(true),
            pattern: Some("A".into()),
            ..Default::default()
        })
    }

    async fn generate_samples(&self, _relation: &Relation) -> Result<Step3Response> {
        Ok(Step3Response {
            sample_domain: "犬".into(),
            sample_object_class: "肉".into(),
            ..Default::default()
        })
    }

    async fn verify_membership(
        &self,
        _triple: &Triple,
        _pattern: Orientation,
        _relation: &Relation,
        _samples: &Step3Response,
    ) -> Result<Step4Response> {
        Ok(Step4Response {
            valid: true,
            subject_class: true,
            object_class: true,
            ..Default::default()
        })
    }
}

fn ontology() -> Ontology {
    let mut ontology = Ontology::new();
    ontology.add_concept("動物");
    ontology.add_concept("食物");
    ontology.add_relation(Relation::new("食べた", "動物", "食物"));
    ontology
}

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.service.segment_retry_delay_ms = 0;
    config
}

async fn ready_session(gateway: &ScriptedGateway) -> AnnotationSession {
    let mut session = AnnotationSession::new(fast_config());
    session.set_ontology(ontology());
    session.load_sentence(gateway, "猫が魚を食べた").await.unwrap();
    session.build_chart(gateway).await.unwrap();
    session
}

// ============================================================================
// Segmentation retry
// ============================================================================

#[tokio::test]
async fn test_segmentation_retries_then_succeeds() {
    let gateway = ScriptedGateway::with_segment_failures(2);
    let mut session = AnnotationSession::new(fast_config());

    let status = session.load_sentence(&gateway, "猫が魚を食べた").await.unwrap();
    assert_eq!(status, SentenceStatus::Ready);
    assert_eq!(gateway.segment_calls.load(Ordering::SeqCst), 3);
    assert_eq!(session.segmentation().len(), 3);
}

#[tokio::test]
async fn test_segmentation_exhaustion_marks_pending() {
    let gateway = ScriptedGateway::with_segment_failures(10);
    let mut session = AnnotationSession::new(fast_config());

    let status = session.load_sentence(&gateway, "猫が魚を食べた").await.unwrap();
    assert_eq!(status, SentenceStatus::Pending);
    assert_eq!(gateway.segment_calls.load(Ordering::SeqCst), 3);

    // A pending sentence has no chart
    assert!(session.build_chart(&gateway).await.is_err());
}

#[tokio::test]
async fn test_blank_sentence_fails_without_retry() {
    let gateway = ScriptedGateway::new();
    let mut session = AnnotationSession::new(fast_config());

    assert!(matches!(
        session.load_sentence(&gateway, "   ").await,
        Err(KaisekiError::InputError(_))
    ));
    assert_eq!(gateway.segment_calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Chart and expansion
// ============================================================================

#[tokio::test]
async fn test_diagonal_cell_is_never_expanded() {
    let gateway = ScriptedGateway::new();
    let mut session = ready_session(&gateway).await;

    // No scripted expansion queued: a gateway call would fail the test
    assert_ok!(session.dispatch(&gateway, Intent::SelectCell { i: 1, j: 1 }).await);
    assert!(session.expansion().is_none());
}

#[tokio::test]
async fn test_reexpansion_overwrites_counts() {
    let gateway = ScriptedGateway::new();
    let mut session = ready_session(&gateway).await;

    gateway.queue_expansion(expansion_with_counts(2, 1));
    session
        .dispatch(&gateway, Intent::SelectCell { i: 0, j: 2 })
        .await
        .unwrap();

    gateway.queue_expansion(expansion_with_counts(0, 1));
    session
        .dispatch(&gateway, Intent::SelectCell { i: 0, j: 2 })
        .await
        .unwrap();

    match session.chart().unwrap().cell(0, 2).unwrap() {
        Cell::Combinable(cell) => {
            assert_eq!(cell.counts, PredSummary { pred1: 0, pred0: 1 });
        }
        other => panic!("unexpected cell: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_tree_index_is_noop() {
    let gateway = ScriptedGateway::new();
    let mut session = ready_session(&gateway).await;

    gateway.queue_expansion(expansion_with_counts(1, 1));
    session
        .dispatch(&gateway, Intent::SelectCell { i: 0, j: 2 })
        .await
        .unwrap();

    session
        .dispatch(&gateway, Intent::SelectTree { index: 1 })
        .await
        .unwrap();
    assert_eq!(session.expansion().unwrap().active_index(), Some(1));

    session
        .dispatch(&gateway, Intent::SelectTree { index: 9 })
        .await
        .unwrap();
    assert_eq!(session.expansion().unwrap().active_index(), Some(1));
}

#[tokio::test]
async fn test_failed_expansion_leaves_cell_reclickable() {
    let gateway = ScriptedGateway::new();
    let mut session = ready_session(&gateway).await;

    // Queue empty: the gateway reports failure
    assert!(session
        .dispatch(&gateway, Intent::SelectCell { i: 0, j: 2 })
        .await
        .is_err());
    assert!(matches!(
        session.expansion().unwrap().state(),
        CellState::Unexpanded
    ));

    gateway.queue_expansion(expansion_with_counts(1, 0));
    session
        .dispatch(&gateway, Intent::SelectCell { i: 0, j: 2 })
        .await
        .unwrap();
    assert_eq!(session.expansion().unwrap().active_index(), Some(0));
}

#[tokio::test]
async fn test_stale_expansion_result_is_discarded() {
    let gateway = ScriptedGateway::new();
    let mut session = ready_session(&gateway).await;

    let old_ticket = session.begin_expansion(0, 2).unwrap();
    // User clicks another cell before the first result arrives
    let new_ticket = session.begin_expansion(1, 2).unwrap();

    let committed = session
        .commit_expansion(&gateway, &old_ticket, Ok(expansion_with_counts(5, 5)))
        .await
        .unwrap();
    assert!(!committed);
    assert_eq!(session.expansion().unwrap().cell(), (1, 2));

    let committed = session
        .commit_expansion(&gateway, &new_ticket, Ok(expansion_with_counts(1, 0)))
        .await
        .unwrap();
    assert!(committed);

    // Counts of the abandoned cell were never published
    match session.chart().unwrap().cell(0, 2).unwrap() {
        Cell::Combinable(cell) => assert_eq!(cell.counts, PredSummary::default()),
        other => panic!("unexpected cell: {other:?}"),
    }
}

// ============================================================================
// Verification and registry
// ============================================================================

async fn extracted_session(gateway: &ScriptedGateway) -> AnnotationSession {
    let mut session = ready_session(gateway).await;
    gateway.queue_expansion(expansion_with_counts(1, 0));
    session
        .dispatch(gateway, Intent::SelectCell { i: 0, j: 2 })
        .await
        .unwrap();
    session
        .dispatch(gateway, Intent::SelectAllMatched)
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn test_end_to_end_valid_registration() {
    let gateway = ScriptedGateway::new();
    let mut session = extracted_session(&gateway).await;

    assert_eq!(session.matching().triples().len(), 1);

    // Display bindings keep only slot-convention names
    let core = session.matching().triples()[0].core_bindings();
    assert_eq!(core.get("X1"), Some(&"猫"));
    assert_eq!(core.get("X2"), Some(&"魚"));
    assert!(!core.contains_key("aux_marker"));

    session
        .dispatch(&gateway, Intent::SelectTriple { index: 0 })
        .await
        .unwrap();
    assert_eq!(session.verdict(), Some(Verdict::Valid));

    session
        .dispatch(&gateway, Intent::RegisterTriple)
        .await
        .unwrap();

    let entry = session.registry().get(1).unwrap();
    assert_eq!(entry.triple.subject, "猫");
    assert_eq!(entry.triple.object, "魚");
    assert_eq!(entry.relation.label, "食べた");
}

#[tokio::test]
async fn test_unmatched_predicate_is_invalid_and_short_circuits() {
    let gateway = ScriptedGateway::new();
    let mut session = extracted_session(&gateway).await;

    session.set_ontology(Ontology::new());
    session
        .dispatch(&gateway, Intent::SelectTriple { index: 0 })
        .await
        .unwrap();

    assert_eq!(session.verdict(), Some(Verdict::Invalid));
    assert_eq!(gateway.stage2_calls.load(Ordering::SeqCst), 0);

    // Invalid runs cannot be registered
    assert!(session
        .dispatch(&gateway, Intent::RegisterTriple)
        .await
        .is_err());
    assert!(session.registry().is_empty());
}

#[tokio::test]
async fn test_stale_verification_result_is_discarded() {
    let gateway = ScriptedGateway::new();
    let mut session = extracted_session(&gateway).await;

    let ticket_x = session.begin_verification(0).unwrap();
    let run_x = run_pipeline(&gateway, ticket_x.triple.clone(), &ontology()).await;

    // User selects triple Y before X's result is committed
    let ticket_y = session.begin_verification(0).unwrap();
    let run_y = run_pipeline(&gateway, ticket_y.triple.clone(), &Ontology::new()).await;
    assert!(session.commit_verification(&ticket_y, run_y));

    // X resolves late and must be dropped
    assert!(!session.commit_verification(&ticket_x, run_x));
    assert_eq!(session.verdict(), Some(Verdict::Invalid));
}

#[tokio::test]
async fn test_registry_lifecycle_through_intents() {
    let gateway = ScriptedGateway::new();
    let mut session = extracted_session(&gateway).await;

    for _ in 0..3 {
        session
            .dispatch(&gateway, Intent::SelectTriple { index: 0 })
            .await
            .unwrap();
        session
            .dispatch(&gateway, Intent::RegisterTriple)
            .await
            .unwrap();
    }
    session
        .dispatch(&gateway, Intent::DeleteTriple { id: 2 })
        .await
        .unwrap();

    session
        .dispatch(&gateway, Intent::SelectTriple { index: 0 })
        .await
        .unwrap();
    session
        .dispatch(&gateway, Intent::RegisterTriple)
        .await
        .unwrap();

    let ids: Vec<u64> = session.registry().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 3, 4]);

    session
        .dispatch(&gateway, Intent::ClearRegistry)
        .await
        .unwrap();
    assert!(session.registry().is_empty());

    session
        .dispatch(&gateway, Intent::SelectTriple { index: 0 })
        .await
        .unwrap();
    session
        .dispatch(&gateway, Intent::RegisterTriple)
        .await
        .unwrap();
    assert_eq!(session.registry().iter().next().unwrap().id, 1);
}

#[tokio::test]
async fn test_vanished_triple_index_is_noop() {
    let gateway = ScriptedGateway::new();
    let mut session = extracted_session(&gateway).await;

    assert_ok!(
        session
            .dispatch(&gateway, Intent::SelectTriple { index: 5 })
            .await
    );
    assert!(session.verification().is_none());
}
