//! Sequential short-circuiting verification of one triple.
//!
//! Four stages, each a single gateway call: definition check, direction
//! detection, sample generation, class-membership check. The first
//! negative result stops the run. Every stage fails closed: a transport
//! or parse error is recorded as that stage reporting failure, never
//! left ambiguous.

use kaiseki_core::{KaisekiError, Ontology, Orientation, Relation, Triple};
use kaiseki_gateway::{Gateway, Stage1Response, Stage2Response, Step3Response, Step4Response};

/// Terminal outcome of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// All four stages passed
    Valid,
    /// Some stage reported a negative result or failed
    Invalid,
    /// The pipeline has not finished (only observable mid-run)
    Incomplete,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "トリプルは有効です"),
            Self::Invalid => write!(f, "トリプルは無効です"),
            Self::Incomplete => write!(f, "検証中"),
        }
    }
}

/// One verification run over one triple.
///
/// A stage's result is present only if every earlier stage succeeded;
/// absence of a later result means the pipeline stopped there.
#[derive(Debug, Clone)]
pub struct VerificationRun {
    pub triple: Triple,

    pub definition: Option<Stage1Response>,
    pub direction: Option<Stage2Response>,
    pub samples: Option<Step3Response>,
    pub membership: Option<Step4Response>,

    pub verdict: Verdict,
}

impl VerificationRun {
    fn new(triple: Triple) -> Self {
        Self {
            triple,
            definition: None,
            direction: None,
            samples: None,
            membership: None,
            verdict: Verdict::Incomplete,
        }
    }

    /// The relation the triple was matched against, once stage 1 passed
    pub fn matched_relation(&self) -> Option<&Relation> {
        self.definition
            .as_ref()
            .and_then(|d| d.matched_relation.as_ref())
    }

    /// Detected orientation, once stage 2 passed
    pub fn orientation(&self) -> Option<Orientation> {
        self.direction.as_ref().and_then(|d| d.orientation())
    }

    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }
}

/// Run the full pipeline for one triple against the active ontology.
///
/// Always returns a run with a terminal verdict; gateway errors surface
/// as negative stage results inside the run, not as `Err`.
pub async fn run_pipeline(
    gateway: &dyn Gateway,
    triple: Triple,
    ontology: &Ontology,
) -> VerificationRun {
    let mut run = VerificationRun::new(triple);

    // Stage 1: definition check
    let definition = match gateway
        .verify_definition(&run.triple, &ontology.relations)
        .await
    {
        Ok(response) => response,
        Err(e) => failed_definition(e),
    };
    let relation = if definition.matched {
        definition.matched_relation.clone()
    } else {
        None
    };
    run.definition = Some(definition);
    let relation = match relation {
        Some(relation) => relation,
        None => {
            tracing::debug!(triple = %run.triple, "definition check negative");
            run.verdict = Verdict::Invalid;
            return run;
        }
    };

    // Stage 2: direction detection
    let direction = match gateway.verify_direction(&run.triple, &relation).await {
        Ok(response) => response,
        Err(e) => failed_direction(e),
    };
    let orientation = direction.orientation();
    run.direction = Some(direction);
    let orientation = match orientation {
        Some(o) => o,
        None => {
            tracing::debug!(triple = %run.triple, "direction detection negative");
            run.verdict = Verdict::Invalid;
            return run;
        }
    };

    // Stage 3: sample generation
    let samples = match gateway.generate_samples(&relation).await {
        Ok(response) => response,
        Err(e) => failed_samples(e),
    };
    run.samples = Some(samples.clone());
    if let Some(error) = &samples.error {
        tracing::debug!(%error, "sample generation failed");
        run.verdict = Verdict::Invalid;
        return run;
    }

    // Stage 4: class-membership check
    let membership = match gateway
        .verify_membership(&run.triple, orientation, &relation, &samples)
        .await
    {
        Ok(response) => response,
        Err(e) => failed_membership(e),
    };
    let passed = membership.valid && membership.subject_class && membership.object_class;
    run.membership = Some(membership);

    run.verdict = if passed { Verdict::Valid } else { Verdict::Invalid };
    tracing::info!(triple = %run.triple, verdict = ?run.verdict, "verification finished");
    run
}

fn failed_definition(e: KaisekiError) -> Stage1Response {
    Stage1Response {
        matched: false,
        message: e.to_string(),
        ..Default::default()
    }
}

fn failed_direction(e: KaisekiError) -> Stage2Response {
    Stage2Response {
        valid: Some(false),
        reasoning: e.to_string(),
        ..Default::default()
    }
}

fn failed_samples(e: KaisekiError) -> Step3Response {
    Step3Response {
        error: Some(e.to_string()),
        ..Default::default()
    }
}

fn failed_membership(e: KaisekiError) -> Step4Response {
    Step4Response {
        valid: false,
        error: Some(e.to_string()),
        ..Default::default()
    }
}
