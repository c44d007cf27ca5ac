//! Kaiseki Verify - semantic verification pipeline and triple registry
//!
//! Verifies one extracted triple at a time against the active ontology
//! through four sequential LLM-backed stages, then accumulates accepted
//! triples in a session-scoped registry.

pub mod pipeline;
pub mod registry;

pub use pipeline::{run_pipeline, VerificationRun, Verdict};
pub use registry::{RegisteredTriple, TripleRegistry};

// ============================================================================
// Tests
// ============================================================================
