//! Session-scoped registry of accepted triples.
//!
//! Ids are a monotonic counter starting at 1 and are never reused after
//! deletion. A bulk clear resets the counter together with the entries;
//! registered-triple identity is not durable across a clear.

use chrono::{DateTime, Utc};
use kaiseki_core::{KaisekiError, Orientation, Relation, Result, Triple};
use serde::{Deserialize, Serialize};

use crate::pipeline::VerificationRun;

/// An accepted triple with its registration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredTriple {
    pub id: u64,

    /// Orientation-corrected: the subject always corresponds to the
    /// relation's domain concept, the object to its object_class
    pub triple: Triple,

    /// The relation the triple was verified against
    pub relation: Relation,

    /// Orientation detected on the surface triple before correction
    pub orientation: Orientation,

    pub registered_at: DateTime<Utc>,
}

/// Accumulating result set for one annotation session
#[derive(Debug)]
pub struct TripleRegistry {
    next_id: u64,
    entries: Vec<RegisteredTriple>,
}

impl Default for TripleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TripleRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }

    /// Register the triple of a fully valid verification run.
    ///
    /// Pattern B swaps subject and object before storage so that the
    /// stored subject maps to the relation's domain concept.
    pub fn register(&mut self, run: &VerificationRun) -> Result<&RegisteredTriple> {
        if !run.is_valid() {
            return Err(KaisekiError::StageFailure(
                "only a fully verified triple can be registered".to_string(),
            ));
        }
        let relation = run.matched_relation().cloned().ok_or_else(|| {
            KaisekiError::StageFailure("verification run lacks a matched relation".to_string())
        })?;
        let orientation = run.orientation().ok_or_else(|| {
            KaisekiError::StageFailure("verification run lacks an orientation".to_string())
        })?;

        let mut triple = run.triple.clone();
        if orientation == Orientation::B {
            std::mem::swap(&mut triple.subject, &mut triple.object);
        }

        let id = self.next_id;
        self.next_id += 1;
        tracing::info!(id, triple = %triple, "triple registered");

        self.entries.push(RegisteredTriple {
            id,
            triple,
            relation,
            orientation,
            registered_at: Utc::now(),
        });
        Ok(self.entries.last().expect("entry just pushed"))
    }

    /// Delete one entry by id. Unknown ids are a silent no-op.
    pub fn delete(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        let removed = self.entries.len() < before;
        if !removed {
            tracing::debug!(id, "delete for unknown registration ignored");
        }
        removed
    }

    /// Drop all entries and reset the id counter to 1
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_id = 1;
    }

    pub fn get(&self, id: u64) -> Option<&RegisteredTriple> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTriple> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
