//! User intents accepted by the annotation session.
//!
//! Presentation layers translate gestures into these intents; the
//! session maps each intent to a state transition. Intents against
//! indices or ids that no longer exist are silent no-ops.

/// A user gesture, independent of any presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Expand the combinable cell at (i, j)
    SelectCell { i: usize, j: usize },

    /// Switch the active candidate tree of the expanded cell
    SelectTree { index: usize },

    /// Toggle one pattern in or out of the matching selection
    TogglePattern { id: u64 },

    /// Select exactly the matched pattern group
    SelectAllMatched,

    /// Clear the pattern selection
    DeselectAll,

    /// Verify the extracted triple at this index
    SelectTriple { index: usize },

    /// Register the currently verified triple
    RegisterTriple,

    /// Delete one registered triple by id
    DeleteTriple { id: u64 },

    /// Drop all registered triples and reset ids
    ClearRegistry,
}
