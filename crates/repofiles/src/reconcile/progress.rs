//! Progress reporting for reconciliation runs.

use super::types::ActionKind;

/// Progress events emitted while reconciling a file set.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ReconcileProgress {
    /// Starting to read the observed state of a branch.
    FetchingObserved {
        project: String,
        branch: String,
        /// Number of paths that will be read.
        paths: usize,
    },

    /// A path was read from the branch.
    FetchedFile { path: String, size: usize },

    /// A path does not exist on the branch.
    FileAbsent { path: String },

    /// Classification finished.
    Classified {
        creates: usize,
        deletes: usize,
        updates: usize,
    },

    /// Desired and observed state already agree; no commit is issued.
    NoChanges,

    /// A single action is part of the pending commit.
    PlannedAction { kind: ActionKind, path: String },

    /// Submitting the atomic commit.
    Committing { actions: usize },

    /// The commit landed.
    Committed { commit_id: String, actions: usize },

    /// Declared paths missing from the branch after a reconciliation.
    Drift { missing: Vec<String> },
}

/// Callback for progress updates during reconciliation.
pub type ProgressCallback = Box<dyn Fn(ReconcileProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: ReconcileProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
