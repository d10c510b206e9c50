use thiserror::Error;

use crate::gitlab::GitLabError;

/// Errors raised while reconciling a file set.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("file_path {0:?} is declared more than once")]
    DuplicateFilePath(String),

    #[error("failed to read {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: GitLabError,
    },

    #[error("commit failed: {0}")]
    RemoteCommit(#[source] GitLabError),
}
