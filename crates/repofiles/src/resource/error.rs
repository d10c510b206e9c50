use thiserror::Error;

use crate::gitlab::GitLabError;
use crate::identity::IdentityError;
use crate::reconcile::ReconcileError;

/// Errors returned to the orchestrator by resource operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    MalformedIdentity(#[from] IdentityError),

    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("file_path {0:?} is declared more than once")]
    DuplicateFilePath(String),

    #[error("invalid content for {path}: {message}")]
    InvalidContent { path: String, message: String },

    /// The field is part of the resource identity; the orchestrator must
    /// replace the resource instead.
    #[error("{field} cannot change from {old:?} to {new:?}")]
    ImmutableField {
        field: &'static str,
        old: String,
        new: String,
    },

    #[error("commit failed: {0}")]
    RemoteCommit(#[source] GitLabError),

    #[error("request for {path} failed: {source}")]
    Remote {
        path: String,
        #[source]
        source: GitLabError,
    },

    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    #[error("invalid record: {0}")]
    Record(#[from] serde_json::Error),
}

impl From<ReconcileError> for ResourceError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::MissingRequiredField(field) => Self::MissingRequiredField(field),
            ReconcileError::DuplicateFilePath(path) => Self::DuplicateFilePath(path),
            ReconcileError::Fetch { path, source } => Self::Remote { path, source },
            ReconcileError::RemoteCommit(source) => Self::RemoteCommit(source),
        }
    }
}

impl ResourceError {
    pub(crate) fn remote(path: &str, source: GitLabError) -> Self {
        Self::Remote {
            path: path.to_string(),
            source,
        }
    }
}
