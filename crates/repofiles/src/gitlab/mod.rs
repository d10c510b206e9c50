//! GitLab API client for repository file operations.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for GitLab API operations
//! - [`types`] - Wire types for the files and commits endpoints
//! - [`client`] - The REST client
//!
//! The client implements [`crate::store::RemoteFileStore`], which is the
//! only surface the reconciliation engine depends on.

mod client;
mod error;
mod types;

pub use client::{DEFAULT_TIMEOUT, GITLAB_COM, GitLabClient};
pub use error::{GitLabError, is_rate_limit_error, short_error_message};
pub use types::{
    BASE64_ENCODING, Commit, CommitAction, CreateCommit, FileAction, FileCommit, FileWriteResult,
    GitLabUser, RepositoryFile,
};
