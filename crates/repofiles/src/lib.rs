//! repofiles - declarative file management for GitLab repository branches.
//!
//! A resource declares a set of files (path + content) that must exist on one
//! branch of a GitLab project. Each reconciliation reads the branch, works out
//! which files to create, delete or update in place, and applies all of them
//! as a single atomic commit.
//!
//! # Layers
//!
//! - [`http`] / [`gitlab`] / [`retry`] - REST client for the files and commits endpoints
//! - [`store`] - [`RemoteFileStore`], the seam the engine runs against
//! - [`identity`] - composite resource identities such as `project:branch:a.txt,b.txt`
//! - [`reconcile`] - extract, fetch, classify, commit, re-read
//! - [`resource`] - `create`/`read`/`update`/`delete`/`import` for orchestrators
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use repofiles::{GitLabClient, Provider, DEFAULT_TIMEOUT};
//!
//! let client = GitLabClient::new("https://gitlab.com", &token, DEFAULT_TIMEOUT)?;
//! let provider = Provider::new(Arc::new(client));
//!
//! let state = provider.create("gitlab_repository_files", config).await?;
//! println!("{}", state["id"]);
//! ```

pub mod gitlab;
pub mod http;
pub mod identity;
pub mod reconcile;
pub mod resource;
pub mod retry;
pub mod store;

pub use gitlab::{DEFAULT_TIMEOUT, GITLAB_COM, GitLabClient, GitLabError};
pub use identity::{FileId, FilesId, IdentityError, TwoPartId};
pub use reconcile::{
    Action, ActionKind, ActionPlan, FileEntry, FileSet, FilesRecord, ReconcileError,
    ReconcileProgress, Reconciler, ReconciliationRequest,
};
pub use resource::{FileRecord, Provider, RepositoryFile, RepositoryFiles, Resource, ResourceError};
pub use store::{MemoryStore, RemoteFileStore};
