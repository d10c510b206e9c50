//! The remote file store the reconciliation engine runs against.
//!
//! [`RemoteFileStore`] abstracts the handful of GitLab operations the engine
//! needs. [`GitLabClient`] is the production implementation; [`MemoryStore`]
//! keeps everything in process.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::gitlab::{
    BASE64_ENCODING, CommitAction, CreateCommit, FileAction, FileCommit, GitLabClient, GitLabError,
};
use crate::reconcile::{ActionKind, ReconciliationRequest};

pub mod memory;

pub use memory::MemoryStore;

/// A file as currently stored on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    /// Decoded content.
    pub content: Vec<u8>,
    pub content_sha256: String,
    /// Ref the file was read at.
    pub git_ref: String,
    /// Last commit that touched this file; guards single-file writes.
    pub last_commit_id: String,
}

/// Result of an atomic commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub id: String,
    pub short_id: String,
}

/// A single-file write through the per-file endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub branch: String,
    pub commit_message: String,
    /// New content; `None` for deletes.
    pub content: Option<Vec<u8>>,
    pub start_branch: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub last_commit_id: Option<String>,
}

/// Operations consumed from the remote platform.
///
/// Implementations must report a missing project, ref or path from
/// [`get_file`](RemoteFileStore::get_file) as [`GitLabError::NotFound`].
#[async_trait]
pub trait RemoteFileStore: Send + Sync {
    /// Read `path` at `git_ref`.
    async fn get_file(
        &self,
        project: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<RemoteFile, GitLabError>;

    /// Apply every action of `request` as one atomic revision.
    async fn create_commit(
        &self,
        request: &ReconciliationRequest,
    ) -> Result<CommitResult, GitLabError>;

    async fn create_file(
        &self,
        project: &str,
        path: &str,
        change: &FileChange,
    ) -> Result<(), GitLabError>;

    async fn update_file(
        &self,
        project: &str,
        path: &str,
        change: &FileChange,
    ) -> Result<(), GitLabError>;

    async fn delete_file(
        &self,
        project: &str,
        path: &str,
        change: &FileChange,
    ) -> Result<(), GitLabError>;
}

impl From<&ReconciliationRequest> for CreateCommit {
    fn from(request: &ReconciliationRequest) -> Self {
        let actions = request
            .actions
            .iter()
            .map(|action| match (action.kind, &action.content) {
                (ActionKind::Delete, _) | (_, None) => CommitAction::delete(action.path.clone()),
                (ActionKind::Create, Some(content)) => {
                    CommitAction::with_content(FileAction::Create, action.path.clone(), content)
                }
                (ActionKind::Update, Some(content)) => {
                    CommitAction::with_content(FileAction::Update, action.path.clone(), content)
                }
            })
            .collect();

        Self {
            branch: request.branch.clone(),
            commit_message: request.commit_message.clone(),
            start_branch: request.start_branch.clone(),
            author_email: request.author_email.clone(),
            author_name: request.author_name.clone(),
            actions,
        }
    }
}

impl From<&FileChange> for FileCommit {
    fn from(change: &FileChange) -> Self {
        let content = change.content.as_ref().map(|c| STANDARD.encode(c));
        Self {
            branch: change.branch.clone(),
            commit_message: change.commit_message.clone(),
            encoding: content.as_ref().map(|_| BASE64_ENCODING.to_string()),
            content,
            start_branch: change.start_branch.clone(),
            author_email: change.author_email.clone(),
            author_name: change.author_name.clone(),
            last_commit_id: change.last_commit_id.clone(),
        }
    }
}

#[async_trait]
impl RemoteFileStore for GitLabClient {
    async fn get_file(
        &self,
        project: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<RemoteFile, GitLabError> {
        let file = GitLabClient::get_file(self, project, path, git_ref).await?;
        Ok(RemoteFile {
            content: file.decoded_content()?,
            path: file.file_path,
            content_sha256: file.content_sha256,
            git_ref: file.git_ref,
            last_commit_id: file.last_commit_id,
        })
    }

    async fn create_commit(
        &self,
        request: &ReconciliationRequest,
    ) -> Result<CommitResult, GitLabError> {
        let commit = GitLabClient::create_commit(self, &request.project, &request.into()).await?;
        Ok(CommitResult {
            id: commit.id,
            short_id: commit.short_id,
        })
    }

    async fn create_file(
        &self,
        project: &str,
        path: &str,
        change: &FileChange,
    ) -> Result<(), GitLabError> {
        GitLabClient::create_file(self, project, path, &change.into()).await?;
        Ok(())
    }

    async fn update_file(
        &self,
        project: &str,
        path: &str,
        change: &FileChange,
    ) -> Result<(), GitLabError> {
        GitLabClient::update_file(self, project, path, &change.into()).await?;
        Ok(())
    }

    async fn delete_file(
        &self,
        project: &str,
        path: &str,
        change: &FileChange,
    ) -> Result<(), GitLabError> {
        GitLabClient::delete_file(self, project, path, &change.into()).await
    }
}
