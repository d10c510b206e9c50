//! GitLab API data types for the repository files and commits endpoints.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::GitLabError;

/// Content encoding used for every write; GitLab rejects some `text` payloads.
pub const BASE64_ENCODING: &str = "base64";

/// A file as returned by `GET /projects/:id/repository/files/:file_path`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepositoryFile {
    pub file_name: String,
    /// Path relative to the repository root.
    pub file_path: String,
    #[serde(default)]
    pub size: u64,
    /// Always `base64` for this endpoint.
    pub encoding: String,
    /// Encoded file content.
    pub content: String,
    #[serde(default)]
    pub content_sha256: String,
    /// Branch, tag or commit the file was read at.
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub blob_id: String,
    pub commit_id: String,
    pub last_commit_id: String,
}

impl RepositoryFile {
    /// Decode the file content into raw bytes.
    pub fn decoded_content(&self) -> Result<Vec<u8>, GitLabError> {
        // GitLab wraps long base64 payloads on some versions.
        let compact: String = self.content.split_whitespace().collect();
        STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| GitLabError::Decode {
                path: self.file_path.clone(),
                message: e.to_string(),
            })
    }
}

/// Per-file action inside a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Create,
    Update,
    Delete,
}

/// One entry of the `actions` array of `POST /projects/:id/repository/commits`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitAction {
    pub action: FileAction,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl CommitAction {
    /// Build an action carrying `content` encoded as base64.
    pub fn with_content(action: FileAction, file_path: impl Into<String>, content: &[u8]) -> Self {
        Self {
            action,
            file_path: file_path.into(),
            content: Some(STANDARD.encode(content)),
            encoding: Some(BASE64_ENCODING.to_string()),
        }
    }

    pub fn delete(file_path: impl Into<String>) -> Self {
        Self {
            action: FileAction::Delete,
            file_path: file_path.into(),
            content: None,
            encoding: None,
        }
    }
}

/// Body of `POST /projects/:id/repository/commits`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateCommit {
    pub branch: String,
    pub commit_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub actions: Vec<CommitAction>,
}

/// Commit returned by the commits API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Commit {
    pub id: String,
    pub short_id: String,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// Body of the single-file create/update/delete endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCommit {
    pub branch: String,
    pub commit_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// Blob guard for updates and deletes; GitLab rejects stale values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit_id: Option<String>,
}

/// Response of the single-file create/update endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct FileWriteResult {
    pub file_path: String,
    pub branch: String,
}

/// The user a token authenticates as.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabUser {
    pub id: u64,
    pub username: String,
    pub name: Option<String>,
}
