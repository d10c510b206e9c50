//! `gitlab_repository_file`: one file written through the per-file endpoints.
//!
//! Content is declared base64-encoded. Updates and deletes re-read the file
//! first so the write carries the blob's current `last_commit_id`.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Resource, ResourceError, check_immutable};
use crate::gitlab::BASE64_ENCODING;
use crate::identity::FileId;
use crate::reconcile::{ActionPlan, FileEntry};
use crate::store::{FileChange, RemoteFile, RemoteFileStore};

/// Prefix GitLab shows for commits that remove a managed file.
pub const DELETE_MESSAGE_PREFIX: &str = "[DELETE]: ";

/// Configuration and state record of the single-file resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    /// Base64-encoded file content.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_id: Option<String>,
}

/// Validated single-file declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DesiredFile {
    id: FileId,
    content: Vec<u8>,
    change: FileChange,
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ResourceError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ResourceError::MissingRequiredField(field)),
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}

fn extract(record: &FileRecord) -> Result<DesiredFile, ResourceError> {
    let id = FileId::new(
        required(&record.project, "project")?,
        required(&record.branch, "branch")?,
        required(&record.file_path, "file_path")?,
    );
    let encoded = record
        .content
        .as_deref()
        .ok_or(ResourceError::MissingRequiredField("content"))?;
    let content = STANDARD
        .decode(encoded)
        .map_err(|e| ResourceError::InvalidContent {
            path: id.path.clone(),
            message: format!("content must be base64 encoded: {}", e),
        })?;

    let change = FileChange {
        branch: id.branch.clone(),
        commit_message: required(&record.commit_message, "commit_message")?,
        content: Some(content.clone()),
        start_branch: optional(&record.start_branch),
        author_name: optional(&record.author_name),
        author_email: optional(&record.author_email),
        last_commit_id: None,
    };
    Ok(DesiredFile {
        id,
        content,
        change,
    })
}

fn parse_id(record: &FileRecord) -> Result<FileId, ResourceError> {
    let id = record
        .id
        .as_deref()
        .ok_or(ResourceError::MissingRequiredField("id"))?;
    Ok(id.parse()?)
}

fn state_record(base: &FileRecord, id: &FileId, file: &RemoteFile) -> FileRecord {
    FileRecord {
        id: Some(id.to_string()),
        project: Some(id.project.clone()),
        branch: Some(file.git_ref.clone()),
        file_path: Some(id.path.clone()),
        content: Some(STANDARD.encode(&file.content)),
        encoding: Some(BASE64_ENCODING.to_string()),
        last_commit_id: Some(file.last_commit_id.clone()),
        ..base.clone()
    }
}

/// The single-file resource.
#[derive(Clone)]
pub struct RepositoryFile {
    store: Arc<dyn RemoteFileStore>,
}

impl RepositoryFile {
    pub fn new(store: Arc<dyn RemoteFileStore>) -> Self {
        Self { store }
    }

    /// Current remote file, `None` when it does not exist.
    async fn fetch(&self, id: &FileId) -> Result<Option<RemoteFile>, ResourceError> {
        match self.store.get_file(&id.project, &id.path, &id.branch).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ResourceError::remote(&id.path, e)),
        }
    }

    /// Re-read a file that was just written.
    async fn read_back(&self, id: &FileId, base: &FileRecord) -> Result<FileRecord, ResourceError> {
        let file = self
            .store
            .get_file(&id.project, &id.path, &id.branch)
            .await
            .map_err(|e| ResourceError::remote(&id.path, e))?;
        Ok(state_record(base, id, &file))
    }
}

#[async_trait]
impl Resource for RepositoryFile {
    type Record = FileRecord;

    const TYPE_NAME: &'static str = "gitlab_repository_file";

    async fn plan(
        &self,
        prior: Option<&FileRecord>,
        config: &FileRecord,
    ) -> Result<ActionPlan, ResourceError> {
        let desired = extract(config)?;
        if let Some(prior) = prior {
            check_immutable("project", &prior.project, &config.project)?;
            check_immutable("branch", &prior.branch, &config.branch)?;
            check_immutable("file_path", &prior.file_path, &config.file_path)?;
        }

        let entry = FileEntry::new(desired.id.path.clone(), desired.content.clone());
        let mut plan = ActionPlan::default();
        match self.fetch(&desired.id).await? {
            None => plan.creates.push(entry),
            Some(file) if file.content != desired.content => plan.updates.push(entry),
            Some(_) => {}
        }
        Ok(plan)
    }

    async fn create(&self, config: &FileRecord) -> Result<FileRecord, ResourceError> {
        let desired = extract(config)?;
        let id = &desired.id;
        self.store
            .create_file(&id.project, &id.path, &desired.change)
            .await
            .map_err(|e| ResourceError::remote(&id.path, e))?;

        info!(id = %id, "Created repository file");
        self.read_back(id, config).await
    }

    async fn read(&self, state: &FileRecord) -> Result<Option<FileRecord>, ResourceError> {
        let id = parse_id(state)?;
        match self.fetch(&id).await? {
            Some(file) => Ok(Some(state_record(state, &id, &file))),
            None => {
                warn!(id = %id, "File not found, removing from state");
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        prior: &FileRecord,
        config: &FileRecord,
    ) -> Result<FileRecord, ResourceError> {
        check_immutable("project", &prior.project, &config.project)?;
        check_immutable("branch", &prior.branch, &config.branch)?;
        check_immutable("file_path", &prior.file_path, &config.file_path)?;

        let desired = extract(config)?;
        let id = &desired.id;
        let current = self
            .store
            .get_file(&id.project, &id.path, &id.branch)
            .await
            .map_err(|e| ResourceError::remote(&id.path, e))?;

        let change = FileChange {
            start_branch: None,
            last_commit_id: Some(current.last_commit_id),
            ..desired.change.clone()
        };
        self.store
            .update_file(&id.project, &id.path, &change)
            .await
            .map_err(|e| ResourceError::remote(&id.path, e))?;

        info!(id = %id, "Updated repository file");
        self.read_back(id, config).await
    }

    async fn delete(&self, state: &FileRecord) -> Result<(), ResourceError> {
        let id = match &state.id {
            Some(_) => parse_id(state)?,
            None => FileId::new(
                required(&state.project, "project")?,
                required(&state.branch, "branch")?,
                required(&state.file_path, "file_path")?,
            ),
        };
        let Some(current) = self.fetch(&id).await? else {
            warn!(id = %id, "File already absent");
            return Ok(());
        };

        // Imported state has no commit message of its own.
        let message = optional(&state.commit_message).unwrap_or_else(|| id.path.clone());
        let change = FileChange {
            branch: id.branch.clone(),
            commit_message: format!("{}{}", DELETE_MESSAGE_PREFIX, message),
            content: None,
            start_branch: None,
            author_name: optional(&state.author_name),
            author_email: optional(&state.author_email),
            last_commit_id: Some(current.last_commit_id),
        };
        self.store
            .delete_file(&id.project, &id.path, &change)
            .await
            .map_err(|e| ResourceError::remote(&id.path, e))?;

        info!(id = %id, "Deleted repository file");
        Ok(())
    }

    async fn import(&self, id: &str) -> Result<Option<FileRecord>, ResourceError> {
        let id: FileId = id.parse()?;
        let record = FileRecord {
            id: Some(id.to_string()),
            project: Some(id.project.clone()),
            branch: Some(id.branch.clone()),
            file_path: Some(id.path.clone()),
            ..Default::default()
        };
        self.read(&record).await
    }
}
