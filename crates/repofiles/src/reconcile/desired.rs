//! Desired-State Extractor.
//!
//! Turns the orchestrator's record of a file-set resource into a validated
//! [`DesiredState`]. Extraction is pure: no network call happens until it
//! succeeds.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::error::ReconcileError;
use super::types::{CommitTarget, DesiredState, FileEntry, FileSet};

/// One `file` block of a file-set record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlock {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl FileBlock {
    pub fn new(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            content: Some(content.into()),
        }
    }
}

/// Configuration and state record of the file-set resource.
///
/// Every field is optional on the wire so that missing values surface as
/// [`ReconcileError::MissingRequiredField`] rather than as a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub file: Vec<FileBlock>,
}

/// Read the commit target (everything but the file blocks) from `record`.
pub fn extract_target(record: &FilesRecord) -> Result<CommitTarget, ReconcileError> {
    Ok(CommitTarget {
        project: required(&record.project, "project")?,
        branch: required(&record.branch, "branch")?,
        start_branch: optional(&record.start_branch),
        author_name: optional(&record.author_name),
        author_email: optional(&record.author_email),
        commit_message: required(&record.commit_message, "commit_message")?,
    })
}

/// Read the full desired state from `record`.
pub fn extract_desired(record: &FilesRecord) -> Result<DesiredState, ReconcileError> {
    let target = extract_target(record)?;
    if record.file.is_empty() {
        return Err(ReconcileError::MissingRequiredField("file"));
    }

    let mut files = FileSet::new();
    for block in &record.file {
        let path = required(&block.file_path, "file.file_path")?;
        let content = block
            .content
            .clone()
            .ok_or(ReconcileError::MissingRequiredField("file.content"))?;
        if files.contains_path(&path) {
            return Err(ReconcileError::DuplicateFilePath(path));
        }
        files.insert(FileEntry::new(path, content));
    }

    Ok(DesiredState { target, files })
}

/// Paths named by a record's file blocks, ignoring blocks without a path.
pub fn declared_paths(record: &FilesRecord) -> BTreeSet<String> {
    record
        .file
        .iter()
        .filter_map(|b| b.file_path.clone())
        .filter(|p| !p.is_empty())
        .collect()
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ReconcileError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ReconcileError::MissingRequiredField(field)),
    }
}

/// Orchestrators send unset optional strings as `""`.
fn optional(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}
