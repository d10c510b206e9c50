//! In-memory [`RemoteFileStore`].
//!
//! Models the parts of GitLab's behaviour the engine relies on: branches,
//! atomic multi-action commits that fail as a whole, `start_branch` forking
//! and `last_commit_id` guards on single-file writes. No sockets involved.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{CommitResult, FileChange, RemoteFile, RemoteFileStore};
use crate::gitlab::GitLabError;
use crate::reconcile::{ActionKind, ReconciliationRequest};

type FileKey = (String, String, String);

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    last_commit_id: String,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    branches: BTreeSet<(String, String)>,
    files: BTreeMap<FileKey, StoredFile>,
    commits: Vec<ReconciliationRequest>,
    file_writes: Vec<String>,
    reads: Vec<String>,
    failing_reads: BTreeSet<String>,
    commit_failure: Option<String>,
    next_commit: u64,
}

impl MemoryStoreInner {
    fn next_commit_id(&mut self) -> String {
        self.next_commit += 1;
        format!("{:040x}", self.next_commit)
    }

    fn ensure_branch(
        &mut self,
        project: &str,
        branch: &str,
        start_branch: Option<&str>,
    ) -> Result<(), GitLabError> {
        if self.branches.contains(&(project.to_string(), branch.to_string())) {
            return Ok(());
        }
        let Some(start) = start_branch else {
            return Err(GitLabError::Api {
                status: 400,
                message: "You can only create or edit files when you are on a branch".to_string(),
            });
        };
        if !self.branches.contains(&(project.to_string(), start.to_string())) {
            return Err(GitLabError::Api {
                status: 400,
                message: format!("Invalid start_branch {}", start),
            });
        }

        let forked: Vec<(FileKey, StoredFile)> = self
            .files
            .iter()
            .filter(|((p, b, _), _)| p == project && b == start)
            .map(|((p, _, path), file)| ((p.clone(), branch.to_string(), path.clone()), file.clone()))
            .collect();
        self.files.extend(forked);
        self.branches.insert((project.to_string(), branch.to_string()));
        Ok(())
    }

    /// Apply every action or fail on the first invalid one.
    fn apply(&mut self, request: &ReconciliationRequest) -> Result<String, GitLabError> {
        let project = request.project.as_str();
        let branch = request.branch.as_str();
        self.ensure_branch(project, branch, request.start_branch.as_deref())?;
        let commit_id = self.next_commit_id();
        for action in &request.actions {
            let k = key(project, branch, &action.path);
            let exists = self.files.contains_key(&k);
            match action.kind {
                ActionKind::Create if exists => return Err(already_exists()),
                ActionKind::Update | ActionKind::Delete if !exists => {
                    return Err(does_not_exist());
                }
                ActionKind::Delete => {
                    self.files.remove(&k);
                }
                ActionKind::Create | ActionKind::Update => {
                    self.files.insert(
                        k,
                        StoredFile {
                            content: action.content.clone().unwrap_or_default(),
                            last_commit_id: commit_id.clone(),
                        },
                    );
                }
            }
        }
        Ok(commit_id)
    }
}

fn key(project: &str, branch: &str, path: &str) -> FileKey {
    (project.to_string(), branch.to_string(), path.to_string())
}

fn already_exists() -> GitLabError {
    GitLabError::Api {
        status: 400,
        message: "A file with this name already exists".to_string(),
    }
}

fn does_not_exist() -> GitLabError {
    GitLabError::Api {
        status: 400,
        message: "A file with this name doesn't exist".to_string(),
    }
}

/// Shared, cloneable in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an empty branch.
    pub fn with_branch(self, project: &str, branch: &str) -> Self {
        self.lock()
            .branches
            .insert((project.to_string(), branch.to_string()));
        self
    }

    /// Seed a file (and its branch).
    pub fn with_file(
        self,
        project: &str,
        branch: &str,
        path: &str,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        {
            let mut inner = self.lock();
            let last_commit_id = inner.next_commit_id();
            inner
                .branches
                .insert((project.to_string(), branch.to_string()));
            inner.files.insert(
                key(project, branch, path),
                StoredFile {
                    content: content.into(),
                    last_commit_id,
                },
            );
        }
        self
    }

    /// Make every read of `path` fail with a server error.
    pub fn fail_reads_of(self, path: &str) -> Self {
        self.lock().failing_reads.insert(path.to_string());
        self
    }

    /// Make every commit fail with `message`.
    pub fn fail_commits_with(self, message: &str) -> Self {
        self.lock().commit_failure = Some(message.to_string());
        self
    }

    /// Stop failing commits.
    pub fn allow_commits(&self) {
        self.lock().commit_failure = None;
    }

    /// Content of a file, if present.
    pub fn file(&self, project: &str, branch: &str, path: &str) -> Option<Vec<u8>> {
        self.lock()
            .files
            .get(&key(project, branch, path))
            .map(|f| f.content.clone())
    }

    /// Paths present on a branch, in order.
    pub fn paths(&self, project: &str, branch: &str) -> Vec<String> {
        self.lock()
            .files
            .keys()
            .filter(|(p, b, _)| p == project && b == branch)
            .map(|(_, _, path)| path.clone())
            .collect()
    }

    /// Remove a file outside of any commit, simulating out-of-band drift.
    pub fn remove_file(&self, project: &str, branch: &str, path: &str) {
        self.lock().files.remove(&key(project, branch, path));
    }

    /// Every successfully applied commit request.
    pub fn commits(&self) -> Vec<ReconciliationRequest> {
        self.lock().commits.clone()
    }

    /// Single-file writes as `action:path`.
    pub fn file_writes(&self) -> Vec<String> {
        self.lock().file_writes.clone()
    }

    /// Every path read through [`RemoteFileStore::get_file`].
    pub fn reads(&self) -> Vec<String> {
        self.lock().reads.clone()
    }
}

#[async_trait]
impl RemoteFileStore for MemoryStore {
    async fn get_file(
        &self,
        project: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<RemoteFile, GitLabError> {
        let mut inner = self.lock();
        inner.reads.push(path.to_string());
        if inner.failing_reads.contains(path) {
            return Err(GitLabError::Api {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }
        let file = inner
            .files
            .get(&key(project, git_ref, path))
            .ok_or_else(|| GitLabError::NotFound("404 File Not Found".to_string()))?;
        Ok(RemoteFile {
            path: path.to_string(),
            content: file.content.clone(),
            content_sha256: String::new(),
            git_ref: git_ref.to_string(),
            last_commit_id: file.last_commit_id.clone(),
        })
    }

    async fn create_commit(
        &self,
        request: &ReconciliationRequest,
    ) -> Result<CommitResult, GitLabError> {
        let mut inner = self.lock();
        if let Some(message) = &inner.commit_failure {
            return Err(GitLabError::Api {
                status: 400,
                message: message.clone(),
            });
        }

        let snapshot_files = inner.files.clone();
        let snapshot_branches = inner.branches.clone();

        let applied = inner.apply(request);

        match applied {
            Ok(id) => {
                inner.commits.push(request.clone());
                Ok(CommitResult {
                    short_id: id[..8].to_string(),
                    id,
                })
            }
            Err(e) => {
                inner.files = snapshot_files;
                inner.branches = snapshot_branches;
                Err(e)
            }
        }
    }

    async fn create_file(
        &self,
        project: &str,
        path: &str,
        change: &FileChange,
    ) -> Result<(), GitLabError> {
        let mut inner = self.lock();
        inner.ensure_branch(project, &change.branch, change.start_branch.as_deref())?;
        let k = key(project, &change.branch, path);
        if inner.files.contains_key(&k) {
            return Err(already_exists());
        }
        let last_commit_id = inner.next_commit_id();
        inner.files.insert(
            k,
            StoredFile {
                content: change.content.clone().unwrap_or_default(),
                last_commit_id,
            },
        );
        inner.file_writes.push(format!("create:{}", path));
        Ok(())
    }

    async fn update_file(
        &self,
        project: &str,
        path: &str,
        change: &FileChange,
    ) -> Result<(), GitLabError> {
        let mut inner = self.lock();
        let commit_id = inner.next_commit_id();
        let file = inner
            .files
            .get_mut(&key(project, &change.branch, path))
            .ok_or_else(does_not_exist)?;
        if let Some(expected) = &change.last_commit_id
            && expected != &file.last_commit_id
        {
            return Err(GitLabError::Api {
                status: 400,
                message: "You are attempting to update a file that has changed since you started editing it.".to_string(),
            });
        }
        file.content = change.content.clone().unwrap_or_default();
        file.last_commit_id = commit_id;
        inner.file_writes.push(format!("update:{}", path));
        Ok(())
    }

    async fn delete_file(
        &self,
        project: &str,
        path: &str,
        change: &FileChange,
    ) -> Result<(), GitLabError> {
        let mut inner = self.lock();
        let k = key(project, &change.branch, path);
        if inner.files.remove(&k).is_none() {
            return Err(does_not_exist());
        }
        inner.file_writes.push(format!("delete:{}", path));
        Ok(())
    }
}
