//! Observed-State Fetcher and Drift Reader.
//!
//! The remote store has no batch existence check, so each path costs one
//! request. Requests are awaited one after another.

use tracing::{debug, warn};

use super::error::ReconcileError;
use super::progress::{ProgressCallback, ReconcileProgress, emit};
use super::types::{FileEntry, FileSet};
use crate::store::RemoteFileStore;

/// Read the current content of every path in `paths` on `branch`.
///
/// Paths that do not exist are left out of the result. Any other failure
/// aborts the read.
pub async fn fetch_observed(
    store: &dyn RemoteFileStore,
    project: &str,
    branch: &str,
    paths: &[&str],
    on_progress: Option<&ProgressCallback>,
) -> Result<FileSet, ReconcileError> {
    emit(
        on_progress,
        ReconcileProgress::FetchingObserved {
            project: project.to_string(),
            branch: branch.to_string(),
            paths: paths.len(),
        },
    );

    let mut observed = FileSet::new();
    for &path in paths {
        match store.get_file(project, path, branch).await {
            Ok(file) => {
                debug!(project, branch, path, size = file.content.len(), "Fetched file");
                emit(
                    on_progress,
                    ReconcileProgress::FetchedFile {
                        path: path.to_string(),
                        size: file.content.len(),
                    },
                );
                observed.insert(FileEntry::new(path, file.content));
            }
            Err(e) if e.is_not_found() => {
                debug!(project, branch, path, "File not present on branch");
                emit(
                    on_progress,
                    ReconcileProgress::FileAbsent {
                        path: path.to_string(),
                    },
                );
            }
            Err(source) => {
                return Err(ReconcileError::Fetch {
                    path: path.to_string(),
                    source,
                });
            }
        }
    }

    Ok(observed)
}

/// Observed state of a resource's declared paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// Files that currently exist.
    pub observed: FileSet,
    /// Declared paths that no longer exist on the branch.
    pub missing: Vec<String>,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Re-read every declared path to report the resource's observed state.
///
/// Missing paths are reported, never raised.
pub async fn read_drift(
    store: &dyn RemoteFileStore,
    project: &str,
    branch: &str,
    paths: &[&str],
    on_progress: Option<&ProgressCallback>,
) -> Result<DriftReport, ReconcileError> {
    let observed = fetch_observed(store, project, branch, paths, on_progress).await?;
    let missing: Vec<String> = paths
        .iter()
        .filter(|p| !observed.contains_path(p))
        .map(|p| p.to_string())
        .collect();

    if !missing.is_empty() {
        warn!(project, branch, missing = ?missing, "Declared files missing from branch");
        emit(
            on_progress,
            ReconcileProgress::Drift {
                missing: missing.clone(),
            },
        );
    }

    Ok(DriftReport { observed, missing })
}
