//! Commit Action Builder & Submitter.

use tracing::{debug, info};

use super::error::ReconcileError;
use super::progress::{ProgressCallback, ReconcileProgress, emit};
use super::types::{Action, CommitTarget, ReconciliationRequest};
use crate::store::{CommitResult, RemoteFileStore};

/// Whether a commit belongs to the resource's first reconciliation.
///
/// `start_branch` only takes effect when the target branch is created, so it
/// is sent on the initial commit alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    Initial,
    Subsequent,
}

/// Assemble one atomic commit from classified actions.
pub fn build_request(
    target: &CommitTarget,
    actions: Vec<Action>,
    phase: CommitPhase,
) -> ReconciliationRequest {
    ReconciliationRequest {
        project: target.project.clone(),
        branch: target.branch.clone(),
        start_branch: match phase {
            CommitPhase::Initial => target.start_branch.clone(),
            CommitPhase::Subsequent => None,
        },
        author_name: target.author_name.clone(),
        author_email: target.author_email.clone(),
        commit_message: target.commit_message.clone(),
        actions,
    }
}

/// Submit `request` as a single commit.
///
/// Returns `None` without contacting the store when there is nothing to do.
pub async fn submit(
    store: &dyn RemoteFileStore,
    request: &ReconciliationRequest,
    on_progress: Option<&ProgressCallback>,
) -> Result<Option<CommitResult>, ReconcileError> {
    if request.actions.is_empty() {
        debug!(
            project = %request.project,
            branch = %request.branch,
            "Nothing to commit"
        );
        emit(on_progress, ReconcileProgress::NoChanges);
        return Ok(None);
    }

    for action in &request.actions {
        emit(
            on_progress,
            ReconcileProgress::PlannedAction {
                kind: action.kind,
                path: action.path.clone(),
            },
        );
    }
    emit(
        on_progress,
        ReconcileProgress::Committing {
            actions: request.actions.len(),
        },
    );

    let commit = store
        .create_commit(request)
        .await
        .map_err(ReconcileError::RemoteCommit)?;

    info!(
        project = %request.project,
        branch = %request.branch,
        commit = %commit.short_id,
        actions = request.actions.len(),
        "Committed file changes"
    );
    emit(
        on_progress,
        ReconcileProgress::Committed {
            commit_id: commit.id.clone(),
            actions: request.actions.len(),
        },
    );

    Ok(Some(commit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn target() -> CommitTarget {
        CommitTarget {
            project: "p".to_string(),
            branch: "feature".to_string(),
            start_branch: Some("main".to_string()),
            author_name: Some("Bot".to_string()),
            author_email: None,
            commit_message: "sync".to_string(),
        }
    }

    #[test]
    fn test_start_branch_only_on_initial_commit() {
        let initial = build_request(&target(), vec![], CommitPhase::Initial);
        assert_eq!(initial.start_branch.as_deref(), Some("main"));

        let later = build_request(&target(), vec![], CommitPhase::Subsequent);
        assert_eq!(later.start_branch, None);
        assert_eq!(later.author_name.as_deref(), Some("Bot"));
        assert_eq!(later.commit_message, "sync");
    }

    #[tokio::test]
    async fn test_empty_request_issues_no_commit() {
        let store = MemoryStore::new().with_branch("p", "feature");
        let request = build_request(&target(), vec![], CommitPhase::Subsequent);

        assert_eq!(submit(&store, &request, None).await.unwrap(), None);
        assert!(store.commits().is_empty());
    }

    #[tokio::test]
    async fn test_submit_applies_actions_atomically() {
        let store = MemoryStore::new().with_file("p", "main", "old.txt", "x");
        let request = build_request(
            &target(),
            vec![Action::create("new.txt", "n"), Action::delete("old.txt")],
            CommitPhase::Initial,
        );

        let commit = submit(&store, &request, None).await.unwrap();
        assert!(commit.is_some());
        assert_eq!(store.paths("p", "feature"), vec!["new.txt"]);
        assert_eq!(store.paths("p", "main"), vec!["old.txt"]);
        assert_eq!(store.commits(), vec![request]);
    }

    #[tokio::test]
    async fn test_remote_failure_is_surfaced_verbatim() {
        let store = MemoryStore::new()
            .with_branch("p", "feature")
            .fail_commits_with("You are not allowed to push into this branch");
        let request = build_request(
            &target(),
            vec![Action::create("a.txt", "1")],
            CommitPhase::Subsequent,
        );

        let err = submit(&store, &request, None).await.unwrap_err();
        assert!(matches!(err, ReconcileError::RemoteCommit(_)));
        assert!(
            err.to_string()
                .contains("You are not allowed to push into this branch")
        );
        assert!(store.paths("p", "feature").is_empty());
    }
}
