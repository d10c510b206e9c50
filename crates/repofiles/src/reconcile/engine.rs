//! Reconciliation engine.
//!
//! Runs the phases in order: fetch observed state, classify, commit, then
//! re-read the declared paths. Every remote call is awaited before the next
//! one is issued.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use super::commit::{CommitPhase, build_request, submit};
use super::diff::{ActionPlan, classify};
use super::error::ReconcileError;
use super::fetch::{DriftReport, fetch_observed, read_drift};
use super::progress::{ProgressCallback, ReconcileProgress, emit};
use super::types::{CommitTarget, DesiredState, FileSet};
use crate::identity::FilesId;
use crate::store::{CommitResult, RemoteFileStore};

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Identity re-derived from the desired paths.
    pub id: FilesId,
    pub plan: ActionPlan,
    /// `None` when nothing needed to change.
    pub commit: Option<CommitResult>,
    /// Observed state after the commit.
    pub drift: DriftReport,
}

/// Drives reconciliations against one remote store.
pub struct Reconciler<'a> {
    store: &'a dyn RemoteFileStore,
    on_progress: Option<&'a ProgressCallback>,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn RemoteFileStore) -> Self {
        Self {
            store,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: Option<&'a ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    /// Classify the changes needed to reach `desired`.
    ///
    /// `managed` holds paths owned by the resource before this run; those
    /// no longer declared are read as well so they can be deleted.
    #[instrument(skip_all, fields(project = %desired.target.project, branch = %desired.target.branch))]
    pub async fn plan(
        &self,
        desired: &DesiredState,
        managed: &BTreeSet<String>,
    ) -> Result<ActionPlan, ReconcileError> {
        let paths: Vec<&str> = desired
            .files
            .paths()
            .chain(managed.iter().map(String::as_str))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let observed = fetch_observed(
            self.store,
            &desired.target.project,
            &desired.target.branch,
            &paths,
            self.on_progress,
        )
        .await?;

        let plan = classify(&desired.files, &observed);
        debug!(
            creates = plan.creates.len(),
            deletes = plan.deletes.len(),
            updates = plan.updates.len(),
            "Classified file changes"
        );
        emit(
            self.on_progress,
            ReconcileProgress::Classified {
                creates: plan.creates.len(),
                deletes: plan.deletes.len(),
                updates: plan.updates.len(),
            },
        );
        Ok(plan)
    }

    /// Converge the branch to `desired` with at most one commit.
    pub async fn apply(
        &self,
        desired: &DesiredState,
        managed: &BTreeSet<String>,
        phase: CommitPhase,
    ) -> Result<Reconciliation, ReconcileError> {
        let plan = self.plan(desired, managed).await?;
        let request = build_request(&desired.target, plan.clone().into_actions(), phase);
        let commit = submit(self.store, &request, self.on_progress).await?;

        let target = &desired.target;
        let declared: Vec<&str> = desired.files.paths().collect();
        let drift = read_drift(
            self.store,
            &target.project,
            &target.branch,
            &declared,
            self.on_progress,
        )
        .await?;

        Ok(Reconciliation {
            id: FilesId::new(&target.project, &target.branch, desired.files.paths()),
            plan,
            commit,
            drift,
        })
    }

    /// Report the observed state of the paths an identity names.
    pub async fn read(&self, id: &FilesId) -> Result<DriftReport, ReconcileError> {
        let paths: Vec<&str> = id.paths.iter().map(String::as_str).collect();
        read_drift(
            self.store,
            &id.project,
            &id.branch,
            &paths,
            self.on_progress,
        )
        .await
    }

    /// Delete every managed path that still exists.
    ///
    /// Issues no commit when none of them do.
    pub async fn destroy(
        &self,
        target: &CommitTarget,
        managed: &BTreeSet<String>,
    ) -> Result<Option<CommitResult>, ReconcileError> {
        let paths: Vec<&str> = managed.iter().map(String::as_str).collect();
        let observed = fetch_observed(
            self.store,
            &target.project,
            &target.branch,
            &paths,
            self.on_progress,
        )
        .await?;

        let plan = classify(&FileSet::new(), &observed);
        info!(
            project = %target.project,
            branch = %target.branch,
            deletes = plan.deletes.len(),
            "Removing managed files"
        );
        let request = build_request(target, plan.into_actions(), CommitPhase::Subsequent);
        submit(self.store, &request, self.on_progress).await
    }
}
