//! `gitlab_repository_files`: a set of files on one branch, managed as a unit.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Resource, ResourceError, check_immutable};
use crate::identity::FilesId;
use crate::reconcile::{
    ActionPlan, CommitPhase, CommitTarget, FileBlock, FileSet, FilesRecord, ProgressCallback,
    Reconciler, declared_paths, extract_desired, extract_target,
};
use crate::store::RemoteFileStore;

/// The multi-file resource.
#[derive(Clone)]
pub struct RepositoryFiles {
    store: Arc<dyn RemoteFileStore>,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl RepositoryFiles {
    pub fn new(store: Arc<dyn RemoteFileStore>) -> Self {
        Self {
            store,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: Option<Arc<ProgressCallback>>) -> Self {
        self.on_progress = on_progress;
        self
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.store.as_ref()).with_progress(self.on_progress.as_deref())
    }
}

/// Paths the resource owned according to a prior state record.
///
/// The identity is authoritative; the file blocks cover records written
/// before an id was assigned.
fn managed_paths(state: &FilesRecord) -> Result<BTreeSet<String>, ResourceError> {
    let mut paths = declared_paths(state);
    if let Some(id) = &state.id {
        let id: FilesId = id.parse()?;
        paths.extend(id.paths);
    }
    Ok(paths)
}

fn parse_id(record: &FilesRecord) -> Result<FilesId, ResourceError> {
    let id = record
        .id
        .as_deref()
        .ok_or(ResourceError::MissingRequiredField("id"))?;
    Ok(id.parse()?)
}

/// Render observed files as state blocks.
fn file_blocks(observed: &FileSet) -> Vec<FileBlock> {
    observed
        .iter()
        .map(|(path, content)| FileBlock::new(path, String::from_utf8_lossy(content)))
        .collect()
}

/// Commit target for removing `managed`.
///
/// Imported state carries no commit message, so one is derived from the paths.
fn delete_target(
    state: &FilesRecord,
    managed: &BTreeSet<String>,
) -> Result<CommitTarget, ResourceError> {
    let mut record = state.clone();
    if record.commit_message.as_deref().is_none_or(str::is_empty) {
        let paths: Vec<&str> = managed.iter().map(String::as_str).collect();
        record.commit_message = Some(format!("Delete {}", paths.join(", ")));
    }
    Ok(extract_target(&record)?)
}

fn state_record(config: &FilesRecord, id: &FilesId, observed: &FileSet) -> FilesRecord {
    FilesRecord {
        id: Some(id.to_string()),
        project: Some(id.project.clone()),
        branch: Some(id.branch.clone()),
        file: file_blocks(observed),
        ..config.clone()
    }
}

#[async_trait]
impl Resource for RepositoryFiles {
    type Record = FilesRecord;

    const TYPE_NAME: &'static str = "gitlab_repository_files";

    async fn plan(
        &self,
        prior: Option<&FilesRecord>,
        config: &FilesRecord,
    ) -> Result<ActionPlan, ResourceError> {
        let desired = extract_desired(config)?;
        let managed = match prior {
            Some(prior) => {
                check_immutable("project", &prior.project, &config.project)?;
                check_immutable("branch", &prior.branch, &config.branch)?;
                managed_paths(prior)?
            }
            None => BTreeSet::new(),
        };
        Ok(self.reconciler().plan(&desired, &managed).await?)
    }

    async fn create(&self, config: &FilesRecord) -> Result<FilesRecord, ResourceError> {
        let desired = extract_desired(config)?;
        let outcome = self
            .reconciler()
            .apply(&desired, &BTreeSet::new(), CommitPhase::Initial)
            .await?;

        info!(id = %outcome.id, changes = outcome.plan.len(), "Created repository files");
        Ok(state_record(config, &outcome.id, &outcome.drift.observed))
    }

    async fn read(&self, state: &FilesRecord) -> Result<Option<FilesRecord>, ResourceError> {
        let id = parse_id(state)?;
        let report = self.reconciler().read(&id).await?;
        debug!(id = %id, missing = report.missing.len(), "Read repository files");
        Ok(Some(state_record(state, &id, &report.observed)))
    }

    async fn update(
        &self,
        prior: &FilesRecord,
        config: &FilesRecord,
    ) -> Result<FilesRecord, ResourceError> {
        check_immutable("project", &prior.project, &config.project)?;
        check_immutable("branch", &prior.branch, &config.branch)?;

        let desired = extract_desired(config)?;
        let managed = managed_paths(prior)?;
        let outcome = self
            .reconciler()
            .apply(&desired, &managed, CommitPhase::Subsequent)
            .await?;

        info!(id = %outcome.id, changes = outcome.plan.len(), "Updated repository files");
        Ok(state_record(config, &outcome.id, &outcome.drift.observed))
    }

    async fn delete(&self, state: &FilesRecord) -> Result<(), ResourceError> {
        let managed = managed_paths(state)?;
        let target = delete_target(state, &managed)?;
        let commit = self.reconciler().destroy(&target, &managed).await?;
        if commit.is_none() {
            debug!(project = %target.project, branch = %target.branch, "Managed files already absent");
        }
        Ok(())
    }

    async fn import(&self, id: &str) -> Result<Option<FilesRecord>, ResourceError> {
        let id: FilesId = id.parse()?;
        let record = FilesRecord {
            id: Some(id.to_string()),
            project: Some(id.project.clone()),
            branch: Some(id.branch.clone()),
            file: id
                .paths
                .iter()
                .map(|path| FileBlock {
                    file_path: Some(path.clone()),
                    content: None,
                })
                .collect(),
            ..Default::default()
        };
        self.read(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Action;
    use crate::store::MemoryStore;

    fn config(files: &[(&str, &str)]) -> FilesRecord {
        FilesRecord {
            project: Some("group/proj".to_string()),
            branch: Some("main".to_string()),
            commit_message: Some("manage files".to_string()),
            file: files
                .iter()
                .map(|(path, content)| FileBlock::new(*path, *content))
                .collect(),
            ..Default::default()
        }
    }

    fn resource(store: &MemoryStore) -> RepositoryFiles {
        RepositoryFiles::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_create_sets_id_and_observed_files() {
        let store = MemoryStore::new().with_branch("group/proj", "main");
        let state = resource(&store)
            .create(&config(&[("b.txt", "2"), ("a.txt", "1")]))
            .await
            .unwrap();

        assert_eq!(state.id.as_deref(), Some("group/proj:main:a.txt,b.txt"));
        assert_eq!(
            state.file,
            vec![FileBlock::new("a.txt", "1"), FileBlock::new("b.txt", "2")]
        );
        assert_eq!(state.commit_message.as_deref(), Some("manage files"));
    }

    #[tokio::test]
    async fn test_create_with_missing_branch_makes_no_request() {
        let store = MemoryStore::new();
        let mut cfg = config(&[("a.txt", "1")]);
        cfg.branch = None;

        let err = resource(&store).create(&cfg).await.unwrap_err();
        assert!(matches!(err, ResourceError::MissingRequiredField("branch")));
        assert!(store.reads().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_start_branch_forks_branch() {
        let store = MemoryStore::new().with_file("group/proj", "main", "base.txt", "b");
        let mut cfg = config(&[("a.txt", "1")]);
        cfg.branch = Some("feature".to_string());
        cfg.start_branch = Some("main".to_string());

        resource(&store).create(&cfg).await.unwrap();

        assert_eq!(store.paths("group/proj", "feature"), vec!["a.txt", "base.txt"]);
        assert_eq!(store.commits()[0].start_branch.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn test_update_removing_declaration_deletes_file() {
        let store = MemoryStore::new().with_branch("group/proj", "main");
        let res = resource(&store);
        let prior = res
            .create(&config(&[("a.txt", "1"), ("b.txt", "2")]))
            .await
            .unwrap();

        let state = res.update(&prior, &config(&[("b.txt", "2")])).await.unwrap();

        assert_eq!(state.id.as_deref(), Some("group/proj:main:b.txt"));
        assert_eq!(store.paths("group/proj", "main"), vec!["b.txt"]);
        assert_eq!(store.commits()[1].actions, vec![Action::delete("a.txt")]);
        assert_eq!(store.commits()[1].start_branch, None);
    }

    #[tokio::test]
    async fn test_update_rejects_branch_change() {
        let store = MemoryStore::new().with_branch("group/proj", "main");
        let res = resource(&store);
        let prior = res.create(&config(&[("a.txt", "1")])).await.unwrap();

        let mut cfg = config(&[("a.txt", "1")]);
        cfg.branch = Some("other".to_string());
        let err = res.update(&prior, &cfg).await.unwrap_err();
        assert!(matches!(err, ResourceError::ImmutableField { field: "branch", .. }));
    }

    #[tokio::test]
    async fn test_read_drops_files_deleted_out_of_band() {
        let store = MemoryStore::new().with_branch("group/proj", "main");
        let res = resource(&store);
        let state = res
            .create(&config(&[("a.txt", "1"), ("b.txt", "2")]))
            .await
            .unwrap();
        store.remove_file("group/proj", "main", "a.txt");

        let read = res.read(&state).await.unwrap().unwrap();
        assert_eq!(read.file, vec![FileBlock::new("b.txt", "2")]);
        assert_eq!(read.id, state.id);
    }

    #[tokio::test]
    async fn test_read_rejects_malformed_id() {
        let store = MemoryStore::new();
        let mut state = config(&[]);
        state.id = Some("group/proj".to_string());

        let err = resource(&store).read(&state).await.unwrap_err();
        assert!(matches!(err, ResourceError::MalformedIdentity(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_only_existing_managed_files() {
        let store = MemoryStore::new()
            .with_file("group/proj", "main", "a.txt", "1")
            .with_file("group/proj", "main", "other.txt", "o");
        let mut state = config(&[("a.txt", "1")]);
        state.id = Some("group/proj:main:a.txt,gone.txt".to_string());

        resource(&store).delete(&state).await.unwrap();

        assert_eq!(store.paths("group/proj", "main"), vec!["other.txt"]);
        assert_eq!(store.commits()[0].actions, vec![Action::delete("a.txt")]);
    }

    #[tokio::test]
    async fn test_imported_resource_can_be_deleted() {
        let store = MemoryStore::new()
            .with_file("group/proj", "main", "a.txt", "1")
            .with_file("group/proj", "main", "b.txt", "2")
            .with_file("group/proj", "main", "keep.txt", "k");
        let res = resource(&store);

        let state = res
            .import("group/proj:main:a.txt,b.txt")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.commit_message, None);

        res.delete(&state).await.unwrap();

        assert_eq!(store.paths("group/proj", "main"), vec!["keep.txt"]);
        let commits = store.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].commit_message, "Delete a.txt, b.txt");
    }

    #[tokio::test]
    async fn test_import_fills_content_from_remote() {
        let store = MemoryStore::new()
            .with_file("group/proj", "main", "a.txt", "1")
            .with_file("group/proj", "main", "dir/b:c.txt", "2");

        let state = resource(&store)
            .import("group/proj:main:dir/b:c.txt,a.txt")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(state.project.as_deref(), Some("group/proj"));
        assert_eq!(state.branch.as_deref(), Some("main"));
        assert_eq!(
            state.file,
            vec![FileBlock::new("a.txt", "1"), FileBlock::new("dir/b:c.txt", "2")]
        );
        assert_eq!(state.id.as_deref(), Some("group/proj:main:a.txt,dir/b:c.txt"));
    }

    #[tokio::test]
    async fn test_plan_does_not_commit() {
        let store = MemoryStore::new().with_file("group/proj", "main", "a.txt", "old");
        let plan = resource(&store)
            .plan(None, &config(&[("a.txt", "new"), ("b.txt", "2")]))
            .await
            .unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.updates[0].path, "a.txt");
        assert!(store.commits().is_empty());
    }
}
