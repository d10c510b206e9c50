//! plan / apply / refresh / import / destroy over a manifest and a state file.
//!
//! The state file is saved after every resource that changed remotely, so an
//! error or Ctrl+C part way through never loses track of a commit that landed.

use std::path::Path;

use console::style;
use repofiles::{ActionPlan, Provider, ResourceError};
use serde_json::Value;

use crate::shutdown::is_shutdown_requested;
use crate::state::{Manifest, ManifestEntry, StateEntry, StateFile};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// What `apply` would do to one resource.
#[derive(Debug, PartialEq)]
pub(crate) enum Change {
    /// Not in state yet.
    Create(ActionPlan),
    /// Already managed under the same type.
    Update(ActionPlan),
    /// The type or an identity field changed: the old one is destroyed first.
    Replace { reason: String, plan: ActionPlan },
    /// In state but no longer declared.
    Destroy,
}

#[derive(Debug)]
pub(crate) struct ResourcePlan {
    pub name: String,
    pub resource_type: String,
    pub change: Change,
}

impl ResourcePlan {
    fn is_noop(&self) -> bool {
        match &self.change {
            Change::Update(plan) => plan.is_empty(),
            _ => false,
        }
    }
}

/// Outcome counters for `apply`.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ApplySummary {
    pub applied: usize,
    pub destroyed: usize,
    pub interrupted: bool,
}

/// Plan every declared resource, plus destruction of undeclared ones.
pub(crate) async fn plan_all(
    provider: &Provider,
    manifest: &Manifest,
    state: &StateFile,
) -> CliResult<Vec<ResourcePlan>> {
    let mut plans = Vec::new();

    for (name, entry) in &manifest.resources {
        let change = match state.get(name) {
            None => Change::Create(plan_fresh(provider, name, entry).await?),
            Some(prior) if prior.resource_type != entry.resource_type => Change::Replace {
                reason: format!("was {}", prior.resource_type),
                plan: plan_fresh(provider, name, entry).await?,
            },
            Some(prior) => match provider
                .plan(
                    &entry.resource_type,
                    Some(prior.state.clone()),
                    entry.config.clone(),
                )
                .await
            {
                Ok(plan) => Change::Update(plan),
                Err(e @ ResourceError::ImmutableField { .. }) => Change::Replace {
                    reason: e.to_string(),
                    plan: plan_fresh(provider, name, entry).await?,
                },
                Err(e) => return Err(format!("{}: {}", name, e).into()),
            },
        };
        plans.push(ResourcePlan {
            name: name.clone(),
            resource_type: entry.resource_type.clone(),
            change,
        });
    }

    for (name, entry) in &state.resources {
        if !manifest.resources.contains_key(name) {
            plans.push(ResourcePlan {
                name: name.clone(),
                resource_type: entry.resource_type.clone(),
                change: Change::Destroy,
            });
        }
    }

    Ok(plans)
}

/// Plan a resource as if nothing were managed yet.
async fn plan_fresh(
    provider: &Provider,
    name: &str,
    entry: &ManifestEntry,
) -> CliResult<ActionPlan> {
    Ok(provider
        .plan(&entry.resource_type, None, entry.config.clone())
        .await
        .map_err(|e| format!("{}: {}", name, e))?)
}

async fn create(provider: &Provider, name: &str, entry: &ManifestEntry) -> CliResult<Value> {
    Ok(provider
        .create(&entry.resource_type, entry.config.clone())
        .await
        .map_err(|e| format!("{}: {}", name, e))?)
}

/// Destroy `prior` and create `entry` in its place.
async fn replace(
    provider: &Provider,
    state: &mut StateFile,
    state_path: &Path,
    name: &str,
    prior: StateEntry,
    entry: &ManifestEntry,
    reason: &str,
) -> CliResult<Value> {
    tracing::info!(resource = %name, reason = %reason, "Replacing resource");
    provider
        .delete(&prior.resource_type, prior.state)
        .await
        .map_err(|e| format!("{}: {}", name, e))?;
    state.remove(name);
    state.save(state_path)?;
    create(provider, name, entry).await
}

/// Bring every declared resource in line and destroy undeclared ones.
pub(crate) async fn apply_all(
    provider: &Provider,
    manifest: &Manifest,
    state: &mut StateFile,
    state_path: &Path,
) -> CliResult<ApplySummary> {
    let mut summary = ApplySummary::default();

    for (name, entry) in &manifest.resources {
        if is_shutdown_requested() {
            summary.interrupted = true;
            return Ok(summary);
        }

        let new_state = match state.get(name).cloned() {
            None => create(provider, name, entry).await?,
            Some(prior) if prior.resource_type != entry.resource_type => {
                let reason = format!("type changed from {}", prior.resource_type);
                replace(provider, state, state_path, name, prior, entry, &reason).await?
            }
            // Identity fields are checked before any remote call, so a
            // rejected update has changed nothing.
            Some(prior) => match provider
                .update(&entry.resource_type, prior.state.clone(), entry.config.clone())
                .await
            {
                Ok(updated) => updated,
                Err(e @ ResourceError::ImmutableField { .. }) => {
                    let reason = e.to_string();
                    replace(provider, state, state_path, name, prior, entry, &reason).await?
                }
                Err(e) => return Err(format!("{}: {}", name, e).into()),
            },
        };

        state.set(name, &entry.resource_type, new_state);
        state.save(state_path)?;
        summary.applied += 1;
    }

    let undeclared: Vec<String> = state
        .resources
        .keys()
        .filter(|name| !manifest.resources.contains_key(*name))
        .cloned()
        .collect();
    summary.destroyed = destroy_named(provider, state, state_path, &undeclared).await?;
    summary.interrupted = summary.destroyed < undeclared.len();

    Ok(summary)
}

/// Re-read every managed resource. Resources that no longer exist are dropped.
///
/// Returns the names that were dropped. The state file is only written once
/// every read succeeded.
pub(crate) async fn refresh_all(
    provider: &Provider,
    state: &mut StateFile,
    state_path: &Path,
) -> CliResult<Vec<String>> {
    let mut dropped = Vec::new();
    let mut refreshed = StateFile::default();

    for (name, entry) in &state.resources {
        match provider
            .read(&entry.resource_type, entry.state.clone())
            .await
            .map_err(|e| format!("{}: {}", name, e))?
        {
            Some(current) => refreshed.set(name, &entry.resource_type, current),
            None => {
                tracing::warn!(resource = %name, "Resource no longer exists, dropping from state");
                dropped.push(name.clone());
            }
        }
    }

    refreshed.save(state_path)?;
    *state = refreshed;
    Ok(dropped)
}

/// Adopt an existing remote object under `name`.
pub(crate) async fn import_one(
    provider: &Provider,
    state: &mut StateFile,
    state_path: &Path,
    name: &str,
    resource_type: &str,
    id: &str,
) -> CliResult<()> {
    if state.get(name).is_some() {
        return Err(format!("{} is already managed; destroy or rename it first", name).into());
    }

    let imported = provider
        .import(resource_type, id)
        .await?
        .ok_or_else(|| format!("{} {} not found", resource_type, id))?;

    state.set(name, resource_type, imported);
    state.save(state_path)?;
    Ok(())
}

/// Delete the named resources (all of them when `names` is empty).
pub(crate) async fn destroy(
    provider: &Provider,
    state: &mut StateFile,
    state_path: &Path,
    names: &[String],
) -> CliResult<usize> {
    let targets: Vec<String> = if names.is_empty() {
        state.resources.keys().cloned().collect()
    } else {
        if let Some(unknown) = names.iter().find(|n| state.get(n).is_none()) {
            return Err(format!("{} is not in the state file", unknown).into());
        }
        names.to_vec()
    };

    destroy_named(provider, state, state_path, &targets).await
}

async fn destroy_named(
    provider: &Provider,
    state: &mut StateFile,
    state_path: &Path,
    names: &[String],
) -> CliResult<usize> {
    let mut destroyed = 0;

    for name in names {
        if is_shutdown_requested() {
            break;
        }
        let Some(entry) = state.get(name).cloned() else {
            continue;
        };
        provider
            .delete(&entry.resource_type, entry.state)
            .await
            .map_err(|e| format!("{}: {}", name, e))?;
        state.remove(name);
        state.save(state_path)?;
        destroyed += 1;
    }

    Ok(destroyed)
}

fn print_action_plan(plan: &ActionPlan) {
    for entry in &plan.creates {
        println!("    {} {}", style("+").green(), entry.path);
    }
    for path in &plan.deletes {
        println!("    {} {}", style("-").red(), path);
    }
    for entry in &plan.updates {
        println!("    {} {}", style("~").yellow(), entry.path);
    }
}

fn print_plan(plans: &[ResourcePlan]) {
    let mut pending = 0;

    for plan in plans {
        let header = format!("{} ({})", style(&plan.name).bold(), plan.resource_type);
        match &plan.change {
            Change::Update(actions) if actions.is_empty() => {
                println!("{}: {}", header, style("no changes").dim());
            }
            Change::Create(actions) | Change::Update(actions) => {
                let verb = match &plan.change {
                    Change::Create(_) => style("create").green(),
                    _ => style("update").yellow(),
                };
                println!("{}: {}, {} file change(s)", header, verb, actions.len());
                print_action_plan(actions);
            }
            Change::Replace { reason, plan } => {
                println!(
                    "{}: {} ({}), {} file change(s)",
                    header,
                    style("replace").magenta(),
                    reason,
                    plan.len()
                );
                print_action_plan(plan);
            }
            Change::Destroy => {
                println!("{}: {}", header, style("destroy").red());
            }
        }
        if !plan.is_noop() {
            pending += 1;
        }
    }

    if pending == 0 {
        println!("\nEverything is up to date.");
    } else {
        println!("\n{} resource(s) to change.", pending);
    }
}

pub(crate) async fn handle_plan(
    provider: &Provider,
    manifest_path: &Path,
    state_path: &Path,
) -> CliResult<()> {
    let manifest = Manifest::load(manifest_path)?;
    let state = StateFile::load(state_path)?;
    let plans = plan_all(provider, &manifest, &state).await?;
    print_plan(&plans);
    Ok(())
}

pub(crate) async fn handle_apply(
    provider: &Provider,
    manifest_path: &Path,
    state_path: &Path,
) -> CliResult<()> {
    let manifest = Manifest::load(manifest_path)?;
    let mut state = StateFile::load(state_path)?;
    let summary = apply_all(provider, &manifest, &mut state, state_path).await?;

    if summary.interrupted {
        println!(
            "{} after {} applied, {} destroyed.",
            style("Interrupted").yellow().bold(),
            summary.applied,
            summary.destroyed
        );
    } else {
        println!(
            "{} {} applied, {} destroyed.",
            style("Apply complete:").green().bold(),
            summary.applied,
            summary.destroyed
        );
    }
    Ok(())
}

pub(crate) async fn handle_refresh(provider: &Provider, state_path: &Path) -> CliResult<()> {
    let mut state = StateFile::load(state_path)?;
    let dropped = refresh_all(provider, &mut state, state_path).await?;

    println!(
        "{} {} resource(s) in state.",
        style("Refreshed").green().bold(),
        state.resources.len()
    );
    for name in dropped {
        println!("  {} {} (gone)", style("-").red(), name);
    }
    Ok(())
}

pub(crate) async fn handle_import(
    provider: &Provider,
    state_path: &Path,
    name: &str,
    resource_type: &str,
    id: &str,
) -> CliResult<()> {
    let mut state = StateFile::load(state_path)?;
    import_one(provider, &mut state, state_path, name, resource_type, id).await?;
    println!("{} {} as {}", style("Imported").green().bold(), id, name);
    Ok(())
}

pub(crate) async fn handle_destroy(
    provider: &Provider,
    state_path: &Path,
    names: &[String],
) -> CliResult<()> {
    let mut state = StateFile::load(state_path)?;
    let destroyed = destroy(provider, &mut state, state_path, names).await?;
    println!(
        "{} {} resource(s).",
        style("Destroyed").red().bold(),
        destroyed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use repofiles::MemoryStore;
    use serde_json::{Value, json};

    use super::*;
    use crate::state::ManifestEntry;

    const FILES: &str = "gitlab_repository_files";

    fn scratch_state(label: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock should be after epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("repofiles-cli-{label}-{nonce}"));
        std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
        dir.join("state.json")
    }

    fn files_config(files: &[(&str, &str)]) -> Value {
        json!({
            "project": "group/proj",
            "branch": "main",
            "commit_message": "sync",
            "file": files
                .iter()
                .map(|(path, content)| json!({ "file_path": path, "content": content }))
                .collect::<Vec<_>>(),
        })
    }

    fn manifest(entries: &[(&str, Value)]) -> Manifest {
        Manifest {
            resources: entries
                .iter()
                .map(|(name, config)| {
                    (
                        name.to_string(),
                        ManifestEntry {
                            resource_type: FILES.to_string(),
                            config: config.clone(),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn setup() -> (MemoryStore, Provider) {
        let store = MemoryStore::new().with_branch("group/proj", "main");
        let provider = Provider::new(Arc::new(store.clone()));
        (store, provider)
    }

    #[tokio::test]
    async fn test_apply_creates_then_updates_and_persists_state() {
        let (store, provider) = setup();
        let path = scratch_state("apply");
        let mut state = StateFile::default();

        let first = manifest(&[("docs", files_config(&[("a.txt", "1")]))]);
        let summary = apply_all(&provider, &first, &mut state, &path).await.unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(StateFile::load(&path).unwrap(), state);
        assert_eq!(state.get("docs").unwrap().state["id"], "group/proj:main:a.txt");

        let second = manifest(&[("docs", files_config(&[("b.txt", "2")]))]);
        apply_all(&provider, &second, &mut state, &path).await.unwrap();
        assert_eq!(store.paths("group/proj", "main"), vec!["b.txt"]);
        assert_eq!(store.commits().len(), 2);
    }

    #[tokio::test]
    async fn test_plan_reports_create_then_noop() {
        let (_, provider) = setup();
        let path = scratch_state("plan");
        let mut state = StateFile::default();
        let declared = manifest(&[("docs", files_config(&[("a.txt", "1")]))]);

        let plans = plan_all(&provider, &declared, &state).await.unwrap();
        assert!(matches!(plans[0].change, Change::Create(ref p) if p.creates.len() == 1));

        apply_all(&provider, &declared, &mut state, &path).await.unwrap();
        let plans = plan_all(&provider, &declared, &state).await.unwrap();
        assert!(plans[0].is_noop());
    }

    #[tokio::test]
    async fn test_undeclared_resources_are_destroyed() {
        let (store, provider) = setup();
        let path = scratch_state("undeclared");
        let mut state = StateFile::default();

        let both = manifest(&[
            ("docs", files_config(&[("a.txt", "1")])),
            ("extra", files_config(&[("z.txt", "9")])),
        ]);
        apply_all(&provider, &both, &mut state, &path).await.unwrap();

        let one = manifest(&[("docs", files_config(&[("a.txt", "1")]))]);
        let plans = plan_all(&provider, &one, &state).await.unwrap();
        assert!(
            plans
                .iter()
                .any(|p| p.name == "extra" && p.change == Change::Destroy)
        );

        let summary = apply_all(&provider, &one, &mut state, &path).await.unwrap();
        assert_eq!(summary.destroyed, 1);
        assert!(state.get("extra").is_none());
        assert_eq!(store.paths("group/proj", "main"), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_failed_apply_keeps_previous_state() {
        let store = MemoryStore::new()
            .with_branch("group/proj", "main")
            .fail_commits_with("403 Forbidden");
        let provider = Provider::new(Arc::new(store));
        let path = scratch_state("failed");
        let mut state = StateFile::default();

        let declared = manifest(&[("docs", files_config(&[("a.txt", "1")]))]);
        let err = apply_all(&provider, &declared, &mut state, &path)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("docs: "));
        assert!(state.resources.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_refresh_drops_vanished_single_file() {
        let (store, provider) = setup();
        let path = scratch_state("refresh");
        let mut state = StateFile::default();

        let created = provider
            .create(
                "gitlab_repository_file",
                json!({
                    "project": "group/proj",
                    "branch": "main",
                    "file_path": "README.md",
                    "content": "aGk=",
                    "commit_message": "readme"
                }),
            )
            .await
            .unwrap();
        state.set("readme", "gitlab_repository_file", created);
        store.remove_file("group/proj", "main", "README.md");

        let dropped = refresh_all(&provider, &mut state, &path).await.unwrap();
        assert_eq!(dropped, vec!["readme".to_string()]);
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn test_import_then_destroy() {
        let store = MemoryStore::new().with_file("group/proj", "main", "a.txt", "1");
        let provider = Provider::new(Arc::new(store.clone()));
        let path = scratch_state("import");
        let mut state = StateFile::default();

        import_one(&provider, &mut state, &path, "docs", FILES, "group/proj:main:a.txt")
            .await
            .unwrap();
        assert_eq!(state.get("docs").unwrap().state["file"][0]["content"], "1");

        let again =
            import_one(&provider, &mut state, &path, "docs", FILES, "group/proj:main:a.txt").await;
        assert!(again.is_err());

        let destroyed = destroy(&provider, &mut state, &path, &[]).await.unwrap();
        assert_eq!(destroyed, 1);
        assert!(store.paths("group/proj", "main").is_empty());
    }

    #[tokio::test]
    async fn test_branch_change_replaces_resource() {
        let store = MemoryStore::new()
            .with_branch("group/proj", "main")
            .with_branch("group/proj", "dev");
        let provider = Provider::new(Arc::new(store.clone()));
        let path = scratch_state("replace-branch");
        let mut state = StateFile::default();

        let on_main = manifest(&[("docs", files_config(&[("a.txt", "1")]))]);
        apply_all(&provider, &on_main, &mut state, &path).await.unwrap();

        let mut config = files_config(&[("a.txt", "1")]);
        config["branch"] = json!("dev");
        let on_dev = manifest(&[("docs", config)]);

        let plans = plan_all(&provider, &on_dev, &state).await.unwrap();
        match &plans[0].change {
            Change::Replace { reason, plan } => {
                assert!(reason.contains("branch"));
                assert_eq!(plan.creates.len(), 1);
            }
            other => panic!("expected a replacement, got {:?}", other),
        }

        let summary = apply_all(&provider, &on_dev, &mut state, &path).await.unwrap();
        assert_eq!(summary.applied, 1);
        assert!(store.paths("group/proj", "main").is_empty());
        assert_eq!(store.paths("group/proj", "dev"), vec!["a.txt"]);
        assert_eq!(state.get("docs").unwrap().state["id"], "group/proj:dev:a.txt");
        assert_eq!(StateFile::load(&path).unwrap(), state);
    }

    #[tokio::test]
    async fn test_destroy_unknown_name_is_rejected() {
        let (_, provider) = setup();
        let path = scratch_state("destroy-unknown");
        let mut state = StateFile::default();

        let err = destroy(&provider, &mut state, &path, &["nope".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "nope is not in the state file");
    }
}
