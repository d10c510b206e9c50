use repofiles::ReconcileProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: ReconcileProgress) {
        match event {
            ReconcileProgress::FetchingObserved {
                project,
                branch,
                paths,
            } => {
                tracing::info!(project = %project, branch = %branch, paths, "Reading branch");
            }

            ReconcileProgress::FetchedFile { path, size } => {
                tracing::debug!(path = %path, size, "Fetched file");
            }

            ReconcileProgress::FileAbsent { path } => {
                tracing::debug!(path = %path, "File absent");
            }

            ReconcileProgress::Classified {
                creates,
                deletes,
                updates,
            } => {
                tracing::info!(creates, deletes, updates, "Classified changes");
            }

            ReconcileProgress::NoChanges => {
                tracing::info!("Branch already up to date");
            }

            ReconcileProgress::PlannedAction { kind, path } => {
                tracing::debug!(action = %kind, path = %path, "Planned action");
            }

            ReconcileProgress::Committing { actions } => {
                tracing::info!(actions, "Committing");
            }

            ReconcileProgress::Committed { commit_id, actions } => {
                tracing::info!(commit = %commit_id, actions, "Committed");
            }

            ReconcileProgress::Drift { missing } => {
                tracing::warn!(missing = ?missing, "Declared files missing from branch");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
