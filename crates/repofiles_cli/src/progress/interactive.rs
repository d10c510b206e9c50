use console::{Term, style};
use repofiles::{ActionKind, ReconcileProgress};

/// Interactive reporter printing styled status lines.
///
/// Per-file events stay quiet; only phase changes and the outcome are shown.
pub struct InteractiveReporter {
    term: Term,
}

impl InteractiveReporter {
    pub fn new(term: Term) -> Self {
        Self { term }
    }

    pub fn handle(&self, event: ReconcileProgress) {
        if let Some(line) = Self::render(&event) {
            // Lost status lines are not worth failing the run over.
            let _ = self.term.write_line(&line);
        }
    }

    fn render(event: &ReconcileProgress) -> Option<String> {
        let line = match event {
            ReconcileProgress::FetchingObserved {
                project,
                branch,
                paths,
            } => format!(
                "{} {}@{} ({} paths)",
                style("Reading").cyan().bold(),
                project,
                branch,
                paths
            ),
            ReconcileProgress::PlannedAction { kind, path } => {
                let label = match kind {
                    ActionKind::Create => style("  + create").green(),
                    ActionKind::Delete => style("  - delete").red(),
                    ActionKind::Update => style("  ~ update").yellow(),
                };
                format!("{} {}", label, path)
            }
            ReconcileProgress::NoChanges => format!("{}", style("No changes").dim()),
            ReconcileProgress::Committing { actions } => {
                format!("{} {} action(s)", style("Committing").cyan().bold(), actions)
            }
            ReconcileProgress::Committed { commit_id, .. } => {
                let short = commit_id.get(..8).unwrap_or(commit_id.as_str());
                format!("{} {}", style("Committed").green().bold(), short)
            }
            ReconcileProgress::Drift { missing } => format!(
                "{} missing from branch: {}",
                style("Drift").yellow().bold(),
                missing.join(", ")
            ),
            _ => return None,
        };
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(event: ReconcileProgress) -> Option<String> {
        InteractiveReporter::render(&event).map(|s| console::strip_ansi_codes(&s).into_owned())
    }

    #[test]
    fn test_render_planned_actions() {
        assert_eq!(
            plain(ReconcileProgress::PlannedAction {
                kind: ActionKind::Delete,
                path: "a.txt".to_string()
            }),
            Some("  - delete a.txt".to_string())
        );
    }

    #[test]
    fn test_render_shortens_commit_id() {
        assert_eq!(
            plain(ReconcileProgress::Committed {
                commit_id: "0123456789abcdef".to_string(),
                actions: 2
            }),
            Some("Committed 01234567".to_string())
        );
    }

    #[test]
    fn test_per_file_events_are_quiet() {
        assert_eq!(
            plain(ReconcileProgress::FetchedFile {
                path: "a.txt".to_string(),
                size: 1
            }),
            None
        );
    }
}
