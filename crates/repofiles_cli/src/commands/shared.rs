use std::path::{Path, PathBuf};
use std::sync::Arc;

use repofiles::{GitLabClient, Provider};

use crate::config::Config;
use crate::progress::ProgressReporter;

/// Default manifest file name.
pub(crate) const DEFAULT_MANIFEST: &str = "manifest.toml";

/// Default state file name, placed next to the manifest.
pub(crate) const DEFAULT_STATE_FILE: &str = "repofiles.state.json";

/// Build a GitLab client. Host resolution: CLI arg > env > config > default.
pub(crate) fn gitlab_client(
    config: &Config,
    host: Option<String>,
) -> Result<GitLabClient, Box<dyn std::error::Error>> {
    let host = host.unwrap_or_else(|| config.gitlab_host());
    let token = config.gitlab_token().ok_or(
        "REPOFILES_GITLAB_TOKEN must be set in environment, .env file, or config file",
    )?;
    tracing::debug!(host = %host, "Using GitLab host");
    Ok(GitLabClient::new(&host, &token, config.timeout())?)
}

/// Provider over the GitLab client, reporting progress to the terminal or log.
pub(crate) fn provider(client: GitLabClient) -> Provider {
    let reporter = Arc::new(ProgressReporter::new());
    Provider::with_progress(Arc::new(client), Some(reporter.as_callback()))
}

/// State file path: CLI arg > config > next to the manifest.
pub(crate) fn state_path(config: &Config, state: Option<PathBuf>, manifest: &Path) -> PathBuf {
    state
        .or_else(|| config.state.path.clone())
        .unwrap_or_else(|| {
            manifest
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(DEFAULT_STATE_FILE)
        })
}
