//! Configuration file support for repofiles.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `REPOFILES_`, e.g., `REPOFILES_GITLAB_TOKEN`)
//! 3. Config file (~/.config/repofiles/config.toml or ./repofiles.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [gitlab]
//! host = "https://gitlab.com"  # or self-hosted instance
//! token = "glpat-..."  # or use REPOFILES_GITLAB_TOKEN env var
//! timeout = 30         # seconds
//!
//! [state]
//! path = "repofiles.state.json"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use repofiles::GITLAB_COM;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitLab configuration.
    pub gitlab: GitLabConfig,
    /// State file configuration.
    pub state: StateConfig,
}

/// GitLab configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitLabConfig {
    /// GitLab host (e.g., "gitlab.com" or "https://gitlab.example.com").
    /// Can also be set via REPOFILES_GITLAB_HOST environment variable.
    pub host: Option<String>,
    /// GitLab API token (personal access token).
    /// Can also be set via REPOFILES_GITLAB_TOKEN environment variable.
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout: u64,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            host: Some(GITLAB_COM.to_string()),
            token: None,
            timeout: repofiles::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Where resource state is persisted between runs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Path of the JSON state file.
    /// Defaults to `repofiles.state.json` next to the manifest.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/repofiles/config.toml)
    /// 3. Local config file (./repofiles.toml)
    /// 4. Environment variables with REPOFILES_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("repofiles.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./repofiles.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // REPOFILES_GITLAB_TOKEN -> gitlab.token
        builder = builder.add_source(
            Environment::with_prefix("REPOFILES")
                .prefix_separator("_")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the GitLab host.
    pub fn gitlab_host(&self) -> String {
        self.gitlab
            .host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| GITLAB_COM.to_string())
    }

    /// Get the GitLab token.
    pub fn gitlab_token(&self) -> Option<String> {
        self.gitlab.token.clone().filter(|t| !t.trim().is_empty())
    }

    /// Request timeout, never zero.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.gitlab.timeout.max(1))
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "repofiles").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
