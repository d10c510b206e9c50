//! repofiles CLI - keep declared files in sync on GitLab branches.

mod commands;
mod config;
mod progress;
mod shutdown;
mod state;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::lifecycle;
use crate::commands::shared::{DEFAULT_MANIFEST, gitlab_client, provider, state_path};

#[derive(Parser)]
#[command(name = "repofiles")]
#[command(version)]
#[command(about = "Declarative file management for GitLab repository branches")]
#[command(
    long_about = "repofiles keeps a declared set of files on a GitLab branch. Each apply reads \
the branch, works out which files to create, delete or update, and lands all of them in a \
single commit. What was applied is recorded in a local state file."
)]
#[command(after_long_help = r#"EXAMPLES
    Show what apply would change:
        $ repofiles plan

    Apply a manifest from another directory:
        $ repofiles --manifest infra/files.toml apply

    Adopt files that already exist on a branch:
        $ repofiles import docs gitlab_repository_files 'group/project:main:README.md,LICENSE'

    Remove everything repofiles manages:
        $ repofiles destroy

CONFIGURATION
    repofiles reads configuration from:
      1. ~/.config/repofiles/config.toml (or $XDG_CONFIG_HOME/repofiles/config.toml)
      2. ./repofiles.toml
      3. Environment variables (REPOFILES_* prefix, e.g., REPOFILES_GITLAB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    REPOFILES_GITLAB_TOKEN    GitLab personal access token
    REPOFILES_GITLAB_HOST     GitLab host (default: https://gitlab.com)
    REPOFILES_GITLAB_TIMEOUT  Request timeout in seconds (default: 30)
    REPOFILES_STATE_PATH      State file (default: repofiles.state.json next to the manifest)
"#)]
struct Cli {
    /// Manifest declaring the managed resources (TOML or JSON)
    #[arg(short, long, global = true, default_value = DEFAULT_MANIFEST)]
    manifest: PathBuf,

    /// State file (overrides config)
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    /// GitLab host (overrides env and config)
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes apply would make
    Plan,
    /// Commit declared files and destroy undeclared resources
    Apply,
    /// Re-read managed resources and update the state file
    Refresh,
    /// Adopt existing remote files into the state file
    Import {
        /// Name to record the resource under
        name: String,
        /// Resource type (gitlab_repository_files or gitlab_repository_file)
        resource_type: String,
        /// Resource identity, e.g. group/project:main:a.txt,b.txt
        id: String,
    },
    /// Delete managed files from their branches
    Destroy {
        /// Resources to destroy (all when omitted)
        names: Vec<String>,
    },
    /// Show which GitLab user the configured token belongs to
    Whoami,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    shutdown::setup_shutdown_handler();

    // Structured logging only when not attached to a TTY
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("repofiles=info,repofiles_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    if let Commands::Whoami = cli.command {
        return commands::whoami::handle_whoami(&config, cli.host).await;
    }

    let state_path = state_path(&config, cli.state, &cli.manifest);
    let provider = provider(gitlab_client(&config, cli.host)?);

    match cli.command {
        Commands::Plan => {
            lifecycle::handle_plan(&provider, &cli.manifest, &state_path).await?;
        }
        Commands::Apply => {
            lifecycle::handle_apply(&provider, &cli.manifest, &state_path).await?;
        }
        Commands::Refresh => {
            lifecycle::handle_refresh(&provider, &state_path).await?;
        }
        Commands::Import {
            name,
            resource_type,
            id,
        } => {
            lifecycle::handle_import(&provider, &state_path, &name, &resource_type, &id).await?;
        }
        Commands::Destroy { names } => {
            lifecycle::handle_destroy(&provider, &state_path, &names).await?;
        }
        Commands::Whoami => {}
    }

    Ok(())
}
