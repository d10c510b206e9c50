use console::style;

use crate::commands::shared::gitlab_client;
use crate::config::Config;

/// Check the configured token by asking GitLab who it belongs to.
pub(crate) async fn handle_whoami(
    config: &Config,
    host: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = gitlab_client(config, host)?;
    let user = client.current_user().await?;

    println!(
        "{} as {} on {}",
        style("Authenticated").green().bold(),
        style(&user.username).bold(),
        client.host()
    );
    if let Some(name) = user.name {
        println!("  name: {}", name);
    }
    println!("  id:   {}", user.id);
    Ok(())
}
