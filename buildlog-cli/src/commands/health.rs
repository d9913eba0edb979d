//! Health command handler

use anyhow::Result;
use buildlog_client::BuildLogClient;
use colored::*;

use crate::config::Config;

pub async fn handle_health_command(config: &Config) -> Result<()> {
    let client = BuildLogClient::new(&config.server_url);

    match client.health().await {
        Ok(()) => {
            println!("{} {} is healthy", "✓".green(), client.base_url());
            Ok(())
        }
        Err(e) => {
            println!("{} {} is not reachable", "✗".red(), client.base_url());
            Err(e.into())
        }
    }
}
