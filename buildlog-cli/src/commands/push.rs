//! Push command handlers
//!
//! Loads builds, execution units and step logs from files and stores them in
//! the server registry.

use anyhow::{Context, Result};
use buildlog_client::BuildLogClient;
use buildlog_core::domain::build::Build;
use buildlog_core::domain::unit::ExecutionUnit;
use clap::Subcommand;
use colored::*;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Push subcommands
#[derive(Subcommand, Debug)]
pub enum PushCommands {
    /// Create or replace a build from a JSON file
    Build {
        /// Path to the build JSON
        file: PathBuf,
    },
    /// Create or replace an execution unit from a JSON file
    Unit {
        /// Path to the execution unit JSON
        file: PathBuf,
    },
    /// Append the content of a file to a step log
    Log {
        /// Execution unit name
        unit: String,
        /// Step name
        step: String,
        /// File holding the output to append
        file: PathBuf,
    },
}

/// Handle push commands
pub async fn handle_push_command(command: PushCommands, config: &Config) -> Result<()> {
    let client = BuildLogClient::new(&config.server_url);

    match command {
        PushCommands::Build { file } => push_build(&client, config, &file).await,
        PushCommands::Unit { file } => push_unit(&client, config, &file).await,
        PushCommands::Log { unit, step, file } => {
            push_log(&client, config, &unit, &step, &file).await
        }
    }
}

async fn push_build(client: &BuildLogClient, config: &Config, file: &Path) -> Result<()> {
    let mut build: Build = read_json(file).await?;
    if build.namespace.is_empty() {
        build.namespace = config.namespace.clone();
    }

    let stored = client.put_build(&build).await?;

    println!(
        "{} Build {} stored in phase {} (version {})",
        "✓".green(),
        stored.qualified_name().bold(),
        stored.phase,
        stored.resource_version
    );
    Ok(())
}

async fn push_unit(client: &BuildLogClient, config: &Config, file: &Path) -> Result<()> {
    let mut unit: ExecutionUnit = read_json(file).await?;
    if unit.namespace.is_empty() {
        unit.namespace = config.namespace.clone();
    }

    let stored = client.put_unit(&unit).await?;

    println!(
        "{} Unit {}/{} stored in phase {} ({} init, {} main steps)",
        "✓".green(),
        stored.namespace,
        stored.name.bold(),
        stored.phase,
        stored.init_steps.len(),
        stored.main_steps.len()
    );
    Ok(())
}

async fn push_log(
    client: &BuildLogClient,
    config: &Config,
    unit: &str,
    step: &str,
    file: &Path,
) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let len = bytes.len();

    client
        .append_step_log(&config.namespace, unit, step, bytes)
        .await?;

    println!(
        "{} Appended {} bytes to step {} of {}/{}",
        "✓".green(),
        len,
        step.bold(),
        config.namespace,
        unit
    );
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(file: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", file.display()))
}
