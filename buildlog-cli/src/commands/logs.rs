//! Logs command handler
//!
//! Streams the aggregated log of a build to stdout as it arrives.

use anyhow::{Context, Result};
use buildlog_client::BuildLogClient;
use buildlog_core::dto::log::BuildLogOptions;
use clap::Args;
use colored::*;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::config::Config;

/// Arguments of `buildlog logs`
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Build name
    pub build: String,

    /// Keep streaming while the build runs
    #[arg(short, long)]
    pub follow: bool,

    /// Show the log of the build before this one
    #[arg(long, conflicts_with = "version")]
    pub previous: bool,

    /// Show the log of build number N of the same config
    #[arg(long, value_name = "N")]
    pub version: Option<i64>,

    /// Do not wait for a queued build to start
    #[arg(long)]
    pub no_wait: bool,

    /// Main step to show instead of the builder step
    #[arg(short, long)]
    pub container: Option<String>,

    /// Prefix every line with its timestamp
    #[arg(long)]
    pub timestamps: bool,

    /// Only show the last N lines of each step
    #[arg(long, value_name = "N")]
    pub tail: Option<i64>,

    /// Stop each step log after this many bytes
    #[arg(long)]
    pub limit_bytes: Option<i64>,

    /// Only show output newer than this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub since: Option<i64>,
}

impl LogsArgs {
    fn to_options(&self) -> BuildLogOptions {
        BuildLogOptions {
            follow: self.follow,
            no_wait: self.no_wait,
            previous: self.previous,
            container: self.container.clone(),
            version: self.version,
            timestamps: self.timestamps,
            tail_lines: self.tail,
            limit_bytes: self.limit_bytes,
            since_seconds: self.since,
        }
    }
}

/// Handle `buildlog logs`
pub async fn handle_logs_command(args: LogsArgs, config: &Config) -> Result<()> {
    let options = args.to_options();
    if let Err(problems) = options.validate() {
        anyhow::bail!("invalid options: {}", problems);
    }

    let client = BuildLogClient::new(&config.server_url);
    let mut chunks = match client
        .stream_build_log(&config.namespace, &args.build, &options)
        .await
    {
        Ok(chunks) => chunks,
        Err(e) if e.is_not_found() => {
            println!(
                "{}",
                format!("Build {}/{} not found.", config.namespace, args.build).yellow()
            );
            return Err(e.into());
        }
        Err(e) if e.is_timeout() => {
            println!(
                "{}",
                "Build did not start in time, try again later or use --no-wait.".yellow()
            );
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.context("log stream interrupted")?;
        stdout.write_all(&chunk).await?;
        stdout.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_options() {
        let args = LogsArgs {
            build: "app-1".into(),
            follow: true,
            previous: false,
            version: Some(3),
            no_wait: true,
            container: None,
            timestamps: false,
            tail: Some(10),
            limit_bytes: None,
            since: Some(60),
        };

        let options = args.to_options();
        assert!(options.follow);
        assert!(options.no_wait);
        assert_eq!(options.version, Some(3));
        assert_eq!(options.tail_lines, Some(10));
        assert_eq!(options.since_seconds, Some(60));
        assert!(options.validate().is_ok());
    }
}
