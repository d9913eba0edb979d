//! Build log CLI
//!
//! Command-line interface for reading build logs from the build log server
//! and for feeding its in-memory registry.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "buildlog")]
#[command(about = "Build log streaming CLI", long_about = None)]
struct Cli {
    /// Build log server URL
    #[arg(
        long,
        env = "BUILDLOG_SERVER_URL",
        default_value = "http://localhost:8080"
    )]
    server_url: String,

    /// Namespace of the builds and units
    #[arg(short, long, global = true, default_value = "default")]
    namespace: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
        namespace: cli.namespace,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::PushCommands;

    #[test]
    fn test_parse_logs_command() {
        let cli = Cli::try_parse_from([
            "buildlog", "logs", "app-1", "-n", "ci", "-f", "--tail", "20", "-c", "sidecar",
        ])
        .unwrap();

        assert_eq!(cli.namespace, "ci");
        match cli.command {
            Commands::Logs(args) => {
                assert_eq!(args.build, "app-1");
                assert!(args.follow);
                assert_eq!(args.tail, Some(20));
                assert_eq!(args.container.as_deref(), Some("sidecar"));
            }
            _ => panic!("expected logs command"),
        }
    }

    #[test]
    fn test_parse_push_log_command() {
        let cli =
            Cli::try_parse_from(["buildlog", "push", "log", "app-1-build", "git-clone", "out.txt"])
                .unwrap();

        assert_eq!(cli.namespace, "default");
        match cli.command {
            Commands::Push {
                command: PushCommands::Log { unit, step, file },
            } => {
                assert_eq!(unit, "app-1-build");
                assert_eq!(step, "git-clone");
                assert_eq!(file.to_str(), Some("out.txt"));
            }
            _ => panic!("expected push log command"),
        }
    }

    #[test]
    fn test_previous_and_version_conflict() {
        assert!(
            Cli::try_parse_from(["buildlog", "logs", "app-1", "--previous", "--version", "2"])
                .is_err()
        );
    }
}
