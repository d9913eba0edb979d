//! Podman log source
//!
//! Reads step logs from podman containers. A step `<step>` of execution unit
//! `<unit>` runs in the container named `<unit>-<step>`.

use async_trait::async_trait;
use buildlog_core::dto::log::LogRequest;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use super::log::{LogSource, LogStream, limit_stream};
use super::{RepositoryError, Result};

/// Log source backed by `podman logs`
#[derive(Debug, Clone)]
pub struct PodmanLogSource {
    binary: String,
}

impl PodmanLogSource {
    /// Creates a log source invoking the given podman binary
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Checks that podman is installed and answers
    pub async fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                RepositoryError::Transport(format!(
                    "failed to execute '{} --version': {}",
                    self.binary, e
                ))
            })?;

        if !output.status.success() {
            return Err(RepositoryError::Transport(
                "podman is not working correctly".to_string(),
            ));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!("Podman is available: {}", version.trim());
        Ok(())
    }

    /// Container name for one step of a unit
    pub fn container_name(request: &LogRequest) -> String {
        format!("{}-{}", request.unit, request.step)
    }

    async fn container_exists(&self, name: &str) -> Result<bool> {
        let status = Command::new(&self.binary)
            .arg("container")
            .arg("exists")
            .arg(name)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        Ok(status.success())
    }

    fn logs_command(&self, request: &LogRequest) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("logs");

        if request.follow {
            command.arg("--follow");
        }
        if request.timestamps {
            command.arg("--timestamps");
        }
        if let Some(tail) = request.tail_lines {
            command.arg("--tail").arg(tail.to_string());
        }
        if let Some(since) = request.since_seconds {
            command.arg("--since").arg(format!("{}s", since));
        }

        command.arg(Self::container_name(request));
        command
    }
}

impl Default for PodmanLogSource {
    fn default() -> Self {
        Self::new("podman")
    }
}

#[async_trait]
impl LogSource for PodmanLogSource {
    async fn open(&self, request: &LogRequest) -> Result<LogStream> {
        let container = Self::container_name(request);

        if !self.container_exists(&container).await? {
            return Err(RepositoryError::LogNotFound {
                unit: format!("{}/{}", request.namespace, request.unit),
                step: request.step.clone(),
            });
        }

        debug!(
            "Opening podman logs for {} (follow={})",
            container, request.follow
        );

        let mut child = self
            .logs_command(request)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            RepositoryError::Transport(format!("no stdout from podman logs {}", container))
        })?;

        Ok(limit_stream(
            Box::pin(ChildLog {
                _child: child,
                stdout,
            }),
            request.limit_bytes,
        ))
    }
}

/// Stdout of a `podman logs` process; the process is killed when dropped
struct ChildLog {
    _child: Child,
    stdout: ChildStdout,
}

impl AsyncRead for ChildLog {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildlog_core::dto::log::BuildLogOptions;

    #[test]
    fn test_container_name() {
        let req = LogRequest::for_step("ci", "app-1-build", "git-clone", false, &Default::default());
        assert_eq!(PodmanLogSource::container_name(&req), "app-1-build-git-clone");
    }

    #[test]
    fn test_logs_command_arguments() {
        let opts = BuildLogOptions {
            timestamps: true,
            tail_lines: Some(20),
            since_seconds: Some(60),
            ..Default::default()
        };
        let req = LogRequest::for_step("ci", "app-1-build", "sti-build", true, &opts);

        let command = PodmanLogSource::default().logs_command(&req);
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "logs",
                "--follow",
                "--timestamps",
                "--tail",
                "20",
                "--since",
                "60s",
                "app-1-build-sti-build"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_transport_error() {
        let source = PodmanLogSource::new("/nonexistent/podman-binary");
        assert!(matches!(
            source.check_available().await,
            Err(RepositoryError::Transport(_))
        ));
    }
}
