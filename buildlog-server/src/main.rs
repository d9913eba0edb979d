use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod repository;
pub mod service;

use config::{Config, LogBackend};
use repository::{LogSource, MemoryLogSource, MemoryRegistry, PodmanLogSource};
use service::BuildLogService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "buildlog_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting build log server...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Log backend: {:?}, wait timeout: {:?}, round delay: {:?}",
        config.log_backend,
        config.wait_timeout,
        config.round_delay
    );

    let registry = Arc::new(MemoryRegistry::new());

    let (logs, memory_logs): (Arc<dyn LogSource>, Option<Arc<MemoryLogSource>>) =
        match config.log_backend {
            LogBackend::Memory => {
                let memory = Arc::new(MemoryLogSource::new());
                (memory.clone() as Arc<dyn LogSource>, Some(memory))
            }
            LogBackend::Podman => {
                let podman = PodmanLogSource::new(config.podman_bin.clone());
                podman
                    .check_available()
                    .await
                    .context("Podman log backend is not usable")?;
                (Arc::new(podman) as Arc<dyn LogSource>, None)
            }
        };

    let service = BuildLogService::new(registry.clone(), registry.clone(), logs)
        .with_settings(config.stream_settings());

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        logs: Arc::new(service),
        registry,
        memory_logs,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
