//! Container runtime client for devswap
//!
//! This crate provides an abstraction over container runtimes (Docker, Podman)
//! exposing exactly the operations a container swap needs: lookup, inspect,
//! create, start, stop, wait, remove and interactive attach.

mod docker;
mod error;
mod types;

pub use docker::DockerProvider;
pub use error::*;
pub use types::*;

use async_trait::async_trait;

/// Trait for container providers (Docker, Podman, etc.)
#[async_trait]
pub trait ContainerProvider: Send + Sync {
    /// List containers, including stopped ones when `all` is set
    async fn list(&self, all: bool) -> Result<Vec<ContainerInfo>>;

    /// Get the full configuration and state of a container
    async fn inspect(&self, id: &ContainerId) -> Result<ContainerDetails>;

    /// Create a container named `spec.name`
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId>;

    /// Start a container
    async fn start(&self, id: &ContainerId) -> Result<()>;

    /// Stop a container, killing it after `timeout` seconds (runtime default if None)
    async fn stop(&self, id: &ContainerId, timeout: Option<u32>) -> Result<()>;

    /// Remove a container
    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()>;

    /// Block until the container is no longer running
    async fn wait(&self, id: &ContainerId) -> Result<WaitOutcome>;

    /// Attach the caller's terminal to the container's standard streams.
    /// Returns when the attach session ends.
    async fn attach(&self, id: &ContainerId) -> Result<AttachOutcome>;

    /// Check if the provider is available/connected
    async fn ping(&self) -> Result<()>;

    /// Get provider information
    fn info(&self) -> ProviderInfo;
}

/// Factory function to create a provider based on type
pub async fn create_provider(
    provider_type: ProviderType,
    config: &devswap_config::GlobalConfig,
) -> Result<Box<dyn ContainerProvider>> {
    match provider_type {
        ProviderType::Docker => {
            let docker = &config.providers.docker;
            let provider = DockerProvider::new(&docker.socket, &docker.cli).await?;
            Ok(Box::new(provider))
        }
        ProviderType::Podman => {
            // Podman serves the Docker-compatible API
            let podman = &config.providers.podman;
            let provider = DockerProvider::new_podman(&podman.socket, &podman.cli).await?;
            Ok(Box::new(provider))
        }
    }
}

/// Test if a specific provider is available and responsive
pub async fn test_provider_connectivity(
    provider_type: ProviderType,
    config: &devswap_config::GlobalConfig,
) -> bool {
    match create_provider(provider_type, config).await {
        Ok(provider) => provider.ping().await.is_ok(),
        Err(_) => false,
    }
}

/// Detect which providers are available on the system
/// Returns a list of (ProviderType, is_available) pairs, Docker first
pub async fn detect_available_providers(
    config: &devswap_config::GlobalConfig,
) -> Vec<(ProviderType, bool)> {
    let (docker, podman) = tokio::join!(
        test_provider_connectivity(ProviderType::Docker, config),
        test_provider_connectivity(ProviderType::Podman, config)
    );

    vec![(ProviderType::Docker, docker), (ProviderType::Podman, podman)]
}

/// Create the default provider based on global config.
/// If the provider is not configured (empty), auto-detects by trying Docker first, then Podman.
pub async fn create_default_provider(
    config: &devswap_config::GlobalConfig,
) -> Result<Box<dyn ContainerProvider>> {
    let provider_type = match config.defaults.provider.as_str() {
        "podman" => ProviderType::Podman,
        "docker" => ProviderType::Docker,
        _ => {
            tracing::info!("No provider configured, auto-detecting...");
            let available = detect_available_providers(config).await;

            match available.iter().find(|(_, available)| *available) {
                Some((provider_type, _)) => {
                    tracing::info!("Auto-detected provider: {}", provider_type);
                    *provider_type
                }
                None => {
                    // Neither answered; Docker gives the most useful error below
                    tracing::warn!("No providers detected, defaulting to Docker");
                    ProviderType::Docker
                }
            }
        }
    };

    let socket_path = match provider_type {
        ProviderType::Podman => &config.providers.podman.socket,
        ProviderType::Docker => &config.providers.docker.socket,
    };

    match create_provider(provider_type, config).await {
        Ok(provider) => Ok(provider),
        Err(e) => {
            let socket_exists = std::path::Path::new(socket_path).exists();
            Err(ProviderError::ConnectionError(format_connection_error(
                provider_type,
                socket_path,
                socket_exists,
                &e,
            )))
        }
    }
}

/// Format a helpful connection error message with actionable instructions
fn format_connection_error(
    provider: ProviderType,
    socket_path: &str,
    socket_exists: bool,
    underlying: &ProviderError,
) -> String {
    let provider_name = match provider {
        ProviderType::Podman => "Podman",
        ProviderType::Docker => "Docker",
    };

    let mut msg = format!("Cannot connect to {}\n\n", provider_name);

    if !socket_exists {
        msg.push_str(&format!(
            "The {} API socket was not found at:\n  {}\n\n",
            provider_name, socket_path
        ));

        match provider {
            ProviderType::Podman => {
                msg.push_str("To enable the Podman socket, run:\n");
                msg.push_str("  systemctl --user enable --now podman.socket\n");
            }
            ProviderType::Docker => {
                msg.push_str("To start Docker, run:\n");
                msg.push_str("  sudo systemctl enable --now docker\n");
            }
        }
    } else {
        msg.push_str(&format!(
            "The socket exists at {} but the daemon is not responding.\n\n",
            socket_path
        ));
        msg.push_str(&format!("Underlying error: {}\n", underlying));
    }

    msg
}
