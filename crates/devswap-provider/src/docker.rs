//! Docker provider implementation using bollard

use crate::{
    AttachOutcome, ContainerDetails, ContainerId, ContainerInfo, ContainerProvider,
    ContainerSpec, ContainerStatus, EndpointConfig, MountConfig, MountType, ProviderError,
    ProviderInfo, ProviderType, Result, RuntimeExtras, TerminalConfig, WaitOutcome,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, NetworkingConfig,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::service::{
    ContainerConfig, EndpointIpamConfig, EndpointSettings, HostConfig, Mount, MountTypeEnum,
};
use bollard::Docker;
use futures::StreamExt;
use std::process::Stdio;

/// Docker provider using bollard crate
pub struct DockerProvider {
    client: Docker,
    provider_type: ProviderType,
    /// Runtime CLI used for interactive attach
    cli: String,
}

impl DockerProvider {
    /// Create a new Docker provider
    pub async fn new(socket_path: &str, cli: &str) -> Result<Self> {
        let client = if socket_path.starts_with("http://") || socket_path.starts_with("https://")
        {
            Docker::connect_with_http(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| ProviderError::ConnectionError(e.to_string()))?
        } else {
            let path = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| ProviderError::ConnectionError(e.to_string()))?
        };

        client
            .ping()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            provider_type: ProviderType::Docker,
            cli: cli.to_string(),
        })
    }

    /// Create a new provider for Podman (uses Docker-compatible API)
    pub async fn new_podman(socket_path: &str, cli: &str) -> Result<Self> {
        let mut provider = Self::new(socket_path, cli).await?;
        provider.provider_type = ProviderType::Podman;
        Ok(provider)
    }
}

#[async_trait]
impl ContainerProvider for DockerProvider {
    async fn list(&self, all: bool) -> Result<Vec<ContainerInfo>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };

        let containers = self.client.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerInfo {
                id: ContainerId::new(c.id.unwrap_or_default()),
                names: c.names.unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                status: c
                    .state
                    .as_deref()
                    .map(ContainerStatus::from)
                    .unwrap_or(ContainerStatus::Unknown),
            })
            .collect())
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerDetails> {
        let info = self.client.inspect_container(&id.0, None).await?;

        let state = info.state.as_ref();
        let status = state
            .and_then(|s| s.status)
            .map(|s| ContainerStatus::from(format!("{:?}", s).to_lowercase().as_str()))
            .unwrap_or(ContainerStatus::Unknown);

        let config = info.config.unwrap_or_default();
        let host_config = info.host_config.unwrap_or_default();

        let mounts = host_config
            .mounts
            .iter()
            .flatten()
            .filter_map(mount_from_runtime)
            .collect();

        let networks = info
            .network_settings
            .and_then(|ns| ns.networks)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, endpoint)| (name, endpoint_from_runtime(endpoint)))
            .collect();

        let extras = RuntimeExtras {
            config: serde_json::to_value(&config)
                .map_err(|e| ProviderError::RuntimeError(e.to_string()))?,
            host_config: serde_json::to_value(&host_config)
                .map_err(|e| ProviderError::RuntimeError(e.to_string()))?,
        };

        let spec = ContainerSpec {
            name: info
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: config.image.clone().unwrap_or_default(),
            cmd: config.cmd.clone().unwrap_or_default(),
            entrypoint: config.entrypoint.clone().unwrap_or_default(),
            env: config.env.clone().unwrap_or_default(),
            working_dir: config.working_dir.clone().filter(|w| !w.is_empty()),
            terminal: TerminalConfig {
                attach_stdin: config.attach_stdin.unwrap_or(false),
                attach_stdout: config.attach_stdout.unwrap_or(false),
                attach_stderr: config.attach_stderr.unwrap_or(false),
                tty: config.tty.unwrap_or(false),
                open_stdin: config.open_stdin.unwrap_or(false),
                stdin_once: config.stdin_once.unwrap_or(false),
            },
            mounts,
            networks,
            extras,
        };

        Ok(ContainerDetails {
            id: ContainerId::new(info.id.unwrap_or_else(|| id.0.clone())),
            status,
            exit_code: state.and_then(|s| s.exit_code),
            spec,
        })
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let base = if spec.extras.config.is_null() {
            ContainerConfig::default()
        } else {
            serde_json::from_value(spec.extras.config.clone())
                .map_err(|e| ProviderError::ConfigError(format!("container config: {}", e)))?
        };

        let mut host_config: HostConfig = if spec.extras.host_config.is_null() {
            HostConfig::default()
        } else {
            serde_json::from_value(spec.extras.host_config.clone())
                .map_err(|e| ProviderError::ConfigError(format!("host config: {}", e)))?
        };

        let original_mounts = host_config.mounts.take().unwrap_or_default();
        let mounts: Vec<Mount> = spec
            .mounts
            .iter()
            .map(|m| mount_to_runtime(m, &original_mounts))
            .collect();
        host_config.mounts = if mounts.is_empty() { None } else { Some(mounts) };

        let networking_config = if spec.networks.is_empty() {
            None
        } else {
            Some(NetworkingConfig {
                endpoints_config: spec
                    .networks
                    .iter()
                    .map(|(name, endpoint)| (name.clone(), endpoint_to_runtime(endpoint)))
                    .collect(),
            })
        };

        let container_config = Config {
            image: Some(spec.image.clone()),
            // An empty command is sent as-is so the runtime does not fall back to the image CMD
            cmd: Some(spec.cmd.clone()),
            entrypoint: if spec.entrypoint.is_empty() {
                None
            } else {
                Some(spec.entrypoint.clone())
            },
            env: Some(spec.env.clone()),
            working_dir: spec.working_dir.clone(),
            attach_stdin: Some(spec.terminal.attach_stdin),
            attach_stdout: Some(spec.terminal.attach_stdout),
            attach_stderr: Some(spec.terminal.attach_stderr),
            tty: Some(spec.terminal.tty),
            open_stdin: Some(spec.terminal.open_stdin),
            stdin_once: Some(spec.terminal.stdin_once),
            hostname: base.hostname,
            domainname: base.domainname,
            user: base.user,
            exposed_ports: base.exposed_ports,
            healthcheck: base.healthcheck,
            args_escaped: base.args_escaped,
            volumes: base.volumes,
            network_disabled: base.network_disabled,
            mac_address: base.mac_address,
            on_build: base.on_build,
            labels: base.labels,
            stop_signal: base.stop_signal,
            stop_timeout: base.stop_timeout,
            shell: base.shell,
            host_config: Some(host_config),
            networking_config,
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };

        tracing::debug!("Creating container {} from image {}", spec.name, spec.image);
        let response = self
            .client
            .create_container(Some(options), container_config)
            .await?;

        for warning in &response.warnings {
            tracing::warn!("{}: {}", spec.name, warning);
        }

        Ok(ContainerId::new(response.id))
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.client
            .start_container(&id.0, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop(&self, id: &ContainerId, timeout: Option<u32>) -> Result<()> {
        let options = StopContainerOptions {
            t: timeout.unwrap_or(10) as i64,
        };
        match self.client.stop_container(&id.0, Some(options)).await {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                tracing::debug!("Container {} was already stopped", id.short());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.client.remove_container(&id.0, Some(options)).await?;
        Ok(())
    }

    async fn wait(&self, id: &ContainerId) -> Result<WaitOutcome> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.client.wait_container(&id.0, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(WaitOutcome {
                status_code: response.status_code,
            }),
            // bollard reports a non-zero exit as an error; for us it is a normal exit
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                Ok(WaitOutcome { status_code: code })
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(ProviderError::RuntimeError(format!(
                "wait stream for {} ended without a result",
                id.short()
            ))),
        }
    }

    async fn attach(&self, id: &ContainerId) -> Result<AttachOutcome> {
        tracing::debug!("Running {} attach {}", self.cli, id.short());
        let status = tokio::process::Command::new(&self.cli)
            .arg("attach")
            .arg(&id.0)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ProviderError::AttachError(format!("failed to run {}: {}", self.cli, e)))?;

        Ok(AttachOutcome {
            exit_code: status.code(),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .ping()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;
        Ok(())
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            provider_type: self.provider_type,
            version: "unknown".to_string(),
            api_version: bollard::API_DEFAULT_VERSION.to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

fn mount_from_runtime(m: &Mount) -> Option<MountConfig> {
    let mount_type = match m.typ.as_ref()? {
        MountTypeEnum::BIND => MountType::Bind,
        MountTypeEnum::VOLUME => MountType::Volume,
        MountTypeEnum::TMPFS => MountType::Tmpfs,
        MountTypeEnum::NPIPE => MountType::Npipe,
        MountTypeEnum::CLUSTER => MountType::Cluster,
        MountTypeEnum::EMPTY => return None,
    };
    Some(MountConfig {
        mount_type,
        source: m.source.clone().unwrap_or_default(),
        target: m.target.clone().unwrap_or_default(),
        read_only: m.read_only.unwrap_or(false),
    })
}

/// Build a runtime mount, keeping the options (propagation, volume driver, tmpfs size)
/// of an original mount with the same source and target.
fn mount_to_runtime(m: &MountConfig, original: &[Mount]) -> Mount {
    let base = original
        .iter()
        .find(|o| {
            o.target.as_deref() == Some(m.target.as_str())
                && o.source.as_deref().unwrap_or_default() == m.source
        })
        .cloned()
        .unwrap_or_default();

    Mount {
        target: Some(m.target.clone()),
        source: Some(m.source.clone()),
        typ: Some(match m.mount_type {
            MountType::Bind => MountTypeEnum::BIND,
            MountType::Volume => MountTypeEnum::VOLUME,
            MountType::Tmpfs => MountTypeEnum::TMPFS,
            MountType::Npipe => MountTypeEnum::NPIPE,
            MountType::Cluster => MountTypeEnum::CLUSTER,
        }),
        read_only: Some(m.read_only),
        ..base
    }
}

fn endpoint_from_runtime(e: EndpointSettings) -> EndpointConfig {
    let ipam = e.ipam_config.unwrap_or_default();
    EndpointConfig {
        network_id: e.network_id.filter(|n| !n.is_empty()),
        aliases: e.aliases.unwrap_or_default(),
        links: e.links.unwrap_or_default(),
        ipv4_address: ipam.ipv4_address.filter(|a| !a.is_empty()),
        ipv6_address: ipam.ipv6_address.filter(|a| !a.is_empty()),
        mac_address: e.mac_address.filter(|m| !m.is_empty()),
    }
}

fn endpoint_to_runtime(e: &EndpointConfig) -> EndpointSettings {
    let ipam_config = if e.ipv4_address.is_some() || e.ipv6_address.is_some() {
        Some(EndpointIpamConfig {
            ipv4_address: e.ipv4_address.clone(),
            ipv6_address: e.ipv6_address.clone(),
            ..Default::default()
        })
    } else {
        None
    };

    EndpointSettings {
        network_id: e.network_id.clone(),
        aliases: if e.aliases.is_empty() {
            None
        } else {
            Some(e.aliases.clone())
        },
        links: if e.links.is_empty() {
            None
        } else {
            Some(e.links.clone())
        },
        mac_address: e.mac_address.clone(),
        ipam_config,
        ..Default::default()
    }
}
