//! Common types for container providers

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Container ID wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// First 12 bytes, or the whole ID when that would split a character
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Container provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Docker,
    Podman,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::Podman => write!(f, "podman"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            _ => Err(format!("Unknown provider type: {}", s)),
        }
    }
}

/// Container status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerStatus {
    /// Whether a stop request is needed before the container can be removed
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running | Self::Paused | Self::Restarting)
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Removing => write!(f, "removing"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<&str> for ContainerStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

/// Full configuration of a container, as captured by inspect and consumed by create.
///
/// The fields the swap rewrites are modelled explicitly. Everything else the
/// runtime knows about the container travels in [`RuntimeExtras`] untouched,
/// so a container created from an inspected spec is a faithful copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    /// Container name, without the runtime's leading `/`
    pub name: String,
    /// Image reference
    pub image: String,
    /// Command; empty means no command
    pub cmd: Vec<String>,
    /// Entrypoint; empty means the image default
    pub entrypoint: Vec<String>,
    /// Environment as `KEY=VALUE` entries, in runtime order
    pub env: Vec<String>,
    /// Working directory
    pub working_dir: Option<String>,
    /// Standard stream and terminal flags
    pub terminal: TerminalConfig,
    /// Mounts (the `--mount` style list, not legacy binds)
    pub mounts: Vec<MountConfig>,
    /// Network attachments, keyed by network name
    pub networks: HashMap<String, EndpointConfig>,
    /// Runtime-specific settings not modelled above
    pub extras: RuntimeExtras,
}

/// Standard stream and terminal flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalConfig {
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    /// Allocate a pseudo-terminal
    pub tty: bool,
    /// Keep STDIN open
    pub open_stdin: bool,
    /// Close STDIN after the first attached client detaches
    pub stdin_once: bool,
}

impl TerminalConfig {
    /// Fully interactive session: every stream attached, TTY, stdin kept open once
    pub fn interactive() -> Self {
        Self {
            attach_stdin: true,
            attach_stdout: true,
            attach_stderr: true,
            tty: true,
            open_stdin: true,
            stdin_once: true,
        }
    }
}

/// Mount configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    /// Mount type (bind, volume, tmpfs)
    pub mount_type: MountType,
    /// Source path or volume name
    pub source: String,
    /// Target path in container
    pub target: String,
    /// Read-only
    pub read_only: bool,
}

impl MountConfig {
    /// Read-write bind mount of a host path
    pub fn bind(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            mount_type: MountType::Bind,
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }
}

/// Mount type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountType {
    Bind,
    Volume,
    Tmpfs,
    Npipe,
    Cluster,
}

impl std::fmt::Display for MountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bind => write!(f, "bind"),
            Self::Volume => write!(f, "volume"),
            Self::Tmpfs => write!(f, "tmpfs"),
            Self::Npipe => write!(f, "npipe"),
            Self::Cluster => write!(f, "cluster"),
        }
    }
}

/// Attachment of a container to one network
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointConfig {
    pub network_id: Option<String>,
    pub aliases: Vec<String>,
    pub links: Vec<String>,
    /// Statically requested IPv4 address
    pub ipv4_address: Option<String>,
    /// Statically requested IPv6 address
    pub ipv6_address: Option<String>,
    pub mac_address: Option<String>,
}

/// Opaque runtime settings carried from inspect to create
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeExtras {
    /// The runtime's own container config document
    pub config: serde_json::Value,
    /// The runtime's own host config document (restart policy, ports, binds, ...)
    pub host_config: serde_json::Value,
}

/// Basic container info for listing
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: ContainerId,
    /// Names exactly as the runtime reports them (Docker prefixes each with `/`)
    pub names: Vec<String>,
    pub image: String,
    pub status: ContainerStatus,
}

impl ContainerInfo {
    /// Whether one of this container's names is exactly `name`.
    ///
    /// Runtime names carry a leading `/`; the comparison accounts for it.
    pub fn has_name(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.strip_prefix('/').unwrap_or(n) == name)
    }
}

/// Detailed container information
#[derive(Debug, Clone)]
pub struct ContainerDetails {
    pub id: ContainerId,
    pub status: ContainerStatus,
    pub exit_code: Option<i64>,
    pub spec: ContainerSpec,
}

impl ContainerDetails {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

/// How a blocking wait for the not-running state ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOutcome {
    /// Exit status of the container's main process
    pub status_code: i64,
}

/// How an interactive attach session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOutcome {
    /// Exit code of the attach process, `None` if it was killed by a signal
    pub exit_code: Option<i32>,
}

impl AttachOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Provider information
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub provider_type: ProviderType,
    pub version: String,
    pub api_version: String,
    pub os: String,
    pub arch: String,
}
