//! Global configuration for devswap
//!
//! Located at `~/.config/devswap/config.toml`

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global devswap configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub defaults: DefaultsConfig,
    pub providers: ProvidersConfig,
}

/// Defaults for the swap command; each one can be overridden by a CLI flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Container provider ("docker" or "podman"), empty means auto-detect
    pub provider: String,
    /// Image used for the development container
    pub image: String,
    /// Mount point of the source tree inside the development container
    pub target: String,
    /// Branch checked out when cloning a remote repository
    pub branch: String,
    /// Directory that remote repositories are cloned into
    pub clone_dir: String,
    /// Appended to the original container name to name the dev container
    pub dev_suffix: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            image: "docker-dev-golang:latest".to_string(),
            target: "/app".to_string(),
            branch: "master".to_string(),
            clone_dir: "/tmp".to_string(),
            dev_suffix: "-dev".to_string(),
        }
    }
}

/// Provider-specific configurations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub docker: DockerConfig,
    pub podman: PodmanConfig,
}

/// Docker-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Docker API socket path
    pub socket: String,
    /// Docker CLI program, used for interactive attach
    pub cli: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: default_docker_socket(),
            cli: "docker".to_string(),
        }
    }
}

#[cfg(windows)]
fn default_docker_socket() -> String {
    "//./pipe/docker_engine".to_string()
}

#[cfg(not(windows))]
fn default_docker_socket() -> String {
    "/var/run/docker.sock".to_string()
}

/// Podman-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodmanConfig {
    /// Podman API socket path
    pub socket: String,
    /// Podman CLI program, used for interactive attach
    pub cli: String,
}

impl Default for PodmanConfig {
    fn default() -> Self {
        Self {
            socket: default_podman_socket(),
            cli: "podman".to_string(),
        }
    }
}

#[cfg(target_os = "linux")]
fn default_podman_socket() -> String {
    std::env::var("XDG_RUNTIME_DIR")
        .map(|dir| format!("{}/podman/podman.sock", dir))
        .unwrap_or_else(|_| "/run/user/1000/podman/podman.sock".to_string())
}

#[cfg(target_os = "macos")]
fn default_podman_socket() -> String {
    dirs::home_dir()
        .map(|h| {
            format!(
                "{}/.local/share/containers/podman/machine/podman-machine-default/podman.sock",
                h.display()
            )
        })
        .unwrap_or_else(|| "/var/run/podman.sock".to_string())
}

#[cfg(windows)]
fn default_podman_socket() -> String {
    "//./pipe/podman-machine-default".to_string()
}

impl GlobalConfig {
    /// Load global configuration from the default path
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load global configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(
            "Loaded config from {:?}: image={}, target={}",
            path,
            config.defaults.image,
            config.defaults.target
        );

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "devswap").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Check if this is the first run (provider not chosen yet)
    pub fn is_first_run(&self) -> bool {
        self.defaults.provider.is_empty()
    }

    /// Reject values that would make every swap fail
    pub fn validate(&self) -> Result<()> {
        match self.defaults.provider.as_str() {
            "" | "docker" | "podman" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown provider '{}', expected \"docker\" or \"podman\"",
                    other
                )))
            }
        }
        validate_dev_suffix(&self.defaults.dev_suffix)?;
        validate_target(&self.defaults.target)
    }
}

/// The dev container needs a name of its own
pub fn validate_dev_suffix(dev_suffix: &str) -> Result<()> {
    if dev_suffix.is_empty() {
        return Err(ConfigError::Invalid(
            "dev_suffix must not be empty, the dev container would reuse the original name"
                .to_string(),
        ));
    }
    Ok(())
}

/// Mount point and working directory of the dev container; runtimes refuse relative ones
pub fn validate_target(target: &str) -> Result<()> {
    if !target.starts_with('/') {
        return Err(ConfigError::Invalid(format!(
            "target '{}' must be an absolute container path",
            target
        )));
    }
    Ok(())
}
