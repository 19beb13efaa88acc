//! Development container configuration derived from an original container

use crate::{CoreError, Result};
use devswap_provider::{ContainerSpec, MountConfig, TerminalConfig};
use std::path::{Path, PathBuf};

/// Entrypoint of every development container
pub const DEV_SHELL: &str = "/bin/sh";

/// Directories appended to the original `PATH`
pub const TOOLCHAIN_PATH_SUFFIX: &str = ":/go/bin:/usr/local/go/bin";

/// Environment entry flagging a development container
pub const DEV_MARKER: &str = "DEV_CONTAINER=true";

const SSH_TARGET: &str = "/root/.ssh";
const GITCONFIG_TARGET: &str = "/root/.gitconfig";
const PKG_CACHE_TARGET: &str = "/go/pkg";

/// Caller-side facts the deriver needs, passed in rather than read from the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    pub home: PathBuf,
}

impl HostContext {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Resolve the caller's home directory from `$HOME`, falling back to the platform lookup
    pub fn from_env() -> Result<Self> {
        std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .map(Self::new)
            .ok_or(CoreError::NoHomeDir)
    }

    fn home_path(&self, rel: &str) -> String {
        self.home.join(rel).to_string_lossy().into_owned()
    }
}

/// User-supplied overrides for the development container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevOverrides {
    /// Name of the development container
    pub name: String,
    /// Development image
    pub image: String,
    /// Host source tree
    pub source: PathBuf,
    /// Mount point of the source tree inside the container
    pub target: String,
}

/// Build the development container spec from the original one.
///
/// The original is only read. Image, name, working directory, command,
/// entrypoint, terminal flags and mounts are replaced; the environment gets
/// the toolchain `PATH` and the dev marker; networks and every other runtime
/// setting are carried over unchanged.
pub fn derive_dev_spec(
    original: &ContainerSpec,
    overrides: &DevOverrides,
    host: &HostContext,
) -> ContainerSpec {
    ContainerSpec {
        name: overrides.name.clone(),
        image: overrides.image.clone(),
        cmd: Vec::new(),
        entrypoint: vec![DEV_SHELL.to_string()],
        env: dev_env(&original.env),
        working_dir: Some(overrides.target.clone()),
        terminal: TerminalConfig::interactive(),
        mounts: dev_mounts(&overrides.source, &overrides.target, host),
        networks: original.networks.clone(),
        extras: original.extras.clone(),
    }
}

/// Original environment with `PATH` extended and moved last, preceded by the dev marker.
///
/// A missing `PATH` is treated as empty.
fn dev_env(original: &[String]) -> Vec<String> {
    let path = original
        .iter()
        .find_map(|e| e.strip_prefix("PATH="))
        .unwrap_or("");

    let mut env: Vec<String> = original
        .iter()
        .filter(|e| !e.starts_with("PATH=") && e.as_str() != DEV_MARKER)
        .cloned()
        .collect();
    env.push(DEV_MARKER.to_string());
    env.push(format!("PATH={}{}", path, TOOLCHAIN_PATH_SUFFIX));
    env
}

/// The four bind mounts of a development container, always in this order
fn dev_mounts(source: &Path, target: &str, host: &HostContext) -> Vec<MountConfig> {
    vec![
        MountConfig::bind(source.to_string_lossy(), target),
        // private repository access
        MountConfig::bind(host.home_path(".ssh"), SSH_TARGET),
        MountConfig::bind(host.home_path(".gitconfig"), GITCONFIG_TARGET),
        // module cache shared with the host
        MountConfig::bind(host.home_path("go/pkg"), PKG_CACHE_TARGET),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use devswap_provider::{EndpointConfig, MountType, RuntimeExtras};
    use std::collections::HashMap;

    fn original_spec(env: &[&str]) -> ContainerSpec {
        let mut networks = HashMap::new();
        networks.insert(
            "backend".to_string(),
            EndpointConfig {
                network_id: Some("net-backend".to_string()),
                aliases: vec!["api".to_string()],
                ..Default::default()
            },
        );
        ContainerSpec {
            name: "api".to_string(),
            image: "registry.local/api:1.4".to_string(),
            cmd: vec!["./api".to_string(), "--port=8080".to_string()],
            entrypoint: vec!["/entrypoint.sh".to_string()],
            env: env.iter().map(|s| s.to_string()).collect(),
            working_dir: Some("/srv".to_string()),
            terminal: TerminalConfig::default(),
            mounts: vec![MountConfig {
                mount_type: MountType::Volume,
                source: "api-data".to_string(),
                target: "/data".to_string(),
                read_only: false,
            }],
            networks,
            extras: RuntimeExtras {
                config: serde_json::json!({ "Labels": { "team": "core" } }),
                host_config: serde_json::json!({ "RestartPolicy": { "Name": "always" } }),
            },
        }
    }

    fn overrides() -> DevOverrides {
        DevOverrides {
            name: "api-dev".to_string(),
            image: "docker-dev-golang:latest".to_string(),
            source: PathBuf::from("/home/me/src/api"),
            target: "/app".to_string(),
        }
    }

    fn host() -> HostContext {
        HostContext::new("/home/me")
    }

    #[test]
    fn test_derive_is_pure() {
        let original = original_spec(&["PATH=/usr/bin:/bin", "PORT=8080"]);
        let before = original.clone();

        let a = derive_dev_spec(&original, &overrides(), &host());
        let b = derive_dev_spec(&original, &overrides(), &host());

        assert_eq!(a, b);
        assert_eq!(original, before, "original must not be modified");
    }

    #[test]
    fn test_derive_replaces_process_settings() {
        let dev = derive_dev_spec(&original_spec(&["PATH=/bin"]), &overrides(), &host());

        assert_eq!(dev.name, "api-dev");
        assert_eq!(dev.image, "docker-dev-golang:latest");
        assert!(dev.cmd.is_empty());
        assert_eq!(dev.entrypoint, vec!["/bin/sh".to_string()]);
        assert_eq!(dev.working_dir.as_deref(), Some("/app"));
        assert_eq!(dev.terminal, TerminalConfig::interactive());
        assert!(dev.terminal.stdin_once && dev.terminal.open_stdin && dev.terminal.tty);
    }

    #[test]
    fn test_derive_extends_existing_path() {
        let dev = derive_dev_spec(
            &original_spec(&["PORT=8080", "PATH=/usr/local/bin:/usr/bin", "GOFLAGS=-mod=mod"]),
            &overrides(),
            &host(),
        );

        assert_eq!(
            dev.env,
            vec![
                "PORT=8080".to_string(),
                "GOFLAGS=-mod=mod".to_string(),
                "DEV_CONTAINER=true".to_string(),
                "PATH=/usr/local/bin:/usr/bin:/go/bin:/usr/local/go/bin".to_string(),
            ]
        );
    }

    #[test]
    fn test_derive_without_path_does_not_fail() {
        let original = original_spec(&["PORT=8080", "PATHEXT=.exe"]);
        let dev = derive_dev_spec(&original, &overrides(), &host());

        // PATHEXT is a different variable and stays as-is
        assert!(dev.env.contains(&"PATHEXT=.exe".to_string()));
        assert_eq!(dev.env.len(), original.env.len() + 2);
        assert_eq!(
            dev.env.last().map(String::as_str),
            Some("PATH=:/go/bin:/usr/local/go/bin")
        );
        assert_eq!(dev.env.iter().filter(|e| e.starts_with("PATH=")).count(), 1);
    }

    #[test]
    fn test_derive_with_empty_env() {
        let dev = derive_dev_spec(&original_spec(&[]), &overrides(), &host());
        assert_eq!(
            dev.env,
            vec![
                "DEV_CONTAINER=true".to_string(),
                "PATH=:/go/bin:/usr/local/go/bin".to_string(),
            ]
        );
    }

    #[test]
    fn test_derive_does_not_duplicate_marker() {
        let dev = derive_dev_spec(
            &original_spec(&["DEV_CONTAINER=true", "PATH=/bin"]),
            &overrides(),
            &host(),
        );
        assert_eq!(dev.env.iter().filter(|e| *e == DEV_MARKER).count(), 1);
    }

    #[test]
    fn test_derive_mounts_fixed_order() {
        let dev = derive_dev_spec(&original_spec(&["PATH=/bin"]), &overrides(), &host());

        let pairs: Vec<(&str, &str)> = dev
            .mounts
            .iter()
            .map(|m| (m.source.as_str(), m.target.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("/home/me/src/api", "/app"),
                ("/home/me/.ssh", "/root/.ssh"),
                ("/home/me/.gitconfig", "/root/.gitconfig"),
                ("/home/me/go/pkg", "/go/pkg"),
            ]
        );
        assert!(dev
            .mounts
            .iter()
            .all(|m| m.mount_type == MountType::Bind && !m.read_only));
    }

    #[test]
    fn test_derive_mounts_follow_host_context() {
        let dev = derive_dev_spec(
            &original_spec(&[]),
            &overrides(),
            &HostContext::new("/Users/dev/"),
        );
        assert_eq!(dev.mounts[1].source, "/Users/dev/.ssh");
        assert_eq!(dev.mounts[3].source, "/Users/dev/go/pkg");
    }

    #[test]
    fn test_derive_carries_networks_and_extras() {
        let original = original_spec(&["PATH=/bin"]);
        let dev = derive_dev_spec(&original, &overrides(), &host());

        assert_eq!(dev.networks, original.networks);
        assert_eq!(dev.extras, original.extras);
    }
}
