//! Command implementations

use anyhow::{Context, Result};
use devswap_config::GlobalConfig;
use devswap_core::{
    clone_remote, interrupt_signal, resolve_source, ContainerSwap, HostContext, SwapOptions,
    SwapReport,
};
use devswap_provider::ContainerProvider;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

/// Swap flags as given on the command line; `None` falls back to the config
#[derive(Debug, Clone, Default)]
pub struct SwapArgs {
    pub name: String,
    pub source: Option<String>,
    pub target: Option<String>,
    pub image: Option<String>,
    pub remote: Option<String>,
    pub branch: Option<String>,
}

/// Swap the named container for a dev container until the session ends
pub async fn swap(
    provider: Arc<dyn ContainerProvider>,
    config: &GlobalConfig,
    args: &SwapArgs,
) -> Result<()> {
    let host = HostContext::from_env()?;
    swap_until(provider, config, args, host, interrupt_signal()).await?;
    Ok(())
}

/// Swap with the session also ending when `interrupt` completes
pub async fn swap_until<F>(
    provider: Arc<dyn ContainerProvider>,
    config: &GlobalConfig,
    args: &SwapArgs,
    host: HostContext,
    interrupt: F,
) -> Result<SwapReport>
where
    F: Future<Output = ()> + Send + 'static,
{
    let options = resolve_options(args, config, host).await?;

    println!(
        "Swapping '{}' for '{}' ({}), {} -> {}",
        options.name,
        options.dev_name(),
        options.image,
        options.source.display(),
        options.target
    );

    let report = ContainerSwap::new(provider, options).run(interrupt).await?;

    print_report(&report);
    Ok(report)
}

/// Fill in everything the flags leave open, cloning the remote if one was given
pub async fn resolve_options(
    args: &SwapArgs,
    config: &GlobalConfig,
    host: HostContext,
) -> Result<SwapOptions> {
    let source = match &args.remote {
        Some(remote) => {
            if args.source.is_some() {
                tracing::warn!("--remote given, ignoring --source");
            }
            let branch = args.branch.as_deref().unwrap_or(&config.defaults.branch);
            clone_remote(remote, branch, Path::new(&config.defaults.clone_dir))
                .await
                .with_context(|| format!("Failed to clone {}", remote))?
        }
        None => {
            if args.branch.is_some() {
                tracing::warn!("--branch has no effect without --remote");
            }
            resolve_source(args.source.as_deref())?
        }
    };

    let mut options = SwapOptions::from_config(config, &args.name, source, host);
    if let Some(image) = &args.image {
        options.image = image.clone();
    }
    if let Some(target) = &args.target {
        options.target = target.clone();
    }
    options.validate()?;
    Ok(options)
}

fn print_report(report: &SwapReport) {
    println!();
    println!("Session ended: {}", report.termination);
    if report.dev_container_leaked() {
        println!(
            "Warning: dev container {} may not have been removed:",
            report.dev_id.short()
        );
        for failure in &report.dev_teardown_failures {
            println!("  {}", failure);
        }
    }
    println!("Original container restored ({})", report.restored_id.short());
}

/// Show the global configuration
pub fn show_config() -> Result<()> {
    let config_path = GlobalConfig::config_path()?;

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        println!("# Config file: {:?}\n", config_path);
        println!("{}", content);
    } else {
        println!("# Config file: {:?} (not created yet)\n", config_path);
        println!("# Default configuration:");
        let content = toml::to_string_pretty(&GlobalConfig::default())?;
        println!("{}", content);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devswap_core::test_support::{mock_spec, MockProvider};
    use devswap_provider::{ContainerStatus, ProviderType};
    use std::path::PathBuf;
    use std::time::Duration;

    fn args(name: &str) -> SwapArgs {
        SwapArgs {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_options_use_config_defaults() {
        let mut args = args("api");
        args.source = Some("/src/api".to_string());

        let opts = resolve_options(&args, &GlobalConfig::default(), HostContext::new("/h"))
            .await
            .unwrap();

        assert_eq!(opts.name, "api");
        assert_eq!(opts.dev_name(), "api-dev");
        assert_eq!(opts.image, "docker-dev-golang:latest");
        assert_eq!(opts.target, "/app");
        assert_eq!(opts.source, PathBuf::from("/src/api"));
    }

    #[tokio::test]
    async fn test_flags_override_config() {
        let mut config = GlobalConfig::default();
        config.defaults.image = "from-config:1".to_string();
        config.defaults.target = "/cfg".to_string();

        let mut args = args("api");
        args.source = Some("/src/api".to_string());
        args.image = Some("from-flag:2".to_string());
        args.target = Some("/flag".to_string());

        let opts = resolve_options(&args, &config, HostContext::new("/h"))
            .await
            .unwrap();
        assert_eq!(opts.image, "from-flag:2");
        assert_eq!(opts.target, "/flag");
    }

    #[tokio::test]
    async fn test_missing_source_uses_working_directory() {
        let opts = resolve_options(&args("api"), &GlobalConfig::default(), HostContext::new("/h"))
            .await
            .unwrap();
        assert_eq!(opts.source, std::env::current_dir().unwrap());
    }

    #[tokio::test]
    async fn test_invalid_remote_fails_before_cloning() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = GlobalConfig::default();
        config.defaults.clone_dir = tmp.path().to_string_lossy().into_owned();
        let mut args = args("api");
        args.remote = Some("https://host/org/.git".to_string());

        let err = resolve_options(&args, &config, HostContext::new("/h"))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid remote"));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_relative_target_flag_rejected() {
        let mut args = args("api");
        args.source = Some("/src/api".to_string());
        args.target = Some("app".to_string());

        let err = resolve_options(&args, &GlobalConfig::default(), HostContext::new("/h"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("absolute container path"), "{err}");
    }

    #[tokio::test]
    async fn test_swap_restores_original_on_interrupt() {
        let mock = Arc::new(MockProvider::new(ProviderType::Docker));
        let spec = mock_spec("api", "api:1");
        mock.add_container(spec.clone(), ContainerStatus::Running);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let provider = mock.clone();
        let run = tokio::spawn(async move {
            let mut args = args("api");
            args.source = Some("/src/api".to_string());
            args.image = Some("golang:1.22".to_string());
            let interrupt = async move {
                let _ = rx.await;
            };
            swap_until(
                provider,
                &GlobalConfig::default(),
                &args,
                HostContext::new("/h"),
                interrupt,
            )
            .await
        });

        tokio::time::timeout(Duration::from_secs(5), mock.wait_running("api-dev"))
            .await
            .unwrap();
        assert_eq!(
            mock.container_named("api-dev").unwrap().spec.image,
            "golang:1.22"
        );
        tx.send(()).unwrap();

        let report = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!report.dev_container_leaked());
        assert_eq!(mock.container_names(), vec!["api".to_string()]);
        assert_eq!(mock.container_named("api").unwrap().spec, spec);
    }

    #[tokio::test]
    async fn test_swap_with_bad_target_leaves_runtime_alone() {
        let mock = Arc::new(MockProvider::new(ProviderType::Docker));
        mock.add_container(mock_spec("api", "api:1"), ContainerStatus::Running);

        let mut args = args("api");
        args.source = Some("/src/api".to_string());
        args.target = Some("app".to_string());
        let result = swap_until(
            mock.clone(),
            &GlobalConfig::default(),
            &args,
            HostContext::new("/h"),
            std::future::pending(),
        )
        .await;

        assert!(result.is_err());
        assert!(mock.get_calls().is_empty());
    }
}
