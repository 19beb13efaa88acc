//! End-to-end swap against a real container runtime.
//!
//! Requires Docker or Podman and network access to pull `alpine:latest`.
//! Tests are `#[ignore]` and run explicitly:
//!
//! ```text
//! cargo test -p devswap-core --test e2e_swap -- --ignored
//! ```

use devswap_config::GlobalConfig;
use devswap_core::{ContainerSwap, HostContext, SwapOptions};
use devswap_provider::{
    create_provider, ContainerId, ContainerProvider, ContainerSpec, ProviderType,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Get a provider for testing.
///
/// Respects `DEVSWAP_TEST_PROVIDER` env var (`docker`, `podman`).
/// Falls back to the first available runtime when unset.
async fn get_test_provider() -> Option<Arc<dyn ContainerProvider>> {
    let config = GlobalConfig::default();
    let candidates = match std::env::var("DEVSWAP_TEST_PROVIDER").as_deref() {
        Ok("docker") => vec![ProviderType::Docker],
        Ok("podman") => vec![ProviderType::Podman],
        _ => vec![ProviderType::Docker, ProviderType::Podman],
    };
    for provider_type in candidates {
        match create_provider(provider_type, &config).await {
            Ok(p) => return Some(Arc::from(p)),
            Err(e) => eprintln!("{} unavailable: {}", provider_type, e),
        }
    }
    None
}

/// Fake home with the three host paths the dev container mounts
fn fake_home() -> TempDir {
    let home = TempDir::new().expect("failed to create temp home");
    std::fs::create_dir_all(home.path().join(".ssh")).unwrap();
    std::fs::write(home.path().join(".gitconfig"), "[user]\n\tname = e2e\n").unwrap();
    std::fs::create_dir_all(home.path().join("go/pkg")).unwrap();
    home
}

async fn cleanup(provider: &dyn ContainerProvider, names: &[&str]) {
    for name in names {
        let _ = provider.remove(&ContainerId::new(*name), true).await;
    }
}

#[tokio::test]
#[ignore] // Requires container runtime
async fn test_swap_restores_original() {
    let Some(provider) = get_test_provider().await else {
        eprintln!("Skipping test: no container runtime available");
        return;
    };

    let name = format!("devswap-e2e-{}", std::process::id());
    let dev_name = format!("{}-dev", name);
    cleanup(provider.as_ref(), &[&name, &dev_name]).await;

    let original = ContainerSpec {
        name: name.clone(),
        image: "alpine:latest".to_string(),
        cmd: vec!["sleep".to_string(), "3600".to_string()],
        env: vec!["PATH=/usr/sbin:/usr/bin:/sbin:/bin".to_string()],
        ..Default::default()
    };
    let id = match provider.create(&original).await {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Skipping test: cannot create container (is alpine pulled?): {}", e);
            return;
        }
    };
    provider.start(&id).await.expect("start original");

    let home = fake_home();
    let source = TempDir::new().unwrap();
    let mut options = SwapOptions::from_config(
        &GlobalConfig::default(),
        &name,
        source.path(),
        HostContext::new(home.path()),
    );
    options.image = "alpine:latest".to_string();

    let swap = ContainerSwap::new(Arc::clone(&provider), options);
    // Attach fails without a terminal; the timed interrupt is the fallback
    let result = swap
        .run(tokio::time::sleep(Duration::from_secs(3)))
        .await;

    let restored = provider.inspect(&ContainerId::new(name.as_str())).await;
    let dev = provider.inspect(&ContainerId::new(dev_name.as_str())).await;
    cleanup(provider.as_ref(), &[&name, &dev_name]).await;

    let report = result.expect("swap failed");
    let restored = restored.expect("original was not recreated");
    assert!(restored.status.is_running());
    assert_eq!(restored.spec.image, "alpine:latest");
    assert_eq!(restored.spec.cmd, original.cmd);
    assert_eq!(restored.id, report.restored_id);
    assert!(dev.is_err(), "dev container was left behind");
}
