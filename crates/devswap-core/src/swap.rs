//! Container swap lifecycle
//!
//! Replaces a container with a development container for the length of an
//! interactive session, then puts the original back:
//!
//! ```text
//! locate -> snapshot -> teardown-original -> derive -> start-dev
//!        -> run -> teardown-dev -> recreate-original -> done
//! ```
//!
//! Every runtime call is attempted once. Failures before the original is
//! removed leave the runtime untouched; failures after it name the image the
//! original can be recreated from. Only the dev container teardown tolerates
//! failures, so it can never block restoring the original.

use crate::derive::{derive_dev_spec, DevOverrides, HostContext};
use crate::signal::{SessionSignals, TerminationEvent};
use crate::{CoreError, Phase, Result};
use devswap_config::{validate_dev_suffix, validate_target, GlobalConfig};
use devswap_provider::{
    ContainerDetails, ContainerId, ContainerProvider, ContainerSpec, ProviderError,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// Grace period for every stop: the swap window must not depend on the workload
const STOP_TIMEOUT_SECS: u32 = 0;

/// Everything a swap needs to know, resolved before it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOptions {
    /// Name of the container to swap out
    pub name: String,
    /// Development image
    pub image: String,
    /// Absolute host path of the source tree
    pub source: PathBuf,
    /// Mount point of the source tree in the dev container
    pub target: String,
    /// Appended to `name` to name the dev container
    pub dev_suffix: String,
    pub host: HostContext,
}

impl SwapOptions {
    /// Options with image, target and suffix taken from the config defaults
    pub fn from_config(
        config: &GlobalConfig,
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        host: HostContext,
    ) -> Self {
        Self {
            name: name.into(),
            image: config.defaults.image.clone(),
            source: source.into(),
            target: config.defaults.target.clone(),
            dev_suffix: config.defaults.dev_suffix.clone(),
            host,
        }
    }

    /// Same rules the config file is held to, for values that came from flags
    pub fn validate(&self) -> Result<()> {
        validate_dev_suffix(&self.dev_suffix)?;
        validate_target(&self.target)?;
        Ok(())
    }

    pub fn dev_name(&self) -> String {
        format!("{}{}", self.name, self.dev_suffix)
    }

    fn overrides(&self) -> DevOverrides {
        DevOverrides {
            name: self.dev_name(),
            image: self.image.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
        }
    }
}

/// Outcome of a completed swap
#[derive(Debug, Clone)]
pub struct SwapReport {
    /// ID the original container had before the swap
    pub original_id: ContainerId,
    pub dev_id: ContainerId,
    /// ID of the recreated original
    pub restored_id: ContainerId,
    /// What ended the development session
    pub termination: TerminationEvent,
    /// Tolerated failures while removing the dev container
    pub dev_teardown_failures: Vec<String>,
}

impl SwapReport {
    /// Whether the dev container may have been left behind
    pub fn dev_container_leaked(&self) -> bool {
        !self.dev_teardown_failures.is_empty()
    }
}

/// Drives one container swap against a provider
pub struct ContainerSwap {
    provider: Arc<dyn ContainerProvider>,
    options: SwapOptions,
}

impl ContainerSwap {
    pub fn new(provider: Arc<dyn ContainerProvider>, options: SwapOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &SwapOptions {
        &self.options
    }

    /// Run the whole swap. The session ends when `interrupt` completes, the dev
    /// container exits, or the attach session ends, whichever happens first.
    ///
    /// Invalid options are rejected before the runtime is contacted. An
    /// interrupt that arrives before the original is torn down aborts the swap
    /// with [`CoreError::Interrupted`] and leaves the runtime untouched.
    pub async fn run<F>(&self, interrupt: F) -> Result<SwapReport>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let signals = SessionSignals::new();
        signals.on_interrupt(interrupt);
        self.run_with(signals).await
    }

    async fn run_with(&self, mut signals: SessionSignals) -> Result<SwapReport> {
        self.options.validate()?;

        let original_id = interruptible(&mut signals, Phase::Locate, self.locate()).await?;
        let original =
            interruptible(&mut signals, Phase::Snapshot, self.snapshot(&original_id)).await?;

        if signals.has_fired() {
            return Err(CoreError::Interrupted(Phase::TeardownOriginal));
        }
        self.teardown_original(&original).await?;

        enter(Phase::Derive);
        let dev_spec = derive_dev_spec(
            &original.spec,
            &self.options.overrides(),
            &self.options.host,
        );

        let dev_id = self
            .start_dev(&dev_spec, &signals)
            .await
            .map_err(|source| stranded(Phase::StartDev, &original.spec, source))?;

        enter(Phase::Run);
        tracing::info!("Development session running in '{}'", dev_spec.name);
        let termination = signals.wait().await;
        tracing::info!("Session ended: {}", termination);

        let dev_teardown_failures = self.teardown_dev(&dev_id).await;
        let restored_id = self.recreate_original(&original.spec).await?;

        enter(Phase::Done);
        Ok(SwapReport {
            original_id,
            dev_id,
            restored_id,
            termination,
            dev_teardown_failures,
        })
    }

    /// Find the container to swap out; refuse if the dev name is already taken
    async fn locate(&self) -> Result<ContainerId> {
        enter(Phase::Locate);
        let name = &self.options.name;
        let containers = self
            .provider
            .list(true)
            .await
            .map_err(|source| CoreError::Phase {
                phase: Phase::Locate,
                source,
            })?;

        let dev_name = self.options.dev_name();
        if containers.iter().any(|c| c.has_name(&dev_name)) {
            return Err(CoreError::ContainerExists(dev_name));
        }

        // First match wins
        let found = containers
            .into_iter()
            .find(|c| c.has_name(name))
            .ok_or_else(|| CoreError::ContainerNotFound(name.clone()))?;
        tracing::info!("Found '{}' ({}, {})", name, found.id.short(), found.status);
        Ok(found.id)
    }

    async fn snapshot(&self, id: &ContainerId) -> Result<ContainerDetails> {
        enter(Phase::Snapshot);
        let mut details = self
            .provider
            .inspect(id)
            .await
            .map_err(|source| CoreError::Phase {
                phase: Phase::Snapshot,
                source,
            })?;
        if details.spec.name.is_empty() {
            details.spec.name = self.options.name.clone();
        }
        tracing::info!(
            "Captured configuration of '{}' (image {})",
            details.name(),
            details.spec.image
        );
        Ok(details)
    }

    async fn teardown_original(&self, original: &ContainerDetails) -> Result<()> {
        enter(Phase::TeardownOriginal);
        let phase_err = |source: ProviderError| CoreError::Phase {
            phase: Phase::TeardownOriginal,
            source,
        };

        tracing::info!("Stopping '{}'", original.name());
        let removed = match self.stop_and_wait(&original.id).await {
            Ok(()) => self.provider.remove(&original.id, false).await,
            Err(e) => Err(e),
        };
        match removed {
            Ok(()) => tracing::info!("Removed '{}'", original.name()),
            // Auto-removed by the runtime once it stopped
            Err(ProviderError::ContainerNotFound(_)) => {
                tracing::info!("'{}' was already removed", original.name())
            }
            Err(e) => return Err(phase_err(e)),
        }
        Ok(())
    }

    /// Create and start the dev container, then attach to it and watch for its exit
    async fn start_dev(
        &self,
        spec: &ContainerSpec,
        signals: &SessionSignals,
    ) -> std::result::Result<ContainerId, ProviderError> {
        enter(Phase::StartDev);
        tracing::info!("Creating '{}' from {}", spec.name, spec.image);
        let id = self.provider.create(spec).await?;

        if let Err(e) = self.provider.start(&id).await {
            // Don't leave a half-started dev container holding the name
            if let Err(cleanup) = self.provider.remove(&id, true).await {
                tracing::warn!("Failed to remove '{}': {}", spec.name, cleanup);
            }
            return Err(e);
        }
        tracing::info!("Started '{}' ({})", spec.name, id.short());

        signals.watch_container(Arc::clone(&self.provider), id.clone());
        signals.attach(Arc::clone(&self.provider), id.clone());
        Ok(id)
    }

    /// Stop and remove the dev container. Failures are logged and returned, never raised.
    async fn teardown_dev(&self, id: &ContainerId) -> Vec<String> {
        enter(Phase::TeardownDev);
        let mut failures = Vec::new();
        let mut force = false;

        match self.provider.inspect(id).await {
            Ok(details) if details.status.is_running() => {
                if let Err(e) = self.stop_and_wait(id).await {
                    tracing::warn!("Failed to stop dev container {}: {}", id.short(), e);
                    failures.push(format!("stop: {}", e));
                    force = true;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to inspect dev container {}: {}", id.short(), e);
                failures.push(format!("inspect: {}", e));
                force = true;
            }
        }

        match self.provider.remove(id, force).await {
            Ok(()) => tracing::info!("Removed dev container {}", id.short()),
            Err(e) => {
                tracing::warn!("Failed to remove dev container {}: {}", id.short(), e);
                failures.push(format!("remove: {}", e));
            }
        }
        failures
    }

    async fn recreate_original(&self, original: &ContainerSpec) -> Result<ContainerId> {
        enter(Phase::RecreateOriginal);
        tracing::info!("Recreating '{}' from {}", original.name, original.image);
        let id = self
            .provider
            .create(original)
            .await
            .map_err(|source| stranded(Phase::RecreateOriginal, original, source))?;
        self.provider
            .start(&id)
            .await
            .map_err(|source| CoreError::Phase {
                phase: Phase::RecreateOriginal,
                source,
            })?;
        tracing::info!("Restored '{}' ({})", original.name, id.short());
        Ok(id)
    }

    async fn stop_and_wait(&self, id: &ContainerId) -> std::result::Result<(), ProviderError> {
        self.provider.stop(id, Some(STOP_TIMEOUT_SECS)).await?;
        let outcome = self.provider.wait(id).await?;
        tracing::debug!(
            "Container {} stopped with status {}",
            id.short(),
            outcome.status_code
        );
        Ok(())
    }
}

/// Run a step that comes before the original is touched, giving up on interrupt
async fn interruptible<T>(
    signals: &mut SessionSignals,
    phase: Phase,
    step: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = signals.next_event() => {
            tracing::info!("Interrupted during {}", phase);
            Err(CoreError::Interrupted(phase))
        }
        result = step => result,
    }
}

fn enter(phase: Phase) {
    tracing::debug!("Entering phase {}", phase);
}

/// Failure after the original was removed
fn stranded(phase: Phase, original: &ContainerSpec, source: ProviderError) -> CoreError {
    CoreError::Stranded {
        phase,
        name: original.name.clone(),
        image: original.image.clone(),
        source,
    }
}
