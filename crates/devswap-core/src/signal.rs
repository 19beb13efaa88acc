//! Session end detection
//!
//! An interrupt, the dev container's own exit and the end of the attach
//! session all race to end a session. They are funnelled into one channel with
//! room for a single event; only the first raise is delivered.

use devswap_provider::{ContainerId, ContainerProvider};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Why a development session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationEvent {
    /// Interrupt delivered to this process
    Interrupted,
    /// The dev container's main process exited
    ContainerExited { status_code: i64 },
    /// Waiting on the dev container failed
    WaitFailed { error: String },
    /// The attach process exited
    AttachEnded { exit_code: Option<i32> },
    /// The attach process could not be run
    AttachFailed { error: String },
}

impl TerminationEvent {
    /// Whether the session ended because something went wrong
    pub fn is_error(&self) -> bool {
        match self {
            Self::Interrupted => false,
            Self::ContainerExited { .. } => false,
            Self::AttachEnded { exit_code } => *exit_code != Some(0),
            Self::WaitFailed { .. } | Self::AttachFailed { .. } => true,
        }
    }
}

impl std::fmt::Display for TerminationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupted => write!(f, "interrupt received"),
            Self::ContainerExited { status_code: 0 } => write!(f, "container exited"),
            Self::ContainerExited { status_code } => {
                write!(f, "container exited with status {}", status_code)
            }
            Self::WaitFailed { error } => write!(f, "waiting on container failed: {}", error),
            Self::AttachEnded { exit_code: Some(0) } => write!(f, "attach session ended"),
            Self::AttachEnded { exit_code: Some(code) } => {
                write!(f, "attach session ended with exit code {}", code)
            }
            Self::AttachEnded { exit_code: None } => {
                write!(f, "attach session killed by a signal")
            }
            Self::AttachFailed { error } => write!(f, "attach failed: {}", error),
        }
    }
}

/// Cloneable handle that raises the termination event at most once
#[derive(Clone)]
pub struct TerminationTrigger {
    tx: mpsc::Sender<TerminationEvent>,
    fired: Arc<AtomicBool>,
}

impl TerminationTrigger {
    /// Raise `event`; returns false if an event was already raised
    pub fn raise(&self, event: TerminationEvent) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            tracing::debug!("Ignoring {} (session already ending)", event);
            return false;
        }
        // The slot is empty: nothing else has ever been sent
        self.tx.try_send(event).is_ok()
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Coordinates the sources that can end a development session
pub struct SessionSignals {
    trigger: TerminationTrigger,
    rx: mpsc::Receiver<TerminationEvent>,
}

impl SessionSignals {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            trigger: TerminationTrigger {
                tx,
                fired: Arc::new(AtomicBool::new(false)),
            },
            rx,
        }
    }

    pub fn trigger(&self) -> TerminationTrigger {
        self.trigger.clone()
    }

    /// Whether the session has already been asked to end
    pub fn has_fired(&self) -> bool {
        self.trigger.has_fired()
    }

    /// Raise [`TerminationEvent::Interrupted`] when `interrupt` completes
    pub fn on_interrupt<F>(&self, interrupt: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let trigger = self.trigger();
        tokio::spawn(async move {
            interrupt.await;
            tracing::info!("Interrupt signal received");
            trigger.raise(TerminationEvent::Interrupted);
        });
    }

    /// Raise an event when the container stops running
    pub fn watch_container(&self, provider: Arc<dyn ContainerProvider>, id: ContainerId) {
        let trigger = self.trigger();
        tokio::spawn(async move {
            let event = match provider.wait(&id).await {
                Ok(outcome) => TerminationEvent::ContainerExited {
                    status_code: outcome.status_code,
                },
                Err(e) => TerminationEvent::WaitFailed {
                    error: e.to_string(),
                },
            };
            tracing::info!("Dev container {}: {}", id.short(), event);
            trigger.raise(event);
        });
    }

    /// Attach to the container and raise an event when the attach session ends
    pub fn attach(&self, provider: Arc<dyn ContainerProvider>, id: ContainerId) {
        let trigger = self.trigger();
        tokio::spawn(async move {
            let event = match provider.attach(&id).await {
                Ok(outcome) => TerminationEvent::AttachEnded {
                    exit_code: outcome.exit_code,
                },
                Err(e) => TerminationEvent::AttachFailed {
                    error: e.to_string(),
                },
            };
            if event.is_error() {
                tracing::warn!("{}", event);
            } else {
                tracing::debug!("{}", event);
            }
            trigger.raise(event);
        });
    }

    /// Block until the session ends. Consumes the coordinator: one event is read, ever.
    pub async fn wait(mut self) -> TerminationEvent {
        self.next_event().await
    }

    /// Cancel safe; used to abandon work before the session starts
    pub(crate) async fn next_event(&mut self) -> TerminationEvent {
        match self.rx.recv().await {
            Some(event) => event,
            // Unreachable while `self.trigger` holds a sender
            None => TerminationEvent::Interrupted,
        }
    }
}

impl Default for SessionSignals {
    fn default() -> Self {
        Self::new()
    }
}

/// Completes on Ctrl+C, or SIGTERM on unix
pub async fn interrupt_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
