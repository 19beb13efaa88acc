//! Error types for devswap-core

use devswap_provider::ProviderError;
use thiserror::Error;

/// Phases of a container swap, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Locate,
    Snapshot,
    TeardownOriginal,
    Derive,
    StartDev,
    Run,
    TeardownDev,
    RecreateOriginal,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Locate => "locate",
            Self::Snapshot => "snapshot",
            Self::TeardownOriginal => "teardown-original",
            Self::Derive => "derive",
            Self::StartDev => "start-dev",
            Self::Run => "run",
            Self::TeardownDev => "teardown-dev",
            Self::RecreateOriginal => "recreate-original",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] devswap_config::ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("{phase} failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: ProviderError,
    },

    #[error(
        "{phase} failed after '{name}' was removed: {source}\n\
         The original container is gone; recreate it from image {image}"
    )]
    Stranded {
        phase: Phase,
        name: String,
        image: String,
        #[source]
        source: ProviderError,
    },

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Container already exists: {0}")]
    ContainerExists(String),

    #[error("Interrupted at {0}, no container was changed")]
    Interrupted(Phase),

    #[error("Invalid remote repository: {0}")]
    InvalidRemote(String),

    #[error("git clone failed: {0}")]
    Clone(String),

    #[error("Could not determine the home directory")]
    NoHomeDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Phase the error was raised in, when known
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Phase { phase, .. } | Self::Stranded { phase, .. } => Some(*phase),
            Self::ContainerNotFound(_) | Self::ContainerExists(_) => Some(Phase::Locate),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
