//! devswap - swap a container for a development container and back

mod commands;

use clap::Parser;
use commands::SwapArgs;
use devswap_config::GlobalConfig;
use devswap_provider::{
    create_default_provider, create_provider, detect_available_providers, ContainerProvider,
    ProviderType,
};
use dialoguer::{theme::ColorfulTheme, Select};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "devswap")]
#[command(
    author,
    version,
    about = "Swap a running container for a development container, then restore it",
    long_about = None
)]
struct Cli {
    /// Name of the container to swap out
    #[arg(short, long, required_unless_present = "show_config")]
    name: Option<String>,

    /// Source directory to mount (defaults to the current directory)
    #[arg(short, long)]
    source: Option<String>,

    /// Mount point of the source inside the dev container [config default: /app]
    #[arg(short, long)]
    target: Option<String>,

    /// Development image [config default: docker-dev-golang:latest]
    #[arg(short, long)]
    image: Option<String>,

    /// Git repository to clone and mount instead of --source
    #[arg(short, long)]
    remote: Option<String>,

    /// Branch to clone with --remote [config default: master]
    #[arg(short, long)]
    branch: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override default provider (docker or podman)
    #[arg(long, value_parser = ["docker", "podman"])]
    provider: Option<String>,

    /// Print the global configuration and exit
    #[arg(long)]
    show_config: bool,
}

impl Cli {
    fn swap_args(&self) -> Option<SwapArgs> {
        Some(SwapArgs {
            name: self.name.clone()?,
            source: self.source.clone(),
            target: self.target.clone(),
            image: self.image.clone(),
            remote: self.remote.clone(),
            branch: self.branch.clone(),
        })
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout belongs to the attached session
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if cli.show_config {
        return commands::show_config();
    }

    let Some(args) = cli.swap_args() else {
        anyhow::bail!("--name is required");
    };

    // Load global config
    let mut config = match GlobalConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {}; using defaults", e);
            GlobalConfig::default()
        }
    };

    // First-run provider detection
    if config.is_first_run() && cli.provider.is_none() {
        if let Some(selected) = detect_and_select_provider(&config).await? {
            config.defaults.provider = selected.to_string();
            if let Err(e) = config.save() {
                eprintln!("Warning: Could not save provider selection: {}", e);
            } else {
                eprintln!("Provider '{}' saved to config", config.defaults.provider);
            }
        }
    }

    let provider: Arc<dyn ContainerProvider> = match cli.provider.as_deref() {
        Some("docker") => create_provider(ProviderType::Docker, &config).await?,
        Some("podman") => create_provider(ProviderType::Podman, &config).await?,
        _ => create_default_provider(&config).await?,
    }
    .into();
    tracing::debug!("Using provider {}", provider.info().provider_type);

    commands::swap(provider, &config, &args).await
}

/// Detect available providers and prompt user to select one if multiple are available
async fn detect_and_select_provider(
    config: &GlobalConfig,
) -> anyhow::Result<Option<ProviderType>> {
    eprintln!("First run detected - checking for container providers...");

    let available = detect_available_providers(config).await;
    let is_available = |provider: ProviderType| {
        available
            .iter()
            .any(|(t, available)| *t == provider && *available)
    };

    match (
        is_available(ProviderType::Docker),
        is_available(ProviderType::Podman),
    ) {
        (false, false) => {
            eprintln!("No container providers detected.");
            eprintln!("Please install Docker or Podman and try again.");
            Ok(None)
        }
        (true, false) => {
            eprintln!("Auto-selected Docker (only available provider)");
            Ok(Some(ProviderType::Docker))
        }
        (false, true) => {
            eprintln!("Auto-selected Podman (only available provider)");
            Ok(Some(ProviderType::Podman))
        }
        (true, true) => {
            eprintln!("Both Docker and Podman are available.");

            if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
                let items = vec!["Docker (recommended)", "Podman"];
                let selection = Select::with_theme(&ColorfulTheme::default())
                    .with_prompt("Select your preferred container provider")
                    .items(&items)
                    .default(0)
                    .interact()?;

                let provider = if selection == 0 {
                    ProviderType::Docker
                } else {
                    ProviderType::Podman
                };
                Ok(Some(provider))
            } else {
                eprintln!("Non-interactive mode - defaulting to Docker");
                Ok(Some(ProviderType::Docker))
            }
        }
    }
}
