mod api;
mod config;
mod provider;
mod transport;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::{info, warn};

use provider::clouddns::CloudDnsProvider;
use provider::ChallengeProvider;

#[derive(Parser, Debug)]
#[command(name = "clouddns-acme")]
#[command(about = "DNS-01 challenge provider for the CloudDNS API")]
struct Args {
    /// Path to the configuration file (default: config.toml, optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve /present and /cleanup over HTTP (default)
    Serve,
    /// Create the challenge TXT record
    Present(Challenge),
    /// Remove the challenge TXT record
    Cleanup(Challenge),
    /// Print propagation timeout and polling interval in seconds
    Timeout,
}

#[derive(ClapArgs, Debug)]
struct Challenge {
    #[arg(long)]
    domain: String,
    #[arg(long, default_value = "")]
    token: String,
    #[arg(long)]
    key_auth: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration first (before logger init)
    let config = config::Config::load(args.config.as_deref())?;

    // Initialize logger with config log level (env var takes precedence)
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.server.log_level)
    ).init();

    match &args.config {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None if Path::new(config::DEFAULT_CONFIG_PATH).exists() => {
            info!("Loaded configuration from: {}", config::DEFAULT_CONFIG_PATH)
        }
        None => warn!(
            "{} not found, using defaults and CLOUDDNS_* environment variables",
            config::DEFAULT_CONFIG_PATH
        ),
    }

    let provider = CloudDnsProvider::from_config(&config.clouddns)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, Arc::new(provider)).await?,
        Command::Present(c) => provider.present(&c.domain, &c.token, &c.key_auth).await?,
        Command::Cleanup(c) => provider.cleanup(&c.domain, &c.token, &c.key_auth).await?,
        Command::Timeout => {
            let (timeout, interval) = provider.timeout();
            println!("{} {}", timeout.as_secs(), interval.as_secs());
        }
    }

    Ok(())
}

async fn serve(config: &config::Config, provider: Arc<dyn ChallengeProvider>) -> Result<()> {
    let app = api::create_router(provider, config.server.key.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Challenge endpoints: POST /present, POST /cleanup");

    axum::serve(listener, app).await?;

    Ok(())
}
