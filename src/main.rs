//! RSVP CLI
//!
//! Command-line front end for the guest sheet:
//! - List guests and their answers
//! - Record a guest's answer
//! - Print a default config file
//!
//! # Configuration
//!
//! Environment variables:
//! - `RSVP_API_URL`: Guest sheet endpoint (required; `VITE_API_URL` also accepted)
//! - `RSVP_MAX_ATTEMPTS`: Attempts per request (default: 3)
//! - `RSVP_BACKOFF_MS`: Backoff step in milliseconds (default: 1000)
//! - `RSVP_LOG_FORMAT`: pretty or json (default: pretty)
//! - `RUST_LOG`: Log filter (default: rsvp=info)

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use rsvp::config::{generate_default_config, Config, LoggingConfig};
use rsvp::{GuestClient, GuestRecord, GuestSummary};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rsvp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Guest list and RSVP responses from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/rsvp/config.toml, then ./rsvp.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all guests and their answers
    List,

    /// Record a guest's answer
    #[command(group(ArgGroup::new("answer").required(true).args(["yes", "no"])))]
    Respond {
        /// Guest id
        id: i64,
        /// Guest name
        name: String,
        /// Guest will attend
        #[arg(long)]
        yes: bool,
        /// Guest will not attend
        #[arg(long)]
        no: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            let client = connect(cli.config.as_deref())?;
            let guests = client.fetch_guests().await?;
            match cli.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&guests)?),
                _ => print_table(&guests),
            }
        }

        Commands::Respond { id, name, yes, .. } => {
            let client = connect(cli.config.as_deref())?;
            let success = client.update_guest_response(id, &name, yes).await?;
            let answer = if yes { "attending" } else { "not attending" };

            match cli.format.as_str() {
                "json" => println!("{}", serde_json::json!({ "id": id, "success": success })),
                _ if success => println!("Recorded {} (#{}) as {}", name, id, answer),
                _ => eprintln!("Remote did not accept the answer for {} (#{})", name, id),
            }

            if !success {
                std::process::exit(1);
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", config),
            }
        }
    }

    Ok(())
}

/// Load and check configuration, start logging, and build the client.
/// Nothing talks to the network until the endpoint checks out.
fn connect(config_path: Option<&Path>) -> anyhow::Result<GuestClient> {
    let config = Config::discover(config_path).context("failed to load configuration")?;
    let endpoint = config.api.endpoint().context("invalid configuration")?;
    init_logging(&config.logging);

    tracing::info!("RSVP client v{}", env!("CARGO_PKG_VERSION"));
    match &config.source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    let client = GuestClient::new(endpoint, config.api.retry_policy())?;
    tracing::info!(
        endpoint = %client.base_url(),
        max_attempts = client.retry_policy().max_attempts,
        "Using guest endpoint"
    );

    Ok(client)
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("rsvp={}", logging.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    // stdout is reserved for command output
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_table(guests: &[GuestRecord]) {
    if guests.is_empty() {
        println!("No guests");
        return;
    }

    println!("{:<6} | {:<30} | {:<10} | {:<12}", "ID", "Name", "Status", "Answered");
    println!("{}", "-".repeat(67));

    for guest in guests {
        println!(
            "{:<6} | {:<30} | {:<10} | {:<12}",
            guest.id,
            guest.name,
            guest.status(),
            guest.response_date.as_deref().unwrap_or("-")
        );
    }

    let summary = GuestSummary::from_guests(guests);
    println!();
    println!(
        "{} guests: {} attending, {} declined, {} pending",
        summary.total, summary.attending, summary.declined, summary.pending
    );
}
