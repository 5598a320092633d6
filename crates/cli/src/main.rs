//! Pocket Shop CLI - Browse the catalog, create products, manage a cart.
//!
//! This binary is the composition root: it loads configuration, sets up
//! logging and error tracking, and constructs the one [`ProductStore`] every
//! command works against.
//!
//! # Usage
//!
//! ```bash
//! # Print the remote catalog
//! pocket-shop list
//!
//! # Print it as JSON
//! pocket-shop list --json
//!
//! # Interactive session (fetch, create, add, remove, cart, ...)
//! pocket-shop shell
//!
//! # Point at another catalog
//! pocket-shop --base-url http://localhost:8080 shell
//! ```
//!
//! # Commands
//!
//! - `list` - Fetch the catalog once and print it
//! - `shell` - Line-oriented session against a single store

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use pocket_shop_store::config::parse_base_url;
use pocket_shop_store::{HttpCatalogClient, ProductStore, StoreConfig};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "pocket-shop")]
#[command(author, version, about = "Pocket Shop catalog browser")]
struct Cli {
    /// Catalog base URL (overrides `CATALOG_BASE_URL`)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the catalog once and print it
    List {
        /// Print the snapshot as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Start an interactive session
    Shell,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StoreConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let mut config = StoreConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = init_sentry(&config);

    // Logs go to stderr so command output on stdout stays clean
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pocket_shop_store=info,pocket_shop_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if sentry_guard.is_some() {
        tracing::info!("Sentry initialized");
    }

    if let Err(e) = run(cli, &mut config).await {
        let event_id = sentry::capture_error(&e);
        tracing::error!(error = %e, sentry_event_id = %event_id, "Command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &mut StoreConfig) -> Result<(), CliError> {
    if let Some(base_url) = cli.base_url.as_deref() {
        config.catalog.base_url = parse_base_url("--base-url", base_url)?;
    }

    let client = HttpCatalogClient::new(&config.catalog)?;
    tracing::debug!(endpoint = %client.endpoint(), "Catalog client ready");
    let store = ProductStore::new(client);

    match cli.command {
        Commands::List { json } => commands::list::run(&store, json, std::io::stdout()).await,
        Commands::Shell => {
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            commands::shell::run(store, input, std::io::stdout()).await
        }
    }
}
