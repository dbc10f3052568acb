//! Atelier CLI - Drive the cart engine against a locally persisted cart.
//!
//! # Usage
//!
//! ```bash
//! # Add two units of a product in size M
//! atelier cart add tee-01 --size M --quantity 2
//!
//! # Show the cart with totals
//! atelier cart show
//!
//! # Check the cart against the live catalog, then fold fresh stock in
//! atelier stock check
//! atelier stock apply
//!
//! # Place the order
//! atelier checkout --name "Ada Lovelace" --phone "+1 555 010 2030" \
//!     --address "12 Analytical Row" --zone central --delivery-fee 500
//! ```
//!
//! # Commands
//!
//! - `cart` - Add, remove, update, show, clear and clean the cart
//! - `stock` - Check the cart against the catalog and apply fresh stock
//! - `checkout` - Validate stock and submit the order

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_storefront::config::StorefrontConfig;
use atelier_storefront::error::AppError;
use atelier_storefront::state::AppState;

mod commands;

#[derive(Parser)]
#[command(name = "atelier")]
#[command(author, version, about = "Atelier cart and checkout")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: commands::cart::CartAction,
    },
    /// Reconcile the cart with the live catalog
    Stock {
        #[command(subcommand)]
        action: commands::stock::StockAction,
    },
    /// Validate stock and place the order
    Checkout(commands::checkout::CheckoutArgs),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
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

    tracing::info!("Sentry initialized");
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

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "atelier_storefront=info,atelier_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            e.report();
            report_to_shopper(&e);
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stderr)]
fn report_to_shopper(err: &AppError) {
    eprintln!("error: {err}");
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), AppError> {
    let state = AppState::new(config)?;

    match cli.command {
        Commands::Cart { action } => commands::cart::run(&state, action).await,
        Commands::Stock { action } => commands::stock::run(&state, action).await,
        Commands::Checkout(args) => commands::checkout::run(&state, args).await,
    }
}
