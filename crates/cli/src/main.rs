//! Go Market cart CLI - Inspect and edit a cart stored on disk.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! gm-cart show
//!
//! # Add a product (merges into an existing line with the same ID)
//! gm-cart add --id 1 --title "Pineapple" --image-url https://cdn.example.com/1.png --price 4.99
//!
//! # Change quantities
//! gm-cart increment 1
//! gm-cart decrement 1
//!
//! # Empty the cart
//! gm-cart clear
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart (`--json` for the stored format)
//! - `add` - Add one unit of a product
//! - `increment` / `decrement` - Change a line's quantity by one
//! - `clear` - Remove every line

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use go_market_cart::CartConfig;
use go_market_core::{CartSnapshot, NewCartItem, Price, ProductId};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "go_market_cart=warn,gm_cart=info";

#[derive(Parser)]
#[command(name = "gm-cart")]
#[command(author, version, about = "Go Market cart tools")]
struct Cli {
    /// Directory holding the cart (overrides `GO_MARKET_STORAGE_DIR`)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Print the cart as JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show,
    /// Add one unit of a product
    Add {
        /// Product ID
        #[arg(long)]
        id: ProductId,

        /// Display name
        #[arg(long)]
        title: String,

        /// Display image URL
        #[arg(long)]
        image_url: String,

        /// Unit price
        #[arg(long)]
        price: Price,
    },
    /// Add one unit to a product already in the cart
    Increment {
        /// Product ID
        id: ProductId,
    },
    /// Remove one unit of a product
    Decrement {
        /// Product ID
        id: ProductId,
    },
    /// Remove every line
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
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
    let config = CartConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Logs go to stderr so stdout carries only the cart
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            sentry_guard
                .is_some()
                .then(|| sentry_tracing::layer().event_filter(sentry_event_filter)),
        )
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        // Flush Sentry before exiting
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: CartConfig) -> Result<(), Box<dyn std::error::Error>> {
    let dir = cli.dir.unwrap_or_else(|| config.storage_dir.clone());

    let cart = match cli.command {
        Commands::Show => commands::cart::show(&dir, &config).await,
        Commands::Add {
            id,
            title,
            image_url,
            price,
        } => {
            let item = NewCartItem {
                id,
                title,
                image_url,
                price,
            };
            commands::cart::add(&dir, &config, item).await?
        }
        Commands::Increment { id } => commands::cart::increment(&dir, &config, &id).await?,
        Commands::Decrement { id } => commands::cart::decrement(&dir, &config, &id).await?,
        Commands::Clear => commands::cart::clear(&dir, &config).await?,
    };

    print_cart(&cart, cli.json)?;
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_cart(cart: &CartSnapshot, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", commands::render::json(cart)?);
    } else {
        print!("{}", commands::render::table(cart));
    }
    Ok(())
}
