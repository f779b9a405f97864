//! Mariquita CLI - catalog queries, cart files and media signing.
//!
//! # Usage
//!
//! ```bash
//! # Sign an image proxy path
//! mq-cli sign fit-in/800x800/kiwi.webp
//!
//! # Load two catalog pages of a category
//! mq-cli catalog --category pcat_fruit --pages 2
//!
//! # Add to a cart file and show it
//! mq-cli cart --file ./cart add --product p1 --variant v1 --title Kiwi --price 10
//! mq-cli cart --file ./cart show
//! ```
//!
//! # Commands
//!
//! - `sign` - Sign a path for the image proxy
//! - `catalog` - Query the catalog through the catalog controller
//! - `cart` - Operate on a cart stored in a `cart.json` file

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::cart::CartAction;
use commands::catalog::CatalogArgs;

#[derive(Parser)]
#[command(name = "mq-cli")]
#[command(author, version, about = "Mariquita CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign an image proxy path
    Sign {
        /// Path to sign, e.g. `fit-in/800x800/kiwi.webp`
        path: String,

        /// Signing secret
        #[arg(long, env = "MEDIA_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Query the catalog
    Catalog(CatalogArgs),
    /// Manage a cart file
    Cart {
        /// Directory holding `cart.json`
        #[arg(long)]
        file: PathBuf,

        #[command(subcommand)]
        action: CartAction,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing (stderr, so command output stays machine-readable)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mq_cli=info,mariquita_storefront=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Sign { path, secret } => commands::sign::run(&path, &secret)?,
        Commands::Catalog(args) => commands::catalog::run(&args).await?,
        Commands::Cart { file, action } => commands::cart::run(&file, action)?,
    }
    Ok(())
}
