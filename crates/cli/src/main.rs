//! Stockroom CLI - manage the product catalog from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # List products, optionally filtered by name or category
//! stock-cli products list --search mouse
//!
//! # Create a product
//! stock-cli products create --name Mouse --category Peripherals --price 49.90 --quantity 10
//!
//! # Change some fields of a product
//! stock-cli products update 5 --price 44.90
//!
//! # Delete a product
//! stock-cli products delete 3
//!
//! # Try it without a catalog service
//! stock-cli --offline products list
//! ```
//!
//! # Environment Variables
//!
//! - `CATALOG_API_URL` - Catalog service base URL (unless `--offline`)
//! - `CATALOG_API_TOKEN` - Optional bearer token
//! - `CATALOG_REQUEST_TIMEOUT_SECS` - Request timeout (default: 10)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

use commands::products::{Catalog, ProductEdits};

#[derive(Parser)]
#[command(name = "stock-cli")]
#[command(author, version, about = "Stockroom catalog CLI")]
struct Cli {
    /// Use a seeded in-memory catalog instead of the remote service
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage products
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List products
    List {
        /// Case-insensitive match on name or category
        #[arg(short, long)]
        search: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Create a product
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        category: String,

        #[arg(short, long, allow_negative_numbers = true)]
        price: Decimal,

        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        quantity: i64,

        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Change fields of a product; unspecified fields keep their value
    Update {
        id: i32,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long, allow_negative_numbers = true)]
        price: Option<Decimal>,

        #[arg(short, long, allow_negative_numbers = true)]
        quantity: Option<i64>,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a product
    Delete { id: i32 },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = if cli.offline {
        Catalog::offline()
    } else {
        Catalog::connect()?
    };

    match cli.command {
        Commands::Products { action } => match action {
            ProductAction::List { search, json } => {
                commands::products::list(&catalog, search.as_deref().unwrap_or(""), json).await?;
            }
            ProductAction::Create {
                name,
                category,
                price,
                quantity,
                description,
            } => {
                let input = stockroom_core::ProductInput::new(name, category, price, quantity)
                    .with_description(description);
                commands::products::create(&catalog, input).await?;
            }
            ProductAction::Update {
                id,
                name,
                category,
                price,
                quantity,
                description,
            } => {
                let edits = ProductEdits {
                    name,
                    description,
                    category,
                    price,
                    quantity,
                };
                commands::products::update(&catalog, id, edits).await?;
            }
            ProductAction::Delete { id } => commands::products::delete(&catalog, id).await?,
        },
    }
    Ok(())
}
