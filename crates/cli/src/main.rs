//! AM Popcorn CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (catalog, admin accounts, sessions)
//! popcorn-cli migrate
//!
//! # Seed the kiosk catalog if it is empty
//! popcorn-cli seed
//!
//! # Overwrite the seed products with their defaults (stock back to 20)
//! popcorn-cli seed --force
//!
//! # Create an admin account (password from POPCORN_ADMIN_PASSWORD if -p is omitted)
//! popcorn-cli admin create -e admin@ampopcorn.com.ar -p 'a long password'
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "popcorn-cli")]
#[command(author, version, about = "AM Popcorn CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog with the kiosk's products
    Seed {
        /// Overwrite existing seed products instead of skipping a non-empty catalog
        #[arg(long)]
        force: bool,
    },
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create an admin account, or reset its password
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin password
        #[arg(short, long, env = "POPCORN_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List admin accounts
    List,
    /// Delete an admin account
    Delete {
        /// Admin email address
        #[arg(short, long)]
        email: String,
    },
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
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { force } => commands::seed::catalog(force).await?,
        Commands::Admin { action } => match action {
            AdminAction::Create { email, password } => {
                commands::admin::create(&email, &password).await?;
            }
            AdminAction::List => commands::admin::list().await?,
            AdminAction::Delete { email } => commands::admin::delete(&email).await?,
        },
    }
    Ok(())
}
