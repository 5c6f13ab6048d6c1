//! Recur CLI - Recurring transaction detector
//!
//! Usage:
//!   recur init                                Initialize database
//!   recur import --file batch.json --user ID  Import a transaction batch
//!   recur recurring --user ID                 Show active recurring groups
//!   recur reset --user ID                     Delete a user's transactions
//!   recur serve --port 3000                   Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // RUST_LOG wins, then --verbose, then info
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt).map(|_| ()),
        Commands::Import { file, user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_import(&db, &file, &user).map(|_| ())
        }
        Commands::Recurring { user, as_of, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_recurring(&db, &user, as_of.as_deref(), json)
        }
        Commands::Reset { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_reset(&db, &user).map(|_| ())
        }
        Commands::Merchant { description } => commands::cmd_merchant(&description),
        Commands::Serve {
            port,
            host,
            no_auth,
            dev_user,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, &dev_user, cli.no_encrypt).await,
    }
}
