//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Recur - Find the recurring charges in your transactions
#[derive(Parser)]
#[command(name = "recur")]
#[command(about = "Recurring transaction detector", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "recur.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set RECUR_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import a JSON batch of transactions
    Import {
        /// JSON file containing an array of transactions
        #[arg(short, long)]
        file: PathBuf,

        /// User the batch is imported for (every item must belong to them)
        #[arg(short, long)]
        user: String,
    },

    /// Show a user's active recurring groups
    Recurring {
        /// User to report on
        #[arg(short, long)]
        user: String,

        /// Evaluate staleness as of this date (YYYY-MM-DD, default today)
        #[arg(long)]
        as_of: Option<String>,

        /// Print groups as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete all of a user's stored transactions
    Reset {
        /// User whose transactions are removed
        #[arg(short, long)]
        user: String,
    },

    /// Show the merchant key extracted from a description
    Merchant {
        /// Raw transaction description
        description: String,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        #[arg(long)]
        no_auth: bool,

        /// User that unauthenticated requests act as when --no-auth is set
        #[arg(long, default_value = recur_server::DEFAULT_DEV_USER)]
        dev_user: String,
    },
}
