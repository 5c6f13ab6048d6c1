//! Store lifecycle commands: `open_db`, `init`, `reset`

use std::path::Path;

use anyhow::{Context, Result};
use recur_core::db::Database;

/// Open the store at `db_path`; encrypted unless `--no-encrypt`
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    println!("   Schema ready in {}", db.path());

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Ready for transactions");
    println!();
    println!("Next steps:");
    println!("  1. Import transactions: recur import --file batch.json --user <id>");
    println!("  2. Start the API: recur serve");

    Ok(db)
}

pub fn cmd_reset(db: &Database, user: &str) -> Result<usize> {
    let deleted = db
        .delete_transactions(user)
        .with_context(|| format!("Failed to delete transactions for {}", user))?;
    println!("🗑️  Deleted {} transactions for {}", deleted, user);
    Ok(deleted)
}
