//! Server command implementation

use std::path::Path;

use anyhow::Result;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    dev_user: &str,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    println!("🚀 Starting Recur API server...");
    println!("   Database: {}", db.path());
    println!("   Listening: http://{}:{}", host, port);

    if no_auth {
        println!();
        println!("   ⚠️  No auth: keep this bound to localhost");
        println!("      Unauthenticated requests act as '{}'", dev_user);
    } else {
        println!(
            "   🔒 Authentication: {} header from the fronting proxy",
            recur_server::AUTH_USER_HEADER
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Ctrl+C stops the server");

    let config = recur_server::ServerConfig {
        require_auth: !no_auth,
        dev_user: dev_user.to_string(),
        ..Default::default()
    };

    recur_server::serve_with_config(db, host, port, config).await?;

    Ok(())
}
