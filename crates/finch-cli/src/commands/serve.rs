//! Server command implementation

use std::path::Path;

use anyhow::Result;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Finch API server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let mut config = finch_server::ServerConfig::from_env();
    if no_auth {
        config.require_auth = false;
    }

    if !config.require_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        if config.jwt_secret.is_some() {
            println!("   🔐 Authentication: JWT (FINCH_JWT_SECRET)");
        }
        if !config.api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured (FINCH_API_KEYS)",
                config.api_keys.len()
            );
        }
    }
    match finch_server::SweepScheduleConfig::from_env() {
        Some(sweeps) => println!("   ⏰ Reminder sweeps: every {} min", sweeps.interval_minutes),
        None => println!("   ⏰ Reminder sweeps: disabled"),
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;
    finch_server::serve_with_config(db, host, port, config).await?;

    Ok(())
}
