//! Status command implementation

use std::path::Path;

use anyhow::Result;
use finch_core::db::DB_KEY_ENV;
use finch_core::{AIClient, PushDispatcher};

use super::open_db;

pub async fn cmd_status(db_path: &Path, no_encrypt: bool) -> Result<()> {
    use std::fs;

    println!();
    println!("📊 Finch Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                if let Ok(users) = db.list_user_ids() {
                    println!();
                    println!("   Users with finance data: {}", users.len());
                }
                let push = PushDispatcher::from_env(db);
                println!("   Push transport: {}", push.transport_name());
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    match AIClient::from_env() {
        Some(client) => {
            let status = client.status().await;
            let icon = if status.healthy { "✅" } else { "⚠️ " };
            println!(
                "   {} AI backend: {} at {} ({})",
                icon, status.backend, status.host, status.model
            );
            if !status.healthy {
                println!("      Not responding - notification templates will be used");
            }
        }
        None => {
            println!("   ℹ️  AI backend: not configured (templates only)");
            println!("      Set OLLAMA_HOST or AI_BACKEND=openai_compatible to enable");
        }
    }

    println!();
    Ok(())
}
