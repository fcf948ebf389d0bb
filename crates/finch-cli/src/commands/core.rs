//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `open_engine` - Database plus a notification engine configured from the environment
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use finch_core::{Database, NotificationEngine};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Open the database and build an engine around it
///
/// Picks up the AI backend, engine config override, and push webhook the
/// same way the server does.
pub fn open_engine(db_path: &Path, no_encrypt: bool) -> Result<NotificationEngine> {
    let db = open_db(db_path, no_encrypt)?;
    Ok(finch_server::engine_from_env(db))
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let _db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import history: finch import --file history.csv");
    println!("  2. Try a trigger:  finch sample");
    println!("  3. Start the API:  finch serve");

    Ok(())
}
