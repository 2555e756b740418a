use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::commands::ResetArgs;
use crate::config;
use crate::db::Database;
use crate::errors::AltscoutError;

pub async fn handle_reset(config_path: &str, args: ResetArgs) -> Result<(), AltscoutError> {
    let config = config::load_config(Path::new(config_path)).await?;
    let store = args.db.map(PathBuf::from).unwrap_or(config.store.path);
    let db = Database::new(&store)?;
    reset_store(&db, args.pages)?;
    info!(store = %store.display(), pages = args.pages, "Run state cleared");
    println!("Run state cleared: {}", store.display());
    Ok(())
}

pub fn reset_store(db: &Database, include_pages: bool) -> Result<(), AltscoutError> {
    if include_pages {
        db.reset_run_state()
    } else {
        db.clear_task_flags()
    }
}
