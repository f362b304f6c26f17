use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use traintrack_core::config::{Config, StatusStoreKind};
use traintrack_core::execution::{ExecutionStatus, RedbStatusStore, StatusStore};
use traintrack_core::paths;

/// Reads the persistent status store. A running server holds the store open,
/// so this works against a stopped server only.
pub fn run(root: &Path, model_id: &str, json: bool) -> anyhow::Result<()> {
    paths::validate_id(model_id)?;
    let config = Config::load(root).context("failed to load config")?;

    let status = match config.execution.status_store {
        StatusStoreKind::Memory => ExecutionStatus::NotStarted,
        StatusStoreKind::Persistent => {
            let db = paths::status_db_path(root);
            if db.exists() {
                let store = RedbStatusStore::open_read_only(&db)
                    .context("failed to open status store")?;
                store.get(model_id)?.unwrap_or(ExecutionStatus::NotStarted)
            } else {
                ExecutionStatus::NotStarted
            }
        }
    };

    if json {
        print_json(&serde_json::json!({ "model_id": model_id, "status": status }))?;
    } else {
        println!("{model_id}: {status}");
    }
    Ok(())
}
