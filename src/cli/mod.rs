//! Command-line interface for the percolator.

pub mod commands;
pub mod output;
pub mod types;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::sqlite::{initialize_database, SqliteBlueprintStore};
use crate::domain::errors::{DomainError, ErrorKind};
use crate::domain::models::Config;

pub use types::{Cli, Commands};

/// Open the configured database with migrations applied.
pub async fn open_store(config: &Config) -> Result<Arc<SqliteBlueprintStore>> {
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to open database. Run 'percolator init' first.")?;
    Ok(Arc::new(SqliteBlueprintStore::new(pool)))
}

/// Exit code for an error, distinguishing caller mistakes from internal failures.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DomainError>().map(DomainError::kind) {
        Some(ErrorKind::NotFound) => 2,
        Some(ErrorKind::Validation | ErrorKind::InvalidState) => 3,
        Some(ErrorKind::Conflict | ErrorKind::ResourceExhausted | ErrorKind::BudgetExceeded) => 4,
        Some(ErrorKind::Internal) | None => 1,
    }
}

/// Report `err` in the selected output mode and exit.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(exit_code(&err))
}
