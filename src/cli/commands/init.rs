//! Implementation of the `percolator init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, DatabaseConfig};
use crate::infrastructure::config::CONFIG_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: bool,
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("\nWrote {CONFIG_DIR}/config.yaml"));
        }
        lines.push(format!("Database ready at {}", self.database_path.display()));
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, config: &Config, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().context("Failed to get current directory")?.join(&args.path)
    };

    let config_dir = target_path.join(CONFIG_DIR);
    fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let config_path = config_dir.join("config.yaml");
    let already_initialized = config_path.exists();
    let config_written = !already_initialized || args.force;
    if config_written {
        let yaml = serde_yaml::to_string(&Config::default()).context("Failed to render default config")?;
        fs::write(&config_path, yaml)
            .await
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }

    // A relative database path is resolved against the target directory
    let database_path = target_path.join(&config.database.path);
    let database = DatabaseConfig {
        path: database_path.display().to_string(),
        ..config.database.clone()
    };
    initialize_database(&database).await.context("Failed to initialize database")?;

    let message = match (already_initialized, args.force) {
        (false, _) => "Project initialized successfully.",
        (true, true) => "Project reinitialized with default configuration.",
        (true, false) => "Project already initialized; configuration left unchanged. Use --force to overwrite.",
    };

    let out = InitOutput {
        success: true,
        message: message.to_string(),
        initialized_path: target_path,
        config_written,
        database_path,
    };
    output(&out, json_mode);
    Ok(())
}
