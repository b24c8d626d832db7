//! Blueprint submission and inspection commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::cli::open_store;
use crate::cli::output::{output, render_table, short_id, truncate, CommandOutput};
use crate::domain::models::{
    Blueprint, BlueprintStatus, Config, Hole, HoleStatus, Optimization, PercolationDepth,
    PercolationLogEntry,
};
use crate::services::{BlueprintService, ConfidenceBreakdown, EventBus, EventBusConfig, Optimizer};

#[derive(Args, Debug)]
pub struct BlueprintArgs {
    #[command(subcommand)]
    pub command: BlueprintCommands,
}

#[derive(Subcommand, Debug)]
pub enum BlueprintCommands {
    /// Submit a blueprint from a file, or `-` for stdin
    Submit {
        file: PathBuf,

        /// Percolation depth (quick, standard, thorough, exhaustive)
        #[arg(short, long, default_value = "standard")]
        depth: String,
    },

    /// List blueprints
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of blueprints to display
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show a blueprint with its confidence breakdown
    Show {
        id: Uuid,

        /// Include the current content
        #[arg(long)]
        content: bool,
    },

    /// List holes found in a blueprint
    Holes {
        id: Uuid,

        /// Filter by status (open, patched, wont_fix)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show the percolation audit log
    Log { id: Uuid },

    /// Append an optimization, charging its token cost to the budget
    Optimize {
        id: Uuid,

        /// Where the improvement came from
        #[arg(long)]
        source: String,

        /// Short description of the improvement
        #[arg(long)]
        description: String,

        /// File holding the content to append, or `-` for stdin
        file: PathBuf,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct BlueprintOutput {
    pub id: String,
    pub status: String,
    pub depth: String,
    pub budget_tokens: u64,
    pub tokens_used: u64,
    pub confidence_score: f64,
    pub submitted_at: String,
    pub completed_at: Option<String>,
}

impl From<&Blueprint> for BlueprintOutput {
    fn from(bp: &Blueprint) -> Self {
        Self {
            id: bp.id.to_string(),
            status: bp.status.to_string(),
            depth: bp.depth.to_string(),
            budget_tokens: bp.budget_tokens,
            tokens_used: bp.tokens_used,
            confidence_score: bp.confidence_score,
            submitted_at: bp.submitted_at.to_rfc3339(),
            completed_at: bp.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BlueprintActionOutput {
    pub success: bool,
    pub message: String,
    pub blueprint: BlueprintOutput,
}

impl CommandOutput for BlueprintActionOutput {
    fn to_human(&self) -> String {
        format!(
            "{}\n  Depth: {}\n  Budget: {} tokens",
            self.message, self.blueprint.depth, self.blueprint.budget_tokens
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BlueprintListOutput {
    pub blueprints: Vec<BlueprintOutput>,
    pub total: usize,
}

impl CommandOutput for BlueprintListOutput {
    fn to_human(&self) -> String {
        if self.blueprints.is_empty() {
            return "No blueprints found.".to_string();
        }

        let rows = self.blueprints.iter().map(|bp| {
            vec![
                bp.id[..8].to_string(),
                bp.status.clone(),
                bp.depth.clone(),
                format!("{}/{}", bp.tokens_used, bp.budget_tokens),
                format!("{:.3}", bp.confidence_score),
                bp.submitted_at.clone(),
            ]
        });
        format!(
            "Found {} blueprint(s):\n{}",
            self.total,
            render_table(&["ID", "STATUS", "DEPTH", "TOKENS", "CONFIDENCE", "SUBMITTED"], rows)
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BlueprintDetailOutput {
    pub blueprint: BlueprintOutput,
    pub breakdown: ConfidenceBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl CommandOutput for BlueprintDetailOutput {
    fn to_human(&self) -> String {
        let bp = &self.blueprint;
        let b = &self.breakdown;
        let mut lines = vec![
            format!("Blueprint: {}", bp.id),
            format!("Status: {}", bp.status),
            format!("Depth: {}", bp.depth),
            format!("Tokens: {}/{}", bp.tokens_used, bp.budget_tokens),
            format!("Confidence: {:.3} (recomputed {:.3})", bp.confidence_score, b.score),
            format!("Submitted: {}", bp.submitted_at),
        ];
        if let Some(done) = &bp.completed_at {
            lines.push(format!("Completed: {done}"));
        }
        lines.push(String::new());
        lines.push(format!(
            "Holes: {} total, {} patched, {} open",
            b.total_holes, b.patched_holes, b.open_holes
        ));
        lines.push(format!("Stress tests: {} run, {} passed", b.test_runs, b.passed_tests));
        lines.push(format!("Optimizations: {}", b.optimizations));

        if let Some(content) = &self.content {
            lines.push(String::new());
            lines.push(content.clone());
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct HoleListOutput {
    pub holes: Vec<Hole>,
    pub total: usize,
}

impl CommandOutput for HoleListOutput {
    fn to_human(&self) -> String {
        if self.holes.is_empty() {
            return "No holes found.".to_string();
        }
        let rows = self.holes.iter().map(|h| {
            vec![
                short_id(&h.id),
                h.hole_type.to_string(),
                h.severity.to_string(),
                h.status.to_string(),
                truncate(&h.description, 60),
            ]
        });
        format!(
            "Found {} hole(s):\n{}",
            self.total,
            render_table(&["ID", "TYPE", "SEVERITY", "STATUS", "DESCRIPTION"], rows)
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct LogOutput {
    pub entries: Vec<PercolationLogEntry>,
}

impl CommandOutput for LogOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No log entries.".to_string();
        }
        self.entries
            .iter()
            .map(|e| format!("{}  {:<20} {}", e.created_at.to_rfc3339(), e.action, e.details))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct OptimizationOutput {
    pub success: bool,
    pub optimization: Optimization,
}

impl CommandOutput for OptimizationOutput {
    fn to_human(&self) -> String {
        format!(
            "Optimization applied: {}\n  Source: {}\n  Token cost: {}",
            self.optimization.id, self.optimization.source, self.optimization.token_cost
        )
    }
}

pub async fn execute(args: BlueprintArgs, config: &Config, json_mode: bool) -> Result<()> {
    let store = open_store(config).await?;
    let service = BlueprintService::new(store.clone(), config.percolation.depths.clone(), config.limits);

    match args.command {
        BlueprintCommands::Submit { file, depth } => {
            let depth = PercolationDepth::from_str(&depth).ok_or_else(|| anyhow!("Invalid depth: {depth}"))?;
            let content = read_input(&file).await?;
            let blueprint = service.submit(&content, depth).await?;

            let out = BlueprintActionOutput {
                success: true,
                message: format!("Blueprint submitted: {}", blueprint.id),
                blueprint: BlueprintOutput::from(&blueprint),
            };
            output(&out, json_mode);
        }

        BlueprintCommands::List { status, limit } => {
            let status = status
                .map(|s| BlueprintStatus::from_str(&s).ok_or_else(|| anyhow!("Invalid status: {s}")))
                .transpose()?;
            let blueprints = service.list(status, limit).await?;
            let out = BlueprintListOutput {
                total: blueprints.len(),
                blueprints: blueprints.iter().map(BlueprintOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        BlueprintCommands::Show { id, content } => {
            let report = service.report(id).await?;
            let out = BlueprintDetailOutput {
                blueprint: BlueprintOutput::from(&report.blueprint),
                breakdown: report.breakdown,
                content: content.then(|| report.blueprint.current_content.clone()),
            };
            output(&out, json_mode);
        }

        BlueprintCommands::Holes { id, status } => {
            let status = status
                .map(|s| HoleStatus::from_str(&s).ok_or_else(|| anyhow!("Invalid hole status: {s}")))
                .transpose()?;
            let holes = service.holes(id, status).await?;
            let out = HoleListOutput {
                total: holes.len(),
                holes,
            };
            output(&out, json_mode);
        }

        BlueprintCommands::Log { id } => {
            let entries = service.logs(id).await?;
            output(&LogOutput { entries }, json_mode);
        }

        BlueprintCommands::Optimize {
            id,
            source,
            description,
            file,
        } => {
            let content = read_input(&file).await?;
            let events = Arc::new(EventBus::new(EventBusConfig {
                channel_capacity: config.percolation.event_channel_capacity,
            }));
            let optimizer = Optimizer::new(store, events, config.limits);
            let optimization = optimizer.apply_optimization(id, &source, &description, &content).await?;
            let out = OptimizationOutput {
                success: true,
                optimization,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}

/// Read a file, or stdin when the path is `-`.
async fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{HoleCandidate, HoleSeverity, HoleType};

    #[test]
    fn test_list_output_renders_short_ids() {
        let bp = Blueprint::new("Plan.", PercolationDepth::Quick, 1_000);
        let out = BlueprintListOutput {
            total: 1,
            blueprints: vec![BlueprintOutput::from(&bp)],
        };
        let human = out.to_human();
        assert!(human.contains(&bp.id.to_string()[..8]));
        assert!(human.contains("pending"));
        assert!(human.contains("0/1000"));
    }

    #[test]
    fn test_empty_hole_list() {
        let out = HoleListOutput {
            holes: vec![],
            total: 0,
        };
        assert_eq!(out.to_human(), "No holes found.");
    }

    #[test]
    fn test_hole_list_json_keeps_full_records() {
        let hole = HoleCandidate::new(HoleType::MissingTimeout, HoleSeverity::Medium, "no timeout")
            .into_hole(Uuid::new_v4());
        let out = HoleListOutput {
            total: 1,
            holes: vec![hole.clone()],
        };
        let json = out.to_json();
        assert_eq!(json["holes"][0]["id"], hole.id.to_string());
        assert_eq!(json["holes"][0]["hole_type"], "missing_timeout");
    }

    #[tokio::test]
    async fn test_read_input_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plan.md");
        std::fs::write(&path, "# Plan\n").unwrap();
        assert_eq!(read_input(&path).await.unwrap(), "# Plan\n");
        assert!(read_input(&dir.path().join("missing.md")).await.is_err());
    }
}
