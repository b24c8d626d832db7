//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};

use crate::cli::commands::{blueprint::BlueprintArgs, init::InitArgs, percolate::PercolateArgs};

#[derive(Parser, Debug)]
#[command(name = "percolator")]
#[command(about = "Percolator - iterative blueprint hardening", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize percolator configuration and database
    Init(InitArgs),

    /// Submit and inspect blueprints
    Blueprint(BlueprintArgs),

    /// Run the percolation loop on a pending blueprint
    Percolate(PercolateArgs),
}
