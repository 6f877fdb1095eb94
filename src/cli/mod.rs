//! CLI Module
//!
//! Command-line interface for inspecting and exercising placement sessions.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Furnish - persistent AR furniture placement
#[derive(Parser, Debug)]
#[command(name = "furnish")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Session configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the placements stored on disk
    #[command(name = "inspect")]
    Inspect {
        /// Store file (defaults to the configured store path)
        #[arg(short, long)]
        store: Option<PathBuf>,
    },

    /// Delete the stored placements and the saved map identifier
    #[command(name = "clear")]
    Clear,

    /// Run a full map, save, relaunch and relocalize cycle against a simulated engine
    #[command(name = "simulate")]
    Simulate {
        /// Directory to keep the simulated session's files in
        #[arg(short, long)]
        dir: PathBuf,

        /// Number of models to place before saving
        #[arg(short, long, default_value_t = 3)]
        placements: usize,
    },
}
