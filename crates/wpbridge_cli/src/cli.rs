//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// wpbridge - Run legacy extensions on the host framework
#[derive(Parser)]
#[command(name = "wpbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Keep compiled artifacts in memory only
    #[arg(long, global = true)]
    pub no_cache: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// List detected extensions and the transformers resolved for them
    Discover {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the transformed source of a legacy file
    Compile {
        /// File to compile
        file: PathBuf,

        /// Owning extension (detected from the path by default)
        #[arg(short, long)]
        extension: Option<String>,
    },

    /// Precompile every file of every detected extension
    Warm,

    /// Load must-use plugins, active plugins and the active theme
    Load,

    /// Inspect compiled-artifact storage
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print the materialized artifact path of a legacy file
    Path {
        /// File to look up (compiled on a miss)
        file: PathBuf,
    },
}
