use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "moshforged")]
#[command(author, version, about = "Datamosh AVI files by rewriting their video fragments")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mosh a single file
    Mosh {
        /// Input AVI file
        #[arg(required = true)]
        input: PathBuf,

        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Effect name: mosh, datamosh or byte_corruption
        #[arg(short, long, default_value = "mosh")]
        effect: String,

        /// Effect intensity
        #[arg(short, long, default_value = "0.5")]
        intensity: f64,

        /// Drop fragments at even positions
        #[arg(long)]
        remove: bool,

        /// Replay fragments at even positions
        #[arg(long)]
        duplicate: bool,

        /// Extra copies per replayed fragment
        #[arg(long, default_value = "20")]
        count: u32,

        /// Seed for randomized effects
        #[arg(long)]
        seed: Option<u64>,

        /// Print job events as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// List the chunk tree of an AVI file
    Inspect {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run every preset of an effect on one file
    Batch {
        /// Input AVI file
        #[arg(required = true)]
        input: PathBuf,

        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Effect name
        #[arg(short, long, default_value = "datamosh")]
        effect: String,

        /// Print job events as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
