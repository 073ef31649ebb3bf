//! Root CLI structure for lithtech-rs

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lithtech-rs")]
#[command(about = "Command-line tools for LithTech model files", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display information about a model file (LTB or ABC)
    Info {
        /// Path to the model file
        file: PathBuf,

        /// Show the skeleton tree and animation table
        #[arg(short, long)]
        detailed: bool,
    },

    /// Convert a model file; the output format follows the extension
    /// (.abc or .lta)
    Convert {
        /// Input model file (PC LTB, PS2 LTB, or ABC)
        input: PathBuf,

        /// Output file; must end in .abc or .lta
        output: PathBuf,
    },
}
