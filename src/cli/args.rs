//! Command-line argument parsing for kioskrag
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// kioskrag - answer campus questions from the knowledge base
#[derive(Parser, Debug)]
#[command(name = "kioskrag")]
#[command(version)]
#[command(about = "Retrieval-augmented answers for a campus information kiosk", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.kioskrag/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,

        /// Print the sources used for the answer
        #[arg(long)]
        show_context: bool,

        /// Only search documents in this category
        #[arg(long)]
        category: Option<String>,

        /// Only search documents in this language
        #[arg(long)]
        language: Option<String>,

        /// Print the full answer record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive session with conversation history
    Chat {
        /// Print the sources used for each answer
        #[arg(long)]
        show_context: bool,
    },

    /// Probe the generation backend and the vector store
    Health,

    /// Show knowledge base statistics
    Stats,

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Metadata filters from the `--category` / `--language` flags
pub fn metadata_filters(
    category: Option<&str>,
    language: Option<&str>,
) -> BTreeMap<String, String> {
    let mut filters = BTreeMap::new();
    if let Some(category) = category {
        filters.insert("category".to_string(), category.to_string());
    }
    if let Some(language) = language {
        filters.insert("language".to_string(), language.to_string());
    }
    filters
}
