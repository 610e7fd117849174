//! Command-line front end for the `veris` binary.
//!
//! Argument parsing uses clap derive; terminal rendering lives in
//! [`output`].

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Veris - verified multi-agent research
///
/// Routes a question through research, fact-checking, synthesis and
/// evaluation agents and prints a cited report.
#[derive(Parser, Debug)]
#[command(
    name = "veris",
    version,
    about = "Verified multi-agent research from the command line",
    after_help = "EXAMPLES:\n    \
                  veris init                                  # Write veris.toml and .env.example\n    \
                  veris research \"Does caffeine affect sleep?\"\n    \
                  veris research \"...\" --no-web --docs notes.txt paper.txt\n    \
                  veris sessions list --limit 5\n    \
                  veris config --validate"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "veris.toml", global = true)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter veris.toml and .env.example
    Init {
        /// Directory to initialize
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Completion backend to configure (ollama or openai)
        #[arg(long, default_value = "ollama")]
        provider: String,
    },

    /// Research a question and print the report
    Research {
        /// The research question
        query: String,

        /// Skip web search
        #[arg(long)]
        no_web: bool,

        /// Skip the document index
        #[arg(long)]
        no_rag: bool,

        /// Text files to load into the document index first
        #[arg(long, num_args = 1..)]
        docs: Vec<PathBuf>,

        /// Print the full run record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect saved research sessions
    #[command(subcommand)]
    Sessions(SessionCommands),

    /// Show the effective configuration
    Config {
        /// Only check that the configuration is valid
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List the most recent sessions
    List {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Print a saved session's report
    Show {
        id: String,

        /// Print the full run record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a saved session
    Delete { id: String },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
