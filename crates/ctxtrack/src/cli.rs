use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ctxtrack")]
#[command(version)]
#[command(about = "Attribute workspace edits to AI chat responses")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch a workspace and correlate edits with new assistant responses
    Watch {
        /// Workspace root (defaults to the current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Path to state.vscdb (auto-detected if omitted)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print the most recent assistant response
    Latest {
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List conversations in the chat store
    Conversations {
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// View attribution history
    History {
        /// Show statistics summary
        #[arg(long)]
        stats: bool,

        /// Only responses that touched this file
        #[arg(long)]
        file: Option<String>,

        /// Only responses from the last N hours
        #[arg(long)]
        hours: Option<u64>,

        /// Maximum number of responses to list (default 20)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show configuration and store status
    Status,

    /// Print version information
    Version,
}
