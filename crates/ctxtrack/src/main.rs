mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::history::HistoryFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { workspace, db } => {
            commands::watch::run(workspace.as_deref(), db.as_deref())
        }
        Commands::Latest { db } => commands::latest::run(db.as_deref()),
        Commands::Conversations { db } => commands::conversations::run(db.as_deref()),
        Commands::History {
            stats,
            file,
            hours,
            limit,
        } => commands::history::run(stats, HistoryFilter { file, hours, limit }),
        Commands::Status => commands::status::run(),
        Commands::Version => commands::version::run(),
    }
}
