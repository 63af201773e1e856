// conmon/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging (Tracing)
    // RUST_LOG=debug conmon evaluate ... pour voir les détails
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Evaluate {
            project_dir,
            resources,
            output,
            skip_backlog,
            source,
        } => commands::evaluate::execute(project_dir, resources, output, skip_backlog, source).await,
        Commands::Checks {
            project_dir,
            source,
        } => commands::checks::execute(project_dir, source).await,
        Commands::Sync { project_dir } => commands::sync::execute(project_dir).await,
        Commands::Export {
            project_dir,
            table,
            output,
        } => commands::transfer::export(project_dir, table, output).await,
        Commands::Import {
            project_dir,
            table,
            input,
        } => commands::transfer::import(project_dir, table, input).await,
    };

    if let Err(e) = result {
        // Exit code != 0 pour la CI
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
