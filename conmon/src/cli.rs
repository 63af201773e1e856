// conmon/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "conmon")]
#[command(about = "Continuous compliance monitoring: evaluate checks, persist results", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where checks come from.
#[derive(Args, Debug, Clone, Default)]
pub struct CheckSource {
    /// Load checks from the store (`checks` table) instead of YAML files
    #[arg(long)]
    pub from_store: bool,

    /// Only checks mapped to these controls (implies --from-store)
    #[arg(long, value_delimiter = ',')]
    pub controls: Vec<i64>,
}

impl CheckSource {
    pub fn uses_store(&self) -> bool {
        self.from_store || !self.controls.is_empty()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🔎 Evaluates every check over a resource collection and persists the results
    Evaluate {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// JSON array of resources (`id` + attributes)
        #[arg(long, short)]
        resources: PathBuf,

        /// Write the result statements to this file instead of the store
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Leave out checks whose custom logic still needs migration
        #[arg(long)]
        skip_backlog: bool,

        #[command(flatten)]
        source: CheckSource,
    },

    /// 📋 Lists the loaded checks and the custom-logic migration backlog
    Checks {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[command(flatten)]
        source: CheckSource,
    },

    /// 🔄 Upserts the YAML check definitions into the store
    Sync {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// 📤 Exports a store table to CSV
    Export {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long, short)]
        table: String,

        #[arg(long, short)]
        output: PathBuf,
    },

    /// 📥 Imports a CSV file into a store table (update by id, else insert)
    Import {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long, short)]
        table: String,

        #[arg(long, short)]
        input: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use clap::Parser;

    #[test]
    fn test_cli_parse_evaluate_defaults() -> Result<()> {
        let args = Cli::parse_from(["conmon", "evaluate", "--resources", "r.json"]);
        match args.command {
            Commands::Evaluate {
                project_dir,
                resources,
                output,
                skip_backlog,
                source,
            } => {
                assert_eq!(project_dir.to_string_lossy(), ".");
                assert_eq!(resources.to_string_lossy(), "r.json");
                assert!(output.is_none());
                assert!(!skip_backlog);
                assert!(!source.uses_store());
                Ok(())
            }
            _ => bail!("Expected Evaluate command"),
        }
    }

    #[test]
    fn test_cli_parse_controls() -> Result<()> {
        let args = Cli::parse_from(["conmon", "checks", "--controls", "10,20"]);
        match args.command {
            Commands::Checks { source, .. } => {
                assert_eq!(source.controls, vec![10, 20]);
                assert!(source.uses_store());
                Ok(())
            }
            _ => bail!("Expected Checks command"),
        }
    }

    #[test]
    fn test_cli_parse_import() -> Result<()> {
        let args = Cli::parse_from(["conmon", "import", "-t", "checks", "-i", "checks.csv"]);
        match args.command {
            Commands::Import { table, input, .. } => {
                assert_eq!(table, "checks");
                assert_eq!(input.to_string_lossy(), "checks.csv");
                Ok(())
            }
            _ => bail!("Expected Import command"),
        }
    }
}
