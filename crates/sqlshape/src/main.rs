//! sqlshape - describe SQL Server procedure result sets and table types

use clap::{Parser, Subcommand};
use sqlshape_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

mod cli;

use cli::config::{Overrides, Settings};
use cli::error::HelpfulError;

#[derive(Parser, Debug)]
#[command(
    name = "sqlshape",
    version,
    about = "Describe SQL Server procedure result sets and table types"
)]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: ./sqlshape.toml when present)
    #[arg(long, global = true, env = "SQLSHAPE_CONFIG")]
    config: Option<PathBuf>,

    /// ADO.NET connection string
    #[arg(long, global = true, env = "SQLSHAPE_CONNECTION", hide_env_values = true)]
    connection: Option<String>,

    /// Application root; result sets are cached under <DIR>/ResultSets
    #[arg(long, global = true, env = "SQLSHAPE_CONTENT_ROOT")]
    content_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Describe the first result set of a stored procedure
    Describe(cli::describe::DescribeArgs),

    /// List the columns of a user-defined table type
    TableType(cli::table_type::TableTypeArgs),

    /// Inspect cached result sets (no database required)
    Cache {
        #[command(subcommand)]
        action: cli::cache::CacheAction,
    },

    /// Show resolved configuration
    Config(cli::config::ConfigArgs),
}

fn run_command(command: Commands, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Commands::Describe(args) => cli::describe::run(args, settings),
        Commands::TableType(args) => cli::table_type::run(args, settings),
        Commands::Cache { action } => cli::cache::run(action, settings),
        Commands::Config(args) => cli::config::run(args, settings),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match init_logging(LogConfig {
        app_name: "sqlshape",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        Ok(path) => debug!(log_file = %path.display(), "Logging initialized"),
        Err(err) => eprintln!("Warning: failed to initialize logging: {:#}", err),
    }

    let result = Settings::resolve(Overrides {
        config_path: cli.config,
        connection: cli.connection,
        content_root: cli.content_root,
    })
    .map_err(anyhow::Error::from)
    .and_then(|settings| run_command(cli.command, &settings));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<HelpfulError>() {
                Some(helpful) => eprint!("{}", helpful),
                None => eprintln!("ERROR: {:#}", err),
            }
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_describe_with_global_flags() {
        let cli = Cli::try_parse_from([
            "sqlshape",
            "describe",
            "dbo.GetUsers",
            "--no-cache",
            "--content-root",
            "/srv/app",
        ])
        .unwrap();

        assert_eq!(cli.content_root, Some(PathBuf::from("/srv/app")));
        match cli.command {
            Commands::Describe(args) => {
                assert_eq!(args.object, "dbo.GetUsers");
                assert!(args.no_cache);
                assert!(args.tsql.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parses_cache_show() {
        let cli = Cli::try_parse_from(["sqlshape", "cache", "show", "dbo.GetUsers", "--json"])
            .unwrap();

        assert!(matches!(
            cli.command,
            Commands::Cache {
                action: cli::cache::CacheAction::Show { json: true, .. }
            }
        ));
    }
}
