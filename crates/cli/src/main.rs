// smeta CLI - estimate ingestion and self-check

mod estimate;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use smeta_config::Settings;

use exit_codes::{EXIT_CONFIG, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "smeta")]
#[command(about = "Local estimate ingestion: cost tree, persistence, self-check")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Settings file (default: platform config dir, see `smeta config-path`)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an estimate file and store its cost tree under a record
    #[command(after_help = "\
Examples:
  smeta register '02-01-01 Земляные работы'
  smeta ingest estimate.xml --record 1
  smeta ingest estimate.xml --record 1 --db ./smeta.db --json
  smeta ingest estimate.xml --record 1 --no-validate")]
    Ingest {
        /// Estimate XML file
        file: PathBuf,

        /// Id of the owning estimate record
        #[arg(long)]
        record: i64,

        /// SQLite database (overrides settings)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Skip the validation report
        #[arg(long)]
        no_validate: bool,
    },

    /// Parse and validate an estimate file without touching a database
    #[command(after_help = "\
Examples:
  smeta check estimate.xml
  smeta check estimate.xml --json | jq '.validation'")]
    Check {
        /// Estimate XML file
        file: PathBuf,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,
    },

    /// Create an estimate record and print its id
    Register {
        /// Record name
        name: String,

        /// SQLite database (overrides settings)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print the settings file location
    ConfigPath,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  smeta-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings, CliError> {
    match path {
        Some(path) => Settings::load_from(path).map_err(|e| CliError {
            code: EXIT_CONFIG,
            message: e.to_string(),
            hint: None,
        }),
        None => Ok(Settings::load()),
    }
}

fn init_logging(cli: &Cli, settings: &Settings) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log.filter.as_str()),
    );
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = load_settings(cli.config.as_ref())?;
    init_logging(&cli, &settings);

    match cli.command {
        Commands::Ingest { file, record, db, json, no_validate } => {
            estimate::cmd_ingest(file, record, db, json, no_validate, &settings)
        }
        Commands::Check { file, json } => estimate::cmd_check(file, json, &settings),
        Commands::Register { name, db } => estimate::cmd_register(name, db, &settings),
        Commands::ConfigPath => {
            println!("{}", Settings::config_path().display());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ingest_requires_record() {
        assert!(Cli::try_parse_from(["smeta", "ingest", "a.xml"]).is_err());
        let cli = Cli::try_parse_from(["smeta", "-v", "ingest", "a.xml", "--record", "3"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Ingest { record: 3, .. }));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["smeta", "-v", "-q", "config-path"]).is_err());
    }
}
