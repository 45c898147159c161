//! Rely CLI - declare which files rely on which, and find the stale ones.
//!
//! Run `rely` or `rely status` inside a git repository to see every tracked
//! file whose parents changed after it did.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rely_core::{Timestamp, Walk};
use rely_ops::{ColorMode, Config, OpsError, RelyContext};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

use commands::{config as config_cmd, edit, graph, status};

/// Rely CLI - track reliance between files and report staleness.
///
/// A file is stale when something it relies on was modified after it.
#[derive(Parser, Debug)]
#[command(
    name = "rely",
    author,
    version,
    about = "Rely: track file reliance in a git repository and report stale files",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Run as if started in DIR
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// When to colour output: auto, always or never
    #[arg(long, global = true, value_name = "WHEN")]
    color: Option<ColorMode>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Repo(RepoCommands),

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Commands that work on the repository enclosing the working directory.
#[derive(Subcommand, Debug)]
enum RepoCommands {
    /// Create an empty relations store.
    Init,

    /// Declare that every FILE relies on every PARENT.
    ///
    /// All edges are added or none: a single cycle rejects the whole batch.
    Add {
        /// Dependent files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Files they rely on.
        #[arg(long = "on", required = true, num_args = 1.., value_name = "PARENT")]
        parents: Vec<PathBuf>,
    },

    /// Drop reliance edges.
    Remove {
        /// Dependent files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Parents to drop.
        #[arg(long = "on", required = true, num_args = 1.., value_name = "PARENT")]
        parents: Vec<PathBuf>,
    },

    /// Mark files as safe: never reported as a reason for staleness.
    Safe {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Clear the safe flag.
    Unsafe {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Record that files are up to date as of now (or --at).
    Touch {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// RFC 3339 timestamp or unix seconds.
        #[arg(long, value_parser = parse_instant)]
        at: Option<Timestamp>,
    },

    /// Clear the touch override.
    Untouch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Report staleness (default command).
    Status {
        /// Files to report on (defaults to every tracked file).
        files: Vec<PathBuf>,

        /// Only list stale files.
        #[arg(long)]
        problems: bool,

        /// Exit with status 1 when anything is stale.
        #[arg(long)]
        check: bool,

        /// Print reports as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the files FILE relies on directly.
    Parents { file: PathBuf },

    /// List the files that rely on FILE directly.
    Children { file: PathBuf },

    /// Show everything FILE relies on, transitively.
    Ancestors {
        file: PathBuf,

        /// Print Graphviz DOT instead of a tree.
        #[arg(long, conflicts_with = "json")]
        dot: bool,

        /// Print JSON instead of a tree.
        #[arg(long)]
        json: bool,
    },

    /// Show everything that relies on FILE, transitively.
    Descendants {
        file: PathBuf,

        /// Print Graphviz DOT instead of a tree.
        #[arg(long, conflicts_with = "json")]
        dot: bool,

        /// Print JSON instead of a tree.
        #[arg(long)]
        json: bool,
    },

    /// Move a tracked file's relations to its new path.
    Mv { from: PathBuf, to: PathBuf },

    /// Forget files that carry no relations, flags or overrides.
    Prune,
}

impl RepoCommands {
    /// Commands for which "nothing tracked yet" is an answer, not a failure.
    fn tolerates_missing_store(&self) -> bool {
        matches!(
            self,
            RepoCommands::Remove { .. }
                | RepoCommands::Unsafe { .. }
                | RepoCommands::Untouch { .. }
                | RepoCommands::Status { .. }
                | RepoCommands::Parents { .. }
                | RepoCommands::Children { .. }
                | RepoCommands::Ancestors { .. }
                | RepoCommands::Descendants { .. }
                | RepoCommands::Prune
        )
    }
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Configuration key.
        key: String,
        /// Configuration value.
        value: String,
    },

    /// Get a configuration value.
    Get {
        /// Configuration key.
        key: String,
    },

    /// Reset configuration to defaults.
    Reset,

    /// Show path to config file.
    Path,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

/// Setup tracing based on verbosity. `RUST_LOG` wins when set.
fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let builder = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if std::env::var_os("RUST_LOG").is_some() {
        builder.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        builder.with_max_level(level).init();
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load()?;
    if let Some(color) = cli.color {
        config.color = color;
    }
    apply_color(config.color);

    let command = match cli.command {
        Some(Commands::Config(config_cmd_inner)) => {
            run_config(&config, config_cmd_inner)?;
            return Ok(ExitCode::SUCCESS);
        }
        Some(Commands::Repo(command)) => command,
        None => RepoCommands::Status {
            files: vec![],
            problems: false,
            check: false,
            json: false,
        },
    };

    let cwd = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot read the current directory")?,
    };
    let ctx = RelyContext::open(config, &cwd)?;
    let tolerant = command.tolerates_missing_store();

    match dispatch(&ctx, command, cli.verbose, cli.quiet) {
        Err(err) if tolerant && is_missing_store(&err) => {
            if !cli.quiet {
                println!("no relations store found; run `rely init`");
            }
            Ok(ExitCode::SUCCESS)
        }
        other => other,
    }
}

fn run_config(config: &Config, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => config_cmd::show(config)?,
        ConfigCommands::Set { key, value } => config_cmd::set(&key, &value)?,
        ConfigCommands::Get { key } => config_cmd::get(config, &key)?,
        ConfigCommands::Reset => config_cmd::reset()?,
        ConfigCommands::Path => match Config::config_file_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("(no config file path available)"),
        },
    }
    Ok(())
}

fn dispatch(
    ctx: &RelyContext,
    command: RepoCommands,
    verbose: bool,
    quiet: bool,
) -> Result<ExitCode> {
    match command {
        RepoCommands::Init => edit::init(ctx, quiet)?,
        RepoCommands::Add { files, parents } => edit::add(ctx, files, parents, quiet)?,
        RepoCommands::Remove { files, parents } => edit::remove(ctx, files, parents, quiet)?,
        RepoCommands::Safe { files } => edit::safe(ctx, &files, true, quiet)?,
        RepoCommands::Unsafe { files } => edit::safe(ctx, &files, false, quiet)?,
        RepoCommands::Touch { files, at } => {
            edit::touch(ctx, files, Some(at.unwrap_or_else(chrono::Utc::now)), quiet)?
        }
        RepoCommands::Untouch { files } => edit::touch(ctx, files, None, quiet)?,
        RepoCommands::Mv { from, to } => edit::rename(ctx, &from, &to, quiet)?,
        RepoCommands::Prune => edit::prune(ctx, quiet)?,

        RepoCommands::Status {
            files,
            problems,
            check,
            json,
        } => {
            let stale = status::execute(ctx, files, problems, json, verbose, quiet)?;
            if check && stale {
                return Ok(ExitCode::from(1));
            }
        }

        RepoCommands::Parents { file } => graph::neighbors(ctx, &file, Walk::Ancestors)?,
        RepoCommands::Children { file } => graph::neighbors(ctx, &file, Walk::Descendants)?,
        RepoCommands::Ancestors { file, dot, json } => {
            graph::closure(ctx, &file, Walk::Ancestors, graph::Format::pick(dot, json))?
        }
        RepoCommands::Descendants { file, dot, json } => {
            graph::closure(ctx, &file, Walk::Descendants, graph::Format::pick(dot, json))?
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn is_missing_store(err: &anyhow::Error) -> bool {
    err.downcast_ref::<OpsError>()
        .is_some_and(OpsError::is_missing_store)
}

fn apply_color(mode: ColorMode) {
    let enabled = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal(),
    };
    colored::control::set_override(enabled);
}

/// Parse `--at`: RFC 3339 or integer unix seconds.
fn parse_instant(value: &str) -> Result<Timestamp, String> {
    if let Ok(at) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&chrono::Utc));
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| format!("expected an RFC 3339 timestamp or unix seconds, got {:?}", value))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_add_splits_files_and_parents() {
        let cli = Cli::parse_from(["rely", "add", "a.c", "b.c", "--on", "x.h", "y.h"]);
        match cli.command {
            Some(Commands::Repo(RepoCommands::Add { files, parents })) => {
                assert_eq!(files, vec![PathBuf::from("a.c"), PathBuf::from("b.c")]);
                assert_eq!(parents, vec![PathBuf::from("x.h"), PathBuf::from("y.h")]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_config_is_separate_from_repository_commands() {
        let cli = Cli::parse_from(["rely", "config", "get", "color"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config(ConfigCommands::Get { .. }))
        ));

        let cli = Cli::parse_from(["rely", "prune"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Repo(RepoCommands::Prune))
        ));

        assert!(Cli::parse_from(["rely"]).command.is_none());
    }

    #[test]
    fn test_parse_instant() {
        let rfc = parse_instant("2024-01-02T03:04:05Z").unwrap();
        assert_eq!(rfc.timestamp(), 1_704_164_645);
        assert_eq!(parse_instant("1700000000").unwrap().timestamp(), 1_700_000_000);
        assert!(parse_instant("yesterday").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["rely", "status", "--color", "never", "-C", "/tmp"]);
        assert_eq!(cli.color, Some(ColorMode::Never));
        assert_eq!(cli.directory, Some(PathBuf::from("/tmp")));
    }
}
