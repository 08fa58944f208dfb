//! cellchar CLI: the command-line interface for standard-cell characterization.
//!
//! Provides `cellchar check` to validate a configuration without simulating,
//! and `cellchar characterize` to run the configured procedures and write
//! the resulting tables.

#![warn(missing_docs)]

mod characterize;
mod check;
mod pipeline;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// cellchar: characterize standard cells against a SPICE simulator.
#[derive(Parser, Debug)]
#[command(name = "cellchar", version, about = "Standard-cell characterization")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (`-v` info, `-vv` debug, `-vvv` trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `cellchar.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the configuration and list what would be characterized.
    Check(CheckArgs),
    /// Run the configured procedures.
    Characterize(CharacterizeArgs),
}

/// Arguments for `cellchar check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Cells to check (default: all).
    #[arg(long = "cell")]
    pub cells: Vec<String>,

    /// Print every resolved setting, not only the units.
    #[arg(long)]
    pub settings: bool,
}

/// Arguments for `cellchar characterize`.
#[derive(Parser, Debug)]
pub struct CharacterizeArgs {
    /// Cells to characterize, in order (default: all, by name).
    #[arg(long = "cell")]
    pub cells: Vec<String>,

    /// Worker threads; overrides `simulator.workers`.
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Write the report here instead of standard output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report and diagnostic format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Color when standard error is a terminal.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary.
    Text,
    /// The full report as JSON.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to the configuration file.
    pub config: Option<PathBuf>,
}

/// The default log filter for the given flags; `RUST_LOG` overrides it.
fn log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(cli.quiet, cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };
    let global = GlobalArgs {
        quiet: cli.quiet,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Check(ref args) => check::run(args, &global),
        Command::Characterize(ref args) => characterize::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_check_default() {
        let cli = Cli::parse_from(["cellchar", "check"]);
        match cli.command {
            Command::Check(ref args) => {
                assert!(args.cells.is_empty());
                assert!(!args.settings);
            }
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn parse_characterize_with_args() {
        let cli = Cli::parse_from([
            "cellchar",
            "characterize",
            "--cell",
            "AND2X1",
            "--cell",
            "DFFRX1",
            "--jobs",
            "8",
            "--output",
            "out.json",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::Characterize(ref args) => {
                assert_eq!(args.cells, vec!["AND2X1", "DFFRX1"]);
                assert_eq!(args.jobs, Some(8));
                assert_eq!(args.output, Some(PathBuf::from("out.json")));
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Characterize command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["cellchar", "--quiet", "--color", "never", "check"]);
        assert!(cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.color, ColorChoice::Never);
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::parse_from(["cellchar", "-vv", "characterize"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(log_level(false, cli.verbose), "debug");
        assert_eq!(log_level(true, 3), "error");
        assert_eq!(log_level(false, 0), "warn");
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::parse_from(["cellchar", "--config", "/lib/cellchar.toml", "check"]);
        assert_eq!(cli.config, Some(PathBuf::from("/lib/cellchar.toml")));
    }

    #[test]
    fn default_format_is_text() {
        let cli = Cli::parse_from(["cellchar", "characterize"]);
        let Command::Characterize(args) = cli.command else {
            panic!("expected Characterize command");
        };
        assert_eq!(args.format, ReportFormat::Text);
        assert!(args.jobs.is_none());
    }
}
