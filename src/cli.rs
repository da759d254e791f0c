use crate::filter::FilterMode;
use crate::perspective::Perspective;
use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Inspect and edit the filters of a dashboard widget data selection
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML config with the filter key catalog and notices
    #[arg(short, long, global = true, env = "WIDGET_FILTERS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'F', long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Also write the output to this file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// When to use colors
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (-q, -qq)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a data selection, apply filter edits and show panels, summaries and the result
    Inspect {
        /// Data selection file (JSON or JSON5); an empty selection when omitted
        #[arg(short, long)]
        selection: Option<PathBuf>,

        /// Widget perspective; defaults to the selection's own perspective
        #[arg(short, long, value_enum)]
        perspective: Option<Perspective>,

        /// Widget type (e.g. "bookmark", "list", "line")
        #[arg(short = 't', long = "type", default_value = "default")]
        widget_type: String,

        /// Edit of the main filters (e.g. "entity_type=Malware", "!objectLabel")
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Edit of the source pre-query filters
        #[arg(long = "from")]
        from: Vec<String>,

        /// Edit of the target pre-query filters
        #[arg(long = "to")]
        to: Vec<String>,

        /// Top-level mode of the main filters
        #[arg(long, value_enum)]
        mode: Option<FilterMode>,
    },
    /// List the filterable keys of one or more entity types
    Keys {
        /// Entity types (e.g. "Stix-Core-Object")
        #[arg(required = true)]
        entity_types: Vec<String>,
    },
    /// Show the entity types and search context of each perspective
    Perspectives,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_inspect_arguments() {
        let cli = Cli::try_parse_from([
            "widget-filters",
            "inspect",
            "-p",
            "relationships",
            "--filter",
            "entity_type=Report",
            "--from",
            "objectLabel=apt",
            "--mode",
            "or",
            "-F",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Inspect {
                perspective,
                filters,
                from,
                mode,
                widget_type,
                ..
            } => {
                assert_eq!(perspective, Some(Perspective::Relationships));
                assert_eq!(filters, vec!["entity_type=Report"]);
                assert_eq!(from, vec!["objectLabel=apt"]);
                assert_eq!(mode, Some(FilterMode::Or));
                assert_eq!(widget_type, "default");
            }
            _ => panic!("expected inspect"),
        }
    }
}
