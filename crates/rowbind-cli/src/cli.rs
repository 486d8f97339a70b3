//! CLI argument definitions for `rowbind`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "rowbind",
    version,
    about = "Validate CSV files against declarative record schemas",
    long_about = "Validate CSV files against declarative record schemas.\n\n\
                  A schema is a JSON record declaration: positioned fields, their types,\n\
                  and the conversion and constraint rules that apply to each column."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow row values in trace logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a CSV file and print every rejected row.
    Validate(ValidateArgs),

    /// Print the header row a schema expects.
    Header(SchemaArgs),

    /// List the built-in rule kinds.
    Rules,
}

#[derive(Args)]
pub struct SchemaArgs {
    /// JSON record declaration.
    #[arg(long = "schema", value_name = "PATH")]
    pub schema: PathBuf,

    /// JSON binding configuration (groups, column count, policies).
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Activate a rule group; may be repeated.
    #[arg(long = "group", value_name = "NAME")]
    pub groups: Vec<String>,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// CSV file to validate.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[command(flatten)]
    pub schema: SchemaArgs,

    /// Properties file overriding the default messages.
    #[arg(long = "messages", value_name = "PATH")]
    pub messages: Option<PathBuf>,

    /// How to treat the first row of the input.
    #[arg(long = "header", value_enum, default_value = "validate")]
    pub header: HeaderArg,

    /// Stop at the first rejected row.
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Field delimiter.
    #[arg(long = "delimiter", default_value_t = ',')]
    pub delimiter: char,

    /// Trim whitespace around every field before binding.
    #[arg(long = "trim")]
    pub trim: bool,

    /// Write accepted rows, re-rendered, to this CSV file.
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum HeaderArg {
    None,
    Skip,
    Validate,
    /// Bind columns by header label, in any order.
    Map,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
