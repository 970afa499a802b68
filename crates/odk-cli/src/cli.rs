//! Command line arguments of `odk-aggregate`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use odk_report::DEFAULT_DATA_LABEL;

#[derive(Parser)]
#[command(
    name = "odk-aggregate",
    version,
    about = "Aggregate ODK form submissions into Stata XML datasets",
    long_about = "Aggregate ODK XForm submissions into one Stata XML dataset per form id.\n\n\
                  Form definitions are XLSForms exported as CSV sheets (survey, choices,\n\
                  settings), one directory per form version. Every version of a form id is\n\
                  merged so that submissions of all versions land in one dataset."
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

    /// Allow submitted values in trace logs (redacted otherwise).
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert form submissions to Stata XML, one document per form id.
    Stata(StataArgs),

    /// List the form definitions found below a directory.
    Forms(FormsArgs),
}

#[derive(Parser)]
pub struct StataArgs {
    /// Directory of XLSForm definitions (CSV sheets, one directory per form).
    #[arg(long = "forms", value_name = "DIR")]
    pub forms: String,

    /// Directory of submitted XForm instances (*.xml, searched recursively).
    #[arg(long = "instances", value_name = "DIR")]
    pub instances: String,

    /// Existing directory that receives <form_id>.xml files.
    #[arg(long = "output", value_name = "DIR")]
    pub output: String,

    /// Data label written to each document header.
    #[arg(long = "data-label", value_name = "TEXT", default_value = DEFAULT_DATA_LABEL)]
    pub data_label: String,

    /// Run the conversion and report without writing documents.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Also write the diagnostics of the run as JSON.
    #[arg(long = "report-json", value_name = "PATH")]
    pub report_json: Option<PathBuf>,
}

#[derive(Parser)]
pub struct FormsArgs {
    /// Directory of XLSForm definitions.
    #[arg(long = "forms", value_name = "DIR")]
    pub forms: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
