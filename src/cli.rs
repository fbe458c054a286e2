//! CLI argument parsing for vatio

use crate::comparison::{MatchMode, TestKind};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vatio")]
#[command(version)]
#[command(
    about = "Per-function energy and runtime attribution from sampled call stacks and power logs",
    long_about = None
)]
pub struct Cli {
    /// Analysis configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug tracing output to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Attribute one trace against its power log
    Attribute(AttributeArgs),

    /// Attribute every <stem>.trace.jsonl / <stem>.power.log pair in a directory and merge
    Batch(BatchArgs),

    /// Sum stored registries into one
    Merge(MergeArgs),

    /// Compare per-function energy between two sets of registries
    Compare(CompareArgs),

    /// Compare the power draw of two traces, overall and per function
    ComparePower(ComparePowerArgs),

    /// Pairwise whole-trace power p-values of several registries
    PowerMatrix(PowerMatrixArgs),

    /// Time-weighted average power of environment logs
    AvgPower(AvgPowerArgs),
}

/// Where and how to write a single registry's results
#[derive(Args, Debug, Default)]
pub struct OutputArgs {
    /// Store the registry (.json or .msgpack)
    #[arg(short, long, value_name = "REG")]
    pub out: Option<PathBuf>,

    /// Write per-function estimates as CSV
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Write per-function estimates as JSON
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Only report functions whose name matches (e.g. "app::,!app::log")
    #[arg(short = 'e', long = "filter", value_name = "EXPR")]
    pub filter: Option<String>,

    /// Rows shown in the summary table
    #[arg(long, value_name = "N", default_value = "20")]
    pub top: usize,
}

/// Snapshot timestamp window, in trace milliseconds
#[derive(Args, Debug, Default, Clone, Copy)]
pub struct WindowArgs {
    /// Ignore samples before this timestamp
    #[arg(long = "begin-ms", value_name = "MS")]
    pub begin_ms: Option<i64>,

    /// Ignore samples after this timestamp
    #[arg(long = "end-ms", value_name = "MS")]
    pub end_ms: Option<i64>,
}

#[derive(Args, Debug)]
pub struct AttributeArgs {
    /// Symbolized stack samples (JSON lines)
    #[arg(short, long, value_name = "FILE")]
    pub trace: PathBuf,

    /// Environment log recorded during the trace
    #[arg(short, long, value_name = "FILE")]
    pub power: PathBuf,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory holding trace and power log pairs
    pub dir: PathBuf,

    /// Worker threads (overrides [batch] workers)
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Stored registries to sum
    #[arg(required = true, value_name = "REG")]
    pub registries: Vec<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Registries of the baseline condition, one per trace
    #[arg(short, long, num_args = 1.., required = true, value_name = "REG")]
    pub baseline: Vec<PathBuf>,

    /// Registries of the candidate condition, one per trace
    #[arg(short = 'n', long, num_args = 1.., required = true, value_name = "REG")]
    pub candidate: Vec<PathBuf>,

    /// Two-sample test (overrides [comparison] test)
    #[arg(long, value_enum)]
    pub test: Option<TestKind>,

    /// How functions are matched across conditions (overrides [comparison] match_by)
    #[arg(long = "match-by", value_enum)]
    pub match_by: Option<MatchMode>,

    /// Significance level (overrides [comparison] significance_level)
    #[arg(long, value_name = "ALPHA")]
    pub alpha: Option<f64>,

    /// Only compare functions whose name matches
    #[arg(short = 'e', long = "filter", value_name = "EXPR")]
    pub filter: Option<String>,

    /// Write matched-function results as CSV; unmatched functions go to <FILE stem>.unmatched.csv
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Write the comparison as JSON
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Also test whole-trace energy totals
    #[arg(long)]
    pub totals: bool,
}

#[derive(Args, Debug)]
pub struct ComparePowerArgs {
    /// Registry of the baseline trace
    #[arg(short, long, value_name = "REG")]
    pub baseline: PathBuf,

    /// Registry of the candidate trace
    #[arg(short = 'n', long, value_name = "REG")]
    pub candidate: PathBuf,

    /// Count a reading once per snapshot instead of once
    #[arg(long)]
    pub keep_duplicates: bool,

    /// Significance level (overrides [comparison] significance_level)
    #[arg(long, value_name = "ALPHA")]
    pub alpha: Option<f64>,

    /// Only compare functions whose name matches
    #[arg(short = 'e', long = "filter", value_name = "EXPR")]
    pub filter: Option<String>,

    /// Write the trace and per-function tests as CSV
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Write the comparison as JSON
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PowerMatrixArgs {
    /// Registries to test pairwise, named by file stem
    #[arg(required = true, num_args = 2.., value_name = "REG")]
    pub registries: Vec<PathBuf>,

    /// Count a reading once per snapshot instead of once
    #[arg(long)]
    pub keep_duplicates: bool,

    /// Round p-values to this many decimals
    #[arg(long, value_name = "N")]
    pub decimals: Option<usize>,

    /// Write the tab-separated matrix here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AvgPowerArgs {
    /// Environment logs
    #[arg(required = true, value_name = "LOG")]
    pub logs: Vec<PathBuf>,
}
