use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use slim_export::ExportFormat;

/// Command-line interface of the `slim` binary.
#[derive(Debug, Parser)]
#[command(name = "slim")]
#[command(about = "Keep long conversations light: window, export and simulate transcripts.")]
pub struct Cli {
    /// Override the settings directory (default: $SLIM_CONFIG_HOME, then $PRJ_DATA_HOME/thread-slim).
    #[arg(long, global = true)]
    pub conf: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Export format on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Markdown document.
    Md,
    /// JSON document.
    Json,
    /// Code blocks only.
    Code,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Md => Self::Markdown,
            FormatArg::Json => Self::Json,
            FormatArg::Code => Self::CodeOnly,
        }
    }
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply the retention window to a transcript and print the layout.
    Apply {
        /// Transcript JSON file.
        transcript: PathBuf,

        /// Override keepLast for this run.
        #[arg(long)]
        keep_last: Option<i64>,

        /// Forced pass: collapse pinned items too.
        #[arg(long)]
        force: bool,

        /// Print the apply report and stats as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Export selected turns (or the last keepLast turns) to a file.
    Export {
        /// Transcript JSON file.
        transcript: PathBuf,

        /// Output format.
        #[arg(long, value_enum, default_value = "md")]
        format: FormatArg,

        /// 1-based turn numbers to select (comma separated).
        #[arg(long, value_delimiter = ',')]
        select: Vec<usize>,

        /// Override keepLast for this run.
        #[arg(long)]
        keep_last: Option<i64>,

        /// Output directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Expand everything and write a markdown snapshot.
    Snapshot {
        /// Transcript JSON file.
        transcript: PathBuf,

        /// Output directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Replay a transcript as a streaming conversation and print scheduler events.
    Simulate {
        /// Transcript JSON file.
        transcript: PathBuf,

        /// Milliseconds between streamed turns.
        #[arg(long, default_value_t = 400)]
        interval_ms: u64,

        /// Clock granularity of the simulation.
        #[arg(long, default_value_t = 50)]
        tick_ms: u64,

        /// Override keepLast for this run.
        #[arg(long)]
        keep_last: Option<i64>,

        /// Drive the session on the tokio runtime in real time instead of a manual clock.
        #[arg(long)]
        realtime: bool,
    },
    /// Show or change persisted settings.
    Config {
        /// Config action.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `slim config` actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the settings file path and its effective content.
    Show,
    /// Set one key (camelCase, e.g. keepLast, autoApply) and save.
    Set {
        /// Setting key.
        key: String,
        /// New value.
        value: String,
    },
}
