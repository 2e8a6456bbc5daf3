use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ftlog",
    about = "Fault-tolerant append-only logs with chained chunks",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML file with manager and log settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Append messages to a log, printing each formatted line
    Append(AppendArgs),
    /// Seal the current chunk of a log and start a chained one
    Rotate(RotateArgs),
    /// Verify that chunks link to each other
    Verify(VerifyArgs),
    /// Print the content key of a file
    Key(KeyArgs),
    /// Convert between UNIX seconds and YYYYMMDD-HHMMSS
    Utc(UtcArgs),
}

/// Selects one log in a directory.
#[derive(Args)]
pub struct LogTarget {
    /// Log directory (overrides the config file)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
    /// Base name of the log
    #[arg(short, long)]
    pub name: String,
}

#[derive(Args)]
pub struct AppendArgs {
    #[command(flatten)]
    pub target: LogTarget,
    #[arg(required = true)]
    pub messages: Vec<String>,
}

#[derive(Args)]
pub struct RotateArgs {
    #[command(flatten)]
    pub target: LogTarget,
    /// Owner node id, hex
    #[arg(long)]
    pub owner: String,
    /// Source id, hex
    #[arg(long)]
    pub src: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Chunk files, oldest first
    #[arg(required_unless_present = "name", conflicts_with = "name")]
    pub chunks: Vec<PathBuf>,
    /// Verify every chunk of this log instead
    #[arg(short, long)]
    pub name: Option<String>,
    #[arg(short, long, requires = "name")]
    pub dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct KeyArgs {
    pub file: PathBuf,
    /// 20-byte key instead of 32
    #[arg(long)]
    pub short: bool,
}

#[derive(Args)]
pub struct UtcArgs {
    /// Seconds since the epoch; defaults to now
    #[arg(conflicts_with = "parse")]
    pub secs: Option<u64>,
    /// Parse a YYYYMMDD-HHMMSS string into seconds
    #[arg(long)]
    pub parse: Option<String>,
}
