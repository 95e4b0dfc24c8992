use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::diff::DiffAlgorithmKind;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub root: PathBuf,  // global --root, tilde/env expanded
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "goai-edit")]
#[command(about = "Atomic, backup-guarded file edits for AI coding-assistant tool calls")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root; edit paths are resolved and confined here
    #[arg(long, global = true, default_value = ".")]
    pub root: String,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one edit_file request and print the JSON envelope
    Edit(EditArgs),

    /// Print the edit_file tool name, description and input schema
    Schema(SchemaArgs),

    /// Diff two files with the edit engine's diff renderer
    Diff(DiffArgs),

    /// Inspect, restore and sweep edit backups
    Backup(BackupArgs),

    /// Initialize a goai-edit.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct EditArgs {
    /// JSON request file; reads stdin when omitted or "-"
    #[arg(conflicts_with = "json")]
    pub request: Option<PathBuf>,

    /// Inline JSON request
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,

    /// Pretty-print the response envelope
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Parser, Debug)]
pub struct SchemaArgs {
    /// Pretty-print the schema
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DiffAlgorithmArg {
    /// Greedy forward scan (fast, may over-report on reorderings)
    Lookahead,
    /// Minimal edit script
    Myers,
}

impl From<DiffAlgorithmArg> for DiffAlgorithmKind {
    fn from(arg: DiffAlgorithmArg) -> Self {
        match arg {
            DiffAlgorithmArg::Lookahead => DiffAlgorithmKind::Lookahead,
            DiffAlgorithmArg::Myers => DiffAlgorithmKind::Myers,
        }
    }
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// Original file
    pub old: PathBuf,

    /// Modified file
    pub new: PathBuf,

    /// Diff algorithm; defaults to the configured one
    #[arg(long, value_enum)]
    pub algorithm: Option<DiffAlgorithmArg>,

    /// Context lines around each hunk; defaults to the configured value
    #[arg(short = 'U', long)]
    pub context: Option<usize>,
}

#[derive(Parser)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupSubcommand,
}

#[derive(Subcommand)]
pub enum BackupSubcommand {
    /// List backups, newest first
    List(BackupListArgs),

    /// Restore a backup over its original (or another) file
    Restore(BackupRestoreArgs),

    /// Delete backups past retention or older than a given span
    #[command(alias = "cleanup")]
    Sweep(BackupSweepArgs),
}

#[derive(Parser, Debug)]
pub struct BackupListArgs {
    /// Only backups of this file (base name or path)
    #[arg(long)]
    pub file: Option<String>,

    /// Filter by relative time (e.g., "7d", "24h")
    #[arg(long, value_name = "SPAN")]
    pub since: Option<String>,

    /// Limit result count
    #[arg(long, default_value_t = 100)]
    pub limit: usize,

    /// Machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BackupRestoreArgs {
    /// Backup file name or path
    pub backup: String,

    /// Target path relative to the root (defaults to the path recorded in the backup metadata)
    #[arg(long)]
    pub target: Option<String>,

    /// Show unified diff of current content against the backup
    #[arg(long)]
    pub show_diff: bool,

    /// Refuse to restore when the sidecar checksum does not match
    #[arg(long)]
    pub verify_checksum: bool,

    /// Back up the current file before overwriting
    #[arg(long)]
    pub backup_current: bool,

    /// Emit JSON result instead of human text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BackupSweepArgs {
    /// Relative span: 7d, 24h, 90m, 45s, 2w (defaults to configured retention)
    #[arg(long)]
    pub older_than: Option<String>,

    /// Emit JSON result instead of human text
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in (defaults to --root)
    pub path: Option<PathBuf>,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,

    /// Write the script into this directory instead of stdout
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

/// Expand `~` and `$VAR` in a user-supplied path
pub fn expand_path(raw: &str) -> anyhow::Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| anyhow::anyhow!("cannot expand path {raw:?}: {e}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
