//! **goai-edit** - Atomic, backup-guarded file edits for AI coding-assistant tool calls
//!
//! One `edit_file` tool, four strategies (replace, insert, anchored, apply_patch),
//! a unified diff of every change, and a point-in-time backup that is put back
//! if the write fails.

/// Command-line interface with clap integration
pub mod cli;

/// CLI command handlers
pub mod cli_ext {
    /// `backup list|restore|sweep` with table and JSON output
    pub mod backup_cmd;

    /// Two-file diff through the edit engine's renderer
    pub mod diff_cmd;

    /// `edit` and `schema`: the tool contract on stdin/stdout
    pub mod edit_cmd;
}

/// Shell completion generation
pub mod completion;

/// Edit engine - strategies, orchestration, diffing and backups
pub mod core {
    /// Flat per-file backup store with rotation, retention and checksums
    pub mod backup;
    pub use backup::{BackupRecord, BackupStore};

    /// Operator-facing list/restore/sweep over the backup store
    pub mod backup_ops;

    /// Advisory scan for unresolved merge conflict markers
    pub mod conflict;

    /// Line diff with lookahead and Myers backends, unified rendering
    pub mod diff;
    pub use diff::{DiffAlgorithmKind, DiffEngine};

    /// Request validation and the backup → apply → atomic write pipeline
    pub mod edit;
    pub use edit::{EditError, EditOrchestrator, EditRequest, EditResult, ErrorKind};

    /// Unified diff application (stream and strict offset modes)
    pub mod patch;

    /// The four edit strategies behind one trait
    pub mod strategy;
    pub use strategy::{EditStrategy, Strategy, StrategyKind};

    /// `edit_file` tool contract and JSON envelope
    pub mod tool;
    pub use tool::{EditFileTool, Tool, ToolContext, ToolResponse};
}

/// Infrastructure - Configuration, I/O, locking and path policy
pub mod infra {
    /// Configuration management with TOML and environment overrides
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Root containment and forbidden-path globs
    pub mod guard;
    pub use guard::{PathGuard, PathViolation};

    /// Memory-mapped reads for large files (>1MB threshold), atomic writes
    pub mod io;
    pub use io::{FileContent, read_file_smart, write_atomic};

    /// Cross-process per-path edit locks
    pub mod lock;

    /// tracing-subscriber setup for the binary
    pub mod telemetry;
}

// Strategic re-exports for embedders
pub use cli::{AppContext, Cli, Commands};
pub use core::{EditError, EditFileTool, EditOrchestrator, EditRequest, EditResult, Tool};
pub use infra::{Config, load_config};
