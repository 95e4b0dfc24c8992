//! Edit orchestration
//!
//! Turns one [`EditRequest`] into at most one atomic write of the target:
//! validate the path and strategy fields, honour cancellation, take the
//! per-path lock, back the file up, collect advisory conflicts, run the
//! strategy, write atomically, and on failure put the backup back.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::backup::{BackupRecord, BackupStore};
use crate::core::conflict;
use crate::core::diff::DiffEngine;
use crate::core::patch::PatchError;
use crate::core::strategy::{EditStrategy, Strategy};
use crate::infra::config::Config;
use crate::infra::guard::{PathGuard, PathViolation};
use crate::infra::io::{read_file_smart, write_atomic};
use crate::infra::lock::EditLock;

/// Caller input, flat across all strategies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditRequest {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_backup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detect_conflicts: Option<bool>,

    // replace / anchored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_all: Option<bool>,

    // insert / anchored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_anchor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_anchor: Option<String>,

    // apply_patch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_hunk_offsets: Option<bool>,
}

impl EditRequest {
    pub fn replace(path: &str, old_text: &str, new_text: &str) -> Self {
        Self {
            path: path.into(),
            strategy: Some("replace".into()),
            old_text: Some(old_text.into()),
            new_text: Some(new_text.into()),
            ..Self::default()
        }
    }

    pub fn insert_at_line(path: &str, text: &str, line: i64) -> Self {
        Self {
            path: path.into(),
            strategy: Some("insert".into()),
            text: Some(text.into()),
            line: Some(line),
            ..Self::default()
        }
    }

    pub fn insert_after(path: &str, text: &str, anchor: &str) -> Self {
        Self {
            path: path.into(),
            strategy: Some("insert".into()),
            text: Some(text.into()),
            after_anchor: Some(anchor.into()),
            ..Self::default()
        }
    }

    pub fn anchored(
        path: &str,
        old_text: &str,
        new_text: &str,
        before_anchor: Option<&str>,
        after_anchor: Option<&str>,
    ) -> Self {
        Self {
            path: path.into(),
            strategy: Some("anchored".into()),
            old_text: Some(old_text.into()),
            new_text: Some(new_text.into()),
            before_anchor: before_anchor.map(Into::into),
            after_anchor: after_anchor.map(Into::into),
            ..Self::default()
        }
    }

    pub fn apply_patch(path: &str, patch: &str) -> Self {
        Self {
            path: path.into(),
            strategy: Some("apply_patch".into()),
            patch: Some(patch.into()),
            ..Self::default()
        }
    }

    pub fn with_backup(mut self, enabled: bool) -> Self {
        self.create_backup = Some(enabled);
        self
    }

    pub fn with_conflict_detection(mut self, enabled: bool) -> Self {
        self.detect_conflicts = Some(enabled);
        self
    }

    pub fn wants_backup(&self) -> bool {
        self.create_backup.unwrap_or(true)
    }

    pub fn wants_conflicts(&self) -> bool {
        self.detect_conflicts.unwrap_or(true)
    }
}

/// Outcome of a successful edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResult {
    pub path: String,
    pub strategy: String,
    pub lines_modified: usize,
    pub backup_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
}

/// One-line human summary of a successful edit
pub fn summarize(result: &EditResult) -> String {
    let mut summary = format!(
        "Successfully edited {} using {} strategy ({} lines modified)",
        result.path, result.strategy, result.lines_modified
    );
    if !result.conflicts.is_empty() {
        summary.push_str(&format!(
            " [{} potential conflicts detected]",
            result.conflicts.len()
        ));
    }
    summary
}

/// Error taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Path,
    NotFound,
    InvalidTarget,
    Io,
    Patch,
    Backup,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Path => "path",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidTarget => "invalid_target",
            ErrorKind::Io => "io",
            ErrorKind::Patch => "patch",
            ErrorKind::Backup => "backup",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("path error: {0}")]
    Path(#[from] PathViolation),

    /// Message always says what was "not found"
    #[error("{0}")]
    NotFound(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("backup error: {0}")]
    Backup(String),

    #[error("edit cancelled before any change was made")]
    Cancelled,

    /// The edit failed and putting the backup back failed too
    #[error("{edit}; restoring backup {} also failed: {reason}", .backup.display())]
    RestoreFailed {
        edit: Box<EditError>,
        backup: PathBuf,
        reason: String,
    },
}

impl EditError {
    /// Taxonomy of the error; a failed restore reports the edit's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EditError::Validation(_) => ErrorKind::Validation,
            EditError::Path(_) => ErrorKind::Path,
            EditError::NotFound(_) => ErrorKind::NotFound,
            EditError::InvalidTarget(_) => ErrorKind::InvalidTarget,
            EditError::Io(_) => ErrorKind::Io,
            EditError::Patch(_) => ErrorKind::Patch,
            EditError::Backup(_) => ErrorKind::Backup,
            EditError::Cancelled => ErrorKind::Cancelled,
            EditError::RestoreFailed { edit, .. } => edit.kind(),
        }
    }

    fn io(err: anyhow::Error) -> Self {
        EditError::Io(format!("{err:#}"))
    }
}

/// Shared cancellation flag, checked before any backup or mutation
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Validates and executes edit requests under one root
pub struct EditOrchestrator {
    guard: PathGuard,
    backups: BackupStore,
    diff: DiffEngine,
    lock_dir: Option<PathBuf>,
    write: fn(&Path, &[u8]) -> anyhow::Result<()>,
}

impl fmt::Debug for EditOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditOrchestrator")
            .field("guard", &self.guard)
            .field("backups", &self.backups)
            .field("diff", &self.diff)
            .field("lock_dir", &self.lock_dir)
            .finish_non_exhaustive()
    }
}

impl EditOrchestrator {
    /// Build from config; backups and locks are resolved under `root`.
    pub fn new(root: &Path, config: &Config) -> anyhow::Result<Self> {
        let guard = PathGuard::new(root, &config.safety.forbidden_paths)
            .context("Failed to set up path policy")?;
        let root = guard.root().to_path_buf();

        let backups = BackupStore::from_config(&root, &config.backup);
        let diff = DiffEngine::with_kind(
            config.diff.algorithm,
            config.diff.lookahead,
            config.diff.context_lines,
        );
        let lock_dir = config
            .safety
            .serialize_edits
            .then(|| root.join(&config.safety.lock_dir));

        Ok(Self {
            guard,
            backups,
            diff,
            lock_dir,
            write: write_atomic,
        })
    }

    /// Defaults plus any config file / environment overrides under `root`.
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let config = crate::infra::config::load_config(root)?;
        Self::new(root, &config)
    }

    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    pub fn diff_engine(&self) -> &DiffEngine {
        &self.diff
    }

    /// Path, target and strategy checks; touches nothing but metadata.
    pub fn validate(&self, request: &EditRequest) -> Result<(PathBuf, Strategy), EditError> {
        let target = self.guard.resolve(&request.path)?;

        let meta = std::fs::metadata(&target).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                EditError::NotFound(format!("file not found: {}", request.path))
            }
            _ => EditError::Io(format!("stat {}: {e}", target.display())),
        })?;
        if !meta.is_file() {
            return Err(EditError::InvalidTarget(format!(
                "{} is not a regular file",
                request.path
            )));
        }

        let strategy = Strategy::from_request(request)?;
        Ok((target, strategy))
    }

    pub fn execute(&self, request: &EditRequest) -> Result<EditResult, EditError> {
        self.execute_with(request, &CancelToken::default())
    }

    /// Run one edit. `cancel` is only observed before the backup.
    #[instrument(skip_all, fields(path = %request.path, strategy = request.strategy.as_deref().unwrap_or("replace")))]
    pub fn execute_with(
        &self,
        request: &EditRequest,
        cancel: &CancelToken,
    ) -> Result<EditResult, EditError> {
        let (target, strategy) = self.validate(request)?;

        if cancel.is_cancelled() {
            debug!("cancelled before backup");
            return Err(EditError::Cancelled);
        }

        let mut lock = match &self.lock_dir {
            Some(dir) => Some(EditLock::open(dir, &target).map_err(EditError::io)?),
            None => None,
        };
        let _guard = match lock.as_mut() {
            Some(l) => Some(l.acquire().map_err(EditError::io)?),
            None => None,
        };

        let file = read_file_smart(&target).map_err(EditError::io)?;
        let original = file.as_str().map_err(|e| {
            EditError::InvalidTarget(format!("{} is not valid UTF-8 text: {e}", request.path))
        })?;

        let backup = if request.wants_backup() {
            let record = self
                .backups
                .create(&target, strategy.kind().as_str())
                .map_err(|e| EditError::Backup(e.to_string()))?;
            Some(record)
        } else {
            None
        };

        let conflicts = if request.wants_conflicts() {
            collect_conflicts(&strategy, original)
        } else {
            Vec::new()
        };

        let rel = self.guard.relative(&target);
        let outcome = strategy.apply(original).map(|applied| {
            let diff = self.diff.diff_with_header(&rel, original, &applied.content);
            (applied, diff)
        });
        // Release any mapping before the rename
        drop(file);

        let outcome = outcome.and_then(|(applied, diff)| {
            (self.write)(&target, applied.content.as_bytes()).map_err(EditError::io)?;
            Ok((applied, diff))
        });

        let (applied, diff) = match outcome {
            Ok(done) => done,
            Err(err) => return Err(self.roll_back(err, &target, backup)),
        };

        let result = EditResult {
            path: request.path.clone(),
            strategy: strategy.kind().to_string(),
            lines_modified: applied.lines_modified,
            backup_created: backup.is_some(),
            backup_path: backup.map(|b| b.path.display().to_string()),
            diff: (!diff.is_empty()).then_some(diff),
            conflicts,
        };
        info!(
            lines_modified = result.lines_modified,
            conflicts = result.conflicts.len(),
            "edit applied"
        );
        Ok(result)
    }

    /// Run the strategy without a backup or a write.
    #[instrument(skip_all, fields(path = %request.path))]
    pub fn preview(&self, request: &EditRequest) -> Result<EditResult, EditError> {
        let (target, strategy) = self.validate(request)?;
        let file = read_file_smart(&target).map_err(EditError::io)?;
        let original = file.as_str().map_err(|e| {
            EditError::InvalidTarget(format!("{} is not valid UTF-8 text: {e}", request.path))
        })?;

        let conflicts = if request.wants_conflicts() {
            collect_conflicts(&strategy, original)
        } else {
            Vec::new()
        };
        let applied = strategy.apply(original)?;
        let diff = self
            .diff
            .diff_with_header(&self.guard.relative(&target), original, &applied.content);

        Ok(EditResult {
            path: request.path.clone(),
            strategy: strategy.kind().to_string(),
            lines_modified: applied.lines_modified,
            backup_created: false,
            backup_path: None,
            diff: (!diff.is_empty()).then_some(diff),
            conflicts,
        })
    }

    /// Put the backup back after a failed edit and drop it. A failed
    /// restore keeps the backup and is reported alongside the edit error.
    fn roll_back(&self, err: EditError, target: &Path, backup: Option<BackupRecord>) -> EditError {
        warn!(error = %err, "edit failed");
        let Some(record) = backup else {
            return err;
        };

        match self.backups.restore(&record.path, target) {
            Ok(()) => {
                if let Err(e) = self.backups.delete(&record) {
                    warn!(backup = %record.path.display(), error = %e, "failed to delete backup after rollback");
                }
                err
            }
            Err(e) => {
                warn!(backup = %record.path.display(), error = %e, "restore after failed edit failed");
                EditError::RestoreFailed {
                    edit: Box::new(err),
                    backup: record.path,
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Strategy advisories plus any leftover merge markers
fn collect_conflicts(strategy: &Strategy, content: &str) -> Vec<String> {
    let mut conflicts = strategy.detect_conflicts(content);
    if let Some(note) = conflict::describe(&conflict::scan_markers(content)) {
        conflicts.push(note);
    }
    conflicts
}
