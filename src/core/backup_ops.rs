//! Backup management operations
//!
//! Listing, restoring and sweeping the flat backup store from the command
//! line. Edits themselves never go through here; these are the operator
//! tools around [`BackupStore`](crate::core::backup::BackupStore).

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::core::backup::{BackupRecord, BackupStore};
use crate::core::edit::EditOrchestrator;
use crate::infra::io::{read_file_smart, write_atomic};

/// Request structure for listing backups
#[derive(Debug, Default)]
pub struct ListRequest {
    /// Base name or path of the original file
    pub file: Option<String>,
    pub since: Option<String>,
    pub limit: usize,
}

/// Request structure for restore operations
#[derive(Debug, Default)]
pub struct RestoreRequest {
    pub backup: String,
    /// Root-relative target; the sidecar's original path when absent
    pub target: Option<String>,
    pub dry_run: bool,
    pub show_diff: bool,
    pub verify_checksum: bool,
    pub backup_current: bool,
}

/// Result of restore operation
#[derive(Debug, Serialize)]
pub struct RestoreResult {
    pub backup: PathBuf,
    pub target: PathBuf,
    pub restored: bool,
    /// `None` when the backup has no metadata sidecar
    pub checksum_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_backup: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Request structure for sweep operations
#[derive(Debug, Default)]
pub struct SweepRequest {
    /// Relative span; the store's retention window when absent
    pub older_than: Option<String>,
    pub dry_run: bool,
}

/// Result of sweep operation
#[derive(Debug, Serialize)]
pub struct SweepResult {
    pub removed: Vec<String>,
    pub bytes_freed: u64,
    pub dry_run: bool,
}

/// List backups newest first, filtered by file and age
pub fn list_backups(store: &BackupStore, req: &ListRequest) -> Result<Vec<BackupRecord>> {
    let since = req.since.as_deref().map(parse_relative_time).transpose()?;

    let mut records = match req.file.as_deref() {
        Some(file) => store.list(&basename_of(file))?,
        None => store.list_all()?,
    };

    if let Some(since) = since {
        records.retain(|r| r.timestamp >= since);
    }
    records.truncate(req.limit);
    Ok(records)
}

/// Restore one backup, optionally verifying it and saving the current file first
#[instrument(skip(orch), fields(backup = %req.backup))]
pub fn restore_backup(orch: &EditOrchestrator, req: &RestoreRequest) -> Result<RestoreResult> {
    let store = orch.backups();
    let record = store.find(&req.backup)?;

    let target_raw = match &req.target {
        Some(t) => t.clone(),
        None => match store.read_meta(&record) {
            Some(meta) => meta.original_path.display().to_string(),
            None => bail!(
                "Backup {} has no metadata; pass --target to say where it goes",
                record.file_name
            ),
        },
    };
    let target = orch.guard().resolve(&target_raw)?;

    let checksum_ok = store.verify(&record)?;
    if req.verify_checksum && checksum_ok == Some(false) {
        bail!(
            "Checksum mismatch for {}; refusing to restore",
            record.path.display()
        );
    }

    let diff = if req.show_diff {
        Some(restore_diff(orch, &record, &target)?)
    } else {
        None
    };

    if req.dry_run {
        return Ok(RestoreResult {
            backup: record.path,
            target,
            restored: false,
            checksum_ok,
            current_backup: None,
            diff,
        });
    }

    // Read first: saving the current file prunes the basename and may
    // delete the very backup being restored.
    let bytes = store.read(&record.path)?;
    let current_backup = if req.backup_current && target.is_file() {
        Some(store.create(&target, "restore")?.path)
    } else {
        None
    };

    write_atomic(&target, &bytes)?;
    info!(target = %target.display(), "backup restored");

    Ok(RestoreResult {
        backup: record.path,
        target,
        restored: true,
        checksum_ok,
        current_backup,
        diff,
    })
}

/// Delete (or with `dry_run`, report) backups older than the cutoff
#[instrument(skip(store))]
pub fn sweep_backups(store: &BackupStore, req: &SweepRequest) -> Result<SweepResult> {
    let victims = match req.older_than.as_deref() {
        Some(span) => {
            let cutoff = parse_relative_time(span)?;
            if req.dry_run {
                store.expired(cutoff)?
            } else {
                store.sweep_before(cutoff)?
            }
        }
        None if req.dry_run => store.expired(Utc::now() - store.retention())?,
        None => store.sweep()?,
    };

    Ok(SweepResult {
        bytes_freed: victims.iter().map(|r| r.size).sum(),
        removed: victims.into_iter().map(|r| r.file_name).collect(),
        dry_run: req.dry_run,
    })
}

/// Diff of the current target against the backup content
fn restore_diff(orch: &EditOrchestrator, record: &BackupRecord, target: &Path) -> Result<String> {
    let backup = read_file_smart(&record.path)?;
    let backup = backup
        .as_str()
        .with_context(|| format!("Backup {} is not UTF-8 text", record.path.display()))?;

    let current = if target.is_file() {
        let file = read_file_smart(target)?;
        file.as_str()
            .with_context(|| format!("{} is not UTF-8 text", target.display()))?
            .to_string()
    } else {
        String::new()
    };

    let rel = orch.guard().relative(target);
    Ok(orch.diff_engine().diff_with_header(&rel, &current, backup))
}

fn basename_of(file: &str) -> String {
    Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string())
}

/// Parse relative time specifications like "7d", "24h", "2w"
pub fn parse_relative_time(time_str: &str) -> Result<DateTime<Utc>> {
    // Trim and validate
    let time_str = time_str.trim();
    let Some(unit) = time_str.chars().last() else {
        bail!("Empty time specification");
    };

    // Split number and unit
    let number_str = match unit {
        'w' | 'd' | 'h' | 'm' | 's' => &time_str[..time_str.len() - 1],
        _ => bail!("Invalid time unit in '{}'. Use w, d, h, m, or s", time_str),
    };

    // Parse and reject negatives
    let number: i64 = number_str
        .parse()
        .with_context(|| format!("Invalid number '{}' in time specification", number_str))?;
    if number < 0 {
        bail!("Negative durations are not allowed: '{}'", time_str);
    }

    let duration = match unit {
        'w' => Duration::try_weeks(number),
        'd' => Duration::try_days(number),
        'h' => Duration::try_hours(number),
        'm' => Duration::try_minutes(number),
        _ => Duration::try_seconds(number),
    }
    .with_context(|| format!("Time span out of range: '{}'", time_str))?;

    // Compute bound
    Ok(Utc::now() - duration)
}
