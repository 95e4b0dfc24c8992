//! Per-file point-in-time backups.
//!
//! Backups live flat in one directory (default `<root>/.goai/backups`) and are
//! named `<basename>.<YYYYMMDD_HHMMSS>.bak` in UTC. A second backup of the
//! same basename within one second gets a `-<n>` suffix before `.bak`, so a
//! name is never reused. Each basename keeps at most `max_per_file` backups;
//! `sweep` drops anything older than the retention window. An optional
//! `<name>.meta` JSON sidecar records provenance and a blake3 checksum.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use blake3::Hasher as Blake3;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::infra::config::BackupConfig;
use crate::infra::io::{sync_dir, write_atomic};

/// strftime layout of the name timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static BACKUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+)\.(?P<ts>\d{8}_\d{6})(?:-(?P<seq>\d+))?\.bak$")
        .expect("static backup name regex")
});

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup not found: {0}")]
    NotFound(PathBuf),

    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn io_err(context: impl Into<String>) -> impl FnOnce(io::Error) -> BackupError {
    let context = context.into();
    move |source| BackupError::Io { context, source }
}

/// One backup file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub file_name: String,
    pub path: PathBuf,
    /// Basename of the file this is a copy of
    pub original_file: String,
    /// Creation time parsed from the name
    pub timestamp: DateTime<Utc>,
    /// Same-second collision counter from the name, 0 when absent
    pub sequence: u32,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
}

impl BackupRecord {
    /// Sidecar location for this backup
    pub fn meta_path(&self) -> PathBuf {
        meta_path_for(&self.path)
    }
}

/// `.meta` sidecar contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMeta {
    pub operation: String,
    pub created_at: DateTime<Utc>,
    pub original_path: PathBuf,
    pub size: u64,
    pub checksum: String, // blake3:<hex>
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    max_per_file: usize,
    retention: Duration,
    write_metadata: bool,
}

impl BackupStore {
    /// Store in `dir` with the default cap (10), retention (7 days) and sidecars.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::from_config(Path::new(""), &BackupConfig::default()).with_dir(dir)
    }

    /// Store rooted at `root` with settings from config; relative `dir` is
    /// resolved against `root`.
    pub fn from_config(root: &Path, cfg: &BackupConfig) -> Self {
        Self {
            dir: root.join(&cfg.dir),
            max_per_file: cfg.max_per_file.max(1),
            retention: Duration::days(cfg.retention_days),
            write_metadata: cfg.write_metadata,
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn with_max_per_file(mut self, n: usize) -> Self {
        self.max_per_file = n.max(1);
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_metadata(mut self, enabled: bool) -> Self {
        self.write_metadata = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_per_file(&self) -> usize {
        self.max_per_file
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Copy `source` into the store, then prune its basename.
    #[instrument(skip(self, source), fields(source = %source.display()))]
    pub fn create(&self, source: &Path, operation: &str) -> Result<BackupRecord, BackupError> {
        let meta = match fs::metadata(source) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BackupError::NotFound(source.to_path_buf()));
            }
            Err(e) => return Err(io_err(format!("stat source: {}", source.display()))(e)),
        };
        if !meta.is_file() {
            return Err(BackupError::NotAFile(source.to_path_buf()));
        }

        fs::create_dir_all(&self.dir)
            .map_err(io_err(format!("create backup dir: {}", self.dir.display())))?;

        let basename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| BackupError::NotAFile(source.to_path_buf()))?;

        let (path, mut dest) = self.reserve(&basename, Utc::now())?;
        if let Err(e) = copy_contents(source, &mut dest, meta.permissions()) {
            drop(dest);
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        drop(dest);
        let _ = sync_dir(&self.dir);

        if self.write_metadata {
            if let Err(e) = self.write_sidecar(&path, source, operation) {
                warn!(backup = %path.display(), error = %e, "failed to write backup metadata");
            }
        }

        match self.prune(&basename) {
            Ok(removed) if !removed.is_empty() => {
                debug!(count = removed.len(), %basename, "pruned old backups");
            }
            Ok(_) => {}
            Err(e) => warn!(%basename, error = %e, "failed to prune backups"),
        }

        let record = record_for(&path)?.ok_or_else(|| BackupError::NotFound(path.clone()))?;
        debug!(backup = %record.path.display(), size = record.size, "backup created");
        Ok(record)
    }

    /// Claim a fresh backup name with `create_new`; bumps the sequence on
    /// same-second collisions.
    fn reserve(&self, basename: &str, now: DateTime<Utc>) -> Result<(PathBuf, File), BackupError> {
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        let mut seq = 0u32;
        loop {
            let name = if seq == 0 {
                format!("{basename}.{stamp}.bak")
            } else {
                format!("{basename}.{stamp}-{seq}.bak")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => seq += 1,
                Err(e) => return Err(io_err(format!("create backup: {}", path.display()))(e)),
            }
        }
    }

    fn write_sidecar(&self, backup: &Path, source: &Path, operation: &str) -> anyhow::Result<()> {
        let meta = BackupMeta {
            operation: operation.to_string(),
            created_at: Utc::now(),
            original_path: source.to_path_buf(),
            size: fs::metadata(backup)?.len(),
            checksum: stream_blake3(backup)?,
        };
        let text = serde_json::to_string_pretty(&meta)?;
        fs::write(meta_path_for(backup), text)?;
        Ok(())
    }

    /// Contents of one backup file.
    pub fn read(&self, backup: &Path) -> Result<Vec<u8>, BackupError> {
        if !backup.is_file() {
            return Err(BackupError::NotFound(backup.to_path_buf()));
        }
        fs::read(backup).map_err(io_err(format!("read backup: {}", backup.display())))
    }

    /// Atomically copy `backup` back over `target`.
    #[instrument(skip(self, backup, target), fields(backup = %backup.display(), target = %target.display()))]
    pub fn restore(&self, backup: &Path, target: &Path) -> Result<(), BackupError> {
        let bytes = self.read(backup)?;
        write_atomic(target, &bytes)?;
        debug!("backup restored");
        Ok(())
    }

    /// Backups of one basename, newest first.
    pub fn list(&self, basename: &str) -> Result<Vec<BackupRecord>, BackupError> {
        let mut records = self.list_all()?;
        records.retain(|r| r.original_file == basename);
        Ok(records)
    }

    /// Every backup in the store, newest first.
    pub fn list_all(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(it) => it,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(format!("read backup dir: {}", self.dir.display()))(e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(io_err(format!("read backup dir: {}", self.dir.display())))?;
            if let Some(record) = record_for(&entry.path())? {
                records.push(record);
            }
        }
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Keep the newest `max_per_file` backups of `basename`; returns what
    /// was removed.
    pub fn prune(&self, basename: &str) -> Result<Vec<PathBuf>, BackupError> {
        let records = self.list(basename)?;
        let mut removed = Vec::new();
        for record in records.into_iter().skip(self.max_per_file) {
            self.delete(&record)?;
            removed.push(record.path);
        }
        Ok(removed)
    }

    /// Delete backups older than the retention window.
    #[instrument(skip(self))]
    pub fn sweep(&self) -> Result<Vec<BackupRecord>, BackupError> {
        self.sweep_before(Utc::now() - self.retention)
    }

    /// Delete backups whose timestamp is before `cutoff`. Individual
    /// removal failures are logged and skipped.
    pub fn sweep_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<BackupRecord>, BackupError> {
        let mut removed = Vec::new();
        for record in self.expired(cutoff)? {
            match self.delete(&record) {
                Ok(()) => removed.push(record),
                Err(e) => warn!(backup = %record.path.display(), error = %e, "failed to sweep backup"),
            }
        }
        Ok(removed)
    }

    /// Backups a sweep with `cutoff` would remove
    pub fn expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<BackupRecord>, BackupError> {
        let mut records = self.list_all()?;
        records.retain(|r| r.timestamp < cutoff);
        Ok(records)
    }

    /// Remove a backup and its sidecar.
    pub fn delete(&self, record: &BackupRecord) -> Result<(), BackupError> {
        fs::remove_file(&record.path)
            .map_err(io_err(format!("remove backup: {}", record.path.display())))?;
        match fs::remove_file(record.meta_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(format!(
                "remove backup metadata: {}",
                record.meta_path().display()
            ))(e)),
        }
    }

    /// Sidecar for `record`, if present and readable.
    pub fn read_meta(&self, record: &BackupRecord) -> Option<BackupMeta> {
        let text = fs::read_to_string(record.meta_path()).ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Compare the backup's bytes with its sidecar checksum; `None` without a sidecar.
    pub fn verify(&self, record: &BackupRecord) -> Result<Option<bool>, BackupError> {
        let Some(meta) = self.read_meta(record) else {
            return Ok(None);
        };
        let actual = stream_blake3(&record.path)?;
        Ok(Some(actual == meta.checksum))
    }

    /// Resolve a backup given by file name (inside the store) or path.
    pub fn find(&self, name_or_path: &str) -> Result<BackupRecord, BackupError> {
        let direct = Path::new(name_or_path);
        let candidate = if direct.is_file() {
            direct.to_path_buf()
        } else {
            self.dir.join(name_or_path)
        };
        record_for(&candidate)?.ok_or(BackupError::NotFound(candidate))
    }
}

/// Parse a backup file name into (basename, timestamp, sequence).
pub fn parse_backup_name(name: &str) -> Option<(String, DateTime<Utc>, u32)> {
    let caps = BACKUP_NAME.captures(name)?;
    let ts = NaiveDateTime::parse_from_str(&caps["ts"], TIMESTAMP_FORMAT).ok()?;
    let seq = match caps.name("seq") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    Some((caps["base"].to_string(), ts.and_utc(), seq))
}

/// Build a record for `path`; `None` if it is not a well-formed backup file.
fn record_for(path: &Path) -> Result<Option<BackupRecord>, BackupError> {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    let Some((original_file, timestamp, sequence)) = parse_backup_name(file_name) else {
        return Ok(None);
    };
    let meta = match fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(format!("stat backup: {}", path.display()))(e)),
    };
    let mod_time = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or(timestamp);

    Ok(Some(BackupRecord {
        file_name: file_name.to_string(),
        path: path.to_path_buf(),
        original_file,
        timestamp,
        sequence,
        size: meta.len(),
        mod_time,
    }))
}

fn sort_newest_first(records: &mut [BackupRecord]) {
    records.sort_by(|a, b| {
        (b.timestamp, b.sequence, b.mod_time)
            .cmp(&(a.timestamp, a.sequence, a.mod_time))
            .then_with(|| b.file_name.cmp(&a.file_name))
    });
}

fn meta_path_for(backup: &Path) -> PathBuf {
    let mut name = backup.as_os_str().to_owned();
    name.push(".meta");
    PathBuf::from(name)
}

/// Stream `source` into `dest`, carry permissions over, and sync.
fn copy_contents(
    source: &Path,
    dest: &mut File,
    perms: fs::Permissions,
) -> Result<(), BackupError> {
    let mut src =
        File::open(source).map_err(io_err(format!("open source: {}", source.display())))?;
    io::copy(&mut src, dest).map_err(io_err(format!("copy {}", source.display())))?;
    dest.set_permissions(perms)
        .map_err(io_err("set backup permissions"))?;
    dest.sync_all().map_err(io_err("sync backup"))?;
    Ok(())
}

/// Stream a file into a blake3 digest as `blake3:<hex>`.
fn stream_blake3(path: &Path) -> Result<String, BackupError> {
    let mut f =
        File::open(path).map_err(io_err(format!("open for checksum: {}", path.display())))?;
    let mut hasher = Blake3::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = f
            .read(&mut buf)
            .map_err(io_err(format!("read for checksum: {}", path.display())))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> BackupStore {
        BackupStore::new(tmp.path().join(".goai/backups"))
    }

    #[test]
    fn create_copies_and_names_backup() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("main.go");
        fs::write(&src, "package main\n").unwrap();

        let record = store(&tmp).create(&src, "replace").unwrap();
        assert_eq!(record.original_file, "main.go");
        assert!(record.file_name.starts_with("main.go."));
        assert!(record.file_name.ends_with(".bak"));
        assert_eq!(fs::read_to_string(&record.path).unwrap(), "package main\n");
        assert_eq!(record.size, 13);
    }

    #[test]
    fn same_second_backups_get_distinct_names() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        fs::create_dir_all(s.dir()).unwrap();
        let now = Utc::now();

        let (a, _) = s.reserve("f.txt", now).unwrap();
        let (b, _) = s.reserve("f.txt", now).unwrap();
        assert_ne!(a, b);

        let b_name = b.file_name().unwrap().to_str().unwrap();
        let (base, _, seq) = parse_backup_name(b_name).unwrap();
        assert_eq!(base, "f.txt");
        assert_eq!(seq, 1);
    }

    #[test]
    fn sidecar_records_checksum() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.rs");
        fs::write(&src, "fn a() {}").unwrap();
        let s = store(&tmp);

        let record = s.create(&src, "insert").unwrap();
        let meta = s.read_meta(&record).unwrap();
        assert_eq!(meta.operation, "insert");
        assert!(meta.checksum.starts_with("blake3:"));
        assert_eq!(s.verify(&record).unwrap(), Some(true));

        fs::write(&record.path, "tampered").unwrap();
        assert_eq!(s.verify(&record).unwrap(), Some(false));
    }

    #[test]
    fn no_sidecar_when_disabled() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.rs");
        fs::write(&src, "x").unwrap();
        let s = store(&tmp).with_metadata(false);

        let record = s.create(&src, "replace").unwrap();
        assert!(!record.meta_path().exists());
        assert_eq!(s.verify(&record).unwrap(), None);
    }

    #[test]
    fn prune_caps_backups_per_basename() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("cap.txt");
        let other = tmp.path().join("other.txt");
        fs::write(&src, "x").unwrap();
        fs::write(&other, "y").unwrap();
        let s = store(&tmp).with_max_per_file(3);

        for _ in 0..5 {
            s.create(&src, "replace").unwrap();
        }
        s.create(&other, "replace").unwrap();

        let kept = s.list("cap.txt").unwrap();
        assert_eq!(kept.len(), 3);
        assert_eq!(s.list("other.txt").unwrap().len(), 1);
        // Newest first: sequence numbers within the same second descend
        assert!(kept.windows(2).all(|w| (w[0].timestamp, w[0].sequence)
            >= (w[1].timestamp, w[1].sequence)));
    }

    #[test]
    fn restore_writes_backup_over_target() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("r.txt");
        fs::write(&src, "original").unwrap();
        let s = store(&tmp);

        let record = s.create(&src, "replace").unwrap();
        fs::write(&src, "changed").unwrap();
        s.restore(&record.path, &src).unwrap();
        assert_eq!(fs::read_to_string(&src).unwrap(), "original");
    }

    #[test]
    fn restore_of_missing_backup_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = store(&tmp)
            .restore(&tmp.path().join("nope.bak"), &tmp.path().join("t"))
            .unwrap_err();
        assert!(matches!(err, BackupError::NotFound(_)));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        fs::create_dir_all(s.dir()).unwrap();
        fs::write(s.dir().join("old.txt.20200101_000000.bak"), "o").unwrap();
        fs::write(s.dir().join("old.txt.20200101_000000.bak.meta"), "{}").unwrap();
        let src = tmp.path().join("new.txt");
        fs::write(&src, "n").unwrap();
        s.create(&src, "replace").unwrap();

        let removed = s.sweep().unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].original_file, "old.txt");
        assert!(!s.dir().join("old.txt.20200101_000000.bak.meta").exists());
        assert_eq!(s.list_all().unwrap().len(), 1);
    }

    #[test]
    fn foreign_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        fs::create_dir_all(s.dir()).unwrap();
        fs::write(s.dir().join("notes.txt"), "x").unwrap();
        fs::write(s.dir().join("a.rs.2024_bad.bak"), "x").unwrap();
        assert!(s.list_all().unwrap().is_empty());
    }

    #[test]
    fn parses_names_with_dots_and_sequence() {
        let (base, ts, seq) = parse_backup_name("my.config.toml.20240305_141516-2.bak").unwrap();
        assert_eq!(base, "my.config.toml");
        assert_eq!(ts.format(TIMESTAMP_FORMAT).to_string(), "20240305_141516");
        assert_eq!(seq, 2);
        assert!(parse_backup_name("x.20240305_141516.bak.meta").is_none());
    }

    #[test]
    fn find_accepts_name_or_path() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("f.txt");
        fs::write(&src, "x").unwrap();
        let s = store(&tmp);
        let record = s.create(&src, "replace").unwrap();

        assert_eq!(s.find(&record.file_name).unwrap().path, record.path);
        assert_eq!(
            s.find(&record.path.to_string_lossy()).unwrap().file_name,
            record.file_name
        );
        assert!(matches!(s.find("missing.bak"), Err(BackupError::NotFound(_))));
    }
}
