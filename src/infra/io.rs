use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// File bytes, mapped for large files and buffered otherwise.
pub enum FileContent {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl FileContent {
    fn bytes(&self) -> &[u8] {
        match self {
            FileContent::Mapped(mmap) => &mmap[..],
            FileContent::Buffered(buf) => buf.as_slice(),
        }
    }

    /// Borrow the content as text; invalid UTF-8 is an error, never lossy.
    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(self.bytes())
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: callers hold the per-path edit lock, and the mapping is
        // dropped before the target is replaced.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        let content =
            fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// Atomically replace `path` with `data`.
///
/// The temp file lives in the target's directory so the final rename never
/// crosses filesystems; the target either keeps its old bytes or gets all
/// of the new ones. Permissions of an existing target are carried over.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;

    tmp.write_all(data)
        .with_context(|| format!("write temp file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp file for {}", path.display()))?;

    if let Some(perms) = perms {
        fs::set_permissions(tmp.path(), perms).context("set temp permissions")?;
    }

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("rename temp file over {}", path.display()))?;

    // Durably record the rename (best effort)
    let _ = sync_dir(dir);

    Ok(())
}

/// Cross-platform directory fsync helper.
#[cfg(unix)]
pub fn sync_dir(p: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let f = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECTORY)
        .open(p)?;
    f.sync_all()
}

#[cfg(not(unix))]
pub fn sync_dir(_p: &Path) -> std::io::Result<()> {
    // No reliable directory fsync outside unix; best-effort no-op.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn small_files_are_buffered() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("a.txt");
        fs::write(&p, "hello\n").unwrap();

        let content = read_file_smart(&p).unwrap();
        assert!(matches!(content, FileContent::Buffered(_)));
        assert_eq!(content.as_str().unwrap(), "hello\n");
    }

    #[test]
    fn large_files_are_mapped() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("big.txt");
        let line = "0123456789abcdef\n";
        fs::write(&p, line.repeat(70_000)).unwrap();

        let content = read_file_smart(&p).unwrap();
        assert!(matches!(content, FileContent::Mapped(_)));
        assert_eq!(content.len(), line.len() * 70_000);
        assert!(content.as_str().unwrap().starts_with(line));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("bin");
        fs::write(&p, [0x66, 0xff, 0xfe]).unwrap();

        assert!(read_file_smart(&p).unwrap().as_str().is_err());
    }

    #[test]
    fn write_atomic_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("out.txt");
        fs::write(&p, "old").unwrap();

        write_atomic(&p, b"new").unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "new");

        // Only the target remains; the temp file was renamed away
        let entries = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("run.sh");
        fs::write(&p, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&p, fs::Permissions::from_mode(0o755)).unwrap();

        write_atomic(&p, b"#!/bin/sh\necho hi\n").unwrap();
        let mode = fs::metadata(&p).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
