//! Safe file I/O utilities: durable writes and file locking.
//!
//! - [`write_durable()`] - write bytes to a fresh file, fsync, rename into place
//! - [`sync_dir()`] - persist directory entries (renames, creations)
//! - [`FileLock`] - RAII advisory lock using fs2
//!
//! New content never truncates the file it replaces: a reader or a crash
//! sees either the previous file or the complete new one.

use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Temporary sibling used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Write `contents` to `path` durably.
///
/// The bytes go to `<path>.tmp`, are synced to disk, and the temporary file
/// is renamed over `path`. The parent directory must already exist. The
/// containing directory is not synced here; callers decide when that is
/// needed (see [`sync_dir()`]).
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, written,
/// synced or renamed. A failed write leaves `path` untouched.
pub fn write_durable(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = temp_path(path);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    let written = (|| -> io::Result<()> {
        {
            let mut writer = BufWriter::new(&mut file);
            writer.write_all(contents)?;
            writer.flush()?;
        }
        // Data must be on disk before the rename makes it current.
        file.sync_all()
    })();
    drop(file);

    if let Err(e) = written.and_then(|()| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

/// Flush a directory's entries to durable storage.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Directories cannot be opened for syncing here; renames are journaled by
/// the filesystem.
#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// RAII file lock using fs2 exclusive locking.
///
/// The lock is acquired when created and automatically released when dropped.
/// Uses advisory locking - processes must cooperate by acquiring locks on the
/// same lock file path. On Linux the lock is held per open file description,
/// so two threads of one process exclude each other as well.
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire an exclusive lock on the given path, blocking if necessary.
    ///
    /// Creates the lock file and its parent directories if they don't exist.
    pub fn acquire(lock_path: &Path) -> io::Result<Self> {
        let file = open_lock_file(lock_path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    /// Try to acquire an exclusive lock without blocking.
    ///
    /// Returns `Ok(Some(FileLock))` if the lock was acquired, `Ok(None)` if
    /// the lock is held elsewhere, or `Err` on I/O error.
    pub fn try_acquire(lock_path: &Path) -> io::Result<Option<Self>> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn open_lock_file(lock_path: &Path) -> io::Result<File> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
}

/// fs2 reports contention as a raw OS error that may not map to WouldBlock.
fn is_contended(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
