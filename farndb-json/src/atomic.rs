//! Crash-safe replacement of a file.
//!
//! A write goes through three steps, in this order:
//!
//! 1. [`AtomicWrite::stage`] writes the new contents to `<path>.tmp` next to the target
//!    and flushes it to disk.
//! 2. [`AtomicWrite::backup_current`] copies the current target, if any, to `<path>.bak`,
//!    overwriting an older backup.
//! 3. [`AtomicWrite::commit`] renames the temporary file over the target and syncs the
//!    directory so the rename itself is durable.
//!
//! The rename is the only step that touches the target, and it is atomic on one
//! filesystem. A failure or crash at any earlier point leaves the target exactly as it
//! was. Once the rename has happened the write counts as committed; a failed directory
//! sync afterwards is logged, not reported.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use farndb_core::error::{DocumentStoreError, DocumentStoreResult};

/// Suffix of the staging file written next to the target.
pub const TEMP_SUFFIX: &str = ".tmp";
/// Suffix of the copy of the previous target kept on every write.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Path of the staging file for `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, TEMP_SUFFIX)
}

/// Path of the automatic backup for `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, BACKUP_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);

    PathBuf::from(name)
}

/// One atomic replacement of a target file.
///
/// Use [`write_atomic`] for the whole sequence. The individual steps are public so that
/// callers can stop part way, which is how interrupted writes are simulated.
#[derive(Debug, Clone)]
pub struct AtomicWrite {
    target: PathBuf,
    temp: PathBuf,
    backup: Option<PathBuf>,
    sync: bool,
    create_dirs: bool,
    sync_dir: fn(&Path) -> io::Result<()>,
}

impl AtomicWrite {
    /// Prepares a write to `target` with backups, syncing and directory creation enabled.
    pub fn new(target: impl Into<PathBuf>) -> Self {
        let target = target.into();

        Self {
            temp: temp_path(&target),
            backup: Some(backup_path(&target)),
            target,
            sync: true,
            create_dirs: true,
            sync_dir: sync_directory,
        }
    }

    /// Whether to keep a copy of the previous target.
    #[must_use]
    pub fn backup(mut self, enabled: bool) -> Self {
        self.backup = enabled.then(|| backup_path(&self.target));
        self
    }

    /// Whether to fsync the staged file and the directory.
    #[must_use]
    pub fn sync(mut self, enabled: bool) -> Self {
        self.sync = enabled;
        self
    }

    /// Whether to create missing parent directories of the target.
    #[must_use]
    pub fn create_dirs(mut self, enabled: bool) -> Self {
        self.create_dirs = enabled;
        self
    }

    /// The file being replaced.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The staging file.
    pub fn temp(&self) -> &Path {
        &self.temp
    }

    /// Writes `bytes` to the staging file.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::IoFailure`] if the directory cannot be created or
    /// the staging file cannot be written.
    pub fn stage(&self, bytes: &[u8]) -> DocumentStoreResult<()> {
        if self.create_dirs {
            if let Some(parent) = self.parent() {
                fs::create_dir_all(parent).map_err(|err| DocumentStoreError::io(parent, err))?;
            }
        }

        let failed = |err| DocumentStoreError::io(&self.temp, err);
        let mut file = File::create(&self.temp).map_err(failed)?;

        file.write_all(bytes).map_err(failed)?;

        if self.sync {
            file.sync_all().map_err(failed)?;
        }

        debug!(target: "farndb::json", temp = %self.temp.display(), bytes = bytes.len(), "staged");

        Ok(())
    }

    /// Copies the current target to the backup path, if there is a target to copy.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::IoFailure`] if the copy fails.
    pub fn backup_current(&self) -> DocumentStoreResult<()> {
        let Some(backup) = &self.backup else {
            return Ok(());
        };

        if !self.target.exists() {
            return Ok(());
        }

        fs::copy(&self.target, backup).map_err(|err| DocumentStoreError::io(backup, err))?;

        debug!(target: "farndb::json", backup = %backup.display(), "backed up previous file");

        Ok(())
    }

    #[cfg(test)]
    fn sync_dir_with(mut self, sync_dir: fn(&Path) -> io::Result<()>) -> Self {
        self.sync_dir = sync_dir;
        self
    }

    /// Moves the staged file over the target.
    ///
    /// The target holds the new contents as soon as the rename succeeds, so a failure to
    /// sync the directory after it is only logged.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::IoFailure`] if the rename fails.
    pub fn commit(self) -> DocumentStoreResult<()> {
        fs::rename(&self.temp, &self.target)
            .map_err(|err| DocumentStoreError::io(&self.target, err))?;

        if self.sync {
            let dir = self.parent().unwrap_or(Path::new("."));

            if let Err(err) = (self.sync_dir)(dir) {
                warn!(
                    target: "farndb::json",
                    dir = %dir.display(),
                    error = %err,
                    "directory sync failed after rename"
                );
            }
        }

        debug!(target: "farndb::json", path = %self.target.display(), "committed");

        Ok(())
    }

    /// Removes the staging file, ignoring errors.
    pub fn discard(self) {
        let _ = fs::remove_file(&self.temp);
    }

    fn parent(&self) -> Option<&Path> {
        self.target
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
    }
}

/// Makes a rename in `dir` durable. Directory fsync is a unix notion.
#[cfg(unix)]
fn sync_directory(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Runs the full stage, backup, commit sequence.
///
/// On failure the staging file is removed and the target is left untouched.
///
/// # Errors
///
/// Returns [`DocumentStoreError::IoFailure`] naming the path of the failing step.
pub fn write_atomic(write: AtomicWrite, bytes: &[u8]) -> DocumentStoreResult<()> {
    let staged = write
        .stage(bytes)
        .and_then(|()| write.backup_current());

    if let Err(err) = staged {
        write.discard();
        return Err(err);
    }

    let temp = write.temp().to_path_buf();

    write.commit().inspect_err(|_| {
        let _ = fs::remove_file(&temp);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_are_appended() {
        let path = Path::new("/data/store.json");

        assert_eq!(temp_path(path), PathBuf::from("/data/store.json.tmp"));
        assert_eq!(backup_path(path), PathBuf::from("/data/store.json.bak"));
    }

    #[test]
    fn first_write_creates_directories_and_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/deeper/store.json");

        write_atomic(AtomicWrite::new(&target), b"one").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"one");
        assert!(!backup_path(&target).exists());
        assert!(!temp_path(&target).exists());
    }

    #[test]
    fn second_write_backs_up_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("store.json");

        write_atomic(AtomicWrite::new(&target), b"one").unwrap();
        write_atomic(AtomicWrite::new(&target), b"two").unwrap();
        write_atomic(AtomicWrite::new(&target), b"three").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"three");
        assert_eq!(fs::read(backup_path(&target)).unwrap(), b"two");
    }

    #[test]
    fn backup_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("store.json");

        write_atomic(AtomicWrite::new(&target).backup(false), b"one").unwrap();
        write_atomic(AtomicWrite::new(&target).backup(false).sync(false), b"two").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"two");
        assert!(!backup_path(&target).exists());
    }

    #[test]
    fn interrupted_write_leaves_target_alone() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("store.json");
        write_atomic(AtomicWrite::new(&target), b"committed").unwrap();

        let write = AtomicWrite::new(&target);
        write.stage(b"half done").unwrap();
        write.backup_current().unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"committed");
        assert_eq!(fs::read(temp_path(&target)).unwrap(), b"half done");

        write.discard();
        assert!(!temp_path(&target).exists());
    }

    #[test]
    fn directory_sync_failure_after_rename_still_commits() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("store.json");
        write_atomic(AtomicWrite::new(&target), b"old").unwrap();

        let write = AtomicWrite::new(&target).sync_dir_with(|_| Err(io::Error::other("fsync refused")));

        write_atomic(write, b"new").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert_eq!(fs::read(backup_path(&target)).unwrap(), b"old");
        assert!(!temp_path(&target).exists());
    }

    #[test]
    fn directory_sync_is_skipped_without_sync() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("store.json");

        let write = AtomicWrite::new(&target)
            .sync(false)
            .sync_dir_with(|_| panic!("directory sync must not run"));

        write_atomic(write, b"data").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"data");
    }

    #[test]
    fn failed_stage_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let target = blocker.join("store.json");

        let err = write_atomic(AtomicWrite::new(&target), b"data").unwrap_err();

        match err {
            DocumentStoreError::IoFailure { path, .. } => assert_eq!(path, blocker),
            other => panic!("unexpected error: {other}"),
        }
    }
}
