//! Temporary file management.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log;
use tempfile;

const TMP_FILE_PREFIX: &str = "line-sort-";
const TMP_FILE_SUFFIX: &str = ".chunk";

/// Temporary files cleanup summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files deleted.
    pub deleted: usize,
    /// Files that were already gone.
    pub missing: usize,
    /// Files that could not be deleted.
    pub failed: usize,
}

/// Creates and tracks the temporary files of a sorting run.
///
/// Every created file is tracked until it is cleaned up. Files still tracked when the manager
/// is closed or dropped are deleted.
pub struct TempFileManager {
    /// Custom directory, the OS temporary directory is used if not set.
    tmp_dir: Option<PathBuf>,
    files: Vec<PathBuf>,
    closed: bool,
}

impl TempFileManager {
    /// Creates a new manager.
    ///
    /// # Arguments
    /// * `tmp_dir` - Directory to create temporary files in. Created if it doesn't exist.
    ///   If [`None`] the OS temporary directory is used.
    pub fn new(tmp_dir: Option<&Path>) -> io::Result<Self> {
        if let Some(tmp_dir) = tmp_dir {
            fs::create_dir_all(tmp_dir)?;
        }

        return Ok(TempFileManager {
            tmp_dir: tmp_dir.map(Path::to_path_buf),
            files: Vec::new(),
            closed: false,
        });
    }

    /// Directory temporary files are created in.
    pub fn dir(&self) -> PathBuf {
        match &self.tmp_dir {
            Some(tmp_dir) => tmp_dir.clone(),
            None => std::env::temp_dir(),
        }
    }

    /// Tracked temporary files.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Creates a new empty temporary file and starts tracking it.
    pub fn create_temporary_file(&mut self) -> io::Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TMP_FILE_PREFIX).suffix(TMP_FILE_SUFFIX);

        let tmp_file = match &self.tmp_dir {
            Some(tmp_dir) => builder.tempfile_in(tmp_dir),
            None => builder.tempfile(),
        }?;

        let path = tmp_file.into_temp_path().keep().map_err(|err| err.error)?;
        self.files.push(path.clone());

        log::debug!("created temporary file {}", path.display());

        return Ok(path);
    }

    /// Deletes tracked temporary files.
    /// A failed deletion doesn't stop the others; such files stay tracked.
    ///
    /// # Arguments
    /// * `files` - Files to be deleted. If [`None`] all the tracked files are deleted.
    ///   Files that are not tracked by this manager are ignored.
    pub fn cleanup_temporary_files(&mut self, files: Option<&[PathBuf]>) -> CleanupReport {
        let mut report = CleanupReport::default();

        let targets: Vec<PathBuf> = match files {
            Some(files) => files
                .iter()
                .filter(|path| {
                    let tracked = self.files.contains(*path);
                    if !tracked {
                        log::debug!("skipping untracked file {}", path.display());
                    }
                    tracked
                })
                .cloned()
                .collect(),
            None => self.files.clone(),
        };

        if targets.is_empty() {
            return report;
        }

        log::debug!("cleaning up {} temporary files", targets.len());

        let mut processed = Vec::with_capacity(targets.len());
        for path in targets {
            match fs::remove_file(&path) {
                Ok(()) => {
                    report.deleted += 1;
                    processed.push(path);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    report.missing += 1;
                    processed.push(path);
                }
                Err(err) => {
                    report.failed += 1;
                    log::warn!("failed to delete temporary file {}: {}", path.display(), err);
                }
            }
        }
        self.files.retain(|path| !processed.contains(path));

        log::debug!(
            "cleanup done: {} deleted, {} missing, {} failed",
            report.deleted,
            report.missing,
            report.failed
        );

        return report;
    }

    /// Deletes all the remaining temporary files.
    pub fn close(mut self) -> CleanupReport {
        self.release()
    }

    fn release(&mut self) -> CleanupReport {
        if self.closed {
            return CleanupReport::default();
        }
        self.closed = true;

        let report = self.cleanup_temporary_files(None);
        if report.deleted + report.missing + report.failed > 0 {
            log::info!(
                "temporary files cleaned up ({} deleted, {} failed)",
                report.deleted + report.missing,
                report.failed
            );
        }

        return report;
    }
}

impl Drop for TempFileManager {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::{CleanupReport, TempFileManager};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn dir_entries(dir: &std::path::Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[rstest]
    fn test_create_in_custom_dir(tmp_dir: tempfile::TempDir) {
        let custom_dir = tmp_dir.path().join("nested").join("tmp");

        let mut manager = TempFileManager::new(Some(&custom_dir)).unwrap();
        assert!(custom_dir.is_dir());
        assert_eq!(manager.dir(), custom_dir);

        let first = manager.create_temporary_file().unwrap();
        let second = manager.create_temporary_file().unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with(&custom_dir));
        assert_eq!(fs::metadata(&first).unwrap().len(), 0);
        assert_eq!(manager.files(), &[first, second]);
    }

    #[rstest]
    fn test_invalid_custom_dir(tmp_dir: tempfile::TempDir) {
        let file = tmp_dir.path().join("file");
        fs::write(&file, "not a directory").unwrap();

        assert!(TempFileManager::new(Some(&file.join("tmp"))).is_err());
    }

    #[rstest]
    fn test_default_dir() {
        let mut manager = TempFileManager::new(None).unwrap();
        let path = manager.create_temporary_file().unwrap();

        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path.exists());

        manager.close();
        assert!(!path.exists());
    }

    #[rstest]
    fn test_cleanup_subset(tmp_dir: tempfile::TempDir) {
        let mut manager = TempFileManager::new(Some(tmp_dir.path())).unwrap();
        let files: Vec<_> = (0..4).map(|_| manager.create_temporary_file().unwrap()).collect();

        let report = manager.cleanup_temporary_files(Some(&files[..2]));
        assert_eq!(
            report,
            CleanupReport {
                deleted: 2,
                missing: 0,
                failed: 0
            }
        );
        assert!(!files[0].exists());
        assert!(!files[1].exists());
        assert!(files[2].exists());
        assert_eq!(manager.files(), &files[2..]);

        let report = manager.close();
        assert_eq!(report.deleted, 2);
        assert_eq!(dir_entries(tmp_dir.path()), 0);
    }

    #[rstest]
    fn test_cleanup_tolerates_missing_files(tmp_dir: tempfile::TempDir) {
        let mut manager = TempFileManager::new(Some(tmp_dir.path())).unwrap();
        let first = manager.create_temporary_file().unwrap();
        let second = manager.create_temporary_file().unwrap();
        fs::remove_file(&first).unwrap();

        let report = manager.cleanup_temporary_files(None);
        assert_eq!(
            report,
            CleanupReport {
                deleted: 1,
                missing: 1,
                failed: 0
            }
        );
        assert!(!second.exists());
        assert!(manager.files().is_empty());
    }

    #[rstest]
    fn test_failed_deletion_stays_tracked(tmp_dir: tempfile::TempDir) {
        let mut manager = TempFileManager::new(Some(tmp_dir.path())).unwrap();
        let blocked = manager.create_temporary_file().unwrap();
        let other = manager.create_temporary_file().unwrap();

        fs::remove_file(&blocked).unwrap();
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("entry"), "data").unwrap();

        let report = manager.cleanup_temporary_files(None);
        assert_eq!(
            report,
            CleanupReport {
                deleted: 1,
                missing: 0,
                failed: 1
            }
        );
        assert!(!other.exists());
        assert_eq!(manager.files(), &[blocked.clone()]);

        fs::remove_dir_all(&blocked).unwrap();
        fs::write(&blocked, "data").unwrap();

        let report = manager.close();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 0);
        assert!(!blocked.exists());
    }

    #[rstest]
    fn test_cleanup_ignores_untracked_files(tmp_dir: tempfile::TempDir) {
        let untracked = tmp_dir.path().join("keep-me");
        fs::write(&untracked, "data").unwrap();

        let mut manager = TempFileManager::new(Some(tmp_dir.path())).unwrap();
        let report = manager.cleanup_temporary_files(Some(&[untracked.clone()][..]));

        assert_eq!(report, CleanupReport::default());
        assert!(untracked.exists());
    }

    #[rstest]
    fn test_drop_cleans_up(tmp_dir: tempfile::TempDir) {
        {
            let mut manager = TempFileManager::new(Some(tmp_dir.path())).unwrap();
            for _ in 0..3 {
                manager.create_temporary_file().unwrap();
            }
            assert_eq!(dir_entries(tmp_dir.path()), 3);
        }

        assert_eq!(dir_entries(tmp_dir.path()), 0);
    }
}
