use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::ZipArchive;

use crate::cancel::CancelToken;
use crate::error::ContentError;
use crate::model::{BackupSetDescriptor, Severity, ValidationIssue, ValidationStats};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentOptions {
    /// When false the content pass is skipped entirely.
    pub deep: bool,
    /// Upper bound on bytes read from each sampled archive entry.
    pub sample_bytes: u64,
    pub max_sampled_entries: usize,
    pub catalog_sample_bytes: u64,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            deep: true,
            sample_bytes: 1024,
            max_sampled_entries: 3,
            catalog_sample_bytes: 512,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContentOutcome {
    pub issues: Vec<ValidationIssue>,
    /// Only the content counters (validated, corrupt, passed) are populated.
    pub stats: ValidationStats,
    pub interrupted: bool,
}

/// Samples every backup-data archive and catalog file of a set. Stops between
/// files once `cancel` fires, keeping what was counted so far.
pub fn validate_content(
    set: &BackupSetDescriptor,
    options: &ContentOptions,
    cancel: &CancelToken,
) -> ContentOutcome {
    let mut outcome = ContentOutcome::default();

    for archive_path in &set.backup_files {
        if cancel.is_cancelled() {
            outcome.interrupted = true;
            return outcome;
        }

        outcome.stats.validated_files += 1;
        match check_archive(archive_path, options) {
            Ok(()) => outcome.stats.content_checks_passed += 1,
            Err(err) => {
                debug!("archive check failed for {}: {}", archive_path.display(), err);
                outcome.stats.corrupt_files += 1;
                outcome.issues.push(ValidationIssue::at_path(
                    Severity::Error,
                    format!("corrupted backup file: {err}"),
                    archive_path,
                    "backup file may need to be restored from another source",
                ));
            }
        }
    }

    for catalog_path in &set.catalog_files {
        if cancel.is_cancelled() {
            outcome.interrupted = true;
            return outcome;
        }

        outcome.stats.validated_files += 1;
        match check_catalog(catalog_path, options.catalog_sample_bytes) {
            Ok(()) => outcome.stats.content_checks_passed += 1,
            Err(err) => {
                outcome.stats.corrupt_files += 1;
                outcome.issues.push(ValidationIssue::at_path(
                    Severity::Warning,
                    format!("catalog file issue: {err}"),
                    catalog_path,
                    "catalog may be corrupted but backup data might still be recoverable",
                ));
            }
        }
    }

    outcome
}

/// Opens an archive and reads a bounded sample from its first entries.
pub fn check_archive(path: &Path, options: &ContentOptions) -> Result<(), ContentError> {
    let file = File::open(path).map_err(ContentError::FileOpen)?;
    let mut archive = ZipArchive::new(file)?;
    if archive.is_empty() {
        return Err(ContentError::EmptyArchive);
    }

    let sampled = archive.len().min(options.max_sampled_entries.max(1));
    let mut first_entry_size = 0_u64;
    for index in 0..sampled {
        let mut entry = archive
            .by_index(index)
            .map_err(|source| ContentError::EntryOpen { index, source })?;
        let size = entry.size();
        if index == 0 {
            first_entry_size = size;
        }
        let name = entry.name().to_string();

        let mut buffer = Vec::new();
        let read = (&mut entry)
            .take(options.sample_bytes.min(size))
            .read_to_end(&mut buffer);
        match read {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {}
            Err(source) => return Err(ContentError::EntryRead { name, source }),
        }
    }

    if archive.len() == 1 && first_entry_size == 0 {
        return Err(ContentError::SingleEmptyEntry);
    }
    Ok(())
}

pub fn check_catalog(path: &Path, sample_bytes: u64) -> Result<(), ContentError> {
    let size = fs::metadata(path).map_err(ContentError::FileOpen)?.len();
    if size == 0 {
        return Err(ContentError::EmptyCatalog);
    }

    let file = File::open(path).map_err(ContentError::FileOpen)?;
    let mut buffer = Vec::new();
    file.take(sample_bytes.min(size))
        .read_to_end(&mut buffer)
        .map_err(ContentError::CatalogRead)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::Instant;

    use tempfile::TempDir;

    use super::{check_archive, validate_content, ContentOptions};
    use crate::cancel::CancelToken;
    use crate::error::ContentError;
    use crate::model::{BackupSetDescriptor, Severity};
    use crate::test_support::{write_empty_zip, write_zip};

    fn set_of(temp: &TempDir, backups: Vec<PathBuf>, catalogs: Vec<PathBuf>) -> BackupSetDescriptor {
        BackupSetDescriptor {
            path: temp.path().to_path_buf(),
            backup_files: backups,
            catalog_files: catalogs,
            ..BackupSetDescriptor::default()
        }
    }

    #[test]
    fn well_formed_archive_passes() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("Backup Files 1.zip");
        write_zip(&path, &[("a.txt", &[7_u8; 4096][..]), ("b.txt", &b"bee"[..])]);

        assert!(check_archive(&path, &ContentOptions::default()).is_ok());
    }

    #[test]
    fn empty_archive_counts_as_corrupt_once() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("Backup Files 1.zip");
        write_empty_zip(&path);

        let outcome = validate_content(
            &set_of(&temp, vec![path], Vec::new()),
            &ContentOptions::default(),
            &CancelToken::never(),
        );

        assert_eq!(outcome.stats.validated_files, 1);
        assert_eq!(outcome.stats.corrupt_files, 1);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].severity, Severity::Error);
        assert!(outcome.issues[0].message.contains("empty"));
    }

    #[test]
    fn single_zero_length_entry_is_flagged() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("Backup Files 1.zip");
        write_zip(&path, &[("only.txt", &b""[..])]);

        let err = check_archive(&path, &ContentOptions::default()).expect_err("flagged");
        assert!(matches!(err, ContentError::SingleEmptyEntry));
    }

    #[test]
    fn garbage_archive_and_empty_catalog_are_reported() {
        let temp = TempDir::new().expect("tempdir");
        let archive = temp.path().join("Backup Files 1.zip");
        let catalog = temp.path().join("x.wbcat");
        fs::write(&archive, b"definitely not a zip archive").expect("write archive");
        fs::write(&catalog, b"").expect("write catalog");

        let outcome = validate_content(
            &set_of(&temp, vec![archive], vec![catalog]),
            &ContentOptions::default(),
            &CancelToken::never(),
        );

        assert_eq!(outcome.stats.validated_files, 2);
        assert_eq!(outcome.stats.corrupt_files, 2);
        assert_eq!(outcome.stats.content_checks_passed, 0);
        assert_eq!(outcome.issues[0].severity, Severity::Error);
        assert_eq!(outcome.issues[1].severity, Severity::Warning);
        assert!(outcome.issues[1].message.contains("catalog file is empty"));
    }

    #[test]
    fn cancelled_pass_returns_partial_counts() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("Backup Files 1.zip");
        write_zip(&path, &[("a.txt", &b"abc"[..])]);

        let outcome = validate_content(
            &set_of(&temp, vec![path], Vec::new()),
            &ContentOptions::default(),
            &CancelToken::with_deadline(Instant::now()),
        );

        assert!(outcome.interrupted);
        assert_eq!(outcome.stats.validated_files, 0);
        assert!(outcome.issues.is_empty());
    }
}
