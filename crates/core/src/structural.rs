use crate::discover::CATALOG_DIR_NAME;
use crate::model::{BackupSetDescriptor, Severity, ValidationIssue};

pub const MIN_FILE_COUNT: u64 = 2;
pub const MIN_TOTAL_SIZE_BYTES: u64 = 1024;

/// Number of structural checks a set can pass.
pub const STRUCTURAL_BASELINE_CHECKS: u64 = 5;

/// Layout checks over a descriptor. Every check runs regardless of the
/// outcome of the others.
pub fn validate_structure(set: &BackupSetDescriptor) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let catalog_dir = set.path.join(CATALOG_DIR_NAME);

    if !set.has_catalog_dir {
        issues.push(ValidationIssue::at_path(
            Severity::Error,
            "missing Catalogs folder",
            &catalog_dir,
            "backup set should contain a Catalogs folder with .wbcat files",
        ));
    } else if set.catalog_files.is_empty() {
        issues.push(ValidationIssue::at_path(
            Severity::Error,
            "no catalog files found in Catalogs folder",
            &catalog_dir,
            "ensure the backup completed successfully and catalog files exist",
        ));
    }

    if set.backup_files.is_empty() {
        issues.push(ValidationIssue::at_path(
            Severity::Error,
            "no backup files (.zip) found",
            &set.path,
            "backup set should contain .zip files with the actual backup data",
        ));
    }

    if set.file_count < MIN_FILE_COUNT {
        issues.push(ValidationIssue::at_path(
            Severity::Warning,
            format!("backup set contains only {} files", set.file_count),
            &set.path,
            "typical backup sets should contain multiple files (catalogs + backup files)",
        ));
    }

    if set.total_size_bytes < MIN_TOTAL_SIZE_BYTES {
        issues.push(ValidationIssue::at_path(
            Severity::Warning,
            format!("backup set is very small ({} bytes)", set.total_size_bytes),
            &set.path,
            "backup might be incomplete or corrupted",
        ));
    }

    issues
}

/// Baseline minus failing (Error or Critical) findings, floored at zero.
pub fn structural_checks_passed(issues: &[ValidationIssue]) -> u64 {
    let failed = issues
        .iter()
        .filter(|issue| issue.severity.is_failure())
        .count() as u64;
    STRUCTURAL_BASELINE_CHECKS.saturating_sub(failed)
}
