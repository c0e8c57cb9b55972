use std::time::Instant;

use chrono::Utc;

use crate::age::{validate_age, AgePolicy};
use crate::cancel::CancelToken;
use crate::completeness::{validate_completeness, ArchiveNamePolicy};
use crate::content::{validate_content, ContentOptions};
use crate::model::{BackupReport, BackupSetDescriptor, Severity, ValidationIssue, ValidationStats};
use crate::structural::{structural_checks_passed, validate_structure};

/// Rule settings shared by every set in a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationOptions {
    pub content: ContentOptions,
    pub age: AgePolicy,
    pub archive_names: ArchiveNamePolicy,
}

/// Runs structural, completeness, content and age rules, in that order, and
/// folds their findings into one report. Cancellation is checked before each
/// rule after the structural one; remaining rules are skipped once it fires.
pub fn validate_backup_set(
    set: &BackupSetDescriptor,
    options: &ValidationOptions,
    cancel: &CancelToken,
) -> BackupReport {
    let started = Instant::now();
    let mut stats = ValidationStats {
        total_files: set.file_count,
        ..ValidationStats::default()
    };

    let mut issues = validate_structure(set);
    stats.structural_checks_passed = structural_checks_passed(&issues);

    if let Err(stage) = run_remaining_rules(set, options, cancel, &mut issues, &mut stats) {
        issues.push(ValidationIssue::at_path(
            Severity::Warning,
            format!("validation stopped early: scan cancelled before {stage} checks"),
            &set.path,
            "rerun with a longer timeout to complete every check",
        ));
    }

    stats.total_size_bytes = set.total_size_bytes;
    stats.elapsed_ms = started.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
    stats.catalog_files = set.catalog_files.len() as u64;
    stats.backup_files = set.backup_files.len() as u64;
    if !set.catalog_files.is_empty() || !set.backup_files.is_empty() {
        stats.oldest_backup_time = set.modified;
        stats.newest_backup_time = set.modified;
    }

    BackupReport::from_issues(set.path.clone(), issues, stats)
}

/// Returns the name of the rule that was about to run when cancellation hit.
fn run_remaining_rules(
    set: &BackupSetDescriptor,
    options: &ValidationOptions,
    cancel: &CancelToken,
    issues: &mut Vec<ValidationIssue>,
    stats: &mut ValidationStats,
) -> Result<(), &'static str> {
    if cancel.is_cancelled() {
        return Err("completeness");
    }
    issues.extend(validate_completeness(set, options.archive_names));

    if options.content.deep {
        if cancel.is_cancelled() {
            return Err("content");
        }
        let content = validate_content(set, &options.content, cancel);
        issues.extend(content.issues);
        stats.validated_files = content.stats.validated_files;
        stats.corrupt_files = content.stats.corrupt_files;
        stats.content_checks_passed = content.stats.content_checks_passed;

        if content.interrupted {
            let total = (set.backup_files.len() + set.catalog_files.len()) as u64;
            issues.push(ValidationIssue::at_path(
                Severity::Warning,
                format!(
                    "content validation stopped early: scan cancelled after {} of {} files",
                    stats.validated_files, total
                ),
                &set.path,
                "rerun with a longer timeout to sample every archive",
            ));
            return Ok(());
        }
    }

    if cancel.is_cancelled() {
        return Err("age");
    }
    issues.extend(validate_age(set, &options.age, Utc::now()));
    Ok(())
}
