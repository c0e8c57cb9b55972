use std::fmt::Display;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{
    now_rfc3339, BackupReport, BackupSetDescriptor, RunReport, RunSummary, ScanReport, Severity,
    ValidationIssue, ValidationStats, REPORT_VERSION,
};

pub const EXIT_ALL_VALID: i32 = 0;
pub const EXIT_INVALID_BACKUPS: i32 = 1;
pub const EXIT_FAILED_SCAN: i32 = 2;

pub fn assemble_run(run_id: String, results: Vec<ScanReport>) -> RunReport {
    let summary = summarize(&results);
    RunReport {
        report_version: REPORT_VERSION.to_string(),
        run_id,
        generated_at: now_rfc3339(),
        results,
        summary,
    }
}

pub fn summarize(results: &[ScanReport]) -> RunSummary {
    let mut summary = RunSummary::default();
    for scan in results {
        if scan.failed() {
            summary.failed_scans += 1;
        }
        for report in &scan.reports {
            summary.total_backups += 1;
            if report.valid {
                summary.valid_backups += 1;
            } else {
                summary.invalid_backups += 1;
            }
        }
    }
    summary
}

/// Entry for a root that could not be scanned at all.
pub fn failed_root_report(root: &Path, err: &dyn Display) -> ScanReport {
    let issue = ValidationIssue::at_path(
        Severity::Critical,
        err.to_string(),
        root,
        "check path accessibility and permissions",
    );
    ScanReport {
        root: root.to_path_buf(),
        reports: vec![BackupReport::for_root_issue(root.to_path_buf(), issue)],
        elapsed_ms: 0,
        scan_error: Some(err.to_string()),
    }
}

/// Stand-in for a set the worker pool never finished.
pub fn unfinished_report(set: &BackupSetDescriptor) -> BackupReport {
    let issue = ValidationIssue::at_path(
        Severity::Error,
        "validation did not complete before the scan was cancelled",
        &set.path,
        "rerun with a longer timeout or more workers",
    );
    let stats = ValidationStats {
        total_files: set.file_count,
        total_size_bytes: set.total_size_bytes,
        catalog_files: set.catalog_files.len() as u64,
        backup_files: set.backup_files.len() as u64,
        ..ValidationStats::default()
    };
    BackupReport::from_issues(set.path.clone(), vec![issue], stats)
}

pub fn exit_code(run: &RunReport) -> i32 {
    if run.results.iter().any(ScanReport::failed) {
        return EXIT_FAILED_SCAN;
    }
    let any_invalid = run
        .results
        .iter()
        .flat_map(|scan| &scan.reports)
        .any(|report| !report.valid);
    if any_invalid {
        EXIT_INVALID_BACKUPS
    } else {
        EXIT_ALL_VALID
    }
}

pub fn has_severity(run: &RunReport, severity: Severity) -> bool {
    run.results
        .iter()
        .flat_map(|scan| &scan.reports)
        .any(|report| report.has_severity(severity))
}

pub fn load_run_report(path: impl AsRef<Path>) -> Result<RunReport> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read report {}", path.display()))?;
    let report: RunReport = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(report)
}

pub fn write_run_report(report: &RunReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let payload = serde_json::to_string_pretty(report).context("failed to serialize run report")?;
    fs::write(path, payload)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{
        assemble_run, exit_code, failed_root_report, summarize, unfinished_report,
        EXIT_ALL_VALID, EXIT_FAILED_SCAN, EXIT_INVALID_BACKUPS,
    };
    use crate::model::{
        BackupReport, BackupSetDescriptor, ScanReport, Severity, ValidationIssue, ValidationStats,
    };

    fn scan_with(valid: &[bool]) -> ScanReport {
        ScanReport {
            root: PathBuf::from("/b"),
            reports: valid
                .iter()
                .enumerate()
                .map(|(index, ok)| {
                    let issues = if *ok {
                        Vec::new()
                    } else {
                        vec![ValidationIssue::new(Severity::Error, "bad", None, None)]
                    };
                    BackupReport::from_issues(
                        PathBuf::from(format!("/b/PC/{index}")),
                        issues,
                        ValidationStats::default(),
                    )
                })
                .collect(),
            elapsed_ms: 0,
            scan_error: None,
        }
    }

    #[test]
    fn summary_counts_reports_and_failures() {
        let failed = failed_root_report(Path::new("/gone"), &"failed to read backup root");
        let summary = summarize(&[scan_with(&[true, false, true]), failed]);

        assert_eq!(summary.total_backups, 4);
        assert_eq!(summary.valid_backups, 2);
        assert_eq!(summary.invalid_backups, 2);
        assert_eq!(summary.failed_scans, 1);
    }

    #[test]
    fn exit_code_prefers_failed_scans() {
        let clean = assemble_run("r".to_string(), vec![scan_with(&[true, true])]);
        assert_eq!(exit_code(&clean), EXIT_ALL_VALID);

        let invalid = assemble_run("r".to_string(), vec![scan_with(&[true, false])]);
        assert_eq!(exit_code(&invalid), EXIT_INVALID_BACKUPS);

        let failed = assemble_run(
            "r".to_string(),
            vec![
                scan_with(&[false]),
                failed_root_report(Path::new("/gone"), &"unreadable"),
            ],
        );
        assert_eq!(exit_code(&failed), EXIT_FAILED_SCAN);
    }

    #[test]
    fn failed_root_carries_one_critical_issue() {
        let scan = failed_root_report(Path::new("/gone"), &"permission denied");
        assert_eq!(scan.reports.len(), 1);
        assert_eq!(scan.reports[0].issues.len(), 1);
        assert_eq!(scan.reports[0].issues[0].severity, Severity::Critical);
        assert_eq!(scan.scan_error.as_deref(), Some("permission denied"));
    }

    #[test]
    fn unfinished_report_keeps_set_identity() {
        let set = BackupSetDescriptor {
            path: PathBuf::from("/b/PC/Set"),
            file_count: 4,
            ..BackupSetDescriptor::default()
        };
        let report = unfinished_report(&set);
        assert_eq!(report.set_path, set.path);
        assert!(!report.valid);
        assert_eq!(report.stats.total_files, 4);
    }
}
