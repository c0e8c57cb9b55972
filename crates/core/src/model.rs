use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const REPORT_VERSION: &str = "1.0.0";

/// Ordered classification of a validation finding.
///
/// Variants are declared from least to most severe; the derived `Ord` is the
/// total order used for validity decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn rank(self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Warning => 1,
            Severity::Error => 2,
            Severity::Critical => 3,
        }
    }

    pub fn is_at_least(self, threshold: Severity) -> bool {
        self.rank() >= threshold.rank()
    }

    /// True for severities that make a report invalid.
    pub fn is_failure(self) -> bool {
        self.is_at_least(Severity::Error)
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub checked_at: String,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        path: Option<String>,
        suggestion: Option<String>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            path,
            suggestion,
            checked_at: now_rfc3339(),
        }
    }

    pub fn at_path(
        severity: Severity,
        message: impl Into<String>,
        path: &std::path::Path,
        suggestion: &str,
    ) -> Self {
        Self::new(
            severity,
            message,
            Some(path.to_string_lossy().to_string()),
            Some(suggestion.to_string()),
        )
    }
}

/// Metadata gathered for one backup set by a single traversal of its subtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BackupSetDescriptor {
    pub path: PathBuf,
    pub file_count: u64,
    pub total_size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    pub has_catalog_dir: bool,
    pub catalog_files: Vec<PathBuf>,
    pub backup_files: Vec<PathBuf>,
}

impl BackupSetDescriptor {
    /// Descriptor for a candidate whose walk failed: path only, zero metadata.
    pub fn unreadable(path: PathBuf) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidationStats {
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub validated_files: u64,
    #[serde(default)]
    pub corrupt_files: u64,
    #[serde(default)]
    pub total_size_bytes: u64,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub catalog_files: u64,
    #[serde(default)]
    pub backup_files: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_backup_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_backup_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub structural_checks_passed: u64,
    #[serde(default)]
    pub content_checks_passed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BackupReport {
    pub set_path: PathBuf,
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub checked_at: String,
    #[serde(default)]
    pub stats: ValidationStats,
}

impl BackupReport {
    /// Builds a report whose validity is derived from `issues`.
    pub fn from_issues(
        set_path: PathBuf,
        issues: Vec<ValidationIssue>,
        stats: ValidationStats,
    ) -> Self {
        Self {
            valid: issues_are_valid(&issues),
            set_path,
            issues,
            checked_at: now_rfc3339(),
            stats,
        }
    }

    /// Synthetic report for a failure that applies to a whole root.
    pub fn for_root_issue(root: PathBuf, issue: ValidationIssue) -> Self {
        Self::from_issues(root, vec![issue], ValidationStats::default())
    }

    /// A slot the scheduler never filled.
    pub fn is_unfinished(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_severity(&self, severity: Severity) -> bool {
        self.issues.iter().any(|issue| issue.severity == severity)
    }
}

pub fn issues_are_valid(issues: &[ValidationIssue]) -> bool {
    !issues.iter().any(|issue| issue.severity.is_failure())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScanReport {
    pub root: PathBuf,
    pub reports: Vec<BackupReport>,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_error: Option<String>,
}

impl ScanReport {
    pub fn failed(&self) -> bool {
        self.scan_error.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total_backups: u64,
    pub valid_backups: u64,
    pub invalid_backups: u64,
    pub failed_scans: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub report_version: String,
    pub run_id: String,
    pub generated_at: String,
    pub results: Vec<ScanReport>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub seq: u64,
    pub run_id: String,
    pub phase: AuditPhase,
    pub root: Option<String>,
    pub set_path: Option<String>,
    pub completed_sets: u64,
    pub total_sets: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditPhase {
    Discovering,
    Dispatching,
    SetValidated,
    Draining,
    RootFinished,
    RootFailed,
    Done,
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
