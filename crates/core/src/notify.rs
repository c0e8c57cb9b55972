use serde::{Deserialize, Serialize};

use crate::model::{RunReport, Severity};
use crate::report::has_severity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifyPolicy {
    #[serde(default = "default_true")]
    pub send_on_errors: bool,
    #[serde(default)]
    pub send_on_warnings: bool,
    #[serde(default)]
    pub send_on_success: bool,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_subject_prefix() -> String {
    "[Backup Alert]".to_string()
}

impl Default for NotifyPolicy {
    fn default() -> Self {
        Self {
            send_on_errors: true,
            send_on_warnings: false,
            send_on_success: false,
            subject_prefix: default_subject_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Warnings,
    Errors,
}

impl RunStatus {
    fn headline(self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Warnings => "WARNINGS",
            RunStatus::Errors => "ERRORS DETECTED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub status: RunStatus,
    pub subject: String,
}

pub fn run_status(run: &RunReport) -> RunStatus {
    if run.summary.invalid_backups > 0 || run.summary.failed_scans > 0 {
        RunStatus::Errors
    } else if has_severity(run, Severity::Warning) {
        RunStatus::Warnings
    } else {
        RunStatus::Success
    }
}

/// Decides whether a run warrants a notification and builds its subject line.
pub fn decide_notification(policy: &NotifyPolicy, run: &RunReport) -> Option<Notification> {
    let status = run_status(run);
    let has_warnings = has_severity(run, Severity::Warning);
    let send = (policy.send_on_errors && status == RunStatus::Errors)
        || (policy.send_on_warnings && has_warnings)
        || (policy.send_on_success && status == RunStatus::Success);
    if !send {
        return None;
    }

    let prefix = if policy.subject_prefix.trim().is_empty() {
        default_subject_prefix()
    } else {
        policy.subject_prefix.clone()
    };
    Some(Notification {
        status,
        subject: format!(
            "{} {} - {}/{} Backups Valid",
            prefix,
            status.headline(),
            run.summary.valid_backups,
            run.summary.total_backups
        ),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{decide_notification, NotifyPolicy, RunStatus};
    use crate::model::{BackupReport, ScanReport, Severity, ValidationIssue, ValidationStats};
    use crate::report::assemble_run;

    fn run_with(severity: Option<Severity>) -> crate::model::RunReport {
        let issues = severity
            .map(|severity| vec![ValidationIssue::new(severity, "finding", None, None)])
            .unwrap_or_default();
        let report =
            BackupReport::from_issues(PathBuf::from("/b/PC/Set"), issues, ValidationStats::default());
        assemble_run(
            "run".to_string(),
            vec![ScanReport {
                root: PathBuf::from("/b"),
                reports: vec![report],
                elapsed_ms: 0,
                scan_error: None,
            }],
        )
    }

    #[test]
    fn errors_notify_by_default() {
        let notification =
            decide_notification(&NotifyPolicy::default(), &run_with(Some(Severity::Error)))
                .expect("notification due");
        assert_eq!(notification.status, RunStatus::Errors);
        assert_eq!(
            notification.subject,
            "[Backup Alert] ERRORS DETECTED - 0/1 Backups Valid"
        );
    }

    #[test]
    fn quiet_runs_respect_policy() {
        let policy = NotifyPolicy::default();
        assert!(decide_notification(&policy, &run_with(None)).is_none());
        assert!(decide_notification(&policy, &run_with(Some(Severity::Warning))).is_none());

        let chatty = NotifyPolicy {
            send_on_warnings: true,
            send_on_success: true,
            subject_prefix: "[NAS]".to_string(),
            ..NotifyPolicy::default()
        };
        let warning = decide_notification(&chatty, &run_with(Some(Severity::Warning)))
            .expect("warning notification");
        assert_eq!(warning.subject, "[NAS] WARNINGS - 1/1 Backups Valid");
        let success = decide_notification(&chatty, &run_with(Some(Severity::Info)))
            .expect("success notification");
        assert_eq!(success.status, RunStatus::Success);
    }
}
