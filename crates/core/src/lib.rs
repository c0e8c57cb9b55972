pub mod age;
pub mod cancel;
pub mod completeness;
pub mod config;
pub mod content;
pub mod discover;
pub mod error;
pub mod markdown;
pub mod model;
pub mod notify;
pub mod report;
pub mod scan;
pub mod structural;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use age::{validate_age, AgePolicy};
pub use cancel::CancelToken;
pub use completeness::{validate_completeness, ArchiveNamePolicy};
pub use config::{load_config, parse_duration, AuditConfig};
pub use content::{validate_content, ContentOptions, ContentOutcome};
pub use discover::{discover_backup_sets, discover_root, DiscoveryOptions, RootDiscovery};
pub use error::{ContentError, MarkerError, ScanError};
pub use markdown::render_markdown_summary;
pub use model::{
    AuditEvent, AuditPhase, BackupReport, BackupSetDescriptor, RunReport, RunSummary, ScanReport,
    Severity, ValidationIssue, ValidationStats, REPORT_VERSION,
};
pub use notify::{decide_notification, Notification, NotifyPolicy, RunStatus};
pub use report::{exit_code, load_run_report, summarize, write_run_report};
pub use scan::{
    run_audit, run_audit_with_callback, run_audit_with_events, scan_root, validate_sets,
    AuditOptions, AuditRunOutput, SchedulerObserver, SchedulerState,
};
pub use structural::validate_structure;
pub use validate::{validate_backup_set, ValidationOptions};
