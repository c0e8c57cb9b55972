pub mod service;

pub use service::{
    cancel_audit, get_audit_report, get_audit_session, load_run_report, poll_audit_events,
    render_summary, start_audit, AuditRequest, AuditSessionSnapshot, AuditSessionStatus,
    CancelAuditResponse,
};
