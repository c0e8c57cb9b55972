use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread;

use anyhow::{anyhow, Context, Result};
use backup_sentinel_core::{
    load_config, parse_duration, render_markdown_summary, run_audit_with_callback,
    write_run_report, AuditEvent, AuditOptions, RunReport, RunSummary,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRequest {
    #[serde(default)]
    pub run_id: Option<String>,
    /// Configuration file; when absent the engine defaults apply.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    /// Backup roots. Non-empty overrides the configured `backup_paths`.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default = "default_emit_progress_events")]
    pub emit_progress_events: bool,
}

fn default_emit_progress_events() -> bool {
    true
}

impl Default for AuditRequest {
    fn default() -> Self {
        Self {
            run_id: None,
            config_path: None,
            paths: Vec::new(),
            workers: None,
            timeout: None,
            output: None,
            emit_progress_events: default_emit_progress_events(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditSessionStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSessionSnapshot {
    pub run_id: String,
    pub status: AuditSessionStatus,
    pub report_path: Option<PathBuf>,
    pub error: Option<String>,
    pub total_events: u64,
    pub summary: Option<RunSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAuditResponse {
    pub run_id: String,
    pub status: AuditSessionStatus,
}

#[derive(Debug, Clone)]
struct AuditSession {
    status: AuditSessionStatus,
    report_path: Option<PathBuf>,
    report: Option<RunReport>,
    error: Option<String>,
    events: Vec<AuditEvent>,
    cancel_flag: Arc<AtomicBool>,
}

static SESSIONS: Lazy<Mutex<HashMap<String, AuditSession>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Starts an audit on a background thread and returns its run id.
///
/// Configuration problems are reported here; failures during the run land in
/// the session snapshot.
pub fn start_audit(request: AuditRequest) -> Result<String> {
    let run_id = request
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let options = build_options(&request, &run_id, Arc::clone(&cancel_flag))?;

    {
        let mut sessions = lock_sessions()?;
        if sessions
            .get(&run_id)
            .is_some_and(|session| session.status == AuditSessionStatus::Running)
        {
            return Err(anyhow!("audit session already running: {run_id}"));
        }
        sessions.insert(
            run_id.clone(),
            AuditSession {
                status: AuditSessionStatus::Running,
                report_path: request.output.clone(),
                report: None,
                error: None,
                events: Vec::new(),
                cancel_flag: Arc::clone(&cancel_flag),
            },
        );
    }

    let thread_run_id = run_id.clone();
    thread::spawn(move || {
        let run_result = run_audit_with_callback(&options, |event| {
            if let Ok(mut sessions) = lock_sessions() {
                if let Some(session) = sessions.get_mut(&thread_run_id) {
                    session.events.push(event);
                }
            }
        });

        let outcome = run_result.and_then(|report| {
            if let Some(path) = &request.output {
                write_run_report(&report, path)?;
            }
            Ok(report)
        });

        if let Ok(mut sessions) = lock_sessions() {
            if let Some(session) = sessions.get_mut(&thread_run_id) {
                match outcome {
                    Ok(report) => {
                        session.report = Some(report);
                        session.status = if cancel_flag.load(Ordering::Relaxed) {
                            AuditSessionStatus::Cancelled
                        } else {
                            AuditSessionStatus::Completed
                        };
                        session.error = None;
                    }
                    Err(err) => {
                        session.status = AuditSessionStatus::Failed;
                        session.error = Some(format!("{err:#}"));
                    }
                }
            }
        }
    });

    Ok(run_id)
}

fn build_options(
    request: &AuditRequest,
    run_id: &str,
    cancel_flag: Arc<AtomicBool>,
) -> Result<AuditOptions> {
    let mut options = match &request.config_path {
        Some(path) => load_config(path)?.to_audit_options()?,
        None => AuditOptions::default(),
    };
    if !request.paths.is_empty() {
        options.roots = request.paths.clone();
    }
    if options.roots.is_empty() {
        return Err(anyhow!("no backup roots were provided"));
    }
    if let Some(workers) = request.workers {
        options.workers = workers;
    }
    if let Some(timeout) = &request.timeout {
        options.timeout = Some(parse_duration(timeout).context("invalid timeout")?);
    }
    options.run_id = Some(run_id.to_string());
    options.emit_progress_events = request.emit_progress_events;
    options.cancel_flag = Some(cancel_flag);
    Ok(options)
}

pub fn poll_audit_events(run_id: &str, from_seq: u64) -> Result<Vec<AuditEvent>> {
    let sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("audit session not found: {run_id}"))?;

    Ok(session
        .events
        .iter()
        .filter(|event| event.seq > from_seq)
        .cloned()
        .collect())
}

pub fn cancel_audit(run_id: &str) -> Result<CancelAuditResponse> {
    let mut sessions = lock_sessions()?;
    let session = sessions
        .get_mut(run_id)
        .ok_or_else(|| anyhow!("audit session not found: {run_id}"))?;

    session.cancel_flag.store(true, Ordering::Relaxed);
    if session.status == AuditSessionStatus::Running {
        session.status = AuditSessionStatus::Cancelled;
    }

    Ok(CancelAuditResponse {
        run_id: run_id.to_string(),
        status: session.status.clone(),
    })
}

pub fn get_audit_session(run_id: &str) -> Result<AuditSessionSnapshot> {
    let sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("audit session not found: {run_id}"))?;

    Ok(AuditSessionSnapshot {
        run_id: run_id.to_string(),
        status: session.status.clone(),
        report_path: session.report_path.clone(),
        error: session.error.clone(),
        total_events: session.events.len() as u64,
        summary: session.report.as_ref().map(|report| report.summary),
    })
}

/// Returns the finished run report, or `None` while the audit is running.
pub fn get_audit_report(run_id: &str) -> Result<Option<RunReport>> {
    let sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("audit session not found: {run_id}"))?;
    Ok(session.report.clone())
}

pub fn load_run_report(path: impl AsRef<Path>) -> Result<RunReport> {
    backup_sentinel_core::load_run_report(path)
}

pub fn render_summary(report: &RunReport) -> String {
    render_markdown_summary(report)
}

fn lock_sessions() -> Result<std::sync::MutexGuard<'static, HashMap<String, AuditSession>>> {
    SESSIONS
        .lock()
        .map_err(|_| anyhow!("audit session registry lock poisoned"))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, Instant};

    use backup_sentinel_core::AuditPhase;
    use tempfile::TempDir;

    use super::{
        cancel_audit, get_audit_report, get_audit_session, load_run_report, poll_audit_events,
        render_summary, start_audit, AuditRequest, AuditSessionSnapshot, AuditSessionStatus,
    };

    fn backup_root(temp: &TempDir) -> std::path::PathBuf {
        let root = temp.path().join("backups");
        let set = root.join("PC").join("Nightly");
        fs::create_dir_all(set.join("Catalogs")).expect("create set");
        fs::write(root.join("MediaID.bin"), b"media-id").expect("marker");
        fs::write(set.join("Catalogs").join("nightly.wbcat"), b"catalog").expect("catalog");
        fs::write(set.join("Backup Files 1.zip"), b"not really a zip").expect("data");
        root
    }

    fn wait_for_terminal(run_id: &str) -> AuditSessionSnapshot {
        let started = Instant::now();
        loop {
            let snapshot = get_audit_session(run_id).expect("session exists");
            if snapshot.status != AuditSessionStatus::Running {
                return snapshot;
            }
            assert!(started.elapsed() < Duration::from_secs(30));
            std::thread::sleep(Duration::from_millis(25));
        }
    }

    #[test]
    fn start_audit_creates_session_and_events() {
        let temp = TempDir::new().expect("tempdir");
        let root = backup_root(&temp);
        let output = temp.path().join("report.json");
        let run_id = start_audit(AuditRequest {
            paths: vec![root],
            output: Some(output.clone()),
            ..AuditRequest::default()
        })
        .expect("audit starts");

        let snapshot = wait_for_terminal(&run_id);
        assert_eq!(snapshot.status, AuditSessionStatus::Completed);
        assert!(snapshot.total_events >= 1);
        let summary = snapshot.summary.expect("summary present");
        assert_eq!(summary.total_backups, 1);
        assert_eq!(summary.invalid_backups, 1);

        let events = poll_audit_events(&run_id, 0).expect("events");
        assert!(events.iter().any(|event| event.phase == AuditPhase::Done));
        assert!(events.windows(2).all(|pair| pair[0].seq < pair[1].seq));
        let tail = poll_audit_events(&run_id, events[0].seq).expect("events");
        assert_eq!(tail.len(), events.len() - 1);

        let report = get_audit_report(&run_id)
            .expect("session exists")
            .expect("report ready");
        assert_eq!(report.run_id, run_id);
        let saved = load_run_report(&output).expect("saved report");
        assert_eq!(saved, report);
        assert!(render_summary(&saved).contains("Nightly"));

        let cancel = cancel_audit(&run_id).expect("cancel response");
        assert_eq!(cancel.run_id, run_id);
        assert_eq!(cancel.status, AuditSessionStatus::Completed);
    }

    #[test]
    fn rejects_requests_without_roots() {
        assert!(start_audit(AuditRequest::default()).is_err());
        assert!(start_audit(AuditRequest {
            config_path: Some(Path::new("/definitely/missing/config.json").to_path_buf()),
            ..AuditRequest::default()
        })
        .is_err());
    }

    #[test]
    fn unknown_sessions_are_errors() {
        assert!(get_audit_session("no-such-run").is_err());
        assert!(poll_audit_events("no-such-run", 0).is_err());
        assert!(cancel_audit("no-such-run").is_err());
    }
}
