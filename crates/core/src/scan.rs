use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, OnceLock,
};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::bounded;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::discover::{discover_root, DiscoveryOptions};
use crate::error::ScanError;
use crate::model::{
    now_rfc3339, AuditEvent, AuditPhase, BackupReport, BackupSetDescriptor, RunReport, ScanReport,
};
use crate::report::{assemble_run, failed_root_report, unfinished_report};
use crate::validate::{validate_backup_set, ValidationOptions};

#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub roots: Vec<PathBuf>,
    pub workers: usize,
    pub timeout: Option<Duration>,
    pub discovery: DiscoveryOptions,
    pub validation: ValidationOptions,
    pub run_id: Option<String>,
    pub emit_progress_events: bool,
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            workers: 4,
            timeout: Some(Duration::from_secs(30 * 60)),
            discovery: DiscoveryOptions::default(),
            validation: ValidationOptions::default(),
            run_id: None,
            emit_progress_events: false,
            cancel_flag: None,
        }
    }
}

/// Lifecycle of one pool run over a root's sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Dispatching,
    Draining,
    Done,
}

/// Hooks invoked by the worker pool. Called from worker threads.
pub trait SchedulerObserver: Sync {
    fn state_changed(&self, _state: SchedulerState) {}

    fn set_validated(&self, _index: usize, _report: &BackupReport) {}
}

impl SchedulerObserver for () {}

/// Validates every set with a bounded pool of workers.
///
/// The result has one slot per input set, in input order. Slots for sets that
/// were never dispatched, or whose worker saw the cancellation first, hold
/// `BackupReport::default()`.
pub fn validate_sets(
    sets: &[BackupSetDescriptor],
    workers: usize,
    options: &ValidationOptions,
    cancel: &CancelToken,
) -> Vec<BackupReport> {
    validate_sets_observed(sets, workers, options, cancel, &())
}

pub fn validate_sets_observed(
    sets: &[BackupSetDescriptor],
    workers: usize,
    options: &ValidationOptions,
    cancel: &CancelToken,
    observer: &dyn SchedulerObserver,
) -> Vec<BackupReport> {
    observer.state_changed(SchedulerState::Idle);
    if sets.is_empty() {
        observer.state_changed(SchedulerState::Done);
        return Vec::new();
    }

    let workers = workers.max(1).min(sets.len());
    let slots: Vec<OnceLock<BackupReport>> = (0..sets.len()).map(|_| OnceLock::new()).collect();
    let (sender, receiver) = bounded::<usize>(sets.len());

    debug!("dispatching {} set(s) to {} worker(s)", sets.len(), workers);
    observer.state_changed(SchedulerState::Dispatching);

    thread::scope(|scope| {
        let slots = &slots;

        scope.spawn(move || {
            for index in 0..sets.len() {
                if cancel.is_cancelled() {
                    warn!(
                        "scan cancelled; {} set(s) left undispatched",
                        sets.len() - index
                    );
                    break;
                }
                if sender.send(index).is_err() {
                    break;
                }
            }
            drop(sender);
            observer.state_changed(SchedulerState::Draining);
        });

        for _ in 0..workers {
            let receiver = receiver.clone();
            scope.spawn(move || {
                while let Ok(index) = receiver.recv() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let report = validate_backup_set(&sets[index], options, cancel);
                    observer.set_validated(index, &report);
                    // Indices are unique per run, so each slot is set at most once.
                    let _ = slots[index].set(report);
                }
            });
        }
    });

    observer.state_changed(SchedulerState::Done);
    slots
        .into_iter()
        .map(|slot| slot.into_inner().unwrap_or_default())
        .collect()
}

pub struct AuditRunOutput {
    pub report: RunReport,
    pub events: Vec<AuditEvent>,
}

pub fn run_audit(options: &AuditOptions) -> Result<RunReport> {
    run_audit_with_callback(options, |_| {})
}

pub fn run_audit_with_events(options: &AuditOptions) -> Result<AuditRunOutput> {
    let events = Mutex::new(Vec::new());
    let report = run_audit_with_callback(options, |event| {
        if let Ok(mut events) = events.lock() {
            events.push(event);
        }
    })?;
    let events = events
        .into_inner()
        .map_err(|_| anyhow!("audit event buffer lock poisoned"))?;
    Ok(AuditRunOutput { report, events })
}

/// Scans every configured root in order. A root that cannot be read becomes
/// a failed scan entry rather than aborting the run.
pub fn run_audit_with_callback<F>(options: &AuditOptions, on_event: F) -> Result<RunReport>
where
    F: Fn(AuditEvent) + Sync,
{
    validate_audit_options(options)?;
    let run_id = options
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let cancel = CancelToken::new(options.timeout, options.cancel_flag.clone());
    let sink = EventSink::new(run_id.clone(), options.emit_progress_events, &on_event);

    info!(
        "starting audit {} over {} root(s) with {} worker(s)",
        run_id,
        options.roots.len(),
        options.workers.max(1)
    );

    let mut results = Vec::with_capacity(options.roots.len());
    for root in &options.roots {
        match scan_root_with_sink(root, options, &cancel, &sink) {
            Ok(report) => results.push(report),
            Err(err) => {
                warn!("scan failed for {}: {}", root.display(), err);
                sink.emit(AuditPhase::RootFailed, Some(root), None, 0, 0);
                results.push(failed_root_report(root, &err));
            }
        }
    }

    let report = assemble_run(run_id, results);
    sink.emit(
        AuditPhase::Done,
        None,
        None,
        report.summary.total_backups,
        report.summary.total_backups,
    );
    info!(
        "audit finished: {}/{} backups valid, {} failed scan(s)",
        report.summary.valid_backups, report.summary.total_backups, report.summary.failed_scans
    );
    Ok(report)
}

/// Discovers and validates the backup sets under one root.
pub fn scan_root(
    root: &Path,
    options: &AuditOptions,
    cancel: &CancelToken,
) -> Result<ScanReport, ScanError> {
    let noop = |_: AuditEvent| {};
    let sink = EventSink::new(String::new(), false, &noop);
    scan_root_with_sink(root, options, cancel, &sink)
}

fn scan_root_with_sink(
    root: &Path,
    options: &AuditOptions,
    cancel: &CancelToken,
    sink: &EventSink<'_>,
) -> Result<ScanReport, ScanError> {
    let started = Instant::now();
    info!("scanning backup root {}", root.display());
    sink.emit(AuditPhase::Discovering, Some(root), None, 0, 0);

    let discovery = discover_root(root, &options.discovery)?;
    let observer = RootObserver {
        sink,
        root,
        sets: &discovery.sets,
        completed: AtomicU64::new(0),
    };
    let slots = validate_sets_observed(
        &discovery.sets,
        options.workers,
        &options.validation,
        cancel,
        &observer,
    );

    let mut unfinished = 0_usize;
    let mut reports = discovery.root_reports;
    for (set, report) in discovery.sets.iter().zip(slots) {
        if report.is_unfinished() {
            unfinished += 1;
            reports.push(unfinished_report(set));
        } else {
            reports.push(report);
        }
    }
    if unfinished > 0 {
        warn!(
            "{} of {} set(s) under {} were not validated before cancellation",
            unfinished,
            discovery.sets.len(),
            root.display()
        );
    }

    let completed = observer.completed.load(Ordering::Relaxed);
    sink.emit(
        AuditPhase::RootFinished,
        Some(root),
        None,
        completed,
        discovery.sets.len() as u64,
    );

    Ok(ScanReport {
        root: root.to_path_buf(),
        reports,
        elapsed_ms: started.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        scan_error: None,
    })
}

fn validate_audit_options(options: &AuditOptions) -> Result<()> {
    if options.roots.is_empty() {
        return Err(anyhow!("no backup roots were provided"));
    }
    if options.validation.content.sample_bytes == 0 {
        return Err(anyhow!("sample_bytes must be greater than zero"));
    }
    Ok(())
}

pub(crate) struct EventSink<'a> {
    run_id: String,
    enabled: bool,
    seq: Mutex<u64>,
    on_event: &'a (dyn Fn(AuditEvent) + Sync),
}

impl<'a> EventSink<'a> {
    pub(crate) fn new(
        run_id: String,
        enabled: bool,
        on_event: &'a (dyn Fn(AuditEvent) + Sync),
    ) -> Self {
        Self {
            run_id,
            enabled,
            seq: Mutex::new(0),
            on_event,
        }
    }

    pub(crate) fn emit(
        &self,
        phase: AuditPhase,
        root: Option<&Path>,
        set_path: Option<&Path>,
        completed_sets: u64,
        total_sets: u64,
    ) {
        if !self.enabled {
            return;
        }
        // Held across the callback so consumers observe events in seq order.
        let Ok(mut seq) = self.seq.lock() else {
            return;
        };
        *seq += 1;
        (self.on_event)(AuditEvent {
            seq: *seq,
            run_id: self.run_id.clone(),
            phase,
            root: root.map(|path| path.to_string_lossy().to_string()),
            set_path: set_path.map(|path| path.to_string_lossy().to_string()),
            completed_sets,
            total_sets,
            timestamp: now_rfc3339(),
        });
    }
}

struct RootObserver<'a> {
    sink: &'a EventSink<'a>,
    root: &'a Path,
    sets: &'a [BackupSetDescriptor],
    completed: AtomicU64,
}

impl SchedulerObserver for RootObserver<'_> {
    fn state_changed(&self, state: SchedulerState) {
        debug!("scheduler for {} entered {:?}", self.root.display(), state);
        let phase = match state {
            SchedulerState::Dispatching => AuditPhase::Dispatching,
            SchedulerState::Draining => AuditPhase::Draining,
            SchedulerState::Idle | SchedulerState::Done => return,
        };
        self.sink.emit(
            phase,
            Some(self.root),
            None,
            self.completed.load(Ordering::Relaxed),
            self.sets.len() as u64,
        );
    }

    fn set_validated(&self, index: usize, report: &BackupReport) {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "validated {} (valid={}, issues={})",
            report.set_path.display(),
            report.valid,
            report.issues.len()
        );
        self.sink.emit(
            AuditPhase::SetValidated,
            Some(self.root),
            Some(&self.sets[index].path),
            completed,
            self.sets.len() as u64,
        );
    }
}
