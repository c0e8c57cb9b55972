use crate::model::{BackupReport, RunReport, Severity};

pub fn render_markdown_summary(run: &RunReport) -> String {
    let summary = &run.summary;
    let mut out = String::new();
    out.push_str("# Backup Validation Summary\n\n");
    out.push_str(&format!(
        "- Report version: `{}`\n- Run: `{}`\n- Generated at: `{}`\n- Total backups: {}\n- Valid: {}\n- Invalid: {}\n- Failed scans: {}\n",
        run.report_version,
        run.run_id,
        run.generated_at,
        summary.total_backups,
        summary.valid_backups,
        summary.invalid_backups,
        summary.failed_scans
    ));
    if summary.total_backups > 0 {
        let rate = summary.valid_backups as f64 / summary.total_backups as f64 * 100.0;
        out.push_str(&format!("- Success rate: {rate:.1}%\n"));
    }
    out.push('\n');

    for scan in &run.results {
        out.push_str(&format!("## `{}`\n\n", scan.root.display()));
        if let Some(error) = &scan.scan_error {
            out.push_str(&format!("Scan failed: {}\n\n", error));
        }
        if scan.reports.is_empty() {
            out.push_str("No backup sets found.\n\n");
            continue;
        }
        for report in &scan.reports {
            render_backup(&mut out, report);
        }
    }

    out
}

fn render_backup(out: &mut String, report: &BackupReport) {
    let name = report
        .set_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| report.set_path.display().to_string());
    out.push_str(&format!(
        "### {} `{}`\n\n",
        if report.valid { "VALID" } else { "INVALID" },
        name
    ));

    let stats = &report.stats;
    out.push_str(&format!(
        "- Path: `{}`\n- Files: {} ({} catalog, {} backup)\n- Size: {}\n- Validated: {} / corrupt: {}\n- Checked at: `{}` in {} ms\n",
        report.set_path.display(),
        stats.total_files,
        stats.catalog_files,
        stats.backup_files,
        human_bytes(stats.total_size_bytes),
        stats.validated_files,
        stats.corrupt_files,
        report.checked_at,
        stats.elapsed_ms
    ));
    if let Some(newest) = &stats.newest_backup_time {
        out.push_str(&format!("- Last modified: `{}`\n", newest.to_rfc3339()));
    }

    if !report.issues.is_empty() {
        out.push_str("- Issues:\n");
        for issue in &report.issues {
            out.push_str(&format!(
                "  - **{}** {}\n",
                severity_tag(issue.severity),
                issue.message
            ));
            if let Some(path) = &issue.path {
                out.push_str(&format!("    - path: `{}`\n", path));
            }
            if let Some(suggestion) = &issue.suggestion {
                out.push_str(&format!("    - suggestion: {}\n", suggestion));
            }
        }
    }
    out.push('\n');
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "INFO",
        Severity::Warning => "WARNING",
        Severity::Error => "ERROR",
        Severity::Critical => "CRITICAL",
    }
}

pub fn human_bytes(value: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if value == 0 {
        return "0 B".to_string();
    }
    let mut size = value as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}
