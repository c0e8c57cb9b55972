use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{BackupSetDescriptor, Severity, ValidationIssue};

/// What to do with backup-data files that follow no known naming scheme.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveNamePolicy {
    #[default]
    Ignore,
    Flag,
}

static SEQUENCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^backup files (\d+)\.zip$",
        r"(?i)^backup files \((\d+)\)\.zip$",
        r"(?i)^backupfiles(\d+)\.zip$",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Extracts the trailing sequence index from a backup-data file name.
pub fn sequence_index(file_name: &str) -> Option<u64> {
    SEQUENCE_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(file_name)
            .and_then(|captures| captures.get(1))
            .and_then(|index| index.as_str().parse().ok())
    })
}

/// Upper bound on gap names spelled out in one completeness issue.
pub const MAX_LISTED_MISSING: usize = 20;

pub fn canonical_name(index: u64) -> String {
    format!("Backup Files {index}.zip")
}

/// Reports gaps in the numbered backup-data sequence.
pub fn validate_completeness(
    set: &BackupSetDescriptor,
    policy: ArchiveNamePolicy,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut indices = BTreeSet::new();
    let mut unrecognized: Vec<&PathBuf> = Vec::new();

    for path in &set.backup_files {
        match file_name(path).and_then(sequence_index) {
            Some(index) => {
                indices.insert(index);
            }
            None => unrecognized.push(path),
        }
    }

    if let Some(message) = missing_sequence_message(&indices) {
        issues.push(ValidationIssue::at_path(
            Severity::Warning,
            message,
            &set.path,
            "backup may be incomplete; verify the backup job finished writing all archives",
        ));
    }

    if policy == ArchiveNamePolicy::Flag && !unrecognized.is_empty() {
        let names = unrecognized
            .iter()
            .filter_map(|path| file_name(path))
            .collect::<Vec<_>>();
        issues.push(ValidationIssue::at_path(
            Severity::Info,
            format!(
                "{} backup file(s) do not follow a numbered naming scheme: {}",
                unrecognized.len(),
                names.join(", ")
            ),
            &set.path,
            "non-standard archive names are excluded from sequence gap detection",
        ));
    }

    issues
}

/// Walks adjacent present indices, so the cost depends on the number of
/// files rather than the span between the smallest and largest index.
fn missing_sequence_message(indices: &BTreeSet<u64>) -> Option<String> {
    let mut listed = Vec::new();
    let mut missing_total: u128 = 0;

    for (&low, &high) in indices.iter().zip(indices.iter().skip(1)) {
        let gap = high - low - 1;
        if gap == 0 {
            continue;
        }
        missing_total += u128::from(gap);
        let mut index = low + 1;
        while index < high && listed.len() < MAX_LISTED_MISSING {
            listed.push(canonical_name(index));
            index += 1;
        }
    }

    if missing_total == 0 {
        return None;
    }
    let mut message = format!("missing backup files in sequence: {}", listed.join(", "));
    let unlisted = missing_total - listed.len() as u128;
    if unlisted > 0 {
        message.push_str(&format!(" and {unlisted} more"));
    }
    Some(message)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}
