use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{MarkerError, ScanError};
use crate::model::{BackupReport, BackupSetDescriptor, Severity, ValidationIssue};

pub const MARKER_FILE_NAME: &str = "MediaID.bin";
pub const CATALOG_DIR_NAME: &str = "Catalogs";
pub const BACKUP_DATA_EXTENSION: &str = "zip";
pub const DEFAULT_CATALOG_EXTENSIONS: &[&str] = &["wbcat", "cat"];

const MAX_MARKER_SIZE_BYTES: u64 = 1024 * 1024;
const MARKER_SAMPLE_BYTES: u64 = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOptions {
    /// Lowercase extensions without a leading dot.
    pub catalog_extensions: Vec<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            catalog_extensions: DEFAULT_CATALOG_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl DiscoveryOptions {
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog_extensions = Vec::new();
        for ext in extensions {
            let ext = normalize_extension(ext.as_ref());
            if !ext.is_empty() && !catalog_extensions.contains(&ext) {
                catalog_extensions.push(ext);
            }
        }
        Self { catalog_extensions }
    }

    fn is_catalog_extension(&self, ext: &str) -> bool {
        self.catalog_extensions.iter().any(|known| known == ext)
    }
}

pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Result of inspecting one root: root-level findings plus candidate sets.
#[derive(Debug, Clone, Default)]
pub struct RootDiscovery {
    pub root_reports: Vec<BackupReport>,
    pub sets: Vec<BackupSetDescriptor>,
}

/// Checks the marker file and, unless it is missing, enumerates backup sets
/// newest-first.
pub fn discover_root(root: &Path, options: &DiscoveryOptions) -> Result<RootDiscovery, ScanError> {
    let marker_path = root.join(MARKER_FILE_NAME);
    if !marker_path.is_file() {
        info!("marker file missing under {}; skipping discovery", root.display());
        let issue = ValidationIssue::at_path(
            Severity::Critical,
            format!("missing {MARKER_FILE_NAME} at root"),
            root,
            "ensure the backup root directory is correct and contains MediaID.bin",
        );
        return Ok(RootDiscovery {
            root_reports: vec![BackupReport::for_root_issue(root.to_path_buf(), issue)],
            sets: Vec::new(),
        });
    }

    let mut root_reports = Vec::new();
    if let Err(err) = validate_marker(&marker_path) {
        let issue = ValidationIssue::at_path(
            Severity::Error,
            format!("invalid {MARKER_FILE_NAME}: {err}"),
            &marker_path,
            "check if MediaID.bin is corrupted or from a different backup system",
        );
        root_reports.push(BackupReport::for_root_issue(root.to_path_buf(), issue));
    }

    let sets = discover_backup_sets(root, options)?;
    info!("found {} backup set(s) under {}", sets.len(), root.display());
    Ok(RootDiscovery { root_reports, sets })
}

pub fn validate_marker(path: &Path) -> Result<(), MarkerError> {
    let name = MARKER_FILE_NAME.to_string();
    let metadata = fs::metadata(path).map_err(|source| MarkerError::Stat {
        name: name.clone(),
        source,
    })?;

    let size = metadata.len();
    if size == 0 {
        return Err(MarkerError::Empty { name });
    }
    if size > MAX_MARKER_SIZE_BYTES {
        return Err(MarkerError::TooLarge { name, size });
    }

    let file = File::open(path).map_err(|source| MarkerError::Unreadable {
        name: name.clone(),
        source,
    })?;
    let mut buffer = Vec::new();
    file.take(MARKER_SAMPLE_BYTES.min(size))
        .read_to_end(&mut buffer)
        .map_err(|source| MarkerError::Unreadable { name, source })?;
    Ok(())
}

/// Enumerates `<root>/<machine>/<set>` directories and gathers metadata for
/// each set. Sets whose walk fails keep their slot with zero metadata.
pub fn discover_backup_sets(
    root: &Path,
    options: &DiscoveryOptions,
) -> Result<Vec<BackupSetDescriptor>, ScanError> {
    let machines = sorted_subdirectories(root).map_err(|source| ScanError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut sets = Vec::new();
    for machine_dir in machines {
        let candidates = sorted_subdirectories(&machine_dir).map_err(|source| {
            ScanError::MachineDirUnreadable {
                path: machine_dir.clone(),
                source,
            }
        })?;

        for set_path in candidates {
            if !is_candidate_set_name(&set_path) {
                continue;
            }
            sets.push(describe_candidate(set_path, options));
        }
    }

    // Stable: equal timestamps keep discovery order; unknown times sort last.
    sets.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(sets)
}

/// Hidden directories and names carrying an extension are not backup sets.
fn is_candidate_set_name(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'));
    !hidden && path.extension().is_none()
}

/// A candidate whose walk fails keeps its slot with zero metadata.
fn describe_candidate(set_path: PathBuf, options: &DiscoveryOptions) -> BackupSetDescriptor {
    match gather_set_info(&set_path, options) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            debug!("metadata walk failed for {}: {}", set_path.display(), err);
            BackupSetDescriptor::unreadable(set_path)
        }
    }
}

/// Walks one set directory and records counts, sizes, newest modification
/// time and categorized file lists. Per-entry errors skip the entry.
pub fn gather_set_info(
    set_path: &Path,
    options: &DiscoveryOptions,
) -> Result<BackupSetDescriptor, walkdir::Error> {
    let mut descriptor = BackupSetDescriptor {
        path: set_path.to_path_buf(),
        ..BackupSetDescriptor::default()
    };

    for item in WalkDir::new(set_path).follow_links(false) {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err),
            Err(err) => {
                debug!("skipping unreadable entry under {}: {}", set_path.display(), err);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            if entry.depth() == 1
                && entry
                    .file_name()
                    .to_string_lossy()
                    .eq_ignore_ascii_case(CATALOG_DIR_NAME)
            {
                descriptor.has_catalog_dir = true;
            }
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!("metadata read failed for {}: {}", entry.path().display(), err);
                continue;
            }
        };

        descriptor.file_count += 1;
        descriptor.total_size_bytes = descriptor.total_size_bytes.saturating_add(metadata.len());
        if let Some(modified) = metadata.modified().ok().map(DateTime::<Utc>::from) {
            if descriptor.modified.map_or(true, |newest| modified > newest) {
                descriptor.modified = Some(modified);
            }
        }

        let extension = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();
        if extension == BACKUP_DATA_EXTENSION {
            descriptor.backup_files.push(entry.path().to_path_buf());
        } else if options.is_catalog_extension(&extension) {
            descriptor.catalog_files.push(entry.path().to_path_buf());
        }
    }

    descriptor.catalog_files.sort();
    descriptor.backup_files.sort();
    Ok(descriptor)
}

fn sorted_subdirectories(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect::<Vec<_>>();
    dirs.sort();
    Ok(dirs)
}
