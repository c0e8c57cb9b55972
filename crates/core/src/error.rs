use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a root from being scanned at all.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read backup root {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read machine directory {path}: {source}")]
    MachineDirUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reasons a root marker file is rejected.
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("cannot stat {name}: {source}")]
    Stat {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("{name} is empty")]
    Empty { name: String },

    #[error("{name} is unusually large ({size} bytes)")]
    TooLarge { name: String, size: u64 },

    #[error("cannot read {name}: {source}")]
    Unreadable {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Reasons a backup-data or catalog file failed content sampling.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("cannot open archive: {0}")]
    ArchiveOpen(#[from] zip::result::ZipError),

    #[error("archive is empty")]
    EmptyArchive,

    #[error("cannot open entry {index} in archive: {source}")]
    EntryOpen {
        index: usize,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot read entry {name} in archive: {source}")]
    EntryRead {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("archive contains only empty file")]
    SingleEmptyEntry,

    #[error("cannot open file: {0}")]
    FileOpen(#[source] io::Error),

    #[error("catalog file is empty")]
    EmptyCatalog,

    #[error("cannot read catalog file: {0}")]
    CatalogRead(#[source] io::Error),
}
