//! Error Handling Module
//!
//! This module defines the error type for the decoding pipeline using the
//! `thiserror` crate. Every variant carries the originating filename or
//! archive member name so callers can report which document failed.

use std::io;

use thiserror::Error;

/// Coarse classification of a [`ReportError`], for tests and structured
/// reporting. Several variants map to the same kind (both corrupt-gzip and
/// corrupt-zip are `CorruptArchive`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnparseableXml,
    InvalidDateRange,
    EmptyReport,
    CorruptArchive,
    LimitExceeded,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::UnparseableXml => "unparseable-xml",
            ErrorKind::InvalidDateRange => "invalid-date-range",
            ErrorKind::EmptyReport => "empty-report",
            ErrorKind::CorruptArchive => "corrupt-archive",
            ErrorKind::LimitExceeded => "limit-exceeded",
            ErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

/// Failure to decode one document or one archive of documents.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("could not parse XML in {file}: {reason}")]
    UnparseableXml { file: String, reason: String },

    #[error("report {file} does not contain a valid date range")]
    InvalidDateRange { file: String },

    #[error("report {file} does not contain any traffic records")]
    EmptyReport { file: String },

    #[error("corrupt or invalid gzip data in {file}")]
    CorruptGzip {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("corrupt or empty zip archive {file}")]
    CorruptZip {
        file: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{file} exceeds a configured limit: {reason}")]
    LimitExceeded { file: String, reason: String },

    #[error("failed to read {file}")]
    Io {
        file: String,
        #[source]
        source: io::Error,
    },
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        use ReportError::*;
        match self {
            UnparseableXml { .. } => ErrorKind::UnparseableXml,
            InvalidDateRange { .. } => ErrorKind::InvalidDateRange,
            EmptyReport { .. } => ErrorKind::EmptyReport,
            CorruptGzip { .. } | CorruptZip { .. } => ErrorKind::CorruptArchive,
            LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Io { .. } => ErrorKind::Io,
        }
    }

    /// The filename or archive member name the failure refers to.
    pub fn file(&self) -> &str {
        use ReportError::*;
        match self {
            UnparseableXml { file, .. }
            | InvalidDateRange { file }
            | EmptyReport { file }
            | CorruptGzip { file, .. }
            | CorruptZip { file, .. }
            | LimitExceeded { file, .. }
            | Io { file, .. } => file,
        }
    }

    pub fn unparseable(file: impl Into<String>, reason: impl ToString) -> Self {
        Self::UnparseableXml {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_date_range(file: impl Into<String>) -> Self {
        Self::InvalidDateRange { file: file.into() }
    }

    pub fn empty_report(file: impl Into<String>) -> Self {
        Self::EmptyReport { file: file.into() }
    }

    pub fn limit_exceeded(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LimitExceeded {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
