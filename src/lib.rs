//! DMARC Ingest Library
//!
//! Core functionality for ingesting DMARC aggregate reports: resource
//! limits, error handling, data models, archive decoding, XML parsing,
//! and windowed summaries. One uploaded file (raw XML, gzip, or zip) is
//! decoded into a lazy sequence of normalized reports.

pub mod config;
pub mod decoder;
pub mod error;
pub mod models;
pub mod parser;
pub mod summary;
pub mod xml;

pub use config::Limits;
pub use decoder::{decode_reports, ReportIter};
pub use error::{ErrorKind, ReportError, Result};
pub use models::{Report, ReportRecord};
pub use parser::parse_report;
