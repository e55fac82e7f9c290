//! Archive Decoder Module
//!
//! Turns one uploaded file into a lazy sequence of parsed reports. The
//! container format is chosen by filename suffix: `.gz`/`.gzip` streams
//! hold one report, `.zip` archives fan out to one report per member,
//! and anything else is parsed as raw XML. Decompression and parsing are
//! deferred until the sequence is advanced, and every step is bounded by
//! the configured [`Limits`].

use std::io::{Cursor, Read};

use flate2::read::GzDecoder;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::config::Limits;
use crate::error::{ReportError, Result};
use crate::models::Report;
use crate::parser::parse_report;

/// Container format implied by a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Xml,
    Gzip,
    Zip,
}

/// Suffix match is case-insensitive; unrecognized names fall through to
/// raw XML, where the parser gives the authoritative verdict.
fn detect_format(filename: &str) -> Format {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".gz") || lower.ends_with(".gzip") {
        Format::Gzip
    } else if lower.ends_with(".zip") {
        Format::Zip
    } else {
        Format::Xml
    }
}

/// Reads one uploaded file and returns a lazy iterator over the reports
/// inside it.
///
/// The stream is read up front so the iterator owns its input, but no
/// decompression or XML parsing happens until it is advanced.
///
/// # Errors
///
/// Returns [`ReportError::Io`] when the stream cannot be read and
/// [`ReportError::LimitExceeded`] when it is larger than
/// [`Limits::max_input_size`]. Decoding failures are reported through the
/// iterator items, not here.
pub fn decode_reports<R: Read>(input: R, filename: &str, limits: &Limits) -> Result<ReportIter> {
    let mut bytes = Vec::new();
    input
        .take(limits.max_input_size as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| ReportError::Io {
            file: filename.to_string(),
            source: e,
        })?;
    if bytes.len() > limits.max_input_size {
        return Err(ReportError::limit_exceeded(
            filename,
            format!("input exceeds {} bytes", limits.max_input_size),
        ));
    }
    Ok(ReportIter::from_bytes(bytes, filename, limits))
}

/// Lazy iterator over the reports contained in one uploaded file.
///
/// Each item is one parse attempt. For zip archives a failed member yields
/// `Err` at its position and iteration continues with the next member;
/// structural failures (bad gzip data, an unreadable archive) yield one
/// `Err` and end the sequence. Once exhausted the iterator stays exhausted.
#[derive(Debug)]
pub struct ReportIter {
    filename: String,
    limits: Limits,
    state: State,
}

#[derive(Debug)]
enum State {
    /// Input owned but not yet examined.
    Pending(Vec<u8>),
    /// Open archive, next member to visit.
    Zip {
        archive: ZipArchive<Cursor<Vec<u8>>>,
        index: usize,
    },
    Done,
}

/// What happened to one archive member.
enum MemberOutcome {
    /// Not a report carrier (a directory); move on silently.
    Skip,
    /// The archive itself can no longer be trusted; end the sequence.
    Fatal(ReportError),
    /// One item to yield, successful or not.
    Item(Result<Report>),
}

impl ReportIter {
    /// Builds the iterator over an in-memory upload. `filename` decides
    /// the container format and is recorded as provenance for raw and
    /// gzip inputs; zip members carry their own names.
    pub fn from_bytes(bytes: Vec<u8>, filename: &str, limits: &Limits) -> Self {
        ReportIter {
            filename: filename.to_string(),
            limits: limits.clone(),
            state: State::Pending(bytes),
        }
    }

    fn open_zip(&self, bytes: Vec<u8>) -> Result<ZipArchive<Cursor<Vec<u8>>>> {
        let archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| ReportError::CorruptZip {
                file: self.filename.clone(),
                source: e,
            })?;
        if archive.is_empty() {
            return Err(ReportError::CorruptZip {
                file: self.filename.clone(),
                source: ZipError::InvalidArchive("archive contains no members"),
            });
        }
        if archive.len() > self.limits.max_archive_members {
            return Err(ReportError::limit_exceeded(
                &self.filename,
                format!(
                    "{} members exceeds limit of {}",
                    archive.len(),
                    self.limits.max_archive_members
                ),
            ));
        }
        Ok(archive)
    }
}

impl Iterator for ReportIter {
    type Item = Result<Report>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Pending(bytes) => {
                    let format = detect_format(&self.filename);
                    log::debug!("decoding {} as {:?}", self.filename, format);
                    match format {
                        Format::Xml => return Some(parse_report(&bytes, &self.filename)),
                        Format::Gzip => {
                            let item = decompress_gzip(&bytes, &self.filename, &self.limits)
                                .and_then(|xml| parse_report(&xml, &self.filename));
                            return Some(item);
                        }
                        Format::Zip => match self.open_zip(bytes) {
                            Ok(archive) => {
                                self.state = State::Zip { archive, index: 0 };
                            }
                            Err(e) => return Some(Err(e)),
                        },
                    }
                }
                State::Zip {
                    mut archive,
                    mut index,
                } => {
                    while index < archive.len() {
                        let current = index;
                        index += 1;
                        match read_member(&mut archive, current, &self.limits, &self.filename) {
                            MemberOutcome::Skip => continue,
                            MemberOutcome::Fatal(err) => return Some(Err(err)),
                            MemberOutcome::Item(item) => {
                                self.state = State::Zip { archive, index };
                                return Some(item);
                            }
                        }
                    }
                    return None;
                }
                State::Done => return None,
            }
        }
    }
}

fn decompress_gzip(bytes: &[u8], filename: &str, limits: &Limits) -> Result<Vec<u8>> {
    let mut xml = Vec::new();
    GzDecoder::new(bytes)
        .take(limits.max_decompressed_size as u64 + 1)
        .read_to_end(&mut xml)
        .map_err(|e| ReportError::CorruptGzip {
            file: filename.to_string(),
            source: e,
        })?;
    if xml.len() > limits.max_decompressed_size {
        return Err(ReportError::limit_exceeded(
            filename,
            format!(
                "decompressed size exceeds {} bytes",
                limits.max_decompressed_size
            ),
        ));
    }
    Ok(xml)
}

/// Visits one archive member. Limit violations and parse failures are
/// per-member items so the remaining members still get their chance;
/// only read errors condemn the whole archive.
fn read_member(
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    index: usize,
    limits: &Limits,
    archive_name: &str,
) -> MemberOutcome {
    let member = match archive.by_index(index) {
        Ok(m) => m,
        Err(e) => {
            return MemberOutcome::Fatal(ReportError::CorruptZip {
                file: archive_name.to_string(),
                source: e,
            })
        }
    };
    if member.is_dir() {
        log::debug!("skipping directory entry in {archive_name}");
        return MemberOutcome::Skip;
    }

    let name = member.name().to_string();
    if name.len() > limits.max_member_name_len {
        return MemberOutcome::Item(Err(ReportError::limit_exceeded(
            archive_name,
            format!(
                "member name length {} exceeds {}",
                name.len(),
                limits.max_member_name_len
            ),
        )));
    }

    let compressed = member.compressed_size();
    let declared = member.size();
    if compressed > 0 {
        let ratio = declared as f64 / compressed as f64;
        if ratio > limits.max_compression_ratio {
            return MemberOutcome::Item(Err(ReportError::limit_exceeded(
                &name,
                format!(
                    "compression ratio {ratio:.2} exceeds {:.2}",
                    limits.max_compression_ratio
                ),
            )));
        }
    }
    if declared > limits.max_decompressed_size as u64 {
        return MemberOutcome::Item(Err(ReportError::limit_exceeded(
            &name,
            format!(
                "declared size {declared} exceeds {} bytes",
                limits.max_decompressed_size
            ),
        )));
    }

    let mut xml = Vec::new();
    if let Err(e) = member
        .take(limits.max_decompressed_size as u64 + 1)
        .read_to_end(&mut xml)
    {
        return MemberOutcome::Fatal(ReportError::CorruptZip {
            file: archive_name.to_string(),
            source: ZipError::Io(e),
        });
    }
    if xml.len() > limits.max_decompressed_size {
        return MemberOutcome::Item(Err(ReportError::limit_exceeded(
            &name,
            format!(
                "decompressed size exceeds {} bytes",
                limits.max_decompressed_size
            ),
        )));
    }

    MemberOutcome::Item(parse_report(&xml, &name))
}
