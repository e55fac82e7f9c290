//! Report Parser Module
//!
//! Converts one XML document into a normalized [`Report`] plus its traffic
//! records. Validation is front-loaded onto the two things downstream
//! consumers cannot function without: a valid date range and at least one
//! surviving record. Everything else degrades to a default or sentinel,
//! because provider schemas vary and over-strict validation would reject
//! otherwise-usable reports.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{ReportError, Result};
use crate::models::{Report, ReportRecord, UNKNOWN_DOMAIN};
use crate::xml::{self, Element};

/// Parses one XML document into a [`Report`].
///
/// `source_name` is the originating file or archive member name. It is
/// recorded for provenance, used in every error, and doubles as the report
/// id when the document metadata does not carry one.
///
/// # Errors
///
/// Returns [`ReportError::UnparseableXml`] for malformed documents,
/// [`ReportError::InvalidDateRange`] when `report_metadata/date_range`
/// begin or end is missing or not an epoch-seconds integer, and
/// [`ReportError::EmptyReport`] when no record survives extraction.
pub fn parse_report(xml_bytes: &[u8], source_name: &str) -> Result<Report> {
    let root = xml::parse(xml_bytes).map_err(|e| ReportError::unparseable(source_name, e))?;

    // Absent subtrees are treated as empty elements, so every lookup
    // inside them degrades to absence rather than an error.
    let metadata = root.find("report_metadata").unwrap_or(Element::EMPTY);
    let policy = root.find("policy_published").unwrap_or(Element::EMPTY);

    let start = epoch_seconds(metadata.find_text("date_range/begin"));
    let end = epoch_seconds(metadata.find_text("date_range/end"));
    let (Some(date_range_start), Some(date_range_end)) = (start, end) else {
        return Err(ReportError::invalid_date_range(source_name));
    };

    let records: Vec<ReportRecord> = root
        .children_named("record")
        .filter_map(record_from_element)
        .collect();
    if records.is_empty() {
        return Err(ReportError::empty_report(source_name));
    }

    Ok(Report {
        report_id: metadata
            .find_text("report_id")
            .unwrap_or(source_name)
            .to_string(),
        org_name: optional(metadata, "org_name"),
        email: optional(metadata, "email"),
        extra_contact_info: optional(metadata, "extra_contact_info"),
        date_range_start,
        date_range_end,
        domain: policy
            .find_text("domain")
            .unwrap_or(UNKNOWN_DOMAIN)
            .to_string(),
        adkim: optional(policy, "adkim"),
        aspf: optional(policy, "aspf"),
        p: optional(policy, "p"),
        sp: optional(policy, "sp"),
        pct: parse_or_default(policy.find_text("pct"), 0),
        filename: source_name.to_string(),
        records,
    })
}

/// Builds one traffic record, or `None` when the record carries no usable
/// source IP. Skipped records are not an error and do not affect their
/// siblings.
fn record_from_element(record: &Element) -> Option<ReportRecord> {
    let Some(source_ip) = record.find_text("row/source_ip") else {
        log::debug!("skipping record without a source IP");
        return None;
    };

    Some(ReportRecord {
        source_ip: source_ip.to_string(),
        count: parse_or_default(record.find_text("row/count"), 0),
        disposition: optional(record, "row/policy_evaluated/disposition"),
        dkim_aligned: optional(record, "row/policy_evaluated/dkim"),
        spf_aligned: optional(record, "row/policy_evaluated/spf"),
        header_from: optional(record, "identifiers/header_from"),
        envelope_from: optional(record, "identifiers/envelope_from"),
        auth_dkim_domain: optional(record, "auth_results/dkim/domain"),
        auth_spf_domain: optional(record, "auth_results/spf/domain"),
    })
}

fn optional(element: &Element, path: &str) -> Option<String> {
    element.find_text(path).map(str::to_string)
}

/// Parsed integer from optional text, or `default` on absence or any parse
/// failure.
fn parse_or_default<T: FromStr>(text: Option<&str>, default: T) -> T {
    text.and_then(|t| t.parse().ok()).unwrap_or(default)
}

/// Optional text interpreted as a base-10 count of seconds since the Unix
/// epoch. Absent, non-integer, or out-of-range text yields `None`.
fn epoch_seconds(text: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(text?.parse().ok()?, 0)
}
