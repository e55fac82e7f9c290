//! Data Models Module
//!
//! This module defines the normalized representation of a parsed DMARC
//! aggregate report: one [`Report`] per XML document, owning zero or more
//! [`ReportRecord`]s describing per-sender-IP authentication outcomes.
//! Both are plain value structures; persistence identity (keys, cascades)
//! belongs to whatever storage layer consumes them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for a missing `policy_published/domain`.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Placeholder identity for a record with neither header-from nor
/// envelope-from.
pub const UNKNOWN_IDENTITY: &str = "Unknown";

/// One parsed aggregate report. Immutable once the pipeline yields it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Report {
    /// Identifier from the document metadata, falling back to the source
    /// filename. The natural deduplication key for consumers.
    pub report_id: String,
    pub org_name: Option<String>,
    pub email: Option<String>,
    pub extra_contact_info: Option<String>,
    pub date_range_start: DateTime<Utc>,
    pub date_range_end: DateTime<Utc>,
    /// Policy-published domain, or [`UNKNOWN_DOMAIN`] when absent.
    pub domain: String,
    pub adkim: Option<String>,
    pub aspf: Option<String>,
    pub p: Option<String>,
    pub sp: Option<String>,
    pub pct: u8,
    /// Originating file or archive member name, for traceability.
    pub filename: String,
    /// Traffic records in document order. Never empty: construction fails
    /// when no record survives extraction.
    pub records: Vec<ReportRecord>,
}

impl Report {
    /// Totals of `count` grouped by disposition. Records without a
    /// disposition are keyed `"unknown"`.
    pub fn summary_counts(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            let disposition = record.disposition.as_deref().unwrap_or("unknown");
            *counts.entry(disposition.to_string()).or_insert(0) += u64::from(record.count);
        }
        counts
    }
}

/// One `<record>` element of a report: the traffic observed from a single
/// source IP and how it evaluated against the published policy.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportRecord {
    pub source_ip: String,
    pub count: u32,
    pub disposition: Option<String>,
    pub dkim_aligned: Option<String>,
    pub spf_aligned: Option<String>,
    pub header_from: Option<String>,
    pub envelope_from: Option<String>,
    pub auth_dkim_domain: Option<String>,
    pub auth_spf_domain: Option<String>,
}

impl ReportRecord {
    /// The sending identity: header-from, else envelope-from, else
    /// [`UNKNOWN_IDENTITY`].
    pub fn identity(&self) -> &str {
        self.header_from
            .as_deref()
            .or(self.envelope_from.as_deref())
            .unwrap_or(UNKNOWN_IDENTITY)
    }

    /// Alignment verdicts formatted as `dkim:<v> / spf:<v>`, with `?` for
    /// a missing verdict.
    pub fn alignment_status(&self) -> String {
        format!(
            "dkim:{} / spf:{}",
            self.dkim_aligned.as_deref().unwrap_or("?"),
            self.spf_aligned.as_deref().unwrap_or("?")
        )
    }
}
