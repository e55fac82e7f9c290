//! Summary Module
//!
//! Windowed aggregation over parsed reports: filters a batch down to a
//! domain and time window, totals message counts per disposition, and
//! renders the result as plain text for digest-style output.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::Report;

/// Narrowing applied before aggregation.
#[derive(Debug, Default, Clone)]
pub struct SummaryFilter {
    /// Keep only reports published for this exact domain.
    pub domain: Option<String>,
    /// Keep only reports whose range starts at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl SummaryFilter {
    pub fn matches(&self, report: &Report) -> bool {
        if let Some(domain) = &self.domain {
            if &report.domain != domain {
                return false;
            }
        }
        if let Some(since) = self.since {
            if report.date_range_start < since {
                return false;
            }
        }
        true
    }
}

/// Aggregated view of the reports that passed a [`SummaryFilter`].
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Number of reports that matched the filter.
    pub report_count: usize,
    /// Message totals per disposition, largest first. Ties are broken by
    /// disposition name so the order is stable.
    pub disposition_totals: Vec<(String, u64)>,
}

/// Totals message counts per disposition across the matching reports.
pub fn summarize<'a, I>(reports: I, filter: &SummaryFilter) -> Summary
where
    I: IntoIterator<Item = &'a Report>,
{
    let mut report_count = 0;
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    for report in reports.into_iter().filter(|r| filter.matches(r)) {
        report_count += 1;
        for (disposition, count) in report.summary_counts() {
            *totals.entry(disposition).or_insert(0) += count;
        }
    }

    let mut disposition_totals: Vec<(String, u64)> = totals.into_iter().collect();
    disposition_totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Summary {
        report_count,
        disposition_totals,
    }
}

/// Renders a summary as the body of a digest message.
pub fn render_text(summary: &Summary, filter: &SummaryFilter) -> String {
    let mut out = String::from("DMARC summary\n");

    match &filter.domain {
        Some(domain) => {
            let _ = writeln!(out, "Domain filter: {domain}");
        }
        None => out.push_str("Domain filter: all\n"),
    }
    match filter.since {
        Some(since) => {
            let _ = writeln!(out, "Window: since {}", since.to_rfc3339());
        }
        None => out.push_str("Window: all reports\n"),
    }
    let _ = writeln!(out, "Total reports: {}", summary.report_count);
    out.push('\n');

    out.push_str("Totals by disposition:\n");
    if summary.disposition_totals.is_empty() {
        out.push_str("No records in the selected window.\n");
    } else {
        for (disposition, total) in &summary.disposition_totals {
            let _ = writeln!(out, "- {disposition}: {total}");
        }
    }

    out
}
