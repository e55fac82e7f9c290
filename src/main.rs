//! dmarc-ingest - DMARC Aggregate Report Ingester
//!
//! Decodes DMARC aggregate reports from raw XML, gzip, or ZIP uploads and
//! normalizes them into reports with per-source traffic records. Decoding
//! failures inside an archive are reported per member, so one bad file
//! does not discard the rest of the batch.
//!
//! Results are printed as a table, CSV, JSON, or a windowed summary.

use std::collections::HashSet;
use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, ValueEnum};
use colored::*;
use prettytable::{row, Cell, Row, Table};
use serde::Serialize;

use dmarc_ingest::summary::{render_text, summarize, SummaryFilter};
use dmarc_ingest::{decode_reports, Limits, Report};

/// CLI arguments for dmarc-ingest.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "DMARC aggregate report ingester",
    long_about = "dmarc-ingest decodes DMARC aggregate reports from raw XML, gzip, or ZIP \
                  uploads and normalizes them into reports with per-source traffic records.",
    override_usage = "dmarc-ingest <FILE> [OPTIONS]"
)]
struct Cli {
    /// Path to a DMARC report file (.xml, .gz, .gzip, or .zip)
    file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Restrict the summary to reports for this domain
    #[arg(long)]
    domain: Option<String>,

    /// Restrict the summary to reports starting within the last N days
    #[arg(long, value_name = "N")]
    days_back: Option<i64>,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
    Summary,
}

/// One record flattened with its report context, in the column order the
/// CSV export has always used.
#[derive(Serialize)]
struct CsvRow<'a> {
    report_id: &'a str,
    org: &'a str,
    domain: &'a str,
    source_ip: &'a str,
    count: u32,
    disposition: &'a str,
    dkim: &'a str,
    spf: &'a str,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity.
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    // CSV and JSON go to stdout unadorned so they stay pipeable.
    if matches!(cli.output, OutputFormat::Table | OutputFormat::Summary) {
        println!(
            "{}\n{}\n",
            "dmarc-ingest - DMARC Aggregate Report Ingester".bold().green(),
            "Decoding & normalizing DMARC data".dimmed()
        );
    }

    log::info!("Processing file: {}", cli.file.display());
    let limits = Limits::from_env().context("Failed to load limits")?;

    let file_name = cli
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let file =
        File::open(&cli.file).with_context(|| format!("Failed to open {}", cli.file.display()))?;

    let mut loaded: Vec<Report> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut failures = 0usize;

    for item in decode_reports(file, &file_name, &limits).context("Failed to read file")? {
        match item {
            Ok(report) => {
                if !seen.insert(report.report_id.clone()) {
                    log::info!("Skipping duplicate report {}", report.report_id);
                    continue;
                }
                loaded.push(report);
            }
            Err(e) => {
                failures += 1;
                log::error!("{e}");
            }
        }
    }

    match cli.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&loaded)?);
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for report in &loaded {
                for record in &report.records {
                    wtr.serialize(CsvRow {
                        report_id: &report.report_id,
                        org: report.org_name.as_deref().unwrap_or(""),
                        domain: &report.domain,
                        source_ip: &record.source_ip,
                        count: record.count,
                        disposition: record.disposition.as_deref().unwrap_or(""),
                        dkim: record.dkim_aligned.as_deref().unwrap_or(""),
                        spf: record.spf_aligned.as_deref().unwrap_or(""),
                    })?;
                }
            }
            wtr.flush()?;
        }
        OutputFormat::Table => {
            for report in &loaded {
                print_report(report);
            }
            if loaded.is_empty() {
                println!("{}", "No reports loaded.".yellow());
            }
        }
        OutputFormat::Summary => {
            let filter = SummaryFilter {
                domain: cli.domain.clone(),
                since: cli.days_back.map(|days| Utc::now() - Duration::days(days)),
            };
            print!("{}", render_text(&summarize(&loaded, &filter), &filter));
        }
    }

    log::info!("Loaded {} report(s), {} failure(s)", loaded.len(), failures);
    if loaded.is_empty() && failures > 0 {
        anyhow::bail!("no reports could be decoded from {}", cli.file.display());
    }
    Ok(())
}

/// Prints one report's metadata block and its records as a table.
fn print_report(report: &Report) {
    println!("{}", "DMARC Report".bold().blue());
    println!("{}", "----------------------------".dimmed());
    println!("{}: {}", "Report ID".bold(), report.report_id);
    if let Some(org) = &report.org_name {
        println!("{}: {}", "Organization".bold(), org);
    }
    println!("{}: {}", "Domain".bold(), report.domain);
    println!(
        "{}: {} - {}",
        "Date Range".bold(),
        report.date_range_start.to_rfc3339(),
        report.date_range_end.to_rfc3339()
    );
    if let Some(policy) = &report.p {
        println!("{}: {}", "Policy".bold(), policy);
    }
    println!("{}: {}\n", "Percentage Applied".bold(), report.pct);

    let mut table = Table::new();
    table.add_row(row!["Source IP", "Count", "Identity", "Disposition", "Alignment"]);
    for record in &report.records {
        table.add_row(Row::new(vec![
            Cell::new(&record.source_ip),
            Cell::new(&record.count.to_string()),
            Cell::new(record.identity()),
            Cell::new(record.disposition.as_deref().unwrap_or("-")),
            Cell::new(&record.alignment_status()),
        ]));
    }
    table.printstd();
    println!();
}
