//! End-to-end decoding tests: files on disk and in-memory archives through
//! every container format the ingester accepts.

use std::fs::File;
use std::io::{Cursor, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use zip::write::SimpleFileOptions;

use dmarc_ingest::summary::{render_text, summarize, SummaryFilter};
use dmarc_ingest::{decode_reports, ErrorKind, Limits, Report};

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feedback>
  <report_metadata>
    <org_name>google.com</org_name>
    <email>noreply-dmarc-support@google.com</email>
    <extra_contact_info>https://support.google.com/a/answer/2466580</extra_contact_info>
    <report_id>8293631894893125362</report_id>
    <date_range>
      <begin>1700000000</begin>
      <end>1700003600</end>
    </date_range>
  </report_metadata>
  <policy_published>
    <domain>example.com</domain>
    <adkim>r</adkim>
    <aspf>r</aspf>
    <p>reject</p>
    <sp>reject</sp>
    <pct>100</pct>
  </policy_published>
  <record>
    <row>
      <source_ip>209.85.220.41</source_ip>
      <count>5</count>
      <policy_evaluated>
        <disposition>none</disposition>
        <dkim>pass</dkim>
        <spf>pass</spf>
      </policy_evaluated>
    </row>
    <identifiers>
      <header_from>example.com</header_from>
    </identifiers>
    <auth_results>
      <dkim>
        <domain>example.com</domain>
        <result>pass</result>
      </dkim>
      <spf>
        <domain>example.com</domain>
        <result>pass</result>
      </spf>
    </auth_results>
  </record>
  <record>
    <row>
      <source_ip>192.0.2.77</source_ip>
      <count>2</count>
      <policy_evaluated>
        <disposition>quarantine</disposition>
        <dkim>fail</dkim>
        <spf>fail</spf>
      </policy_evaluated>
    </row>
    <identifiers>
      <header_from>example.com</header_from>
      <envelope_from>spoof.example.net</envelope_from>
    </identifiers>
  </record>
</feedback>
"#;

fn report_for(id: &str, domain: &str, disposition: &str, count: u32) -> String {
    format!(
        "<feedback><report_metadata><report_id>{id}</report_id><date_range>\
         <begin>1700000000</begin><end>1700003600</end></date_range>\
         </report_metadata><policy_published><domain>{domain}</domain>\
         </policy_published><record><row><source_ip>198.51.100.10</source_ip>\
         <count>{count}</count><policy_evaluated>\
         <disposition>{disposition}</disposition></policy_evaluated></row>\
         </record></feedback>"
    )
}

fn zip_of(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, data) in members {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn gzip_file_on_disk_decodes_to_one_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir
        .path()
        .join("google.com!example.com!1700000000!1700003600.xml.gz");
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    encoder.write_all(SAMPLE.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let name = path.file_name().unwrap().to_string_lossy().to_string();
    let file = File::open(&path).unwrap();
    let reports = decode_reports(file, &name, &Limits::default())
        .unwrap()
        .collect::<Result<Vec<Report>, _>>()
        .unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.report_id, "8293631894893125362");
    assert_eq!(report.org_name.as_deref(), Some("google.com"));
    assert_eq!(
        report.email.as_deref(),
        Some("noreply-dmarc-support@google.com")
    );
    assert_eq!(report.domain, "example.com");
    assert_eq!(report.p.as_deref(), Some("reject"));
    assert_eq!(report.sp.as_deref(), Some("reject"));
    assert_eq!(report.pct, 100);
    assert_eq!(report.filename, name);
    assert_eq!(
        report.date_range_start.to_rfc3339(),
        "2023-11-14T22:13:20+00:00"
    );
    assert_eq!(
        report.date_range_end.to_rfc3339(),
        "2023-11-14T23:13:20+00:00"
    );

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].source_ip, "209.85.220.41");
    assert_eq!(report.records[0].count, 5);
    assert_eq!(report.records[0].identity(), "example.com");
    assert_eq!(report.records[0].alignment_status(), "dkim:pass / spf:pass");
    assert_eq!(report.records[1].source_ip, "192.0.2.77");
    assert_eq!(report.records[1].disposition.as_deref(), Some("quarantine"));
    assert_eq!(
        report.records[1].envelope_from.as_deref(),
        Some("spoof.example.net")
    );
    assert_eq!(report.records[1].auth_dkim_domain, None);
}

#[test]
fn raw_xml_file_on_disk_decodes_directly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xml");
    std::fs::write(&path, SAMPLE).unwrap();

    let file = File::open(&path).unwrap();
    let mut iter = decode_reports(file, "report.xml", &Limits::default()).unwrap();
    let report = iter.next().unwrap().unwrap();
    assert_eq!(report.filename, "report.xml");
    assert_eq!(report.records.len(), 2);
    assert!(iter.next().is_none());
}

#[test]
fn zip_upload_surfaces_member_failures_in_place() {
    let january = report_for("jan", "example.com", "none", 4);
    let recordless = "<feedback><report_metadata><date_range>\
                      <begin>1700000000</begin><end>1700003600</end>\
                      </date_range></report_metadata></feedback>";
    let april = report_for("apr", "example.com", "reject", 1);
    let zipped = zip_of(&[
        ("january.xml", january.as_bytes()),
        ("february.xml", b"<feedback><broken>".as_slice()),
        ("march.xml", recordless.as_bytes()),
        ("april.xml", april.as_bytes()),
    ]);

    let outcomes: Vec<_> = decode_reports(Cursor::new(zipped), "bundle.zip", &Limits::default())
        .unwrap()
        .collect();
    assert_eq!(outcomes.len(), 4);

    assert_eq!(outcomes[0].as_ref().unwrap().report_id, "jan");
    assert_eq!(outcomes[0].as_ref().unwrap().filename, "january.xml");

    let err = outcomes[1].as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnparseableXml);
    assert_eq!(err.file(), "february.xml");

    let err = outcomes[2].as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyReport);
    assert_eq!(err.file(), "march.xml");

    assert_eq!(outcomes[3].as_ref().unwrap().report_id, "apr");
}

#[test]
fn decoded_batch_feeds_the_summary() {
    let zipped = zip_of(&[
        (
            "a.xml",
            report_for("a", "example.com", "none", 5).as_bytes(),
        ),
        (
            "b.xml",
            report_for("b", "example.com", "none", 3).as_bytes(),
        ),
        (
            "c.xml",
            report_for("c", "other.org", "reject", 11).as_bytes(),
        ),
    ]);

    let reports = decode_reports(Cursor::new(zipped), "batch.zip", &Limits::default())
        .unwrap()
        .collect::<Result<Vec<Report>, _>>()
        .unwrap();

    let filter = SummaryFilter {
        domain: Some("example.com".to_string()),
        since: None,
    };
    let summary = summarize(&reports, &filter);
    assert_eq!(summary.report_count, 2);
    assert_eq!(summary.disposition_totals, vec![("none".to_string(), 8)]);

    let text = render_text(&summary, &filter);
    assert!(text.contains("Domain filter: example.com"));
    assert!(text.contains("- none: 8"));
}
