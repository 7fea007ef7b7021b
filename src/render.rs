use crate::certificate::format_attributes;
use crate::types::{CertificateRecord, GeoRecord, ScanReport};
use std::fmt::Write;
use std::fs::File;
use std::path::Path;
use time::macros::format_description;
use time::OffsetDateTime;

const SERVICE_COL_MAX: usize = 60;

/// Human-readable report. Failed subsystems get an explicit error line; skipped
/// ones are left out.
pub fn render_text(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Target: {} ({})", report.target, report.address);
    render_ports(&mut out, report);

    match &report.certificate {
        Some(Ok(cert)) => render_certificate(&mut out, cert),
        Some(Err(e)) => {
            let _ = writeln!(out, "\nSSL Information Error: {e}");
        }
        None => {}
    }

    match &report.geo {
        Some(Ok(geo)) => render_geo(&mut out, geo),
        Some(Err(e)) => {
            let _ = writeln!(out, "\nGeolocation Error: {e}");
        }
        None => {}
    }
    out
}

pub fn write_report_json(path: &Path, report: &ScanReport) -> anyhow::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

fn render_ports(out: &mut String, report: &ScanReport) {
    let port_w = 5usize;
    let state_w = "filtered".len();
    let service_w = report
        .port_results
        .iter()
        .filter_map(|r| r.service_version.as_ref())
        .map(|v| v.len().min(SERVICE_COL_MAX))
        .fold("service".len(), usize::max);

    let _ = writeln!(
        out,
        "\nPorts: {} open of {} scanned",
        report.open_ports().count(),
        report.port_results.len()
    );
    let _ = writeln!(out, "{:>port_w$}  {:<state_w$}  {:<service_w$}", "port", "state", "service");
    let _ = writeln!(out, "{:-<port_w$}  {:-<state_w$}  {:-<service_w$}", "", "", "");
    for r in &report.port_results {
        let mut service = r.service_version.clone().unwrap_or_default();
        if service.len() > SERVICE_COL_MAX {
            let cut = (0..=SERVICE_COL_MAX).rev().find(|&i| service.is_char_boundary(i)).unwrap_or(0);
            service.truncate(cut);
        }
        let _ = writeln!(
            out,
            "{:>port_w$}  {:<state_w$}  {:<service_w$}",
            r.port,
            r.state.to_string(),
            service
        );
    }
}

fn render_certificate(out: &mut String, cert: &CertificateRecord) {
    let issuer = format_attributes(&cert.issuer);
    let subject = format_attributes(&cert.subject);
    let _ = writeln!(out, "\nSSL Certificate Information:");
    let _ = writeln!(out, "Hostname: {}", cert.hostname);
    let _ = writeln!(out, "Serial Number: {}", cert.serial_number);
    let _ = writeln!(out, "Not Before: {}", format_timestamp(cert.not_before));
    let _ = writeln!(out, "Not After: {}", format_timestamp(cert.not_after));
    let _ = writeln!(out, "Signature Algorithm: {}", cert.signature_algorithm);
    if issuer.is_empty() {
        let _ = writeln!(out, "Issuer: No issuer information available");
    } else {
        let _ = writeln!(out, "Issuer: {issuer}");
    }
    if subject.is_empty() {
        let _ = writeln!(out, "Subject: No subject information available");
    } else {
        let _ = writeln!(out, "Subject: {subject}");
    }
}

fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC"))
        .unwrap_or_else(|_| ts.to_string())
}

fn render_geo(out: &mut String, geo: &GeoRecord) {
    let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());
    let _ = writeln!(out, "\nGeolocation:");
    let _ = writeln!(out, "IP: {}", na(&geo.ip));
    let _ = writeln!(out, "Hostname: {}", na(&geo.hostname));
    let _ = writeln!(out, "City: {}", na(&geo.city));
    let _ = writeln!(out, "Region: {}", na(&geo.region));
    let _ = writeln!(out, "Country: {}", na(&geo.country));
    let _ = writeln!(out, "Postal: {}", na(&geo.postal));
    let _ = writeln!(out, "Location: {}", na(&geo.loc));
    let _ = writeln!(out, "Organization: {}", na(&geo.org));
    let _ = writeln!(out, "Timezone: {}", na(&geo.timezone));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortResult;
    use std::net::{IpAddr, Ipv4Addr};
    use time::macros::datetime;

    fn report() -> ScanReport {
        ScanReport {
            target: "example.com".into(),
            address: IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)),
            port_results: vec![
                PortResult::open(80, Some("ECS (dcb/7F84)".into())),
                PortResult::closed(9999),
            ],
            certificate: None,
            geo: None,
            started_at: datetime!(2026-01-01 0:00 UTC),
            finished_at: datetime!(2026-01-01 0:00:02 UTC),
        }
    }

    #[test]
    fn skipped_sections_are_omitted() {
        let text = render_text(&report());
        assert!(text.contains("Ports: 1 open of 2 scanned"));
        assert!(text.contains("ECS (dcb/7F84)"));
        assert!(!text.contains("SSL"));
        assert!(!text.contains("Geolocation"));
    }

    #[test]
    fn failures_get_error_lines() {
        let mut r = report();
        r.certificate = Some(Err("connection refused by 93.184.216.34:443".into()));
        r.geo = Some(Err("failed to fetch geolocation, status code: 429".into()));
        let text = render_text(&r);
        assert!(text.contains("SSL Information Error: connection refused"));
        assert!(text.contains("Geolocation Error: failed to fetch geolocation, status code: 429"));
    }

    #[test]
    fn geolocation_lists_every_field() {
        let mut r = report();
        r.geo = Some(Ok(GeoRecord {
            ip: Some("93.184.216.34".into()),
            hostname: Some("edge.example.net".into()),
            city: Some("Norwell".into()),
            postal: Some("02061".into()),
            timezone: Some("America/New_York".into()),
            ..GeoRecord::default()
        }));
        let text = render_text(&r);
        assert!(text.contains("Hostname: edge.example.net"));
        assert!(text.contains("Postal: 02061"));
        assert!(text.contains("Timezone: America/New_York"));
        assert!(text.contains("Region: N/A"));
    }

    #[test]
    fn certificate_attributes_are_joined() {
        let mut r = report();
        r.certificate = Some(Ok(CertificateRecord {
            hostname: "example.com".into(),
            serial_number: "1A2B3C".into(),
            not_before: datetime!(2020-01-01 0:00 UTC),
            not_after: datetime!(2030-01-01 0:00 UTC),
            signature_algorithm: "sha256WithRSAEncryption".into(),
            issuer: vec![("countryName".into(), "US".into())],
            subject: vec![],
        }));
        let text = render_text(&r);
        assert!(text.contains("Issuer: countryName: US"));
        assert!(text.contains("Not After: 2030-01-01 00:00:00 UTC"));
        assert!(text.contains("Subject: No subject information available"));
    }
}
