use crate::types::{CertificateRecord, Fallible, GeoRecord, PortResult, ScanReport};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use time::OffsetDateTime;

/// Everything the orchestrator collected, ready to be frozen into a report.
#[derive(Debug, Clone)]
pub struct Collected {
    pub target: String,
    pub address: IpAddr,
    pub requested_ports: BTreeSet<u16>,
    pub port_results: Vec<PortResult>,
    pub certificate: Option<Fallible<CertificateRecord>>,
    pub geo: Option<Fallible<GeoRecord>>,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
}

/// Build the final report. Pure and infallible.
///
/// Every requested port appears exactly once, ascending: results for ports that
/// were not requested are dropped, the first result wins on duplicates, and a
/// requested port without a result is recorded as closed.
pub fn assemble(collected: Collected) -> ScanReport {
    let mut by_port: BTreeMap<u16, PortResult> = BTreeMap::new();
    for result in collected.port_results {
        if collected.requested_ports.contains(&result.port) {
            by_port.entry(result.port).or_insert(result);
        }
    }
    let port_results = collected
        .requested_ports
        .iter()
        .map(|&port| by_port.remove(&port).unwrap_or_else(|| PortResult::closed(port)))
        .collect();

    ScanReport {
        target: collected.target,
        address: collected.address,
        port_results,
        certificate: collected.certificate,
        geo: collected.geo,
        started_at: collected.started_at,
        finished_at: collected.finished_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortState;
    use std::net::Ipv4Addr;

    fn collected(requested: &[u16], results: Vec<PortResult>) -> Collected {
        let now = OffsetDateTime::now_utc();
        Collected {
            target: "example.com".into(),
            address: IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)),
            requested_ports: requested.iter().copied().collect(),
            port_results: results,
            certificate: None,
            geo: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn sorts_regardless_of_completion_order() {
        let report = assemble(collected(
            &[443, 22, 80],
            vec![PortResult::closed(443), PortResult::open(22, None), PortResult::filtered(80)],
        ));
        let ports: Vec<u16> = report.port_results.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![22, 80, 443]);
    }

    #[test]
    fn fills_missing_and_drops_extras_and_duplicates() {
        let report = assemble(collected(
            &[80, 443],
            vec![
                PortResult::open(80, Some("nginx".into())),
                PortResult::closed(80),
                PortResult::open(8080, None),
            ],
        ));
        assert_eq!(
            report.port_results,
            vec![PortResult::open(80, Some("nginx".into())), PortResult::closed(443)]
        );
        assert_eq!(report.port_results[1].state, PortState::Closed);
    }

    #[test]
    fn optional_sections_pass_through() {
        let mut c = collected(&[80], vec![]);
        c.certificate = Some(Err("TLS handshake error: boom".into()));
        let report = assemble(c);
        assert!(matches!(report.certificate, Some(Err(ref e)) if e.contains("boom")));
        assert!(report.geo.is_none());
    }
}
