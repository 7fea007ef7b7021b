use crate::error::ResolutionError;
use crate::geo::{self, GeoConfig};
use crate::ports;
use crate::report::{self, Collected};
use crate::resolve;
use crate::service::{self, ServiceProbeOptions};
use crate::tls;
use crate::types::{CertificateRecord, Fallible, GeoRecord, PortResult, ScanReport};
use std::collections::BTreeSet;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

const MAX_CONCURRENCY: usize = 5_000;

/// Parameters of one scan invocation.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub target: String,
    pub ports: BTreeSet<u16>,
    /// Bound for each connect and the TLS handshake.
    pub timeout: Duration,
    pub banner_timeout: Duration,
    /// Max port probes in flight.
    pub concurrency: usize,
    /// Port for the certificate probe; `None` skips it.
    pub tls_port: Option<u16>,
    /// `None` skips geolocation.
    pub geo: Option<GeoConfig>,
}

impl ScanConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ports: ports::default_ports(),
            timeout: tls::DEFAULT_TIMEOUT,
            banner_timeout: Duration::from_millis(1500),
            concurrency: 64,
            tls_port: Some(tls::DEFAULT_TLS_PORT),
            geo: Some(GeoConfig::default()),
        }
    }
}

/// Resolve the target, then scan it.
///
/// Resolution failure is the only error; every later failure is recorded in
/// the report.
pub async fn run_scan(config: &ScanConfig) -> Result<ScanReport, ResolutionError> {
    let address = resolve::resolve(&config.target).await?;
    info!(target = %config.target, %address, "Target resolved.");
    Ok(scan_address(config, address).await)
}

/// Probe all ports, the TLS certificate and geolocation of an already-resolved
/// address concurrently and assemble the report.
pub async fn scan_address(config: &ScanConfig, address: IpAddr) -> ScanReport {
    let started_at = OffsetDateTime::now_utc();
    info!(
        target = %config.target,
        %address,
        ports = config.ports.len(),
        tls = ?config.tls_port,
        geo = config.geo.is_some(),
        "Starting scan."
    );

    let opts = Arc::new(ServiceProbeOptions {
        host: config.target.clone(),
        connect_timeout: config.timeout,
        banner_timeout: config.banner_timeout,
    });
    let port_phase = probe_ports_with(&config.ports, config.concurrency, move |port| {
        let opts = opts.clone();
        async move { service::probe_service(address, port, &opts).await }
    });

    let (port_results, certificate, geo) = tokio::join!(
        port_phase,
        run_tls_probe(config, address),
        run_geo_lookup(config, address),
    );

    let report = report::assemble(Collected {
        target: config.target.clone(),
        address,
        requested_ports: config.ports.clone(),
        port_results,
        certificate,
        geo,
        started_at,
        finished_at: OffsetDateTime::now_utc(),
    });
    info!(
        open = report.open_ports().count(),
        certificate = matches!(report.certificate, Some(Ok(_))),
        "Scan finished."
    );
    report
}

/// Run `probe` once per port, at most `concurrency` at a time.
///
/// Each task owns the result for its port. A probe that panics is recorded as
/// closed for that port; siblings keep running.
pub async fn probe_ports_with<F, Fut>(ports: &BTreeSet<u16>, concurrency: usize, probe: F) -> Vec<PortResult>
where
    F: Fn(u16) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PortResult> + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(concurrency.clamp(1, MAX_CONCURRENCY)));
    let probe = Arc::new(probe);
    let mut set = JoinSet::new();

    for &port in ports {
        let sem = sem.clone();
        let probe = probe.clone();
        set.spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            match tokio::spawn(probe(port)).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(port, error = %e, "Port probe task failed, recording port as closed.");
                    PortResult::closed(port)
                }
            }
        });
    }

    let mut results = Vec::with_capacity(ports.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            // The assembler records ports lost here as closed.
            Err(e) => warn!(error = %e, "Port probe supervisor failed."),
        }
    }
    results
}

async fn run_tls_probe(config: &ScanConfig, address: IpAddr) -> Option<Fallible<CertificateRecord>> {
    let port = config.tls_port?;
    let hostname = config.target.clone();
    let timeout = config.timeout;
    let handle = tokio::spawn(async move {
        tls::probe_addr(&hostname, SocketAddr::new(address, port), timeout)
            .await
            .map_err(|e| e.to_string())
    });
    Some(handle.await.unwrap_or_else(|e| Err(format!("TLS probe task failed: {e}"))))
}

async fn run_geo_lookup(config: &ScanConfig, address: IpAddr) -> Option<Fallible<GeoRecord>> {
    let geo_config = config.geo.as_ref()?;
    Some(geo::lookup_geo(address, geo_config).await.map_err(|e| e.to_string()))
}
