use crate::certificate::{self, RawCertificate};
use crate::error::{ProbeError, ProbeStage};
use crate::types::CertificateRecord;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info, warn};

pub const DEFAULT_TLS_PORT: u16 = 443;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Handshake with `target:port` and return its normalized leaf certificate.
///
/// One attempt. Name resolution, connect and handshake are each bounded by
/// `timeout`.
pub async fn probe(target: &str, port: u16, timeout: Duration) -> Result<CertificateRecord, ProbeError> {
    let lookup = time::timeout(timeout, tokio::net::lookup_host((target, port)))
        .await
        .map_err(|_| ProbeError::Timeout { stage: ProbeStage::Resolve, after: timeout })?
        .map_err(|source| ProbeError::Dns { host: target.to_string(), source })?;
    let addr = lookup
        .into_iter()
        .next()
        .ok_or_else(|| ProbeError::Dns {
            host: target.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
        })?;
    probe_addr(target, addr, timeout).await
}

/// Like [`probe`] but against an already-resolved address. `hostname` is still
/// used for SNI and certificate name checks.
pub async fn probe_addr(
    hostname: &str,
    addr: SocketAddr,
    timeout: Duration,
) -> Result<CertificateRecord, ProbeError> {
    info!(hostname, %addr, "Starting TLS probe.");
    let result = handshake_and_parse(hostname, addr, timeout).await;
    match &result {
        Ok(cert) => info!(
            hostname,
            serial = %cert.serial_number,
            not_after = %cert.not_after,
            "TLS probe finished."
        ),
        Err(e) => warn!(hostname, %addr, error = %e, "TLS probe failed."),
    }
    result
}

async fn handshake_and_parse(
    hostname: &str,
    addr: SocketAddr,
    timeout: Duration,
) -> Result<CertificateRecord, ProbeError> {
    let connector = native_tls::TlsConnector::new().map_err(ProbeError::Connector)?;
    let connector = tokio_native_tls::TlsConnector::from(connector);

    debug!(%addr, "Connecting TCP stream.");
    let tcp = time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ProbeError::Timeout { stage: ProbeStage::Connect, after: timeout })?
        .map_err(|source| match source.kind() {
            io::ErrorKind::ConnectionRefused => ProbeError::Refused(addr.to_string()),
            _ => ProbeError::Connect { addr: addr.to_string(), source },
        })?;

    debug!(hostname, "Performing TLS handshake.");
    let stream = time::timeout(timeout, connector.connect(hostname, tcp))
        .await
        .map_err(|_| ProbeError::Timeout { stage: ProbeStage::Handshake, after: timeout })?
        .map_err(ProbeError::Handshake)?;

    let cert = stream
        .get_ref()
        .peer_certificate()
        .map_err(ProbeError::PeerCertificate)?
        .ok_or(ProbeError::NoCertificate)?;
    let der = cert.to_der().map_err(ProbeError::PeerCertificate)?;
    drop(stream);

    let raw = RawCertificate::from_der(&der)?;
    Ok(certificate::parse(hostname, &raw)?)
}
