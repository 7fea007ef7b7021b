//! Typed failures of the scan subsystems.
//!
//! Only [`ResolutionError`] ever reaches the caller of a scan. The others are
//! rendered to strings and embedded in the [`crate::types::ScanReport`].

use std::io;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("failed to resolve {target}: {source}")]
    Lookup {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("no addresses found for {target}")]
    NoAddress { target: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CertificateParseError {
    #[error("certificate is missing the {0} field")]
    MissingField(&'static str),

    #[error("invalid {field} date {value:?}, expected e.g. \"Jan 1 00:00:00 2030 GMT\"")]
    InvalidDate { field: &'static str, value: String },

    #[error("malformed DER certificate: {0}")]
    Der(String),
}

/// Step of the TLS probe that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    Resolve,
    Connect,
    Handshake,
}

impl std::fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStage::Resolve => f.write_str("name resolution"),
            ProbeStage::Connect => f.write_str("connect"),
            ProbeStage::Handshake => f.write_str("TLS handshake"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("could not resolve {host}: {source}")]
    Dns {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("connection refused by {0}")]
    Refused(String),

    #[error("TCP connection error to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("{stage} timed out after {}s", .after.as_secs_f32())]
    Timeout { stage: ProbeStage, after: Duration },

    #[error("TLS connector error: {0}")]
    Connector(#[source] native_tls::Error),

    #[error("TLS handshake error: {0}")]
    Handshake(#[source] native_tls::Error),

    #[error("server did not present a certificate")]
    NoCertificate,

    #[error("could not read peer certificate: {0}")]
    PeerCertificate(#[source] native_tls::Error),

    #[error(transparent)]
    Certificate(#[from] CertificateParseError),
}

#[derive(Debug, thiserror::Error)]
pub enum GeoLookupError {
    #[error("failed to fetch geolocation, status code: {0}")]
    Status(u16),

    #[error("geolocation request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_names_the_stalled_stage() {
        let err = ProbeError::Timeout { stage: ProbeStage::Resolve, after: Duration::from_secs(5) };
        assert_eq!(err.to_string(), "name resolution timed out after 5s");
        let err = ProbeError::Timeout { stage: ProbeStage::Handshake, after: Duration::from_millis(500) };
        assert_eq!(err.to_string(), "TLS handshake timed out after 0.5s");
    }
}
