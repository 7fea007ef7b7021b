use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use time::OffsetDateTime;

/// Outcome of an independently-failing subsystem: the value, or a human-readable cause.
pub type Fallible<T> = Result<T, String>;

/// Reachability of a single TCP port.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    Open,
    Closed,
    Filtered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
            PortState::Filtered => "filtered",
        };
        f.write_str(s)
    }
}

/// One probed port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortResult {
    pub port: u16,
    pub state: PortState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
}

impl PortResult {
    pub fn open(port: u16, service_version: Option<String>) -> Self {
        Self {
            port,
            state: PortState::Open,
            service_version: service_version.filter(|v| !v.is_empty()),
        }
    }

    pub fn closed(port: u16) -> Self {
        Self { port, state: PortState::Closed, service_version: None }
    }

    pub fn filtered(port: u16) -> Self {
        Self { port, state: PortState::Filtered, service_version: None }
    }
}

/// An attribute of a distinguished name, e.g. `("commonName", "example.com")`.
pub type Attribute = (String, String);

/// Normalized view of a TLS leaf certificate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub hostname: String,
    pub serial_number: String,
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    pub signature_algorithm: String,
    pub issuer: Vec<Attribute>,
    pub subject: Vec<Attribute>,
}

/// Coarse location data returned by the IP-info service. Every field is optional
/// because the service omits what it does not know.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoRecord {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// `"lat,lon"` as supplied.
    #[serde(default)]
    pub loc: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default)]
    pub postal: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Aggregate result of one scan invocation. Built once by
/// [`crate::report::assemble`] and never mutated afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub target: String,
    pub address: IpAddr,
    pub port_results: Vec<PortResult>,
    /// `None` when TLS probing was not requested.
    pub certificate: Option<Fallible<CertificateRecord>>,
    /// `None` when geolocation was not requested.
    pub geo: Option<Fallible<GeoRecord>>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
}

impl ScanReport {
    pub fn open_ports(&self) -> impl Iterator<Item = &PortResult> {
        self.port_results.iter().filter(|r| r.state == PortState::Open)
    }
}
