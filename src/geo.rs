use crate::error::GeoLookupError;
use crate::types::GeoRecord;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_GEO_URL: &str = "https://ipinfo.io";

#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Service root; the lookup requests `{base_url}/{ip}/json`.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_GEO_URL.to_string(), timeout: Duration::from_secs(5) }
    }
}

/// Fetch coarse location data for `ip`. Any non-200 status is an error.
pub async fn lookup_geo(ip: IpAddr, config: &GeoConfig) -> Result<GeoRecord, GeoLookupError> {
    let url = format!("{}/{}/json", config.base_url.trim_end_matches('/'), ip);
    info!(%url, "Starting geolocation lookup.");

    let client = reqwest::Client::builder()
        .user_agent(concat!("host-recon/", env!("CARGO_PKG_VERSION")))
        .timeout(config.timeout)
        .build()?;

    let response = client.get(&url).send().await.map_err(|e| {
        warn!(%url, error = %e, "Geolocation request failed.");
        GeoLookupError::Request(e)
    })?;
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        warn!(%url, %status, "Geolocation service returned an error status.");
        return Err(GeoLookupError::Status(status.as_u16()));
    }

    let record = response.json::<GeoRecord>().await?;
    info!(country = record.country.as_deref().unwrap_or("?"), "Geolocation lookup finished.");
    Ok(record)
}
