use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use host_recon_rs::geo::{GeoConfig, DEFAULT_GEO_URL};
use host_recon_rs::{logging, ports, render, scanner};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::error;

/// host-recon: port/service scan, TLS certificate and geolocation for one host.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "host-recon",
    version,
    about = "Port/service scan, TLS certificate inspection and geolocation for a single host.",
    long_about = None
)]
struct Cli {
    /// Hostname or IP address to scan.
    target: String,

    /// Ports to probe: comma-separated ports and ranges, e.g. `22,80,8000-8010`.
    #[arg(long, conflicts_with = "ports_file")]
    ports: Option<String>,

    /// File with one port or range per line (`#` starts a comment).
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,

    /// Connect and TLS handshake timeout in seconds.
    #[arg(long = "timeout-secs", default_value_t = 5.0)]
    timeout_secs: f64,

    /// Timeout for each banner read in milliseconds.
    #[arg(long = "banner-timeout-ms", default_value_t = 1500)]
    banner_timeout_ms: u64,

    /// Max concurrent port probes.
    #[arg(long, default_value_t = 64)]
    concurrency: usize,

    /// Port used for the TLS certificate probe.
    #[arg(long = "tls-port", default_value_t = 443)]
    tls_port: u16,

    /// Skip the TLS certificate probe.
    #[arg(long = "no-tls", default_value_t = false)]
    no_tls: bool,

    /// Skip the geolocation lookup.
    #[arg(long = "no-geo", default_value_t = false)]
    no_geo: bool,

    /// Base URL of the IP-info service.
    #[arg(long = "geo-url", default_value = DEFAULT_GEO_URL)]
    geo_url: String,

    /// Write the report as pretty JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::initialize_logging(cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Scan aborted.");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    let report = scanner::run_scan(&config).await?;

    print!("{}", render::render_text(&report));

    if let Some(path) = cli.output.as_deref() {
        render::write_report_json(path, &report)
            .with_context(|| format!("failed to write JSON to {}", path.display()))?;
        println!("\nWrote JSON report to {}", path.display());
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<scanner::ScanConfig> {
    if !(cli.timeout_secs.is_finite() && cli.timeout_secs > 0.0) {
        bail!("--timeout-secs must be a positive number, got {}", cli.timeout_secs);
    }
    if cli.tls_port == 0 {
        bail!("--tls-port must be in 1..=65535");
    }

    let mut config = scanner::ScanConfig::new(cli.target.trim());
    if let Some(list) = cli.ports.as_deref() {
        config.ports = ports::parse_ports_list(list).context("invalid --ports")?;
    } else if let Some(path) = cli.ports_file.as_deref() {
        config.ports = ports::load_ports_from_path(path)?;
    }
    config.timeout = Duration::try_from_secs_f64(cli.timeout_secs)
        .map_err(|_| anyhow::anyhow!("--timeout-secs {} is out of range", cli.timeout_secs))?;
    config.banner_timeout = Duration::from_millis(cli.banner_timeout_ms);
    config.concurrency = cli.concurrency;
    config.tls_port = (!cli.no_tls).then_some(cli.tls_port);
    config.geo = (!cli.no_geo).then(|| GeoConfig { base_url: cli.geo_url.clone(), ..GeoConfig::default() });
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::parse_from(["host-recon", "example.com", "--ports", "443,80", "--no-geo"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.ports.iter().copied().collect::<Vec<_>>(), vec![80, 443]);
        assert_eq!(config.tls_port, Some(443));
        assert!(config.geo.is_none());
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_non_positive_timeout() {
        let cli = Cli::parse_from(["host-recon", "example.com", "--timeout-secs", "0"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        let cli = Cli::parse_from(["host-recon", "example.com", "--timeout-secs", "1e20"]);
        let err = build_config(&cli).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn no_tls_disables_probe() {
        let cli = Cli::parse_from(["host-recon", "10.0.0.1", "--no-tls", "--tls-port", "8443"]);
        assert_eq!(build_config(&cli).unwrap().tls_port, None);
    }
}
