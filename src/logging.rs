use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable consulted after `RUST_LOG`.
pub const LOG_ENV: &str = "HOST_RECON_LOG";

/// Target prefix shared by the library (`host_recon_rs`) and the binary (`host_recon`).
const LOG_TARGET: &str = "host_recon";

/// Initialize stderr logging. `RUST_LOG` or `HOST_RECON_LOG` win over the
/// `-v` count.
pub fn initialize_logging(verbosity: u8) -> anyhow::Result<()> {
    let directives = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV))
        .unwrap_or_else(|_| default_directive(verbosity));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(EnvFilter::try_new(directives)?)
        .try_init()?;
    Ok(())
}

fn default_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("{LOG_TARGET}={level}")
}
