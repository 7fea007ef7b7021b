use crate::types::{PortResult, PortState};
use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Upper bound on bytes read from a service while fingerprinting.
const MAX_BANNER_BYTES: usize = 1024;
const MAX_VERSION_CHARS: usize = 80;

#[derive(Debug, Clone)]
pub struct ServiceProbeOptions {
    /// Name sent in the `Host` header of the HTTP probe.
    pub host: String,
    pub connect_timeout: Duration,
    /// Bound for each banner read (passive, then after the HTTP probe).
    pub banner_timeout: Duration,
}

/// Connect to `addr:port`, classify it and try to fingerprint the service.
///
/// Never fails: connect errors map to `Closed` (refused or any other error) or
/// `Filtered` (no answer within the connect timeout).
pub async fn probe_service(addr: IpAddr, port: u16, opts: &ServiceProbeOptions) -> PortResult {
    let sock = SocketAddr::new(addr, port);
    let start = Instant::now();
    let mut stream = match time::timeout(opts.connect_timeout, TcpStream::connect(sock)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            let state = classify_connect_error(&e);
            debug!(port, %state, error = %e, "Port not open.");
            return match state {
                PortState::Filtered => PortResult::filtered(port),
                _ => PortResult::closed(port),
            };
        }
        Err(_) => {
            debug!(port, "Connect timed out, treating as filtered.");
            return PortResult::filtered(port);
        }
    };
    debug!(port, latency_ms = start.elapsed().as_millis() as u64, "Port open.");

    let version = match grab_banner(&mut stream, &opts.host, opts.banner_timeout).await {
        Some(banner) => fingerprint(&banner),
        None => None,
    };
    debug!(port, version = version.as_deref().unwrap_or("<unknown>"), "Service fingerprinted.");
    PortResult::open(port, version)
}

/// Map a failed connect to a port state.
pub fn classify_connect_error(err: &io::Error) -> PortState {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => PortState::Closed,
        io::ErrorKind::TimedOut => PortState::Filtered,
        // Unreachable, reset and the rest count as closed.
        _ => PortState::Closed,
    }
}

/// Read what the service volunteers; if it stays silent, send a minimal HTTP
/// request and read the reply.
async fn grab_banner(stream: &mut TcpStream, host: &str, timeout: Duration) -> Option<Vec<u8>> {
    if let Some(banner) = read_until(stream, timeout, |buf| buf.contains(&b'\n')).await {
        trace!(bytes = banner.len(), "Passive banner received.");
        return Some(banner);
    }

    let request = format!(
        "HEAD / HTTP/1.0\r\nHost: {}\r\nUser-Agent: host-recon\r\n\r\n",
        host_header(host)
    );
    if stream.write_all(request.as_bytes()).await.is_err() {
        return None;
    }
    read_until(stream, timeout, |buf| buf.windows(4).any(|w| w == b"\r\n\r\n")).await
}

/// IPv6 literals must be bracketed in a `Host` header.
fn host_header(host: &str) -> String {
    match host.parse::<Ipv6Addr>() {
        Ok(_) => format!("[{host}]"),
        Err(_) => host.to_string(),
    }
}

/// Read until `done` holds, EOF, `MAX_BANNER_BYTES` or the deadline. Returns
/// `None` if nothing was read.
async fn read_until(
    stream: &mut TcpStream,
    timeout: Duration,
    done: impl Fn(&[u8]) -> bool,
) -> Option<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut buf = Vec::with_capacity(256);
    let mut chunk = [0u8; 256];
    while buf.len() < MAX_BANNER_BYTES && !done(&buf) {
        match time::timeout_at(deadline, stream.read(&mut chunk)).await {
            Ok(Ok(n)) if n > 0 => {
                let take = n.min(MAX_BANNER_BYTES - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            _ => break,
        }
    }
    (!buf.is_empty()).then_some(buf)
}

/// Derive a service/version string from raw banner bytes.
///
/// - HTTP replies: the `Server` header.
/// - SSH: the software part of the identification string.
/// - FTP/SMTP (`220 ...`), POP3 (`+OK ...`), IMAP (`* OK ...`): the greeting text.
/// - MySQL handshake: the server version.
/// - Otherwise the first printable line.
pub fn fingerprint(banner: &[u8]) -> Option<String> {
    if banner.is_empty() {
        return None;
    }
    // TLS record (alert/handshake) in reply to plain text: nothing to read.
    if matches!(banner[0], 0x15 | 0x16) && banner.get(1) == Some(&0x03) {
        return None;
    }
    if let Some(version) = mysql_version(banner) {
        return Some(version);
    }

    let text = String::from_utf8_lossy(banner);
    if text.starts_with("HTTP/") {
        return text
            .lines()
            .skip(1)
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.trim().eq_ignore_ascii_case("server").then(|| value.trim())
            })
            .and_then(printable);
    }

    let first = text.lines().next()?;
    if let Some(rest) = first.strip_prefix("SSH-") {
        // SSH-<protoversion>-<softwareversion> [comments]
        return rest.split_once('-').and_then(|(_, software)| printable(software));
    }
    if let Some(rest) = first.strip_prefix("+OK").or_else(|| first.strip_prefix("* OK")) {
        return printable(rest);
    }
    if let Some(rest) = strip_status_code(first) {
        return printable(rest);
    }
    printable(first)
}

/// `"220 mail.example.com ESMTP"` / `"220-..."` -> the text after the code.
fn strip_status_code(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();
    if bytes.len() > 4 && bytes[..3].iter().all(u8::is_ascii_digit) && matches!(bytes[3], b' ' | b'-') {
        Some(&line[4..])
    } else {
        None
    }
}

fn mysql_version(banner: &[u8]) -> Option<String> {
    // 3-byte length, sequence id 0, protocol version 10, NUL-terminated version.
    if banner.len() < 6 || banner[3] != 0 || banner[4] != 0x0a {
        return None;
    }
    let rest = &banner[5..];
    let end = rest.iter().position(|&b| b == 0)?;
    let version = std::str::from_utf8(&rest[..end]).ok()?;
    printable(version).map(|v| format!("MySQL {v}"))
}

fn printable(s: &str) -> Option<String> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_VERSION_CHARS)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.chars().filter(|c| c.is_alphanumeric()).count() < 2 {
        return None;
    }
    Some(cleaned.to_string())
}
