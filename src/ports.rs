use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Parse a port list into a deduplicated, ascending set of TCP ports (1..=65535).
///
/// Supported syntax, mixable:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - separators: commas and/or newlines, e.g. `22,80,443`
/// - comments: everything after `#` on a line is ignored
/// - whitespace and blank entries are ignored
pub fn parse_ports_list(s: &str) -> Result<BTreeSet<u16>> {
    let mut out = BTreeSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");
        for item in line.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            if let Some((a, b)) = item.split_once('-') {
                let start = parse_port_str(a.trim())
                    .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
                let end = parse_port_str(b.trim())
                    .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
                if start > end {
                    bail!("line {line_no}: invalid range {start}-{end} (start > end)");
                }
                out.extend(start..=end);
                continue;
            }

            let p = parse_port_str(item)
                .with_context(|| format!("line {line_no}: invalid port value: {item}"))?;
            out.insert(p);
        }
    }

    if out.is_empty() {
        bail!("port list is empty");
    }
    Ok(out)
}

/// Load a port list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<BTreeSet<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_ports_list(&content)
}

/// Common service ports probed when none are given.
pub fn default_ports() -> BTreeSet<u16> {
    const DEFAULT: &[u16] = &[
        21, 22, 23, 25, 53, 80, 110, 143, 443, 465, 587, 993, 995, 3306, 3389, 5432, 6379, 8080,
        8443,
    ];
    DEFAULT.iter().copied().collect()
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ports: &[u16]) -> BTreeSet<u16> {
        ports.iter().copied().collect()
    }

    #[test]
    fn parse_comma_list() {
        let ports = parse_ports_list("443, 22,80").unwrap();
        assert_eq!(ports, set(&[22, 80, 443]));
    }

    #[test]
    fn parse_ranges_and_dedup() {
        let ports = parse_ports_list("8000-8002\n80\n8001\n").unwrap();
        assert_eq!(ports, set(&[80, 8000, 8001, 8002]));
    }

    #[test]
    fn parse_with_comments_and_whitespace() {
        let input = r#"
            # common web ports
            80  # http
            443 # https
            8000-8002   # dev servers

            # blank lines and spaces should be fine
        "#;
        let ports = parse_ports_list(input).unwrap();
        assert_eq!(ports, set(&[80, 443, 8000, 8001, 8002]));
    }

    #[test]
    fn invalid_values_error() {
        assert!(parse_ports_list("70000\n").is_err());
        assert!(parse_ports_list("90-80").is_err());
        assert!(parse_ports_list("http").is_err());
    }

    #[test]
    fn empty_list_errors() {
        assert!(parse_ports_list("  # nothing\n").is_err());
    }

    #[test]
    fn default_has_common_ports() {
        let d = default_ports();
        assert!(d.contains(&80) && d.contains(&443));
    }
}
