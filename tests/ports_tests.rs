use host_recon_rs::ports::{load_ports_from_path, parse_ports_list};

#[test]
fn parse_single_and_ranges_and_comments() {
    let input = r#"
        # common ports
        22
        80  # http
        443 # https
        8000-8002
        8001  # duplicate
        # blank line follows

    "#;

    let ports = parse_ports_list(input).expect("parse ok");
    // Deduplicated and ascending regardless of input order
    assert_eq!(ports.into_iter().collect::<Vec<_>>(), vec![22, 80, 443, 8000, 8001, 8002]);
}

#[test]
fn invalid_port_rejected() {
    let input = "0\n"; // invalid: out of range
    assert!(parse_ports_list(input).is_err());
}

#[test]
fn missing_file_reports_path() {
    let err = load_ports_from_path("/nonexistent/ports.txt").unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/ports.txt"));
}
