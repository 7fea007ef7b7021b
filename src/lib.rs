//! Library crate for host-recon-rs: single-host port/service scanning, TLS leaf
//! certificate inspection and IP geolocation, merged into one report.
pub mod certificate;
pub mod error;
pub mod geo;
pub mod logging;
pub mod ports;
pub mod render;
pub mod report;
pub mod resolve;
pub mod scanner;
pub mod service;
pub mod tls;
pub mod types;
