//! Leaf certificate normalization.
//!
//! A [`RawCertificate`] mirrors what a TLS layer hands back for the peer: textual
//! validity dates and issuer/subject as nested RDN sets. [`parse`] turns it into
//! a [`CertificateRecord`]. [`RawCertificate::from_der`] fills the raw structure
//! from DER bytes as returned by the handshake.

use crate::error::CertificateParseError;
use crate::types::{Attribute, CertificateRecord};
use ::time::macros::format_description;
use ::time::{OffsetDateTime, PrimitiveDateTime};
use x509_parser::der_parser::oid::Oid;
use x509_parser::objects::{oid2sn, oid_registry};
use x509_parser::prelude::{parse_x509_certificate, X509Name};

/// Placeholder for optional certificate fields the peer did not supply.
pub const NOT_AVAILABLE: &str = "N/A";

/// One relative distinguished name: an ordered set of `(name, value)` pairs.
pub type Rdn = Vec<Attribute>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCertificate {
    pub serial_number: Option<String>,
    /// e.g. `"Jan  1 00:00:00 2030 GMT"`
    pub not_before: Option<String>,
    pub not_after: Option<String>,
    pub signature_algorithm: Option<String>,
    pub issuer: Vec<Rdn>,
    pub subject: Vec<Rdn>,
}

impl RawCertificate {
    /// Extract the raw fields of a DER-encoded X.509 certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateParseError> {
        let (_, x509) =
            parse_x509_certificate(der).map_err(|e| CertificateParseError::Der(e.to_string()))?;

        let validity = x509.validity();
        Ok(Self {
            serial_number: Some(serial_hex(x509.tbs_certificate.raw_serial())),
            not_before: Some(format_validity(validity.not_before.to_datetime())?),
            not_after: Some(format_validity(validity.not_after.to_datetime())?),
            signature_algorithm: Some(oid_name(&x509.signature_algorithm.algorithm)),
            issuer: name_to_rdns(x509.issuer()),
            subject: name_to_rdns(x509.subject()),
        })
    }
}

/// Normalize a raw certificate. `hostname` is the name the handshake was made for.
pub fn parse(hostname: &str, raw: &RawCertificate) -> Result<CertificateRecord, CertificateParseError> {
    let not_before = raw
        .not_before
        .as_deref()
        .ok_or(CertificateParseError::MissingField("notBefore"))?;
    let not_after = raw
        .not_after
        .as_deref()
        .ok_or(CertificateParseError::MissingField("notAfter"))?;

    // not_before > not_after is reported as-is.
    Ok(CertificateRecord {
        hostname: hostname.to_string(),
        serial_number: or_not_available(raw.serial_number.as_deref()),
        not_before: parse_validity("notBefore", not_before)?,
        not_after: parse_validity("notAfter", not_after)?,
        signature_algorithm: or_not_available(raw.signature_algorithm.as_deref()),
        issuer: flatten_rdns(&raw.issuer),
        subject: flatten_rdns(&raw.subject),
    })
}

/// Parse a validity string of the form `<Mon> <day> <HH:MM:SS> <YYYY> GMT`.
///
/// Runs of whitespace between fields are accepted, so OpenSSL's space-padded
/// day (`"Jan  1 ..."`) parses the same as `"Jan 1 ..."`.
pub fn parse_validity(field: &'static str, value: &str) -> Result<OffsetDateTime, CertificateParseError> {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let format = format_description!(
        "[month repr:short] [day padding:none] [hour]:[minute]:[second] [year] GMT"
    );
    PrimitiveDateTime::parse(&normalized, format)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| CertificateParseError::InvalidDate { field, value: value.to_string() })
}

/// Flatten nested RDN sets into one sequence, outer-then-inner, keeping duplicates.
pub fn flatten_rdns(rdns: &[Rdn]) -> Vec<Attribute> {
    rdns.iter().flat_map(|rdn| rdn.iter().cloned()).collect()
}

/// Render attributes as `"name: value, name: value"`.
pub fn format_attributes(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn or_not_available(value: Option<&str>) -> String {
    value.unwrap_or(NOT_AVAILABLE).to_string()
}

fn format_validity(dt: OffsetDateTime) -> Result<String, CertificateParseError> {
    let format = format_description!(
        "[month repr:short] [day padding:space] [hour]:[minute]:[second] [year] GMT"
    );
    dt.format(format)
        .map_err(|e| CertificateParseError::Der(format!("unrepresentable validity date: {e}")))
}

fn serial_hex(raw: &[u8]) -> String {
    // DER integers carry a leading 0x00 when the high bit is set.
    let trimmed = match raw {
        [0, rest @ ..] if !rest.is_empty() => rest,
        _ => raw,
    };
    trimmed.iter().map(|b| format!("{b:02X}")).collect()
}

fn oid_name(oid: &Oid) -> String {
    oid2sn(oid, oid_registry())
        .map(str::to_string)
        .unwrap_or_else(|_| oid.to_id_string())
}

fn name_to_rdns(name: &X509Name) -> Vec<Rdn> {
    name.iter()
        .map(|rdn| {
            rdn.iter()
                .map(|atv| {
                    let value = atv.as_str().unwrap_or("<non-string value>").to_string();
                    (oid_name(atv.attr_type()), value)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::time::macros::datetime;

    fn pair(n: &str, v: &str) -> Attribute {
        (n.to_string(), v.to_string())
    }

    #[test]
    fn parses_single_digit_day() {
        let dt = parse_validity("notAfter", "Jan 1 00:00:00 2030 GMT").unwrap();
        assert_eq!(dt, datetime!(2030-01-01 0:00 UTC));
    }

    #[test]
    fn parses_space_padded_day() {
        let dt = parse_validity("notBefore", "Mar  9 12:30:05 2024 GMT").unwrap();
        assert_eq!(dt, datetime!(2024-03-09 12:30:05 UTC));
    }

    #[test]
    fn rejects_iso_date() {
        let err = parse_validity("notAfter", "2030-01-01").unwrap_err();
        assert!(matches!(err, CertificateParseError::InvalidDate { field: "notAfter", .. }));
    }

    #[test]
    fn rejects_missing_gmt_suffix() {
        assert!(parse_validity("notAfter", "Jan 1 00:00:00 2030").is_err());
    }

    #[test]
    fn flatten_keeps_outer_then_inner_order() {
        let rdns = vec![
            vec![pair("C", "US")],
            vec![pair("O", "Example"), pair("CN", "example.com")],
        ];
        assert_eq!(
            flatten_rdns(&rdns),
            vec![pair("C", "US"), pair("O", "Example"), pair("CN", "example.com")]
        );
    }

    #[test]
    fn flatten_keeps_duplicates() {
        let rdns = vec![vec![pair("OU", "a")], vec![pair("OU", "b")]];
        assert_eq!(flatten_rdns(&rdns).len(), 2);
    }

    #[test]
    fn validity_formatting_matches_parsing() {
        let text = format_validity(datetime!(2030-01-01 0:00 UTC)).unwrap();
        assert_eq!(text, "Jan  1 00:00:00 2030 GMT");
        assert_eq!(parse_validity("notAfter", &text).unwrap(), datetime!(2030-01-01 0:00 UTC));
    }

    #[test]
    fn serial_drops_sign_padding_only() {
        assert_eq!(serial_hex(&[0x00, 0x9f, 0x01]), "9F01");
        assert_eq!(serial_hex(&[0x00]), "00");
        assert_eq!(serial_hex(&[0x1a, 0x2b]), "1A2B");
    }

    #[test]
    fn format_joins_pairs() {
        let attrs = vec![pair("C", "US"), pair("CN", "example.com")];
        assert_eq!(format_attributes(&attrs), "C: US, CN: example.com");
        assert_eq!(format_attributes(&[]), "");
    }
}
