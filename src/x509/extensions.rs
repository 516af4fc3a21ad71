use core::fmt;
use core::str::FromStr;
use std::net::IpAddr;

use crate::cryptobyte::asn1::ObjectIdentifier;
use crate::cryptobyte::oid::*;
use crate::cryptobyte::{self, Builder, Parser, Tag};
use crate::error::DerContext;
use crate::{Error, Result};

// Extension ::= SEQUENCE {
//     extnID    OBJECT IDENTIFIER,
//     critical  BOOLEAN DEFAULT FALSE,
//     extnValue OCTET STRING }
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    // DER of the extension's own structure
    pub value: Vec<u8>,
}

impl Extension {
    pub(crate) fn encode(&self, b: &mut Builder) {
        b.add_asn1_sequence(|b| {
            b.add_asn1_object_identifier(&self.oid);
            if self.critical {
                b.add_asn1_boolean(true);
            }
            b.add_asn1_octet_string(&self.value);
        });
    }

    pub(crate) fn read(p: &mut Parser) -> Result<Extension> {
        const STAGE: &str = "Extension";
        let mut s = p.read_asn1_sequence().der_context(STAGE)?;
        let oid = s.read_asn1_object_identifier().der_context(STAGE)?;
        let critical = match s.peek_tag() {
            Some(cryptobyte::BOOLEAN) => s.read_asn1_boolean().der_context(STAGE)?,
            _ => false,
        };
        let value = s.read_asn1_octet_string().der_context(STAGE)?.to_vec();
        s.finish().der_context(STAGE)?;
        Ok(Extension { oid, critical, value })
    }
}

fn build(stage: &'static str, f: impl FnMut(&mut Builder)) -> Result<Vec<u8>> {
    let mut b = Builder::new(Vec::new());
    b.add_asn1_sequence(f);
    b.take().der_context(stage)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub ca: bool,
    pub path_len: Option<u32>,
}

impl BasicConstraints {
    pub fn to_extension(self, critical: bool) -> Result<Extension> {
        let value = build("BasicConstraints", |b| {
            // DEFAULT FALSE is omitted in DER
            if self.ca {
                b.add_asn1_boolean(true);
            }
            if let Some(n) = self.path_len {
                b.add_asn1_u64(n as u64);
            }
        })?;
        Ok(Extension {
            oid: OidExtensionBasicConstraints,
            critical,
            value,
        })
    }

    pub fn from_der(der: &[u8]) -> Result<BasicConstraints> {
        const STAGE: &str = "BasicConstraints";
        let mut outer = Parser::new(der);
        let mut s = outer.read_asn1_sequence().der_context(STAGE)?;
        outer.finish().der_context(STAGE)?;
        let ca = match s.peek_tag() {
            Some(cryptobyte::BOOLEAN) => s.read_asn1_boolean().der_context(STAGE)?,
            _ => false,
        };
        let path_len = match s.peek_tag() {
            Some(cryptobyte::INTEGER) => {
                let n = s.read_asn1_i64().der_context(STAGE)?;
                Some(u32::try_from(n).map_err(|_| cryptobyte::Error::ASN1IntegerOutOfRange).der_context(STAGE)?)
            }
            _ => None,
        };
        s.finish().der_context(STAGE)?;
        Ok(BasicConstraints { ca, path_len })
    }
}

// SubjectKeyIdentifier ::= KeyIdentifier (OCTET STRING)
pub fn subject_key_id_extension(key_id: &[u8]) -> Result<Extension> {
    let mut b = Builder::new(Vec::new());
    b.add_asn1_octet_string(key_id);
    Ok(Extension {
        oid: OidExtensionSubjectKeyId,
        critical: false,
        value: b.take().der_context("SubjectKeyIdentifier")?,
    })
}

pub fn parse_subject_key_id(der: &[u8]) -> Result<Vec<u8>> {
    let mut p = Parser::new(der);
    let id = p.read_asn1_octet_string().der_context("SubjectKeyIdentifier")?;
    p.finish().der_context("SubjectKeyIdentifier")?;
    Ok(id.to_vec())
}

// AuthorityKeyIdentifier ::= SEQUENCE {
//     keyIdentifier             [0] KeyIdentifier OPTIONAL,
//     authorityCertIssuer       [1] GeneralNames OPTIONAL,
//     authorityCertSerialNumber [2] CertificateSerialNumber OPTIONAL }
pub fn authority_key_id_extension(key_id: &[u8]) -> Result<Extension> {
    Ok(Extension {
        oid: OidExtensionAuthorityKeyId,
        critical: false,
        value: build("AuthorityKeyIdentifier", |b| b.add_asn1_implicit(0, key_id))?,
    })
}

pub fn parse_authority_key_id(der: &[u8]) -> Result<Option<Vec<u8>>> {
    const STAGE: &str = "AuthorityKeyIdentifier";
    let mut outer = Parser::new(der);
    let mut s = outer.read_asn1_sequence().der_context(STAGE)?;
    outer.finish().der_context(STAGE)?;
    Ok(s.read_optional_asn1(Tag::context(0))
        .der_context(STAGE)?
        .map(|obj| obj.value.to_vec()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GeneralName {
    // rfc822Name
    Email(String),
    Dns(String),
    Uri(String),
    Ip(IpAddr),
    // any other choice, kept as its context tag and contents
    Other { tag: u8, value: Vec<u8> },
}

const RFC822_NAME: u8 = 1;
const DNS_NAME: u8 = 2;
const URI: u8 = 6;
const IP_ADDRESS: u8 = 7;

impl GeneralName {
    fn encode(&self, b: &mut Builder) {
        match self {
            GeneralName::Email(s) => b.add_asn1_implicit(RFC822_NAME, s.as_bytes()),
            GeneralName::Dns(s) => b.add_asn1_implicit(DNS_NAME, s.as_bytes()),
            GeneralName::Uri(s) => b.add_asn1_implicit(URI, s.as_bytes()),
            GeneralName::Ip(IpAddr::V4(ip)) => b.add_asn1_implicit(IP_ADDRESS, &ip.octets()),
            GeneralName::Ip(IpAddr::V6(ip)) => b.add_asn1_implicit(IP_ADDRESS, &ip.octets()),
            GeneralName::Other { tag, value } => b.add_asn1(Tag(*tag), |b| b.add_bytes(value)),
        }
    }

    fn read(p: &mut Parser) -> Result<GeneralName> {
        const STAGE: &str = "GeneralName";
        let obj = p.read_asn1_object().der_context(STAGE)?;
        let ia5 = || {
            if !obj.value.is_ascii() {
                return Err(cryptobyte::Error::ASN1InvalidString(obj.tag.0)).der_context(STAGE);
            }
            Ok(String::from_utf8_lossy(obj.value).into_owned())
        };
        Ok(match obj.tag {
            t if t == Tag::context(RFC822_NAME) => GeneralName::Email(ia5()?),
            t if t == Tag::context(DNS_NAME) => GeneralName::Dns(ia5()?),
            t if t == Tag::context(URI) => GeneralName::Uri(ia5()?),
            t if t == Tag::context(IP_ADDRESS) => {
                if let Ok(v4) = <[u8; 4]>::try_from(obj.value) {
                    GeneralName::Ip(IpAddr::from(v4))
                } else if let Ok(v6) = <[u8; 16]>::try_from(obj.value) {
                    GeneralName::Ip(IpAddr::from(v6))
                } else {
                    let got = obj.value.len();
                    return Err(cryptobyte::Error::ASN1InvalidLength { want: 4, got }).der_context(STAGE);
                }
            }
            t => GeneralName::Other {
                tag: t.0,
                value: obj.value.to_vec(),
            },
        })
    }
}

impl fmt::Display for GeneralName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneralName::Email(s) => write!(f, "email:{}", s),
            GeneralName::Dns(s) => write!(f, "DNS:{}", s),
            GeneralName::Uri(s) => write!(f, "URI:{}", s),
            GeneralName::Ip(ip) => write!(f, "IP:{}", ip),
            GeneralName::Other { tag, value } => write!(f, "[{}]:{}", tag & 0x1f, hex::encode(value)),
        }
    }
}

impl FromStr for GeneralName {
    type Err = Error;

    // "DNS:example.com", "IP:10.0.0.1", "email:a@example.com", "URI:https://..."
    // as openssl writes them. Without a prefix, addresses are IPs and
    // anything else a DNS name.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let ascii = |v: &str, kind: &str| {
            if v.is_empty() || !v.is_ascii() {
                Err(Error::invalid_input("subject alternative name", format!("{} {:?} must be non-empty ASCII", kind, v)))
            } else {
                Ok(v.to_string())
            }
        };
        let (kind, value) = match s.split_once(':') {
            Some((k, v)) if ["DNS", "IP", "EMAIL", "URI"].iter().any(|p| p.eq_ignore_ascii_case(k)) => (k, v.trim()),
            _ => {
                return Ok(match s.parse::<IpAddr>() {
                    Ok(ip) => GeneralName::Ip(ip),
                    Err(_) => GeneralName::Dns(ascii(s, "DNS")?),
                });
            }
        };
        match kind.to_ascii_uppercase().as_str() {
            "DNS" => Ok(GeneralName::Dns(ascii(value, "DNS")?)),
            "EMAIL" => Ok(GeneralName::Email(ascii(value, "email")?)),
            "URI" => Ok(GeneralName::Uri(ascii(value, "URI")?)),
            _ => value
                .parse::<IpAddr>()
                .map(GeneralName::Ip)
                .map_err(|e| Error::invalid_input("subject alternative name", format!("IP {:?}: {}", value, e))),
        }
    }
}

// SubjectAltName ::= GeneralNames ::= SEQUENCE SIZE (1..MAX) OF GeneralName
pub fn subject_alt_name_extension(names: &[GeneralName]) -> Result<Extension> {
    if names.is_empty() {
        return Err(Error::invalid_input("subject alternative name", "empty list"));
    }
    Ok(Extension {
        oid: OidExtensionSubjectAltName,
        critical: false,
        value: build("SubjectAltName", |b| {
            for name in names {
                name.encode(b);
            }
        })?,
    })
}

pub fn parse_subject_alt_names(der: &[u8]) -> Result<Vec<GeneralName>> {
    const STAGE: &str = "SubjectAltName";
    let mut outer = Parser::new(der);
    let mut s = outer.read_asn1_sequence().der_context(STAGE)?;
    outer.finish().der_context(STAGE)?;
    let mut names = Vec::new();
    while !s.empty() {
        names.push(GeneralName::read(&mut s)?);
    }
    Ok(names)
}
