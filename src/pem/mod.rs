// PEM envelopes around private keys and certificates.
//
// A key file holds exactly one key envelope, optionally preceded by an
// "EC PARAMETERS" or "DSA PARAMETERS" block as `openssl ecparam -genkey`
// writes them. Traditional envelopes may carry RFC 1421 headers announcing
// OpenSSL's legacy encryption.

mod writer;

pub use writer::{
    encode_encrypted_private_key, encode_pem, encode_private_key, encode_traditional_private_key,
};

use core::fmt;
use std::path::Path;
use std::str::Lines;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use zeroize::Zeroizing;

use crate::key::KeyMaterial;
use crate::log::{debug, trace};
use crate::pbe::legacy::DekInfo;
use crate::pbe::pkcs5;
use crate::{Error, Result};

const BEGIN: &str = "-----BEGIN ";
const END: &str = "-----END ";
const DASHES: &str = "-----";

// A passphrase; wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Zeroizing<Vec<u8>>);

impl Password {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Password {
        Password(Zeroizing::new(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Password::new(s.as_bytes())
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Password::new(s.into_bytes())
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PemFormat {
    // "RSA PRIVATE KEY"
    Pkcs1,
    // "PRIVATE KEY"
    Pkcs8,
    // "ENCRYPTED PRIVATE KEY"
    Pkcs8Encrypted,
    // "DSA PRIVATE KEY"
    OpensslDsa,
    // "EC PRIVATE KEY"
    OpensslEc,
}

impl PemFormat {
    pub fn label(self) -> &'static str {
        match self {
            PemFormat::Pkcs1 => "RSA PRIVATE KEY",
            PemFormat::Pkcs8 => "PRIVATE KEY",
            PemFormat::Pkcs8Encrypted => "ENCRYPTED PRIVATE KEY",
            PemFormat::OpensslDsa => "DSA PRIVATE KEY",
            PemFormat::OpensslEc => "EC PRIVATE KEY",
        }
    }

    // Traditional formats may carry Proc-Type/DEK-Info headers.
    fn has_headers(self) -> bool {
        matches!(self, PemFormat::Pkcs1 | PemFormat::OpensslDsa | PemFormat::OpensslEc)
    }

    fn decode_der(self, der: &[u8]) -> Result<KeyMaterial> {
        match self {
            PemFormat::Pkcs1 => KeyMaterial::from_pkcs1_der(der),
            PemFormat::Pkcs8 | PemFormat::Pkcs8Encrypted => KeyMaterial::from_pkcs8_der(der),
            PemFormat::OpensslDsa => KeyMaterial::from_openssl_dsa_der(der),
            PemFormat::OpensslEc => KeyMaterial::from_sec1_der(der),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Marker {
    Key(PemFormat),
    // parameters block that must be followed by the given key
    Parameters(PemFormat),
}

const MARKERS: &[(&str, Marker)] = &[
    ("RSA PRIVATE KEY", Marker::Key(PemFormat::Pkcs1)),
    ("PRIVATE KEY", Marker::Key(PemFormat::Pkcs8)),
    ("ENCRYPTED PRIVATE KEY", Marker::Key(PemFormat::Pkcs8Encrypted)),
    ("DSA PRIVATE KEY", Marker::Key(PemFormat::OpensslDsa)),
    ("EC PRIVATE KEY", Marker::Key(PemFormat::OpensslEc)),
    ("DSA PARAMETERS", Marker::Parameters(PemFormat::OpensslDsa)),
    ("EC PARAMETERS", Marker::Parameters(PemFormat::OpensslEc)),
];

fn lookup_marker(label: &str) -> Option<Marker> {
    MARKERS.iter().find(|(l, _)| *l == label).map(|(_, m)| *m)
}

// The label of a "-----BEGIN <label>-----" line.
fn begin_label<'a>(line: &'a str, source_name: &str) -> Result<Option<&'a str>> {
    let Some(rest) = line.strip_prefix(BEGIN) else {
        return Ok(None);
    };
    rest.strip_suffix(DASHES)
        .map(Some)
        .ok_or_else(|| Error::malformed_pem(source_name, format!("bad BEGIN line {:?}", line)))
}

#[derive(Clone, PartialEq, Eq)]
pub struct PemEnvelope {
    pub label: String,
    pub format: PemFormat,
    pub headers: Vec<(String, String)>,
    // base64 body with line breaks removed
    pub payload: String,
}

impl fmt::Debug for PemEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemEnvelope")
            .field("label", &self.label)
            .field("format", &self.format)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

// Header lines and base64 body up to the footer of label.
struct Body {
    headers: Vec<(String, String)>,
    payload: String,
}

fn read_body(lines: &mut Lines, label: &str, allow_headers: bool, source_name: &str) -> Result<Body> {
    let footer = format!("{END}{label}{DASHES}");
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut payload = String::new();
    let mut in_headers = allow_headers;

    for line in lines.by_ref() {
        let line = line.trim_end();
        if line == footer {
            return Ok(Body { headers, payload });
        }
        if line.starts_with(END) || line.starts_with(BEGIN) {
            return Err(Error::malformed_pem(
                source_name,
                format!("expected {:?}, found {:?}", footer, line),
            ));
        }
        if in_headers {
            if line.is_empty() {
                in_headers = false;
                continue;
            }
            // RFC 1421 continuation line
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                    continue;
                }
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
                continue;
            }
            in_headers = false;
        }
        payload.push_str(line.trim());
    }
    Err(Error::malformed_pem(source_name, format!("missing {:?}", footer)))
}

impl PemEnvelope {
    // Finds the single key envelope in text, skipping an optional parameters
    // block in front of it.
    pub fn parse(text: &str, source_name: &str) -> Result<PemEnvelope> {
        let mut lines = text.lines();
        let label = loop {
            let Some(line) = lines.next() else {
                return Err(Error::unsupported_format(source_name, "no PEM BEGIN line"));
            };
            if let Some(label) = begin_label(line.trim(), source_name)? {
                break label;
            }
        };

        let format = match lookup_marker(label) {
            Some(Marker::Key(format)) => format,
            Some(Marker::Parameters(format)) => {
                read_body(&mut lines, label, false, source_name)
                    .map_err(|_| Error::malformed_pem(source_name, format!("{} block is not closed", label)))?;
                let next = lines.by_ref().map(str::trim).find(|l| !l.is_empty());
                let companion = match next {
                    Some(line) => begin_label(line, source_name)?,
                    None => None,
                };
                if companion != Some(format.label()) {
                    return Err(Error::malformed_pem(
                        source_name,
                        format!("{} block is not followed by {}", label, format.label()),
                    ));
                }
                trace!("skipped {} block", label);
                format
            }
            None => {
                return Err(Error::unsupported_format(source_name, format!("unknown PEM label {:?}", label)));
            }
        };

        let body = read_body(&mut lines, format.label(), format.has_headers(), source_name)?;
        debug!("{}: PEM format {:?}", source_name, format);
        Ok(PemEnvelope {
            label: format.label().to_string(),
            format,
            headers: body.headers,
            payload: body.payload,
        })
    }

    // Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_encrypted(&self) -> bool {
        match self.format {
            PemFormat::Pkcs8Encrypted => true,
            _ => self.header("Proc-Type").is_some_and(is_proc_type_encrypted),
        }
    }

    pub fn decode_payload(&self, source_name: &str) -> Result<Zeroizing<Vec<u8>>> {
        decode_base64(&self.payload, source_name)
    }
}

fn decode_base64(payload: &str, source_name: &str) -> Result<Zeroizing<Vec<u8>>> {
    STANDARD
        .decode(payload)
        .map(Zeroizing::new)
        .map_err(|e| Error::malformed_pem(source_name, format!("invalid base64: {}", e)))
}

// "4,ENCRYPTED"
fn is_proc_type_encrypted(value: &str) -> bool {
    value
        .split_once(',')
        .is_some_and(|(_, kind)| kind.trim().eq_ignore_ascii_case("ENCRYPTED"))
}

fn ask_password<F>(provider: F, source_name: &str) -> Result<Password>
where
    F: FnOnce() -> Option<Password>,
{
    provider().ok_or_else(|| Error::MissingPassword {
        source_name: source_name.to_string(),
    })
}

// Decrypted bytes that fail to parse mean the password was wrong far more
// often than a corrupt file.
fn decode_decrypted(format: PemFormat, der: &[u8], source_name: &str) -> Result<KeyMaterial> {
    format.decode_der(der).map_err(|e| match e {
        Error::MalformedEncoding { .. } => Error::Decryption {
            source_name: source_name.to_string(),
        },
        other => other,
    })
}

pub(crate) fn parse_private_key_named<F>(text: &str, source_name: &str, provider: F) -> Result<KeyMaterial>
where
    F: FnOnce() -> Option<Password>,
{
    let envelope = PemEnvelope::parse(text, source_name)?;
    let body = envelope.decode_payload(source_name)?;

    match envelope.format {
        PemFormat::Pkcs8Encrypted => {
            let password = ask_password(provider, source_name)?;
            let der = pkcs5::decrypt_private_key_info(&body, password.as_bytes(), source_name)?;
            decode_decrypted(envelope.format, &der, source_name)
        }
        format if format.has_headers() => match envelope.header("Proc-Type") {
            None => format.decode_der(&body),
            Some(v) if is_proc_type_encrypted(v) => {
                let dek_info = envelope
                    .header("DEK-Info")
                    .ok_or_else(|| Error::malformed_pem(source_name, "Proc-Type ENCRYPTED without DEK-Info"))?;
                let dek_info = DekInfo::parse(dek_info, source_name)?;
                let password = ask_password(provider, source_name)?;
                let der = dek_info.decrypt(password.as_bytes(), &body, source_name)?;
                decode_decrypted(format, &der, source_name)
            }
            Some(v) => Err(Error::unsupported_format(source_name, format!("Proc-Type {}", v))),
        },
        format => format.decode_der(&body),
    }
}

// Parses the single private key in text. The password provider is called
// at most once, and only when the key is encrypted.
pub fn parse_private_key<F>(text: &str, provider: F) -> Result<KeyMaterial>
where
    F: FnOnce() -> Option<Password>,
{
    parse_private_key_named(text, "PEM input", provider)
}

pub fn read_private_key<P, F>(path: P, provider: F) -> Result<KeyMaterial>
where
    P: AsRef<Path>,
    F: FnOnce() -> Option<Password>,
{
    let path = path.as_ref();
    let text = Zeroizing::new(std::fs::read_to_string(path)?);
    parse_private_key_named(&text, &path.display().to_string(), provider)
}

// The DER contents of every block with the given label, in order.
pub fn decode_blocks(text: &str, label: &str, source_name: &str) -> Result<Vec<Vec<u8>>> {
    let mut lines = text.lines();
    let mut blocks = Vec::new();
    while let Some(line) = lines.next() {
        if begin_label(line.trim(), source_name)? == Some(label) {
            let body = read_body(&mut lines, label, false, source_name)?;
            blocks.push(decode_base64(&body.payload, source_name)?.to_vec());
        }
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::key::{KeyAlgorithm, NamedCurve};

    fn fixture(name: &str) -> String {
        let path = format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), name);
        std::fs::read_to_string(&path).unwrap()
    }

    fn with_password() -> impl FnOnce() -> Option<Password> {
        || Some(Password::from("changeit"))
    }

    fn no_password() -> impl FnOnce() -> Option<Password> {
        || panic!("password requested for an unencrypted key")
    }

    fn load(name: &str) -> KeyMaterial {
        let _ = env_logger::builder().is_test(true).try_init();
        let text = fixture(name);
        if text.contains("ENCRYPTED") {
            parse_private_key(&text, with_password()).unwrap()
        } else {
            parse_private_key(&text, no_password()).unwrap()
        }
    }

    #[test]
    fn test_rsa_fixtures_agree() {
        let reference = load("rsa_pkcs1.pem");
        assert_eq!(reference.algorithm(), KeyAlgorithm::Rsa);
        for name in ["rsa_pkcs8.pem", "rsa_pkcs1_aes128.pem", "rsa_pkcs1_des3.pem", "rsa_pkcs1_des.pem", "rsa_pkcs8_aes256.pem"] {
            assert_eq!(load(name), reference, "{}", name);
        }
    }

    #[test]
    fn test_dsa_fixtures_agree() {
        let reference = load("dsa_openssl.pem");
        assert_eq!(reference.algorithm(), KeyAlgorithm::Dsa);
        for name in ["dsa_with_params.pem", "dsa_openssl_aes256.pem", "dsa_pkcs8.pem"] {
            assert_eq!(load(name), reference, "{}", name);
        }
    }

    #[test]
    fn test_ec_fixtures_agree() {
        let reference = load("ec_openssl.pem");
        let KeyMaterial::Ec(ec) = &reference else {
            panic!("not an EC key");
        };
        assert_eq!(ec.curve, NamedCurve::Secp256r1);
        assert_eq!(ec.private_scalar.len(), 32);
        for name in ["ec_with_params.pem", "ec_openssl_aes192.pem"] {
            assert_eq!(load(name), reference, "{}", name);
        }
        // PKCS#8 output of openssl keeps the public point too
        let KeyMaterial::Ec(p8) = load("ec_pkcs8.pem") else {
            panic!("not an EC key");
        };
        assert_eq!(p8.private_scalar, ec.private_scalar);
        assert_eq!(p8.curve, ec.curve);

        let KeyMaterial::Ec(ec384) = load("ec384_openssl.pem") else {
            panic!("not an EC key");
        };
        assert_eq!(ec384.curve, NamedCurve::Secp384r1);
    }

    #[test]
    fn test_public_point_matches_derived() {
        let KeyMaterial::Ec(ec) = load("ec_openssl.pem") else {
            panic!("not an EC key");
        };
        let stored = ec.public_point.clone().unwrap();
        let derived = KeyMaterial::Ec(crate::key::EcKey {
            public_point: None,
            ..ec
        })
        .public_key_info()
        .unwrap();
        assert_eq!(derived.key_bits(), stored.as_slice());
    }

    #[test]
    fn test_provider_called_once_only_when_encrypted() {
        let calls = Cell::new(0);
        let provider = || {
            calls.set(calls.get() + 1);
            Some(Password::from("changeit"))
        };
        parse_private_key(&fixture("rsa_pkcs8_aes256.pem"), provider).unwrap();
        assert_eq!(calls.get(), 1);

        let provider = || {
            calls.set(calls.get() + 1);
            None
        };
        parse_private_key(&fixture("rsa_pkcs8.pem"), provider).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_missing_password() {
        for name in ["rsa_pkcs1_aes128.pem", "rsa_pkcs8_aes256.pem"] {
            assert!(matches!(
                parse_private_key(&fixture(name), || None),
                Err(Error::MissingPassword { .. })
            ));
        }
    }

    #[test]
    fn test_wrong_password() {
        let r = parse_private_key(&fixture("rsa_pkcs1_aes128.pem"), || Some(Password::from("wrong")));
        assert!(matches!(r, Err(Error::Decryption { .. })), "{:?}", r);
        let r = parse_private_key(&fixture("ec_openssl_aes192.pem"), || Some(Password::from("wrong")));
        assert!(matches!(r, Err(Error::Decryption { .. })), "{:?}", r);
    }

    #[test]
    fn test_pbes2_des3_refused() {
        match parse_private_key(&fixture("rsa_pkcs8_des3.pem"), with_password()) {
            Err(Error::UnsupportedAlgorithm { oid, name, .. }) => {
                assert_eq!(oid.as_deref(), Some("1.2.840.113549.3.7"));
                assert_eq!(name.as_deref(), Some("DES-EDE3-CBC"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_begin_line() {
        assert!(matches!(
            parse_private_key("just some text\n", no_password()),
            Err(Error::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            parse_private_key("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n", no_password()),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_footer_mismatch() {
        let text = fixture("rsa_pkcs1.pem").replace("END RSA PRIVATE KEY", "END EC PRIVATE KEY");
        assert!(matches!(parse_private_key(&text, no_password()), Err(Error::MalformedPem { .. })));
        let text = fixture("rsa_pkcs1.pem").replace("-----END RSA PRIVATE KEY-----", "");
        assert!(matches!(parse_private_key(&text, no_password()), Err(Error::MalformedPem { .. })));
    }

    #[test]
    fn test_parameters_without_key() {
        let text = "-----BEGIN EC PARAMETERS-----\nBggqhkjOPQMBBw==\n-----END EC PARAMETERS-----\n";
        assert!(matches!(parse_private_key(text, no_password()), Err(Error::MalformedPem { .. })));

        let text = "-----BEGIN EC PARAMETERS-----\nBggqhkjOPQMBBw==\n";
        assert!(matches!(parse_private_key(text, no_password()), Err(Error::MalformedPem { .. })));

        let text = fixture("ec_with_params.pem").replace("BEGIN EC PRIVATE KEY", "BEGIN RSA PRIVATE KEY");
        assert!(matches!(parse_private_key(&text, no_password()), Err(Error::MalformedPem { .. })));
    }

    #[test]
    fn test_encrypted_without_dek_info() {
        let text = fixture("rsa_pkcs1_aes128.pem")
            .lines()
            .filter(|l| !l.starts_with("DEK-Info"))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(matches!(parse_private_key(&text, with_password()), Err(Error::MalformedPem { .. })));
    }

    #[test]
    fn test_unknown_dek_cipher() {
        let text = fixture("rsa_pkcs1_aes128.pem").replace("AES-128-CBC", "BF-CBC");
        match parse_private_key(&text, with_password()) {
            Err(Error::UnsupportedAlgorithm { name, .. }) => assert_eq!(name.as_deref(), Some("BF-CBC")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_header_order_and_case() {
        let text = fixture("rsa_pkcs1_aes128.pem");
        let mut lines: Vec<&str> = text.lines().collect();
        lines.swap(1, 2);
        let swapped = lines.join("\n").replace("Proc-Type", "proc-type");
        let envelope = PemEnvelope::parse(&swapped, "swapped").unwrap();
        assert_eq!(envelope.headers[0].0, "DEK-Info");
        assert!(envelope.is_encrypted());
        assert_eq!(parse_private_key(&swapped, with_password()).unwrap(), load("rsa_pkcs1.pem"));
    }

    #[test]
    fn test_read_private_key_path_in_errors() {
        let path = format!("{}/testdata/rsa_pkcs1_aes128.pem", env!("CARGO_MANIFEST_DIR"));
        match read_private_key(&path, || None) {
            Err(Error::MissingPassword { source_name }) => assert!(source_name.ends_with("rsa_pkcs1_aes128.pem")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            read_private_key("/nonexistent/key.pem", || None),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_decode_blocks() {
        let ca = fixture("ca.pem");
        let blocks = decode_blocks(&ca, "CERTIFICATE", "ca.pem").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0][0], 0x30);
        assert!(decode_blocks(&ca, "PRIVATE KEY", "ca.pem").unwrap().is_empty());
    }
}
