use std::io;

use thiserror;

use crate::cryptobyte::{self, asn1::ObjectIdentifier};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed PEM in {source_name}: {reason}")]
    MalformedPem { source_name: String, reason: String },

    #[error("unsupported format in {source_name}: {reason}")]
    UnsupportedFormat { source_name: String, reason: String },

    #[error("unsupported {stage} algorithm {}", describe(.oid, .name))]
    UnsupportedAlgorithm {
        stage: &'static str,
        oid: Option<String>,
        name: Option<String>,
    },

    #[error("{source_name} is encrypted but no password was supplied")]
    MissingPassword { source_name: String },

    #[error("issuer certificate {subject} is not a CA")]
    InvalidCaCertificate { subject: String },

    #[error("issuer key does not match certificate {subject}")]
    IssuerKeyMismatch { subject: String },

    #[error("invalid {what}: {reason}")]
    InvalidInput { what: &'static str, reason: String },

    #[error("invalid {what}: want {want} bytes, got {got}")]
    InvalidKeyOrNonce { what: &'static str, want: usize, got: usize },

    #[error("malformed DER in {stage}: {source}")]
    MalformedEncoding {
        stage: &'static str,
        #[source]
        source: cryptobyte::Error,
    },

    #[error("cannot decrypt {source_name}: bad password or corrupt data")]
    Decryption { source_name: String },

    #[error("ciphertext authentication failed")]
    AuthenticationFailed,

    #[error("{algorithm} signature does not verify")]
    BadSignature { algorithm: &'static str },

    #[error("signing with {algorithm} failed: {reason}")]
    Signing { algorithm: &'static str, reason: String },

    #[error("cannot write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn describe(oid: &Option<String>, name: &Option<String>) -> String {
    match (oid, name) {
        (Some(oid), Some(name)) => format!("{name} [{oid}]"),
        (Some(oid), None) => format!("[{oid}]"),
        (None, Some(name)) => name.clone(),
        (None, None) => "<unknown>".to_string(),
    }
}

impl Error {
    pub(crate) fn malformed_pem(source_name: &str, reason: impl Into<String>) -> Error {
        Error::MalformedPem {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported_format(source_name: &str, reason: impl Into<String>) -> Error {
        Error::UnsupportedFormat {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    // An algorithm identified by OID, named from the lookup table when known.
    pub(crate) fn unsupported_oid(stage: &'static str, oid: &ObjectIdentifier, name: Option<&str>) -> Error {
        Error::UnsupportedAlgorithm {
            stage,
            oid: Some(oid.to_string()),
            name: name.map(str::to_string),
        }
    }

    pub(crate) fn invalid_input(what: &'static str, reason: impl Into<String>) -> Error {
        Error::InvalidInput {
            what,
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported_name(stage: &'static str, name: impl Into<String>) -> Error {
        Error::UnsupportedAlgorithm {
            stage,
            oid: None,
            name: Some(name.into()),
        }
    }
}

// Attaches the stage name to a DER level error.
pub(crate) trait DerContext<T> {
    fn der_context(self, stage: &'static str) -> Result<T>;
}

impl<T> DerContext<T> for cryptobyte::Result<T> {
    fn der_context(self, stage: &'static str) -> Result<T> {
        self.map_err(|source| Error::MalformedEncoding { stage, source })
    }
}

pub type Result<T> = core::result::Result<T, Error>;
