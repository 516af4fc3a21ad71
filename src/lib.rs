//! Key material and certificate plumbing.
//!
//! - [`cryptobyte`]: a small ASN.1 DER parser and builder.
//! - [`pem`]: PEM envelopes, including OpenSSL's legacy `Proc-Type`/`DEK-Info`
//!   encryption and PKCS#8 (plain, PBES1 and PBES2).
//! - [`key`]: decoded private keys, their public halves and signing.
//! - [`x509`]: issuing X.509v3 certificates and bundling them with their key.
//! - [`stream`]: ChaCha20-Poly1305 over `std::io::Read` streams.
//! - [`random`]: certificate serials and random secrets.

#![allow(clippy::new_without_default)]

// Require the `logging` feature to get anything out of the crate, otherwise
// the macros below turn every log statement into nothing.
#[cfg(feature = "logging")]
use log;

#[cfg(not(feature = "logging"))]
#[allow(unused_macros, unused_imports)]
mod log {
    macro_rules! trace    ( ($($tt:tt)*) => {{}} );
    macro_rules! debug    ( ($($tt:tt)*) => {{}} );
    macro_rules! warn     ( ($($tt:tt)*) => {{}} );
    pub(crate) use {debug, trace, warn};
}

pub mod blockmode;
pub mod cryptobyte;
pub mod key;
pub mod pbe;
pub mod pem;
pub mod random;
pub mod stream;
pub mod traits;
pub mod x509;

mod error;

pub use error::{Error, Result};
pub use key::KeyMaterial;
pub use pem::{Password, parse_private_key, read_private_key};
pub use stream::{CipherReader, CipherSession, decrypt, derive_key_or_nonce, encrypt};
pub use x509::{CertificateRequest, X509Cert, sign_certificate};
