// Decoded private keys.
//
// KeyMaterial is what the PEM layer hands out and what the certificate
// builder signs with. Decoding and encoding of the DER structures lives in
// der.rs, the public half in public.rs and signing in sign.rs.

mod curve;
mod der;
mod public;
mod sign;

pub use curve::NamedCurve;
pub use public::SubjectPublicKeyInfo;
pub use sign::{SignatureAlgorithm, verify_signature};

use core::fmt;

use num::BigUint;
use zeroize::Zeroizing;

use crate::cryptobyte::asn1::ObjectIdentifier;
use crate::cryptobyte::oid::{OidPublicKeyDSA, OidPublicKeyECDSA, OidPublicKeyRSA};
use crate::traits::{MarshalAsn1, UnmarshalAsn1};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa,
    Dsa,
    Ec,
}

impl KeyAlgorithm {
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<KeyAlgorithm> {
        if *oid == OidPublicKeyRSA {
            Some(KeyAlgorithm::Rsa)
        } else if *oid == OidPublicKeyDSA {
            Some(KeyAlgorithm::Dsa)
        } else if *oid == OidPublicKeyECDSA {
            Some(KeyAlgorithm::Ec)
        } else {
            None
        }
    }

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            KeyAlgorithm::Rsa => OidPublicKeyRSA,
            KeyAlgorithm::Dsa => OidPublicKeyDSA,
            KeyAlgorithm::Ec => OidPublicKeyECDSA,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Dsa => "DSA",
            KeyAlgorithm::Ec => "EC",
        })
    }
}

// RSAPrivateKey components (two-prime only).
#[derive(Clone, PartialEq, Eq)]
pub struct RsaKey {
    pub modulus: BigUint,
    pub public_exponent: BigUint,
    pub private_exponent: BigUint,
    pub prime1: BigUint,
    pub prime2: BigUint,
    pub exponent1: BigUint,
    pub exponent2: BigUint,
    pub coefficient: BigUint,
}

#[derive(Clone, PartialEq, Eq)]
pub struct DsaKey {
    pub p: BigUint,
    pub q: BigUint,
    pub g: BigUint,
    pub x: BigUint,
}

#[derive(Clone, PartialEq, Eq)]
pub struct EcKey {
    pub private_scalar: Zeroizing<Vec<u8>>,
    pub curve: NamedCurve,
    // uncompressed or compressed SEC1 point, when the encoding carried one
    pub public_point: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Rsa(RsaKey),
    Dsa(DsaKey),
    Ec(EcKey),
}

// Private components are never printed.
impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("bits", &self.modulus.bits())
            .field("public_exponent", &self.public_exponent)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for DsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsaKey")
            .field("p_bits", &self.p.bits())
            .field("q_bits", &self.q.bits())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for EcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcKey")
            .field("curve", &self.curve)
            .field("public_point", &self.public_point.as_ref().map(hex::encode))
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Rsa(k) => k.fmt(f),
            KeyMaterial::Dsa(k) => k.fmt(f),
            KeyMaterial::Ec(k) => k.fmt(f),
        }
    }
}

impl KeyMaterial {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            KeyMaterial::Rsa(_) => KeyAlgorithm::Rsa,
            KeyMaterial::Dsa(_) => KeyAlgorithm::Dsa,
            KeyMaterial::Ec(_) => KeyAlgorithm::Ec,
        }
    }

    // A new RSA key of the given modulus size (2048 to 8192 bits).
    pub fn generate_rsa(bits: usize) -> Result<KeyMaterial> {
        sign::generate_rsa(bits).map(KeyMaterial::Rsa)
    }

    // PKCS#8 PrivateKeyInfo.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<KeyMaterial> {
        der::parse_private_key_info(der)
    }

    // PKCS#1 RSAPrivateKey, as found under "RSA PRIVATE KEY".
    pub fn from_pkcs1_der(der: &[u8]) -> Result<KeyMaterial> {
        der::parse_rsa_private_key(der).map(KeyMaterial::Rsa)
    }

    // OpenSSL's DSA layout, as found under "DSA PRIVATE KEY".
    pub fn from_openssl_dsa_der(der: &[u8]) -> Result<KeyMaterial> {
        der::parse_openssl_dsa_private_key(der).map(KeyMaterial::Dsa)
    }

    // SEC1 ECPrivateKey, as found under "EC PRIVATE KEY".
    pub fn from_sec1_der(der: &[u8]) -> Result<KeyMaterial> {
        der::parse_ec_private_key(der, None).map(KeyMaterial::Ec)
    }

    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        der::encode_private_key_info(self)
    }

    // PKCS#1, OpenSSL DSA or SEC1 depending on the key type.
    pub fn to_traditional_der(&self) -> Result<Vec<u8>> {
        der::encode_traditional(self)
    }

    // The PEM label to_traditional_der output goes under.
    pub fn traditional_pem_label(&self) -> &'static str {
        match self {
            KeyMaterial::Rsa(_) => "RSA PRIVATE KEY",
            KeyMaterial::Dsa(_) => "DSA PRIVATE KEY",
            KeyMaterial::Ec(_) => "EC PRIVATE KEY",
        }
    }

    pub fn public_key_info(&self) -> Result<SubjectPublicKeyInfo> {
        public::public_key_info(self)
    }

    pub fn sign(&self, algorithm: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
        sign::sign(self, algorithm, message)
    }
}

impl MarshalAsn1 for KeyMaterial {
    type Error = Error;

    fn marshal_asn1(&self) -> Result<Vec<u8>> {
        self.to_pkcs8_der()
    }
}

impl UnmarshalAsn1 for KeyMaterial {
    type Error = Error;

    fn unmarshal_asn1(data: &[u8]) -> Result<Self> {
        KeyMaterial::from_pkcs8_der(data)
    }
}
