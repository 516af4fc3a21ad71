use core::fmt;
use core::str::FromStr;

use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use signature::{DigestSigner, DigestVerifier, SignatureEncoding, Signer, Verifier};

use super::public::fixed_scalar;
use super::{DsaKey, EcKey, KeyAlgorithm, KeyMaterial, NamedCurve, RsaKey, SubjectPublicKeyInfo};
use crate::cryptobyte::asn1::ObjectIdentifier;
use crate::cryptobyte::oid::*;
use crate::cryptobyte::{Builder, Parser};
use crate::error::DerContext;
use crate::log::trace;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Sha256WithRsa,
    Sha384WithRsa,
    Sha512WithRsa,
    Sha256WithDsa,
    Sha256WithEcdsa,
    Sha384WithEcdsa,
    Sha512WithEcdsa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashKind {
    Sha256,
    Sha384,
    Sha512,
}

impl HashKind {
    fn digest(self, message: &[u8]) -> Vec<u8> {
        match self {
            HashKind::Sha256 => Sha256::digest(message).to_vec(),
            HashKind::Sha384 => Sha384::digest(message).to_vec(),
            HashKind::Sha512 => Sha512::digest(message).to_vec(),
        }
    }
}

const ALGORITHMS: &[(SignatureAlgorithm, ObjectIdentifier, &str)] = &[
    (SignatureAlgorithm::Sha256WithRsa, OidSignatureSHA256WithRSA, "SHA256withRSA"),
    (SignatureAlgorithm::Sha384WithRsa, OidSignatureSHA384WithRSA, "SHA384withRSA"),
    (SignatureAlgorithm::Sha512WithRsa, OidSignatureSHA512WithRSA, "SHA512withRSA"),
    (SignatureAlgorithm::Sha256WithDsa, OidSignatureDSAWithSHA256, "SHA256withDSA"),
    (SignatureAlgorithm::Sha256WithEcdsa, OidSignatureECDSAWithSHA256, "SHA256withECDSA"),
    (SignatureAlgorithm::Sha384WithEcdsa, OidSignatureECDSAWithSHA384, "SHA384withECDSA"),
    (SignatureAlgorithm::Sha512WithEcdsa, OidSignatureECDSAWithSHA512, "SHA512withECDSA"),
];

impl SignatureAlgorithm {
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<SignatureAlgorithm> {
        ALGORITHMS.iter().find(|(_, o, _)| o == oid).map(|(a, _, _)| *a)
    }

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRsa => OidSignatureSHA256WithRSA,
            SignatureAlgorithm::Sha384WithRsa => OidSignatureSHA384WithRSA,
            SignatureAlgorithm::Sha512WithRsa => OidSignatureSHA512WithRSA,
            SignatureAlgorithm::Sha256WithDsa => OidSignatureDSAWithSHA256,
            SignatureAlgorithm::Sha256WithEcdsa => OidSignatureECDSAWithSHA256,
            SignatureAlgorithm::Sha384WithEcdsa => OidSignatureECDSAWithSHA384,
            SignatureAlgorithm::Sha512WithEcdsa => OidSignatureECDSAWithSHA512,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256WithRsa => "SHA256withRSA",
            SignatureAlgorithm::Sha384WithRsa => "SHA384withRSA",
            SignatureAlgorithm::Sha512WithRsa => "SHA512withRSA",
            SignatureAlgorithm::Sha256WithDsa => "SHA256withDSA",
            SignatureAlgorithm::Sha256WithEcdsa => "SHA256withECDSA",
            SignatureAlgorithm::Sha384WithEcdsa => "SHA384withECDSA",
            SignatureAlgorithm::Sha512WithEcdsa => "SHA512withECDSA",
        }
    }

    pub fn key_algorithm(self) -> KeyAlgorithm {
        match self {
            SignatureAlgorithm::Sha256WithRsa | SignatureAlgorithm::Sha384WithRsa | SignatureAlgorithm::Sha512WithRsa => {
                KeyAlgorithm::Rsa
            }
            SignatureAlgorithm::Sha256WithDsa => KeyAlgorithm::Dsa,
            SignatureAlgorithm::Sha256WithEcdsa
            | SignatureAlgorithm::Sha384WithEcdsa
            | SignatureAlgorithm::Sha512WithEcdsa => KeyAlgorithm::Ec,
        }
    }

    fn hash(self) -> HashKind {
        match self {
            SignatureAlgorithm::Sha256WithRsa
            | SignatureAlgorithm::Sha256WithDsa
            | SignatureAlgorithm::Sha256WithEcdsa => HashKind::Sha256,
            SignatureAlgorithm::Sha384WithRsa | SignatureAlgorithm::Sha384WithEcdsa => HashKind::Sha384,
            SignatureAlgorithm::Sha512WithRsa | SignatureAlgorithm::Sha512WithEcdsa => HashKind::Sha512,
        }
    }

    // SHA-256 in the key's family.
    pub fn default_for(key: &KeyMaterial) -> SignatureAlgorithm {
        match key.algorithm() {
            KeyAlgorithm::Rsa => SignatureAlgorithm::Sha256WithRsa,
            KeyAlgorithm::Dsa => SignatureAlgorithm::Sha256WithDsa,
            KeyAlgorithm::Ec => SignatureAlgorithm::Sha256WithEcdsa,
        }
    }

    // AlgorithmIdentifier; RSA carries explicit NULL parameters (RFC 4055),
    // DSA and ECDSA omit them (RFC 5758).
    pub fn add_algorithm_identifier(self, b: &mut Builder) {
        b.add_asn1_sequence(|b| {
            b.add_asn1_object_identifier(&self.oid());
            if self.key_algorithm() == KeyAlgorithm::Rsa {
                b.add_asn1_null();
            }
        });
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = Error;

    // Java style names, e.g. "SHA256withECDSA", compared case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        ALGORITHMS
            .iter()
            .find(|(_, _, name)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(a, _, _)| *a)
            .ok_or_else(|| Error::unsupported_name("signature", s))
    }
}

fn signing_error(algorithm: SignatureAlgorithm) -> impl Fn(signature::Error) -> Error {
    move |e| Error::Signing {
        algorithm: algorithm.name(),
        reason: e.to_string(),
    }
}

fn rsa_private_key(k: &RsaKey) -> Result<rsa::RsaPrivateKey> {
    let conv = |n: &num::BigUint| rsa::BigUint::from_bytes_be(&n.to_bytes_be());
    rsa::RsaPrivateKey::from_components(
        conv(&k.modulus),
        conv(&k.public_exponent),
        conv(&k.private_exponent),
        vec![conv(&k.prime1), conv(&k.prime2)],
    )
    .map_err(|e| Error::Signing {
        algorithm: "RSA",
        reason: e.to_string(),
    })
}

pub(super) const RSA_MIN_BITS: usize = 2048;
pub(super) const RSA_MAX_BITS: usize = 8192;

// Fresh two-prime RSA key with e = 65537.
pub(super) fn generate_rsa(bits: usize) -> Result<RsaKey> {
    if !(RSA_MIN_BITS..=RSA_MAX_BITS).contains(&bits) {
        return Err(Error::invalid_input(
            "RSA key size",
            format!("{} bits, want {} to {}", bits, RSA_MIN_BITS, RSA_MAX_BITS),
        ));
    }
    let generated = rsa::RsaPrivateKey::new(&mut rsa::rand_core::OsRng, bits).map_err(|e| Error::Signing {
        algorithm: "RSA",
        reason: e.to_string(),
    })?;
    let conv = |n: &rsa::BigUint| num::BigUint::from_bytes_be(&n.to_bytes_be());
    let [p, q] = generated.primes() else {
        return Err(Error::invalid_input("RSA key", "generated key is not two-prime"));
    };
    let (prime1, prime2) = (conv(p), conv(q));
    let private_exponent = conv(generated.d());
    let one = num::BigUint::from(1u8);
    let coefficient = prime2
        .modinv(&prime1)
        .ok_or_else(|| Error::invalid_input("RSA key", "primes are not coprime"))?;
    trace!("generated {} bit RSA key", bits);
    Ok(RsaKey {
        modulus: conv(generated.n()),
        public_exponent: conv(generated.e()),
        exponent1: &private_exponent % (&prime1 - &one),
        exponent2: &private_exponent % (&prime2 - &one),
        private_exponent,
        prime1,
        prime2,
        coefficient,
    })
}

fn dsa_signing_key(k: &DsaKey) -> signature::Result<dsa::SigningKey> {
    let conv = |n: &num::BigUint| dsa::BigUint::from_bytes_be(&n.to_bytes_be());
    let components = dsa::Components::from_components(conv(&k.p), conv(&k.q), conv(&k.g))?;
    let y = k.g.modpow(&k.x, &k.p);
    let verifying = dsa::VerifyingKey::from_components(components, conv(&y))?;
    dsa::SigningKey::from_components(verifying, conv(&k.x))
}

// Dss-Sig-Value ::= SEQUENCE { r INTEGER, s INTEGER }
fn encode_dsa_signature(sig: &dsa::Signature) -> Result<Vec<u8>> {
    let mut b = Builder::new(Vec::new());
    b.add_asn1_sequence(|b| {
        b.add_asn1_unsigned_bytes(&sig.r().to_bytes_be());
        b.add_asn1_unsigned_bytes(&sig.s().to_bytes_be());
    });
    b.take().der_context("Dss-Sig-Value")
}

fn decode_dsa_signature(der: &[u8]) -> Result<dsa::Signature> {
    const STAGE: &str = "Dss-Sig-Value";
    let mut outer = Parser::new(der);
    let mut s = outer.read_asn1_sequence().der_context(STAGE)?;
    outer.finish().der_context(STAGE)?;
    let r = s.read_asn1_biguint().der_context(STAGE)?;
    let sv = s.read_asn1_biguint().der_context(STAGE)?;
    s.finish().der_context(STAGE)?;
    let conv = |n: &num::BigUint| dsa::BigUint::from_bytes_be(&n.to_bytes_be());
    dsa::Signature::from_components(conv(&r), conv(&sv)).map_err(|_| Error::BadSignature {
        algorithm: "SHA256withDSA",
    })
}

fn ecdsa_sign(k: &EcKey, algorithm: SignatureAlgorithm, digest: &[u8]) -> Result<Vec<u8>> {
    let err = signing_error(algorithm);
    match k.curve {
        NamedCurve::Secp256r1 => {
            let d = fixed_scalar(k, 32)?;
            let key = p256::ecdsa::SigningKey::from_bytes(p256::FieldBytes::from_slice(&d)).map_err(&err)?;
            let sig: p256::ecdsa::Signature = key.sign_prehash(digest).map_err(&err)?;
            Ok(sig.to_der().as_bytes().to_vec())
        }
        NamedCurve::Secp384r1 => {
            let d = fixed_scalar(k, 48)?;
            let key = p384::ecdsa::SigningKey::from_bytes(p384::FieldBytes::from_slice(&d)).map_err(&err)?;
            let sig: p384::ecdsa::Signature = key.sign_prehash(digest).map_err(&err)?;
            Ok(sig.to_der().as_bytes().to_vec())
        }
        other => Err(Error::unsupported_oid("ECDSA curve", &other.oid(), Some(other.name()))),
    }
}

// Signs message with the given key; the algorithm's family must match the key.
pub(super) fn sign(key: &KeyMaterial, algorithm: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
    if algorithm.key_algorithm() != key.algorithm() {
        return Err(Error::unsupported_name(
            "signature",
            format!("{} with an {} key", algorithm, key.algorithm()),
        ));
    }
    trace!("signing {} bytes with {}", message.len(), algorithm);

    let err = signing_error(algorithm);
    match key {
        KeyMaterial::Rsa(k) => {
            let private = rsa_private_key(k)?;
            let sig = match algorithm.hash() {
                HashKind::Sha256 => rsa::pkcs1v15::SigningKey::<Sha256>::new(private).try_sign(message),
                HashKind::Sha384 => rsa::pkcs1v15::SigningKey::<Sha384>::new(private).try_sign(message),
                HashKind::Sha512 => rsa::pkcs1v15::SigningKey::<Sha512>::new(private).try_sign(message),
            }
            .map_err(err)?;
            Ok(sig.to_vec())
        }
        KeyMaterial::Dsa(k) => {
            let signer = dsa_signing_key(k).map_err(&err)?;
            let sig = signer
                .try_sign_digest(Sha256::new_with_prefix(message))
                .map_err(&err)?;
            encode_dsa_signature(&sig)
        }
        KeyMaterial::Ec(k) => ecdsa_sign(k, algorithm, &algorithm.hash().digest(message)),
    }
}

fn read_rsa_public_key(spki: &SubjectPublicKeyInfo) -> Result<rsa::RsaPublicKey> {
    const STAGE: &str = "RSAPublicKey";
    let mut outer = Parser::new(spki.key_bits());
    let mut s = outer.read_asn1_sequence().der_context(STAGE)?;
    outer.finish().der_context(STAGE)?;
    let n = s.read_asn1_biguint().der_context(STAGE)?;
    let e = s.read_asn1_biguint().der_context(STAGE)?;
    s.finish().der_context(STAGE)?;
    let conv = |n: &num::BigUint| rsa::BigUint::from_bytes_be(&n.to_bytes_be());
    rsa::RsaPublicKey::new(conv(&n), conv(&e)).map_err(|e| Error::unsupported_name("RSA public key", e.to_string()))
}

fn read_dsa_public_key(spki: &SubjectPublicKeyInfo) -> Result<dsa::VerifyingKey> {
    const STAGE: &str = "DSA public key";
    let params = spki
        .parameters()
        .ok_or(crate::cryptobyte::Error::ASN1InvalidLength { want: 1, got: 0 })
        .der_context(STAGE)?;
    let mut outer = Parser::new(params);
    let mut s = outer.read_asn1_sequence().der_context(STAGE)?;
    let conv = |n: &num::BigUint| dsa::BigUint::from_bytes_be(&n.to_bytes_be());
    let p = s.read_asn1_biguint().der_context(STAGE)?;
    let q = s.read_asn1_biguint().der_context(STAGE)?;
    let g = s.read_asn1_biguint().der_context(STAGE)?;
    let y = Parser::new(spki.key_bits()).read_asn1_biguint().der_context(STAGE)?;
    let bad = |_| Error::BadSignature {
        algorithm: "SHA256withDSA",
    };
    let components = dsa::Components::from_components(conv(&p), conv(&q), conv(&g)).map_err(bad)?;
    dsa::VerifyingKey::from_components(components, conv(&y)).map_err(bad)
}

// Verifies signature over message against a SubjectPublicKeyInfo.
pub fn verify_signature(
    spki: &SubjectPublicKeyInfo,
    algorithm: SignatureAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    if spki.key_algorithm() != Some(algorithm.key_algorithm()) {
        return Err(Error::unsupported_oid(
            "signature",
            &spki.algorithm_oid(),
            Some(algorithm.name()),
        ));
    }
    let bad = |_: signature::Error| Error::BadSignature {
        algorithm: algorithm.name(),
    };

    match algorithm.key_algorithm() {
        KeyAlgorithm::Rsa => {
            let public = read_rsa_public_key(spki)?;
            let sig = rsa::pkcs1v15::Signature::try_from(signature).map_err(bad)?;
            match algorithm.hash() {
                HashKind::Sha256 => rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public).verify(message, &sig),
                HashKind::Sha384 => rsa::pkcs1v15::VerifyingKey::<Sha384>::new(public).verify(message, &sig),
                HashKind::Sha512 => rsa::pkcs1v15::VerifyingKey::<Sha512>::new(public).verify(message, &sig),
            }
            .map_err(bad)
        }
        KeyAlgorithm::Dsa => {
            let public = read_dsa_public_key(spki)?;
            let sig = decode_dsa_signature(signature)?;
            public
                .verify_digest(Sha256::new_with_prefix(message), &sig)
                .map_err(bad)
        }
        KeyAlgorithm::Ec => {
            let digest = algorithm.hash().digest(message);
            match spki.curve() {
                Some(NamedCurve::Secp256r1) => {
                    let public = p256::ecdsa::VerifyingKey::from_sec1_bytes(spki.key_bits()).map_err(bad)?;
                    let sig = p256::ecdsa::Signature::from_der(signature).map_err(bad)?;
                    public.verify_prehash(&digest, &sig).map_err(bad)
                }
                Some(NamedCurve::Secp384r1) => {
                    let public = p384::ecdsa::VerifyingKey::from_sec1_bytes(spki.key_bits()).map_err(bad)?;
                    let sig = p384::ecdsa::Signature::from_der(signature).map_err(bad)?;
                    public.verify_prehash(&digest, &sig).map_err(bad)
                }
                Some(other) => Err(Error::unsupported_oid("ECDSA curve", &other.oid(), Some(other.name()))),
                None => Err(Error::unsupported_name("ECDSA curve", "unnamed")),
            }
        }
    }
}
