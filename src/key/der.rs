use num::BigUint;
use zeroize::Zeroizing;

use super::{DsaKey, EcKey, KeyAlgorithm, KeyMaterial, NamedCurve, RsaKey, public};
use crate::cryptobyte::asn1::{BitString, ObjectIdentifier};
use crate::cryptobyte::oid::algorithm_name;
use crate::cryptobyte::{self, Builder, Parser, Tag};
use crate::error::DerContext;
use crate::log::trace;
use crate::{Error, Result};

const PKCS8: &str = "PKCS#8 PrivateKeyInfo";
const PKCS1: &str = "PKCS#1 RSAPrivateKey";
const DSA: &str = "DSA private key";
const SEC1: &str = "SEC1 ECPrivateKey";

fn expect_version(p: &mut Parser, allowed: &[i64], stage: &'static str) -> Result<i64> {
    let v = p.read_asn1_i64().der_context(stage)?;
    if !allowed.contains(&v) {
        return Err(cryptobyte::Error::ASN1IntegerOutOfRange).der_context(stage);
    }
    Ok(v)
}

// PrivateKeyInfo ::= SEQUENCE {
//     version             INTEGER,
//     privateKeyAlgorithm AlgorithmIdentifier,
//     privateKey          OCTET STRING,
//     attributes      [0] IMPLICIT Attributes OPTIONAL,
//     publicKey       [1] IMPLICIT BIT STRING OPTIONAL }
pub(super) fn parse_private_key_info(der: &[u8]) -> Result<KeyMaterial> {
    let mut outer = Parser::new(der);
    let mut info = outer.read_asn1_sequence().der_context(PKCS8)?;
    outer.finish().der_context(PKCS8)?;

    expect_version(&mut info, &[0, 1], PKCS8)?;
    let mut alg = info.read_asn1_sequence().der_context(PKCS8)?;
    let oid = alg.read_asn1_object_identifier().der_context(PKCS8)?;
    let private_key = info.read_asn1_octet_string().der_context(PKCS8)?;
    info.read_optional_asn1(Tag::context_constructed(0)).der_context(PKCS8)?;
    info.read_optional_asn1(Tag::context(1)).der_context(PKCS8)?;
    info.finish().der_context(PKCS8)?;

    let algorithm = KeyAlgorithm::from_oid(&oid)
        .ok_or_else(|| Error::unsupported_oid("private key", &oid, algorithm_name(&oid)))?;
    trace!("PKCS#8 key algorithm {}", algorithm);

    match algorithm {
        KeyAlgorithm::Rsa => {
            // parameters are NULL or absent
            if !alg.empty() {
                alg.read_asn1_null().der_context(PKCS8)?;
            }
            parse_rsa_private_key(private_key).map(KeyMaterial::Rsa)
        }
        KeyAlgorithm::Dsa => {
            let mut params = alg.read_asn1_sequence().der_context("Dss-Parms")?;
            let p = params.read_asn1_biguint().der_context("Dss-Parms")?;
            let q = params.read_asn1_biguint().der_context("Dss-Parms")?;
            let g = params.read_asn1_biguint().der_context("Dss-Parms")?;
            params.finish().der_context("Dss-Parms")?;

            let mut inner = Parser::new(private_key);
            let x = inner.read_asn1_biguint().der_context(DSA)?;
            inner.finish().der_context(DSA)?;
            Ok(KeyMaterial::Dsa(DsaKey { p, q, g, x }))
        }
        KeyAlgorithm::Ec => {
            let curve = read_named_curve(&mut alg)?;
            parse_ec_private_key(private_key, Some(curve)).map(KeyMaterial::Ec)
        }
    }
}

// ECParameters must be a namedCurve; explicit curve parameters are refused.
fn read_named_curve(p: &mut Parser) -> Result<NamedCurve> {
    match p.peek_tag() {
        Some(cryptobyte::OBJECT_IDENTIFIER) => {
            let oid = p.read_asn1_object_identifier().der_context("ECParameters")?;
            curve_from_oid(&oid)
        }
        Some(cryptobyte::SEQUENCE) => Err(Error::unsupported_name("EC curve", "explicit curve parameters")),
        _ => Err(cryptobyte::Error::ASN1InvalidOid).der_context("ECParameters"),
    }
}

fn curve_from_oid(oid: &ObjectIdentifier) -> Result<NamedCurve> {
    NamedCurve::from_oid(oid).ok_or_else(|| Error::unsupported_oid("EC curve", oid, None))
}

// RSAPrivateKey ::= SEQUENCE {
//     version Version, modulus, publicExponent, privateExponent,
//     prime1, prime2, exponent1, exponent2, coefficient,
//     otherPrimeInfos OtherPrimeInfos OPTIONAL }
pub(super) fn parse_rsa_private_key(der: &[u8]) -> Result<RsaKey> {
    let mut outer = Parser::new(der);
    let mut p = outer.read_asn1_sequence().der_context(PKCS1)?;
    outer.finish().der_context(PKCS1)?;

    let version = p.read_asn1_i64().der_context(PKCS1)?;
    match version {
        0 => {}
        1 => return Err(Error::unsupported_name("RSA", "multi-prime RSA")),
        _ => return Err(cryptobyte::Error::ASN1IntegerOutOfRange).der_context(PKCS1),
    }

    let mut next = || p.read_asn1_biguint().der_context(PKCS1);
    let key = RsaKey {
        modulus: next()?,
        public_exponent: next()?,
        private_exponent: next()?,
        prime1: next()?,
        prime2: next()?,
        exponent1: next()?,
        exponent2: next()?,
        coefficient: next()?,
    };
    p.finish().der_context(PKCS1)?;
    Ok(key)
}

// OpenSSL's DSAPrivateKey ::= SEQUENCE { version 0, p, q, g, y, x }
pub(super) fn parse_openssl_dsa_private_key(der: &[u8]) -> Result<DsaKey> {
    let mut outer = Parser::new(der);
    let mut s = outer.read_asn1_sequence().der_context(DSA)?;
    outer.finish().der_context(DSA)?;

    expect_version(&mut s, &[0], DSA)?;
    let p = s.read_asn1_biguint().der_context(DSA)?;
    let q = s.read_asn1_biguint().der_context(DSA)?;
    let g = s.read_asn1_biguint().der_context(DSA)?;
    let _y = s.read_asn1_biguint().der_context(DSA)?;
    let x = s.read_asn1_biguint().der_context(DSA)?;
    s.finish().der_context(DSA)?;
    Ok(DsaKey { p, q, g, x })
}

// ECPrivateKey ::= SEQUENCE {
//     version        INTEGER { ecPrivkeyVer1(1) },
//     privateKey     OCTET STRING,
//     parameters [0] ECParameters OPTIONAL,
//     publicKey  [1] BIT STRING OPTIONAL }
//
// outer_curve comes from the PKCS#8 AlgorithmIdentifier, when wrapped.
pub(super) fn parse_ec_private_key(der: &[u8], outer_curve: Option<NamedCurve>) -> Result<EcKey> {
    let mut outer = Parser::new(der);
    let mut s = outer.read_asn1_sequence().der_context(SEC1)?;
    outer.finish().der_context(SEC1)?;

    expect_version(&mut s, &[1], SEC1)?;
    let private_scalar = Zeroizing::new(s.read_asn1_octet_string().der_context(SEC1)?.to_vec());

    let inner_curve = match s.read_optional_explicit(0).der_context(SEC1)? {
        Some(mut params) => Some(read_named_curve(&mut params)?),
        None => None,
    };
    let public_point = match s.read_optional_explicit(1).der_context(SEC1)? {
        Some(mut bits) => {
            let bits = bits.read_asn1_bit_string().der_context(SEC1)?;
            if bits.padding_bits() != 0 {
                return Err(cryptobyte::Error::ASN1InvalidBitStringPadding).der_context(SEC1);
            }
            Some(bits.as_slice().to_vec())
        }
        None => None,
    };
    s.finish().der_context(SEC1)?;

    let curve = match (inner_curve, outer_curve) {
        (Some(inner), Some(outer)) if inner != outer => {
            return Err(cryptobyte::Error::ASN1InvalidOid).der_context("ECParameters");
        }
        (Some(c), _) | (None, Some(c)) => c,
        (None, None) => return Err(cryptobyte::Error::ASN1InvalidOid).der_context("ECParameters"),
    };

    Ok(EcKey {
        private_scalar,
        curve,
        public_point,
    })
}

fn add_rsa_private_key(b: &mut Builder, k: &RsaKey) {
    b.add_asn1_sequence(|b| {
        b.add_asn1_u64(0);
        b.add_asn1_biguint(&k.modulus);
        b.add_asn1_biguint(&k.public_exponent);
        b.add_asn1_biguint(&k.private_exponent);
        b.add_asn1_biguint(&k.prime1);
        b.add_asn1_biguint(&k.prime2);
        b.add_asn1_biguint(&k.exponent1);
        b.add_asn1_biguint(&k.exponent2);
        b.add_asn1_biguint(&k.coefficient);
    });
}

// with_curve is false inside PKCS#8, where the AlgorithmIdentifier names it.
fn add_ec_private_key(b: &mut Builder, k: &EcKey, with_curve: bool) {
    let point = k.public_point.clone().or_else(|| public::ec_public_point(k).ok());
    b.add_asn1_sequence(|b| {
        b.add_asn1_u64(1);
        b.add_asn1_octet_string(&k.private_scalar);
        if with_curve {
            b.add_asn1_explicit(0, |b| b.add_asn1_object_identifier(&k.curve.oid()));
        }
        if let Some(point) = &point {
            b.add_asn1_explicit(1, |b| b.add_asn1_bit_string(&BitString::from_bytes(point.as_slice())));
        }
    });
}

fn encode_inner(mut f: impl FnMut(&mut Builder), stage: &'static str) -> Result<Zeroizing<Vec<u8>>> {
    let mut b = Builder::new(Vec::new());
    f(&mut b);
    b.take().map(Zeroizing::new).der_context(stage)
}

pub(super) fn encode_private_key_info(key: &KeyMaterial) -> Result<Vec<u8>> {
    let private_key = match key {
        KeyMaterial::Rsa(k) => encode_inner(|b| add_rsa_private_key(b, k), PKCS1)?,
        KeyMaterial::Dsa(k) => encode_inner(|b| b.add_asn1_biguint(&k.x), DSA)?,
        KeyMaterial::Ec(k) => encode_inner(|b| add_ec_private_key(b, k, false), SEC1)?,
    };

    let mut b = Builder::new(Vec::with_capacity(private_key.len() + 32));
    b.add_asn1_sequence(|b| {
        b.add_asn1_u64(0);
        b.add_asn1_sequence(|b| {
            b.add_asn1_object_identifier(&key.algorithm().oid());
            match key {
                KeyMaterial::Rsa(_) => b.add_asn1_null(),
                KeyMaterial::Dsa(k) => add_dss_parms(b, &k.p, &k.q, &k.g),
                KeyMaterial::Ec(k) => b.add_asn1_object_identifier(&k.curve.oid()),
            }
        });
        b.add_asn1_octet_string(&private_key);
    });
    b.take().der_context(PKCS8)
}

pub(super) fn add_dss_parms(b: &mut Builder, p: &BigUint, q: &BigUint, g: &BigUint) {
    b.add_asn1_sequence(|b| {
        b.add_asn1_biguint(p);
        b.add_asn1_biguint(q);
        b.add_asn1_biguint(g);
    });
}

pub(super) fn encode_traditional(key: &KeyMaterial) -> Result<Vec<u8>> {
    let mut b = Builder::new(Vec::new());
    let stage = match key {
        KeyMaterial::Rsa(k) => {
            add_rsa_private_key(&mut b, k);
            PKCS1
        }
        KeyMaterial::Dsa(k) => {
            let y = public::dsa_public_value(k);
            b.add_asn1_sequence(|b| {
                b.add_asn1_u64(0);
                b.add_asn1_biguint(&k.p);
                b.add_asn1_biguint(&k.q);
                b.add_asn1_biguint(&k.g);
                b.add_asn1_biguint(&y);
                b.add_asn1_biguint(&k.x);
            });
            DSA
        }
        KeyMaterial::Ec(k) => {
            add_ec_private_key(&mut b, k, true);
            SEC1
        }
    };
    b.take().der_context(stage)
}
