use num::BigUint;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use sha1::{Digest, Sha1};

use super::{DsaKey, EcKey, KeyAlgorithm, KeyMaterial, NamedCurve, der::add_dss_parms};
use crate::cryptobyte::asn1::{BitString, ObjectIdentifier};
use crate::cryptobyte::{self, Builder, Parser};
use crate::error::DerContext;
use crate::{Error, Result};

const SPKI: &str = "SubjectPublicKeyInfo";

// SubjectPublicKeyInfo ::= SEQUENCE {
//     algorithm        AlgorithmIdentifier,
//     subjectPublicKey BIT STRING }
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPublicKeyInfo {
    der: Vec<u8>,
    algorithm: ObjectIdentifier,
    // DER of the AlgorithmIdentifier parameters, if any
    parameters: Option<Vec<u8>>,
    public_key: BitString,
}

impl SubjectPublicKeyInfo {
    pub fn from_der(der: &[u8]) -> Result<SubjectPublicKeyInfo> {
        let mut outer = Parser::new(der);
        let spki = outer.read_asn1_element(cryptobyte::SEQUENCE).der_context(SPKI)?;
        outer.finish().der_context(SPKI)?;

        let mut body = spki.parser();
        let mut alg = body.read_asn1_sequence().der_context(SPKI)?;
        let algorithm = alg.read_asn1_object_identifier().der_context(SPKI)?;
        let parameters = if alg.empty() {
            None
        } else {
            Some(alg.read_asn1_object().der_context(SPKI)?.raw.to_vec())
        };
        alg.finish().der_context(SPKI)?;
        let public_key = body.read_asn1_bit_string().der_context(SPKI)?;
        body.finish().der_context(SPKI)?;

        Ok(SubjectPublicKeyInfo {
            der: spki.raw.to_vec(),
            algorithm,
            parameters,
            public_key,
        })
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn algorithm_oid(&self) -> ObjectIdentifier {
        self.algorithm
    }

    pub fn key_algorithm(&self) -> Option<KeyAlgorithm> {
        KeyAlgorithm::from_oid(&self.algorithm)
    }

    pub fn parameters(&self) -> Option<&[u8]> {
        self.parameters.as_deref()
    }

    // The contents of subjectPublicKey.
    pub fn key_bits(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    // SHA-1 over the subjectPublicKey bits (RFC 5280 4.2.1.2, method 1).
    pub fn key_identifier(&self) -> [u8; 20] {
        Sha1::digest(self.key_bits()).into()
    }

    // Named curve from the parameters of an EC key.
    pub fn curve(&self) -> Option<NamedCurve> {
        if self.key_algorithm() != Some(KeyAlgorithm::Ec) {
            return None;
        }
        let params = self.parameters.as_deref()?;
        let oid = Parser::new(params).read_asn1_object_identifier().ok()?;
        NamedCurve::from_oid(&oid)
    }
}

pub(super) fn dsa_public_value(key: &DsaKey) -> BigUint {
    key.g.modpow(&key.x, &key.p)
}

// Left-pads (or strips leading zeros from) the scalar to the field size.
pub(super) fn fixed_scalar(key: &EcKey, len: usize) -> Result<zeroize::Zeroizing<Vec<u8>>> {
    let start = key.private_scalar.iter().take_while(|b| **b == 0).count();
    let significant = &key.private_scalar[start..];
    if significant.len() > len {
        return Err(Error::Signing {
            algorithm: "ECDSA",
            reason: format!("private scalar longer than {} bytes", len),
        });
    }
    let mut out = zeroize::Zeroizing::new(vec![0u8; len]);
    out[len - significant.len()..].copy_from_slice(significant);
    Ok(out)
}

fn invalid_scalar(_: p256::elliptic_curve::Error) -> Error {
    Error::Signing {
        algorithm: "ECDSA",
        reason: "private scalar is not in range".to_string(),
    }
}

// Uncompressed point d*G, for the curves we have arithmetic for.
pub(super) fn ec_public_point(key: &EcKey) -> Result<Vec<u8>> {
    match key.curve {
        NamedCurve::Secp256r1 => {
            let d = fixed_scalar(key, 32)?;
            let sk = p256::SecretKey::from_bytes(p256::FieldBytes::from_slice(&d)).map_err(invalid_scalar)?;
            Ok(sk.public_key().to_encoded_point(false).as_bytes().to_vec())
        }
        NamedCurve::Secp384r1 => {
            let d = fixed_scalar(key, 48)?;
            let sk = p384::SecretKey::from_bytes(p384::FieldBytes::from_slice(&d)).map_err(invalid_scalar)?;
            Ok(sk.public_key().to_encoded_point(false).as_bytes().to_vec())
        }
        other => Err(Error::unsupported_oid("EC curve", &other.oid(), Some(other.name()))),
    }
}

pub(super) fn public_key_info(key: &KeyMaterial) -> Result<SubjectPublicKeyInfo> {
    let key_bits = match key {
        KeyMaterial::Rsa(k) => {
            let mut b = Builder::new(Vec::new());
            b.add_asn1_sequence(|b| {
                b.add_asn1_biguint(&k.modulus);
                b.add_asn1_biguint(&k.public_exponent);
            });
            b.take().der_context("RSAPublicKey")?
        }
        KeyMaterial::Dsa(k) => {
            let mut b = Builder::new(Vec::new());
            b.add_asn1_biguint(&dsa_public_value(k));
            b.take().der_context("DSAPublicKey")?
        }
        KeyMaterial::Ec(k) => match &k.public_point {
            Some(point) => point.clone(),
            None => ec_public_point(k)?,
        },
    };

    let mut b = Builder::new(Vec::new());
    b.add_asn1_sequence(|b| {
        b.add_asn1_sequence(|b| {
            b.add_asn1_object_identifier(&key.algorithm().oid());
            match key {
                KeyMaterial::Rsa(_) => b.add_asn1_null(),
                KeyMaterial::Dsa(k) => add_dss_parms(b, &k.p, &k.q, &k.g),
                KeyMaterial::Ec(k) => b.add_asn1_object_identifier(&k.curve.oid()),
            }
        });
        b.add_asn1_bit_string(&BitString::from_bytes(key_bits.as_slice()));
    });
    let der = b.take().der_context(SPKI)?;
    SubjectPublicKeyInfo::from_der(&der)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use zeroize::Zeroizing;

    use super::*;

    #[test]
    fn test_p256_public_point() {
        // RFC 6979 A.2.5
        let key = EcKey {
            private_scalar: Zeroizing::new(
                hex!("C9AFA9D845BA75166B5C215767B1D6934E50C3DB36E89B127B8A622B120F6721").to_vec(),
            ),
            curve: NamedCurve::Secp256r1,
            public_point: None,
        };
        let point = ec_public_point(&key).unwrap();
        assert_eq!(
            point,
            hex!(
                "04"
                "60FED4BA255A9D31C961EB74C6356D68C049B8923B61FA6CE669622E60F29FB6"
                "7903FE1008B8BC99A41AE9E95628BC64F2F1B20C2D7E9F5177A3C294D4462299"
            )
        );

        let spki = KeyMaterial::Ec(key).public_key_info().unwrap();
        assert_eq!(spki.key_algorithm(), Some(KeyAlgorithm::Ec));
        assert_eq!(spki.curve(), Some(NamedCurve::Secp256r1));
        assert_eq!(spki.key_bits(), point.as_slice());
    }

    #[test]
    fn test_scalar_padding() {
        let key = EcKey {
            private_scalar: Zeroizing::new(vec![0, 0, 1, 2]),
            curve: NamedCurve::Secp256r1,
            public_point: None,
        };
        let d = fixed_scalar(&key, 4).unwrap();
        assert_eq!(d.as_slice(), &[0, 0, 1, 2]);
        let d = fixed_scalar(&key, 2).unwrap();
        assert_eq!(d.as_slice(), &[1, 2]);
        assert!(fixed_scalar(&key, 1).is_err());
    }

    #[test]
    fn test_unsupported_curve_without_point() {
        let key = EcKey {
            private_scalar: Zeroizing::new(vec![1u8; 21]),
            curve: NamedCurve::Sect163k1,
            public_point: None,
        };
        assert!(matches!(
            KeyMaterial::Ec(key).public_key_info(),
            Err(Error::UnsupportedAlgorithm { stage: "EC curve", .. })
        ));
    }

    #[test]
    fn test_dsa_spki() {
        let u = BigUint::from;
        let key = DsaKey {
            p: u(23u32),
            q: u(11u32),
            g: u(4u32),
            x: u(7u32),
        };
        assert_eq!(dsa_public_value(&key), u(8u32));
        let spki = KeyMaterial::Dsa(key).public_key_info().unwrap();
        assert_eq!(spki.key_bits(), &[0x02, 0x01, 0x08]);
        assert_eq!(spki.parameters(), Some(&hex!("300902011702010b020104")[..]));
        assert_eq!(spki.curve(), None);
    }

    #[test]
    fn test_key_identifier() {
        let spki = SubjectPublicKeyInfo::from_der(&hex!("300f300906052b0e03021a050003020000")).unwrap();
        // SHA-1 of 0x00
        assert_eq!(spki.key_identifier(), hex!("5ba93c9db0cff93f52b521d7420e43f6eda2784f"));
    }
}
