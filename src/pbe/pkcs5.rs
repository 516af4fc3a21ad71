// PKCS#8 EncryptedPrivateKeyInfo with PKCS#5 v2.1 schemes.
//
// EncryptedPrivateKeyInfo ::= SEQUENCE {
//     encryptionAlgorithm  AlgorithmIdentifier,
//     encryptedData        OCTET STRING }
//
// PBES2-params ::= SEQUENCE {
//     keyDerivationFunc AlgorithmIdentifier {{PBES2-KDFs}},
//     encryptionScheme  AlgorithmIdentifier {{PBES2-Encs}} }
//
// PBKDF2-params ::= SEQUENCE {
//     salt           OCTET STRING,
//     iterationCount INTEGER (1..MAX),
//     keyLength      INTEGER (1..MAX) OPTIONAL,
//     prf            AlgorithmIdentifier DEFAULT algid-hmacWithSHA1 }
//
// PBEParameter ::= SEQUENCE {
//     salt           OCTET STRING (SIZE(8)),
//     iterationCount INTEGER }
//
// pbeWithSHAAnd3-KeyTripleDES-CBC from PKCS#12 is accepted for reading too.

use md5::Md5;
use rand::{CryptoRng, RngCore};
use sha1::{Digest, Sha1};
use sha2::{Sha224, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use super::{CbcCipher, pkcs12};
use crate::cryptobyte::asn1::ObjectIdentifier;
use crate::cryptobyte::oid::*;
use crate::cryptobyte::{self, Builder, Parser};
use crate::error::DerContext;
use crate::log::debug;
use crate::{Error, Result};

// PRFs allowed in PBKDF2-params.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prf {
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl Prf {
    fn from_oid(oid: &ObjectIdentifier) -> Option<Prf> {
        [
            (OidHMACWithSHA1, Prf::HmacSha1),
            (OidHMACWithSHA224, Prf::HmacSha224),
            (OidHMACWithSHA256, Prf::HmacSha256),
            (OidHMACWithSHA384, Prf::HmacSha384),
            (OidHMACWithSHA512, Prf::HmacSha512),
        ]
        .into_iter()
        .find(|(o, _)| o == oid)
        .map(|(_, p)| p)
    }

    fn oid(self) -> ObjectIdentifier {
        match self {
            Prf::HmacSha1 => OidHMACWithSHA1,
            Prf::HmacSha224 => OidHMACWithSHA224,
            Prf::HmacSha256 => OidHMACWithSHA256,
            Prf::HmacSha384 => OidHMACWithSHA384,
            Prf::HmacSha512 => OidHMACWithSHA512,
        }
    }

    fn derive(self, password: &[u8], salt: &[u8], iterations: u32, out: &mut [u8]) {
        match self {
            Prf::HmacSha1 => pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, iterations, out),
            Prf::HmacSha224 => pbkdf2::pbkdf2_hmac::<Sha224>(password, salt, iterations, out),
            Prf::HmacSha256 => pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, out),
            Prf::HmacSha384 => pbkdf2::pbkdf2_hmac::<Sha384>(password, salt, iterations, out),
            Prf::HmacSha512 => pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iterations, out),
        }
    }
}

// Settings used when writing an encrypted PKCS#8 key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pbes2Params {
    pub cipher: CbcCipher,
    pub prf: Prf,
    pub iterations: u32,
    pub salt_len: usize,
}

impl Default for Pbes2Params {
    fn default() -> Self {
        Pbes2Params {
            cipher: CbcCipher::Aes128Cbc,
            prf: Prf::HmacSha256,
            iterations: 10_000,
            salt_len: 16,
        }
    }
}

// Iteration counts above this are refused before any key derivation runs.
pub const MAX_ITERATIONS: u32 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pbes1Hash {
    Md5,
    Sha1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Scheme {
    Pbes2 {
        prf: Prf,
        salt: Vec<u8>,
        iterations: u32,
        cipher: CbcCipher,
        iv: Vec<u8>,
    },
    Pbes1 {
        hash: Pbes1Hash,
        salt: Vec<u8>,
        iterations: u32,
    },
    Pkcs12TripleDes {
        salt: Vec<u8>,
        iterations: u32,
    },
}

fn read_iterations(p: &mut Parser, stage: &'static str) -> Result<u32> {
    let n = p.read_asn1_i64().der_context(stage)?;
    u32::try_from(n)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(cryptobyte::Error::ASN1IntegerOutOfRange)
        .der_context(stage)
}

fn parse_pbes2(params: &mut Parser) -> Result<Scheme> {
    const STAGE: &str = "PBES2-params";
    let mut params = params.read_asn1_sequence().der_context(STAGE)?;

    let mut kdf = params.read_asn1_sequence().der_context(STAGE)?;
    let kdf_oid = kdf.read_asn1_object_identifier().der_context(STAGE)?;
    if kdf_oid != OidPBKDF2 {
        return Err(Error::unsupported_oid("PBES2 key derivation", &kdf_oid, None));
    }
    let mut kdf_params = kdf.read_asn1_sequence().der_context("PBKDF2-params")?;
    let salt = kdf_params.read_asn1_octet_string().der_context("PBKDF2-params")?.to_vec();
    let iterations = read_iterations(&mut kdf_params, "PBKDF2-params")?;
    let key_length = match kdf_params.peek_tag() {
        Some(cryptobyte::INTEGER) => Some(kdf_params.read_asn1_i64().der_context("PBKDF2-params")?),
        _ => None,
    };
    let prf = match kdf_params.read_optional_asn1(cryptobyte::SEQUENCE).der_context("PBKDF2-params")? {
        Some(alg) => {
            let oid = alg.parser().read_asn1_object_identifier().der_context("PBKDF2 prf")?;
            Prf::from_oid(&oid).ok_or_else(|| Error::unsupported_oid("PBKDF2 PRF", &oid, None))?
        }
        None => Prf::HmacSha1,
    };

    let mut enc = params.read_asn1_sequence().der_context(STAGE)?;
    let enc_oid = enc.read_asn1_object_identifier().der_context(STAGE)?;
    let cipher = CbcCipher::from_oid(&enc_oid)
        .filter(|c| c.is_aes())
        .ok_or_else(|| Error::unsupported_oid("PBES2 cipher", &enc_oid, algorithm_name(&enc_oid)))?;
    let iv = enc.read_asn1_octet_string().der_context("PBES2 cipher IV")?.to_vec();
    if iv.len() != cipher.block_size() {
        return Err(cryptobyte::Error::ASN1InvalidLength {
            want: cipher.block_size(),
            got: iv.len(),
        })
        .der_context("PBES2 cipher IV");
    }
    if let Some(len) = key_length {
        if len as usize != cipher.key_len() {
            return Err(cryptobyte::Error::ASN1IntegerOutOfRange).der_context("PBKDF2 keyLength");
        }
    }

    Ok(Scheme::Pbes2 {
        prf,
        salt,
        iterations,
        cipher,
        iv,
    })
}

fn parse_pbes1(hash: Pbes1Hash, params: &mut Parser) -> Result<Scheme> {
    const STAGE: &str = "PBEParameter";
    let mut params = params.read_asn1_sequence().der_context(STAGE)?;
    let salt = params.read_asn1_octet_string().der_context(STAGE)?.to_vec();
    if salt.len() != 8 {
        return Err(cryptobyte::Error::ASN1InvalidLength { want: 8, got: salt.len() }).der_context(STAGE);
    }
    let iterations = read_iterations(&mut params, STAGE)?;
    Ok(Scheme::Pbes1 { hash, salt, iterations })
}

fn parse_pkcs12(params: &mut Parser) -> Result<Scheme> {
    const STAGE: &str = "pkcs-12PbeParams";
    let mut params = params.read_asn1_sequence().der_context(STAGE)?;
    let salt = params.read_asn1_octet_string().der_context(STAGE)?.to_vec();
    let iterations = read_iterations(&mut params, STAGE)?;
    Ok(Scheme::Pkcs12TripleDes { salt, iterations })
}

// PBKDF1: T_1 = H(P || S), T_i = H(T_{i-1}); DK = T_c[..16].
fn pbkdf1<D: Digest>(password: &[u8], salt: &[u8], iterations: u32) -> Zeroizing<Vec<u8>> {
    let mut t = Zeroizing::new(D::new().chain_update(password).chain_update(salt).finalize().to_vec());
    for _ in 1..iterations {
        let next = D::digest(t.as_slice());
        t.copy_from_slice(&next);
    }
    t
}

impl Scheme {
    fn iterations(&self) -> u32 {
        match self {
            Scheme::Pbes2 { iterations, .. }
            | Scheme::Pbes1 { iterations, .. }
            | Scheme::Pkcs12TripleDes { iterations, .. } => *iterations,
        }
    }

    fn decrypt(&self, password: &[u8], ciphertext: &[u8], source_name: &str) -> Result<Zeroizing<Vec<u8>>> {
        if self.iterations() > MAX_ITERATIONS {
            return Err(Error::unsupported_format(
                source_name,
                format!("{} iterations, at most {} allowed", self.iterations(), MAX_ITERATIONS),
            ));
        }
        let bad = |_: crate::blockmode::Error| Error::Decryption {
            source_name: source_name.to_string(),
        };
        match self {
            Scheme::Pbes2 {
                prf,
                salt,
                iterations,
                cipher,
                iv,
            } => {
                debug!("PBES2 {:?} {} with {} iterations", prf, cipher.name(), iterations);
                let mut key = Zeroizing::new(vec![0u8; cipher.key_len()]);
                prf.derive(password, salt, *iterations, &mut key);
                cipher.decrypt(&key, iv, ciphertext).map_err(bad)
            }
            Scheme::Pbes1 { hash, salt, iterations } => {
                debug!("PBES1 {:?}-DES-CBC with {} iterations", hash, iterations);
                let dk = match hash {
                    Pbes1Hash::Md5 => pbkdf1::<Md5>(password, salt, *iterations),
                    Pbes1Hash::Sha1 => pbkdf1::<Sha1>(password, salt, *iterations),
                };
                CbcCipher::DesCbc.decrypt(&dk[..8], &dk[8..16], ciphertext).map_err(bad)
            }
            Scheme::Pkcs12TripleDes { salt, iterations } => {
                debug!("PKCS#12 SHA1-DES-EDE3-CBC with {} iterations", iterations);
                let key = pkcs12::derive(password, salt, pkcs12::KEY_MATERIAL, *iterations, 24);
                let iv = pkcs12::derive(password, salt, pkcs12::IV_MATERIAL, *iterations, 8);
                CbcCipher::DesEde3Cbc.decrypt(&key, &iv, ciphertext).map_err(bad)
            }
        }
    }
}

// Decrypts an EncryptedPrivateKeyInfo and returns the inner PrivateKeyInfo DER.
pub fn decrypt_private_key_info(der: &[u8], password: &[u8], source_name: &str) -> Result<Zeroizing<Vec<u8>>> {
    const STAGE: &str = "EncryptedPrivateKeyInfo";
    let mut p = Parser::new(der);
    let mut info = p.read_asn1_sequence().der_context(STAGE)?;
    let mut alg = info.read_asn1_sequence().der_context(STAGE)?;
    let oid = alg.read_asn1_object_identifier().der_context(STAGE)?;
    let scheme = if oid == OidPBES2 {
        parse_pbes2(&mut alg)?
    } else if oid == OidPBEWithMD5AndDESCBC {
        parse_pbes1(Pbes1Hash::Md5, &mut alg)?
    } else if oid == OidPBEWithSHA1AndDESCBC {
        parse_pbes1(Pbes1Hash::Sha1, &mut alg)?
    } else if oid == OidPBEWithSHAAnd3KeyTripleDESCBC {
        parse_pkcs12(&mut alg)?
    } else {
        return Err(Error::unsupported_oid("PKCS#8 encryption", &oid, algorithm_name(&oid)));
    };
    let ciphertext = info.read_asn1_octet_string().der_context(STAGE)?;
    scheme.decrypt(password, ciphertext, source_name)
}

// Encrypts a PrivateKeyInfo with PBES2, fresh salt and IV from rng.
pub fn encrypt_private_key_info<R: CryptoRng + ?Sized>(
    der: &[u8],
    password: &[u8],
    params: &Pbes2Params,
    rng: &mut R,
) -> Result<Vec<u8>> {
    if !params.cipher.is_aes() {
        return Err(Error::unsupported_name("PBES2 cipher", params.cipher.name()));
    }
    let mut salt = vec![0u8; params.salt_len];
    rng.fill_bytes(&mut salt);
    let mut iv = vec![0u8; params.cipher.block_size()];
    rng.fill_bytes(&mut iv);

    let mut key = Zeroizing::new(vec![0u8; params.cipher.key_len()]);
    params.prf.derive(password, &salt, params.iterations, &mut key);
    let ciphertext = params
        .cipher
        .encrypt(&key, &iv, der)
        .map_err(|_| Error::unsupported_name("PBES2 cipher", params.cipher.name()))?;

    let mut b = Builder::new(Vec::with_capacity(ciphertext.len() + 96));
    b.add_asn1_sequence(|b| {
        b.add_asn1_sequence(|b| {
            b.add_asn1_object_identifier(&OidPBES2);
            b.add_asn1_sequence(|b| {
                b.add_asn1_sequence(|b| {
                    b.add_asn1_object_identifier(&OidPBKDF2);
                    b.add_asn1_sequence(|b| {
                        b.add_asn1_octet_string(&salt);
                        b.add_asn1_u64(params.iterations as u64);
                        if params.prf != Prf::HmacSha1 {
                            b.add_asn1_sequence(|b| {
                                b.add_asn1_object_identifier(&params.prf.oid());
                                b.add_asn1_null();
                            });
                        }
                    });
                });
                b.add_asn1_sequence(|b| {
                    b.add_asn1_object_identifier(&params.cipher.oid());
                    b.add_asn1_octet_string(&iv);
                });
            });
        });
        b.add_asn1_octet_string(&ciphertext);
    });
    b.take().der_context("EncryptedPrivateKeyInfo encoding")
}
