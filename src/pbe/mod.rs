// Password based encryption of private keys: OpenSSL's legacy PEM scheme,
// PKCS#5 (PBES1/PBES2) and the PKCS#12 3DES scheme as carried in PKCS#8
// EncryptedPrivateKeyInfo.

pub mod legacy;
mod pkcs12;
pub mod pkcs5;

pub use legacy::legacy_evp_bytes_to_key_md5;
pub use pkcs5::{Pbes2Params, Prf};

use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use zeroize::Zeroizing;

use crate::blockmode::{self, CBCMode};
use crate::cryptobyte::asn1::ObjectIdentifier;
use crate::cryptobyte::oid::*;

// The CBC ciphers keys may be encrypted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbcCipher {
    DesCbc,
    DesEde3Cbc,
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

const CBC_CIPHERS: &[(CbcCipher, &str, ObjectIdentifier)] = &[
    (CbcCipher::DesCbc, "DES-CBC", OidDESCBC),
    (CbcCipher::DesEde3Cbc, "DES-EDE3-CBC", OidDESEDE3CBC),
    (CbcCipher::Aes128Cbc, "AES-128-CBC", OidAES128CBC),
    (CbcCipher::Aes192Cbc, "AES-192-CBC", OidAES192CBC),
    (CbcCipher::Aes256Cbc, "AES-256-CBC", OidAES256CBC),
];

impl CbcCipher {
    // Looks up the DEK-Info name, e.g. "AES-128-CBC".
    pub fn from_dek_name(name: &str) -> Option<CbcCipher> {
        CBC_CIPHERS
            .iter()
            .find(|(_, n, _)| n.eq_ignore_ascii_case(name))
            .map(|(c, _, _)| *c)
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<CbcCipher> {
        CBC_CIPHERS.iter().find(|(_, _, o)| o == oid).map(|(c, _, _)| *c)
    }

    pub fn name(self) -> &'static str {
        match self {
            CbcCipher::DesCbc => "DES-CBC",
            CbcCipher::DesEde3Cbc => "DES-EDE3-CBC",
            CbcCipher::Aes128Cbc => "AES-128-CBC",
            CbcCipher::Aes192Cbc => "AES-192-CBC",
            CbcCipher::Aes256Cbc => "AES-256-CBC",
        }
    }

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            CbcCipher::DesCbc => OidDESCBC,
            CbcCipher::DesEde3Cbc => OidDESEDE3CBC,
            CbcCipher::Aes128Cbc => OidAES128CBC,
            CbcCipher::Aes192Cbc => OidAES192CBC,
            CbcCipher::Aes256Cbc => OidAES256CBC,
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            CbcCipher::DesCbc => 8,
            CbcCipher::DesEde3Cbc => 24,
            CbcCipher::Aes128Cbc => 16,
            CbcCipher::Aes192Cbc => 24,
            CbcCipher::Aes256Cbc => 32,
        }
    }

    pub fn block_size(self) -> usize {
        match self {
            CbcCipher::DesCbc | CbcCipher::DesEde3Cbc => 8,
            _ => 16,
        }
    }

    pub fn is_aes(self) -> bool {
        matches!(self, CbcCipher::Aes128Cbc | CbcCipher::Aes192Cbc | CbcCipher::Aes256Cbc)
    }

    pub fn decrypt(self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> blockmode::Result<Zeroizing<Vec<u8>>> {
        match self {
            CbcCipher::DesCbc => mode::<des::Des>(key)?.decrypt_padded(iv, ciphertext),
            CbcCipher::DesEde3Cbc => mode::<des::TdesEde3>(key)?.decrypt_padded(iv, ciphertext),
            CbcCipher::Aes128Cbc => mode::<aes::Aes128>(key)?.decrypt_padded(iv, ciphertext),
            CbcCipher::Aes192Cbc => mode::<aes::Aes192>(key)?.decrypt_padded(iv, ciphertext),
            CbcCipher::Aes256Cbc => mode::<aes::Aes256>(key)?.decrypt_padded(iv, ciphertext),
        }
    }

    pub fn encrypt(self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> blockmode::Result<Vec<u8>> {
        match self {
            CbcCipher::DesCbc => mode::<des::Des>(key)?.encrypt_padded(iv, plaintext),
            CbcCipher::DesEde3Cbc => mode::<des::TdesEde3>(key)?.encrypt_padded(iv, plaintext),
            CbcCipher::Aes128Cbc => mode::<aes::Aes128>(key)?.encrypt_padded(iv, plaintext),
            CbcCipher::Aes192Cbc => mode::<aes::Aes192>(key)?.encrypt_padded(iv, plaintext),
            CbcCipher::Aes256Cbc => mode::<aes::Aes256>(key)?.encrypt_padded(iv, plaintext),
        }
    }
}

fn mode<C: KeyInit + BlockEncrypt + BlockDecrypt>(key: &[u8]) -> blockmode::Result<CBCMode<C>> {
    let block = C::new_from_slice(key).map_err(|_| blockmode::Error::InvalidKeySize(key.len()))?;
    Ok(CBCMode::new(block))
}
