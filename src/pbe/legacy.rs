// OpenSSL's traditional PEM encryption ("Proc-Type: 4,ENCRYPTED" with
// "DEK-Info: <cipher>,<iv hex>"). The key derivation is EVP_BytesToKey with
// MD5 and a single iteration, which is far too weak to protect anything new.
// It is only here to read keys that already exist.

use md5::{Digest, Md5};
use zeroize::Zeroizing;

use super::CbcCipher;
use crate::log::debug;
use crate::{Error, Result};

const SALT_LEN: usize = 8;

// D_1 = MD5(password || salt), D_i = MD5(D_{i-1} || password || salt),
// key = D_1 || D_2 || ... truncated to key_len.
pub fn legacy_evp_bytes_to_key_md5(password: &[u8], salt: &[u8], key_len: usize) -> Zeroizing<Vec<u8>> {
    let salt = &salt[..salt.len().min(SALT_LEN)];
    let mut key = Zeroizing::new(Vec::with_capacity(key_len + 16));
    while key.len() < key_len {
        let mut md5 = Md5::new();
        if key.len() >= 16 {
            md5.update(&key[key.len() - 16..]);
        }
        md5.update(password);
        md5.update(salt);
        key.extend_from_slice(&md5.finalize());
    }
    key.truncate(key_len);
    key
}

// DEK-Info parsed into its cipher and IV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DekInfo {
    pub cipher: CbcCipher,
    pub iv: Vec<u8>,
}

impl DekInfo {
    // "AES-128-CBC,27D77A73447898287E9F6A722A142CF8"
    pub fn parse(value: &str, source_name: &str) -> Result<DekInfo> {
        let (name, iv_hex) = value
            .split_once(',')
            .ok_or_else(|| Error::malformed_pem(source_name, "DEK-Info is not <cipher>,<iv>"))?;
        let name = name.trim();
        let cipher = CbcCipher::from_dek_name(name).ok_or_else(|| Error::unsupported_name("DEK-Info", name))?;
        let iv = hex::decode(iv_hex.trim())
            .map_err(|_| Error::malformed_pem(source_name, "DEK-Info IV is not hex"))?;
        if iv.len() != cipher.block_size() {
            return Err(Error::malformed_pem(
                source_name,
                format!("DEK-Info IV for {} must be {} bytes", cipher.name(), cipher.block_size()),
            ));
        }
        Ok(DekInfo { cipher, iv })
    }

    // The first eight IV bytes double as the KDF salt.
    pub fn decrypt(&self, password: &[u8], ciphertext: &[u8], source_name: &str) -> Result<Zeroizing<Vec<u8>>> {
        debug!("decrypting legacy OpenSSL key with {}", self.cipher.name());
        let key = legacy_evp_bytes_to_key_md5(password, &self.iv[..SALT_LEN], self.cipher.key_len());
        self.cipher
            .decrypt(&key, &self.iv, ciphertext)
            .map_err(|_| Error::Decryption {
                source_name: source_name.to_string(),
            })
    }
}
