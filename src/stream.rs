// ChaCha20-Poly1305 (RFC 8439, empty AAD) over std::io::Read.
//
// Encryption yields ciphertext as the input is read and appends the 16 byte
// tag once the input ends. Decryption holds back the last 16 bytes it has
// seen and checks them at end of input. Plaintext is released before the
// tag is checked, so a caller must discard everything it read when the final
// read fails with InvalidData.
//
// A key/nonce pair must never encrypt two different inputs.

use std::io::{self, Read};

use chacha20::ChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use poly1305::Poly1305;
use poly1305::universal_hash::{KeyInit, UniversalHash};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::log::{debug, warn};
use crate::random;
use crate::{Error, Result};

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
const BLOCK_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

// A validated key and nonce.
#[derive(Clone)]
pub struct CipherSession {
    key: Zeroizing<[u8; KEY_SIZE]>,
    nonce: [u8; NONCE_SIZE],
    mode: Mode,
}

impl CipherSession {
    pub fn new(key: &[u8], nonce: &[u8], mode: Mode) -> Result<CipherSession> {
        let key: [u8; KEY_SIZE] = key.try_into().map_err(|_| Error::InvalidKeyOrNonce {
            what: "key",
            want: KEY_SIZE,
            got: key.len(),
        })?;
        let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|_| Error::InvalidKeyOrNonce {
            what: "nonce",
            want: NONCE_SIZE,
            got: nonce.len(),
        })?;
        Ok(CipherSession {
            key: Zeroizing::new(key),
            nonce,
            mode,
        })
    }

    // Key and nonce as hex strings, as derive_key/derive_nonce return them.
    pub fn from_hex(key: &str, nonce: &str, mode: Mode) -> Result<CipherSession> {
        let key = Zeroizing::new(hex::decode(key.trim()).map_err(|e| Error::invalid_input("hex key", e.to_string()))?);
        let nonce = hex::decode(nonce.trim()).map_err(|e| Error::invalid_input("hex nonce", e.to_string()))?;
        CipherSession::new(&key, &nonce, mode)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    pub fn reader<R: Read>(&self, inner: R) -> CipherReader<R> {
        let mut cipher = ChaCha20::new(chacha20::Key::from_slice(&self.key[..]), chacha20::Nonce::from_slice(&self.nonce));
        // block 0 keys Poly1305, the payload starts at counter 1
        let mut block0 = Zeroizing::new([0u8; 64]);
        cipher.apply_keystream(&mut block0[..]);
        let mac = Some(Poly1305::new(poly1305::Key::from_slice(&block0[..32])));
        debug!("{:?} stream opened", self.mode);
        CipherReader {
            inner,
            mode: self.mode,
            cipher,
            mac,
            partial: [0; BLOCK_SIZE],
            partial_len: 0,
            len: 0,
            held: Vec::with_capacity(2 * TAG_SIZE),
            pending: Vec::new(),
            finished: false,
            auth_failed: false,
        }
    }
}

impl core::fmt::Debug for CipherSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CipherSession").field("mode", &self.mode).finish_non_exhaustive()
    }
}

pub struct CipherReader<R> {
    inner: R,
    mode: Mode,
    cipher: ChaCha20,
    // taken when the tag is computed
    mac: Option<Poly1305>,
    partial: [u8; BLOCK_SIZE],
    partial_len: usize,
    // ciphertext bytes authenticated so far
    len: u64,
    // decrypt: input not yet released, the last TAG_SIZE bytes are the tag
    held: Vec<u8>,
    // encrypt: the tag, waiting to be read out
    pending: Vec<u8>,
    finished: bool,
    auth_failed: bool,
}

fn authentication_failed() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, Error::AuthenticationFailed)
}

impl<R: Read> CipherReader<R> {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    // The underlying reader, positioned after whatever was consumed.
    pub fn into_inner(self) -> R {
        self.inner
    }

    // Feeds ciphertext to Poly1305, 16 byte blocks at a time.
    fn absorb(&mut self, mut data: &[u8]) {
        let Some(mac) = self.mac.as_mut() else {
            return;
        };
        self.len += data.len() as u64;
        if self.partial_len > 0 {
            let n = data.len().min(BLOCK_SIZE - self.partial_len);
            self.partial[self.partial_len..self.partial_len + n].copy_from_slice(&data[..n]);
            self.partial_len += n;
            data = &data[n..];
            if self.partial_len < BLOCK_SIZE {
                return;
            }
            mac.update(&[poly1305::Block::clone_from_slice(&self.partial)]);
            self.partial_len = 0;
        }
        let mut blocks = data.chunks_exact(BLOCK_SIZE);
        for block in &mut blocks {
            mac.update(&[poly1305::Block::clone_from_slice(block)]);
        }
        let rest = blocks.remainder();
        self.partial[..rest.len()].copy_from_slice(rest);
        self.partial_len = rest.len();
    }

    fn tag(&mut self) -> Option<[u8; TAG_SIZE]> {
        let mut mac = self.mac.take()?;
        // zero padding, then le64(aad_len) || le64(ciphertext_len)
        mac.update_padded(&self.partial[..self.partial_len]);
        let mut lengths = [0u8; BLOCK_SIZE];
        lengths[8..].copy_from_slice(&self.len.to_le_bytes());
        mac.update(&[poly1305::Block::clone_from_slice(&lengths)]);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&mac.finalize());
        Some(tag)
    }

    fn read_encrypt(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() && !self.finished {
            let n = self.inner.read(buf)?;
            if n > 0 {
                self.keystream(&mut buf[..n])?;
                self.absorb(&buf[..n]);
                return Ok(n);
            }
            if let Some(tag) = self.tag() {
                self.pending.extend_from_slice(&tag);
            }
            self.finished = true;
            debug!("encrypted {} bytes", self.len);
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn read_decrypt(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while !self.finished {
            let n = self.inner.read(buf)?;
            if n == 0 {
                self.finished = true;
                return self.verify().map(|_| 0);
            }
            self.held.extend_from_slice(&buf[..n]);
            if self.held.len() <= TAG_SIZE {
                continue;
            }
            let out = self.held.len() - TAG_SIZE;
            buf[..out].copy_from_slice(&self.held[..out]);
            self.held.drain(..out);
            self.absorb(&buf[..out]);
            self.keystream(&mut buf[..out])?;
            return Ok(out);
        }
        if self.auth_failed {
            return Err(authentication_failed());
        }
        Ok(0)
    }

    fn keystream(&mut self, data: &mut [u8]) -> io::Result<()> {
        self.cipher
            .try_apply_keystream(data)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "ChaCha20 keystream exhausted"))
    }

    fn verify(&mut self) -> io::Result<()> {
        let ok = match self.tag() {
            Some(expected) if self.held.len() == TAG_SIZE => bool::from(expected[..].ct_eq(&self.held[..])),
            _ => false,
        };
        if !ok {
            warn!("stream authentication failed after {} bytes", self.len);
            self.auth_failed = true;
            return Err(authentication_failed());
        }
        debug!("decrypted {} bytes", self.len);
        Ok(())
    }
}

impl<R: Read> Read for CipherReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.mode {
            Mode::Encrypt => self.read_encrypt(buf),
            Mode::Decrypt => self.read_decrypt(buf),
        }
    }
}

pub fn encrypt<R: Read>(reader: R, key: &[u8], nonce: &[u8]) -> Result<CipherReader<R>> {
    Ok(CipherSession::new(key, nonce, Mode::Encrypt)?.reader(reader))
}

pub fn decrypt<R: Read>(reader: R, key: &[u8], nonce: &[u8]) -> Result<CipherReader<R>> {
    Ok(CipherSession::new(key, nonce, Mode::Decrypt)?.reader(reader))
}

pub fn encrypt_hex<R: Read>(reader: R, key: &str, nonce: &str) -> Result<CipherReader<R>> {
    Ok(CipherSession::from_hex(key, nonce, Mode::Encrypt)?.reader(reader))
}

pub fn decrypt_hex<R: Read>(reader: R, key: &str, nonce: &str) -> Result<CipherReader<R>> {
    Ok(CipherSession::from_hex(key, nonce, Mode::Decrypt)?.reader(reader))
}

/// Turns a passphrase into `len` bytes, hex encoded: the UTF-8 bytes are
/// padded with spaces and cut to `len`.
///
/// This is a convenience for humans typing keys, NOT a key derivation
/// function. The output has at most the entropy of the passphrase and a
/// passphrase longer than `len` bytes is simply truncated.
pub fn derive_key_or_nonce(passphrase: &str, len: usize) -> Zeroizing<String> {
    let mut padded = Zeroizing::new(Vec::with_capacity(passphrase.len() + len));
    padded.extend_from_slice(passphrase.as_bytes());
    padded.resize(passphrase.len() + len, b' ');
    Zeroizing::new(hex::encode(&padded[..len]))
}

/// [`derive_key_or_nonce`] for a 32 byte key. Not a KDF.
pub fn derive_key(passphrase: &str) -> Zeroizing<String> {
    derive_key_or_nonce(passphrase, KEY_SIZE)
}

/// [`derive_key_or_nonce`] for a 12 byte nonce. Not a KDF.
pub fn derive_nonce(passphrase: &str) -> Zeroizing<String> {
    derive_key_or_nonce(passphrase, NONCE_SIZE)
}

// A fresh 256-bit key, hex encoded.
pub fn generate_random_key() -> Zeroizing<String> {
    random::random_hex(KEY_SIZE)
}

pub fn generate_secret(bytes: usize) -> Zeroizing<String> {
    random::random_hex(bytes)
}
