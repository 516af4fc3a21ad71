use zeroize::Zeroizing;

use super::padding::{pkcs7_pad, pkcs7_unpad};
use super::{Error, Result};
use crate::traits::Block;

pub struct CBCMode<B: Block> {
    pub block_size: usize,
    pub block: B,
}

impl<B: Block> CBCMode<B> {
    pub fn new(block: B) -> Self {
        CBCMode {
            block_size: block.block_size(),
            block,
        }
    }

    fn check(&self, iv: &[u8], in_out: &[u8]) -> Result<()> {
        if iv.len() != self.block_size {
            return Err(Error::InvalidIvSize(self.block_size, iv.len()));
        }
        if in_out.len() % self.block_size != 0 {
            return Err(Error::InvalidInputSize);
        }
        Ok(())
    }

    pub fn encrypt_inplace(&self, iv: &[u8], in_out: &mut [u8]) -> Result<()> {
        self.check(iv, in_out)?;
        let block_size = self.block_size;

        let mut last = [0u8; 32];
        last[..block_size].copy_from_slice(iv);
        for chunk in in_out.chunks_mut(block_size) {
            for i in 0..block_size {
                chunk[i] ^= last[i];
            }
            self.block.encrypt_inplace(chunk);
            last[..block_size].copy_from_slice(chunk);
        }
        Ok(())
    }

    pub fn decrypt_inplace(&self, iv: &[u8], in_out: &mut [u8]) -> Result<()> {
        self.check(iv, in_out)?;
        let block_size = self.block_size;

        let mut buf_iv = [0u8; 32];
        let mut saved = [0u8; 32];
        buf_iv[..block_size].copy_from_slice(iv);
        for chunk in in_out.chunks_mut(block_size) {
            saved[..block_size].copy_from_slice(chunk);
            self.block.decrypt_inplace(chunk);
            for i in 0..block_size {
                chunk[i] ^= buf_iv[i];
            }
            buf_iv[..block_size].copy_from_slice(&saved[..block_size]);
        }
        Ok(())
    }

    // Pads with PKCS#7 and encrypts.
    pub fn encrypt_padded(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut out = plaintext.to_vec();
        pkcs7_pad(&mut out, self.block_size);
        self.encrypt_inplace(iv, &mut out)?;
        Ok(out)
    }

    // Decrypts and strips PKCS#7 padding. The plaintext is usually key
    // material, so it comes back in a zeroizing buffer.
    pub fn decrypt_padded(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let mut out = Zeroizing::new(ciphertext.to_vec());
        self.decrypt_inplace(iv, &mut out)?;
        let n = pkcs7_unpad(&out, self.block_size)?;
        out.truncate(n);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use cipher::KeyInit;
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_cbc_aes128() {
        // NIST SP 800-38A F.2.1
        let key = hex!("2b7e151628aed2a6abf7158809cf4f3c");
        let iv = hex!("000102030405060708090a0b0c0d0e0f");
        let mut plain = hex!("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
        let wanted = hex!("7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2");

        let cbc = CBCMode::new(aes::Aes128::new_from_slice(&key).unwrap());
        cbc.encrypt_inplace(&iv, &mut plain).unwrap();
        assert_eq!(plain, wanted);

        cbc.decrypt_inplace(&iv, &mut plain).unwrap();
        assert_eq!(plain, hex!("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51"));
    }

    #[test]
    fn test_padded() {
        let cbc = CBCMode::new(des::TdesEde3::new_from_slice(&[7u8; 24]).unwrap());
        let iv = [1u8; 8];
        let ct = cbc.encrypt_padded(&iv, b"attack at dawn").unwrap();
        assert_eq!(ct.len(), 16);
        assert_eq!(cbc.decrypt_padded(&iv, &ct).unwrap().as_slice(), b"attack at dawn");

        assert_eq!(cbc.decrypt_padded(&iv[..4], &ct).unwrap_err(), Error::InvalidIvSize(8, 4));
        assert_eq!(cbc.decrypt_padded(&iv, &ct[..10]).unwrap_err(), Error::InvalidInputSize);
    }
}
