// PKCS#12 password based encryption (RFC 7292 appendix B and C) as found in
// PKCS#8 files written by Java keystores: pbeWithSHAAnd3-KeyTripleDES-CBC.
//
// pkcs-12PbeParams ::= SEQUENCE {
//     salt       OCTET STRING,
//     iterations INTEGER }

use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

// SHA-1 output and block sizes
const U: usize = 20;
const V: usize = 64;

pub(super) const KEY_MATERIAL: u8 = 1;
pub(super) const IV_MATERIAL: u8 = 2;

// The password as a NUL terminated BMPString. Bytes that are not UTF-8 are
// taken as Latin-1.
fn bmp_password(password: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(2 * password.len() + 2));
    match core::str::from_utf8(password) {
        Ok(s) => s.encode_utf16().for_each(|u| out.extend_from_slice(&u.to_be_bytes())),
        Err(_) => password.iter().for_each(|&b| out.extend_from_slice(&u16::from(b).to_be_bytes())),
    }
    out.extend_from_slice(&[0, 0]);
    out
}

// Appends src repeated up to the next multiple of V bytes.
fn extend_to_blocks(dst: &mut Vec<u8>, src: &[u8]) {
    if src.is_empty() {
        return;
    }
    let len = src.len().div_ceil(V) * V;
    dst.extend(src.iter().cycle().take(len));
}

// Derives len bytes of key (id 1) or IV (id 2) material with SHA-1.
pub(super) fn derive(password: &[u8], salt: &[u8], id: u8, iterations: u32, len: usize) -> Zeroizing<Vec<u8>> {
    let mut input = Zeroizing::new(Vec::new());
    extend_to_blocks(&mut input, salt);
    extend_to_blocks(&mut input, &bmp_password(password));
    let diversifier = [id; V];

    let mut out = Zeroizing::new(Vec::with_capacity(len + U));
    loop {
        let mut a = Sha1::new()
            .chain_update(diversifier)
            .chain_update(input.as_slice())
            .finalize();
        for _ in 1..iterations {
            a = Sha1::digest(a);
        }
        out.extend_from_slice(&a);
        if out.len() >= len {
            break;
        }
        // I_j = (I_j + B + 1) mod 2^(8V), B is A repeated to V bytes
        let b: Vec<u8> = a.iter().cycle().take(V).copied().collect();
        for block in input.chunks_exact_mut(V) {
            let mut carry = 1u16;
            for k in (0..V).rev() {
                let sum = u16::from(block[k]) + u16::from(b[k]) + carry;
                block[k] = sum as u8;
                carry = sum >> 8;
            }
        }
    }
    out.truncate(len);
    out
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_bmp_password() {
        assert_eq!(bmp_password(b"smeg").as_slice(), hex!("0073006d006500670000"));
        assert_eq!(bmp_password(b"").as_slice(), [0, 0]);
    }

    #[test]
    fn test_kdf_vectors() {
        let salt = hex!("0A58CF64530D823F");
        assert_eq!(
            derive(b"smeg", &salt, KEY_MATERIAL, 1, 24).as_slice(),
            hex!("8AAAE6297B6CB04642AB5B077851284EB7128F1A2A7FBCA3")
        );
        assert_eq!(derive(b"smeg", &salt, IV_MATERIAL, 1, 8).as_slice(), hex!("79993DFE048D3B76"));
    }

    #[test]
    fn test_long_output() {
        // more than one SHA-1 block, the prefix does not depend on the length
        let long = derive(b"pw", b"salt", KEY_MATERIAL, 3, 50);
        assert_eq!(long.len(), 50);
        assert_eq!(&long[..24], derive(b"pw", b"salt", KEY_MATERIAL, 3, 24).as_slice());
        assert_ne!(&long[..8], derive(b"pw", b"salt", IV_MATERIAL, 3, 8).as_slice());
    }
}
