use subtle::{ConstantTimeEq, ConstantTimeGreater, ConstantTimeLess};

use super::{Error, Result};

// PKCS#7 (PKCS#5 for 8 byte blocks): always adds 1..=block_size bytes.
pub fn pkcs7_pad(data: &mut Vec<u8>, block_size: usize) {
    let n = block_size - data.len() % block_size;
    data.resize(data.len() + n, n as u8);
}

// Returns the unpadded length. The padding bytes are checked without
// branching on their values.
pub fn pkcs7_unpad(data: &[u8], block_size: usize) -> Result<usize> {
    if data.is_empty() || data.len() % block_size != 0 {
        return Err(Error::InvalidInputSize);
    }
    let n = data[data.len() - 1];
    let mut ok = !n.ct_eq(&0) & !(block_size as u8).ct_lt(&n);
    let tail = &data[data.len() - block_size..];
    for (i, b) in tail.iter().enumerate() {
        // only the last n bytes have to equal n
        let in_pad = !((block_size - i) as u8).ct_gt(&n);
        ok &= !in_pad | b.ct_eq(&n);
    }
    if !bool::from(ok) {
        return Err(Error::InvalidPadding);
    }
    Ok(data.len() - n as usize)
}
