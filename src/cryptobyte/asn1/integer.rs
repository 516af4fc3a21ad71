use num::{BigInt, BigUint};

use crate::cryptobyte::{Error, Result};

// DER INTEGER contents must be non-empty and minimal: the first nine bits
// may not be all zero or all one.
pub fn check_integer(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(Error::ASN1InvalidInteger);
    }
    if bytes.len() > 1
        && ((bytes[0] == 0 && bytes[1] & 0x80 == 0) || (bytes[0] == 0xff && bytes[1] & 0x80 != 0))
    {
        return Err(Error::ASN1InvalidInteger);
    }
    Ok(())
}

pub fn parse_bigint(bytes: &[u8]) -> Result<BigInt> {
    check_integer(bytes)?;
    Ok(BigInt::from_signed_bytes_be(bytes))
}

// Non-negative INTEGER, as used for every key component.
pub fn parse_biguint(bytes: &[u8]) -> Result<BigUint> {
    check_integer(bytes)?;
    if bytes[0] & 0x80 != 0 {
        return Err(Error::ASN1IntegerOutOfRange);
    }
    Ok(BigUint::from_bytes_be(bytes))
}

pub fn parse_i64(bytes: &[u8]) -> Result<i64> {
    check_integer(bytes)?;
    if bytes.len() > 8 {
        return Err(Error::ASN1IntegerOutOfRange);
    }
    let mut result: i64 = (bytes[0] as i8) as i64;
    for b in &bytes[1..] {
        result <<= 8;
        result |= *b as i64;
    }
    Ok(result)
}
