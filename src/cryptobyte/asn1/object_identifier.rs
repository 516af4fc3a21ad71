use core::fmt;
use core::str::FromStr;

use crate::cryptobyte::{Error, Result};

// OBJECT IDENTIFIER
#[macro_export]
macro_rules! oid{
    ($($d:expr),*) => {
        match $crate::cryptobyte::asn1::ObjectIdentifier::from_slice(&[$($d,)*]) {
            Some(oid) => oid,
            None => panic!("invalid object identifier"),
        }
    }
}

const OID_MAX_SIZE: usize = 63;

// An ObjectIdentifier represents an ASN.1 OBJECT IDENTIFIER, held as its
// DER contents so that comparison is a byte comparison.
#[derive(Clone, Copy)]
pub struct ObjectIdentifier {
    der: [u8; OID_MAX_SIZE],
    der_len: u8,
}

impl PartialEq for ObjectIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.as_der() == other.as_der()
    }
}
impl Eq for ObjectIdentifier {}

impl core::hash::Hash for ObjectIdentifier {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.as_der().hash(state)
    }
}

impl Default for ObjectIdentifier {
    fn default() -> Self {
        Self {
            der: [0; OID_MAX_SIZE],
            der_len: Default::default(),
        }
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.arcs().iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectIdentifier({})", self)
    }
}

impl TryFrom<&str> for ObjectIdentifier {
    type Error = Error;
    fn try_from(value: &str) -> Result<Self> {
        let mut v = [0u32; 32];
        let mut i = 0;
        for s in value.split('.') {
            if i == v.len() {
                return Err(Error::ASN1InvalidOid);
            }
            v[i] = s.parse::<u32>().map_err(|_| Error::ASN1InvalidOid)?;
            i += 1;
        }
        ObjectIdentifier::from_slice(&v[..i]).ok_or(Error::ASN1InvalidOid)
    }
}

impl FromStr for ObjectIdentifier {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        ObjectIdentifier::try_from(s)
    }
}

impl From<&ObjectIdentifier> for String {
    fn from(oid: &ObjectIdentifier) -> Self {
        format!("{}", oid)
    }
}

impl ObjectIdentifier {
    /// Parses an OID from a slice u32, e.g. [1, 2, 840, 113549].
    pub const fn from_slice(parts: &[u32]) -> Option<ObjectIdentifier> {
        if parts.len() < 2 {
            return None;
        }

        if parts[0] > 2 || (parts[0] < 2 && parts[1] >= 40) {
            return None;
        }

        let mut der = [0u8; OID_MAX_SIZE];
        let mut der_len = 0;

        // The first two arcs share one subidentifier.
        let mut i = 1;
        while i < parts.len() {
            let part = if i == 1 {
                40 * parts[0] as u64 + parts[1] as u64
            } else {
                parts[i] as u64
            };

            // How many bytes to encode part.
            let mut length = 64 - part.leading_zeros();
            length = if length == 0 { 1 } else { (length + 6) / 7 };
            if der_len + length as usize > OID_MAX_SIZE {
                return None;
            }

            let mut j = length - 1;
            while j > 0 {
                der[der_len] = (0x80 | ((part >> (7 * j)) & 0x7f)) as u8;
                der_len += 1;
                j -= 1;
            }
            der[der_len] = (part & 0x7f) as u8;
            der_len += 1;
            i += 1;
        }

        Some(ObjectIdentifier {
            der,
            der_len: der_len as u8,
        })
    }

    // ObjectIdentifier from the contents of a DER OBJECT IDENTIFIER.
    pub fn try_from_asn1(v: &[u8]) -> Result<Self> {
        if v.is_empty() || v.len() > OID_MAX_SIZE {
            return Err(Error::ASN1InvalidOidEncoding);
        }
        // the last byte must terminate a subidentifier
        if v[v.len() - 1] & 0x80 != 0 {
            return Err(Error::ASN1InvalidOidEncoding);
        }
        // subidentifiers are minimal: no leading 0x80 octet
        let mut start = true;
        for x in v {
            if start && *x == 0x80 {
                return Err(Error::ASN1InvalidOidEncoding);
            }
            start = *x & 0x80 == 0;
        }
        let mut oid = ObjectIdentifier::default();
        oid.der[..v.len()].copy_from_slice(v);
        oid.der_len = v.len() as u8;
        Ok(oid)
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der[..self.der_len as usize]
    }

    // The dotted-decimal arcs, e.g. [1, 2, 840, 113549].
    pub fn arcs(&self) -> Vec<u64> {
        let mut arcs = Vec::with_capacity(self.der_len as usize + 1);
        let mut n = 0u64;
        for x in self.as_der() {
            n = (n << 7) | (*x & 0x7f) as u64;
            if *x & 0x80 != 0 {
                continue;
            }
            if arcs.is_empty() {
                match n {
                    0..=39 => arcs.extend([0, n]),
                    40..=79 => arcs.extend([1, n - 40]),
                    _ => arcs.extend([2, n - 80]),
                }
            } else {
                arcs.push(n);
            }
            n = 0;
        }
        arcs
    }

    pub fn is_valid(&self) -> bool {
        self.der_len > 0 && self.der[self.der_len as usize - 1] & 0x80 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice() {
        let oid = ObjectIdentifier::from_slice(&[1, 2, 840, 113549]).unwrap();
        assert_eq!(oid.as_der(), &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d]);

        // zero arcs inside the OID
        let oid = ObjectIdentifier::from_slice(&[1, 3, 132, 0, 34]).unwrap();
        assert_eq!(oid.as_der(), &[0x2b, 0x81, 0x04, 0x00, 0x22]);
        assert_eq!(oid.to_string(), "1.3.132.0.34");

        // first subidentifier wider than one byte
        let oid = ObjectIdentifier::from_slice(&[2, 999, 3]).unwrap();
        assert_eq!(oid.as_der(), &[0x88, 0x37, 0x03]);
        assert_eq!(oid.to_string(), "2.999.3");

        assert!(ObjectIdentifier::from_slice(&[3, 1]).is_none());
        assert!(ObjectIdentifier::from_slice(&[1, 40]).is_none());
        assert!(ObjectIdentifier::from_slice(&[1]).is_none());
    }

    #[test]
    fn test_from_asn1() {
        let a = vec![0x2au8, 0x86, 0x48, 0x86, 0xf7, 0x0d];
        let oid = ObjectIdentifier::try_from_asn1(a.as_slice()).unwrap();
        assert_eq!("1.2.840.113549", oid.to_string());
        assert_eq!(oid, "1.2.840.113549".parse().unwrap());

        assert!(ObjectIdentifier::try_from_asn1(&[0x2a, 0x86]).is_err());
        assert!(ObjectIdentifier::try_from_asn1(&[0x2a, 0x80, 0x01]).is_err());
        assert!(ObjectIdentifier::try_from_asn1(&[]).is_err());
    }

    #[test]
    fn test_rsa_encryption() {
        let oid: ObjectIdentifier = "1.2.840.113549.1.1.1".parse().unwrap();
        assert_eq!(oid.as_der(), &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01]);
        assert_eq!(oid.arcs(), vec![1, 2, 840, 113549, 1, 1, 1]);
        let back = ObjectIdentifier::try_from_asn1(oid.as_der()).unwrap();
        assert_eq!(back.to_string(), "1.2.840.113549.1.1.1");
        assert_eq!(back, oid);
    }

    #[test]
    fn test_from_str() {
        assert!("1.2.x".parse::<ObjectIdentifier>().is_err());
        assert!("".parse::<ObjectIdentifier>().is_err());
        let oid: ObjectIdentifier = "2.16.840.1.101.3.4.1.42".parse().unwrap();
        assert_eq!(oid.arcs(), vec![2, 16, 840, 1, 101, 3, 4, 1, 42]);
    }
}
