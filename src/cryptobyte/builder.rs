use core::mem;

use chrono::{DateTime, Utc};
use num::bigint::{BigInt, BigUint, Sign};

use super::asn1::{BitString, ObjectIdentifier, time};
use super::*;

// Builder is a rust version of golang.org/x/crypto/cryptobyte, restricted to
// ASN.1 DER. Errors are sticky: once set, every further add is a no-op and
// take() reports the first error.
#[derive(Default)]
pub struct Builder {
    err: Option<Error>,
    result: Vec<u8>,
    // position of the pending length byte of this (child) builder
    offset: usize,
    pending_child: bool,
}

impl Builder {
    pub fn new(out: Vec<u8>) -> Self {
        Builder {
            err: None,
            result: out,
            offset: 0,
            pending_child: false,
        }
    }

    fn set_error(&mut self, err: Error) {
        if self.err.is_none() {
            self.err = Some(err)
        }
    }

    // take takes the result as a Vec<u8> and returns.
    // The Builder::result is set to default after return.
    pub fn take(&mut self) -> Result<Vec<u8>> {
        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(mem::take(&mut self.result)),
        }
    }

    pub fn add_u8(&mut self, v: u8) {
        self.add_bytes(&[v]);
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        if self.err.is_some() {
            return;
        }
        if self.result.len().checked_add(bytes.len()).is_none() {
            self.set_error(Error::LengthOverflow);
            return;
        }
        self.result.extend_from_slice(bytes);
    }

    fn add_length_prefixed<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Builder),
    {
        if self.err.is_some() {
            return;
        }
        let offset = self.result.len();
        // one placeholder byte; flush widens it for long-form lengths.
        self.add_u8(0);

        let mut child = Builder {
            result: mem::take(&mut self.result),
            offset,
            pending_child: true,
            err: None,
        };

        f(&mut child);
        child.flush();

        match child.err {
            Some(e) => self.set_error(e),
            None => self.result = child.result,
        }
    }

    // flush writes the definite length of the content added after offset.
    fn flush(&mut self) {
        if !self.pending_child || self.err.is_some() {
            return;
        }
        let length = self.result.len() - self.offset - 1;

        let len_bytes: Vec<u8> = if length > 0xffff_ffff {
            self.set_error(Error::ASN1PendingChildTooLong);
            return;
        } else if length > 0x7f {
            let be = (length as u32).to_be_bytes();
            let skip = be.iter().take_while(|b| **b == 0).count();
            let mut v = vec![0x80 | (4 - skip) as u8];
            v.extend_from_slice(&be[skip..]);
            v
        } else {
            vec![length as u8]
        };

        self.result.splice(self.offset..self.offset + 1, len_bytes);
        self.pending_child = false;
    }
}

// ASN.1 related functions
impl Builder {
    // AddASN1 appends an ASN.1 object. The object is prefixed with the given tag.
    // Tags greater than 30 are not supported and result in an error (i.e.
    // low-tag-number form only). The child builder passed to the
    // closure can be used to build the content of the ASN.1 object.
    pub fn add_asn1<F>(&mut self, tag: Tag, f: F)
    where
        F: FnMut(&mut Builder),
    {
        if self.err.is_some() {
            return;
        }

        // Identifiers with the low five bits set indicate high-tag-number format
        // (two or more octets), which we don't support.
        if tag.0 & 0x1f == 0x1f {
            self.set_error(Error::ASN1HighTag(tag.0));
            return;
        }
        self.add_u8(tag.0);
        self.add_length_prefixed(f);
    }

    pub fn add_asn1_sequence<F>(&mut self, f: F)
    where
        F: FnMut(&mut Builder),
    {
        self.add_asn1(SEQUENCE, f)
    }

    pub fn add_asn1_set<F>(&mut self, f: F)
    where
        F: FnMut(&mut Builder),
    {
        self.add_asn1(SET, f)
    }

    // [n] EXPLICIT
    pub fn add_asn1_explicit<F>(&mut self, n: u8, f: F)
    where
        F: FnMut(&mut Builder),
    {
        self.add_asn1(Tag::context_constructed(n), f)
    }

    // [n] IMPLICIT over a primitive whose contents are given.
    pub fn add_asn1_implicit(&mut self, n: u8, contents: &[u8]) {
        self.add_asn1(Tag::context(n), |b| b.add_bytes(contents))
    }

    pub fn add_asn1_u64(&mut self, v: u64) {
        self.add_asn1(INTEGER, |b| {
            let mut length = 1;
            let mut i = v;
            while i >= 0x80 {
                length += 1;
                i >>= 8;
            }
            while length > 0 {
                let i = v >> ((length - 1) * 8) & 0xff;
                b.add_u8(i as u8);
                length -= 1;
            }
        })
    }

    #[inline]
    fn add_asn1_signed(&mut self, tag: Tag, v: i64) {
        self.add_asn1(tag, |b| {
            let mut length = 1;
            let mut i = v;
            while !(-0x80..0x80).contains(&i) {
                length += 1;
                i >>= 8;
            }

            while length > 0 {
                let i = v >> ((length - 1) * 8) & 0xff;
                b.add_u8(i as u8);
                length -= 1;
            }
        })
    }

    pub fn add_asn1_i64(&mut self, v: i64) {
        self.add_asn1_signed(INTEGER, v);
    }

    // AddASN1Enum appends a DER-encoded ASN.1 ENUMERATION.
    pub fn add_asn1_enum(&mut self, v: i64) {
        self.add_asn1_signed(ENUM, v);
    }

    // AddASN1BigInt appends a DER-encoded ASN.1 INTEGER.
    pub fn add_asn1_bigint(&mut self, n: &BigInt) {
        self.add_asn1(INTEGER, |c| match n.sign() {
            Sign::Minus => {
                c.add_bytes(n.to_signed_bytes_be().as_slice());
            }
            Sign::NoSign => {
                c.add_u8(0);
            }
            Sign::Plus => {
                let (_, bytes) = n.to_bytes_be();
                if bytes[0] & 0x80 != 0 {
                    c.add_u8(0)
                }
                c.add_bytes(bytes.as_slice())
            }
        })
    }

    pub fn add_asn1_biguint(&mut self, n: &BigUint) {
        self.add_asn1_unsigned_bytes(&n.to_bytes_be());
    }

    // INTEGER from big-endian magnitude bytes, leading zeros stripped and a
    // zero byte prepended when the high bit is set.
    pub fn add_asn1_unsigned_bytes(&mut self, be: &[u8]) {
        let start = be.iter().take_while(|b| **b == 0).count();
        let be = &be[start..];
        self.add_asn1(INTEGER, |c| {
            if be.is_empty() || be[0] & 0x80 != 0 {
                c.add_u8(0);
            }
            c.add_bytes(be);
        })
    }

    // add_asn1_octet_string appends a DER-encoded ASN.1 OCTET STRING.
    pub fn add_asn1_octet_string(&mut self, bytes: &[u8]) {
        self.add_asn1(OCTET_STRING, |b| b.add_bytes(bytes))
    }

    pub fn add_asn1_bit_string(&mut self, v: &BitString) {
        self.add_asn1(BIT_STRING, |b| {
            b.add_u8(v.padding_bits());
            b.add_bytes(&v.bytes);
        })
    }

    // To encode the oid = [value1, value2, value3, ...], value1 = 0,1,2, value2 = 0..=39 if value1 is 0 or 1
    // The first octet has value 40 * value1 + value2. The following octets, if any, encode value3, ..., valuen.
    // Each value is encoded base 128, most significant digit first, with as few digits as possible,
    // and the most significant bit of each octet except the last in the value's encoding set to "1."
    // For example, for oid { 1 2 840 113549 },
    // 40 * 1 + 2 = 42 = 0x2a.
    // 840 = 0x06 * 128 + 0x48
    // 113549 = 6 * 128^2 + 0x77 * 128 + 0x0d
    // The DER encode is 06 06 2a 86 48 86 f7 0d
    pub fn add_asn1_object_identifier(&mut self, oid: &ObjectIdentifier) {
        if !oid.is_valid() {
            self.set_error(Error::ASN1InvalidOid);
            return;
        }
        self.add_asn1(OBJECT_IDENTIFIER, |b| b.add_bytes(oid.as_der()));
    }

    pub fn add_asn1_boolean(&mut self, v: bool) {
        match v {
            true => self.add_bytes(&[u8::from(BOOLEAN), 1, 0xff]),
            false => self.add_bytes(&[u8::from(BOOLEAN), 1, 0]),
        }
    }

    pub fn add_asn1_null(&mut self) {
        self.add_bytes(&[u8::from(NULL), 0])
    }

    pub fn add_asn1_utf8_string(&mut self, s: &str) {
        self.add_asn1(UTF8String, |b| b.add_bytes(s.as_bytes()))
    }

    // PrintableString: A-Z a-z 0-9 space ' ( ) + , - . / : = ?
    pub fn add_asn1_printable_string(&mut self, s: &str) {
        if !s.bytes().all(is_printable) {
            self.set_error(Error::ASN1InvalidString(PrintableString.0));
            return;
        }
        self.add_asn1(PrintableString, |b| b.add_bytes(s.as_bytes()))
    }

    pub fn add_asn1_ia5_string(&mut self, s: &str) {
        if !s.is_ascii() {
            self.set_error(Error::ASN1InvalidString(IA5String.0));
            return;
        }
        self.add_asn1(IA5String, |b| b.add_bytes(s.as_bytes()))
    }

    pub fn add_asn1_utc_time(&mut self, t: &DateTime<Utc>) {
        if !time::use_utc_time(t) {
            self.set_error(Error::ASN1InvalidTime(time::format_generalized_time(t)));
            return;
        }
        let s = time::format_utc_time(t);
        self.add_asn1(UTCTime, |b| b.add_bytes(s.as_bytes()))
    }

    pub fn add_asn1_generalized_time(&mut self, t: &DateTime<Utc>) {
        let s = time::format_generalized_time(t);
        self.add_asn1(GeneralizedTime, |b| b.add_bytes(s.as_bytes()))
    }

    // Time ::= CHOICE { utcTime, generalTime }, per the 2050 cut-over.
    pub fn add_asn1_time(&mut self, t: &DateTime<Utc>) {
        if time::use_utc_time(t) {
            self.add_asn1_utc_time(t)
        } else {
            self.add_asn1_generalized_time(t)
        }
    }
}

pub fn is_printable(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b" '()+,-./:=?".contains(&c)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use num::bigint::ToBigInt;

    use super::*;

    #[test]
    fn test_builder_asn1() {
        let mut parent = Builder::new(Vec::new());
        parent.add_asn1(Tag(1), |child| {
            let mut vec = Vec::new();
            for i in 1..129 {
                vec.push(i as u8);
            }
            child.add_bytes(&vec);
            child.add_asn1(Tag(2), |grandchild| {
                grandchild.add_asn1_u64(0x80);
            })
        });

        let b = parent.take().unwrap();
        // 128 bytes + 02 04 02 02 00 80 = 134 = 0x86, long form
        assert_eq!(&b[..3], &[0x01, 0x81, 0x86]);
        assert_eq!(b.len(), 3 + 0x86);
        assert_eq!(&b[b.len() - 6..], &[0x02, 0x04, 0x02, 0x02, 0x00, 0x80]);
    }

    #[test]
    fn test_nested_long_form() {
        let mut b = Builder::new(Vec::new());
        b.add_asn1_sequence(|b| {
            b.add_asn1_octet_string(&[0x55; 300]);
            b.add_asn1_null();
        });
        let out = b.take().unwrap();
        // 30 82 01 32 | 04 82 01 2c ... | 05 00
        assert_eq!(&out[..8], &[0x30, 0x82, 0x01, 0x32, 0x04, 0x82, 0x01, 0x2c]);
        assert_eq!(out.len(), 4 + 0x132);
        let (obj, next) = read_object(&out, 0).unwrap();
        assert_eq!(next, out.len());
        let mut p = obj.parser();
        assert_eq!(p.read_asn1_octet_string().unwrap().len(), 300);
        p.read_asn1_null().unwrap();
    }

    #[test]
    fn test_add_asn1_u64() {
        let mut parent = Builder::new(Vec::new());
        parent.add_asn1_u64(1);
        let b = parent.take().unwrap();
        assert_eq!(b, vec![2, 1, 1]);

        let mut parent = Builder::new(Vec::new());
        parent.add_asn1_u64(0x8081);
        let b = parent.take().unwrap();
        assert_eq!(b, vec![2, 3, 0, 0x80, 0x81]);
    }

    #[test]
    fn test_add_asn1_i64() {
        let mut parent = Builder::new(Vec::new());
        parent.add_asn1_i64(1);
        let b = parent.take().unwrap();
        assert_eq!(b, vec![2, 1, 1]);

        let mut parent = Builder::new(Vec::new());
        parent.add_asn1_i64(-1);
        let b = parent.take().unwrap();
        assert_eq!(b, vec![2, 1, 0xff]);

        let mut parent = Builder::new(Vec::new());
        parent.add_asn1_i64(-128);
        let b = parent.take().unwrap();
        assert_eq!(b, vec![2, 1, 0x80]);

        let mut parent = Builder::new(Vec::new());
        parent.add_asn1_i64(-129);
        let b = parent.take().unwrap();
        assert_eq!(b, vec![2, 2, 0xff, 0x7f]);

        let mut parent = Builder::new(Vec::new());
        parent.add_asn1_i64(i64::MIN);
        let b = parent.take().unwrap();
        assert_eq!(b, vec![2, 8, 128, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_add_asn1_bigint() {
        let mut parent = Builder::new(Vec::new());
        parent.add_asn1_bigint(&-1125.to_bigint().unwrap());
        let b = parent.take().unwrap();
        assert_eq!(b, vec![2, 2, 251, 155]);
    }

    #[test]
    fn test_add_unsigned() {
        let mut b = Builder::new(Vec::new());
        b.add_asn1_unsigned_bytes(&[0x00, 0x00, 0x80]);
        b.add_asn1_unsigned_bytes(&[0x00, 0x7f]);
        b.add_asn1_biguint(&BigUint::from(0u32));
        assert_eq!(b.take().unwrap(), vec![2, 2, 0, 0x80, 2, 1, 0x7f, 2, 1, 0]);
    }

    #[test]
    fn test_add_object_identifier() {
        let mut parent = Builder::new(Vec::new());
        parent.add_asn1_object_identifier(&ObjectIdentifier::from_slice(&[1, 2, 156, 10197, 1, 301]).unwrap());
        let b = parent.take().unwrap();
        assert_eq!(b, vec![6, 0x08, 0x2A, 0x81, 0x1C, 0xCF, 0x55, 0x01, 0x82, 0x2D]);
    }

    #[test]
    fn test_strings_and_time() {
        let mut b = Builder::new(Vec::new());
        b.add_asn1_printable_string("CN");
        b.add_asn1_time(&Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap());
        b.add_asn1_time(&Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap());
        let out = b.take().unwrap();
        let mut p = Parser::new(&out);
        assert_eq!(p.read_asn1_string().unwrap().1, "CN");
        assert_eq!(p.peek_tag(), Some(UTCTime));
        assert_eq!(p.read_asn1_time().unwrap(), Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap());
        assert_eq!(p.peek_tag(), Some(GeneralizedTime));
        assert_eq!(p.read_asn1_time().unwrap(), Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_sticky_error() {
        let mut b = Builder::new(Vec::new());
        b.add_asn1_sequence(|b| {
            b.add_asn1_printable_string("not_printable*");
            b.add_asn1_null();
        });
        assert_eq!(b.take(), Err(Error::ASN1InvalidString(0x13)));
    }
}
