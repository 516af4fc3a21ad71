use core::ops::Index;

use chrono::{DateTime, Utc};
use num::bigint::{BigInt, BigUint};

use super::asn1::{BitString, DerObject, ObjectIdentifier, integer, time};
use super::*;

pub trait AsParser<'a> {
    fn as_parser(self) -> Parser<'a>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parser<'a> {
    pub v: &'a [u8],
    // records how many bytes have parsed.
    bytes: usize,
}

impl<'a> From<&'a [u8]> for Parser<'a> {
    fn from(value: &'a [u8]) -> Self {
        Parser { v: value, bytes: 0 }
    }
}

impl<'a> AsParser<'a> for &'a [u8] {
    fn as_parser(self) -> Parser<'a> {
        Parser { v: self, bytes: 0 }
    }
}

impl Index<usize> for Parser<'_> {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.v[index]
    }
}

// read_object decodes the TLV starting at offset and returns it together
// with the offset of the byte following it.
pub fn read_object(buffer: &[u8], offset: usize) -> Result<(DerObject<'_>, usize)> {
    if offset > buffer.len() {
        return Err(Error::Truncated {
            offset,
            needed: 1,
            available: 0,
        });
    }
    let mut parser = Parser {
        v: &buffer[offset..],
        bytes: offset,
    };
    let obj = parser.read_asn1_object()?;
    Ok((obj, parser.bytes_read()))
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a [u8]) -> Self {
        Parser { v: s, bytes: 0 }
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn empty(&self) -> bool {
        self.v.is_empty()
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.v
    }

    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.v.len() < n {
            return Err(Error::Truncated {
                offset: self.bytes,
                needed: n,
                available: self.v.len(),
            });
        }
        let (v1, v2) = self.v.split_at(n);
        self.v = v2;
        self.bytes += n;
        Ok(v1)
    }

    pub fn skip(&mut self, n: usize) -> bool {
        self.read(n).is_ok()
    }

    // finish fails if anything is left unread.
    pub fn finish(&self) -> Result<()> {
        if !self.v.is_empty() {
            return Err(Error::TrailingData(self.v.len()));
        }
        Ok(())
    }

    // ASN.1

    pub fn peek_tag(&self) -> Option<Tag> {
        self.v.first().map(|t| Tag(*t))
    }

    // read_asn1_object reads one complete element (tag < 31, definite length).
    pub fn read_asn1_object(&mut self) -> Result<DerObject<'a>> {
        let start = self.bytes;
        if self.v.len() < 2 {
            return Err(Error::Truncated {
                offset: start,
                needed: 2,
                available: self.v.len(),
            });
        }
        let raw = self.v;

        let tag = Tag(self[0]);
        if tag.0 & 0x1f == 0x1f {
            return Err(Error::ASN1HighTag(tag.0));
        }
        let len_byte = self[1];

        let length: usize;
        let header_len: usize;
        if len_byte & 0x80 == 0 {
            // short-form encoding.
            length = len_byte as usize;
            header_len = 2;
        } else {
            let len_len = (len_byte & 0x7f) as usize;
            if len_len == 0 {
                return Err(Error::IndefiniteLength(start + 1));
            }
            if len_len > 4 {
                return Err(Error::LengthOverflow);
            }
            if self.v.len() < len_len + 2 {
                return Err(Error::Truncated {
                    offset: start + 2,
                    needed: len_len,
                    available: self.v.len() - 2,
                });
            }
            let len_bytes = &self.v[2..2 + len_len];
            if len_bytes[0] == 0 {
                return Err(Error::NonMinimalLength(start + 1));
            }
            let mut len32 = 0u32;
            for b in len_bytes {
                len32 = (len32 << 8) | *b as u32;
            }
            if len32 < 128 {
                // length should have used short-form encoding.
                return Err(Error::NonMinimalLength(start + 1));
            }
            header_len = 2 + len_len;
            length = len32 as usize;
        }

        let total = header_len.checked_add(length).ok_or(Error::LengthOverflow)?;
        if self.v.len() < total {
            return Err(Error::Truncated {
                offset: start + header_len,
                needed: length,
                available: self.v.len() - header_len,
            });
        }
        self.read(total)?;

        Ok(DerObject {
            raw: &raw[..total],
            tag,
            value: &raw[header_len..total],
        })
    }

    // read_asn1_element reads an element and checks its tag.
    pub fn read_asn1_element(&mut self, tag: Tag) -> Result<DerObject<'a>> {
        let offset = self.bytes;
        let obj = self.read_asn1_object()?;
        if obj.tag != tag {
            return Err(Error::ASN1UnexpectedTag {
                offset,
                want: tag.0,
                got: obj.tag.0,
            });
        }
        Ok(obj)
    }

    pub fn read_asn1(&mut self, tag: Tag) -> Result<&'a [u8]> {
        Ok(self.read_asn1_element(tag)?.value)
    }

    // Reads the next element only if it carries the given tag.
    pub fn read_optional_asn1(&mut self, tag: Tag) -> Result<Option<DerObject<'a>>> {
        if self.peek_tag() != Some(tag) {
            return Ok(None);
        }
        self.read_asn1_object().map(Some)
    }

    pub fn read_asn1_sequence(&mut self) -> Result<Parser<'a>> {
        Ok(self.read_asn1_element(SEQUENCE)?.parser())
    }

    pub fn read_asn1_set(&mut self) -> Result<Parser<'a>> {
        Ok(self.read_asn1_element(SET)?.parser())
    }

    // [n] EXPLICIT
    pub fn read_asn1_explicit(&mut self, n: u8) -> Result<Parser<'a>> {
        Ok(self.read_asn1_element(Tag::context_constructed(n))?.parser())
    }

    pub fn read_optional_explicit(&mut self, n: u8) -> Result<Option<Parser<'a>>> {
        Ok(self
            .read_optional_asn1(Tag::context_constructed(n))?
            .map(|obj| obj.parser()))
    }

    pub fn read_asn1_octet_string(&mut self) -> Result<&'a [u8]> {
        self.read_asn1(OCTET_STRING)
    }

    pub fn read_asn1_boolean(&mut self) -> Result<bool> {
        let bytes = self.read_asn1(BOOLEAN)?;
        if bytes.len() != 1 {
            return Err(Error::ASN1InvalidBoolean);
        }
        match bytes[0] {
            0 => Ok(false),
            0xff => Ok(true),
            _ => Err(Error::ASN1InvalidBoolean),
        }
    }

    pub fn read_asn1_null(&mut self) -> Result<()> {
        if !self.read_asn1(NULL)?.is_empty() {
            return Err(Error::ASN1InvalidNull);
        }
        Ok(())
    }

    pub fn read_asn1_i64(&mut self) -> Result<i64> {
        integer::parse_i64(self.read_asn1(INTEGER)?)
    }

    pub fn read_asn1_bigint(&mut self) -> Result<BigInt> {
        integer::parse_bigint(self.read_asn1(INTEGER)?)
    }

    pub fn read_asn1_biguint(&mut self) -> Result<BigUint> {
        integer::parse_biguint(self.read_asn1(INTEGER)?)
    }

    pub fn read_asn1_enum(&mut self) -> Result<i32> {
        let v = integer::parse_i64(self.read_asn1(ENUM)?)?;
        i32::try_from(v).map_err(|_| Error::ASN1IntegerOutOfRange)
    }

    pub fn read_asn1_object_identifier(&mut self) -> Result<ObjectIdentifier> {
        let bytes = self.read_asn1(OBJECT_IDENTIFIER)?;
        ObjectIdentifier::try_from_asn1(bytes)
    }

    pub fn read_asn1_bit_string(&mut self) -> Result<BitString> {
        let bytes = self.read_asn1(BIT_STRING)?;
        BitString::try_from(bytes)
    }

    // Time ::= CHOICE { utcTime UTCTime, generalTime GeneralizedTime }
    pub fn read_asn1_time(&mut self) -> Result<DateTime<Utc>> {
        let offset = self.bytes;
        let obj = self.read_asn1_object()?;
        match obj.tag {
            UTCTime => time::parse_utc_time(obj.value),
            GeneralizedTime => time::parse_generalized_time(obj.value),
            other => Err(Error::ASN1UnexpectedTag {
                offset,
                want: UTCTime.0,
                got: other.0,
            }),
        }
    }

    // Reads any of the character string types found in names.
    pub fn read_asn1_string(&mut self) -> Result<(Tag, String)> {
        let obj = self.read_asn1_object()?;
        let s = match obj.tag {
            UTF8String | PrintableString | IA5String | T61String => String::from_utf8(obj.value.to_vec())
                .map_err(|_| Error::ASN1InvalidString(obj.tag.0))?,
            BMPString => {
                if obj.value.len() % 2 != 0 {
                    return Err(Error::ASN1InvalidString(obj.tag.0));
                }
                let units: Vec<u16> = obj
                    .value
                    .chunks(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|_| Error::ASN1InvalidString(obj.tag.0))?
            }
            other => return Err(Error::ASN1InvalidString(other.0)),
        };
        Ok((obj.tag, s))
    }
}

#[cfg(test)]
mod tests {
    use num::*;

    use super::*;

    #[test]
    fn test_read_object_offsets() {
        // SEQUENCE { INTEGER 5, OCTET STRING 'ab' } followed by NULL
        let buf = [0x30, 0x07, 0x02, 0x01, 0x05, 0x04, 0x02, 0x61, 0x62, 0x05, 0x00];
        let (obj, next) = read_object(&buf, 0).unwrap();
        assert_eq!(obj.tag, SEQUENCE);
        assert_eq!(obj.len(), 7);
        assert_eq!(obj.raw, &buf[..9]);
        assert_eq!(next, 9);

        let mut inner = obj.parser();
        assert_eq!(inner.read_asn1_i64().unwrap(), 5);
        assert_eq!(inner.read_asn1_octet_string().unwrap(), b"ab");
        inner.finish().unwrap();

        let (obj, next) = read_object(&buf, next).unwrap();
        assert_eq!(obj.tag, NULL);
        assert_eq!(next, buf.len());
    }

    #[test]
    fn test_long_form_length() {
        let mut buf = vec![0x04, 0x81, 0x80];
        buf.extend_from_slice(&[0xaa; 0x80]);
        let (obj, next) = read_object(&buf, 0).unwrap();
        assert_eq!(obj.len(), 0x80);
        assert_eq!(obj.header_len(), 3);
        assert_eq!(next, 0x83);
    }

    #[test]
    fn test_malformed_lengths() {
        // length larger than the buffer
        assert!(matches!(
            read_object(&[0x04, 0x05, 0x01], 0),
            Err(Error::Truncated { .. })
        ));
        // indefinite form
        assert_eq!(
            read_object(&[0x30, 0x80, 0x00, 0x00], 0).unwrap_err(),
            Error::IndefiniteLength(1)
        );
        // long form for a short length
        assert_eq!(
            read_object(&[0x04, 0x81, 0x01, 0x00], 0).unwrap_err(),
            Error::NonMinimalLength(1)
        );
        // leading zero length octet
        let mut buf = vec![0x04, 0x82, 0x00, 0x80];
        buf.extend_from_slice(&[0; 0x80]);
        assert_eq!(read_object(&buf, 0).unwrap_err(), Error::NonMinimalLength(1));
        // high tag number form
        assert_eq!(read_object(&[0x1f, 0x01, 0x00], 0).unwrap_err(), Error::ASN1HighTag(0x1f));
        // offset past the end
        assert!(read_object(&[0x05, 0x00], 3).is_err());
    }

    #[test]
    fn test_read_asn1_boolean() {
        let mut s = Parser::new(&[1, 1, 0, 1, 1, 0xff, 5, 6, 7, 8, 9]);
        let b = s.read_asn1_boolean().unwrap();
        assert!(!b);
        let b = s.read_asn1_boolean().unwrap();
        assert!(b);
        assert_eq!(s.remaining(), &[5, 6, 7, 8, 9]);
        assert_eq!(s.bytes_read(), 6);
    }

    #[test]
    fn test_read_asn1_i64() {
        let mut b = Builder::new(Vec::new());
        for n in -100000..100000 {
            b.add_asn1_i64(n);
            let bytes = b.take().unwrap();

            let mut s = Parser::new(&bytes);
            let m = s.read_asn1_i64().unwrap();

            assert_eq!(n, m);
        }
    }

    #[test]
    fn test_read_asn1_i64_not_minimal() {
        let mut s = Parser::new(&[2, 2, 0xff, 0xff]);
        assert_eq!(s.read_asn1_i64(), Err(Error::ASN1InvalidInteger));
    }

    #[test]
    fn test_read_asn1_bigint() {
        let mut b = Builder::new(Vec::new());
        let n = BigInt::from_str_radix("ff1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef", 16).unwrap();
        b.add_asn1_bigint(&n);
        let bytes = b.take().unwrap();

        let mut s = Parser::new(&bytes);
        let m = s.read_asn1_bigint().unwrap();

        assert_eq!(n, m);
    }

    #[test]
    fn test_unexpected_tag() {
        let mut s = Parser::new(&[0x04, 0x00]);
        assert_eq!(
            s.read_asn1_sequence().unwrap_err(),
            Error::ASN1UnexpectedTag {
                offset: 0,
                want: 0x30,
                got: 0x04
            }
        );
    }

    #[test]
    fn test_optional_explicit() {
        // [0] { OID 1.2.840.10045.3.1.7 }
        let buf = hex_literal::hex!("a00a06082a8648ce3d030107");
        let mut s = Parser::new(&buf);
        assert!(s.read_optional_explicit(1).unwrap().is_none());
        let mut curve = s.read_optional_explicit(0).unwrap().unwrap();
        assert_eq!(curve.read_asn1_object_identifier().unwrap().to_string(), "1.2.840.10045.3.1.7");
        assert!(s.empty());
    }

    #[test]
    fn test_read_strings() {
        let mut s = Parser::new(&[0x13, 0x02, b'C', b'N', 0x1e, 0x04, 0x00, b'h', 0x00, b'i']);
        assert_eq!(s.read_asn1_string().unwrap(), (PrintableString, "CN".to_string()));
        assert_eq!(s.read_asn1_string().unwrap(), (BMPString, "hi".to_string()));
    }
}
