mod bit_string;
pub mod integer;
mod object_identifier;
pub mod time;

pub use bit_string::*;
pub use object_identifier::*;

use num::BigInt;

use super::{Parser, Result, Tag};

// DerObject is one decoded TLV. It borrows from the input buffer and is
// never longer lived than it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerObject<'a> {
    // the TLV of the ASN.1 object
    pub raw: &'a [u8],
    pub tag: Tag,
    // the Value of the ASN.1 object, value.len() == length
    pub value: &'a [u8],
}

impl<'a> DerObject<'a> {
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn header_len(&self) -> usize {
        self.raw.len() - self.value.len()
    }

    pub fn is_constructed(&self) -> bool {
        self.tag.is_constructed()
    }

    // A cursor over the contents, used to walk constructed objects.
    pub fn parser(&self) -> Parser<'a> {
        Parser::new(self.value)
    }

    pub fn to_bigint(&self) -> Result<BigInt> {
        integer::parse_bigint(self.value)
    }

    pub fn to_object_identifier(&self) -> Result<ObjectIdentifier> {
        ObjectIdentifier::try_from_asn1(self.value)
    }
}
