use thiserror;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("truncated input at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("indefinite length at offset {0} is not allowed in DER")]
    IndefiniteLength(usize),

    #[error("length at offset {0} is not minimally encoded")]
    NonMinimalLength(usize),

    #[error("cryptobyte: length overflow")]
    LengthOverflow,

    #[error("ASN.1 tag number {} not supported", .0)]
    ASN1HighTag(u8),

    #[error("unexpected ASN.1 tag at offset {offset}: want {want}, got {got}")]
    ASN1UnexpectedTag { offset: usize, want: u8, got: u8 },

    #[error("pending ASN.1 child too long")]
    ASN1PendingChildTooLong,

    #[error("invalid INTEGER encoding")]
    ASN1InvalidInteger,

    #[error("INTEGER out of range")]
    ASN1IntegerOutOfRange,

    #[error("invalid BOOLEAN encoding")]
    ASN1InvalidBoolean,

    #[error("invalid NULL encoding")]
    ASN1InvalidNull,

    #[error("invalid OID")]
    ASN1InvalidOid,

    #[error("invalid OID encoding")]
    ASN1InvalidOidEncoding,

    #[error("invalid BIT STRING length")]
    ASN1InvalidBitStringLength,

    #[error("invalid BIT STRING padding")]
    ASN1InvalidBitStringPadding,

    #[error("invalid content length: want {want}, got {got}")]
    ASN1InvalidLength { want: usize, got: usize },

    #[error("invalid string contents for tag {0:#04x}")]
    ASN1InvalidString(u8),

    #[error("invalid time: {0}")]
    ASN1InvalidTime(String),

    #[error("{0} trailing bytes after ASN.1 structure")]
    TrailingData(usize),
}

pub type Result<T> = core::result::Result<T, Error>;
