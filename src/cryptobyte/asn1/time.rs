use chrono::{DateTime, Datelike, NaiveDateTime, Utc};

use crate::cryptobyte::{Error, Result};

// UTCTime: YYMMDDHHMMSSZ. Years 50..99 are 19xx, 00..49 are 20xx.
pub fn parse_utc_time(bytes: &[u8]) -> Result<DateTime<Utc>> {
    let s = core::str::from_utf8(bytes).map_err(|_| Error::ASN1InvalidTime(format!("{:02x?}", bytes)))?;
    if s.len() != 13 || !s.ends_with('Z') {
        return Err(Error::ASN1InvalidTime(s.to_string()));
    }
    let yy: u32 = s[..2].parse().map_err(|_| Error::ASN1InvalidTime(s.to_string()))?;
    let century = if yy >= 50 { "19" } else { "20" };
    parse_with_format(&format!("{century}{s}"), s)
}

// GeneralizedTime: YYYYMMDDHHMMSSZ, no fractional seconds in DER.
pub fn parse_generalized_time(bytes: &[u8]) -> Result<DateTime<Utc>> {
    let s = core::str::from_utf8(bytes).map_err(|_| Error::ASN1InvalidTime(format!("{:02x?}", bytes)))?;
    if s.len() != 15 || !s.ends_with('Z') {
        return Err(Error::ASN1InvalidTime(s.to_string()));
    }
    parse_with_format(s, s)
}

fn parse_with_format(full: &str, original: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(full, "%Y%m%d%H%M%SZ")
        .map(|t| t.and_utc())
        .map_err(|_| Error::ASN1InvalidTime(original.to_string()))
}

// RFC 5280 4.1.2.5: dates through 2049 as UTCTime, later ones as GeneralizedTime.
pub fn use_utc_time(t: &DateTime<Utc>) -> bool {
    (1950..2050).contains(&t.year())
}

pub fn format_utc_time(t: &DateTime<Utc>) -> String {
    t.format("%y%m%d%H%M%SZ").to_string()
}

pub fn format_generalized_time(t: &DateTime<Utc>) -> String {
    t.format("%Y%m%d%H%M%SZ").to_string()
}
