// X.501 Names, written and read as RFC 4514 strings.
//
// Name ::= SEQUENCE OF RelativeDistinguishedName
// RelativeDistinguishedName ::= SET OF AttributeTypeAndValue
// AttributeTypeAndValue ::= SEQUENCE { type OBJECT IDENTIFIER, value ANY }
//
// The string form lists the most specific RDN first ("CN=..., O=..., C=..."),
// which is the reverse of the encoding order.

use core::fmt;
use core::str::FromStr;

use crate::cryptobyte::asn1::ObjectIdentifier;
use crate::cryptobyte::builder::is_printable;
use crate::cryptobyte::oid::*;
use crate::cryptobyte::{self, Builder, Parser, Tag};
use crate::error::DerContext;
use crate::{Error, Result};

const KEYWORDS: &[(&str, ObjectIdentifier)] = &[
    ("CN", OidAttributeCommonName),
    ("C", OidAttributeCountry),
    ("L", OidAttributeLocality),
    ("ST", OidAttributeProvince),
    ("O", OidAttributeOrganization),
    ("OU", OidAttributeOrganizationalUnit),
    ("STREET", OidAttributeStreet),
    ("DC", OidAttributeDomainComponent),
    ("SERIALNUMBER", OidAttributeSerialNumber),
    ("E", OidAttributeEmailAddress),
    ("EMAILADDRESS", OidAttributeEmailAddress),
];

fn keyword_oid(keyword: &str) -> Option<ObjectIdentifier> {
    KEYWORDS
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(keyword))
        .map(|(_, o)| *o)
}

fn oid_keyword(oid: &ObjectIdentifier) -> Option<&'static str> {
    KEYWORDS.iter().find(|(_, o)| o == oid).map(|(k, _)| *k)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTypeAndValue {
    pub oid: ObjectIdentifier,
    pub value: String,
    // string type the value is encoded with
    pub tag: Tag,
}

impl AttributeTypeAndValue {
    // Picks the string type for a new attribute.
    pub fn new(oid: ObjectIdentifier, value: impl Into<String>) -> Result<AttributeTypeAndValue> {
        let value = value.into();
        let printable = value.bytes().all(is_printable);
        let tag = if oid == OidAttributeCountry {
            if value.len() != 2 || !value.bytes().all(|c| c.is_ascii_alphabetic()) {
                return Err(Error::invalid_input("distinguished name", format!("country {:?} is not two letters", value)));
            }
            cryptobyte::PrintableString
        } else if oid == OidAttributeSerialNumber {
            if !printable {
                return Err(Error::invalid_input("distinguished name", "serialNumber must be printable"));
            }
            cryptobyte::PrintableString
        } else if oid == OidAttributeEmailAddress || oid == OidAttributeDomainComponent {
            if !value.is_ascii() {
                return Err(Error::invalid_input("distinguished name", format!("{} must be ASCII", oid)));
            }
            cryptobyte::IA5String
        } else if printable {
            cryptobyte::PrintableString
        } else {
            cryptobyte::UTF8String
        };
        Ok(AttributeTypeAndValue { oid, value, tag })
    }

    fn encode(&self, b: &mut Builder) {
        b.add_asn1_sequence(|b| {
            b.add_asn1_object_identifier(&self.oid);
            if self.tag == cryptobyte::BMPString {
                let units: Vec<u8> = self.value.encode_utf16().flat_map(u16::to_be_bytes).collect();
                b.add_asn1(self.tag, |b| b.add_bytes(&units));
            } else {
                b.add_asn1(self.tag, |b| b.add_bytes(self.value.as_bytes()));
            }
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    // in encoding order, outermost first
    rdns: Vec<Vec<AttributeTypeAndValue>>,
}

impl DistinguishedName {
    pub fn new() -> DistinguishedName {
        DistinguishedName::default()
    }

    // Appends a single-valued RDN (more specific than those before it).
    pub fn push(&mut self, oid: ObjectIdentifier, value: impl Into<String>) -> Result<()> {
        self.rdns.push(vec![AttributeTypeAndValue::new(oid, value)?]);
        Ok(())
    }

    pub fn rdns(&self) -> &[Vec<AttributeTypeAndValue>] {
        &self.rdns
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    // Values of every attribute of the given type, in encoding order.
    pub fn values(&self, oid: &ObjectIdentifier) -> impl Iterator<Item = &str> {
        self.rdns
            .iter()
            .flatten()
            .filter(move |a| a.oid == *oid)
            .map(|a| a.value.as_str())
    }

    pub fn common_name(&self) -> Option<&str> {
        self.values(&OidAttributeCommonName).last()
    }

    pub fn encode(&self, b: &mut Builder) -> Result<()> {
        let mut rdns = Vec::with_capacity(self.rdns.len());
        for rdn in &self.rdns {
            let mut encoded = rdn
                .iter()
                .map(|a| {
                    let mut inner = Builder::new(Vec::new());
                    a.encode(&mut inner);
                    inner.take().der_context("AttributeTypeAndValue")
                })
                .collect::<Result<Vec<_>>>()?;
            // DER orders SET OF members by their encoding
            encoded.sort();
            rdns.push(encoded);
        }
        b.add_asn1_sequence(|b| {
            for encoded in &rdns {
                b.add_asn1_set(|b| {
                    for e in encoded {
                        b.add_bytes(e);
                    }
                });
            }
        });
        Ok(())
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        let mut b = Builder::new(Vec::new());
        self.encode(&mut b)?;
        b.take().der_context("Name")
    }

    pub fn from_der(der: &[u8]) -> Result<DistinguishedName> {
        let mut p = Parser::new(der);
        let name = DistinguishedName::read(&mut p)?;
        p.finish().der_context("Name")?;
        Ok(name)
    }

    pub(crate) fn read(p: &mut Parser) -> Result<DistinguishedName> {
        const STAGE: &str = "Name";
        let mut seq = p.read_asn1_sequence().der_context(STAGE)?;
        let mut rdns = Vec::new();
        while !seq.empty() {
            let mut set = seq.read_asn1_set().der_context(STAGE)?;
            let mut rdn = Vec::new();
            while !set.empty() {
                let mut atv = set.read_asn1_sequence().der_context(STAGE)?;
                let oid = atv.read_asn1_object_identifier().der_context(STAGE)?;
                let (tag, value) = atv.read_asn1_string().der_context(STAGE)?;
                atv.finish().der_context(STAGE)?;
                rdn.push(AttributeTypeAndValue { oid, value, tag });
            }
            if rdn.is_empty() {
                return Err(cryptobyte::Error::ASN1InvalidLength { want: 1, got: 0 }).der_context(STAGE);
            }
            rdns.push(rdn);
        }
        Ok(DistinguishedName { rdns })
    }
}

// RFC 4514 section 2.4 escaping.
fn escape_value(value: &str, out: &mut String) {
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let special = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (i == 0 && (c == ' ' || c == '#'))
            || (i == last && c == ' ');
        if special {
            out.push('\\');
        }
        out.push(c);
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for (i, rdn) in self.rdns.iter().rev().enumerate() {
            if i > 0 {
                out.push(',');
            }
            for (j, a) in rdn.iter().enumerate() {
                if j > 0 {
                    out.push('+');
                }
                match oid_keyword(&a.oid) {
                    Some(k) => out.push_str(k),
                    None => out.push_str(&a.oid.to_string()),
                }
                out.push('=');
                escape_value(&a.value, &mut out);
            }
        }
        f.write_str(&out)
    }
}

// Splits s on unescaped occurrences of sep.
fn split_unescaped(s: &str, sep: &[char]) -> Vec<String> {
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            cur.push(c);
            if let Some(n) = chars.next() {
                cur.push(n);
            }
        } else if sep.contains(&c) {
            parts.push(core::mem::take(&mut cur));
        } else {
            cur.push(c);
        }
    }
    parts.push(cur);
    parts
}

fn unescape_value(raw: &str) -> Result<String> {
    let bad = |reason: &str| Error::invalid_input("distinguished name", format!("{} in {:?}", reason, raw));
    if raw.starts_with('#') {
        return Err(bad("hex encoded values are not supported"));
    }
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some(h) if h.is_ascii_hexdigit() => {
                let l = chars.next().filter(|l| l.is_ascii_hexdigit()).ok_or_else(|| bad("bad hex escape"))?;
                let pair: String = [h, l].iter().collect();
                bytes.push(u8::from_str_radix(&pair, 16).map_err(|_| bad("bad hex escape"))?);
            }
            Some(e) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(e.encode_utf8(&mut buf).as_bytes());
            }
            None => return Err(bad("dangling escape")),
        }
    }
    String::from_utf8(bytes).map_err(|_| bad("escaped bytes are not UTF-8"))
}

impl FromStr for DistinguishedName {
    type Err = Error;

    // "CN=Server, O=Example, C=CN"; ';' is accepted as a separator too.
    fn from_str(s: &str) -> Result<Self> {
        let mut rdns = Vec::new();
        if s.trim().is_empty() {
            return Ok(DistinguishedName { rdns });
        }
        for rdn in split_unescaped(s, &[',', ';']) {
            let mut attrs = Vec::new();
            for atv in split_unescaped(&rdn, &['+']) {
                let (ty, value) = atv.split_once('=').ok_or_else(|| {
                    Error::invalid_input("distinguished name", format!("{:?} is not type=value", atv.trim()))
                })?;
                let ty = ty.trim();
                let oid = match keyword_oid(ty) {
                    Some(oid) => oid,
                    None => ObjectIdentifier::try_from(ty.strip_prefix("OID.").unwrap_or(ty))
                        .map_err(|_| Error::invalid_input("distinguished name", format!("unknown attribute {:?}", ty)))?,
                };
                // unescaped surrounding spaces are insignificant
                let value = value.trim_start();
                let value = if value.ends_with("\\ ") { value } else { value.trim_end() };
                attrs.push(AttributeTypeAndValue::new(oid, unescape_value(value)?)?);
            }
            rdns.push(attrs);
        }
        rdns.reverse();
        Ok(DistinguishedName { rdns })
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_parse_order_and_encoding() {
        let dn: DistinguishedName = "CN=Server, O=Example, C=CN".parse().unwrap();
        // C is encoded first
        assert_eq!(dn.rdns()[0][0].oid, OidAttributeCountry);
        assert_eq!(dn.common_name(), Some("Server"));
        assert_eq!(
            dn.to_der().unwrap(),
            hex!(
                "3030"
                "310b300906035504061302434e"
                "3110300e060355040a13074578616d706c65"
                "310f300d06035504031306536572766572"
            )
        );
        assert_eq!(dn.to_string(), "CN=Server,O=Example,C=CN");
        assert_eq!(DistinguishedName::from_der(&dn.to_der().unwrap()).unwrap(), dn);
    }

    #[test]
    fn test_string_types() {
        let dn: DistinguishedName = "E=ops@example.com, CN=caf\u{e9}, DC=example".parse().unwrap();
        let tags: Vec<Tag> = dn.rdns().iter().map(|r| r[0].tag).collect();
        assert_eq!(tags, vec![cryptobyte::IA5String, cryptobyte::UTF8String, cryptobyte::IA5String]);
    }

    #[test]
    fn test_escapes() {
        let dn: DistinguishedName = r"CN=Doe\, John, O=A\2bB, OU=\ lead".parse().unwrap();
        let values: Vec<&str> = dn.rdns().iter().map(|r| r[0].value.as_str()).collect();
        assert_eq!(values, vec![" lead", "A+B", "Doe, John"]);
        assert_eq!(dn.to_string(), r"CN=Doe\, John,O=A\+B,OU=\ lead");
    }

    #[test]
    fn test_multi_valued_rdn() {
        let dn: DistinguishedName = "CN=a+OU=b, O=c".parse().unwrap();
        assert_eq!(dn.rdns().len(), 2);
        assert_eq!(dn.rdns()[1].len(), 2);
        let back = DistinguishedName::from_der(&dn.to_der().unwrap()).unwrap();
        assert_eq!(back.rdns()[1].len(), 2);
    }

    #[test]
    fn test_dotted_oid_type() {
        let dn: DistinguishedName = "2.5.4.3=x".parse().unwrap();
        assert_eq!(dn.common_name(), Some("x"));
    }

    #[test]
    fn test_rejects() {
        for bad in ["CN", "C=China", "XX=1", "CN=#0403", r"CN=a\"] {
            assert!(
                matches!(bad.parse::<DistinguishedName>(), Err(Error::InvalidInput { .. })),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_encode_reports_bad_attribute() {
        let mut dn: DistinguishedName = "CN=ok".parse().unwrap();
        dn.rdns.push(vec![AttributeTypeAndValue {
            oid: ObjectIdentifier::default(),
            value: "lost".to_string(),
            tag: cryptobyte::UTF8String,
        }]);
        assert!(matches!(
            dn.to_der(),
            Err(Error::MalformedEncoding { stage: "AttributeTypeAndValue", .. })
        ));
    }
}
