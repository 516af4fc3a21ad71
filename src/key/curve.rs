use core::fmt;

use crate::cryptobyte::asn1::ObjectIdentifier;
use crate::oid;

// Named curves an EC key may reference by OID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedCurve {
    Secp192r1,
    Secp224r1,
    Secp256r1,
    Secp384r1,
    Secp521r1,
    Sect163k1,
    Sect163r2,
    Sect233k1,
    Sect233r1,
    Sect283k1,
    Sect283r1,
    Sect409k1,
    Sect409r1,
    Sect571k1,
    Sect571r1,
}

const CURVES: &[(ObjectIdentifier, NamedCurve, &str)] = &[
    (oid!(1, 2, 840, 10045, 3, 1, 1), NamedCurve::Secp192r1, "secp192r1"),
    (oid!(1, 3, 132, 0, 1), NamedCurve::Sect163k1, "sect163k1"),
    (oid!(1, 3, 132, 0, 15), NamedCurve::Sect163r2, "sect163r2"),
    (oid!(1, 3, 132, 0, 33), NamedCurve::Secp224r1, "secp224r1"),
    (oid!(1, 3, 132, 0, 26), NamedCurve::Sect233k1, "sect233k1"),
    (oid!(1, 3, 132, 0, 27), NamedCurve::Sect233r1, "sect233r1"),
    (oid!(1, 2, 840, 10045, 3, 1, 7), NamedCurve::Secp256r1, "secp256r1"),
    (oid!(1, 3, 132, 0, 16), NamedCurve::Sect283k1, "sect283k1"),
    (oid!(1, 3, 132, 0, 17), NamedCurve::Sect283r1, "sect283r1"),
    (oid!(1, 3, 132, 0, 34), NamedCurve::Secp384r1, "secp384r1"),
    (oid!(1, 3, 132, 0, 36), NamedCurve::Sect409k1, "sect409k1"),
    (oid!(1, 3, 132, 0, 37), NamedCurve::Sect409r1, "sect409r1"),
    (oid!(1, 3, 132, 0, 35), NamedCurve::Secp521r1, "secp521r1"),
    (oid!(1, 3, 132, 0, 38), NamedCurve::Sect571k1, "sect571k1"),
    (oid!(1, 3, 132, 0, 39), NamedCurve::Sect571r1, "sect571r1"),
];

impl NamedCurve {
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<NamedCurve> {
        CURVES.iter().find(|(o, _, _)| o == oid).map(|(_, c, _)| *c)
    }

    pub fn from_name(name: &str) -> Option<NamedCurve> {
        CURVES
            .iter()
            .find(|(_, _, n)| n.eq_ignore_ascii_case(name))
            .map(|(_, c, _)| *c)
    }

    fn entry(self) -> &'static (ObjectIdentifier, NamedCurve, &'static str) {
        // every variant has exactly one row
        CURVES.iter().find(|(_, c, _)| *c == self).unwrap_or(&CURVES[0])
    }

    pub fn oid(self) -> ObjectIdentifier {
        self.entry().0
    }

    pub fn name(self) -> &'static str {
        self.entry().2
    }

    // Size of a private scalar for the curves we can sign with.
    pub(crate) fn scalar_len(self) -> Option<usize> {
        match self {
            NamedCurve::Secp256r1 => Some(32),
            NamedCurve::Secp384r1 => Some(48),
            _ => None,
        }
    }
}

impl fmt::Display for NamedCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
