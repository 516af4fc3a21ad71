use super::asn1::ObjectIdentifier;
use crate::oid;

// Public key algorithms.
pub const OidPublicKeyRSA: ObjectIdentifier = oid!(1, 2, 840, 113549, 1, 1, 1);
pub const OidPublicKeyDSA: ObjectIdentifier = oid!(1, 2, 840, 10040, 4, 1);
pub const OidPublicKeyECDSA: ObjectIdentifier = oid!(1, 2, 840, 10045, 2, 1);

// Signature algorithms.
pub const OidSignatureSHA256WithRSA: ObjectIdentifier = oid!(1, 2, 840, 113549, 1, 1, 11);
pub const OidSignatureSHA384WithRSA: ObjectIdentifier = oid!(1, 2, 840, 113549, 1, 1, 12);
pub const OidSignatureSHA512WithRSA: ObjectIdentifier = oid!(1, 2, 840, 113549, 1, 1, 13);
pub const OidSignatureDSAWithSHA256: ObjectIdentifier = oid!(2, 16, 840, 1, 101, 3, 4, 3, 2);
pub const OidSignatureECDSAWithSHA256: ObjectIdentifier = oid!(1, 2, 840, 10045, 4, 3, 2);
pub const OidSignatureECDSAWithSHA384: ObjectIdentifier = oid!(1, 2, 840, 10045, 4, 3, 3);
pub const OidSignatureECDSAWithSHA512: ObjectIdentifier = oid!(1, 2, 840, 10045, 4, 3, 4);

// PKCS#5 password based encryption.
pub const OidPBES2: ObjectIdentifier = oid!(1, 2, 840, 113549, 1, 5, 13);
pub const OidPBKDF2: ObjectIdentifier = oid!(1, 2, 840, 113549, 1, 5, 12);
pub const OidPBEWithMD5AndDESCBC: ObjectIdentifier = oid!(1, 2, 840, 113549, 1, 5, 3);
pub const OidPBEWithSHA1AndDESCBC: ObjectIdentifier = oid!(1, 2, 840, 113549, 1, 5, 10);
pub const OidPBEWithSHAAnd3KeyTripleDESCBC: ObjectIdentifier = oid!(1, 2, 840, 113549, 1, 12, 1, 3);
pub const OidHMACWithSHA1: ObjectIdentifier = oid!(1, 2, 840, 113549, 2, 7);
pub const OidHMACWithSHA224: ObjectIdentifier = oid!(1, 2, 840, 113549, 2, 8);
pub const OidHMACWithSHA256: ObjectIdentifier = oid!(1, 2, 840, 113549, 2, 9);
pub const OidHMACWithSHA384: ObjectIdentifier = oid!(1, 2, 840, 113549, 2, 10);
pub const OidHMACWithSHA512: ObjectIdentifier = oid!(1, 2, 840, 113549, 2, 11);

// Symmetric ciphers.
pub const OidDESCBC: ObjectIdentifier = oid!(1, 3, 14, 3, 2, 7);
pub const OidDESEDE3CBC: ObjectIdentifier = oid!(1, 2, 840, 113549, 3, 7);
pub const OidAES128CBC: ObjectIdentifier = oid!(2, 16, 840, 1, 101, 3, 4, 1, 2);
pub const OidAES192CBC: ObjectIdentifier = oid!(2, 16, 840, 1, 101, 3, 4, 1, 22);
pub const OidAES256CBC: ObjectIdentifier = oid!(2, 16, 840, 1, 101, 3, 4, 1, 42);

// Certificate extensions.
pub const OidExtensionSubjectKeyId: ObjectIdentifier = oid!(2, 5, 29, 14);
pub const OidExtensionKeyUsage: ObjectIdentifier = oid!(2, 5, 29, 15);
pub const OidExtensionSubjectAltName: ObjectIdentifier = oid!(2, 5, 29, 17);
pub const OidExtensionBasicConstraints: ObjectIdentifier = oid!(2, 5, 29, 19);
pub const OidExtensionAuthorityKeyId: ObjectIdentifier = oid!(2, 5, 29, 35);

// Name attributes.
pub const OidAttributeCommonName: ObjectIdentifier = oid!(2, 5, 4, 3);
pub const OidAttributeSerialNumber: ObjectIdentifier = oid!(2, 5, 4, 5);
pub const OidAttributeCountry: ObjectIdentifier = oid!(2, 5, 4, 6);
pub const OidAttributeLocality: ObjectIdentifier = oid!(2, 5, 4, 7);
pub const OidAttributeProvince: ObjectIdentifier = oid!(2, 5, 4, 8);
pub const OidAttributeStreet: ObjectIdentifier = oid!(2, 5, 4, 9);
pub const OidAttributeOrganization: ObjectIdentifier = oid!(2, 5, 4, 10);
pub const OidAttributeOrganizationalUnit: ObjectIdentifier = oid!(2, 5, 4, 11);
pub const OidAttributeEmailAddress: ObjectIdentifier = oid!(1, 2, 840, 113549, 1, 9, 1);
pub const OidAttributeDomainComponent: ObjectIdentifier = oid!(0, 9, 2342, 19200300, 100, 1, 25);

// Names of the symmetric algorithms that may show up as an encryption
// scheme. Only used to make error messages readable.
pub const ALGORITHM_NAMES: &[(ObjectIdentifier, &str)] = &[
    (oid!(1, 3, 14, 3, 2, 7), "DES-CBC"),
    (oid!(1, 2, 840, 113549, 3, 7), "DES-EDE3-CBC"),
    (oid!(1, 2, 840, 113549, 3, 2), "RC2-CBC"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 1), "AES-128_ECB"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 2), "AES-128_CBC"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 3), "AES-128_OFB"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 4), "AES-128_CFB"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 5), "AESWrap-128"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 6), "AES-128_GCM"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 21), "AES-192_ECB"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 22), "AES-192_CBC"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 23), "AES-192_OFB"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 24), "AES-192_CFB"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 25), "AESWrap-192"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 26), "AES-192_GCM"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 41), "AES-256_ECB"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 42), "AES-256_CBC"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 43), "AES-256_OFB"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 44), "AES-256_CFB"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 45), "AESWrap-256"),
    (oid!(2, 16, 840, 1, 101, 3, 4, 1, 46), "AES-256_GCM"),
    (OidPBEWithSHAAnd3KeyTripleDESCBC, "PBEWithSHA1AndDESede"),
    (oid!(1, 2, 840, 113549, 1, 12, 1, 6), "PBEWithSHA1AndRC2_40"),
];

pub fn algorithm_name(oid: &ObjectIdentifier) -> Option<&'static str> {
    ALGORITHM_NAMES.iter().find(|(o, _)| o == oid).map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid() {
        assert_eq!("1.2.840.113549.1.1.11", OidSignatureSHA256WithRSA.to_string());
        assert_eq!(
            ObjectIdentifier::try_from("1.2.840.113549.1.1.11").unwrap(),
            OidSignatureSHA256WithRSA
        );
        assert_eq!("0.9.2342.19200300.100.1.25", OidAttributeDomainComponent.to_string());
    }

    #[test]
    fn test_algorithm_name() {
        assert_eq!(algorithm_name(&OidDESEDE3CBC), Some("DES-EDE3-CBC"));
        assert_eq!(algorithm_name(&"2.16.840.1.101.3.4.1.46".parse().unwrap()), Some("AES-256_GCM"));
        assert_eq!(algorithm_name(&OidPBES2), None);
    }
}
