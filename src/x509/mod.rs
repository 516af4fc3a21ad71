//! X.509v3 certificates: parsing, issuance and bundling with their key.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use num::BigInt;

use crate::cryptobyte::asn1::ObjectIdentifier;
use crate::cryptobyte::oid::*;
use crate::cryptobyte::{self, Parser, Tag};
use crate::error::DerContext;
use crate::key::{SignatureAlgorithm, SubjectPublicKeyInfo, verify_signature};
use crate::log::trace;
use crate::pem;
use crate::{Error, Result};

mod archive;
mod builder;
mod extensions;
mod name;

pub use archive::{write_bundle, write_bundle_with_ca};
pub use builder::{CertificateRequest, sign_certificate};
pub use extensions::{BasicConstraints, Extension, GeneralName};
pub use name::{AttributeTypeAndValue, DistinguishedName};

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

// Certificate ::= SEQUENCE {
//     tbsCertificate     TBSCertificate,
//     signatureAlgorithm AlgorithmIdentifier,
//     signatureValue     BIT STRING }
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Cert {
    der: Vec<u8>,
    tbs: Vec<u8>,
    version: u8,
    serial: BigInt,
    signature_oid: ObjectIdentifier,
    issuer: DistinguishedName,
    issuer_der: Vec<u8>,
    subject: DistinguishedName,
    subject_der: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    spki: SubjectPublicKeyInfo,
    extensions: Vec<Extension>,
    signature: Vec<u8>,
}

const STAGE: &str = "Certificate";

fn read_algorithm_identifier<'a>(p: &mut Parser<'a>) -> Result<(&'a [u8], ObjectIdentifier)> {
    let alg = p.read_asn1_element(cryptobyte::SEQUENCE).der_context(STAGE)?;
    let oid = alg.parser().read_asn1_object_identifier().der_context(STAGE)?;
    Ok((alg.raw, oid))
}

impl X509Cert {
    pub fn from_der(der: &[u8]) -> Result<X509Cert> {
        let mut outer = Parser::new(der);
        let mut cert = outer.read_asn1_sequence().der_context(STAGE)?;
        outer.finish().der_context(STAGE)?;

        let tbs = cert.read_asn1_element(cryptobyte::SEQUENCE).der_context(STAGE)?;
        let (outer_alg, signature_oid) = read_algorithm_identifier(&mut cert)?;
        let signature = cert.read_asn1_bit_string().der_context(STAGE)?;
        cert.finish().der_context(STAGE)?;

        // TBSCertificate ::= SEQUENCE {
        //     version         [0] EXPLICIT Version DEFAULT v1,
        //     serialNumber    CertificateSerialNumber,
        //     signature       AlgorithmIdentifier,
        //     issuer          Name,
        //     validity        Validity,
        //     subject         Name,
        //     subjectPublicKeyInfo SubjectPublicKeyInfo,
        //     issuerUniqueID  [1] IMPLICIT UniqueIdentifier OPTIONAL,
        //     subjectUniqueID [2] IMPLICIT UniqueIdentifier OPTIONAL,
        //     extensions      [3] EXPLICIT Extensions OPTIONAL }
        let mut p = tbs.parser();
        let version = match p.read_optional_explicit(0).der_context(STAGE)? {
            Some(mut v) => {
                let n = v.read_asn1_i64().der_context(STAGE)?;
                v.finish().der_context(STAGE)?;
                match n {
                    0..=2 => n as u8 + 1,
                    _ => return Err(cryptobyte::Error::ASN1IntegerOutOfRange).der_context(STAGE),
                }
            }
            None => 1,
        };
        let serial = p.read_asn1_bigint().der_context(STAGE)?;
        let (inner_alg, _) = read_algorithm_identifier(&mut p)?;
        if inner_alg != outer_alg {
            return Err(Error::unsupported_format(
                STAGE,
                "signature algorithm differs between certificate and TBSCertificate",
            ));
        }

        let issuer = p.read_asn1_element(cryptobyte::SEQUENCE).der_context(STAGE)?;
        let mut validity = p.read_asn1_sequence().der_context(STAGE)?;
        let not_before = validity.read_asn1_time().der_context(STAGE)?;
        let not_after = validity.read_asn1_time().der_context(STAGE)?;
        validity.finish().der_context(STAGE)?;
        let subject = p.read_asn1_element(cryptobyte::SEQUENCE).der_context(STAGE)?;
        let spki = p.read_asn1_element(cryptobyte::SEQUENCE).der_context(STAGE)?;

        p.read_optional_asn1(Tag::context(1)).der_context(STAGE)?;
        p.read_optional_asn1(Tag::context(2)).der_context(STAGE)?;
        let mut extensions = Vec::new();
        if let Some(mut exts) = p.read_optional_explicit(3).der_context(STAGE)? {
            let mut list = exts.read_asn1_sequence().der_context(STAGE)?;
            exts.finish().der_context(STAGE)?;
            while !list.empty() {
                let ext = Extension::read(&mut list)?;
                if extensions.iter().any(|e: &Extension| e.oid == ext.oid) {
                    return Err(Error::unsupported_format(
                        STAGE,
                        format!("extension {} appears twice", ext.oid),
                    ));
                }
                extensions.push(ext);
            }
        }
        p.finish().der_context(STAGE)?;

        let cert = X509Cert {
            der: der.to_vec(),
            tbs: tbs.raw.to_vec(),
            version,
            serial,
            signature_oid,
            issuer: DistinguishedName::from_der(issuer.raw)?,
            issuer_der: issuer.raw.to_vec(),
            subject: DistinguishedName::from_der(subject.raw)?,
            subject_der: subject.raw.to_vec(),
            not_before,
            not_after,
            spki: SubjectPublicKeyInfo::from_der(spki.raw)?,
            extensions,
            signature: signature.as_slice().to_vec(),
        };
        trace!("parsed certificate {} serial {:x}", cert.subject, cert.serial);
        Ok(cert)
    }

    // The first CERTIFICATE block of a PEM text.
    pub fn from_pem(text: &str) -> Result<X509Cert> {
        Self::from_pem_named(text, "PEM input")
    }

    fn from_pem_named(text: &str, source_name: &str) -> Result<X509Cert> {
        let blocks = pem::decode_blocks(text, CERTIFICATE_LABEL, source_name)?;
        match blocks.first() {
            Some(der) => X509Cert::from_der(der),
            None => Err(Error::unsupported_format(source_name, "no CERTIFICATE block")),
        }
    }

    pub fn read_pem_file<P: AsRef<Path>>(path: P) -> Result<X509Cert> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_pem_named(&text, &path.display().to_string())
    }

    // Accepts either DER or PEM.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<X509Cert> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        if buf.first() == Some(&cryptobyte::SEQUENCE.0) {
            return X509Cert::from_der(&buf);
        }
        let text = String::from_utf8(buf).map_err(|_| Error::malformed_pem("certificate", "not UTF-8"))?;
        X509Cert::from_pem_named(&text, "certificate")
    }

    pub fn to_pem(&self) -> String {
        pem::encode_pem(CERTIFICATE_LABEL, &[], &self.der)
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    // DER of the TBSCertificate, the signed bytes.
    pub fn tbs(&self) -> &[u8] {
        &self.tbs
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn serial(&self) -> &BigInt {
        &self.serial
    }

    pub fn signature_oid(&self) -> ObjectIdentifier {
        self.signature_oid
    }

    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(&self.signature_oid)
    }

    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer_der
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn subject_der(&self) -> &[u8] {
        &self.subject_der
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    pub fn public_key(&self) -> &SubjectPublicKeyInfo {
        &self.spki
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn is_self_issued(&self) -> bool {
        self.issuer_der == self.subject_der
    }

    pub fn extension(&self, oid: &ObjectIdentifier) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.oid == *oid)
    }

    pub fn basic_constraints(&self) -> Result<Option<BasicConstraints>> {
        self.extension(&OidExtensionBasicConstraints)
            .map(|e| BasicConstraints::from_der(&e.value))
            .transpose()
    }

    // True only with a Basic Constraints extension asserting cA.
    pub fn is_ca(&self) -> Result<bool> {
        Ok(self.basic_constraints()?.is_some_and(|bc| bc.ca))
    }

    pub fn subject_key_id(&self) -> Result<Option<Vec<u8>>> {
        self.extension(&OidExtensionSubjectKeyId)
            .map(|e| extensions::parse_subject_key_id(&e.value))
            .transpose()
    }

    pub fn authority_key_id(&self) -> Result<Option<Vec<u8>>> {
        match self.extension(&OidExtensionAuthorityKeyId) {
            Some(e) => extensions::parse_authority_key_id(&e.value),
            None => Ok(None),
        }
    }

    pub fn subject_alt_names(&self) -> Result<Vec<GeneralName>> {
        match self.extension(&OidExtensionSubjectAltName) {
            Some(e) => extensions::parse_subject_alt_names(&e.value),
            None => Ok(Vec::new()),
        }
    }

    // Checks the signature against the issuer's public key.
    pub fn verify_signed_by(&self, issuer: &SubjectPublicKeyInfo) -> Result<()> {
        let algorithm = self
            .signature_algorithm()
            .ok_or_else(|| Error::unsupported_oid("signature", &self.signature_oid, None))?;
        verify_signature(issuer, algorithm, &self.tbs, &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyMaterial;

    pub(crate) fn fixture_path(name: &str) -> String {
        format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    pub(crate) fn fixture_key(name: &str) -> KeyMaterial {
        crate::pem::read_private_key(fixture_path(name), || None).unwrap()
    }

    #[test]
    fn test_parse_ca_fixture() {
        let ca = X509Cert::read_pem_file(fixture_path("ca.pem")).unwrap();
        assert_eq!(ca.version(), 3);
        assert_eq!(ca.subject().to_string(), "CN=Example Root CA,O=Example CA,C=CN");
        assert!(ca.is_self_issued());
        assert_eq!(ca.signature_algorithm(), Some(SignatureAlgorithm::Sha256WithRsa));
        assert_eq!(ca.serial().bits(), 156);
        assert_eq!(
            ca.basic_constraints().unwrap(),
            Some(BasicConstraints {
                ca: true,
                path_len: None
            })
        );
        assert!(ca.extension(&OidExtensionBasicConstraints).unwrap().critical);
        assert!(ca.is_ca().unwrap());
        assert!(ca.subject_alt_names().unwrap().is_empty());

        let key = fixture_key("rsa_pkcs1.pem");
        let spki = key.public_key_info().unwrap();
        assert_eq!(ca.public_key(), &spki);
        let ski = ca.subject_key_id().unwrap().unwrap();
        assert_eq!(ski, spki.key_identifier().to_vec());
        assert_eq!(ca.authority_key_id().unwrap(), Some(ski));
        ca.verify_signed_by(&spki).unwrap();
        assert!(ca.not_before() < ca.not_after());
    }

    #[test]
    fn test_not_ca_fixture() {
        let cert = X509Cert::from_reader(std::fs::File::open(fixture_path("not_ca.pem")).unwrap()).unwrap();
        assert_eq!(cert.subject().common_name(), Some("Not A CA"));
        assert_eq!(cert.basic_constraints().unwrap(), None);
        assert!(!cert.is_ca().unwrap());
        assert_eq!(cert.signature_algorithm(), Some(SignatureAlgorithm::Sha256WithEcdsa));
        cert.verify_signed_by(cert.public_key()).unwrap();

        let rsa = fixture_key("rsa_pkcs8.pem").public_key_info().unwrap();
        assert!(cert.verify_signed_by(&rsa).is_err());
    }

    #[test]
    fn test_der_and_pem_forms_agree() {
        let ca = X509Cert::read_pem_file(fixture_path("ca.pem")).unwrap();
        let from_der = X509Cert::from_reader(ca.as_der()).unwrap();
        assert_eq!(from_der, ca);
        assert_eq!(X509Cert::from_pem(&ca.to_pem()).unwrap(), ca);
    }

    #[test]
    fn test_tampered_signature_fails() {
        let ca = X509Cert::read_pem_file(fixture_path("ca.pem")).unwrap();
        let mut der = ca.as_der().to_vec();
        let last = der.len() - 1;
        der[last] ^= 1;
        let tampered = X509Cert::from_der(&der).unwrap();
        let err = tampered.verify_signed_by(ca.public_key()).unwrap_err();
        assert!(matches!(err, Error::BadSignature { .. }));
    }

    #[test]
    fn test_rejects() {
        assert!(matches!(
            X509Cert::from_pem("no certificate here\n"),
            Err(Error::UnsupportedFormat { .. })
        ));
        let ca = X509Cert::read_pem_file(fixture_path("ca.pem")).unwrap();
        let mut der = ca.as_der().to_vec();
        der.push(0);
        assert!(matches!(
            X509Cert::from_der(&der),
            Err(Error::MalformedEncoding { .. })
        ));
        assert!(X509Cert::from_der(&ca.as_der()[..100]).is_err());
    }
}
