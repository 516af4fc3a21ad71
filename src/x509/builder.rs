use chrono::{DateTime, Datelike, Days, SubsecRound, Utc};
use num::BigUint;

use super::extensions::{
    BasicConstraints, Extension, GeneralName, authority_key_id_extension, subject_alt_name_extension,
    subject_key_id_extension,
};
use super::{DistinguishedName, X509Cert};
use crate::cryptobyte::Builder;
use crate::cryptobyte::asn1::BitString;
use crate::error::DerContext;
use crate::key::{KeyMaterial, SignatureAlgorithm, SubjectPublicKeyInfo};
use crate::log::{debug, trace};
use crate::random;
use crate::{Error, Result};

// What to put into a new certificate and who signs it. Without an issuer
// certificate the result is a self-signed CA certificate.
#[derive(Debug, Clone)]
pub struct CertificateRequest<'a> {
    pub subject: DistinguishedName,
    pub subject_alt_names: Option<Vec<GeneralName>>,
    // None picks SHA-256 in the signing key's family.
    pub signature_algorithm: Option<SignatureAlgorithm>,
    pub issuer_key: Option<&'a KeyMaterial>,
    pub issuer_certificate: Option<&'a X509Cert>,
    pub subject_key: &'a KeyMaterial,
    pub validity_days: u32,
}

impl<'a> CertificateRequest<'a> {
    pub fn new(subject: DistinguishedName, subject_key: &'a KeyMaterial, validity_days: u32) -> Self {
        CertificateRequest {
            subject,
            subject_alt_names: None,
            signature_algorithm: None,
            issuer_key: None,
            issuer_certificate: None,
            subject_key,
            validity_days,
        }
    }

    pub fn with_subject_alt_names(mut self, names: Vec<GeneralName>) -> Self {
        self.subject_alt_names = Some(names);
        self
    }

    pub fn with_signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = Some(algorithm);
        self
    }

    pub fn with_issuer(mut self, key: &'a KeyMaterial, certificate: &'a X509Cert) -> Self {
        self.issuer_key = Some(key);
        self.issuer_certificate = Some(certificate);
        self
    }

    pub fn with_issuer_key(mut self, key: &'a KeyMaterial) -> Self {
        self.issuer_key = Some(key);
        self
    }

    pub fn with_issuer_certificate(mut self, certificate: &'a X509Cert) -> Self {
        self.issuer_certificate = Some(certificate);
        self
    }

    fn is_self_signed(&self) -> bool {
        self.issuer_certificate.is_none()
    }
}

fn same_public_key(a: &SubjectPublicKeyInfo, b: &SubjectPublicKeyInfo) -> bool {
    a.algorithm_oid() == b.algorithm_oid() && a.key_bits() == b.key_bits()
}

fn validity(days: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let not_before = Utc::now().trunc_subsecs(0);
    let not_after = not_before
        .checked_add_days(Days::new(days as u64))
        .filter(|t| t.year() <= 9999)
        .ok_or_else(|| Error::invalid_input("validity", format!("{} days from now is past year 9999", days)))?;
    Ok((not_before, not_after))
}

struct Tbs<'r> {
    serial: BigUint,
    algorithm: SignatureAlgorithm,
    issuer: &'r [u8],
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    subject: &'r [u8],
    spki: &'r SubjectPublicKeyInfo,
    extensions: Vec<Extension>,
}

impl Tbs<'_> {
    fn to_der(&self) -> Result<Vec<u8>> {
        let mut b = Builder::new(Vec::new());
        b.add_asn1_sequence(|b| {
            // v3
            b.add_asn1_explicit(0, |b| b.add_asn1_u64(2));
            b.add_asn1_biguint(&self.serial);
            self.algorithm.add_algorithm_identifier(b);
            b.add_bytes(self.issuer);
            b.add_asn1_sequence(|b| {
                b.add_asn1_time(&self.not_before);
                b.add_asn1_time(&self.not_after);
            });
            b.add_bytes(self.subject);
            b.add_bytes(self.spki.as_der());
            b.add_asn1_explicit(3, |b| {
                b.add_asn1_sequence(|b| {
                    for ext in &self.extensions {
                        ext.encode(b);
                    }
                })
            });
        });
        b.take().der_context("TBSCertificate")
    }
}

// Builds, signs and returns a fresh X.509v3 certificate.
pub fn sign_certificate(request: &CertificateRequest) -> Result<X509Cert> {
    if let Some(ca) = request.issuer_certificate {
        if !ca.is_ca()? {
            return Err(Error::InvalidCaCertificate {
                subject: ca.subject().to_string(),
            });
        }
    }

    let signing_key = request.issuer_key.unwrap_or(request.subject_key);
    let subject_spki = request.subject_key.public_key_info()?;
    let authority_spki = signing_key.public_key_info()?;
    if let Some(ca) = request.issuer_certificate {
        if !same_public_key(&authority_spki, ca.public_key()) {
            return Err(Error::IssuerKeyMismatch {
                subject: ca.subject().to_string(),
            });
        }
    }

    let algorithm = request
        .signature_algorithm
        .unwrap_or_else(|| SignatureAlgorithm::default_for(signing_key));
    if algorithm.key_algorithm() != signing_key.algorithm() {
        return Err(Error::unsupported_name(
            "signature",
            format!("{} with an {} key", algorithm, signing_key.algorithm()),
        ));
    }

    let (not_before, not_after) = validity(request.validity_days)?;
    let subject_der = request.subject.to_der()?;
    let issuer_der = match request.issuer_certificate {
        Some(ca) => ca.subject_der().to_vec(),
        None => subject_der.clone(),
    };

    let mut extensions = vec![
        subject_key_id_extension(&subject_spki.key_identifier())?,
        authority_key_id_extension(&authority_spki.key_identifier())?,
    ];
    if let Some(names) = &request.subject_alt_names {
        extensions.push(subject_alt_name_extension(names)?);
    }
    let constraints = BasicConstraints {
        ca: request.is_self_signed(),
        path_len: None,
    };
    extensions.push(constraints.to_extension(request.is_self_signed())?);

    let tbs = Tbs {
        serial: random::serial_number(),
        algorithm,
        issuer: &issuer_der,
        not_before,
        not_after,
        subject: &subject_der,
        spki: &subject_spki,
        extensions,
    }
    .to_der()?;
    trace!("TBSCertificate is {} bytes", tbs.len());

    let signature = signing_key.sign(algorithm, &tbs)?;
    let mut b = Builder::new(Vec::new());
    b.add_asn1_sequence(|b| {
        b.add_bytes(&tbs);
        algorithm.add_algorithm_identifier(b);
        b.add_asn1_bit_string(&BitString::from_bytes(signature.as_slice()));
    });
    let der = b.take().der_context("Certificate")?;

    let cert = X509Cert::from_der(&der)?;
    debug!(
        "issued certificate for {} serial {:x} signed with {} by {}",
        cert.subject(),
        cert.serial(),
        algorithm,
        cert.issuer()
    );
    Ok(cert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cryptobyte::asn1::ObjectIdentifier;
    use crate::cryptobyte::oid::*;
    use crate::x509::tests::{fixture_key, fixture_path};

    fn subject(s: &str) -> DistinguishedName {
        s.parse().unwrap()
    }

    fn ca() -> X509Cert {
        X509Cert::read_pem_file(fixture_path("ca.pem")).unwrap()
    }

    fn extension_oids(cert: &X509Cert) -> Vec<ObjectIdentifier> {
        cert.extensions().iter().map(|e| e.oid).collect()
    }

    #[test]
    fn test_self_signed() {
        let _ = env_logger::builder().is_test(true).try_init();
        let key = fixture_key("rsa_pkcs1.pem");
        let request = CertificateRequest::new(subject("C=CN, O=Example, CN=Server"), &key, 30);
        let cert = sign_certificate(&request).unwrap();

        assert_eq!(cert.version(), 3);
        assert_eq!(cert.subject().to_string(), "CN=Server,O=Example,C=CN");
        assert_eq!(cert.issuer(), cert.subject());
        assert_eq!(cert.not_after() - cert.not_before(), chrono::Duration::days(30));
        assert!(cert.serial().bits() <= 160);
        assert_eq!(cert.signature_algorithm(), Some(SignatureAlgorithm::Sha256WithRsa));
        assert_eq!(
            extension_oids(&cert),
            vec![OidExtensionSubjectKeyId, OidExtensionAuthorityKeyId, OidExtensionBasicConstraints]
        );

        assert!(cert.is_ca().unwrap());
        assert!(cert.extension(&OidExtensionBasicConstraints).unwrap().critical);
        assert!(!cert.extension(&OidExtensionSubjectKeyId).unwrap().critical);
        let ski = cert.subject_key_id().unwrap().unwrap();
        assert_eq!(cert.authority_key_id().unwrap(), Some(ski.clone()));
        assert_eq!(ski, key.public_key_info().unwrap().key_identifier().to_vec());
        cert.verify_signed_by(cert.public_key()).unwrap();
    }

    #[test]
    fn test_issued_by_ca() {
        let ca = ca();
        let ca_key = fixture_key("rsa_pkcs8.pem");
        let key = fixture_key("ec_openssl.pem");
        let names = vec![
            "DNS:server.example.com".parse().unwrap(),
            "IP:192.0.2.7".parse().unwrap(),
        ];
        let request = CertificateRequest::new(subject("CN=server.example.com"), &key, 365)
            .with_issuer(&ca_key, &ca)
            .with_subject_alt_names(names.clone());
        let cert = sign_certificate(&request).unwrap();

        assert_eq!(cert.issuer_der(), ca.subject_der());
        assert_eq!(cert.signature_algorithm(), Some(SignatureAlgorithm::Sha256WithRsa));
        assert_eq!(cert.public_key(), &key.public_key_info().unwrap());
        assert_eq!(cert.subject_alt_names().unwrap(), names);
        assert_eq!(cert.authority_key_id().unwrap(), ca.subject_key_id().unwrap());
        assert_eq!(
            extension_oids(&cert),
            vec![
                OidExtensionSubjectKeyId,
                OidExtensionAuthorityKeyId,
                OidExtensionSubjectAltName,
                OidExtensionBasicConstraints
            ]
        );

        let bc = cert.extension(&OidExtensionBasicConstraints).unwrap();
        assert!(!bc.critical);
        assert!(!cert.is_ca().unwrap());
        assert!(!cert.extension(&OidExtensionSubjectAltName).unwrap().critical);
        cert.verify_signed_by(ca.public_key()).unwrap();
        assert!(cert.verify_signed_by(cert.public_key()).is_err());
    }

    #[test]
    fn test_issuer_must_be_ca() {
        let not_ca = X509Cert::read_pem_file(fixture_path("not_ca.pem")).unwrap();
        let issuer_key = fixture_key("ec_openssl.pem");
        let key = fixture_key("rsa_pkcs1.pem");
        let request = CertificateRequest::new(subject("CN=leaf"), &key, 1).with_issuer(&issuer_key, &not_ca);
        match sign_certificate(&request) {
            Err(Error::InvalidCaCertificate { subject }) => assert_eq!(subject, "CN=Not A CA"),
            other => panic!("unexpected {:?}", other.map(|c| c.subject().to_string())),
        }
    }

    #[test]
    fn test_issuer_key_must_match() {
        let ca = ca();
        let key = fixture_key("ec_openssl.pem");
        let request = CertificateRequest::new(subject("CN=leaf"), &key, 1).with_issuer(&key, &ca);
        assert!(matches!(sign_certificate(&request), Err(Error::IssuerKeyMismatch { .. })));

        // the subject key would sign
        let request = CertificateRequest::new(subject("CN=leaf"), &key, 1).with_issuer_certificate(&ca);
        assert!(matches!(sign_certificate(&request), Err(Error::IssuerKeyMismatch { .. })));
    }

    #[test]
    fn test_issuer_key_without_certificate() {
        let issuer_key = fixture_key("rsa_pkcs1.pem");
        let key = fixture_key("ec_openssl.pem");
        let request = CertificateRequest::new(subject("CN=cross"), &key, 1).with_issuer_key(&issuer_key);
        let cert = sign_certificate(&request).unwrap();

        // no issuer certificate: issuer name is the subject, AKI names the signing key
        assert_eq!(cert.issuer(), cert.subject());
        assert!(cert.is_ca().unwrap());
        assert_eq!(
            cert.subject_key_id().unwrap(),
            Some(key.public_key_info().unwrap().key_identifier().to_vec())
        );
        assert_eq!(
            cert.authority_key_id().unwrap(),
            Some(issuer_key.public_key_info().unwrap().key_identifier().to_vec())
        );
        assert_ne!(cert.authority_key_id().unwrap(), cert.subject_key_id().unwrap());
        assert_eq!(cert.signature_algorithm(), Some(SignatureAlgorithm::Sha256WithRsa));
        cert.verify_signed_by(&issuer_key.public_key_info().unwrap()).unwrap();
        assert!(cert.verify_signed_by(cert.public_key()).is_err());
    }

    #[test]
    fn test_generated_key() {
        let ca_key = KeyMaterial::generate_rsa(2048).unwrap();
        let ca = sign_certificate(&CertificateRequest::new(subject("CN=Generated CA"), &ca_key, 10)).unwrap();
        let key = KeyMaterial::generate_rsa(2048).unwrap();
        let request = CertificateRequest::new(subject("CN=client"), &key, 10).with_issuer(&ca_key, &ca);
        let cert = sign_certificate(&request).unwrap();

        let parsed = X509Cert::from_pem(&cert.to_pem()).unwrap();
        assert_eq!(parsed, cert);
        assert_eq!(parsed.public_key(), &key.public_key_info().unwrap());
        assert_eq!(parsed.issuer_der(), ca.subject_der());
        parsed.verify_signed_by(ca.public_key()).unwrap();
    }

    #[test]
    fn test_signature_algorithm_override() {
        let key = fixture_key("ec384_openssl.pem");
        let request = CertificateRequest::new(subject("CN=p384"), &key, 7)
            .with_signature_algorithm(SignatureAlgorithm::Sha384WithEcdsa);
        let cert = sign_certificate(&request).unwrap();
        assert_eq!(cert.signature_algorithm(), Some(SignatureAlgorithm::Sha384WithEcdsa));
        cert.verify_signed_by(cert.public_key()).unwrap();

        let request = CertificateRequest::new(subject("CN=p384"), &key, 7)
            .with_signature_algorithm(SignatureAlgorithm::Sha256WithRsa);
        assert!(matches!(
            sign_certificate(&request),
            Err(Error::UnsupportedAlgorithm { .. })
        ));
    }

    #[test]
    fn test_dsa_self_signed() {
        let key = fixture_key("dsa_openssl.pem");
        let cert = sign_certificate(&CertificateRequest::new(subject("CN=dsa"), &key, 1)).unwrap();
        assert_eq!(cert.signature_algorithm(), Some(SignatureAlgorithm::Sha256WithDsa));
        cert.verify_signed_by(cert.public_key()).unwrap();
    }

    #[test]
    fn test_fresh_serials() {
        let key = fixture_key("ec_openssl.pem");
        let request = CertificateRequest::new(subject("CN=a"), &key, 1);
        let a = sign_certificate(&request).unwrap();
        let b = sign_certificate(&request).unwrap();
        assert_ne!(a.serial(), b.serial());
        assert_eq!(a.subject_key_id().unwrap(), b.subject_key_id().unwrap());
    }

    #[test]
    fn test_validity_out_of_range() {
        let key = fixture_key("ec_openssl.pem");
        let request = CertificateRequest::new(subject("CN=forever"), &key, u32::MAX);
        assert!(matches!(sign_certificate(&request), Err(Error::InvalidInput { .. })));
    }
}
