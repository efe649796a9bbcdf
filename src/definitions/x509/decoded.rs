//! Read-only views of parsed IACA and Document Signer certificates.
//!
//! Parsing fails when the certificate breaks a structural part of the profile: a missing or
//! malformed mandatory extension, a disallowed extension, an unexpected key usage, a subject
//! without a valid country, or a key that is not curve-based. Time-dependent and numeric
//! constraints are left to [DocumentSignerValidator](super::DocumentSignerValidator).
use const_oid::{
    db::{
        rfc2256::STATE_OR_PROVINCE_NAME,
        rfc4519::{COMMON_NAME, COUNTRY_NAME},
    },
    AssociatedOid,
};
use der::Decode;
use serde::Serialize;
use x509_cert::{
    ext::{
        pkix::{name::GeneralName, BasicConstraints, CrlDistributionPoints, IssuerAltName},
        Extension,
    },
    Certificate,
};

use super::{
    error::check,
    profile::{
        check_key_type, DocumentSignerProfile, IacaProfile, IssuerAlternativeName, PrincipalName,
    },
    util::{to_hex, LOCALITY_NAME, ORGANIZATION_NAME},
    validation::{
        extensions::{
            authority_key_identifier, distribution_point_uri, subject_key_identifier,
            validate_document_signer_certificate_extensions, validate_iaca_extensions,
        },
        names::{optional_name, required_name},
        validity::validity_period,
    },
    x5chain::CertificateWithDer,
    Error, ProfileViolation,
};
use crate::cose::{EcPublicKey, KeyType};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IacaCertificate {
    #[serde(skip)]
    certificate: CertificateWithDer,
    pub profile: IacaProfile,
    pub key_type: KeyType,
    /// Hex.
    pub serial_number: String,
    /// Hex.
    pub subject_key_identifier: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSignerCertificate {
    #[serde(skip)]
    certificate: CertificateWithDer,
    pub profile: DocumentSignerProfile,
    pub issuer_alternative_name: IssuerAlternativeName,
    pub key_type: KeyType,
    /// Hex.
    pub serial_number: String,
    /// Hex.
    pub subject_key_identifier: String,
    /// Hex.
    pub authority_key_identifier: String,
    pub is_ca: bool,
}

/// Parse a DER encoded IACA certificate.
pub fn parse_iaca(der: &[u8]) -> Result<IacaCertificate, Error> {
    IacaCertificate::try_from(CertificateWithDer::from_der(der)?)
}

/// Parse a DER encoded Document Signer certificate.
pub fn parse_document_signer(der: &[u8]) -> Result<DocumentSignerCertificate, Error> {
    DocumentSignerCertificate::try_from(CertificateWithDer::from_der(der)?)
}

impl TryFrom<CertificateWithDer> for IacaCertificate {
    type Error = Error;

    fn try_from(certificate: CertificateWithDer) -> Result<Self, Error> {
        let cert = &certificate.inner;
        let key_type = KeyType::from_spki(&cert.tbs_certificate.subject_public_key_info)?;

        let mut violations = check_key_type(key_type);
        violations.extend(validate_iaca_extensions(cert));
        let principal_name = collect(&mut violations, principal_name(cert, false));
        if let Some(name) = &principal_name {
            violations.extend(country(name));
        }
        check(violations)?;

        let profile = IacaProfile {
            principal_name: principal_name.ok_or(ProfileViolation::MissingName("subject"))?,
            validity_period: validity_period(cert),
            issuer_alternative_name: issuer_alternative_name(cert),
            crl_distribution_point_uri: crl_distribution_point_uri(cert).unwrap_or_default(),
        };

        Ok(Self {
            key_type,
            serial_number: to_hex(cert.tbs_certificate.serial_number.as_bytes()),
            subject_key_identifier: subject_key_identifier(cert)
                .map(|ski| to_hex(&ski))
                .unwrap_or_default(),
            profile,
            certificate,
        })
    }
}

impl TryFrom<CertificateWithDer> for DocumentSignerCertificate {
    type Error = Error;

    fn try_from(certificate: CertificateWithDer) -> Result<Self, Error> {
        let cert = &certificate.inner;
        let key_type = KeyType::from_spki(&cert.tbs_certificate.subject_public_key_info)?;

        let mut violations = check_key_type(key_type);
        violations.extend(validate_document_signer_certificate_extensions(cert));
        let principal_name = collect(&mut violations, principal_name(cert, true));
        if let Some(name) = &principal_name {
            violations.extend(country(name));
        }
        check(violations)?;

        let profile = DocumentSignerProfile {
            principal_name: principal_name.ok_or(ProfileViolation::MissingName("subject"))?,
            validity_period: validity_period(cert),
            crl_distribution_point_uri: crl_distribution_point_uri(cert).unwrap_or_default(),
        };

        Ok(Self {
            issuer_alternative_name: issuer_alternative_name(cert),
            key_type,
            serial_number: to_hex(cert.tbs_certificate.serial_number.as_bytes()),
            subject_key_identifier: subject_key_identifier(cert)
                .map(|ski| to_hex(&ski))
                .unwrap_or_default(),
            authority_key_identifier: authority_key_identifier(cert)
                .map(|aki| to_hex(&aki))
                .unwrap_or_default(),
            is_ca: basic_constraints(cert).is_some_and(|bc| bc.ca),
            profile,
            certificate,
        })
    }
}

impl IacaCertificate {
    pub fn certificate(&self) -> &CertificateWithDer {
        &self.certificate
    }

    pub fn public_key(&self) -> Result<EcPublicKey, Error> {
        Ok(super::util::public_key(&self.certificate.inner)?)
    }
}

impl DocumentSignerCertificate {
    pub fn certificate(&self) -> &CertificateWithDer {
        &self.certificate
    }

    pub fn public_key(&self) -> Result<EcPublicKey, Error> {
        Ok(super::util::public_key(&self.certificate.inner)?)
    }
}

fn collect<T>(
    violations: &mut Vec<ProfileViolation>,
    result: Result<T, ProfileViolation>,
) -> Option<T> {
    result.map_err(|violation| violations.push(violation)).ok()
}

fn principal_name(
    certificate: &Certificate,
    allow_locality: bool,
) -> Result<PrincipalName, ProfileViolation> {
    let locality_name = optional_name(certificate, LOCALITY_NAME)?;
    if !allow_locality && locality_name.is_some() {
        return Err(ProfileViolation::Extension {
            extension: "subject",
            reason: "an IACA subject carries no localityName".into(),
        });
    }
    Ok(PrincipalName {
        country: required_name(certificate, COUNTRY_NAME)?,
        common_name: required_name(certificate, COMMON_NAME)?,
        state_or_province_name: optional_name(certificate, STATE_OR_PROVINCE_NAME)?,
        organization_name: optional_name(certificate, ORGANIZATION_NAME)?,
        locality_name,
    })
}

fn country(name: &PrincipalName) -> Vec<ProfileViolation> {
    name.check(true)
        .into_iter()
        .filter(|v| matches!(v, ProfileViolation::Country(_)))
        .collect()
}

fn extension<'a, T: AssociatedOid + Decode<'a>>(certificate: &'a Certificate) -> Option<T> {
    certificate
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|ext: &&Extension| ext.extn_id == T::OID)
        .and_then(|ext| T::from_der(ext.extn_value.as_bytes()).ok())
}

fn issuer_alternative_name(certificate: &Certificate) -> IssuerAlternativeName {
    let mut ian = IssuerAlternativeName::default();
    for name in extension::<IssuerAltName>(certificate).into_iter().flat_map(|names| names.0) {
        match name {
            GeneralName::UniformResourceIdentifier(uri) if ian.uri.is_none() => {
                ian.uri = Some(uri.to_string())
            }
            GeneralName::Rfc822Name(email) if ian.email.is_none() => {
                ian.email = Some(email.to_string())
            }
            _ => {}
        }
    }
    ian
}

fn crl_distribution_point_uri(certificate: &Certificate) -> Option<String> {
    extension::<CrlDistributionPoints>(certificate)?
        .0
        .iter()
        .find_map(distribution_point_uri)
        .map(ToString::to_string)
}

fn basic_constraints(certificate: &Certificate) -> Option<BasicConstraints> {
    extension::<BasicConstraints>(certificate)
}
