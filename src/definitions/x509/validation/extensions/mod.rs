//! Extension requirements for IACA and Document Signer certificates, as given in tables
//! B.2 and B.4 of ISO 18013-5 Annex B.

mod authority_key_identifier;
mod basic_constraints;
mod crl_distribution_points;
mod extended_key_usage;
mod issuer_alternative_name;
mod key_usage;
mod subject_key_identifier;

use std::ops::Deref;

use const_oid::{db, AssociatedOid, ObjectIdentifier};
use der::Decode;
use x509_cert::{
    ext::{
        pkix::{
            AuthorityKeyIdentifier, FreshestCrl, InhibitAnyPolicy, NameConstraints,
            PolicyConstraints, PolicyMappings, SubjectKeyIdentifier,
        },
        Extension,
    },
    Certificate,
};

use crate::definitions::x509::ProfileViolation;

pub use authority_key_identifier::AuthorityKeyIdentifierValidator;
pub use basic_constraints::BasicConstraintsValidator;
pub use crl_distribution_points::{distribution_point_uri, CrlDistributionPointsValidator};
pub use extended_key_usage::{document_signer_extended_key_usage_oid, ExtendedKeyUsageValidator};
pub use issuer_alternative_name::IssuerAlternativeNameValidator;
pub use key_usage::KeyUsageValidator;
pub use subject_key_identifier::SubjectKeyIdentifierValidator;

/// Reason an extension's content is unacceptable.
type Error = String;

/// The subject key identifier of the issuer, if it carries one.
pub fn subject_key_identifier(certificate: &Certificate) -> Option<Vec<u8>> {
    find(certificate, SubjectKeyIdentifier::OID)
        .and_then(|ext| {
            SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes())
                .inspect_err(|e| tracing::warn!("failed to parse SubjectKeyIdentifier: {e}"))
                .ok()
        })
        .map(|ski| ski.0.as_bytes().to_vec())
}

/// The key identifier in the authority key identifier extension, if any.
pub fn authority_key_identifier(certificate: &Certificate) -> Option<Vec<u8>> {
    find(certificate, AuthorityKeyIdentifier::OID)
        .and_then(|ext| {
            AuthorityKeyIdentifier::from_der(ext.extn_value.as_bytes())
                .inspect_err(|e| tracing::warn!("failed to parse AuthorityKeyIdentifier: {e}"))
                .ok()
        })
        .and_then(|aki| aki.key_identifier)
        .map(|ki| ki.as_bytes().to_vec())
}

/// Validate that the subject key identifier of the issuer and the authority key identifier of the
/// subject are present and equal.
pub fn key_identifier_check(issuer: &Certificate, subject: &Certificate) -> bool {
    match (subject_key_identifier(issuer), authority_key_identifier(subject)) {
        (Some(ski), Some(aki)) => {
            tracing::debug!("comparing key identifiers:\n\t{aki:?}\n\t{ski:?}");
            ski == aki
        }
        _ => false,
    }
}

fn find(certificate: &Certificate, oid: ObjectIdentifier) -> Option<&Extension> {
    certificate
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|ext| ext.extn_id == oid)
}

/// Validate IACA extensions according to 18013-5 Annex B.
pub fn validate_iaca_extensions(certificate: &Certificate) -> Vec<ProfileViolation> {
    tracing::debug!("validating IACA extensions...");

    let extensions = certificate.tbs_certificate.extensions.iter().flatten();

    let mut violations = check_for_disallowed_x509_extensions(extensions.clone());

    violations.extend(
        ExtensionValidators::default()
            .with(SubjectKeyIdentifierValidator::from_certificate(certificate))
            .with(KeyUsageValidator::iaca())
            .with(BasicConstraintsValidator::iaca())
            .with(CrlDistributionPointsValidator)
            .with(IssuerAlternativeNameValidator)
            .validate_extensions(extensions),
    );

    violations
}

/// Validate document signer extensions according to 18013-5 Annex B.
pub fn validate_document_signer_certificate_extensions(
    certificate: &Certificate,
) -> Vec<ProfileViolation> {
    tracing::debug!("validating document signer certificate extensions...");

    let extensions = certificate.tbs_certificate.extensions.iter().flatten();

    let mut violations = check_for_disallowed_x509_extensions(extensions.clone());

    violations.extend(
        ExtensionValidators::default()
            .with(SubjectKeyIdentifierValidator::from_certificate(certificate))
            .with(AuthorityKeyIdentifierValidator)
            .with(ExtendedKeyUsageValidator {
                expected_oid: document_signer_extended_key_usage_oid(),
            })
            .with(KeyUsageValidator::document_signer())
            .with(CrlDistributionPointsValidator)
            .with(IssuerAlternativeNameValidator)
            .optional(BasicConstraintsValidator::end_entity())
            .validate_extensions(extensions),
    );

    violations
}

#[derive(Default)]
struct ExtensionValidators(Vec<Expected>);

struct Expected {
    required: bool,
    found: bool,
    validator: Box<dyn ExtensionValidator>,
}

impl Deref for Expected {
    type Target = Box<dyn ExtensionValidator>;

    fn deref(&self) -> &Self::Target {
        &self.validator
    }
}

trait ExtensionValidator {
    fn oid(&self) -> ObjectIdentifier;
    fn ext_name(&self) -> &'static str;
    /// Whether the extension must be marked critical.
    fn critical(&self) -> bool;
    fn validate(&self, extension: &Extension) -> Vec<Error>;
}

impl ExtensionValidators {
    fn with<V: ExtensionValidator + 'static>(mut self, validator: V) -> Self {
        self.0.push(Expected {
            required: true,
            found: false,
            validator: Box::new(validator),
        });
        self
    }

    /// Checked when present, not required.
    fn optional<V: ExtensionValidator + 'static>(mut self, validator: V) -> Self {
        self.0.push(Expected {
            required: false,
            found: false,
            validator: Box::new(validator),
        });
        self
    }

    fn validate_extensions<'a, Extensions>(self, extensions: Extensions) -> Vec<ProfileViolation>
    where
        Extensions: IntoIterator<Item = &'a Extension>,
    {
        let mut violations = vec![];

        let mut validators = self.0;

        for ext in extensions {
            if let Some(validator) = validators.iter_mut().find(|validator| {
                tracing::debug!("searching for ext: '{}'", ext.extn_id);
                validator.oid() == ext.extn_id
            }) {
                tracing::debug!("validating expected extension: {}", ext.extn_id);
                if ext.critical != validator.critical() {
                    violations.push(ProfileViolation::Criticality {
                        extension: validator.ext_name(),
                        expected: validator.critical(),
                    });
                }
                violations.extend(validator.validate(ext).into_iter().map(|reason| {
                    ProfileViolation::Extension {
                        extension: validator.ext_name(),
                        reason,
                    }
                }));
                validator.found = true;
            } else if ext.critical {
                tracing::debug!(
                    "critical, non-required extension causing an error: {}",
                    ext.extn_id
                );
                violations.push(ProfileViolation::UnknownCriticalExtension(
                    ext.extn_id.to_string(),
                ));
            } else {
                tracing::debug!("non-critical, non-required extension ignored: {ext:?}")
            }
        }

        violations.extend(
            validators
                .iter()
                .filter(|v| v.required && !v.found)
                .map(|v| ProfileViolation::MissingExtension(v.ext_name())),
        );

        violations
    }
}

/// As identified in 18013-5 Annex B, section B.1.1.
fn check_for_disallowed_x509_extensions<'a, E>(extensions: E) -> Vec<ProfileViolation>
where
    E: Iterator<Item = &'a Extension> + Clone,
{
    let disallowed_extensions = [
        PolicyMappings::OID,
        NameConstraints::OID,
        PolicyConstraints::OID,
        InhibitAnyPolicy::OID,
        FreshestCrl::OID,
    ];

    extensions
        .map(|e| e.extn_id)
        .filter(|id| disallowed_extensions.contains(id))
        .map(|id| {
            ProfileViolation::DisallowedExtension(
                db::DB
                    .by_oid(&id)
                    .map(|s| s.to_string())
                    .unwrap_or(id.to_string()),
            )
        })
        .collect()
}

#[cfg(test)]
mod test {
    use der::{asn1::OctetString, Encode};
    use x509_cert::ext::pkix::{InhibitAnyPolicy, KeyUsage, KeyUsages};

    use super::*;

    fn extension<T: Encode + AssociatedOid>(value: &T, critical: bool) -> Extension {
        Extension {
            extn_id: T::OID,
            critical,
            extn_value: OctetString::new(value.to_der().unwrap()).unwrap(),
        }
    }

    #[test]
    fn disallowed_extension_is_reported() {
        let ext = extension(&InhibitAnyPolicy(0), true);
        let violations = check_for_disallowed_x509_extensions([&ext].into_iter());
        assert_eq!(violations.len(), 1);
        assert!(matches!(violations[0], ProfileViolation::DisallowedExtension(_)));
    }

    #[test]
    fn criticality_is_enforced() {
        let ext = extension(&KeyUsage(KeyUsages::DigitalSignature.into()), false);
        let violations = ExtensionValidators::default()
            .with(KeyUsageValidator::document_signer())
            .validate_extensions([&ext]);
        assert_eq!(
            violations,
            [ProfileViolation::Criticality {
                extension: "KeyUsage",
                expected: true
            }]
        );
    }

    #[test]
    fn missing_and_unknown_critical() {
        let ext = Extension {
            extn_id: ObjectIdentifier::new_unwrap("1.2.3.4"),
            critical: true,
            extn_value: OctetString::new(vec![5, 0]).unwrap(),
        };
        let violations = ExtensionValidators::default()
            .with(KeyUsageValidator::iaca())
            .optional(BasicConstraintsValidator::end_entity())
            .validate_extensions([&ext]);
        assert_eq!(
            violations,
            [
                ProfileViolation::UnknownCriticalExtension("1.2.3.4".into()),
                ProfileViolation::MissingExtension("KeyUsage"),
            ]
        );
    }
}
