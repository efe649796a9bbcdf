//! Validation of a Document Signer certificate against the IACA that issued it.
//!
//! Parsing into [DocumentSignerCertificate] and [IacaCertificate] already enforces the
//! structural parts of the profile. The validator adds the checks that relate the two
//! certificates, the numeric limits, and the time-dependent checks.
use time::OffsetDateTime;

use self::{
    extensions::key_identifier_check, signature::issuer_signed_subject,
    validity::check_validity_period_at,
};
use super::{
    decoded::{DocumentSignerCertificate, IacaCertificate},
    error::check,
    serial, Error, ProfileViolation,
};

pub(crate) mod extensions;
pub(crate) mod names;
pub(crate) mod signature;
pub(crate) mod validity;

/// Options for certificate validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// The time to use for validity period checks.
    /// If `None`, the current system time is used.
    pub validation_time: Option<OffsetDateTime>,
}

impl ValidationOptions {
    /// Get the validation time, defaulting to current time if not set.
    pub fn validation_time(&self) -> OffsetDateTime {
        self.validation_time.unwrap_or_else(OffsetDateTime::now_utc)
    }
}

/// Which checks [DocumentSignerValidator] runs. Everything is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSignerValidationConfig {
    /// Validity duration and subject names of both certificates.
    pub profile: bool,
    /// Country and state match the IACA, and the validity window lies inside the IACA's.
    pub against_iaca: bool,
    /// The DS authority key identifier equals the IACA subject key identifier.
    pub authority_key_identifier: bool,
    pub serial_number: bool,
    /// The DS is not a CA.
    pub basic_constraints: bool,
    /// The IACA key signed the DS.
    pub signature: bool,
    /// Both certificates are valid at the validation time.
    pub validity_at_time: bool,
}

impl Default for DocumentSignerValidationConfig {
    fn default() -> Self {
        Self {
            profile: true,
            against_iaca: true,
            authority_key_identifier: true,
            serial_number: true,
            basic_constraints: true,
            signature: true,
            validity_at_time: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentSignerValidator {
    config: DocumentSignerValidationConfig,
}

impl DocumentSignerValidator {
    pub fn new(config: DocumentSignerValidationConfig) -> Self {
        Self { config }
    }

    /// Run every enabled check.
    ///
    /// Profile violations from all checks are reported together; a bad signature is reported
    /// on its own, after the profile checks have passed.
    pub async fn validate(
        &self,
        ds: &DocumentSignerCertificate,
        iaca: &IacaCertificate,
        options: &ValidationOptions,
    ) -> Result<(), Error> {
        let config = self.config;
        let ds_cert = &ds.certificate().inner;
        let iaca_cert = &iaca.certificate().inner;
        let mut violations: Vec<ProfileViolation> = vec![];

        if config.profile {
            violations.extend(ds.profile.check());
            violations.extend(iaca.profile.check());
        }

        if config.against_iaca {
            violations.extend(ds.profile.check_against(&iaca.profile));
        }

        if config.authority_key_identifier && !key_identifier_check(iaca_cert, ds_cert) {
            violations.push(ProfileViolation::AuthorityKeyIdentifier);
        }

        if config.serial_number {
            for certificate in [ds_cert, iaca_cert] {
                if let Err(violation) = serial::validate(&certificate.tbs_certificate.serial_number)
                {
                    violations.push(violation);
                }
            }
        }

        if config.basic_constraints && ds.is_ca {
            violations.push(ProfileViolation::Extension {
                extension: "BasicConstraints",
                reason: "a document signer must not be a CA".into(),
            });
        }

        if config.validity_at_time {
            let at = options.validation_time();
            violations.extend(check_validity_period_at(ds_cert, at));
            violations.extend(check_validity_period_at(iaca_cert, at));
        }

        if !violations.is_empty() {
            tracing::debug!(
                "document signer '{}' failed {} profile checks",
                ds.profile.principal_name.common_name,
                violations.len()
            );
        }
        check(violations)?;

        if config.signature {
            issuer_signed_subject(ds_cert, &iaca.public_key()?).await?;
        }

        Ok(())
    }
}
