use time::OffsetDateTime;
use x509_cert::Certificate;

use crate::definitions::x509::{profile::ValidityPeriod, ProfileViolation};

/// The validity window of a certificate.
pub fn validity_period(certificate: &Certificate) -> ValidityPeriod {
    let validity = certificate.tbs_certificate.validity;
    ValidityPeriod::new(
        OffsetDateTime::from(validity.not_before.to_system_time()),
        OffsetDateTime::from(validity.not_after.to_system_time()),
    )
}

/// Check certificate validity period against a specific time.
pub fn check_validity_period_at(
    certificate: &Certificate,
    at: OffsetDateTime,
) -> Vec<ProfileViolation> {
    let period = validity_period(certificate);
    let mut violations = vec![];

    if period.not_after < at {
        violations.push(ProfileViolation::Expired);
    }
    if period.not_before > at {
        violations.push(ProfileViolation::NotYetValid);
    }

    violations
}
