//! Profile data for IACA and Document Signer certificates, and the checks that run on it
//! before a certificate is built or after one is parsed.
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::ProfileViolation;
use crate::cose::KeyType;

/// Longest Document Signer validity.
pub const DS_MAX_VALIDITY_DAYS: i64 = 457;
/// Longest IACA validity: 15 years, leap days included.
pub const IACA_MAX_VALIDITY_DAYS: i64 = 5479;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalName {
    pub country: String,
    pub common_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_or_province_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    /// Only Document Signers carry a locality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityPeriod {
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerAlternativeName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IacaProfile {
    pub principal_name: PrincipalName,
    pub validity_period: ValidityPeriod,
    pub issuer_alternative_name: IssuerAlternativeName,
    pub crl_distribution_point_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSignerProfile {
    pub principal_name: PrincipalName,
    pub validity_period: ValidityPeriod,
    pub crl_distribution_point_uri: String,
}

impl ValidityPeriod {
    /// Whole seconds, as certificates carry them.
    pub fn new(not_before: OffsetDateTime, not_after: OffsetDateTime) -> Self {
        Self {
            not_before: whole_seconds(not_before),
            not_after: whole_seconds(not_after),
        }
    }

    /// Starting now, for the given number of days.
    pub fn days_from_now(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self::new(now, now + Duration::days(days))
    }

    pub fn duration(&self) -> Duration {
        self.not_after - self.not_before
    }

    pub fn contains(&self, other: &ValidityPeriod) -> bool {
        self.not_before <= other.not_before && other.not_after <= self.not_after
    }

    pub(crate) fn check(&self, max_days: i64) -> Vec<ProfileViolation> {
        let mut violations = vec![];
        if self.not_before >= self.not_after {
            violations.push(ProfileViolation::ValidityOrder);
        }
        if self.duration() > Duration::days(max_days) {
            violations.push(ProfileViolation::ValidityTooLong {
                days: self.duration().whole_days(),
                max_days,
            });
        }
        violations
    }
}

/// Drop the sub-second part of `datetime`.
pub fn whole_seconds(datetime: OffsetDateTime) -> OffsetDateTime {
    datetime - Duration::nanoseconds(datetime.nanosecond().into())
}

/// Two uppercase letters naming an assigned ISO 3166-1 country.
pub fn is_valid_country_code(code: &str) -> bool {
    code.len() == 2
        && code.chars().all(|c| c.is_ascii_uppercase())
        && rust_iso3166::from_alpha2(code).is_some()
}

impl PrincipalName {
    pub(crate) fn check(&self, allow_locality: bool) -> Vec<ProfileViolation> {
        let mut violations = vec![];
        if !is_valid_country_code(&self.country) {
            violations.push(ProfileViolation::Country(self.country.clone()));
        }
        if self.common_name.trim().is_empty() {
            violations.push(ProfileViolation::BlankName("commonName"));
        }
        let optional = [
            ("stateOrProvinceName", &self.state_or_province_name),
            ("organizationName", &self.organization_name),
            ("localityName", &self.locality_name),
        ];
        for (name, value) in optional {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                violations.push(ProfileViolation::BlankName(name));
            }
        }
        if !allow_locality && self.locality_name.is_some() {
            violations.push(ProfileViolation::Extension {
                extension: "subject",
                reason: "an IACA subject carries no localityName".into(),
            });
        }
        violations
    }
}

impl IssuerAlternativeName {
    pub(crate) fn check(&self) -> Vec<ProfileViolation> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|v| !v.trim().is_empty());
        if present(&self.uri) || present(&self.email) {
            vec![]
        } else {
            vec![ProfileViolation::IssuerAlternativeName]
        }
    }
}

pub(crate) fn check_crl_uri(uri: &str) -> Vec<ProfileViolation> {
    if uri.trim().is_empty() {
        vec![ProfileViolation::CrlDistributionPoint]
    } else {
        vec![]
    }
}

/// Only curve-based keys may sign or be certified.
pub(crate) fn check_key_type(key_type: KeyType) -> Vec<ProfileViolation> {
    if key_type.is_curve_based() {
        vec![]
    } else {
        vec![ProfileViolation::KeyType(key_type)]
    }
}

impl IacaProfile {
    pub(crate) fn check(&self) -> Vec<ProfileViolation> {
        let mut violations = self.principal_name.check(false);
        violations.extend(self.validity_period.check(IACA_MAX_VALIDITY_DAYS));
        violations.extend(self.issuer_alternative_name.check());
        violations.extend(check_crl_uri(&self.crl_distribution_point_uri));
        violations
    }
}

impl DocumentSignerProfile {
    pub(crate) fn check(&self) -> Vec<ProfileViolation> {
        let mut violations = self.principal_name.check(true);
        violations.extend(self.validity_period.check(DS_MAX_VALIDITY_DAYS));
        violations.extend(check_crl_uri(&self.crl_distribution_point_uri));
        violations
    }

    /// Shared subject fields and the validity window must agree with the issuing IACA.
    pub(crate) fn check_against(&self, iaca: &IacaProfile) -> Vec<ProfileViolation> {
        let mut violations = vec![];
        if self.principal_name.country != iaca.principal_name.country {
            violations.push(ProfileViolation::NameMismatch {
                name: "countryName",
                this: self.principal_name.country.clone(),
                that: iaca.principal_name.country.clone(),
            });
        }
        if self.principal_name.state_or_province_name
            != iaca.principal_name.state_or_province_name
        {
            violations.push(ProfileViolation::NameMismatch {
                name: "stateOrProvinceName",
                this: self
                    .principal_name
                    .state_or_province_name
                    .clone()
                    .unwrap_or_default(),
                that: iaca
                    .principal_name
                    .state_or_province_name
                    .clone()
                    .unwrap_or_default(),
            });
        }
        if !iaca.validity_period.contains(&self.validity_period) {
            violations.push(ProfileViolation::ValidityOutsideIssuer);
        }
        violations
    }
}
