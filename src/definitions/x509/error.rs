use crate::{cose::key::KeyError, cose::KeyType, error::ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to decode certificate: {0}")]
    Decoding(der::Error),
    #[error("unable to encode certificate: {0}")]
    Encoding(der::Error),
    #[error("invalid PEM: {0}")]
    Pem(String),
    #[error("invalid x5chain: {0}")]
    X5Chain(String),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("certificate profile violated: {}", join(.0))]
    Profile(Vec<ProfileViolation>),
    #[error("certificate signature does not verify under the issuer key")]
    SignatureInvalid,
}

/// A single ISO 18013-5 Annex B constraint that a certificate or its profile data breaks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileViolation {
    #[error("key type {0} is not permitted, a curve-based key is required")]
    KeyType(KeyType),
    #[error("serial number has {bits} bits in {octets} octets, expected 63..=160 bits in at most 20 octets")]
    SerialNumber { bits: usize, octets: usize },
    #[error("serial number must be positive")]
    NegativeSerialNumber,
    #[error("notBefore must be strictly before notAfter")]
    ValidityOrder,
    #[error("validity of {days} days exceeds the maximum of {max_days} days")]
    ValidityTooLong { days: i64, max_days: i64 },
    #[error("certificate has expired")]
    Expired,
    #[error("certificate is not yet valid")]
    NotYetValid,
    #[error("validity window is not inside the issuing IACA's validity window")]
    ValidityOutsideIssuer,
    #[error("'{0}' is not an ISO 3166-1 alpha-2 country code")]
    Country(String),
    #[error("subject {0} must not be blank when present")]
    BlankName(&'static str),
    #[error("subject has no {0}")]
    MissingName(&'static str),
    #[error("subject {0} appears more than once")]
    MultipleNames(&'static str),
    #[error("subject {name} differs from the issuer: '{this}' != '{that}'")]
    NameMismatch {
        name: &'static str,
        this: String,
        that: String,
    },
    #[error("issuer alternative name needs a URI or an email address")]
    IssuerAlternativeName,
    #[error("CRL distribution point URI must not be blank")]
    CrlDistributionPoint,
    #[error("{0}: required extension not found")]
    MissingExtension(&'static str),
    #[error("{extension}: expected critical = {expected}")]
    Criticality {
        extension: &'static str,
        expected: bool,
    },
    #[error("extension is not allowed: {0}")]
    DisallowedExtension(String),
    #[error("contains unknown critical extension: {0}")]
    UnknownCriticalExtension(String),
    #[error("{extension}: {reason}")]
    Extension {
        extension: &'static str,
        reason: String,
    },
    #[error("authority key identifier does not match the IACA subject key identifier")]
    AuthorityKeyIdentifier,
}

fn join(violations: &[ProfileViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Profile(_) => ErrorKind::Profile,
            Error::SignatureInvalid => ErrorKind::Integrity,
            Error::Key(KeyError::UnsupportedKeyType(_))
            | Error::Key(KeyError::UnsupportedAlgorithm(_)) => ErrorKind::UnsupportedAlgorithm,
            _ => ErrorKind::Malformed,
        }
    }

    /// The violations carried by a profile error, empty for any other error.
    pub fn violations(&self) -> &[ProfileViolation] {
        match self {
            Error::Profile(violations) => violations,
            _ => &[],
        }
    }
}

impl From<Vec<ProfileViolation>> for Error {
    fn from(violations: Vec<ProfileViolation>) -> Self {
        Error::Profile(violations)
    }
}

impl From<ProfileViolation> for Error {
    fn from(violation: ProfileViolation) -> Self {
        Error::Profile(vec![violation])
    }
}

/// Turn collected violations into a result.
pub(crate) fn check(violations: Vec<ProfileViolation>) -> Result<(), Error> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::Profile(violations))
    }
}
