use const_oid::ObjectIdentifier;
use x509_cert::Certificate;

use crate::definitions::x509::{
    util::{attribute_name, attribute_value_to_str, subject_names},
    ProfileViolation,
};

/// The only value of a subject attribute, if present.
///
/// A name that appears twice, or that is not a readable string, is a violation.
pub fn optional_name(
    certificate: &Certificate,
    oid: ObjectIdentifier,
) -> Result<Option<String>, ProfileViolation> {
    let name = attribute_name(oid);
    let mut values = subject_names(certificate, oid);

    let Some(value) = values.next() else {
        return Ok(None);
    };

    if values.next().is_some() {
        return Err(ProfileViolation::MultipleNames(name));
    }

    attribute_value_to_str(value)
        .map(|value| Some(value.to_string()))
        .ok_or(ProfileViolation::Extension {
            extension: "subject",
            reason: format!("{name} is not a string"),
        })
}

/// The only value of a mandatory subject attribute.
pub fn required_name(
    certificate: &Certificate,
    oid: ObjectIdentifier,
) -> Result<String, ProfileViolation> {
    optional_name(certificate, oid)?.ok_or(ProfileViolation::MissingName(attribute_name(oid)))
}
