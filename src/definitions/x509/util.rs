use const_oid::{
    db::{
        rfc2256::STATE_OR_PROVINCE_NAME,
        rfc4519::{COMMON_NAME, COUNTRY_NAME},
    },
    ObjectIdentifier,
};
use der::{
    asn1::{Ia5StringRef, PrintableStringRef, SetOfVec, TeletexStringRef, Utf8StringRef},
    Any, Tag, Tagged,
};
use x509_cert::{
    attr::{AttributeTypeAndValue, AttributeValue},
    name::{Name, RelativeDistinguishedName},
    Certificate,
};

use super::Error;
use crate::cose::key::{EcPublicKey, KeyError};

pub const ORGANIZATION_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
pub const LOCALITY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");

/// Get the public key from a certificate for verification.
pub fn public_key(certificate: &Certificate) -> Result<EcPublicKey, KeyError> {
    EcPublicKey::from_spki(&certificate.tbs_certificate.subject_public_key_info)
}

/// Get the first CommonName of the X.509 certificate, or return "Unknown".
pub fn common_name_or_unknown(certificate: &Certificate) -> &str {
    subject_names(certificate, COMMON_NAME)
        .find_map(attribute_value_to_str)
        .unwrap_or("Unknown")
}

pub fn attribute_value_to_str(av: &AttributeValue) -> Option<&str> {
    match av.tag() {
        Tag::PrintableString => PrintableStringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::Utf8String => Utf8StringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::Ia5String => Ia5StringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::TeletexString => TeletexStringRef::try_from(av).ok().map(|s| s.as_str()),
        _ => None,
    }
}

/// All values of one attribute type in the certificate subject.
pub fn subject_names(
    certificate: &Certificate,
    oid: ObjectIdentifier,
) -> impl Iterator<Item = &AttributeValue> {
    name_values(&certificate.tbs_certificate.subject, oid)
}

pub fn name_values(name: &Name, oid: ObjectIdentifier) -> impl Iterator<Item = &AttributeValue> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .filter_map(move |attribute| (attribute.oid == oid).then_some(&attribute.value))
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Printable name of a subject attribute type, for error messages.
pub fn attribute_name(oid: ObjectIdentifier) -> &'static str {
    match oid {
        COUNTRY_NAME => "countryName",
        STATE_OR_PROVINCE_NAME => "stateOrProvinceName",
        COMMON_NAME => "commonName",
        ORGANIZATION_NAME => "organizationName",
        LOCALITY_NAME => "localityName",
        _ => "unknown",
    }
}

/// Assemble a distinguished name, one attribute per RDN, in the order given.
///
/// countryName is a PrintableString as X.520 requires; everything else is a UTF8String.
pub fn build_name(attributes: &[(ObjectIdentifier, &str)]) -> Result<Name, Error> {
    let rdns = attributes
        .iter()
        .map(|(oid, value)| {
            let encoded = if *oid == COUNTRY_NAME {
                Any::encode_from(&PrintableStringRef::new(value).map_err(Error::Encoding)?)
            } else {
                Any::encode_from(&Utf8StringRef::new(value).map_err(Error::Encoding)?)
            };
            let value = encoded.map_err(Error::Encoding)?;
            let attribute = AttributeTypeAndValue { oid: *oid, value };
            SetOfVec::try_from(vec![attribute])
                .map(RelativeDistinguishedName)
                .map_err(Error::Encoding)
        })
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(x509_cert::name::RdnSequence(rdns))
}
