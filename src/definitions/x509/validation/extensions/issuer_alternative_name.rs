use const_oid::{AssociatedOid, ObjectIdentifier};
use der::Decode;
use x509_cert::ext::{
    pkix::{name::GeneralName, IssuerAltName},
    Extension,
};

use super::{Error, ExtensionValidator};

/// IssuerAltName holds at least one entry, and only email addresses and URIs.
pub struct IssuerAlternativeNameValidator;

impl IssuerAlternativeNameValidator {
    fn check(ian: IssuerAltName) -> Option<Error> {
        if ian.0.is_empty() {
            Some("expected a URI or an email address, found no names".into())
        } else if !ian.0.iter().all(|gn| {
            matches!(
                gn,
                GeneralName::Rfc822Name(_) | GeneralName::UniformResourceIdentifier(_)
            )
        }) {
            Some(format!(
                "invalid type in found in general names: {:?}",
                ian.0
            ))
        } else {
            None
        }
    }
}

impl ExtensionValidator for IssuerAlternativeNameValidator {
    fn oid(&self) -> ObjectIdentifier {
        IssuerAltName::OID
    }

    fn ext_name(&self) -> &'static str {
        "IssuerAlternativeName"
    }

    fn critical(&self) -> bool {
        false
    }

    fn validate(&self, extension: &Extension) -> Vec<Error> {
        match IssuerAltName::from_der(extension.extn_value.as_bytes()) {
            Ok(ian) => Self::check(ian).into_iter().collect(),
            Err(e) => vec![format!("failed to decode: {e}")],
        }
    }
}

#[cfg(test)]
#[rstest::rstest]
#[case::email(IssuerAltName(vec![GeneralName::Rfc822Name("iaca@example.com".to_string().try_into().unwrap())]), true)]
#[case::uri(IssuerAltName(vec![GeneralName::UniformResourceIdentifier("https://example.com".to_string().try_into().unwrap())]), true)]
#[case::empty(IssuerAltName(vec![]), false)]
#[case::dns(IssuerAltName(vec![GeneralName::DnsName("example.com".to_string().try_into().unwrap())]), false)]
fn test(#[case] ian: IssuerAltName, #[case] valid: bool) {
    assert_eq!(IssuerAlternativeNameValidator::check(ian).is_none(), valid)
}
