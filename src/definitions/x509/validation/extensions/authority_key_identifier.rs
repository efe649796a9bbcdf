use const_oid::{AssociatedOid, ObjectIdentifier};
use der::Decode;
use x509_cert::ext::{pkix::AuthorityKeyIdentifier, Extension};

use super::{Error, ExtensionValidator};

/// AuthorityKeyIdentifier carries the key identifier of the issuing IACA.
///
/// Whether it matches the IACA's subject key identifier is checked against the IACA itself.
pub struct AuthorityKeyIdentifierValidator;

impl AuthorityKeyIdentifierValidator {
    fn check(aki: AuthorityKeyIdentifier) -> Option<Error> {
        match aki.key_identifier {
            Some(ki) if !ki.as_bytes().is_empty() => None,
            _ => Some("keyIdentifier is missing".into()),
        }
    }
}

impl ExtensionValidator for AuthorityKeyIdentifierValidator {
    fn oid(&self) -> ObjectIdentifier {
        AuthorityKeyIdentifier::OID
    }

    fn ext_name(&self) -> &'static str {
        "AuthorityKeyIdentifier"
    }

    fn critical(&self) -> bool {
        false
    }

    fn validate(&self, extension: &Extension) -> Vec<Error> {
        match AuthorityKeyIdentifier::from_der(extension.extn_value.as_bytes()) {
            Ok(aki) => Self::check(aki).into_iter().collect(),
            Err(e) => vec![format!("failed to decode: {e}")],
        }
    }
}

#[cfg(test)]
#[rstest::rstest]
#[case::present(AuthorityKeyIdentifier { key_identifier: Some(der::asn1::OctetString::new(vec![1; 20]).unwrap()), ..Default::default() }, true)]
#[case::absent(AuthorityKeyIdentifier::default(), false)]
fn test(#[case] aki: AuthorityKeyIdentifier, #[case] valid: bool) {
    assert_eq!(AuthorityKeyIdentifierValidator::check(aki).is_none(), valid)
}
