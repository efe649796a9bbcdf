use const_oid::{AssociatedOid, ObjectIdentifier};
use der::Decode;
use x509_cert::ext::{pkix::ExtendedKeyUsage, Extension};

use super::{Error, ExtensionValidator};

/// ExtendedKeyUsage: critical, holding only the expected purpose.
pub struct ExtendedKeyUsageValidator {
    pub expected_oid: ObjectIdentifier,
}

impl ExtendedKeyUsageValidator {
    fn check(&self, eku: ExtendedKeyUsage) -> Option<Error> {
        if eku.0.is_empty() {
            Some(format!("expected '{}', found '[]'", self.expected_oid))
        } else if !eku.0.iter().all(|oid| *oid == self.expected_oid) {
            Some(format!(
                "expected '{}', found '{:?}'",
                self.expected_oid, eku.0
            ))
        } else {
            None
        }
    }
}

impl ExtensionValidator for ExtendedKeyUsageValidator {
    fn oid(&self) -> ObjectIdentifier {
        ExtendedKeyUsage::OID
    }

    fn ext_name(&self) -> &'static str {
        "ExtendedKeyUsage"
    }

    fn critical(&self) -> bool {
        true
    }

    fn validate(&self, extension: &Extension) -> Vec<Error> {
        match ExtendedKeyUsage::from_der(extension.extn_value.as_bytes()) {
            Ok(eku) => self.check(eku).into_iter().collect(),
            Err(e) => vec![format!("failed to decode: {e}")],
        }
    }
}

/// id-mdl-kp-mdlDS
pub const fn document_signer_extended_key_usage_oid() -> ObjectIdentifier {
    ObjectIdentifier::new_unwrap("1.0.18013.5.1.2")
}

#[cfg(test)]
#[rstest::rstest]
#[case::ok(ExtendedKeyUsage(vec![document_signer_extended_key_usage_oid()]), true)]
#[case::wrong(ExtendedKeyUsage(vec![ObjectIdentifier::new_unwrap("1.0.18013.5.1.6")]), false)]
#[case::missing(ExtendedKeyUsage(vec![]), false)]
#[case::good_and_bad(ExtendedKeyUsage(vec![document_signer_extended_key_usage_oid(), ObjectIdentifier::new_unwrap("1.1.0")]), false)]
fn test(#[case] eku: ExtendedKeyUsage, #[case] valid: bool) {
    let outcome = ExtendedKeyUsageValidator {
        expected_oid: document_signer_extended_key_usage_oid(),
    }
    .check(eku);
    assert_eq!(outcome.is_none(), valid)
}
