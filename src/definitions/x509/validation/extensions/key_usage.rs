use const_oid::{AssociatedOid, ObjectIdentifier};
use der::{flagset::FlagSet, Decode};
use x509_cert::ext::{
    pkix::{KeyUsage, KeyUsages},
    Extension,
};

use super::{Error, ExtensionValidator};

/// KeyUsage must be critical and carry exactly the usages of the profile.
pub struct KeyUsageValidator {
    expected_flagset: FlagSet<KeyUsages>,
}

impl KeyUsageValidator {
    pub fn document_signer() -> Self {
        Self {
            expected_flagset: KeyUsages::DigitalSignature.into(),
        }
    }

    pub fn iaca() -> Self {
        Self {
            expected_flagset: KeyUsages::CRLSign | KeyUsages::KeyCertSign,
        }
    }

    fn check(&self, ku: KeyUsage) -> Option<Error> {
        if ku.0 != self.expected_flagset {
            Some(format!(
                "expected {:?}, found {:?}",
                self.expected_flagset.into_iter().collect::<Vec<KeyUsages>>(),
                ku.0.into_iter().collect::<Vec<KeyUsages>>()
            ))
        } else {
            None
        }
    }
}

impl ExtensionValidator for KeyUsageValidator {
    fn oid(&self) -> ObjectIdentifier {
        KeyUsage::OID
    }

    fn ext_name(&self) -> &'static str {
        "KeyUsage"
    }

    fn critical(&self) -> bool {
        true
    }

    fn validate(&self, extension: &Extension) -> Vec<Error> {
        match KeyUsage::from_der(extension.extn_value.as_bytes()) {
            Ok(ku) => self.check(ku).into_iter().collect(),
            Err(e) => vec![format!("failed to decode: {e}")],
        }
    }
}

#[cfg(test)]
#[rstest::rstest]
#[case::ds_ok(KeyUsageValidator::document_signer(), KeyUsage(KeyUsages::DigitalSignature.into()), true)]
#[case::iaca_ok(KeyUsageValidator::iaca(), KeyUsage(KeyUsages::CRLSign | KeyUsages::KeyCertSign), true)]
#[case::ds_extra(KeyUsageValidator::document_signer(), KeyUsage(KeyUsages::KeyCertSign | KeyUsages::DigitalSignature), false)]
#[case::iaca_extra(KeyUsageValidator::iaca(), KeyUsage(KeyUsages::CRLSign | KeyUsages::KeyCertSign | KeyUsages::DigitalSignature), false)]
#[case::ds_missing(KeyUsageValidator::document_signer(), KeyUsage(FlagSet::default()), false)]
#[case::iaca_missing(KeyUsageValidator::iaca(), KeyUsage(KeyUsages::KeyCertSign.into()), false)]
fn test(#[case] kuv: KeyUsageValidator, #[case] ku: KeyUsage, #[case] valid: bool) {
    let outcome = kuv.check(ku);
    assert_eq!(outcome.is_none(), valid)
}
