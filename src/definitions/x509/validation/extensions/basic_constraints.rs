use const_oid::{AssociatedOid, ObjectIdentifier};
use der::Decode;
use x509_cert::ext::{pkix::BasicConstraints, Extension};

use super::{Error, ExtensionValidator};

/// BasicConstraints: `CA:true, pathlen:0` on an IACA, `CA:false` on anything it signs.
pub struct BasicConstraintsValidator {
    ca: bool,
}

impl BasicConstraintsValidator {
    pub fn iaca() -> Self {
        Self { ca: true }
    }

    pub fn end_entity() -> Self {
        Self { ca: false }
    }

    fn check(&self, constraints: BasicConstraints) -> Option<Error> {
        let ok = if self.ca {
            constraints.ca && constraints.path_len_constraint == Some(0)
        } else {
            !constraints.ca
        };
        if ok {
            None
        } else if self.ca {
            Some(format!(
                "expected to be CA:true, path_len:0, but found: {constraints:?}"
            ))
        } else {
            Some(format!("expected to be CA:false, but found: {constraints:?}"))
        }
    }
}

impl ExtensionValidator for BasicConstraintsValidator {
    fn oid(&self) -> ObjectIdentifier {
        BasicConstraints::OID
    }

    fn ext_name(&self) -> &'static str {
        "BasicConstraints"
    }

    fn critical(&self) -> bool {
        self.ca
    }

    fn validate(&self, extension: &Extension) -> Vec<Error> {
        match BasicConstraints::from_der(extension.extn_value.as_bytes()) {
            Ok(bc) => self.check(bc).into_iter().collect(),
            Err(e) => vec![format!("failed to decode: {e}")],
        }
    }
}

#[cfg(test)]
#[rstest::rstest]
#[case::ok(BasicConstraintsValidator::iaca(), BasicConstraints { ca: true, path_len_constraint: Some(0) }, true)]
#[case::ca_false(BasicConstraintsValidator::iaca(), BasicConstraints { ca: false, path_len_constraint: Some(0) }, false)]
#[case::path_none(BasicConstraintsValidator::iaca(), BasicConstraints { ca: true, path_len_constraint: None }, false)]
#[case::path_too_long(BasicConstraintsValidator::iaca(), BasicConstraints { ca: true, path_len_constraint: Some(1) }, false)]
#[case::end_entity_ok(BasicConstraintsValidator::end_entity(), BasicConstraints { ca: false, path_len_constraint: None }, true)]
#[case::end_entity_ca(BasicConstraintsValidator::end_entity(), BasicConstraints { ca: true, path_len_constraint: None }, false)]
fn test(
    #[case] validator: BasicConstraintsValidator,
    #[case] bc: BasicConstraints,
    #[case] valid: bool,
) {
    assert_eq!(validator.check(bc).is_none(), valid)
}
