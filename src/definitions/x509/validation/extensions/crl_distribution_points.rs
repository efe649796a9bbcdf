use const_oid::{AssociatedOid, ObjectIdentifier};
use der::Decode;
use x509_cert::ext::{
    pkix::{
        crl::dp::DistributionPoint,
        name::{DistributionPointName, GeneralName},
        CrlDistributionPoints,
    },
    Extension,
};

use super::{Error, ExtensionValidator};

/// CRLDistributionPoints: one or more points, each a full name with a URI, no reasons and
/// no CRL issuer.
pub struct CrlDistributionPointsValidator;

impl CrlDistributionPointsValidator {
    fn check(crl_distribution_points: CrlDistributionPoints) -> Vec<Error> {
        if crl_distribution_points.0.is_empty() {
            return vec!["expected one or more distribution points".into()];
        }
        let mut errors = vec![];
        for point in crl_distribution_points.0.into_iter() {
            if point.crl_issuer.is_some() {
                errors.push(format!(
                    "crl_issuer cannot be set, but is set for: {point:?}"
                ))
            }

            if point.reasons.is_some() {
                errors.push(format!("reasons cannot be set, but is set for: {point:?}",))
            }

            if distribution_point_uri(&point).is_none() {
                errors.push(format!("point has no URI: {point:?}",))
            }
        }
        errors
    }
}

/// The first URI of a full-name distribution point.
pub fn distribution_point_uri(point: &DistributionPoint) -> Option<&str> {
    match point.distribution_point.as_ref()? {
        DistributionPointName::FullName(names) => names.iter().find_map(|gn| match gn {
            GeneralName::UniformResourceIdentifier(uri) => Some(uri.as_str()),
            _ => None,
        }),
        DistributionPointName::NameRelativeToCRLIssuer(_) => None,
    }
}

impl ExtensionValidator for CrlDistributionPointsValidator {
    fn oid(&self) -> ObjectIdentifier {
        CrlDistributionPoints::OID
    }

    fn ext_name(&self) -> &'static str {
        "CrlDistributionPoints"
    }

    fn critical(&self) -> bool {
        false
    }

    fn validate(&self, extension: &Extension) -> Vec<Error> {
        match CrlDistributionPoints::from_der(extension.extn_value.as_bytes()) {
            Ok(crl_dps) => Self::check(crl_dps),
            Err(e) => vec![format!("failed to decode: {e}")],
        }
    }
}

#[cfg(test)]
mod test {
    use der::flagset::FlagSet;

    use super::*;

    fn uri_point(uri: &str) -> DistributionPoint {
        DistributionPoint {
            distribution_point: Some(DistributionPointName::FullName(vec![
                GeneralName::UniformResourceIdentifier(uri.to_string().try_into().unwrap()),
            ])),
            reasons: None,
            crl_issuer: None,
        }
    }

    fn empty_point() -> DistributionPoint {
        DistributionPoint {
            distribution_point: None,
            reasons: None,
            crl_issuer: None,
        }
    }

    #[rstest::rstest]
    #[case::ok(vec![uri_point("http://example.com/crl")], true)]
    #[case::empty(vec![], false)]
    #[case::one_good_one_bad(vec![uri_point("http://example.com/crl"), empty_point()], false)]
    #[case::with_reasons(vec![DistributionPoint { reasons: Some(FlagSet::default()), ..uri_point("http://example.com/crl") }], false)]
    #[case::with_issuer(vec![DistributionPoint { crl_issuer: Some(vec![]), ..uri_point("http://example.com/crl") }], false)]
    fn test(#[case] points: Vec<DistributionPoint>, #[case] valid: bool) {
        let outcome = CrlDistributionPointsValidator::check(CrlDistributionPoints(points));
        assert_eq!(outcome.is_empty(), valid)
    }

    #[test]
    fn uri_is_extracted() {
        assert_eq!(
            distribution_point_uri(&uri_point("http://example.com/crl")),
            Some("http://example.com/crl")
        );
        assert_eq!(distribution_point_uri(&empty_point()), None);
    }
}
