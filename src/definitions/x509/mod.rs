//! The ISO 18013-5 Annex B certificate profile: building, parsing and validating IACA and
//! Document Signer certificates, and the `x5chain` COSE header that carries them.
pub mod builder;
pub mod decoded;
pub mod error;
pub mod pem;
pub mod profile;
pub mod serial;
mod util;
pub mod validation;
pub mod x5chain;

pub use builder::{DocumentSignerBuilder, IacaBuilder};
pub use decoded::{
    parse_document_signer, parse_iaca, DocumentSignerCertificate, IacaCertificate,
};
pub use error::{Error, ProfileViolation};
pub use profile::{
    DocumentSignerProfile, IacaProfile, IssuerAlternativeName, PrincipalName, ValidityPeriod,
};
pub use validation::{DocumentSignerValidationConfig, DocumentSignerValidator, ValidationOptions};
pub use x5chain::{Builder, CertificateWithDer, X5Chain};

#[cfg(test)]
pub(crate) mod test {
    use async_trait::async_trait;
    use time::Duration;

    use super::*;
    use crate::{
        cose::{key::KeyError, AsymmetricKey, EcSigningKey, KeyType},
        error::ErrorKind,
    };

    pub(crate) fn iaca_profile() -> IacaProfile {
        IacaProfile {
            principal_name: PrincipalName {
                country: "US".into(),
                common_name: "Example IACA".into(),
                state_or_province_name: Some("US-NY".into()),
                organization_name: Some("Example DMV".into()),
                locality_name: None,
            },
            validity_period: ValidityPeriod::days_from_now(3650),
            issuer_alternative_name: IssuerAlternativeName {
                uri: Some("https://dmv.example.com".into()),
                email: None,
            },
            crl_distribution_point_uri: "https://dmv.example.com/crl".into(),
        }
    }

    pub(crate) fn document_signer_profile(days: i64) -> DocumentSignerProfile {
        DocumentSignerProfile {
            principal_name: PrincipalName {
                country: "US".into(),
                common_name: "Example Document Signer".into(),
                state_or_province_name: Some("US-NY".into()),
                organization_name: Some("Example DMV".into()),
                locality_name: Some("Albany".into()),
            },
            validity_period: ValidityPeriod::days_from_now(days),
            crl_distribution_point_uri: "https://dmv.example.com/crl".into(),
        }
    }

    /// An IACA and a Document Signer it issued, with both signing keys.
    pub(crate) async fn certificate_pair() -> (
        IacaCertificate,
        EcSigningKey,
        DocumentSignerCertificate,
        EcSigningKey,
    ) {
        let iaca_key = EcSigningKey::generate(KeyType::Secp256r1).unwrap();
        let ds_key = EcSigningKey::generate(KeyType::Secp256r1).unwrap();
        let iaca = IacaBuilder::new(iaca_profile())
            .build(&iaca_key)
            .await
            .unwrap();
        let ds = DocumentSignerBuilder::new(document_signer_profile(365))
            .build(&ds_key, &iaca, &iaca_key)
            .await
            .unwrap();
        (iaca, iaca_key, ds, ds_key)
    }

    struct RsaKey;

    #[async_trait]
    impl AsymmetricKey for RsaKey {
        fn key_type(&self) -> KeyType {
            KeyType::Rsa
        }

        fn public_key_bytes(&self) -> Vec<u8> {
            vec![0; 256]
        }

        async fn sign(&self, _payload: &[u8]) -> Result<Vec<u8>, KeyError> {
            Ok(vec![0; 256])
        }

        async fn verify(&self, _payload: &[u8], _signature: &[u8]) -> Result<bool, KeyError> {
            Ok(false)
        }
    }

    fn violations(result: Result<impl std::fmt::Debug, Error>) -> Vec<ProfileViolation> {
        match result {
            Err(Error::Profile(violations)) => violations,
            other => panic!("expected profile violations, found {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn built_certificates_parse_and_validate() {
        let (iaca, _, ds, _) = certificate_pair().await;

        let reparsed = parse_iaca(iaca.certificate().der()).unwrap();
        assert_eq!(reparsed.profile, iaca.profile);
        let reparsed = parse_document_signer(ds.certificate().der()).unwrap();
        assert_eq!(reparsed.profile, ds.profile);
        assert_eq!(ds.issuer_alternative_name, iaca.profile.issuer_alternative_name);
        assert_eq!(ds.authority_key_identifier, iaca.subject_key_identifier);
        assert!(!ds.is_ca);

        DocumentSignerValidator::default()
            .validate(&ds, &iaca, &ValidationOptions::default())
            .await
            .unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn pem_round_trip_is_byte_exact() {
        let (iaca, ..) = certificate_pair().await;
        let pem = iaca.certificate().to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        let decoded = CertificateWithDer::from_pem(pem.as_bytes()).unwrap();
        assert_eq!(decoded.der(), iaca.certificate().der());
        assert_eq!(decoded.to_pem().unwrap(), pem);
    }

    #[test_log::test(tokio::test)]
    async fn rsa_keys_are_rejected() {
        let err = IacaBuilder::new(iaca_profile()).build(&RsaKey).await;
        assert_eq!(
            violations(err),
            vec![ProfileViolation::KeyType(KeyType::Rsa)]
        );

        let (iaca, iaca_key, ..) = certificate_pair().await;
        let err = DocumentSignerBuilder::new(document_signer_profile(30))
            .build(&RsaKey, &iaca, &iaca_key)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Profile);
    }

    #[test_log::test(tokio::test)]
    async fn document_signer_validity_is_limited() {
        let (iaca, iaca_key, ..) = certificate_pair().await;
        let ds_key = EcSigningKey::generate(KeyType::Secp384r1).unwrap();
        let result = DocumentSignerBuilder::new(document_signer_profile(458))
            .build(&ds_key, &iaca, &iaca_key)
            .await;
        assert!(violations(result).contains(&ProfileViolation::ValidityTooLong {
            days: 458,
            max_days: 457
        }));

        DocumentSignerBuilder::new(document_signer_profile(457))
            .build(&ds_key, &iaca, &iaca_key)
            .await
            .unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn document_signer_must_fit_inside_the_iaca() {
        let iaca_key = EcSigningKey::generate(KeyType::Secp256r1).unwrap();
        let mut profile = iaca_profile();
        profile.validity_period = ValidityPeriod::days_from_now(30);
        let iaca = IacaBuilder::new(profile).build(&iaca_key).await.unwrap();

        let mut ds_profile = document_signer_profile(60);
        ds_profile.principal_name.country = "DE".into();
        let result = DocumentSignerBuilder::new(ds_profile)
            .build(&iaca_key, &iaca, &iaca_key)
            .await;
        let violations = violations(result);
        assert!(violations.contains(&ProfileViolation::ValidityOutsideIssuer));
        assert!(violations
            .iter()
            .any(|v| matches!(v, ProfileViolation::NameMismatch { name: "countryName", .. })));
    }

    #[rstest::rstest]
    #[case::unassigned("XX")]
    #[case::lowercase("us")]
    #[case::alpha3("USA")]
    #[tokio::test]
    async fn invalid_country_is_rejected(#[case] country: &str) {
        let key = EcSigningKey::generate(KeyType::Secp256r1).unwrap();
        let mut profile = iaca_profile();
        profile.principal_name.country = country.into();
        let result = IacaBuilder::new(profile).build(&key).await;
        assert_eq!(
            violations(result),
            vec![ProfileViolation::Country(country.into())]
        );
    }

    #[test_log::test(tokio::test)]
    async fn expired_profile_is_not_signed() {
        let key = EcSigningKey::generate(KeyType::Secp256r1).unwrap();
        let mut profile = iaca_profile();
        let now = time::OffsetDateTime::now_utc();
        profile.validity_period =
            ValidityPeriod::new(now - Duration::days(10), now - Duration::days(1));
        let result = IacaBuilder::new(profile).build(&key).await;
        assert_eq!(violations(result), vec![ProfileViolation::Expired]);
    }

    #[test_log::test(tokio::test)]
    async fn iaca_key_must_match_the_certificate() {
        let (iaca, ..) = certificate_pair().await;
        let other = EcSigningKey::generate(KeyType::Secp256r1).unwrap();
        let err = DocumentSignerBuilder::new(document_signer_profile(30))
            .build(&other, &iaca, &other)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Key(_)));
    }

    #[test_log::test(tokio::test)]
    async fn validator_rejects_a_foreign_iaca() {
        let other_key = EcSigningKey::generate(KeyType::Secp256r1).unwrap();
        let other_iaca = IacaBuilder::new(iaca_profile())
            .build(&other_key)
            .await
            .unwrap();
        let (_, _, ds, _) = certificate_pair().await;

        let err = DocumentSignerValidator::default()
            .validate(&ds, &other_iaca, &ValidationOptions::default())
            .await;
        assert_eq!(violations(err), vec![ProfileViolation::AuthorityKeyIdentifier]);

        let signature_only = DocumentSignerValidationConfig {
            authority_key_identifier: false,
            ..Default::default()
        };
        let err = DocumentSignerValidator::new(signature_only)
            .validate(&ds, &other_iaca, &ValidationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid));
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test_log::test(tokio::test)]
    async fn validator_checks_the_validation_time() {
        let (iaca, _, ds, _) = certificate_pair().await;
        let options = ValidationOptions {
            validation_time: Some(time::OffsetDateTime::now_utc() + Duration::days(400)),
        };
        let err = DocumentSignerValidator::default()
            .validate(&ds, &iaca, &options)
            .await;
        assert_eq!(violations(err), vec![ProfileViolation::Expired]);

        let untimed = DocumentSignerValidationConfig {
            validity_at_time: false,
            ..Default::default()
        };
        DocumentSignerValidator::new(untimed)
            .validate(&ds, &iaca, &options)
            .await
            .unwrap();
    }
}
