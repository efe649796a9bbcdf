//! Verification of a presented [Document].
//!
//! [Verifier::verify_document] runs every check and reports each one in a
//! [ResponseAuthenticationOutcome], so that a reader can show partial results.
//! [Verifier::verify_document_strict] stops at the first failure and returns it as a typed
//! [crate::Error].
use std::collections::BTreeMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use super::{
    authentication::{check_key_authorizations, verify_device_auth},
    merge::{merge, Claims, MergePolicy},
};
use crate::{
    cbor::{self, Value},
    cose::{sign1::VerificationError, verify1, EMacKey, KeySource},
    definitions::{
        helpers::Tag24,
        mso::DigestAlgorithm,
        x509::{
            self, parse_document_signer, validation::validity::check_validity_period_at,
            DocumentSignerValidator, IacaCertificate, ValidationOptions, X5Chain,
        },
        Document, Mso, SessionTranscript,
    },
    error::ErrorKind,
};

pub type Errors = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub merge_policy: MergePolicy,
    pub validation: ValidationOptions,
    /// Digest algorithms accepted in the MSO.
    pub digest_algorithms: Vec<DigestAlgorithm>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            validation: ValidationOptions::default(),
            digest_algorithms: vec![
                DigestAlgorithm::SHA256,
                DigestAlgorithm::SHA384,
                DigestAlgorithm::SHA512,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationStatus {
    #[default]
    Unchecked,
    Invalid,
    Valid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseAuthenticationOutcome {
    /// Merged claims as `namespace -> element -> value`.
    pub response: BTreeMap<String, serde_json::Value>,
    pub issuer_authentication: AuthenticationStatus,
    pub device_authentication: AuthenticationStatus,
    pub errors: Errors,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("issuerAuth carries no payload")]
    MissingPayload,
    #[error("issuerAuth must be verified with the x5chain certificate, not the {0} key")]
    IssuerKeySource(KeySource),
    #[error("document type '{document}' does not match the MSO document type '{mso}'")]
    DocTypeMismatch { document: String, mso: String },
    #[error("the MSO is not valid at the validation time")]
    OutsideValidity,
    #[error("the MSO validity info is unusable: {0}")]
    ValidityInfo(#[from] crate::definitions::validity_info::Error),
    #[error("digest algorithm {0} is not accepted")]
    UnsupportedDigestAlgorithm(DigestAlgorithm),
    #[error("no trusted IACA issued the document signer '{0}'")]
    UntrustedIssuer(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingPayload => ErrorKind::Malformed,
            Error::ValidityInfo(e) => e.kind(),
            Error::UnsupportedDigestAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Error::IssuerKeySource(_)
            | Error::DocTypeMismatch { .. }
            | Error::OutsideValidity
            | Error::UntrustedIssuer(_) => ErrorKind::Integrity,
        }
    }
}

type Result<T, E = crate::Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Default)]
pub struct Verifier {
    config: VerifierConfig,
    trust_anchors: Vec<IacaCertificate>,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            trust_anchors: vec![],
        }
    }

    /// Require the document signer to chain to one of `anchors`.
    ///
    /// Without anchors the issuer signature is checked against the x5chain leaf alone.
    pub fn with_trust_anchors(mut self, anchors: impl IntoIterator<Item = IacaCertificate>) -> Self {
        self.trust_anchors.extend(anchors);
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Run every check on `document` and report the outcome of each.
    pub async fn verify_document(
        &self,
        document: &Document,
        transcript: &SessionTranscript,
        emac_key: Option<&EMacKey>,
    ) -> ResponseAuthenticationOutcome {
        let mut outcome = ResponseAuthenticationOutcome::default();

        let mso = match self.authenticate_issuer(document).await {
            Ok(mso) => {
                outcome.issuer_authentication = AuthenticationStatus::Valid;
                mso
            }
            Err(e) => {
                outcome.issuer_authentication = AuthenticationStatus::Invalid;
                record(&mut outcome.errors, "issuer_authentication", &e);
                return outcome;
            }
        };

        match self.authenticate_device(document, &mso, transcript, emac_key).await {
            Ok(()) => outcome.device_authentication = AuthenticationStatus::Valid,
            Err(e) => {
                outcome.device_authentication = AuthenticationStatus::Invalid;
                record(&mut outcome.errors, "device_authentication", &e);
            }
        }

        let device_claims = match outcome.device_authentication {
            AuthenticationStatus::Valid => device_claims(document),
            _ => Claims::new(),
        };
        match merge(
            document.issuer_signed.claims(),
            device_claims,
            self.config.merge_policy,
        ) {
            Ok(claims) => outcome.response = claims_to_json(&claims),
            Err(e) => record(&mut outcome.errors, "merge", &crate::Error::from(e)),
        }

        outcome
    }

    /// Run every check on `document` and return the merged claims, or the first failure.
    pub async fn verify_document_strict(
        &self,
        document: &Document,
        transcript: &SessionTranscript,
        emac_key: Option<&EMacKey>,
    ) -> Result<Claims> {
        let mso = self.authenticate_issuer(document).await?;
        self.authenticate_device(document, &mso, transcript, emac_key)
            .await?;
        Ok(merge(
            document.issuer_signed.claims(),
            device_claims(document),
            self.config.merge_policy,
        )?)
    }

    /// Issuer signature, MSO consistency and digest integrity. Returns the decoded MSO.
    async fn authenticate_issuer(&self, document: &Document) -> Result<Mso> {
        let issuer_auth = &document.issuer_signed.issuer_auth;

        let source = verify1(issuer_auth, &[], None).await?;
        if source != KeySource::X5Chain {
            return Err(Error::IssuerKeySource(source).into());
        }
        let x5chain = issuer_auth
            .x5chain()?
            .ok_or(VerificationError::NoKey("issuerAuth carries no x5chain"))?;
        let validation_time = self.config.validation.validation_time();
        let violations =
            check_validity_period_at(x5chain.end_entity_certificate(), validation_time);
        if !violations.is_empty() {
            return Err(x509::Error::Profile(violations).into());
        }
        if !self.trust_anchors.is_empty() {
            self.check_trust_anchors(&x5chain).await?;
        }

        let payload = issuer_auth.payload().ok_or(Error::MissingPayload)?;
        let mso = cbor::from_slice::<Tag24<Mso>>(payload)?.into_inner();

        if mso.doc_type != document.doc_type {
            return Err(Error::DocTypeMismatch {
                document: document.doc_type.clone(),
                mso: mso.doc_type,
            }
            .into());
        }

        mso.validity_info.validate().map_err(Error::from)?;
        mso.validity_info
            .check_within(&x5chain.end_entity_validity())
            .map_err(Error::from)?;
        if !mso.validity_info.is_valid_at(validation_time) {
            return Err(Error::OutsideValidity.into());
        }

        if !self.config.digest_algorithms.contains(&mso.digest_algorithm) {
            return Err(Error::UnsupportedDigestAlgorithm(mso.digest_algorithm).into());
        }

        if let Some(namespaces) = &document.issuer_signed.namespaces {
            mso.verify_issuer_signed_digests(namespaces)?;
        }

        tracing::debug!("issuer authentication verified for {}", document.doc_type);
        Ok(mso)
    }

    async fn check_trust_anchors(&self, x5chain: &X5Chain) -> Result<()> {
        let ds = parse_document_signer(x5chain.end_entity().der())?;
        let anchor = self
            .trust_anchors
            .iter()
            .find(|iaca| iaca.subject_key_identifier == ds.authority_key_identifier)
            .ok_or_else(|| {
                Error::UntrustedIssuer(ds.profile.principal_name.common_name.clone())
            })?;
        DocumentSignerValidator::default()
            .validate(&ds, anchor, &self.config.validation)
            .await?;
        Ok(())
    }

    /// Device signature or MAC, and the key authorizations of the signed elements.
    async fn authenticate_device(
        &self,
        document: &Document,
        mso: &Mso,
        transcript: &SessionTranscript,
        emac_key: Option<&EMacKey>,
    ) -> Result<()> {
        verify_device_auth(document, mso, transcript, emac_key).await?;
        if let Some(device_signed) = &document.device_signed {
            check_key_authorizations(device_signed, mso)?;
        }
        Ok(())
    }
}

fn device_claims(document: &Document) -> Claims {
    document
        .device_signed
        .as_ref()
        .map(|device_signed| device_signed.claims())
        .unwrap_or_default()
}

fn record(errors: &mut Errors, check: &str, error: &crate::Error) {
    tracing::warn!("{check} failed: {error}");
    errors.insert(
        check.to_string(),
        serde_json::json!({
            "kind": error.kind().to_string(),
            "message": error.to_string(),
        }),
    );
}

/// JSON view of the claims. Each namespace becomes an object of element values.
pub fn claims_to_json(claims: &Claims) -> BTreeMap<String, serde_json::Value> {
    claims
        .iter()
        .map(|(namespace, elements)| {
            let elements = elements
                .iter()
                .map(|(element, value)| (element.clone(), cbor_to_json(value)))
                .collect::<serde_json::Map<_, _>>();
            (namespace.clone(), serde_json::Value::Object(elements))
        })
        .collect()
}

/// JSON view of a CBOR value.
///
/// Byte strings become base64url text, tags are dropped in favour of their content and map
/// keys that are not text are rendered in CBOR diagnostic-like form.
pub fn cbor_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(i) => {
            let i = i128::from(*i);
            if let Ok(i) = i64::try_from(i) {
                Json::from(i)
            } else if let Ok(u) = u64::try_from(i) {
                Json::from(u)
            } else {
                Json::String(i.to_string())
            }
        }
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Text(s) => Json::String(s.clone()),
        Value::Bytes(b) => Json::String(URL_SAFE_NO_PAD.encode(b)),
        Value::Tag(_, inner) => cbor_to_json(inner),
        Value::Array(items) => Json::Array(items.iter().map(cbor_to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| {
                    let key = match k {
                        Value::Text(s) => s.clone(),
                        other => cbor_to_json(other).to_string(),
                    };
                    (key, cbor_to_json(v))
                })
                .collect(),
        ),
        _ => Json::Null,
    }
}

#[cfg(test)]
mod test {
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::{
        cose::{EcSigningKey, KeyType},
        definitions::{
            x509::{test::certificate_pair, X5Chain},
            CoseKey, DeviceKeyInfo, ValidityInfo,
        },
        issuance::Mdoc,
        presentation::authentication::device_sign,
    };

    const DOC_TYPE: &str = "org.iso.18013.5.1.mDL";
    const NAMESPACE: &str = "org.iso.18013.5.1";

    struct Fixture {
        iaca: IacaCertificate,
        device_key: EcSigningKey,
        mdoc: Mdoc,
    }

    async fn fixture() -> Fixture {
        let (iaca, _, ds, ds_key) = certificate_pair().await;
        let device_key = EcSigningKey::generate(KeyType::Secp256r1).unwrap();
        let now = OffsetDateTime::now_utc();
        let mdoc = Mdoc::builder()
            .doc_type(DOC_TYPE)
            .add_namespace(
                NAMESPACE,
                [
                    ("family_name", Value::Text("Doe".into())),
                    ("age_over_18", Value::Bool(true)),
                ],
            )
            .unwrap()
            .validity_info(ValidityInfo::new(now, now, now + Duration::days(30), None))
            .digest_algorithm(DigestAlgorithm::SHA256)
            .device_key_info(DeviceKeyInfo::from(CoseKey::from(&device_key.public_key())))
            .x5chain(X5Chain::from(ds.certificate().clone()))
            .issue(&ds_key)
            .await
            .unwrap();
        Fixture {
            iaca,
            device_key,
            mdoc,
        }
    }

    async fn presented(fixture: &Fixture, transcript: &SessionTranscript) -> Document {
        let device_signed = device_sign(
            transcript,
            DOC_TYPE,
            BTreeMap::new(),
            &fixture.device_key,
        )
        .await
        .unwrap();
        fixture
            .mdoc
            .document(fixture.mdoc.issuer_signed(), device_signed)
    }

    fn transcript(nonce: &str) -> SessionTranscript {
        SessionTranscript::remote(crate::definitions::Handover::oid4vp(
            "client",
            nonce,
            None,
            "https://verifier.example.com/response",
        )
        .unwrap())
    }

    #[test_log::test(tokio::test)]
    async fn valid_document_is_accepted() {
        let fixture = fixture().await;
        let transcript = transcript("nonce");
        let document = presented(&fixture, &transcript).await;

        let verifier = Verifier::default().with_trust_anchors([fixture.iaca.clone()]);
        let outcome = verifier.verify_document(&document, &transcript, None).await;
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.issuer_authentication, AuthenticationStatus::Valid);
        assert_eq!(outcome.device_authentication, AuthenticationStatus::Valid);
        assert_eq!(
            outcome.response[NAMESPACE],
            serde_json::json!({ "family_name": "Doe", "age_over_18": true })
        );

        let claims = verifier
            .verify_document_strict(&document, &transcript, None)
            .await
            .unwrap();
        assert_eq!(claims[NAMESPACE]["family_name"], Value::Text("Doe".into()));
    }

    #[test_log::test(tokio::test)]
    async fn other_transcript_fails_device_authentication() {
        let fixture = fixture().await;
        let document = presented(&fixture, &transcript("nonce")).await;

        let outcome = Verifier::default()
            .verify_document(&document, &transcript("other nonce"), None)
            .await;
        assert_eq!(outcome.issuer_authentication, AuthenticationStatus::Valid);
        assert_eq!(outcome.device_authentication, AuthenticationStatus::Invalid);
        assert!(outcome.errors.contains_key("device_authentication"));
        assert!(outcome.response.contains_key(NAMESPACE));

        let err = Verifier::default()
            .verify_document_strict(&document, &transcript("other nonce"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test_log::test(tokio::test)]
    async fn doc_type_must_match_the_mso() {
        let fixture = fixture().await;
        let transcript = transcript("nonce");
        let mut document = presented(&fixture, &transcript).await;
        document.doc_type = "org.example.other".into();

        let err = Verifier::default()
            .verify_document_strict(&document, &transcript, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Verifier(Error::DocTypeMismatch { .. })
        ));
    }

    #[test_log::test(tokio::test)]
    async fn mso_validity_window_is_enforced() {
        let fixture = fixture().await;
        let transcript = transcript("nonce");
        let document = presented(&fixture, &transcript).await;
        let config = VerifierConfig {
            validation: ValidationOptions {
                validation_time: Some(OffsetDateTime::now_utc() + Duration::days(60)),
            },
            ..Default::default()
        };

        let outcome = Verifier::new(config)
            .verify_document(&document, &transcript, None)
            .await;
        assert_eq!(outcome.issuer_authentication, AuthenticationStatus::Invalid);
        assert_eq!(outcome.device_authentication, AuthenticationStatus::Unchecked);
        assert!(outcome.response.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn expired_signer_certificate_is_rejected_without_anchors() {
        let fixture = fixture().await;
        let transcript = transcript("nonce");
        let document = presented(&fixture, &transcript).await;
        let config = VerifierConfig {
            validation: ValidationOptions {
                validation_time: Some(OffsetDateTime::now_utc() + Duration::days(400)),
            },
            ..Default::default()
        };

        let err = Verifier::new(config)
            .verify_document_strict(&document, &transcript, None)
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            crate::Error::X509(x509::Error::Profile(violations))
                if violations.contains(&x509::ProfileViolation::Expired)
        ));
        assert_eq!(err.kind(), ErrorKind::Profile);
    }

    #[test_log::test(tokio::test)]
    async fn digest_algorithm_must_be_accepted() {
        let fixture = fixture().await;
        let transcript = transcript("nonce");
        let document = presented(&fixture, &transcript).await;
        let config = VerifierConfig {
            digest_algorithms: vec![DigestAlgorithm::SHA512],
            ..Default::default()
        };

        let err = Verifier::new(config)
            .verify_document_strict(&document, &transcript, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedAlgorithm);
    }

    #[test_log::test(tokio::test)]
    async fn untrusted_issuer_is_rejected() {
        let fixture = fixture().await;
        let (other_iaca, ..) = certificate_pair().await;
        let transcript = transcript("nonce");
        let document = presented(&fixture, &transcript).await;

        let err = Verifier::default()
            .with_trust_anchors([other_iaca])
            .verify_document_strict(&document, &transcript, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Verifier(Error::UntrustedIssuer(_))
        ));
    }

    #[test]
    fn cbor_values_render_as_json() {
        let value = Value::Map(vec![
            (Value::Text("bytes".into()), Value::Bytes(vec![0xfb, 0xff])),
            (
                Value::Text("date".into()),
                Value::Tag(1004, Box::new(Value::Text("2024-01-01".into()))),
            ),
            (Value::Integer(1.into()), Value::Array(vec![Value::Null])),
        ]);
        assert_eq!(
            cbor_to_json(&value),
            serde_json::json!({ "bytes": "-_8", "date": "2024-01-01", "1": [null] })
        );
    }
}
