//! COSE_Sign1 signing and verification.
//!
//! Verification resolves exactly one key: an embedded COSE_Key header first, then the leaf
//! of an x5chain header, then a caller-supplied key selected by key id. Whichever candidate
//! is resolved first decides the outcome; a failed signature is never retried with
//! another key.
use coset::{
    iana, sig_structure_data, AsCborValue, CoseSign1Builder, HeaderBuilder, Label,
    RegisteredLabelWithPrivate, SignatureContext,
};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::Display;

use crate::{
    cbor::{CborError, Value},
    cose::{
        key::{AsymmetricKey, EcPublicKey, KeyError, KeyType},
        COSE_KEY_HEADER_LABEL, X5CHAIN_HEADER_LABEL,
    },
    definitions::{device_key::cose_key, device_key::CoseKey, x509, x509::X5Chain},
    error::ErrorKind,
};

/// A COSE_Sign1 structure, untagged on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct CoseSign1(coset::CoseSign1);

/// Header composition for [sign1].
#[derive(Debug, Clone, Default)]
pub struct Sign1Headers {
    /// Key id placed in the unprotected header. Falls back to the signing key's own id.
    pub key_id: Option<Vec<u8>>,
    pub x5chain: Option<X5Chain>,
    pub cose_key: Option<CoseKey>,
    /// Leave the payload out of the structure. The verifier supplies it.
    pub detached: bool,
}

/// Which candidate produced the verifying key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum KeySource {
    #[strum(serialize = "embedded COSE_Key")]
    EmbeddedCoseKey,
    #[strum(serialize = "x5chain leaf")]
    X5Chain,
    #[strum(serialize = "caller supplied")]
    CallerKeyId,
}

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("expected a {expected} byte signature, the key produced {actual} bytes")]
    SignatureLength { expected: usize, actual: usize },
    #[error("unable to encode header: {0}")]
    Header(#[from] CborError),
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("COSE_Sign1 carries no payload and none was supplied")]
    MissingPayload,
    #[error("a detached payload was supplied but the COSE_Sign1 carries a different one")]
    PayloadConflict,
    #[error("the protected header has no algorithm")]
    MissingAlgorithm,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("protected algorithm {header:?} does not match the {key} key")]
    AlgorithmMismatch { header: iana::Algorithm, key: KeyType },
    #[error("no verification key: {0}")]
    NoKey(&'static str),
    #[error("several caller keys match and the structure names no key id")]
    Ambiguous,
    #[error("embedded COSE_Key is unusable: {0}")]
    InvalidCoseKey(#[from] cose_key::Error),
    #[error("x5chain header is unusable: {0}")]
    InvalidX5Chain(#[from] x509::Error),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("signature does not verify under the {0} key")]
    SignatureInvalid(KeySource),
}

impl SigningError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SigningError::Key(KeyError::UnsupportedKeyType(_))
            | SigningError::Key(KeyError::UnsupportedAlgorithm(_)) => {
                ErrorKind::UnsupportedAlgorithm
            }
            _ => ErrorKind::Malformed,
        }
    }
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerificationError::SignatureInvalid(_) => ErrorKind::Integrity,
            VerificationError::UnsupportedAlgorithm(_)
            | VerificationError::AlgorithmMismatch { .. }
            | VerificationError::Key(KeyError::UnsupportedKeyType(_))
            | VerificationError::Key(KeyError::UnsupportedAlgorithm(_)) => {
                ErrorKind::UnsupportedAlgorithm
            }
            VerificationError::InvalidX5Chain(e) => e.kind(),
            _ => ErrorKind::Malformed,
        }
    }
}

impl CoseSign1 {
    pub fn inner(&self) -> &coset::CoseSign1 {
        &self.0
    }

    pub fn into_inner(self) -> coset::CoseSign1 {
        self.0
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.0.payload.as_deref()
    }

    pub fn signature(&self) -> &[u8] {
        &self.0.signature
    }

    /// The algorithm from the protected header.
    pub fn algorithm(&self) -> Option<iana::Algorithm> {
        match self.0.protected.header.alg {
            Some(RegisteredLabelWithPrivate::Assigned(alg)) => Some(alg),
            _ => None,
        }
    }

    pub fn key_id(&self) -> Option<&[u8]> {
        [&self.0.protected.header, &self.0.unprotected]
            .into_iter()
            .map(|header| header.key_id.as_slice())
            .find(|kid| !kid.is_empty())
    }

    /// Header value by integer label; the unprotected bucket takes precedence.
    pub fn header(&self, label: i64) -> Option<&Value> {
        [&self.0.unprotected, &self.0.protected.header]
            .into_iter()
            .flat_map(|header| header.rest.iter())
            .find(|(l, _)| *l == Label::Int(label))
            .map(|(_, value)| value)
    }

    pub fn x5chain(&self) -> Result<Option<X5Chain>, x509::Error> {
        self.header(X5CHAIN_HEADER_LABEL)
            .map(X5Chain::from_value)
            .transpose()
    }

    pub fn cose_key(&self) -> Result<Option<CoseKey>, cose_key::Error> {
        self.header(COSE_KEY_HEADER_LABEL)
            .cloned()
            .map(CoseKey::try_from)
            .transpose()
    }
}

impl From<coset::CoseSign1> for CoseSign1 {
    fn from(inner: coset::CoseSign1) -> Self {
        Self(inner)
    }
}

impl std::ops::Deref for CoseSign1 {
    type Target = coset::CoseSign1;

    fn deref(&self) -> &coset::CoseSign1 {
        &self.0
    }
}

impl Serialize for CoseSign1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0
            .clone()
            .to_cbor_value()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CoseSign1 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        coset::CoseSign1::from_cbor_value(value)
            .map(Self)
            .map_err(de::Error::custom)
    }
}

/// A COSE_Sign1 waiting for its signature.
///
/// Splits signing in two so that the signature can be produced elsewhere, for example by
/// a remote key-management service.
#[derive(Debug, Clone)]
pub struct PreparedCoseSign1 {
    cose_sign1: coset::CoseSign1,
    key_type: KeyType,
    signature_payload: Vec<u8>,
}

impl PreparedCoseSign1 {
    pub fn new(
        payload: Vec<u8>,
        headers: &Sign1Headers,
        key_type: KeyType,
    ) -> Result<Self, SigningError> {
        let protected = HeaderBuilder::new()
            .algorithm(key_type.algorithm()?)
            .build();

        let mut unprotected = HeaderBuilder::new();
        if let Some(key_id) = &headers.key_id {
            unprotected = unprotected.key_id(key_id.clone());
        }
        if let Some(x5chain) = &headers.x5chain {
            unprotected = unprotected.value(X5CHAIN_HEADER_LABEL, x5chain.to_value());
        }
        if let Some(cose_key) = &headers.cose_key {
            unprotected = unprotected.value(COSE_KEY_HEADER_LABEL, cose_key.to_value()?);
        }

        let mut builder = CoseSign1Builder::new()
            .protected(protected)
            .unprotected(unprotected.build());
        if !headers.detached {
            builder = builder.payload(payload.clone());
        }
        let cose_sign1 = builder.build();

        let signature_payload = sig_structure_data(
            SignatureContext::CoseSign1,
            cose_sign1.protected.clone(),
            None,
            &[],
            &payload,
        );

        Ok(Self {
            cose_sign1,
            key_type,
            signature_payload,
        })
    }

    /// The Sig_structure bytes to be signed.
    pub fn signature_payload(&self) -> &[u8] {
        &self.signature_payload
    }

    /// Attach a raw signature produced over [PreparedCoseSign1::signature_payload].
    pub fn finalize(self, signature: Vec<u8>) -> Result<CoseSign1, SigningError> {
        if let Some(expected) = self.key_type.signature_len() {
            if signature.len() != expected {
                return Err(SigningError::SignatureLength {
                    expected,
                    actual: signature.len(),
                });
            }
        }
        let mut cose_sign1 = self.cose_sign1;
        cose_sign1.signature = signature;
        Ok(CoseSign1(cose_sign1))
    }
}

/// Sign `payload` with `key`.
pub async fn sign1<K>(
    payload: Vec<u8>,
    headers: &Sign1Headers,
    key: &K,
) -> Result<CoseSign1, SigningError>
where
    K: AsymmetricKey + ?Sized,
{
    let mut headers = headers.clone();
    if headers.key_id.is_none() {
        headers.key_id = key.key_id();
    }
    let prepared = PreparedCoseSign1::new(payload, &headers, key.key_type())?;
    let signature = key.sign(prepared.signature_payload()).await?;
    prepared.finalize(signature)
}

enum Resolved<'a> {
    Owned(EcPublicKey),
    Borrowed(&'a dyn AsymmetricKey),
}

impl Resolved<'_> {
    fn key(&self) -> &dyn AsymmetricKey {
        match self {
            Resolved::Owned(key) => key,
            Resolved::Borrowed(key) => *key,
        }
    }
}

fn resolve<'a>(
    sign1: &CoseSign1,
    candidates: &[&'a dyn AsymmetricKey],
) -> Result<(KeySource, Resolved<'a>), VerificationError> {
    if let Some(cose_key) = sign1.cose_key()? {
        tracing::debug!("verifying with the embedded COSE_Key");
        let key = EcPublicKey::try_from(&cose_key)?;
        return Ok((KeySource::EmbeddedCoseKey, Resolved::Owned(key)));
    }

    if let Some(x5chain) = sign1.x5chain()? {
        tracing::debug!(
            "verifying with the x5chain leaf '{}'",
            x5chain.end_entity_common_name()
        );
        let key = x5chain.end_entity_public_key()?;
        return Ok((KeySource::X5Chain, Resolved::Owned(key)));
    }

    let key = match sign1.key_id() {
        Some(kid) => candidates
            .iter()
            .find(|candidate| candidate.key_id().as_deref() == Some(kid))
            .ok_or(VerificationError::NoKey("no caller key matches the key id"))?,
        None => match candidates {
            [] => return Err(VerificationError::NoKey("no key material available")),
            [single] => single,
            _ => return Err(VerificationError::Ambiguous),
        },
    };
    tracing::debug!("verifying with a caller supplied key");
    Ok((KeySource::CallerKeyId, Resolved::Borrowed(*key)))
}

/// Verify a COSE_Sign1, returning which key candidate verified it.
pub async fn verify1(
    sign1: &CoseSign1,
    candidates: &[&dyn AsymmetricKey],
    detached_payload: Option<&[u8]>,
) -> Result<KeySource, VerificationError> {
    let payload = match (sign1.payload(), detached_payload) {
        (Some(attached), Some(detached)) if attached != detached => {
            return Err(VerificationError::PayloadConflict)
        }
        (Some(payload), _) | (None, Some(payload)) => payload,
        (None, None) => return Err(VerificationError::MissingPayload),
    };

    let algorithm = sign1
        .algorithm()
        .ok_or(VerificationError::MissingAlgorithm)?;
    let key_type = KeyType::from_algorithm(algorithm)
        .ok_or_else(|| VerificationError::UnsupportedAlgorithm(format!("{algorithm:?}")))?;

    let (source, resolved) = resolve(sign1, candidates)?;
    let key = resolved.key();
    if key.key_type() != key_type {
        return Err(VerificationError::AlgorithmMismatch {
            header: algorithm,
            key: key.key_type(),
        });
    }

    let tbs = sig_structure_data(
        SignatureContext::CoseSign1,
        sign1.0.protected.clone(),
        None,
        &[],
        payload,
    );
    if key.verify(&tbs, sign1.signature()).await? {
        Ok(source)
    } else {
        tracing::warn!("COSE_Sign1 signature does not verify under the {source} key");
        Err(VerificationError::SignatureInvalid(source))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cbor;
    use crate::cose::key::{EcSigningKey, IdentifiedKey};

    fn p256() -> EcSigningKey {
        EcSigningKey::generate(KeyType::Secp256r1).unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn caller_key_round_trip() {
        let key = p256();
        let signed = sign1(b"payload".to_vec(), &Sign1Headers::default(), &key)
            .await
            .unwrap();
        assert_eq!(signed.algorithm(), Some(iana::Algorithm::ES256));

        let bytes = cbor::to_vec(&signed).unwrap();
        let decoded: CoseSign1 = cbor::from_slice(&bytes).unwrap();
        assert_eq!(cbor::to_vec(&decoded).unwrap(), bytes);

        let public = key.public_key();
        let source = verify1(&decoded, &[&public], None).await.unwrap();
        assert_eq!(source, KeySource::CallerKeyId);
    }

    #[test_log::test(tokio::test)]
    async fn tampered_payload_fails() {
        let key = p256();
        let mut signed = sign1(b"payload".to_vec(), &Sign1Headers::default(), &key)
            .await
            .unwrap();
        signed.0.payload = Some(b"pay1oad".to_vec());
        let public = key.public_key();
        let err = verify1(&signed, &[&public], None).await.unwrap_err();
        assert!(matches!(err, VerificationError::SignatureInvalid(_)));
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test_log::test(tokio::test)]
    async fn detached_payload() {
        let key = p256();
        let headers = Sign1Headers {
            detached: true,
            ..Default::default()
        };
        let signed = sign1(b"payload".to_vec(), &headers, &key).await.unwrap();
        assert!(signed.payload().is_none());

        let public = key.public_key();
        assert!(verify1(&signed, &[&public], None).await.is_err());
        verify1(&signed, &[&public], Some(b"payload")).await.unwrap();
        assert!(verify1(&signed, &[&public], Some(b"other")).await.is_err());
    }

    #[test_log::test(tokio::test)]
    async fn key_id_selects_caller_key() {
        let first = IdentifiedKey::new(b"first".to_vec(), p256());
        let second = IdentifiedKey::new(b"second".to_vec(), p256());
        let signed = sign1(b"payload".to_vec(), &Sign1Headers::default(), &second)
            .await
            .unwrap();
        assert_eq!(signed.key_id(), Some(&b"second"[..]));

        let candidates: [&dyn AsymmetricKey; 2] = [&first, &second];
        verify1(&signed, &candidates, None).await.unwrap();

        let unknown = IdentifiedKey::new(b"third".to_vec(), p256());
        let err = verify1(&signed, &[&unknown], None).await.unwrap_err();
        assert!(matches!(err, VerificationError::NoKey(_)));
    }

    #[test_log::test(tokio::test)]
    async fn several_keys_without_key_id_are_ambiguous() {
        let key = p256();
        let signed = sign1(b"payload".to_vec(), &Sign1Headers::default(), &key)
            .await
            .unwrap();
        let other = p256().public_key();
        let public = key.public_key();
        let err = verify1(&signed, &[&public, &other], None).await.unwrap_err();
        assert!(matches!(err, VerificationError::Ambiguous));
    }

    #[test_log::test(tokio::test)]
    async fn embedded_key_wins_without_fallback() {
        let key = p256();
        let impostor = p256();
        let headers = Sign1Headers {
            cose_key: Some(CoseKey::from(&impostor.public_key())),
            ..Default::default()
        };
        let signed = sign1(b"payload".to_vec(), &headers, &key).await.unwrap();

        // The caller holds the right key, but the embedded key is resolved first.
        let public = key.public_key();
        let err = verify1(&signed, &[&public], None).await.unwrap_err();
        assert!(matches!(
            err,
            VerificationError::SignatureInvalid(KeySource::EmbeddedCoseKey)
        ));

        let headers = Sign1Headers {
            cose_key: Some(CoseKey::from(&key.public_key())),
            ..Default::default()
        };
        let signed = sign1(b"payload".to_vec(), &headers, &key).await.unwrap();
        let source = verify1(&signed, &[], None).await.unwrap();
        assert_eq!(source, KeySource::EmbeddedCoseKey);
    }

    #[test_log::test(tokio::test)]
    async fn algorithm_must_match_key() {
        let key = p256();
        let signed = sign1(b"payload".to_vec(), &Sign1Headers::default(), &key)
            .await
            .unwrap();
        let p384 = EcSigningKey::generate(KeyType::Secp384r1)
            .unwrap()
            .public_key();
        let err = verify1(&signed, &[&p384], None).await.unwrap_err();
        assert!(matches!(err, VerificationError::AlgorithmMismatch { .. }));
    }

    #[test]
    fn rsa_cannot_prepare() {
        let err = PreparedCoseSign1::new(vec![], &Sign1Headers::default(), KeyType::Rsa)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedAlgorithm);
    }

    #[test]
    fn short_signature_is_rejected() {
        let prepared =
            PreparedCoseSign1::new(vec![1], &Sign1Headers::default(), KeyType::Secp256r1)
                .unwrap();
        assert!(matches!(
            prepared.finalize(vec![0; 63]),
            Err(SigningError::SignatureLength {
                expected: 64,
                actual: 63
            })
        ));
    }
}
