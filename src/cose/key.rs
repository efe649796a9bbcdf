//! The asymmetric key capability consumed by the COSE and certificate engines.
//!
//! Key generation and storage live outside this crate. Callers hand in anything that
//! implements [AsymmetricKey]: a key held by a remote key-management service, an HSM
//! handle, or one of the local in-memory keys defined here ([EcSigningKey],
//! [EcPublicKey]).

use async_trait::async_trait;
use const_oid::ObjectIdentifier;
use coset::iana;
use der::{asn1::BitString, Any, Decode};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use signature::{Signer, Verifier};
use strum_macros::{Display, EnumString};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

pub const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
pub const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
pub const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
pub const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");
pub const ID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
pub const RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub const ECDSA_WITH_SHA256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
pub const ECDSA_WITH_SHA384: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
pub const ECDSA_WITH_SHA512: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

/// The closed set of key types the engines know about.
///
/// Each curve maps to exactly one COSE algorithm. RSA is listed so that an RSA key
/// handed in by a caller can be named in the error that rejects it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Secp256r1,
    Secp384r1,
    Secp521r1,
    Ed25519,
    Rsa,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(KeyType),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

impl KeyType {
    /// The COSE algorithm used with this key type.
    pub fn algorithm(self) -> Result<iana::Algorithm, KeyError> {
        match self {
            KeyType::Secp256r1 => Ok(iana::Algorithm::ES256),
            KeyType::Secp384r1 => Ok(iana::Algorithm::ES384),
            KeyType::Secp521r1 => Ok(iana::Algorithm::ES512),
            KeyType::Ed25519 => Ok(iana::Algorithm::EdDSA),
            KeyType::Rsa => Err(KeyError::UnsupportedKeyType(self)),
        }
    }

    pub fn from_algorithm(algorithm: iana::Algorithm) -> Option<KeyType> {
        match algorithm {
            iana::Algorithm::ES256 => Some(KeyType::Secp256r1),
            iana::Algorithm::ES384 => Some(KeyType::Secp384r1),
            iana::Algorithm::ES512 => Some(KeyType::Secp521r1),
            iana::Algorithm::EdDSA => Some(KeyType::Ed25519),
            _ => None,
        }
    }

    pub fn is_curve_based(self) -> bool {
        !matches!(self, KeyType::Rsa)
    }

    /// Length of a raw (fixed-size) signature.
    pub fn signature_len(self) -> Option<usize> {
        match self {
            KeyType::Secp256r1 => Some(64),
            KeyType::Secp384r1 => Some(96),
            KeyType::Secp521r1 => Some(132),
            KeyType::Ed25519 => Some(64),
            KeyType::Rsa => None,
        }
    }

    /// Identify the key type of a certificate's subject public key.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<KeyType, KeyError> {
        let algorithm = spki.algorithm.oid;
        if algorithm == ID_ED25519 {
            return Ok(KeyType::Ed25519);
        }
        if algorithm == RSA_ENCRYPTION {
            return Ok(KeyType::Rsa);
        }
        if algorithm != ID_EC_PUBLIC_KEY {
            return Err(KeyError::UnsupportedAlgorithm(algorithm.to_string()));
        }
        let curve: ObjectIdentifier = spki
            .algorithm
            .parameters
            .as_ref()
            .ok_or_else(|| KeyError::InvalidPublicKey("missing named curve".into()))?
            .decode_as()
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        match curve {
            SECP256R1 => Ok(KeyType::Secp256r1),
            SECP384R1 => Ok(KeyType::Secp384r1),
            SECP521R1 => Ok(KeyType::Secp521r1),
            other => Err(KeyError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Build the SubjectPublicKeyInfo for a public key of this type.
    ///
    /// EC keys are given as SEC1 encoded points, Ed25519 keys as the raw 32 bytes.
    pub fn subject_public_key_info(
        self,
        public_key_bytes: &[u8],
    ) -> Result<SubjectPublicKeyInfoOwned, KeyError> {
        let algorithm = match self {
            KeyType::Secp256r1 => ec_algorithm_identifier(SECP256R1)?,
            KeyType::Secp384r1 => ec_algorithm_identifier(SECP384R1)?,
            KeyType::Secp521r1 => ec_algorithm_identifier(SECP521R1)?,
            KeyType::Ed25519 => AlgorithmIdentifierOwned {
                oid: ID_ED25519,
                parameters: None,
            },
            KeyType::Rsa => return Err(KeyError::UnsupportedKeyType(self)),
        };
        Ok(SubjectPublicKeyInfoOwned {
            algorithm,
            subject_public_key: BitString::from_bytes(public_key_bytes)
                .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?,
        })
    }

    /// The X.509 signature algorithm identifier for certificates signed by this key type.
    pub fn x509_signature_algorithm(self) -> Result<AlgorithmIdentifierOwned, KeyError> {
        let oid = match self {
            KeyType::Secp256r1 => ECDSA_WITH_SHA256,
            KeyType::Secp384r1 => ECDSA_WITH_SHA384,
            KeyType::Secp521r1 => ECDSA_WITH_SHA512,
            KeyType::Ed25519 => ID_ED25519,
            KeyType::Rsa => return Err(KeyError::UnsupportedKeyType(self)),
        };
        Ok(AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        })
    }
}

fn ec_algorithm_identifier(curve: ObjectIdentifier) -> Result<AlgorithmIdentifierOwned, KeyError> {
    Ok(AlgorithmIdentifierOwned {
        oid: ID_EC_PUBLIC_KEY,
        parameters: Some(
            Any::encode_from(&curve).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?,
        ),
    })
}

/// An asymmetric key, possibly held outside this process.
///
/// Signatures are exchanged in their raw fixed-size form (`r || s` for ECDSA), which is
/// the COSE representation. The certificate engine converts to DER where X.509 needs it.
#[async_trait]
pub trait AsymmetricKey: Send + Sync {
    fn key_type(&self) -> KeyType;

    fn key_id(&self) -> Option<Vec<u8>> {
        None
    }

    /// SEC1 uncompressed point for EC keys, the raw public key for Ed25519.
    fn public_key_bytes(&self) -> Vec<u8>;

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, KeyError>;

    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, KeyError>;
}

/// Attach a key identifier to another key.
#[derive(Debug, Clone)]
pub struct IdentifiedKey<K> {
    key_id: Vec<u8>,
    key: K,
}

impl<K> IdentifiedKey<K> {
    pub fn new(key_id: impl Into<Vec<u8>>, key: K) -> Self {
        Self {
            key_id: key_id.into(),
            key,
        }
    }

    pub fn inner(&self) -> &K {
        &self.key
    }
}

#[async_trait]
impl<K: AsymmetricKey> AsymmetricKey for IdentifiedKey<K> {
    fn key_type(&self) -> KeyType {
        self.key.key_type()
    }

    fn key_id(&self) -> Option<Vec<u8>> {
        Some(self.key_id.clone())
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        self.key.public_key_bytes()
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.key.sign(payload).await
    }

    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        self.key.verify(payload, signature).await
    }
}

/// An in-memory ECDSA private key.
#[derive(Clone)]
pub enum EcSigningKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl std::fmt::Debug for EcSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EcSigningKey").field(&self.key_type()).finish()
    }
}

impl EcSigningKey {
    pub fn generate(key_type: KeyType) -> Result<Self, KeyError> {
        match key_type {
            KeyType::Secp256r1 => Ok(Self::P256(p256::ecdsa::SigningKey::random(&mut OsRng))),
            KeyType::Secp384r1 => Ok(Self::P384(p384::ecdsa::SigningKey::random(&mut OsRng))),
            other => Err(KeyError::UnsupportedKeyType(other)),
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Self::P256(_) => KeyType::Secp256r1,
            Self::P384(_) => KeyType::Secp384r1,
        }
    }

    pub fn public_key(&self) -> EcPublicKey {
        match self {
            Self::P256(k) => EcPublicKey::P256(*k.verifying_key()),
            Self::P384(k) => EcPublicKey::P384(*k.verifying_key()),
        }
    }
}

impl From<p256::ecdsa::SigningKey> for EcSigningKey {
    fn from(key: p256::ecdsa::SigningKey) -> Self {
        Self::P256(key)
    }
}

impl From<p384::ecdsa::SigningKey> for EcSigningKey {
    fn from(key: p384::ecdsa::SigningKey) -> Self {
        Self::P384(key)
    }
}

#[async_trait]
impl AsymmetricKey for EcSigningKey {
    fn key_type(&self) -> KeyType {
        EcSigningKey::key_type(self)
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key().to_sec1_bytes()
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, KeyError> {
        match self {
            Self::P256(key) => {
                let signature: p256::ecdsa::Signature = key
                    .try_sign(payload)
                    .map_err(|e| KeyError::Signing(e.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::P384(key) => {
                let signature: p384::ecdsa::Signature = key
                    .try_sign(payload)
                    .map_err(|e| KeyError::Signing(e.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        self.public_key().verify(payload, signature).await
    }
}

/// An in-memory ECDSA public key, used to verify with key material found in COSE headers
/// and certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcPublicKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
}

impl EcPublicKey {
    pub fn from_sec1_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, KeyError> {
        match key_type {
            KeyType::Secp256r1 => p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(Self::P256)
                .map_err(|e| KeyError::InvalidPublicKey(e.to_string())),
            KeyType::Secp384r1 => p384::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(Self::P384)
                .map_err(|e| KeyError::InvalidPublicKey(e.to_string())),
            other => Err(KeyError::UnsupportedKeyType(other)),
        }
    }

    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self, KeyError> {
        let key_type = KeyType::from_spki(spki)?;
        Self::from_sec1_bytes(key_type, spki.subject_public_key.raw_bytes())
    }

    /// Decode a DER encoded SubjectPublicKeyInfo.
    pub fn from_spki_der(der: &[u8]) -> Result<Self, KeyError> {
        let spki = SubjectPublicKeyInfoOwned::from_der(der)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        Self::from_spki(&spki)
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Self::P256(_) => KeyType::Secp256r1,
            Self::P384(_) => KeyType::Secp384r1,
        }
    }

    /// Uncompressed SEC1 encoding.
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        match self {
            Self::P256(k) => k.to_encoded_point(false).as_bytes().to_vec(),
            Self::P384(k) => k.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned, KeyError> {
        self.key_type()
            .subject_public_key_info(&self.to_sec1_bytes())
    }
}

#[async_trait]
impl AsymmetricKey for EcPublicKey {
    fn key_type(&self) -> KeyType {
        EcPublicKey::key_type(self)
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        self.to_sec1_bytes()
    }

    async fn sign(&self, _payload: &[u8]) -> Result<Vec<u8>, KeyError> {
        Err(KeyError::Signing("a public key cannot sign".into()))
    }

    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        let verified = match self {
            Self::P256(key) => match p256::ecdsa::Signature::from_slice(signature) {
                Ok(signature) => key.verify(payload, &signature).is_ok(),
                Err(e) => {
                    tracing::debug!("signature is not a valid P-256 signature: {e}");
                    false
                }
            },
            Self::P384(key) => match p384::ecdsa::Signature::from_slice(signature) {
                Ok(signature) => key.verify(payload, &signature).is_ok(),
                Err(e) => {
                    tracing::debug!("signature is not a valid P-384 signature: {e}");
                    false
                }
            },
        };
        Ok(verified)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[rstest::rstest]
    #[case::p256(KeyType::Secp256r1, iana::Algorithm::ES256)]
    #[case::p384(KeyType::Secp384r1, iana::Algorithm::ES384)]
    #[case::p521(KeyType::Secp521r1, iana::Algorithm::ES512)]
    #[case::ed25519(KeyType::Ed25519, iana::Algorithm::EdDSA)]
    fn curve_maps_to_one_algorithm(#[case] key_type: KeyType, #[case] alg: iana::Algorithm) {
        assert_eq!(key_type.algorithm().unwrap(), alg);
        assert_eq!(KeyType::from_algorithm(alg), Some(key_type));
    }

    #[test]
    fn rsa_has_no_algorithm() {
        assert!(matches!(
            KeyType::Rsa.algorithm(),
            Err(KeyError::UnsupportedKeyType(KeyType::Rsa))
        ));
        assert!(!KeyType::Rsa.is_curve_based());
    }

    #[test]
    fn key_type_names() {
        assert_eq!(KeyType::Secp256r1.to_string(), "secp256r1");
        assert_eq!("ed25519".parse::<KeyType>().unwrap(), KeyType::Ed25519);
    }

    #[test_log::test(tokio::test)]
    async fn sign_and_verify() {
        for key_type in [KeyType::Secp256r1, KeyType::Secp384r1] {
            let key = EcSigningKey::generate(key_type).unwrap();
            let signature = key.sign(b"payload").await.unwrap();
            assert_eq!(Some(signature.len()), key_type.signature_len());
            let public = key.public_key();
            assert!(public.verify(b"payload", &signature).await.unwrap());
            assert!(!public.verify(b"other payload", &signature).await.unwrap());
        }
    }

    #[test]
    fn spki_round_trip() {
        let key = EcSigningKey::generate(KeyType::Secp384r1).unwrap().public_key();
        let spki = key.to_spki().unwrap();
        assert_eq!(KeyType::from_spki(&spki).unwrap(), KeyType::Secp384r1);
        assert_eq!(EcPublicKey::from_spki(&spki).unwrap(), key);
    }
}
