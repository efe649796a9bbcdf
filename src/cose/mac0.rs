//! COSE_Mac0 with HMAC-SHA256, used for DeviceMac authentication.
use coset::{
    iana, mac_structure_data, AsCborValue, CoseMac0Builder, HeaderBuilder, MacContext,
    RegisteredLabelWithPrivate,
};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{cbor::Value, error::ErrorKind};

type HmacSha256 = Hmac<Sha256>;

/// A COSE_Mac0 structure, untagged on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct CoseMac0(coset::CoseMac0);

/// The MAC key shared by the holder and the reader for one session.
pub struct EMacKey(Zeroizing<[u8; 32]>);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("COSE_Mac0 carries no payload and none was supplied")]
    MissingPayload,
    #[error("unsupported MAC algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("unable to derive the MAC key")]
    KeyDerivation,
    #[error("MAC tag does not verify")]
    TagInvalid,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Error::TagInvalid => ErrorKind::Integrity,
            Error::MissingPayload | Error::KeyDerivation => ErrorKind::Malformed,
        }
    }
}

impl std::fmt::Debug for EMacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EMacKey(..)")
    }
}

impl EMacKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    fn hmac(&self) -> Result<HmacSha256, Error> {
        HmacSha256::new_from_slice(&self.0[..]).map_err(|_| Error::KeyDerivation)
    }
}

/// Derive the EMacKey from an ECDH shared secret.
///
/// HKDF-SHA256 with salt `SHA-256(SessionTranscriptBytes)` and info `"EMacKey"`.
pub fn derive_emac_key(
    shared_secret: &[u8],
    session_transcript_bytes: &[u8],
) -> Result<EMacKey, Error> {
    let salt = Sha256::digest(session_transcript_bytes);
    let hkdf = Hkdf::<Sha256>::new(Some(salt.as_slice()), shared_secret);
    let mut okm = Zeroizing::new([0u8; 32]);
    hkdf.expand(b"EMacKey", &mut okm[..])
        .map_err(|_| Error::KeyDerivation)?;
    Ok(EMacKey(okm))
}

impl CoseMac0 {
    pub fn inner(&self) -> &coset::CoseMac0 {
        &self.0
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.0.payload.as_deref()
    }

    pub fn tag(&self) -> &[u8] {
        &self.0.tag
    }

    fn algorithm(&self) -> Option<iana::Algorithm> {
        match self.0.protected.header.alg {
            Some(RegisteredLabelWithPrivate::Assigned(alg)) => Some(alg),
            _ => None,
        }
    }
}

impl Serialize for CoseMac0 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0
            .clone()
            .to_cbor_value()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CoseMac0 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        coset::CoseMac0::from_cbor_value(value)
            .map(Self)
            .map_err(de::Error::custom)
    }
}

/// MAC `payload` with `key`. The payload is left out of the structure when `detached`.
pub fn mac0(payload: &[u8], key: &EMacKey, detached: bool) -> Result<CoseMac0, Error> {
    let protected = HeaderBuilder::new()
        .algorithm(iana::Algorithm::HMAC_256_256)
        .build();
    let mut builder = CoseMac0Builder::new().protected(protected);
    if !detached {
        builder = builder.payload(payload.to_vec());
    }
    let mut cose_mac0 = builder.build();

    let tbm = mac_structure_data(
        MacContext::CoseMac0,
        cose_mac0.protected.clone(),
        &[],
        payload,
    );
    let mut mac = key.hmac()?;
    mac.update(&tbm);
    cose_mac0.tag = mac.finalize().into_bytes().to_vec();
    Ok(CoseMac0(cose_mac0))
}

pub fn verify_mac0(
    cose_mac0: &CoseMac0,
    key: &EMacKey,
    detached_payload: Option<&[u8]>,
) -> Result<(), Error> {
    match cose_mac0.algorithm() {
        Some(iana::Algorithm::HMAC_256_256) => {}
        other => return Err(Error::UnsupportedAlgorithm(format!("{other:?}"))),
    }
    let payload = cose_mac0
        .payload()
        .or(detached_payload)
        .ok_or(Error::MissingPayload)?;
    let tbm = mac_structure_data(
        MacContext::CoseMac0,
        cose_mac0.0.protected.clone(),
        &[],
        payload,
    );
    let mut mac = key.hmac()?;
    mac.update(&tbm);
    mac.verify_slice(cose_mac0.tag())
        .map_err(|_| Error::TagInvalid)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cbor;

    #[test]
    fn derivation_depends_on_transcript() {
        let a = derive_emac_key(&[7; 32], b"transcript a").unwrap();
        let b = derive_emac_key(&[7; 32], b"transcript b").unwrap();
        assert_ne!(&a.0[..], &b.0[..]);
    }

    #[test]
    fn detached_mac_round_trip() {
        let key = derive_emac_key(&[1; 32], b"transcript").unwrap();
        let tagged = mac0(b"device authentication", &key, true).unwrap();
        assert!(tagged.payload().is_none());
        assert_eq!(tagged.tag().len(), 32);

        let bytes = cbor::to_vec(&tagged).unwrap();
        let decoded: CoseMac0 = cbor::from_slice(&bytes).unwrap();
        verify_mac0(&decoded, &key, Some(b"device authentication")).unwrap();

        let err = verify_mac0(&decoded, &key, Some(b"device authenticatioN")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);

        let other = derive_emac_key(&[2; 32], b"transcript").unwrap();
        assert!(verify_mac0(&decoded, &other, Some(b"device authentication")).is_err());
    }
}
