//! Session transcripts and the handover structures that bind a presentation to its
//! channel.
//!
//! The holder and the reader each rebuild the transcript from shared inputs. Device and
//! reader authentication are computed over it, so both sides must produce the same bytes:
//! every constructor here is a pure function of its arguments.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{
    cbor::{self, CborError, Value},
    definitions::helpers::{tag24, Tag24},
};

pub type DeviceEngagementBytes = Tag24<Value>;
pub type EReaderKeyBytes = Tag24<Value>;

/// `SessionTranscript = [DeviceEngagementBytes / null, EReaderKeyBytes / null, Handover]`
#[derive(Clone, Debug, PartialEq)]
pub struct SessionTranscript {
    pub device_engagement_bytes: Option<DeviceEngagementBytes>,
    pub e_reader_key_bytes: Option<EReaderKeyBytes>,
    pub handover: Handover,
}

/// The closed set of handover kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Handover {
    /// QR engagement: `null`.
    Qr,
    /// NFC static or negotiated handover: `[select, request / null]`.
    Nfc {
        handover_select: Vec<u8>,
        handover_request: Option<Vec<u8>>,
    },
    /// ISO 18013-7 Annex B: `[clientIdHash, responseUriHash, nonce]`.
    OpenId4VpIso18013_7 {
        client_id_hash: Vec<u8>,
        response_uri_hash: Vec<u8>,
        nonce: String,
    },
    /// OpenID4VP redirect flows: `["OpenID4VPHandover", infoHash]`.
    OpenId4Vp { info_hash: Vec<u8> },
    /// OpenID4VP over the Digital Credentials API: `["OpenID4VPDCAPIHandover", infoHash]`.
    OpenId4VpDcApi { info_hash: Vec<u8> },
    /// ISO 18013-7 Annex C over the Digital Credentials API: `["dcapi", infoHash]`.
    IsoDcApi { info_hash: Vec<u8> },
}

const OPENID4VP_HANDOVER: &str = "OpenID4VPHandover";
const OPENID4VP_DC_API_HANDOVER: &str = "OpenID4VPDCAPIHandover";
const ISO_DC_API_HANDOVER: &str = "dcapi";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Cbor(#[from] CborError),
    #[error(transparent)]
    Tag24(#[from] tag24::Error),
    #[error("invalid base64url (unpadded) text: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid session transcript: {0}")]
    InvalidTranscript(&'static str),
    #[error("handover does not match any known kind")]
    UnknownHandover,
}

type Result<T, E = Error> = std::result::Result<T, E>;

fn sha256_of_cbor(value: &Value) -> Result<Vec<u8>> {
    Ok(Sha256::digest(cbor::to_vec(value)?).to_vec())
}

fn optional_bytes(bytes: Option<&[u8]>) -> Value {
    bytes.map_or(Value::Null, |b| Value::Bytes(b.to_vec()))
}

impl Handover {
    /// ISO 18013-7 Annex B, where each hash is `SHA-256(cbor([value, mdocGeneratedNonce]))`.
    pub fn oid4vp_iso18013_7(
        client_id: &str,
        response_uri: &str,
        nonce: &str,
        mdoc_generated_nonce: &str,
    ) -> Result<Self> {
        let hash = |value: &str| {
            sha256_of_cbor(&Value::Array(vec![
                Value::Text(value.into()),
                Value::Text(mdoc_generated_nonce.into()),
            ]))
        };
        Ok(Handover::OpenId4VpIso18013_7 {
            client_id_hash: hash(client_id)?,
            response_uri_hash: hash(response_uri)?,
            nonce: nonce.into(),
        })
    }

    /// OpenID4VP 1.0: `SHA-256(cbor([clientId, nonce, jwkThumbprint / null, responseUri]))`.
    pub fn oid4vp(
        client_id: &str,
        nonce: &str,
        jwk_thumbprint: Option<&[u8]>,
        response_uri: &str,
    ) -> Result<Self> {
        let info = Self::oid4vp_info(client_id, nonce, jwk_thumbprint, response_uri);
        Ok(Handover::OpenId4Vp {
            info_hash: sha256_of_cbor(&info)?,
        })
    }

    /// `OpenID4VPHandoverInfo`, the array hashed into [Handover::OpenId4Vp].
    pub fn oid4vp_info(
        client_id: &str,
        nonce: &str,
        jwk_thumbprint: Option<&[u8]>,
        response_uri: &str,
    ) -> Value {
        Value::Array(vec![
            Value::Text(client_id.into()),
            Value::Text(nonce.into()),
            optional_bytes(jwk_thumbprint),
            Value::Text(response_uri.into()),
        ])
    }

    /// OpenID4VP over the DC API: `SHA-256(cbor([origin, nonce, jwkThumbprint / null]))`.
    pub fn oid4vp_dc_api(origin: &str, nonce: &str, jwk_thumbprint: Option<&[u8]>) -> Result<Self> {
        let info = Self::oid4vp_dc_api_info(origin, nonce, jwk_thumbprint);
        Ok(Handover::OpenId4VpDcApi {
            info_hash: sha256_of_cbor(&info)?,
        })
    }

    /// `OpenID4VPDCAPIHandoverInfo`, the array hashed into [Handover::OpenId4VpDcApi].
    pub fn oid4vp_dc_api_info(origin: &str, nonce: &str, jwk_thumbprint: Option<&[u8]>) -> Value {
        Value::Array(vec![
            Value::Text(origin.into()),
            Value::Text(nonce.into()),
            optional_bytes(jwk_thumbprint),
        ])
    }

    /// ISO 18013-7 Annex C: `SHA-256(cbor([encryptionInfo (base64url), serializedOrigin]))`.
    pub fn iso_dc_api(encryption_info_b64url: &str, serialized_origin: &str) -> Result<Self> {
        let info = Value::Array(vec![
            Value::Text(encryption_info_b64url.into()),
            Value::Text(serialized_origin.into()),
        ]);
        Ok(Handover::IsoDcApi {
            info_hash: sha256_of_cbor(&info)?,
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            Handover::Qr => Value::Null,
            Handover::Nfc {
                handover_select,
                handover_request,
            } => Value::Array(vec![
                Value::Bytes(handover_select.clone()),
                optional_bytes(handover_request.as_deref()),
            ]),
            Handover::OpenId4VpIso18013_7 {
                client_id_hash,
                response_uri_hash,
                nonce,
            } => Value::Array(vec![
                Value::Bytes(client_id_hash.clone()),
                Value::Bytes(response_uri_hash.clone()),
                Value::Text(nonce.clone()),
            ]),
            Handover::OpenId4Vp { info_hash } => named_handover(OPENID4VP_HANDOVER, info_hash),
            Handover::OpenId4VpDcApi { info_hash } => {
                named_handover(OPENID4VP_DC_API_HANDOVER, info_hash)
            }
            Handover::IsoDcApi { info_hash } => named_handover(ISO_DC_API_HANDOVER, info_hash),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(cbor::to_vec(&self.to_value())?)
    }

    pub fn to_base64url(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_bytes()?))
    }

    pub fn from_base64url(encoded: &str) -> Result<Self> {
        let value: Value = cbor::from_slice(&URL_SAFE_NO_PAD.decode(encoded)?)?;
        value.try_into()
    }
}

fn named_handover(name: &str, info_hash: &[u8]) -> Value {
    Value::Array(vec![
        Value::Text(name.into()),
        Value::Bytes(info_hash.to_vec()),
    ])
}

impl TryFrom<Value> for Handover {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let items = match value {
            Value::Null => return Ok(Handover::Qr),
            Value::Array(items) => items,
            _ => return Err(Error::UnknownHandover),
        };
        let handover = match <[Value; 3]>::try_from(items) {
            Ok([Value::Bytes(client_id_hash), Value::Bytes(response_uri_hash), Value::Text(nonce)]) => {
                Handover::OpenId4VpIso18013_7 {
                    client_id_hash,
                    response_uri_hash,
                    nonce,
                }
            }
            Ok(_) => return Err(Error::UnknownHandover),
            Err(items) => match <[Value; 2]>::try_from(items) {
                Ok([Value::Bytes(handover_select), Value::Bytes(request)]) => Handover::Nfc {
                    handover_select,
                    handover_request: Some(request),
                },
                Ok([Value::Bytes(handover_select), Value::Null]) => Handover::Nfc {
                    handover_select,
                    handover_request: None,
                },
                Ok([Value::Text(name), Value::Bytes(info_hash)]) => match name.as_str() {
                    OPENID4VP_HANDOVER => Handover::OpenId4Vp { info_hash },
                    OPENID4VP_DC_API_HANDOVER => Handover::OpenId4VpDcApi { info_hash },
                    ISO_DC_API_HANDOVER => Handover::IsoDcApi { info_hash },
                    _ => return Err(Error::UnknownHandover),
                },
                _ => return Err(Error::UnknownHandover),
            },
        };
        Ok(handover)
    }
}

impl SessionTranscript {
    /// Device retrieval: both engagement structures are present.
    ///
    /// Takes the encoded DeviceEngagement and EReaderKey (a COSE_Key) as they were
    /// exchanged, so that the transcript embeds exactly those bytes.
    pub fn proximity(
        device_engagement: Vec<u8>,
        e_reader_key: Vec<u8>,
        handover: Handover,
    ) -> Result<Self> {
        Ok(Self {
            device_engagement_bytes: Some(Tag24::from_bytes(device_engagement)?),
            e_reader_key_bytes: Some(Tag24::from_bytes(e_reader_key)?),
            handover,
        })
    }

    /// Remote presentation: no engagement structures.
    pub fn remote(handover: Handover) -> Self {
        Self {
            device_engagement_bytes: None,
            e_reader_key_bytes: None,
            handover,
        }
    }

    pub fn to_value(&self) -> Value {
        let tagged = |bytes: &Option<Tag24<Value>>| bytes.as_ref().map_or(Value::Null, Tag24::to_value);
        Value::Array(vec![
            tagged(&self.device_engagement_bytes),
            tagged(&self.e_reader_key_bytes),
            self.handover.to_value(),
        ])
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(cbor::to_vec(&self.to_value())?)
    }

    /// `SessionTranscriptBytes = #6.24(bstr .cbor SessionTranscript)`
    pub fn to_tagged_bytes(&self) -> Result<Vec<u8>> {
        Ok(Tag24::new(self.to_value())?.to_tagged_bytes()?)
    }

    pub fn to_base64url(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_bytes()?))
    }

    pub fn from_base64url(encoded: &str) -> Result<Self> {
        let value: Value = cbor::from_slice(&URL_SAFE_NO_PAD.decode(encoded)?)?;
        value.try_into()
    }
}

impl TryFrom<Value> for SessionTranscript {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let items = match value {
            Value::Array(items) => items,
            _ => return Err(Error::InvalidTranscript("expected an array")),
        };
        let [device_engagement, e_reader_key, handover] = <[Value; 3]>::try_from(items)
            .map_err(|_| Error::InvalidTranscript("expected three elements"))?;
        let engagement = |value: Value| -> Result<Option<Tag24<Value>>> {
            match value {
                Value::Null => Ok(None),
                tagged => Ok(Some(Tag24::try_from(tagged)?)),
            }
        };
        Ok(Self {
            device_engagement_bytes: engagement(device_engagement)?,
            e_reader_key_bytes: engagement(e_reader_key)?,
            handover: handover.try_into()?,
        })
    }
}

impl Serialize for SessionTranscript {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SessionTranscript {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(d)?
            .try_into()
            .map_err(de::Error::custom)
    }
}

impl Serialize for Handover {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Handover {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(d)?
            .try_into()
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn qr_transcript() {
        let transcript = SessionTranscript::remote(Handover::Qr);
        assert_eq!(transcript.to_bytes().unwrap(), vec![0x83, 0xf6, 0xf6, 0xf6]);
    }

    #[test]
    fn proximity_embeds_engagement_bytes() {
        // Engagement bytes are kept as given, including a non-minimal integer.
        let transcript =
            SessionTranscript::proximity(vec![0x18, 0x01], vec![0xa0], Handover::Qr).unwrap();
        assert_eq!(
            hex::encode(transcript.to_bytes().unwrap()),
            "83d818421801d81841a0f6"
        );
        let decoded: SessionTranscript = cbor::from_slice(&transcript.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, transcript);
    }

    #[test]
    fn transcript_is_deterministic() {
        let build = || {
            SessionTranscript::remote(
                Handover::oid4vp_dc_api("https://verifier.example", "nonce", None).unwrap(),
            )
            .to_bytes()
            .unwrap()
        };
        assert_eq!(build(), build());

        let other_origin = SessionTranscript::remote(
            Handover::oid4vp_dc_api("https://attacker.example", "nonce", None).unwrap(),
        );
        assert_ne!(build(), other_origin.to_bytes().unwrap());
        let other_nonce = SessionTranscript::remote(
            Handover::oid4vp_dc_api("https://verifier.example", "nonce2", None).unwrap(),
        );
        assert_ne!(build(), other_nonce.to_bytes().unwrap());
    }

    #[rstest::rstest]
    #[case::qr(Handover::Qr)]
    #[case::nfc(Handover::Nfc { handover_select: vec![1, 2], handover_request: None })]
    #[case::nfc_negotiated(Handover::Nfc { handover_select: vec![1], handover_request: Some(vec![3]) })]
    #[case::annex_b(Handover::oid4vp_iso18013_7("client", "https://r.example", "n", "m").unwrap())]
    #[case::oid4vp(Handover::oid4vp("client", "n", Some(&[9u8; 32][..]), "https://r.example").unwrap())]
    #[case::dc_api(Handover::oid4vp_dc_api("https://o.example", "n", None).unwrap())]
    #[case::iso_dc_api(Handover::iso_dc_api("ZW5j", "https://o.example").unwrap())]
    fn base64url_round_trip(#[case] handover: Handover) {
        let encoded = handover.to_base64url().unwrap();
        assert!(!encoded.contains('='));
        assert_eq!(Handover::from_base64url(&encoded).unwrap(), handover);

        let transcript = SessionTranscript::remote(handover);
        let encoded = transcript.to_base64url().unwrap();
        let decoded = SessionTranscript::from_base64url(&encoded).unwrap();
        assert_eq!(decoded.to_bytes().unwrap(), transcript.to_bytes().unwrap());
    }

    #[test]
    fn padded_base64url_is_rejected() {
        // 0xf6 (null) encodes as "9g" unpadded.
        assert_eq!(Handover::from_base64url("9g").unwrap(), Handover::Qr);
        assert!(matches!(
            Handover::from_base64url("9g=="),
            Err(Error::Base64(_))
        ));
    }

    #[test]
    fn unknown_handover_is_rejected() {
        let value = Value::Array(vec![Value::Text("other".into()), Value::Bytes(vec![0])]);
        assert!(matches!(
            Handover::try_from(value),
            Err(Error::UnknownHandover)
        ));
    }
}
