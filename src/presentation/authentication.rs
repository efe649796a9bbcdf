//! Mdoc authentication.
//!
//! 1. As part of mdoc response, the holder produces `DeviceAuth`, which is either a
//!    `DeviceSignature` or a `DeviceMac`, over the DeviceAuthenticationBytes.
//!
//! 2. The reader must authenticate that `DeviceKey` in the MSO is the key that generated the
//!    `DeviceAuth`.
//!
//! 3. The reader must authenticate that the `DeviceKey` is authorized by `KeyAuthorizations` to
//!    sign over the data elements present in `DeviceNameSpaces`.
//!
//! Reader authentication works the same way over the ReaderAuthenticationBytes, with the key
//! resolved from the request's own headers.
use crate::{
    cose::{
        mac0::{self, mac0, verify_mac0},
        sign1::{PreparedCoseSign1, SigningError, VerificationError},
        verify1, AsymmetricKey, EMacKey, EcPublicKey, KeySource, Sign1Headers,
    },
    definitions::{
        device_key::cose_key,
        device_request::{DocRequest, ItemsRequestBytes},
        device_signed::{DeviceNamespaces, DeviceNamespacesBytes},
        helpers::{tag24, Tag24},
        x509::X5Chain,
        DeviceAuth, DeviceAuthentication, DeviceSigned, Document, Mso, ReaderAuthentication,
        SessionTranscript,
    },
    error::ErrorKind,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to encode the authenticated structure: {0}")]
    Encoding(#[from] tag24::Error),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Mac(#[from] mac0::Error),
    #[error("the MSO device key is unusable: {0}")]
    DeviceKey(#[from] cose_key::Error),
    #[error("the document carries no DeviceSigned structure")]
    MissingDeviceSigned,
    #[error("the request carries no readerAuth")]
    MissingReaderAuth,
    #[error("the document is MACed but no EMacKey was supplied")]
    MissingEMacKey,
    #[error("device signature was verified with the {0} key instead of the MSO device key")]
    NotDeviceKey(KeySource),
    #[error("the device key is not authorized to sign '{namespace}/{element}'")]
    Unauthorized { namespace: String, element: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Signing(e) => e.kind(),
            Error::Verification(e) => e.kind(),
            Error::Mac(e) => e.kind(),
            Error::DeviceKey(
                cose_key::Error::UnsupportedCurve(_)
                | cose_key::Error::UnsupportedVerifier(_)
                | cose_key::Error::UnsupportedKeyType,
            ) => ErrorKind::UnsupportedAlgorithm,
            Error::NotDeviceKey(_) | Error::Unauthorized { .. } => ErrorKind::Integrity,
            Error::Encoding(_)
            | Error::DeviceKey(_)
            | Error::MissingDeviceSigned
            | Error::MissingReaderAuth
            | Error::MissingEMacKey => ErrorKind::Malformed,
        }
    }
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// `DeviceAuthenticationBytes` for a document presented under `transcript`.
pub fn device_authentication_bytes(
    transcript: &SessionTranscript,
    doc_type: &str,
    namespaces: &DeviceNamespacesBytes,
) -> Result<Vec<u8>> {
    Ok(
        DeviceAuthentication::new(transcript.clone(), doc_type.to_string(), namespaces.clone())
            .to_tagged_bytes()?,
    )
}

/// `ReaderAuthenticationBytes` for a request made under `transcript`.
pub fn reader_authentication_bytes(
    transcript: &SessionTranscript,
    items_request: &ItemsRequestBytes,
) -> Result<Vec<u8>> {
    Ok(ReaderAuthentication::new(transcript.clone(), items_request.clone()).to_tagged_bytes()?)
}

/// Sign device-attested claims with the device key.
///
/// The signature is detached and carries no key id; the reader verifies it with the device
/// key bound into the MSO.
pub async fn device_sign(
    transcript: &SessionTranscript,
    doc_type: &str,
    namespaces: DeviceNamespaces,
    device_key: &dyn AsymmetricKey,
) -> Result<DeviceSigned> {
    let namespaces = Tag24::new(namespaces)?;
    let payload = device_authentication_bytes(transcript, doc_type, &namespaces)?;
    let headers = Sign1Headers {
        detached: true,
        ..Default::default()
    };
    let prepared = PreparedCoseSign1::new(payload, &headers, device_key.key_type())?;
    let signature = device_key
        .sign(prepared.signature_payload())
        .await
        .map_err(SigningError::from)?;
    Ok(DeviceSigned {
        namespaces,
        device_auth: DeviceAuth::DeviceSignature(prepared.finalize(signature)?),
    })
}

/// MAC device-attested claims with the session's EMacKey.
pub fn device_mac(
    transcript: &SessionTranscript,
    doc_type: &str,
    namespaces: DeviceNamespaces,
    emac_key: &EMacKey,
) -> Result<DeviceSigned> {
    let namespaces = Tag24::new(namespaces)?;
    let payload = device_authentication_bytes(transcript, doc_type, &namespaces)?;
    Ok(DeviceSigned {
        namespaces,
        device_auth: DeviceAuth::DeviceMac(mac0(&payload, emac_key, true)?),
    })
}

/// Verify the DeviceAuth of `document` against the device key in `mso`.
///
/// A MACed document needs the EMacKey agreed for the session.
pub async fn verify_device_auth(
    document: &Document,
    mso: &Mso,
    transcript: &SessionTranscript,
    emac_key: Option<&EMacKey>,
) -> Result<()> {
    let device_signed = document
        .device_signed
        .as_ref()
        .ok_or(Error::MissingDeviceSigned)?;
    let payload =
        device_authentication_bytes(transcript, &document.doc_type, &device_signed.namespaces)?;

    match &device_signed.device_auth {
        DeviceAuth::DeviceSignature(signature) => {
            let device_key = EcPublicKey::try_from(&mso.device_key_info.device_key)?;
            let source = verify1(signature, &[&device_key], Some(&payload)).await?;
            if source != KeySource::CallerKeyId {
                return Err(Error::NotDeviceKey(source));
            }
        }
        DeviceAuth::DeviceMac(mac) => {
            let emac_key = emac_key.ok_or(Error::MissingEMacKey)?;
            verify_mac0(mac, emac_key, Some(&payload))?;
        }
    }
    tracing::debug!("device authentication verified for {}", document.doc_type);
    Ok(())
}

/// Every device-signed element must be authorized by the MSO key authorizations.
///
/// A document without device-signed elements needs no authorization.
pub fn check_key_authorizations(device_signed: &DeviceSigned, mso: &Mso) -> Result<()> {
    let authorizations = mso.device_key_info.key_authorizations.as_ref();
    for (namespace, items) in device_signed.namespaces.as_ref() {
        for element in items.keys() {
            if !authorizations.is_some_and(|a| a.permitted(namespace, element)) {
                tracing::warn!("device key is not authorized for {namespace}/{element}");
                return Err(Error::Unauthorized {
                    namespace: namespace.clone(),
                    element: element.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Sign a reader request. The reader certificate chain, if given, travels in the x5chain header.
pub async fn reader_sign(
    transcript: &SessionTranscript,
    items_request: ItemsRequestBytes,
    reader_key: &dyn AsymmetricKey,
    x5chain: Option<X5Chain>,
) -> Result<DocRequest> {
    let payload = reader_authentication_bytes(transcript, &items_request)?;
    let headers = Sign1Headers {
        x5chain,
        detached: true,
        ..Default::default()
    };
    let reader_auth = crate::cose::sign1(payload, &headers, reader_key).await?;
    Ok(DocRequest {
        items_request,
        reader_auth: Some(reader_auth),
    })
}

/// Verify the readerAuth of a request, returning which key verified it.
///
/// The key is resolved from the request headers first and from `candidates` otherwise. The
/// x5chain is not validated here.
pub async fn verify_reader_auth(
    doc_request: &DocRequest,
    transcript: &SessionTranscript,
    candidates: &[&dyn AsymmetricKey],
) -> Result<KeySource> {
    let reader_auth = doc_request
        .reader_auth
        .as_ref()
        .ok_or(Error::MissingReaderAuth)?;
    let payload = reader_authentication_bytes(transcript, &doc_request.items_request)?;
    Ok(verify1(reader_auth, candidates, Some(&payload)).await?)
}
