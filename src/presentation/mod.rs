//! Presentation of documents: device and reader authentication, merging of issuer and device
//! claims, and the verification flow a reader runs on a received document.
pub mod authentication;
pub mod merge;
pub mod verifier;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::{
    cbor::{self, CborError},
    definitions::{DeviceResponse, Document, IssuerSigned},
    issuance::Mdoc,
};

pub use merge::{merge, Claims, MergeError, MergePolicy};
pub use verifier::{
    AuthenticationStatus, ResponseAuthenticationOutcome, Verifier, VerifierConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum StringifyError {
    #[error("invalid base64url (unpadded) text: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Cbor(#[from] CborError),
}

/// Text form of a CBOR structure: its CBOR encoding as unpadded base64url.
pub trait Stringify: Serialize + for<'a> Deserialize<'a> {
    fn stringify(&self) -> Result<String, StringifyError> {
        Ok(URL_SAFE_NO_PAD.encode(cbor::to_vec(self)?))
    }

    /// Inverse of [Stringify::stringify].
    fn parse(encoded: &str) -> Result<Self, StringifyError> {
        let data = URL_SAFE_NO_PAD.decode(encoded.trim())?;
        Ok(cbor::from_slice(&data)?)
    }
}

impl Stringify for Mdoc {}
impl Stringify for IssuerSigned {}
impl Stringify for Document {}
impl Stringify for DeviceResponse {}
