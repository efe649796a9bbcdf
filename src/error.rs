//! Crate-wide error type.
//!
//! Every module keeps its own error enum with the detail that matters to it. [Error]
//! gathers them, and [Error::kind] places any of them in one of five classes.
use strum_macros::Display;

use crate::{
    cbor::CborError,
    cose::{
        mac0,
        sign1::{SigningError, VerificationError},
    },
    definitions::{device_key::cose_key, helpers::tag24, mso, session, x509},
    issuance::mdoc::IssuanceError,
    presentation::{authentication, merge::MergeError, verifier},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Input does not decode, or decodes to the wrong shape.
    Malformed,
    /// A digest, signature or MAC does not match.
    Integrity,
    /// A certificate breaks the ISO 18013-5 profile.
    Profile,
    /// Issuer and device both disclose the same element.
    MergeConflict,
    UnsupportedAlgorithm,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Cbor(#[from] CborError),
    #[error(transparent)]
    Tag24(#[from] tag24::Error),
    #[error(transparent)]
    CoseKey(#[from] cose_key::Error),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Mac(#[from] mac0::Error),
    #[error(transparent)]
    Mso(#[from] mso::Error),
    #[error(transparent)]
    Session(#[from] session::Error),
    #[error(transparent)]
    Issuance(#[from] IssuanceError),
    #[error(transparent)]
    Authentication(#[from] authentication::Error),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    X509(#[from] x509::Error),
    #[error(transparent)]
    Verifier(#[from] verifier::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Cbor(_) | Error::Tag24(_) | Error::Session(_) => ErrorKind::Malformed,
            Error::CoseKey(e) => match e {
                cose_key::Error::UnsupportedCurve(_)
                | cose_key::Error::UnsupportedVerifier(_)
                | cose_key::Error::UnsupportedKeyType => ErrorKind::UnsupportedAlgorithm,
                _ => ErrorKind::Malformed,
            },
            Error::Signing(e) => e.kind(),
            Error::Verification(e) => e.kind(),
            Error::Mac(e) => e.kind(),
            Error::Mso(e) => e.kind(),
            Error::Issuance(e) => e.kind(),
            Error::Authentication(e) => e.kind(),
            Error::Merge(_) => ErrorKind::MergeConflict,
            Error::X509(e) => e.kind(),
            Error::Verifier(e) => e.kind(),
        }
    }
}
