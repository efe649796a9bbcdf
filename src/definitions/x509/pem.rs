//! Strict PEM framing for certificates.
//!
//! Output wraps the base64 body at 64 columns with LF line endings. Input may use LF or
//! CRLF; the body must be canonical padded base64.
use pem_rfc7468::LineEnding;

use super::Error;

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Decode a single `CERTIFICATE` PEM block to DER.
pub fn decode_certificate(pem: &[u8]) -> Result<Vec<u8>, Error> {
    let (label, der) = pem_rfc7468::decode_vec(pem)
        .map_err(|e| Error::Pem(format!("unable to decode PEM: {e}")))?;
    if label != CERTIFICATE_LABEL {
        return Err(Error::Pem(format!(
            "expected a '{CERTIFICATE_LABEL}' block, found '{label}'"
        )));
    }
    Ok(der)
}

pub fn encode_certificate(der: &[u8]) -> Result<String, Error> {
    pem_rfc7468::encode_string(CERTIFICATE_LABEL, LineEnding::LF, der)
        .map_err(|e| Error::Pem(format!("unable to encode PEM: {e}")))
}
