//! Certificate signatures.
//!
//! The key capability deals in raw `r || s` signatures while X.509 carries ECDSA signatures
//! as a DER `Ecdsa-Sig-Value`, so both directions of the conversion live here.
use der::{asn1::UintRef, Decode, Encode, Sequence};
use x509_cert::Certificate;

use crate::{
    cose::key::{AsymmetricKey, KeyError, KeyType},
    definitions::x509::Error,
};

#[derive(Sequence)]
struct EcdsaSigValue<'a> {
    r: UintRef<'a>,
    s: UintRef<'a>,
}

/// Convert a raw signature into the form X.509 carries for the key type.
pub fn raw_to_x509(key_type: KeyType, raw: &[u8]) -> Result<Vec<u8>, Error> {
    match key_type {
        KeyType::Ed25519 => Ok(raw.to_vec()),
        KeyType::Rsa => Err(KeyError::UnsupportedKeyType(key_type).into()),
        _ => {
            let expected = key_type.signature_len().unwrap_or_default();
            if raw.len() != expected {
                return Err(KeyError::MalformedSignature(format!(
                    "expected {expected} bytes, found {}",
                    raw.len()
                ))
                .into());
            }
            let (r, s) = raw.split_at(expected / 2);
            EcdsaSigValue {
                r: UintRef::new(r).map_err(Error::Encoding)?,
                s: UintRef::new(s).map_err(Error::Encoding)?,
            }
            .to_der()
            .map_err(Error::Encoding)
        }
    }
}

/// Convert an X.509 signature into the raw form for the key type.
pub fn x509_to_raw(key_type: KeyType, signature: &[u8]) -> Result<Vec<u8>, Error> {
    match key_type {
        KeyType::Ed25519 => Ok(signature.to_vec()),
        KeyType::Rsa => Err(KeyError::UnsupportedKeyType(key_type).into()),
        _ => {
            let half = key_type.signature_len().unwrap_or_default() / 2;
            let value = EcdsaSigValue::from_der(signature).map_err(Error::Decoding)?;
            let mut raw = vec![0u8; half * 2];
            for (scalar, out) in [value.r, value.s].iter().zip(raw.chunks_mut(half)) {
                let bytes = scalar.as_bytes();
                if bytes.len() > half {
                    return Err(KeyError::MalformedSignature(format!(
                        "scalar of {} bytes does not fit in {half}",
                        bytes.len()
                    ))
                    .into());
                }
                out[half - bytes.len()..].copy_from_slice(bytes);
            }
            Ok(raw)
        }
    }
}

/// Check that the issuer key signed the subject certificate.
pub async fn issuer_signed_subject(
    subject: &Certificate,
    issuer_key: &dyn AsymmetricKey,
) -> Result<(), Error> {
    let key_type = issuer_key.key_type();
    if subject.signature_algorithm.oid != key_type.x509_signature_algorithm()?.oid {
        tracing::info!(
            "subject signature algorithm {} does not match the {key_type} issuer key",
            subject.signature_algorithm.oid
        );
        return Err(Error::SignatureInvalid);
    }

    let signature = match subject.signature.as_bytes() {
        Some(bytes) => x509_to_raw(key_type, bytes)?,
        None => return Err(Error::SignatureInvalid),
    };
    let tbs = subject.tbs_certificate.to_der().map_err(Error::Encoding)?;

    if issuer_key.verify(&tbs, &signature).await? {
        Ok(())
    } else {
        tracing::info!("subject certificate signature could not be validated");
        Err(Error::SignatureInvalid)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[rstest::rstest]
    #[case::p256(KeyType::Secp256r1)]
    #[case::p384(KeyType::Secp384r1)]
    #[case::p521(KeyType::Secp521r1)]
    fn der_round_trip(#[case] key_type: KeyType) {
        let len = key_type.signature_len().unwrap();
        let mut raw = vec![0x11; len];
        // Leading zero in r, high bit set in s.
        raw[0] = 0;
        raw[len / 2] = 0xff;
        let der = raw_to_x509(key_type, &raw).unwrap();
        assert_eq!(der[0], 0x30);
        assert_eq!(x509_to_raw(key_type, &der).unwrap(), raw);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(raw_to_x509(KeyType::Secp256r1, &[1; 63]).is_err());
    }

    #[test]
    fn known_encoding() {
        let mut raw = vec![0u8; 64];
        raw[31] = 1;
        raw[63] = 0x80;
        assert_eq!(
            hex::encode(raw_to_x509(KeyType::Secp256r1, &raw).unwrap()),
            "300702010102020080"
        );
    }
}
