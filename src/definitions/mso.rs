//! The Mobile Security Object: the issuer-signed manifest of claim digests.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use strum_macros::{Display, EnumString};

use crate::{
    definitions::{
        helpers::{tag24, ByteStr},
        issuer_signed::{IssuerNamespaces, IssuerSignedItemBytes},
        DeviceKeyInfo, ValidityInfo,
    },
    error::ErrorKind,
};

pub type DigestId = u64;
pub type DigestIds = BTreeMap<DigestId, ByteStr>;

pub const MSO_VERSION: &str = "1.0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mso {
    pub version: String,
    pub digest_algorithm: DigestAlgorithm,
    pub value_digests: BTreeMap<String, DigestIds>,
    pub device_key_info: DeviceKeyInfo,
    pub doc_type: String,
    pub validity_info: ValidityInfo,
}

#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display, EnumString,
)]
pub enum DigestAlgorithm {
    #[serde(rename = "SHA-256")]
    #[strum(serialize = "SHA-256")]
    SHA256,
    #[serde(rename = "SHA-384")]
    #[strum(serialize = "SHA-384")]
    SHA384,
    #[serde(rename = "SHA-512")]
    #[strum(serialize = "SHA-512")]
    SHA512,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("digest mismatch for '{namespace}/{element}' (digestID {digest_id})")]
    IntegrityFailure {
        namespace: String,
        element: String,
        digest_id: DigestId,
    },
    #[error("namespace '{0}' has no digests in the MSO")]
    MissingNamespace(String),
    #[error("no MSO digest for '{namespace}/{element}' (digestID {digest_id})")]
    MissingDigest {
        namespace: String,
        element: String,
        digest_id: DigestId,
    },
    #[error("unable to encode item: {0}")]
    Encoding(#[from] tag24::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Encoding(_) => ErrorKind::Malformed,
            _ => ErrorKind::Integrity,
        }
    }
}

impl DigestAlgorithm {
    pub fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::SHA256 => Sha256::digest(bytes).to_vec(),
            DigestAlgorithm::SHA384 => Sha384::digest(bytes).to_vec(),
            DigestAlgorithm::SHA512 => Sha512::digest(bytes).to_vec(),
        }
    }

    /// Digest of an item as it is carried in IssuerSigned: `#6.24(bstr .cbor item)`.
    pub fn digest_item(self, item: &IssuerSignedItemBytes) -> Result<Vec<u8>, Error> {
        Ok(self.digest(&item.to_tagged_bytes()?))
    }
}

impl Mso {
    /// Recompute the digest of every disclosed item and compare it with the MSO.
    ///
    /// Stops at the first failure. The error names the namespace, element and digest id.
    pub fn verify_issuer_signed_digests(&self, namespaces: &IssuerNamespaces) -> Result<(), Error> {
        for (namespace, items) in namespaces.iter() {
            let digests = self
                .value_digests
                .get(namespace)
                .ok_or_else(|| Error::MissingNamespace(namespace.clone()))?;
            for item_bytes in items.iter() {
                let item = item_bytes.as_ref();
                let expected =
                    digests
                        .get(&item.digest_id)
                        .ok_or_else(|| Error::MissingDigest {
                            namespace: namespace.clone(),
                            element: item.element_identifier.clone(),
                            digest_id: item.digest_id,
                        })?;
                let actual = self.digest_algorithm.digest_item(item_bytes)?;
                if actual != expected.as_ref() {
                    tracing::warn!(
                        "digest mismatch for {namespace}/{}",
                        item.element_identifier
                    );
                    return Err(Error::IntegrityFailure {
                        namespace: namespace.clone(),
                        element: item.element_identifier.clone(),
                        digest_id: item.digest_id,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[rstest::rstest]
    #[case::sha256(DigestAlgorithm::SHA256, "SHA-256", 32)]
    #[case::sha384(DigestAlgorithm::SHA384, "SHA-384", 48)]
    #[case::sha512(DigestAlgorithm::SHA512, "SHA-512", 64)]
    fn digest_algorithms(#[case] alg: DigestAlgorithm, #[case] name: &str, #[case] len: usize) {
        assert_eq!(alg.to_string(), name);
        assert_eq!(name.parse::<DigestAlgorithm>().unwrap(), alg);
        assert_eq!(alg.digest(b"abc").len(), len);
    }

    #[test]
    fn sha256_vector() {
        assert_eq!(
            hex::encode(DigestAlgorithm::SHA256.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
