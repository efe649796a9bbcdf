//! Issuance of signed mdocs.
//!
//! Every claim becomes an [IssuerSignedItem] with a fresh salt and a digest id given by its
//! position in the namespace. The MSO lists the digest of each item and is signed by the
//! issuer, either directly through an [AsymmetricKey] or remotely through [PreparedMdoc].
use std::collections::BTreeMap;

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    cbor::{CborError, Value},
    cose::{
        key::KeyError,
        sign1::{PreparedCoseSign1, SigningError},
        AsymmetricKey, CoseSign1, KeyType, Sign1Headers,
    },
    definitions::{
        device_key,
        helpers::{tag24, NonEmptyMap, NonEmptyVec, Tag24},
        issuer_signed::{IssuerNamespaces, IssuerSignedItemBytes},
        mso::MSO_VERSION,
        validity_info,
        x509::X5Chain,
        DeviceKeyInfo, DeviceSigned, DigestAlgorithm, DigestId, DigestIds, Document,
        IssuerSigned, IssuerSignedItem, Mso, ValidityInfo,
    },
    error::ErrorKind,
};

/// Claims to issue, as `namespace -> [(element identifier, value)]`, in insertion order.
pub type Namespaces = BTreeMap<String, Vec<(String, Value)>>;

/// Length of the salt carried by every item.
pub const SALT_LEN: usize = 16;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
/// A signed mdoc.
pub struct Mdoc {
    pub doc_type: String,
    pub mso: Mso,
    pub namespaces: IssuerNamespaces,
    pub issuer_auth: CoseSign1,
}

#[derive(Debug, Clone)]
/// An incomplete mdoc, requiring a remotely signed signature to be completed.
pub struct PreparedMdoc {
    doc_type: String,
    mso: Mso,
    namespaces: IssuerNamespaces,
    prepared_sig: PreparedCoseSign1,
}

#[derive(Debug, Clone, Default)]
pub struct Builder {
    doc_type: Option<String>,
    namespaces: Namespaces,
    validity_info: Option<ValidityInfo>,
    digest_algorithm: Option<DigestAlgorithm>,
    device_key_info: Option<DeviceKeyInfo>,
    x5chain: Option<X5Chain>,
}

#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("missing parameter: '{0}'")]
    MissingParameter(&'static str),
    #[error("element '{element}' appears more than once in namespace '{namespace}'")]
    DuplicateElement { namespace: String, element: String },
    #[error("namespace '{0}' has no elements")]
    EmptyNamespace(String),
    #[error("at least one namespace is required")]
    NoNamespaces,
    #[error(transparent)]
    ValidityInfo(#[from] validity_info::Error),
    #[error(transparent)]
    KeyAuthorizations(#[from] device_key::Error),
    #[error("unable to encode: {0}")]
    Encoding(#[from] tag24::Error),
    #[error("unable to encode: {0}")]
    Cbor(#[from] CborError),
    #[error("the x5chain certifies a {certificate} key but the mdoc is signed with a {signer} key")]
    KeyTypeMismatch { certificate: KeyType, signer: KeyType },
    #[error("unable to read the x5chain leaf key: {0}")]
    X5Chain(KeyError),
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl IssuanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IssuanceError::Signing(e) => e.kind(),
            IssuanceError::ValidityInfo(e) => e.kind(),
            IssuanceError::KeyTypeMismatch { .. } => ErrorKind::UnsupportedAlgorithm,
            IssuanceError::X5Chain(KeyError::UnsupportedAlgorithm(_))
            | IssuanceError::X5Chain(KeyError::UnsupportedKeyType(_)) => {
                ErrorKind::UnsupportedAlgorithm
            }
            _ => ErrorKind::Malformed,
        }
    }
}

type Result<T, E = IssuanceError> = std::result::Result<T, E>;

impl Mdoc {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Prepare mdoc for remote signing.
    pub fn prepare(
        doc_type: String,
        namespaces: Namespaces,
        validity_info: ValidityInfo,
        digest_algorithm: DigestAlgorithm,
        device_key_info: DeviceKeyInfo,
        x5chain: X5Chain,
        key_type: KeyType,
    ) -> Result<PreparedMdoc> {
        let validity_info = validity_info.truncated();
        validity_info.validate()?;
        validity_info.check_within(&x5chain.end_entity_validity())?;
        if let Some(authorizations) = &device_key_info.key_authorizations {
            authorizations.validate()?;
        }
        check_certified_key_type(&x5chain, key_type)?;

        let (issuer_namespaces, value_digests) = build_digests(namespaces, digest_algorithm)?;

        let mso = Mso {
            version: MSO_VERSION.to_string(),
            digest_algorithm,
            value_digests,
            device_key_info,
            doc_type: doc_type.clone(),
            validity_info,
        };

        let mso_bytes = Tag24::new(&mso)?.to_tagged_bytes()?;
        let headers = Sign1Headers {
            x5chain: Some(x5chain),
            ..Default::default()
        };
        let prepared_sig = PreparedCoseSign1::new(mso_bytes, &headers, key_type)?;

        Ok(PreparedMdoc {
            doc_type,
            namespaces: issuer_namespaces,
            mso,
            prepared_sig,
        })
    }

    /// Directly sign and issue an mdoc.
    pub async fn issue(
        doc_type: String,
        namespaces: Namespaces,
        validity_info: ValidityInfo,
        digest_algorithm: DigestAlgorithm,
        device_key_info: DeviceKeyInfo,
        x5chain: X5Chain,
        signer: &dyn AsymmetricKey,
    ) -> Result<Mdoc> {
        let prepared_mdoc = Self::prepare(
            doc_type,
            namespaces,
            validity_info,
            digest_algorithm,
            device_key_info,
            x5chain,
            signer.key_type(),
        )?;

        let signature = signer
            .sign(prepared_mdoc.signature_payload())
            .await
            .map_err(SigningError::from)?;

        prepared_mdoc.complete(signature)
    }

    /// IssuerSigned releasing only the items `disclose` accepts.
    ///
    /// The issuer signature covers every digest, so any subset still verifies.
    pub fn disclose(&self, disclose: impl Fn(&str, &str) -> bool) -> IssuerSigned {
        let namespaces = self
            .namespaces
            .iter()
            .filter_map(|(namespace, items)| {
                let items = items
                    .iter()
                    .filter(|item| disclose(namespace, &item.as_ref().element_identifier))
                    .cloned()
                    .collect();
                NonEmptyVec::maybe_new(items).map(|items| (namespace.clone(), items))
            })
            .collect();
        IssuerSigned {
            namespaces: NonEmptyMap::maybe_new(namespaces),
            issuer_auth: self.issuer_auth.clone(),
        }
    }

    /// IssuerSigned releasing every item.
    pub fn issuer_signed(&self) -> IssuerSigned {
        self.disclose(|_, _| true)
    }

    /// A response document from the given disclosure and device-signed data.
    pub fn document(&self, issuer_signed: IssuerSigned, device_signed: DeviceSigned) -> Document {
        Document {
            doc_type: self.doc_type.clone(),
            issuer_signed,
            device_signed: Some(device_signed),
            errors: None,
        }
    }
}

impl PreparedMdoc {
    /// Retrieve the payload for a remote signature.
    pub fn signature_payload(&self) -> &[u8] {
        self.prepared_sig.signature_payload()
    }

    /// Supply the remotely signed signature to complete and issue the prepared mdoc.
    pub fn complete(self, signature: Vec<u8>) -> Result<Mdoc> {
        let PreparedMdoc {
            doc_type,
            namespaces,
            mso,
            prepared_sig,
        } = self;

        let issuer_auth = prepared_sig.finalize(signature)?;

        Ok(Mdoc {
            doc_type,
            mso,
            namespaces,
            issuer_auth,
        })
    }
}

impl Builder {
    /// Set the document type.
    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Add the data elements of one namespace.
    ///
    /// Adding a namespace that is already present appends to it. An element identifier may
    /// appear only once per namespace.
    pub fn add_namespace<I, K>(mut self, namespace: impl Into<String>, claims: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let namespace = namespace.into();
        let elements = self.namespaces.entry(namespace.clone()).or_default();
        for (element, value) in claims {
            let element = element.into();
            if elements.iter().any(|(existing, _)| *existing == element) {
                return Err(IssuanceError::DuplicateElement { namespace, element });
            }
            elements.push((element, value));
        }
        Ok(self)
    }

    /// Set the validity information
    pub fn validity_info(mut self, validity_info: ValidityInfo) -> Self {
        self.validity_info = Some(validity_info);
        self
    }

    /// Set the digest algorithm to be used for hashing the data elements.
    pub fn digest_algorithm(mut self, digest_algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = Some(digest_algorithm);
        self
    }

    /// Set the information about the device key that this mdoc will be issued to.
    pub fn device_key_info(mut self, device_key_info: DeviceKeyInfo) -> Self {
        self.device_key_info = Some(device_key_info);
        self
    }

    /// Set the x5chain of the issuing key.
    pub fn x5chain(mut self, x5chain: X5Chain) -> Self {
        self.x5chain = Some(x5chain);
        self
    }

    /// Prepare the mdoc for remote signing.
    ///
    /// The key type which the mdoc will be signed with must be known ahead of time as its
    /// algorithm is a required field in the protected header.
    pub fn prepare(self, key_type: KeyType) -> Result<PreparedMdoc> {
        let (doc_type, validity_info, digest_algorithm, device_key_info, x5chain) =
            self.required()?;
        Mdoc::prepare(
            doc_type,
            self.namespaces,
            validity_info,
            digest_algorithm,
            device_key_info,
            x5chain,
            key_type,
        )
    }

    /// Directly issue an mdoc.
    pub async fn issue(self, signer: &dyn AsymmetricKey) -> Result<Mdoc> {
        let (doc_type, validity_info, digest_algorithm, device_key_info, x5chain) =
            self.required()?;
        Mdoc::issue(
            doc_type,
            self.namespaces,
            validity_info,
            digest_algorithm,
            device_key_info,
            x5chain,
            signer,
        )
        .await
    }

    #[allow(clippy::type_complexity)]
    fn required(
        &self,
    ) -> Result<(String, ValidityInfo, DigestAlgorithm, DeviceKeyInfo, X5Chain)> {
        let doc_type = self
            .doc_type
            .clone()
            .ok_or(IssuanceError::MissingParameter("doc_type"))?;
        let validity_info = self
            .validity_info
            .clone()
            .ok_or(IssuanceError::MissingParameter("validity_info"))?;
        let digest_algorithm = self
            .digest_algorithm
            .ok_or(IssuanceError::MissingParameter("digest_algorithm"))?;
        let device_key_info = self
            .device_key_info
            .clone()
            .ok_or(IssuanceError::MissingParameter("device_key_info"))?;
        let x5chain = self
            .x5chain
            .clone()
            .ok_or(IssuanceError::MissingParameter("x5chain"))?;
        Ok((
            doc_type,
            validity_info,
            digest_algorithm,
            device_key_info,
            x5chain,
        ))
    }
}

fn check_certified_key_type(x5chain: &X5Chain, signer: KeyType) -> Result<()> {
    let certificate = KeyType::from_spki(
        &x5chain
            .end_entity_certificate()
            .tbs_certificate
            .subject_public_key_info,
    )
    .map_err(IssuanceError::X5Chain)?;
    if certificate == signer {
        Ok(())
    } else {
        Err(IssuanceError::KeyTypeMismatch {
            certificate,
            signer,
        })
    }
}

/// Salt and number every claim, and digest each resulting item.
///
/// Returns the items as they are disclosed in IssuerSigned together with the MSO
/// `valueDigests`.
pub fn build_digests(
    namespaces: Namespaces,
    digest_algorithm: DigestAlgorithm,
) -> Result<(IssuerNamespaces, BTreeMap<String, DigestIds>)> {
    let issuer_namespaces = to_issuer_namespaces(namespaces)?;
    let value_digests = digest_namespaces(&issuer_namespaces, digest_algorithm)?;
    Ok((issuer_namespaces, value_digests))
}

fn to_issuer_namespaces(namespaces: Namespaces) -> Result<IssuerNamespaces> {
    let namespaces = namespaces
        .into_iter()
        .map(|(name, elements)| {
            let items = to_issuer_signed_items(elements)
                .map(Tag24::new)
                .collect::<Result<Vec<_>, _>>()?;
            NonEmptyVec::maybe_new(items)
                .map(|items| (name.clone(), items))
                .ok_or(IssuanceError::EmptyNamespace(name))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;
    NonEmptyMap::maybe_new(namespaces).ok_or(IssuanceError::NoNamespaces)
}

fn to_issuer_signed_items(
    elements: Vec<(String, Value)>,
) -> impl Iterator<Item = IssuerSignedItem> {
    elements
        .into_iter()
        .zip(0..)
        .map(|((element_identifier, element_value), digest_id)| {
            let mut random = vec![0u8; SALT_LEN];
            OsRng.fill_bytes(&mut random);
            IssuerSignedItem {
                digest_id,
                random: random.into(),
                element_identifier,
                element_value,
            }
        })
}

fn digest_namespaces(
    namespaces: &IssuerNamespaces,
    digest_algorithm: DigestAlgorithm,
) -> Result<BTreeMap<String, DigestIds>> {
    namespaces
        .iter()
        .map(|(name, elements)| Ok((name.clone(), digest_namespace(elements, digest_algorithm)?)))
        .collect()
}

fn digest_namespace(
    elements: &[IssuerSignedItemBytes],
    digest_algorithm: DigestAlgorithm,
) -> Result<DigestIds> {
    elements
        .iter()
        .map(|item| {
            let digest_id: DigestId = item.as_ref().digest_id;
            let digest = digest_algorithm.digest(&item.to_tagged_bytes()?);
            Ok((digest_id, digest.into()))
        })
        .collect()
}
