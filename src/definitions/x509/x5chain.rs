use std::io::Read;

use der::{Decode, Encode};
use x509_cert::certificate::Certificate;

use super::{
    pem, profile::ValidityPeriod, util::common_name_or_unknown, util::public_key,
    validation::validity::validity_period, Error,
};
use crate::{cbor::Value, cose::EcPublicKey, definitions::helpers::NonEmptyVec};

/// X.509 certificate with the DER representation held in memory for ease of serialization.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CertificateWithDer {
    pub inner: Certificate,
    der: Vec<u8>,
}

impl CertificateWithDer {
    pub fn from_pem(bytes: &[u8]) -> Result<Self, Error> {
        Self::from_der(&pem::decode_certificate(bytes)?)
    }

    pub fn from_der(bytes: &[u8]) -> Result<Self, Error> {
        let inner = Certificate::from_der(bytes).map_err(Error::Decoding)?;
        Ok(Self {
            inner,
            der: bytes.to_vec(),
        })
    }

    pub fn from_cert(certificate: Certificate) -> Result<Self, Error> {
        let der = certificate.to_der().map_err(Error::Encoding)?;
        Ok(Self {
            inner: certificate,
            der,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> Result<String, Error> {
        pem::encode_certificate(&self.der)
    }
}

/// The `x5chain` COSE header: the signer's certificate first, then its issuers.
///
/// A single certificate is carried as a bstr, several as an array of bstr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X5Chain(NonEmptyVec<CertificateWithDer>);

impl From<NonEmptyVec<CertificateWithDer>> for X5Chain {
    fn from(v: NonEmptyVec<CertificateWithDer>) -> Self {
        Self(v)
    }
}

impl From<CertificateWithDer> for X5Chain {
    fn from(certificate: CertificateWithDer) -> Self {
        Self(NonEmptyVec::new(certificate))
    }
}

impl X5Chain {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn to_value(&self) -> Value {
        match self.0.as_ref() {
            [cert] => Value::Bytes(cert.der.clone()),
            certs => Value::Array(
                certs
                    .iter()
                    .map(|x509| Value::Bytes(x509.der.clone()))
                    .collect(),
            ),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Bytes(bytes) => Self::builder().with_der_certificate(bytes)?.build(),
            Value::Array(x509s) => x509s
                .iter()
                .try_fold(Self::builder(), |builder, x509| match x509 {
                    Value::Bytes(bytes) => builder.with_der_certificate(bytes),
                    _ => Err(Error::X5Chain(format!(
                        "expected x509 certificate in the x5chain to be a cbor encoded bytestring, but received: {x509:?}"
                    ))),
                })?
                .build(),
            _ => Err(Error::X5Chain(format!(
                "expected x5chain to be a cbor encoded bytestring or array, but received: {value:?}"
            ))),
        }
    }

    /// Retrieve the end-entity certificate.
    pub fn end_entity_certificate(&self) -> &Certificate {
        &self.0[0].inner
    }

    pub fn end_entity(&self) -> &CertificateWithDer {
        &self.0[0]
    }

    /// The validity window of the end-entity certificate.
    pub fn end_entity_validity(&self) -> ValidityPeriod {
        validity_period(self.end_entity_certificate())
    }

    /// Retrieve the public key of the end-entity certificate.
    pub fn end_entity_public_key(&self) -> Result<EcPublicKey, Error> {
        Ok(public_key(self.end_entity_certificate())?)
    }

    /// Retrieve the common name of the end-entity certificate.
    pub fn end_entity_common_name(&self) -> &str {
        common_name_or_unknown(self.end_entity_certificate())
    }

    /// Iterate over the certificates in the chain.
    pub fn iter(&self) -> impl Iterator<Item = &CertificateWithDer> {
        self.0.iter()
    }
}

#[derive(Default, Debug, Clone)]
pub struct Builder {
    certs: Vec<CertificateWithDer>,
}

impl Builder {
    pub fn with_certificate(mut self, cert: Certificate) -> Result<Builder, Error> {
        self.certs.push(CertificateWithDer::from_cert(cert)?);
        Ok(self)
    }

    pub fn with_certificate_and_der(mut self, x509: CertificateWithDer) -> Builder {
        self.certs.push(x509);
        self
    }

    pub fn with_pem_certificate(mut self, data: &[u8]) -> Result<Builder, Error> {
        self.certs.push(CertificateWithDer::from_pem(data)?);
        Ok(self)
    }

    pub fn with_der_certificate(mut self, data: &[u8]) -> Result<Builder, Error> {
        self.certs.push(CertificateWithDer::from_der(data)?);
        Ok(self)
    }

    pub fn with_pem_certificate_from_io<R: Read>(self, mut io: R) -> Result<Builder, Error> {
        let mut data: Vec<u8> = vec![];
        io.read_to_end(&mut data)
            .map_err(|e| Error::Pem(format!("unable to read certificate: {e}")))?;
        self.with_pem_certificate(&data)
    }

    pub fn build(self) -> Result<X5Chain, Error> {
        NonEmptyVec::maybe_new(self.certs)
            .map(X5Chain)
            .ok_or_else(|| {
                Error::X5Chain("at least one certificate must be given to the builder".into())
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_chain_is_rejected() {
        assert!(matches!(X5Chain::builder().build(), Err(Error::X5Chain(_))));
        assert!(X5Chain::from_value(&Value::Array(vec![])).is_err());
        assert!(X5Chain::from_value(&Value::Text("cert".into())).is_err());
    }

    #[test]
    fn garbage_der_is_rejected() {
        let err = X5Chain::from_value(&Value::Bytes(vec![0x30, 0x03, 0x02, 0x01])).unwrap_err();
        assert!(matches!(err, Error::Decoding(_)));
    }
}
