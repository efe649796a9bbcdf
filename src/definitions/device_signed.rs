//! The device-attested half of a [Document](super::Document), and the
//! DeviceAuthentication structure the device key signs or MACs.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    cbor::Value,
    cose::{CoseMac0, CoseSign1},
    definitions::{
        helpers::{tag24, NonEmptyMap, Tag24},
        session::SessionTranscript,
    },
};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSigned {
    #[serde(rename = "nameSpaces")]
    pub namespaces: DeviceNamespacesBytes,
    pub device_auth: DeviceAuth,
}

pub type DeviceNamespacesBytes = Tag24<DeviceNamespaces>;
pub type DeviceNamespaces = BTreeMap<String, DeviceSignedItems>;
pub type DeviceSignedItems = NonEmptyMap<String, Value>;

/// A detached COSE_Sign1 or COSE_Mac0 over the DeviceAuthenticationBytes.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceAuth {
    DeviceSignature(CoseSign1),
    DeviceMac(CoseMac0),
}

/// `["DeviceAuthentication", SessionTranscript, DocType, DeviceNameSpacesBytes]`
#[derive(Clone, Debug, Serialize)]
pub struct DeviceAuthentication(
    &'static str,
    SessionTranscript,
    String,
    DeviceNamespacesBytes,
);

impl DeviceAuthentication {
    pub fn new(
        transcript: SessionTranscript,
        doc_type: String,
        namespaces_bytes: DeviceNamespacesBytes,
    ) -> Self {
        Self(
            "DeviceAuthentication",
            transcript,
            doc_type,
            namespaces_bytes,
        )
    }

    /// `DeviceAuthenticationBytes = #6.24(bstr .cbor DeviceAuthentication)`, the bytes the
    /// device signs.
    pub fn to_tagged_bytes(&self) -> Result<Vec<u8>, tag24::Error> {
        Tag24::new(self)?.to_tagged_bytes()
    }
}

impl DeviceSigned {
    /// Claims as `namespace -> element -> value`.
    pub fn claims(&self) -> BTreeMap<String, BTreeMap<String, Value>> {
        self.namespaces
            .as_ref()
            .iter()
            .map(|(namespace, items)| (namespace.clone(), items.as_ref().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cbor, definitions::session::Handover};

    #[test]
    fn device_authentication_bytes() {
        let namespaces = Tag24::new(DeviceNamespaces::new()).unwrap();
        let auth = DeviceAuthentication::new(
            SessionTranscript::remote(Handover::Qr),
            "a".into(),
            namespaces,
        );
        assert_eq!(
            hex::encode(cbor::to_vec(&auth).unwrap()),
            "847444657669636541757468656e7469636174696f6e83f6f6f66161d81841a0"
        );
        assert_eq!(
            hex::encode(auth.to_tagged_bytes().unwrap()),
            "d8185820847444657669636541757468656e7469636174696f6e83f6f6f66161d81841a0"
        );
    }

    #[test]
    fn device_auth_is_a_single_entry_map() {
        let bytes = cbor::to_vec(&DeviceAuth::DeviceMac(
            cbor::from_slice(&hex::decode("8443a10105a0f64100").unwrap()).unwrap(),
        ))
        .unwrap();
        let value: Value = cbor::from_slice(&bytes).unwrap();
        let Value::Map(entries) = value else {
            panic!("expected a map")
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, Value::Text("deviceMac".into()));
        let roundtripped: DeviceAuth = cbor::from_slice(&bytes).unwrap();
        assert_eq!(cbor::to_vec(&roundtripped).unwrap(), bytes);
    }
}
