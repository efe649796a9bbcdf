use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cbor::Value;
use crate::definitions::helpers::{NonEmptyMap, NonEmptyVec};

pub mod cose_key;
pub use cose_key::CoseKey;

/// The holder's device key, as bound into the MSO.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceKeyInfo {
    pub device_key: CoseKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_authorizations: Option<KeyAuthorizations>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_info: Option<BTreeMap<i64, Value>>,
}

/// Namespaces and data elements the device key may sign over.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAuthorizations {
    #[serde(skip_serializing_if = "Option::is_none", rename = "nameSpaces")]
    pub namespaces: Option<NonEmptyVec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_elements: Option<NonEmptyMap<String, NonEmptyVec<String>>>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("namespace '{0}' cannot be present in both authorized_namespaces and authorized_data_elements")]
    DoubleAuthorized(String),
}

impl From<CoseKey> for DeviceKeyInfo {
    fn from(device_key: CoseKey) -> Self {
        Self {
            device_key,
            key_authorizations: None,
            key_info: None,
        }
    }
}

impl KeyAuthorizations {
    /// A namespace authorized as a whole cannot also be listed in authorized data elements.
    pub fn validate(&self) -> Result<(), Error> {
        let (Some(namespaces), Some(data_elements)) = (&self.namespaces, &self.data_elements)
        else {
            return Ok(());
        };
        match namespaces
            .iter()
            .find(|namespace| data_elements.contains_key(*namespace))
        {
            Some(namespace) => Err(Error::DoubleAuthorized(namespace.clone())),
            None => Ok(()),
        }
    }

    /// Whether the device key may sign over the given element.
    pub fn permitted(&self, namespace: &str, element_identifier: &str) -> bool {
        let whole_namespace = self
            .namespaces
            .as_ref()
            .is_some_and(|namespaces| namespaces.iter().any(|n| n == namespace));
        let single_element = self
            .data_elements
            .as_ref()
            .and_then(|data_elements| data_elements.get(namespace))
            .is_some_and(|elements| elements.iter().any(|e| e == element_identifier));
        whole_namespace || single_element
    }
}
