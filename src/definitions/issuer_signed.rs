//! The issuer-attested half of a [Document](super::Document).
//!
//! Each claim travels as an [IssuerSignedItemBytes]: the tag 24 wrapping of an
//! [IssuerSignedItem]. The MSO digest for a claim is computed over exactly those bytes,
//! which is why the wrapping keeps the bytes it was decoded from.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    cbor::Value,
    cose::CoseSign1,
    definitions::{
        helpers::{ByteStr, NonEmptyMap, NonEmptyVec, Tag24},
        DigestId,
    },
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSigned {
    #[serde(skip_serializing_if = "Option::is_none", rename = "nameSpaces")]
    pub namespaces: Option<IssuerNamespaces>,
    pub issuer_auth: CoseSign1,
}

pub type IssuerNamespaces = NonEmptyMap<String, NonEmptyVec<IssuerSignedItemBytes>>;
pub type IssuerSignedItemBytes = Tag24<IssuerSignedItem>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSignedItem {
    #[serde(rename = "digestID")]
    pub digest_id: DigestId,

    /// Salt, so that equal values do not produce equal digests.
    pub random: ByteStr,

    pub element_identifier: String,

    pub element_value: Value,
}

impl IssuerSigned {
    /// Disclosed claims as `namespace -> element -> value`.
    pub fn claims(&self) -> BTreeMap<String, BTreeMap<String, Value>> {
        self.namespaces
            .iter()
            .flat_map(|namespaces| namespaces.iter())
            .map(|(namespace, items)| {
                let elements = items
                    .iter()
                    .map(|item| {
                        let item = item.as_ref();
                        (item.element_identifier.clone(), item.element_value.clone())
                    })
                    .collect();
                (namespace.clone(), elements)
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cbor;

    #[test]
    fn item_field_names() {
        let item = IssuerSignedItem {
            digest_id: 0,
            random: vec![0xaa; 2].into(),
            element_identifier: "family_name".into(),
            element_value: Value::Text("Doe".into()),
        };
        let bytes = cbor::to_vec(&item).unwrap();
        // {"digestID": 0, "random": h'aaaa', "elementIdentifier": "family_name",
        //  "elementValue": "Doe"}
        assert_eq!(
            hex::encode(&bytes),
            "a4686469676573744944006672616e646f6d42aaaa71656c656d656e744964656e7469666965726b66616d696c795f6e616d656c656c656d656e7456616c756563446f65"
        );
        let decoded: IssuerSignedItem = cbor::from_slice(&bytes).unwrap();
        assert_eq!(decoded, item);
    }
}
