//! Reader requests and the ReaderAuthentication structure the reader key signs.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    cbor::Value,
    cose::CoseSign1,
    definitions::{
        helpers::{tag24, NonEmptyMap, NonEmptyVec, Tag24},
        session::SessionTranscript,
    },
};

pub type ItemsRequestBytes = Tag24<ItemsRequest>;
pub type DocType = String;
pub type NameSpace = String;
pub type IntentToRetain = bool;
pub type DataElementIdentifier = String;
pub type DataElements = NonEmptyMap<DataElementIdentifier, IntentToRetain>;
pub type Namespaces = NonEmptyMap<NameSpace, DataElements>;
pub type ReaderAuth = CoseSign1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    pub version: String,
    pub doc_requests: NonEmptyVec<DocRequest>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocRequest {
    pub items_request: ItemsRequestBytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_auth: Option<ReaderAuth>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsRequest {
    pub doc_type: DocType,
    #[serde(rename = "nameSpaces")]
    pub namespaces: Namespaces,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_info: Option<BTreeMap<String, Value>>,
}

impl DeviceRequest {
    pub const VERSION: &'static str = "1.0";
}

/// `["ReaderAuthentication", SessionTranscript, ItemsRequestBytes]`
#[derive(Clone, Debug, Serialize)]
pub struct ReaderAuthentication(&'static str, SessionTranscript, ItemsRequestBytes);

impl ReaderAuthentication {
    pub fn new(transcript: SessionTranscript, items_request: ItemsRequestBytes) -> Self {
        Self("ReaderAuthentication", transcript, items_request)
    }

    /// `ReaderAuthenticationBytes = #6.24(bstr .cbor ReaderAuthentication)`
    pub fn to_tagged_bytes(&self) -> Result<Vec<u8>, tag24::Error> {
        Tag24::new(self)?.to_tagged_bytes()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{cbor, definitions::session::Handover};

    const ITEMS_REQUEST: &str = "D8185868A267646F6354797065756F72672E69736F2E31383031332E352E312E6D444C6A6E616D65537061636573A1716F72672E69736F2E31383031332E352E31A36B66616D696C795F6E616D65F46A676976656E5F6E616D65F46F646F63756D656E745F6E756D626572F4";

    #[test]
    fn items_request() {
        let bytes: Vec<u8> = hex::decode(ITEMS_REQUEST).unwrap();
        let req: ItemsRequestBytes = cbor::from_slice(&bytes).unwrap();
        assert_eq!(req.as_ref().doc_type, "org.iso.18013.5.1.mDL");
        let elements = &req.as_ref().namespaces["org.iso.18013.5.1"];
        assert_eq!(elements.len(), 3);
        assert_eq!(cbor::to_vec(&req).unwrap(), bytes);
    }

    #[test]
    fn device_request() {
        const HEX: &str = "A26776657273696F6E63312E306B646F63526571756573747381A16C6974656D7352657175657374D8185868A267646F6354797065756F72672E69736F2E31383031332E352E312E6D444C6A6E616D65537061636573A1716F72672E69736F2E31383031332E352E31A36B66616D696C795F6E616D65F46A676976656E5F6E616D65F46F646F63756D656E745F6E756D626572F4";
        let bytes: Vec<u8> = hex::decode(HEX).unwrap();
        let req: DeviceRequest = cbor::from_slice(&bytes).unwrap();
        assert_eq!(req.version, DeviceRequest::VERSION);
        assert!(req.doc_requests[0].reader_auth.is_none());
        assert_eq!(cbor::to_vec(&req).unwrap(), bytes);
    }

    #[test]
    fn reader_authentication_layout() {
        let items_request: ItemsRequestBytes =
            cbor::from_slice(&hex::decode(ITEMS_REQUEST).unwrap()).unwrap();
        let auth = ReaderAuthentication::new(SessionTranscript::remote(Handover::Qr), items_request);
        let value: Value = cbor::from_slice(&cbor::to_vec(&auth).unwrap()).unwrap();
        let Value::Array(items) = value else {
            panic!("expected an array")
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Value::Text("ReaderAuthentication".into()));
        assert!(matches!(items[2], Value::Tag(24, _)));

        let tagged = auth.to_tagged_bytes().unwrap();
        assert_eq!(&tagged[..2], &[0xd8, 0x18]);
    }
}
