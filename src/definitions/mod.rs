pub mod device_key;
pub mod device_request;
pub mod device_response;
pub mod device_signed;
pub mod helpers;
pub mod issuer_signed;
pub mod mso;
pub mod session;
pub mod validity_info;
pub mod x509;

pub use device_key::{CoseKey, DeviceKeyInfo, KeyAuthorizations};
pub use device_request::{DeviceRequest, DocRequest, ItemsRequest, ReaderAuthentication};
pub use device_response::{DeviceResponse, Document};
pub use device_signed::{DeviceAuth, DeviceAuthentication, DeviceSigned};
pub use issuer_signed::{IssuerSigned, IssuerSignedItem};
pub use mso::{DigestAlgorithm, DigestId, DigestIds, Mso};
pub use session::{Handover, SessionTranscript};
pub use validity_info::ValidityInfo;
