//! COSE signing and MAC engine.
//!
//! Signing keys are consumed through the [AsymmetricKey] capability so that keys living in
//! an HSM or a remote key-management service can be used without exposing key material.
pub mod key;
pub mod mac0;
pub mod sign1;

pub use key::{AsymmetricKey, EcPublicKey, EcSigningKey, IdentifiedKey, KeyError, KeyType};
pub use mac0::{CoseMac0, EMacKey};
pub use sign1::{sign1, verify1, CoseSign1, KeySource, PreparedCoseSign1, Sign1Headers};

/// See: <https://www.iana.org/assignments/cose/cose.xhtml#header-parameters>
pub const X5CHAIN_HEADER_LABEL: i64 = 33;

/// Private-use header label carrying the signer's COSE_Key.
pub const COSE_KEY_HEADER_LABEL: i64 = -65537;
