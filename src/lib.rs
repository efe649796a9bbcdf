//! ISO/IEC 18013-5 mobile document (mdoc) engine.
//!
//! The crate covers the signed credential data model ([definitions]), the COSE signing and
//! verification engine ([cose]), issuance of signed documents ([issuance]), presentation
//! and verification of documents bound to a session transcript ([presentation]) and the
//! X.509 certificate profile for IACA and Document Signer certificates
//! ([definitions::x509]).
pub mod cbor;
pub mod cose;
pub mod definitions;
pub mod error;
pub mod issuance;
pub mod presentation;

pub use error::{Error, ErrorKind};
