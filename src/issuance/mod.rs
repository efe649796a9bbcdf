//! Issuance of signed mdocs.
pub mod mdoc;

pub use mdoc::{build_digests, Builder, IssuanceError, Mdoc, Namespaces, PreparedMdoc};
