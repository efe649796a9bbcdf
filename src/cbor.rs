//! Thin layer over [ciborium] fixing the error type used across the crate.
//!
//! Decoding is strict: a buffer must hold exactly one CBOR data item.
use std::io::Cursor;

use coset::CoseError;
use serde::{de::DeserializeOwned, Serialize};

pub use ciborium::Value;

#[derive(Debug, thiserror::Error)]
pub enum CborError {
    /// CBOR decoding failure.
    #[error("CBOR decoding failure: {0}")]
    DecodeFailed(String),
    /// CBOR encoding failure.
    #[error("CBOR encoding failure: {0}")]
    EncodeFailed(String),
    /// CBOR input had extra data.
    #[error("extraneous data: {0} trailing bytes")]
    ExtraneousData(usize),
    /// Duplicate map key detected.
    #[error("duplicate map key")]
    DuplicateMapKey,
    /// Unexpected CBOR item encountered (got, want).
    #[error("unexpected item: {0}, want {1}")]
    UnexpectedItem(&'static str, &'static str),
    /// Value on the wire is outside the range this crate supports.
    #[error("value out of range")]
    OutOfRange,
}

impl From<CoseError> for CborError {
    fn from(e: CoseError) -> Self {
        match e {
            CoseError::DecodeFailed(e) => CborError::DecodeFailed(e.to_string()),
            CoseError::DuplicateMapKey => CborError::DuplicateMapKey,
            CoseError::EncodeFailed => CborError::EncodeFailed("COSE structure".into()),
            CoseError::ExtraneousData => CborError::ExtraneousData(0),
            CoseError::OutOfRangeIntegerValue => CborError::OutOfRange,
            CoseError::UnexpectedItem(got, want) => CborError::UnexpectedItem(got, want),
            CoseError::UnregisteredIanaValue | CoseError::UnregisteredIanaNonPrivateValue => {
                CborError::OutOfRange
            }
        }
    }
}

pub fn to_vec<T>(value: &T) -> Result<Vec<u8>, CborError>
where
    T: Serialize + ?Sized,
{
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CborError::EncodeFailed(e.to_string()))?;
    Ok(buf)
}

pub fn from_slice<T>(slice: &[u8]) -> Result<T, CborError>
where
    T: DeserializeOwned,
{
    let mut cursor = Cursor::new(slice);
    let value = ciborium::from_reader(&mut cursor)
        .map_err(|e| CborError::DecodeFailed(e.to_string()))?;
    let trailing = slice.len() - cursor.position() as usize;
    if trailing != 0 {
        return Err(CborError::ExtraneousData(trailing));
    }
    Ok(value)
}

/// Convert a serializable type into a [Value] tree.
pub fn into_value<T>(value: &T) -> Result<Value, CborError>
where
    T: Serialize + ?Sized,
{
    Value::serialized(value).map_err(|e| CborError::EncodeFailed(e.to_string()))
}

/// Convert a [Value] tree into a type `T`.
pub fn from_value<T>(value: &Value) -> Result<T, CborError>
where
    T: DeserializeOwned,
{
    value
        .deserialized()
        .map_err(|e| CborError::DecodeFailed(e.to_string()))
}

/// Look up a text key in a decoded CBOR map.
pub(crate) fn map_get<'a>(entries: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

/// Name of the major type, for error reporting.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "int",
        Value::Bytes(_) => "bstr",
        Value::Float(_) => "float",
        Value::Text(_) => "tstr",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Tag(_, _) => "tag",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        _ => "unknown",
    }
}
