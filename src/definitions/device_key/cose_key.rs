use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    cbor::{self, CborError, Value},
    cose::key::{EcPublicKey, KeyError, KeyType},
};

/// An implementation of RFC-8152 [COSE_Key](https://datatracker.ietf.org/doc/html/rfc8152#section-13)
/// restricted to the requirements of ISO/IEC 18013-5:2021.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKey {
    EC2 { crv: EC2Curve, x: Vec<u8>, y: EC2Y },
    OKP { crv: OKPCurve, x: Vec<u8> },
}

/// The sign bit or value of the y-coordinate for the EC point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EC2Y {
    Value(Vec<u8>),
    SignBit(bool),
}

/// The RFC-8152 identifier of the curve, for EC2 key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EC2Curve {
    P256,
    P384,
    P521,
    P256K,
}

/// The RFC-8152 identifier of the curve, for OKP key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OKPCurve {
    X25519,
    X448,
    Ed25519,
    Ed448,
}

/// Errors that can occur when decoding or using a COSE_Key.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("COSE_Key of kty 'EC2' missing x coordinate")]
    EC2MissingX,
    #[error("COSE_Key of kty 'EC2' missing y coordinate")]
    EC2MissingY,
    #[error("expected a CBOR bool or bstr for the y-coordinate, received: {0}")]
    InvalidTypeY(&'static str),
    #[error("expected a CBOR map, received: {0}")]
    NotAMap(&'static str),
    #[error("COSE_Key map has a duplicate label")]
    DuplicateLabel,
    #[error("unsupported curve identifier: {0}")]
    UnsupportedCurve(i128),
    #[error("only EC2 and OKP keys are supported")]
    UnsupportedKeyType,
    #[error("compressed points are not supported")]
    UnsupportedFormat,
    #[error("the {0:?} curve has no verifier in this crate")]
    UnsupportedVerifier(EC2Curve),
    #[error(transparent)]
    InvalidKey(#[from] KeyError),
    #[error(transparent)]
    Cbor(#[from] CborError),
}

const KTY: i128 = 1;
const CRV: i128 = -1;
const X: i128 = -2;
const Y: i128 = -3;
const KTY_OKP: i128 = 1;
const KTY_EC2: i128 = 2;

impl EC2Curve {
    fn id(self) -> i128 {
        match self {
            EC2Curve::P256 => 1,
            EC2Curve::P384 => 2,
            EC2Curve::P521 => 3,
            EC2Curve::P256K => 8,
        }
    }

    fn key_type(self) -> Option<KeyType> {
        match self {
            EC2Curve::P256 => Some(KeyType::Secp256r1),
            EC2Curve::P384 => Some(KeyType::Secp384r1),
            EC2Curve::P521 => Some(KeyType::Secp521r1),
            EC2Curve::P256K => None,
        }
    }
}

impl TryFrom<i128> for EC2Curve {
    type Error = Error;

    fn try_from(crv: i128) -> Result<Self, Error> {
        match crv {
            1 => Ok(EC2Curve::P256),
            2 => Ok(EC2Curve::P384),
            3 => Ok(EC2Curve::P521),
            8 => Ok(EC2Curve::P256K),
            other => Err(Error::UnsupportedCurve(other)),
        }
    }
}

impl OKPCurve {
    fn id(self) -> i128 {
        match self {
            OKPCurve::X25519 => 4,
            OKPCurve::X448 => 5,
            OKPCurve::Ed25519 => 6,
            OKPCurve::Ed448 => 7,
        }
    }
}

impl TryFrom<i128> for OKPCurve {
    type Error = Error;

    fn try_from(crv: i128) -> Result<Self, Error> {
        match crv {
            4 => Ok(OKPCurve::X25519),
            5 => Ok(OKPCurve::X448),
            6 => Ok(OKPCurve::Ed25519),
            7 => Ok(OKPCurve::Ed448),
            other => Err(Error::UnsupportedCurve(other)),
        }
    }
}

impl CoseKey {
    /// The key type for signing purposes, if the curve is one the engines know.
    pub fn key_type(&self) -> Option<KeyType> {
        match self {
            CoseKey::EC2 { crv, .. } => crv.key_type(),
            CoseKey::OKP {
                crv: OKPCurve::Ed25519,
                ..
            } => Some(KeyType::Ed25519),
            CoseKey::OKP { .. } => None,
        }
    }

    pub fn to_value(&self) -> Result<Value, CborError> {
        let int = |i: i128| -> Result<Value, CborError> {
            Ok(Value::Integer(i.try_into().map_err(|_| CborError::OutOfRange)?))
        };
        let entries = match self {
            CoseKey::EC2 { crv, x, y } => vec![
                (int(KTY)?, int(KTY_EC2)?),
                (int(CRV)?, int(crv.id())?),
                (int(X)?, Value::Bytes(x.clone())),
                (
                    int(Y)?,
                    match y {
                        EC2Y::Value(y) => Value::Bytes(y.clone()),
                        EC2Y::SignBit(b) => Value::Bool(*b),
                    },
                ),
            ],
            CoseKey::OKP { crv, x } => vec![
                (int(KTY)?, int(KTY_OKP)?),
                (int(CRV)?, int(crv.id())?),
                (int(X)?, Value::Bytes(x.clone())),
            ],
        };
        Ok(Value::Map(entries))
    }
}

impl TryFrom<Value> for CoseKey {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self, Error> {
        let entries = match v {
            Value::Map(entries) => entries,
            other => return Err(Error::NotAMap(cbor::type_name(&other))),
        };

        let mut labelled = Vec::with_capacity(entries.len());
        for (label, value) in entries {
            // Text labels (kid names and the like) carry nothing the engines use.
            let Value::Integer(label) = label else {
                continue;
            };
            let label = i128::from(label);
            if labelled.iter().any(|(l, _)| *l == label) {
                return Err(Error::DuplicateLabel);
            }
            labelled.push((label, value));
        }
        let mut take = |label: i128| {
            labelled
                .iter()
                .position(|(l, _)| *l == label)
                .map(|i| labelled.swap_remove(i).1)
        };
        let integer = |value: Option<Value>| match value {
            Some(Value::Integer(i)) => Some(i128::from(i)),
            _ => None,
        };

        let kty = integer(take(KTY)).ok_or(Error::UnsupportedKeyType)?;
        let crv = integer(take(CRV)).ok_or(Error::UnsupportedKeyType)?;
        let x = match take(X) {
            Some(Value::Bytes(x)) => x,
            _ => return Err(Error::EC2MissingX),
        };
        match kty {
            KTY_EC2 => {
                let y = match take(Y) {
                    Some(Value::Bytes(y)) => EC2Y::Value(y),
                    Some(Value::Bool(b)) => EC2Y::SignBit(b),
                    Some(other) => return Err(Error::InvalidTypeY(cbor::type_name(&other))),
                    None => return Err(Error::EC2MissingY),
                };
                Ok(CoseKey::EC2 {
                    crv: crv.try_into()?,
                    x,
                    y,
                })
            }
            KTY_OKP => Ok(CoseKey::OKP {
                crv: crv.try_into()?,
                x,
            }),
            _ => Err(Error::UnsupportedKeyType),
        }
    }
}

impl Serialize for CoseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CoseKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer)?
            .try_into()
            .map_err(de::Error::custom)
    }
}

impl From<&EcPublicKey> for CoseKey {
    fn from(key: &EcPublicKey) -> Self {
        let crv = match key.key_type() {
            KeyType::Secp384r1 => EC2Curve::P384,
            _ => EC2Curve::P256,
        };
        // Uncompressed SEC1: 0x04 || x || y.
        let point = key.to_sec1_bytes();
        let coordinates = &point[1..];
        let (x, y) = coordinates.split_at(coordinates.len() / 2);
        CoseKey::EC2 {
            crv,
            x: x.to_vec(),
            y: EC2Y::Value(y.to_vec()),
        }
    }
}

impl TryFrom<&CoseKey> for EcPublicKey {
    type Error = Error;

    fn try_from(key: &CoseKey) -> Result<Self, Error> {
        match key {
            CoseKey::EC2 {
                crv,
                x,
                y: EC2Y::Value(y),
            } => {
                let key_type = match crv {
                    EC2Curve::P256 => KeyType::Secp256r1,
                    EC2Curve::P384 => KeyType::Secp384r1,
                    other => return Err(Error::UnsupportedVerifier(*other)),
                };
                let mut point = Vec::with_capacity(1 + x.len() + y.len());
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                Ok(EcPublicKey::from_sec1_bytes(key_type, &point)?)
            }
            CoseKey::EC2 {
                y: EC2Y::SignBit(_),
                ..
            } => Err(Error::UnsupportedFormat),
            CoseKey::OKP { .. } => Err(Error::UnsupportedKeyType),
        }
    }
}
