//! MSO validity window, with each instant encoded as a tag 0 RFC 3339 string.
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    UtcOffset,
};

use crate::{
    cbor::{self, Value},
    definitions::x509::{profile::whole_seconds, ValidityPeriod},
    error::ErrorKind,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidityInfo {
    pub signed: OffsetDateTime,
    pub valid_from: OffsetDateTime,
    pub valid_until: OffsetDateTime,
    pub expected_update: Option<OffsetDateTime>,
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("when parsing a CBOR map, could not find required field: '{0}'")]
    MissingField(&'static str),
    #[error("expected to parse a CBOR map, received: {0}")]
    NotAMap(&'static str),
    #[error("expected a tag 0 date-time text string, received: {0}")]
    NotATag0(&'static str),
    #[error("failed to parse date string as rfc3339 date: {0}")]
    UnableToParseDate(#[from] time::error::Parse),
    #[error("failed to format date: {0}")]
    UnableToFormatDate(#[from] time::error::Format),
    #[error("validity window out of order: signed <= validFrom <= validUntil is required")]
    OutOfOrder,
    #[error(
        "validity window {valid_from} to {valid_until} exceeds the signing certificate's {not_before} to {not_after}"
    )]
    OutsideCertificate {
        valid_from: OffsetDateTime,
        valid_until: OffsetDateTime,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OutsideCertificate { .. } => ErrorKind::Profile,
            _ => ErrorKind::Malformed,
        }
    }
}

impl ValidityInfo {
    /// Whole seconds, as the tag 0 encoding carries them.
    pub fn new(
        signed: OffsetDateTime,
        valid_from: OffsetDateTime,
        valid_until: OffsetDateTime,
        expected_update: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            signed: whole_seconds(signed),
            valid_from: whole_seconds(valid_from),
            valid_until: whole_seconds(valid_until),
            expected_update: expected_update.map(whole_seconds),
        }
    }

    /// The same window with any sub-second part dropped.
    pub fn truncated(self) -> Self {
        Self::new(
            self.signed,
            self.valid_from,
            self.valid_until,
            self.expected_update,
        )
    }

    /// Require `signed <= validFrom <= validUntil`, and `expectedUpdate` after `signed`.
    pub fn validate(&self) -> Result<()> {
        let expected_update_ok = self
            .expected_update
            .map_or(true, |expected_update| expected_update >= self.signed);
        if self.signed <= self.valid_from && self.valid_from <= self.valid_until && expected_update_ok
        {
            Ok(())
        } else {
            Err(Error::OutOfOrder)
        }
    }

    /// Whether `at` falls inside `[validFrom, validUntil]`.
    pub fn is_valid_at(&self, at: OffsetDateTime) -> bool {
        self.valid_from <= at && at <= self.valid_until
    }

    /// Require `[validFrom, validUntil]` to lie inside the signing certificate's validity.
    pub fn check_within(&self, certificate: &ValidityPeriod) -> Result<()> {
        if certificate.not_before <= self.valid_from && self.valid_until <= certificate.not_after {
            Ok(())
        } else {
            Err(Error::OutsideCertificate {
                valid_from: self.valid_from,
                valid_until: self.valid_until,
                not_before: certificate.not_before,
                not_after: certificate.not_after,
            })
        }
    }

    fn to_value(&self) -> Result<Value> {
        let mut entries = vec![
            (Value::Text("signed".into()), datetime_to_cbor(self.signed)?),
            (Value::Text("validFrom".into()), datetime_to_cbor(self.valid_from)?),
            (Value::Text("validUntil".into()), datetime_to_cbor(self.valid_until)?),
        ];
        if let Some(expected_update) = self.expected_update {
            entries.push((
                Value::Text("expectedUpdate".into()),
                datetime_to_cbor(expected_update)?,
            ));
        }
        Ok(Value::Map(entries))
    }
}

impl TryFrom<Value> for ValidityInfo {
    type Error = Error;

    fn try_from(v: Value) -> Result<ValidityInfo> {
        let entries = match v {
            Value::Map(entries) => entries,
            other => return Err(Error::NotAMap(cbor::type_name(&other))),
        };
        let required = |field: &'static str| {
            cbor::map_get(&entries, field)
                .ok_or(Error::MissingField(field))
                .and_then(cbor_to_datetime)
        };
        Ok(Self {
            signed: required("signed")?,
            valid_from: required("validFrom")?,
            valid_until: required("validUntil")?,
            expected_update: cbor::map_get(&entries, "expectedUpdate")
                .map(cbor_to_datetime)
                .transpose()?,
        })
    }
}

impl Serialize for ValidityInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ValidityInfo {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(d)?
            .try_into()
            .map_err(de::Error::custom)
    }
}

/// Whole seconds in UTC with a `Z` suffix, as ISO 18013-5 requires.
fn datetime_to_cbor(datetime: OffsetDateTime) -> Result<Value> {
    let text = datetime
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))?;
    Ok(Value::Tag(0, Box::new(Value::Text(text))))
}

fn cbor_to_datetime(v: &Value) -> Result<OffsetDateTime> {
    match v {
        Value::Tag(0, inner) => match inner.as_ref() {
            Value::Text(date_str) => Ok(OffsetDateTime::parse(date_str, &Rfc3339)?),
            other => Err(Error::NotATag0(cbor::type_name(other))),
        },
        other => Err(Error::NotATag0(cbor::type_name(other))),
    }
}
