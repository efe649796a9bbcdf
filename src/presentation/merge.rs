//! Merging issuer-attested and device-attested claims into one view.
//!
//! The merge is a pure data operation; it assumes both sides have already been
//! authenticated.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::cbor::Value;

/// Claims as `namespace -> element -> value`.
pub type Claims = BTreeMap<String, BTreeMap<String, Value>>;

/// What to do when the issuer and the device disclose the same element.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Fail.
    #[default]
    Clash,
    /// The device value wins.
    Override,
    /// The issuer value wins and the device value is dropped.
    UseFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{namespace}/{element}' is disclosed by both the issuer and the device")]
pub struct MergeError {
    pub namespace: String,
    pub element: String,
}

/// Merge device claims into issuer claims under `policy`.
pub fn merge(issuer: Claims, device: Claims, policy: MergePolicy) -> Result<Claims, MergeError> {
    let mut merged = issuer;
    for (namespace, elements) in device {
        let target = merged.entry(namespace.clone()).or_default();
        for (element, value) in elements {
            if !target.contains_key(&element) {
                target.insert(element, value);
                continue;
            }
            match policy {
                MergePolicy::Clash => return Err(MergeError { namespace, element }),
                MergePolicy::Override => {
                    tracing::debug!("device value overrides {namespace}/{element}");
                    target.insert(element, value);
                }
                MergePolicy::UseFirst => {
                    tracing::debug!("dropping device value for {namespace}/{element}");
                }
            }
        }
    }
    Ok(merged)
}
