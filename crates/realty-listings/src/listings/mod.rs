//! Entity payloads and list filters for the four listing collections.
//!
//! Reference fields (`agentId`, `propertyId`, `userId`) are plain identifier strings; the
//! service never checks that the referenced record exists.

pub mod agent;
pub mod inquiry;
pub mod property;
pub mod user;

use std::fmt;
use std::str::FromStr;

use bson::Document;
use serde::{Deserialize, Deserializer};

pub use agent::{AgentPatch, AgentQuery, Agents, NewAgent};
pub use inquiry::{Inquiries, InquiryPatch, InquiryQuery, InquiryStatus, NewInquiry};
pub use property::{NewProperty, Properties, PropertyPatch, PropertyQuery, PropertyStatus, SortOrder};
pub use user::{NewUser, UserPatch, UserQuery, Users};

/// Query-string helper: a blank value counts as absent, anything else must parse.
pub(crate) fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Numeric query bound: anything that does not parse as a number counts as absent.
pub(crate) fn number_or_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite()))
}

/// Add `field == value` to `filter` when a value was supplied.
pub(crate) fn insert_eq(filter: &mut Document, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        filter.insert(field, value);
    }
}
