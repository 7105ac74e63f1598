use std::convert::Infallible;
use std::str::FromStr;

use bson::Document;
use serde::{Deserialize, Serialize};
use serde_json::Number;

use super::{blank_as_none, insert_eq, number_or_none};
use crate::resources::Resource;
use crate::store::Collection;

/// Marketing state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PropertyStatus {
    #[default]
    Available,
    Pending,
    Sold,
}

/// Listing submitted on create. `status` defaults to `Available`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Stored exactly as sent: integers stay integers.
    pub price: Number,
    pub property_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<Number>,
    /// Floor area in square feet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Number>,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub status: PropertyStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PropertyStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn direction(self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

/// Only `desc` sorts descending; any other supplied value sorts ascending.
impl FromStr for SortOrder {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(if value == "desc" { Self::Desc } else { Self::Asc })
    }
}

/// `GET /api/properties` parameters. Price bounds are inclusive; a bound that is not a
/// number is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyQuery {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub property_type: Option<String>,
    #[serde(default, deserialize_with = "number_or_none")]
    pub min_price: Option<f64>,
    #[serde(default, deserialize_with = "number_or_none")]
    pub max_price: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub sort_by: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub order: Option<SortOrder>,
}

pub struct Properties;

impl Resource for Properties {
    const COLLECTION: Collection = Collection::Properties;
    const LABEL: &'static str = "Property";
    const PATH: &'static str = "/api/properties";

    type Create = NewProperty;
    type Patch = PropertyPatch;
    type Query = PropertyQuery;

    fn filter(query: &PropertyQuery) -> Document {
        let mut filter = Document::new();
        insert_eq(&mut filter, "city", query.city.as_deref());
        insert_eq(&mut filter, "propertyType", query.property_type.as_deref());

        let mut price = Document::new();
        if let Some(min) = query.min_price {
            price.insert("$gte", min);
        }
        if let Some(max) = query.max_price {
            price.insert("$lte", max);
        }
        if !price.is_empty() {
            filter.insert("price", price);
        }
        filter
    }

    fn sort(query: &PropertyQuery) -> Option<Document> {
        let field = query.sort_by.as_deref().unwrap_or("createdAt");
        let mut sort = Document::new();
        sort.insert(field, query.order.unwrap_or_default().direction());
        Some(sort)
    }
}
