use bson::Document;
use serde::{Deserialize, Serialize};

use super::{blank_as_none, insert_eq};
use crate::resources::Resource;
use crate::store::Collection;

/// Agent profile submitted on create. Email is unique across agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default)]
    pub active_listings: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_listings: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentQuery {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub specialization: Option<String>,
}

pub struct Agents;

impl Resource for Agents {
    const COLLECTION: Collection = Collection::Agents;
    const LABEL: &'static str = "Agent";
    const PATH: &'static str = "/api/agents";

    type Create = NewAgent;
    type Patch = AgentPatch;
    type Query = AgentQuery;

    fn filter(query: &AgentQuery) -> Document {
        let mut filter = Document::new();
        insert_eq(&mut filter, "specialization", query.specialization.as_deref());
        filter
    }
}
