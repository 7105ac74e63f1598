use bson::Document;
use serde::{Deserialize, Serialize};

use super::{blank_as_none, insert_eq};
use crate::resources::Resource;
use crate::store::Collection;

/// Follow-up state of a buyer inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InquiryStatus {
    #[default]
    Pending,
    Responded,
    Closed,
}

/// Buyer inquiry about a listing. `status` defaults to `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInquiry {
    pub property_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub status: InquiryStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InquiryStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryQuery {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub property_id: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub agent_id: Option<String>,
    /// Matched verbatim; an unknown label simply matches nothing.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub status: Option<String>,
}

pub struct Inquiries;

impl Resource for Inquiries {
    const COLLECTION: Collection = Collection::Inquiries;
    const LABEL: &'static str = "Inquiry";
    const PATH: &'static str = "/api/inquiries";

    type Create = NewInquiry;
    type Patch = InquiryPatch;
    type Query = InquiryQuery;

    fn filter(query: &InquiryQuery) -> Document {
        let mut filter = Document::new();
        insert_eq(&mut filter, "propertyId", query.property_id.as_deref());
        insert_eq(&mut filter, "userId", query.user_id.as_deref());
        insert_eq(&mut filter, "agentId", query.agent_id.as_deref());
        insert_eq(&mut filter, "status", query.status.as_deref());
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn status_defaults_to_pending() {
        let inquiry: NewInquiry = serde_json::from_value(serde_json::json!({
            "propertyId": "65a1f0c2e4b0a1b2c3d4e5f6",
            "message": "Is parking included?",
        }))
        .unwrap();
        assert_eq!(inquiry.status, InquiryStatus::Pending);
    }

    #[test]
    fn unknown_status_is_rejected_on_create() {
        let result = serde_json::from_value::<NewInquiry>(serde_json::json!({
            "propertyId": "x",
            "message": "hi",
            "status": "Escalated",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn every_supplied_reference_becomes_an_equality_filter() {
        let query = InquiryQuery {
            property_id: Some("p1".to_string()),
            user_id: None,
            agent_id: Some("a1".to_string()),
            status: Some("Responded".to_string()),
        };
        assert_eq!(
            Inquiries::filter(&query),
            doc! { "propertyId": "p1", "agentId": "a1", "status": "Responded" }
        );
    }
}
