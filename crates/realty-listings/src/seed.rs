//! Database bootstrap: secondary indexes plus a small sample catalogue.
//!
//! Indexes are (re)declared on every run. Sample records are only inserted while the
//! properties collection is empty, so repeated runs never duplicate data.

use bson::{DateTime, Document};
use serde::Serialize;
use serde_json::Number;
use tracing::info;

use crate::listings::{
    InquiryStatus, NewAgent, NewInquiry, NewProperty, NewUser, PropertyStatus,
};
use crate::store::{Collection, DocumentStore, IndexSpec, StoreError};

/// Result of [`initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded {
        agents: usize,
        properties: usize,
        users: usize,
        inquiries: usize,
    },
    AlreadySeeded,
}

/// Indexes required by the list filters and the unique email constraints.
pub fn index_specs() -> Vec<IndexSpec> {
    vec![
        IndexSpec::ascending(Collection::Properties, &["city"]),
        IndexSpec::ascending(Collection::Properties, &["price"]),
        IndexSpec::ascending(Collection::Properties, &["propertyType"]),
        IndexSpec::ascending(Collection::Properties, &["city", "price"]),
        IndexSpec::ascending(Collection::Agents, &["email"]).unique(),
        IndexSpec::ascending(Collection::Users, &["email"]).unique(),
        IndexSpec::ascending(Collection::Inquiries, &["propertyId"]),
    ]
}

pub async fn initialize(store: &dyn DocumentStore) -> Result<SeedOutcome, StoreError> {
    for index in index_specs() {
        store.create_index(&index).await?;
    }
    info!("indexes ensured");

    if store.count(Collection::Properties).await? > 0 {
        info!("sample data already present, skipping seed");
        return Ok(SeedOutcome::AlreadySeeded);
    }

    let agent_ids = store
        .insert_many(Collection::Agents, stamped(&sample_agents())?)
        .await?;
    let agent = |index: usize| agent_ids.get(index).map(|id| id.to_hex());

    let properties = sample_properties(&[agent(0), agent(1), agent(2)]);
    let property_ids = store
        .insert_many(Collection::Properties, stamped(&properties)?)
        .await?;

    let user_ids = store
        .insert_many(Collection::Users, stamped(&sample_users())?)
        .await?;

    let inquiries = vec![
        NewInquiry {
            property_id: hex_at(&property_ids, 0),
            user_id: user_ids.first().map(|id| id.to_hex()),
            agent_id: agent(0),
            message: "I'm interested in scheduling a viewing".to_string(),
            status: InquiryStatus::Pending,
        },
        NewInquiry {
            property_id: hex_at(&property_ids, 1),
            user_id: user_ids.get(1).map(|id| id.to_hex()),
            agent_id: agent(1),
            message: "Can you provide more details about the property?".to_string(),
            status: InquiryStatus::Responded,
        },
    ];
    let inquiry_ids = store
        .insert_many(Collection::Inquiries, stamped(&inquiries)?)
        .await?;

    let outcome = SeedOutcome::Seeded {
        agents: agent_ids.len(),
        properties: property_ids.len(),
        users: user_ids.len(),
        inquiries: inquiry_ids.len(),
    };
    info!(?outcome, "sample data inserted");
    Ok(outcome)
}

fn hex_at(ids: &[bson::oid::ObjectId], index: usize) -> String {
    ids.get(index).map(|id| id.to_hex()).unwrap_or_default()
}

/// Serialize payloads and attach a creation timestamp, as the create endpoints do.
fn stamped<T: Serialize>(records: &[T]) -> Result<Vec<Document>, StoreError> {
    records
        .iter()
        .map(|record| {
            let mut document = bson::to_document(record)?;
            document.insert("createdAt", DateTime::now());
            Ok(document)
        })
        .collect()
}

fn sample_agents() -> Vec<NewAgent> {
    let agent = |name: &str, email: &str, phone: &str, specialization: &str, listings: i32| {
        NewAgent {
            name: name.to_string(),
            email: email.to_string(),
            phone: Some(phone.to_string()),
            specialization: Some(specialization.to_string()),
            active_listings: listings,
        }
    };
    vec![
        agent("John Smith", "john.smith@realty.com", "+1-555-0101", "Residential", 15),
        agent("Sarah Johnson", "sarah.johnson@realty.com", "+1-555-0102", "Commercial", 8),
        agent("Michael Brown", "michael.brown@realty.com", "+1-555-0103", "Luxury", 12),
    ]
}

struct SampleListing {
    title: &'static str,
    description: &'static str,
    price: i64,
    property_type: &'static str,
    bedrooms: i32,
    bathrooms: i64,
    size: i64,
    city: &'static str,
    address: &'static str,
    agent: usize,
}

const SAMPLE_LISTINGS: [SampleListing; 5] = [
    SampleListing {
        title: "Modern Downtown Apartment",
        description: "Stunning 2-bedroom apartment in the heart of downtown",
        price: 450000,
        property_type: "Apartment",
        bedrooms: 2,
        bathrooms: 2,
        size: 1200,
        city: "New York",
        address: "123 Main St, New York, NY 10001",
        agent: 0,
    },
    SampleListing {
        title: "Spacious Family Home",
        description: "Beautiful 4-bedroom house with a large backyard",
        price: 650000,
        property_type: "House",
        bedrooms: 4,
        bathrooms: 3,
        size: 2500,
        city: "Los Angeles",
        address: "456 Oak Ave, Los Angeles, CA 90001",
        agent: 1,
    },
    SampleListing {
        title: "Luxury Penthouse Suite",
        description: "Exclusive penthouse with panoramic city views",
        price: 1200000,
        property_type: "Penthouse",
        bedrooms: 3,
        bathrooms: 3,
        size: 3000,
        city: "New York",
        address: "789 Park Ave, New York, NY 10021",
        agent: 2,
    },
    SampleListing {
        title: "Cozy Studio Apartment",
        description: "Perfect studio for young professionals",
        price: 280000,
        property_type: "Apartment",
        bedrooms: 1,
        bathrooms: 1,
        size: 650,
        city: "Chicago",
        address: "321 Lake St, Chicago, IL 60601",
        agent: 0,
    },
    SampleListing {
        title: "Commercial Office Space",
        description: "Prime office location in business district",
        price: 850000,
        property_type: "Commercial",
        bedrooms: 0,
        bathrooms: 2,
        size: 4000,
        city: "Los Angeles",
        address: "555 Business Blvd, Los Angeles, CA 90017",
        agent: 1,
    },
];

fn sample_properties(agents: &[Option<String>]) -> Vec<NewProperty> {
    SAMPLE_LISTINGS
        .iter()
        .map(|listing| NewProperty {
            title: listing.title.to_string(),
            description: Some(listing.description.to_string()),
            price: Number::from(listing.price),
            property_type: listing.property_type.to_string(),
            bedrooms: Some(listing.bedrooms),
            bathrooms: Some(Number::from(listing.bathrooms)),
            size: Some(Number::from(listing.size)),
            city: listing.city.to_string(),
            address: Some(listing.address.to_string()),
            agent_id: agents.get(listing.agent).cloned().flatten(),
            status: PropertyStatus::Available,
        })
        .collect()
}

fn sample_users() -> Vec<NewUser> {
    vec![
        NewUser {
            name: "Alice Cooper".to_string(),
            email: "alice.cooper@email.com".to_string(),
            phone: Some("+1-555-0201".to_string()),
        },
        NewUser {
            name: "Bob Wilson".to_string(),
            email: "bob.wilson@email.com".to_string(),
            phone: Some("+1-555-0202".to_string()),
        },
    ]
}
