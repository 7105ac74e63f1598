//! Fixed analytical reports. Every report is a single aggregation pipeline executed by the
//! store; the service only shapes the output rows into JSON.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use bson::{doc, Document};
use serde_json::Value;

use crate::error::AppError;
use crate::serialize::document_to_json;
use crate::store::{Collection, SharedStore};

/// Lower edges of the price histogram; the final value is the exclusive upper edge.
pub const PRICE_BOUNDARIES: [i32; 6] = [0, 300_000, 500_000, 700_000, 1_000_000, 10_000_000];

/// Label for prices outside the histogram range.
pub const OTHER_PRICE_RANGE: &str = "Other";

const PRICE_RANGE_LABELS: [&str; 5] = [
    "$0 - $300,000",
    "$300,000 - $500,000",
    "$500,000 - $700,000",
    "$700,000 - $1,000,000",
    "$1,000,000+",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    AveragePriceByCity,
    MostActiveAgents,
    PropertiesByType,
    InquiryStatistics,
    PriceRangeDistribution,
}

impl Report {
    pub const ALL: [Report; 5] = [
        Report::AveragePriceByCity,
        Report::MostActiveAgents,
        Report::PropertiesByType,
        Report::InquiryStatistics,
        Report::PriceRangeDistribution,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Report::AveragePriceByCity => "average-price-by-city",
            Report::MostActiveAgents => "most-active-agents",
            Report::PropertiesByType => "properties-by-type",
            Report::InquiryStatistics => "inquiry-statistics",
            Report::PriceRangeDistribution => "price-range-distribution",
        }
    }

    pub fn collection(self) -> Collection {
        match self {
            Report::MostActiveAgents => Collection::Agents,
            Report::InquiryStatistics => Collection::Inquiries,
            Report::AveragePriceByCity
            | Report::PropertiesByType
            | Report::PriceRangeDistribution => Collection::Properties,
        }
    }

    pub fn pipeline(self) -> Vec<Document> {
        match self {
            Report::AveragePriceByCity => average_price_by_city(),
            Report::MostActiveAgents => most_active_agents(),
            Report::PropertiesByType => properties_by_type(),
            Report::InquiryStatistics => inquiry_statistics(),
            Report::PriceRangeDistribution => price_range_distribution(),
        }
    }
}

fn average_price_by_city() -> Vec<Document> {
    vec![
        doc! { "$group": {
            "_id": "$city",
            "averagePrice": { "$avg": "$price" },
            "propertyCount": { "$sum": 1 },
            "minPrice": { "$min": "$price" },
            "maxPrice": { "$max": "$price" },
        }},
        doc! { "$sort": { "averagePrice": -1 } },
        doc! { "$project": {
            "_id": 0,
            "city": "$_id",
            "averagePrice": { "$round": ["$averagePrice", 2] },
            "propertyCount": 1,
            "minPrice": 1,
            "maxPrice": 1,
        }},
    ]
}

fn most_active_agents() -> Vec<Document> {
    vec![
        doc! { "$sort": { "activeListings": -1 } },
        doc! { "$limit": 10 },
        doc! { "$project": {
            "_id": { "$toString": "$_id" },
            "name": 1,
            "email": 1,
            "specialization": 1,
            "activeListings": 1,
            "phone": 1,
        }},
    ]
}

fn properties_by_type() -> Vec<Document> {
    vec![
        doc! { "$group": {
            "_id": "$propertyType",
            "count": { "$sum": 1 },
            "averagePrice": { "$avg": "$price" },
            "totalValue": { "$sum": "$price" },
        }},
        doc! { "$sort": { "count": -1 } },
        doc! { "$project": {
            "_id": 0,
            "propertyType": "$_id",
            "count": 1,
            "averagePrice": { "$round": ["$averagePrice", 2] },
            "totalValue": 1,
        }},
    ]
}

fn inquiry_statistics() -> Vec<Document> {
    vec![
        doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } },
        doc! { "$project": { "_id": 0, "status": "$_id", "count": 1 } },
    ]
}

fn price_range_distribution() -> Vec<Document> {
    // Labels start with '$', so they must be wrapped in $literal to avoid being read as
    // field paths.
    let branches: Vec<Document> = PRICE_BOUNDARIES
        .iter()
        .zip(PRICE_RANGE_LABELS)
        .map(|(lower, label)| {
            doc! {
                "case": { "$eq": ["$_id", *lower] },
                "then": { "$literal": label },
            }
        })
        .collect();

    vec![
        doc! { "$bucket": {
            "groupBy": "$price",
            "boundaries": PRICE_BOUNDARIES.to_vec(),
            "default": OTHER_PRICE_RANGE,
            "output": {
                "count": { "$sum": 1 },
                "properties": { "$push": "$title" },
            },
        }},
        doc! { "$project": {
            "_id": 0,
            "priceRange": { "$switch": { "branches": branches, "default": OTHER_PRICE_RANGE } },
            "count": 1,
        }},
    ]
}

/// Execute one report and convert its rows for the response.
pub async fn run_report(store: &SharedStore, report: Report) -> Result<Vec<Value>, AppError> {
    let rows = store
        .aggregate(report.collection(), report.pipeline())
        .await
        .map_err(|err| {
            tracing::warn!(report = report.slug(), error = %err, "aggregation failed");
            AppError::Store(err)
        })?;
    Ok(rows.into_iter().map(document_to_json).collect())
}

/// `GET /api/aggregation/<slug>` for every report.
pub fn aggregation_router() -> Router<SharedStore> {
    Report::ALL.into_iter().fold(Router::new(), |router, report| {
        router.route(
            &format!("/api/aggregation/{}", report.slug()),
            get(move |State(store): State<SharedStore>| async move {
                run_report(&store, report).await.map(Json)
            }),
        )
    })
}
