mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;
use support::{app, send};

#[tokio::test]
async fn root_lists_endpoint_groups() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Real Estate Listing Platform API"));
    assert_eq!(body["endpoints"]["properties"], json!("/api/properties"));
    assert_eq!(body["endpoints"]["aggregation"], json!("/api/aggregation"));
    assert_eq!(body["endpoints"]["reports"].as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn init_db_is_idempotent() {
    let app = app();
    for _ in 0..2 {
        let (status, body) = send(&app, Method::POST, "/api/init-db", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Database initialized successfully" }));
    }

    for (path, expected) in [
        ("/api/properties", 5),
        ("/api/agents", 3),
        ("/api/users", 2),
        ("/api/inquiries", 2),
    ] {
        let (status, rows) = send(&app, Method::GET, path, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows.as_array().map(Vec::len), Some(expected), "{path}");
    }
}

#[tokio::test]
async fn default_listing_order_is_newest_first() {
    let app = app();
    send(&app, Method::POST, "/api/init-db", None).await;
    let (_, created) = send(
        &app,
        Method::POST,
        "/api/properties",
        Some(json!({ "title": "Fresh Listing", "price": 1, "propertyType": "Land", "city": "Boise" })),
    )
    .await;

    let (_, rows) = send(&app, Method::GET, "/api/properties", None).await;
    let stamps: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["createdAt"].as_str().unwrap())
        .collect();
    assert!(stamps.windows(2).all(|pair| pair[0] >= pair[1]));
    assert_eq!(stamps[0], created["createdAt"].as_str().unwrap());
}

#[tokio::test]
async fn seeded_emails_stay_unique() {
    let app = app();
    send(&app, Method::POST, "/api/init-db", None).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/agents",
        Some(json!({ "name": "Copy Cat", "email": "john.smith@realty.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("duplicate key"));
}

#[tokio::test]
async fn reports_run_over_seed_data() {
    let app = app();
    send(&app, Method::POST, "/api/init-db", None).await;

    let (status, rows) = send(&app, Method::GET, "/api/aggregation/average-price-by-city", None).await;
    assert_eq!(status, StatusCode::OK);
    let new_york = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["city"] == json!("New York"))
        .expect("New York row");
    assert_eq!(new_york["averagePrice"].as_f64(), Some(825000.0));
    assert_eq!(new_york["propertyCount"], json!(2));
    assert_eq!(new_york["minPrice"], json!(450000));
    assert_eq!(new_york["maxPrice"], json!(1200000));

    let (_, rows) = send(&app, Method::GET, "/api/aggregation/price-range-distribution", None).await;
    let ranges: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["priceRange"].as_str().unwrap())
        .collect();
    assert_eq!(ranges.first(), Some(&"$0 - $300,000"));
    assert_eq!(ranges.last(), Some(&"$1,000,000+"));

    let (_, rows) = send(&app, Method::GET, "/api/aggregation/most-active-agents", None).await;
    assert_eq!(rows[0]["name"], json!("John Smith"));

    let (_, rows) = send(&app, Method::GET, "/api/aggregation/inquiry-statistics", None).await;
    assert_eq!(rows.as_array().map(Vec::len), Some(2));

    let (_, rows) = send(&app, Method::GET, "/api/aggregation/properties-by-type", None).await;
    assert_eq!(rows[0]["propertyType"], json!("Apartment"));
}

#[tokio::test]
async fn reports_on_an_empty_store_are_empty() {
    let app = app();
    let (status, rows) = send(&app, Method::GET, "/api/aggregation/inquiry-statistics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows, json!([]));
}
