//! Real-estate listing service: CRUD over properties, agents, users and inquiries stored in a
//! document database, plus a fixed set of market reports.

pub mod aggregation;
pub mod api;
pub mod config;
pub mod error;
pub mod listings;
pub mod resources;
pub mod seed;
pub mod serialize;
pub mod store;
pub mod telemetry;

pub use api::api_router;
