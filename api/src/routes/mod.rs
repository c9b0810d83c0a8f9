//! API route definitions.
//!
//! This module organizes all HTTP routes for the Eventsearch API server.

mod health;
mod search;

pub use health::health_routes;
pub use search::search_routes;
