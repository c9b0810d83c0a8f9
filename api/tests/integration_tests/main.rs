//! Integration tests for the Eventsearch API.
//!
//! These tests drive the complete router: parsing, compiling and resolving
//! search queries through the HTTP API.

mod common;
mod health_tests;
mod search_tests;
