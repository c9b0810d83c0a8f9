//! Eventsearch Shared Library
//!
//! This crate contains the event search query compiler shared by the
//! Eventsearch API server and command line tool.
//!
//! # Modules
//!
//! - [`search`] - Search grammar, term visitor, condition compiler and field resolver
//!
//! # Example
//!
//! ```
//! use shared::search::{get_filter, QueryParams};
//!
//! let params = QueryParams::new().with_project_ids([1]);
//! let filter = get_filter("!has:release browser:chrome", &params).unwrap();
//!
//! assert_eq!(filter.conditions.len(), 2);
//! assert_eq!(filter.project_ids, vec![1]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod search;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
