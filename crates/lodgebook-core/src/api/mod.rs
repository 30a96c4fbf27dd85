//! Client for the hosted lodge database.
//!
//! This module provides the `StoreClient` for the row API and identity
//! service of a hosted project, reached over HTTPS with the project URL and
//! its public API key. Signed-in requests use the member's access token.

pub mod client;
pub mod error;
pub mod query;

pub use client::StoreClient;
pub use error::ApiError;
pub use query::Query;
