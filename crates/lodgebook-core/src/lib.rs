//! Lodgebook core - members, events and attendance for a masonic province.
//!
//! Front ends talk to the hosted lodge database through `StoreClient`, which
//! implements the traits in [`store`]. The flows in this crate take those
//! traits rather than the client so they can run against any store.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod meetings;
pub mod models;
pub mod nav;
pub mod push;
pub mod rsvp;
pub mod store;
pub mod utils;

pub use api::{ApiError, StoreClient};
pub use config::{BackendConfig, Config};
pub use error::{LodgeError, LodgeResult};
