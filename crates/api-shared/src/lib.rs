//! # API Shared
//!
//! Wire types shared by the relay's HTTP surface and its clients.
//!
//! Contains:
//! - Response bodies for the publish endpoint and the health check
//! - `HealthService`
//!
//! Used by `api-rest` to answer requests and by `relay-emitter` to read the answers.

pub mod health;
pub mod responses;

pub use health::HealthService;
pub use responses::{HealthRes, SyncRes};
