//! # Relay Core
//!
//! Shared domain types for the real-time patient form relay.
//!
//! This crate contains the data that flows through the sync pipeline and nothing that moves it:
//! - The in-progress [`PatientForm`] and the validated [`PatientRecord`]
//! - Field-level validation rules
//! - The [`SyncEnvelope`] wire message and its [`SyncStatus`]
//! - Startup configuration (broker credentials, topic, debounce window)
//!
//! **No transport concerns**: publishing, subscribing and HTTP handling belong in
//! `relay-broker`, `relay-emitter`, `relay-dashboard` and `api-rest`.

pub mod config;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod patient;
pub mod validation;

pub use config::{BrokerCredentials, BrokerEndpoint, SubscriberConfig, Topic};
pub use envelope::{SyncEnvelope, SyncStatus};
pub use error::{RelayError, RelayResult};
pub use patient::{EmergencyContact, Field, Gender, PatientForm, PatientRecord};
pub use validation::ValidationErrors;
