//! Constants used throughout the form relay.
//!
//! Channel and event names, environment variable names and defaults live here so the
//! publishing and subscribing sides can never disagree on them.

/// Broadcast channel every envelope is published on unless overridden.
pub const DEFAULT_CHANNEL: &str = "hospital-form";

/// Event name every envelope is published under unless overridden.
pub const DEFAULT_EVENT: &str = "patient-update";

/// Quiet window after the last edit before a `typing` envelope is published.
pub const DEFAULT_QUIET_WINDOW_MS: u64 = 500;

/// Route served by the relay publish endpoint.
pub const SYNC_FORM_PATH: &str = "/api/sync-form";

/// Default bind address for the relay server.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Default URL the patient form posts envelopes to.
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:3000/api/sync-form";

/// Minimum length of a postal address.
pub const MIN_ADDRESS_LEN: usize = 5;

/// Maximum length of a broker channel or event name.
pub const MAX_TOPIC_NAME_LEN: usize = 164;

pub const ENV_PUSHER_APP_ID: &str = "PUSHER_APP_ID";
pub const ENV_PUSHER_KEY: &str = "PUSHER_KEY";
pub const ENV_PUSHER_SECRET: &str = "PUSHER_SECRET";
pub const ENV_PUSHER_CLUSTER: &str = "PUSHER_CLUSTER";
pub const ENV_PUSHER_HOST: &str = "PUSHER_HOST";
pub const ENV_PUSHER_USE_TLS: &str = "PUSHER_USE_TLS";
pub const ENV_RELAY_CHANNEL: &str = "RELAY_CHANNEL";
pub const ENV_RELAY_EVENT: &str = "RELAY_EVENT";
pub const ENV_RELAY_REST_ADDR: &str = "RELAY_REST_ADDR";
pub const ENV_RELAY_ENDPOINT: &str = "RELAY_ENDPOINT";
pub const ENV_RELAY_DEBOUNCE_MS: &str = "RELAY_DEBOUNCE_MS";
