//! Runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the relay, emitter and dashboard. Nothing reads process-wide environment
//! variables during request handling.
//!
//! Every `from_lookup` constructor takes a lookup closure instead of calling `std::env::var`
//! directly, so binaries pass `|name| std::env::var(name).ok()` and tests pass a map.

use crate::constants::{
    DEFAULT_CHANNEL, DEFAULT_EVENT, DEFAULT_QUIET_WINDOW_MS, ENV_PUSHER_APP_ID,
    ENV_PUSHER_CLUSTER, ENV_PUSHER_HOST, ENV_PUSHER_KEY, ENV_PUSHER_SECRET, ENV_PUSHER_USE_TLS,
    ENV_RELAY_CHANNEL, ENV_RELAY_DEBOUNCE_MS, ENV_RELAY_EVENT,
};
use crate::validation::validate_topic_name;
use crate::{RelayError, RelayResult};
use std::time::Duration;

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> RelayResult<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(RelayError::MissingConfig(name))
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Where the broker lives and whether to talk to it over TLS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerEndpoint {
    cluster: String,
    host: Option<String>,
    use_tls: bool,
}

impl BrokerEndpoint {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            host: None,
            use_tls: true,
        }
    }

    /// Overrides the derived host, e.g. `localhost:6001` for a self-hosted compatible broker.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    /// Base URL of the publish REST API.
    pub fn rest_base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        match &self.host {
            Some(host) => format!("{scheme}://{host}"),
            None => format!("{scheme}://api-{}.pusher.com", self.cluster),
        }
    }

    /// Base URL of the subscriber WebSocket API.
    pub fn ws_base_url(&self) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        match &self.host {
            Some(host) => format!("{scheme}://{host}"),
            None => format!("{scheme}://ws-{}.pusher.com", self.cluster),
        }
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> RelayResult<Self> {
        let mut endpoint = Self::new(required(lookup, ENV_PUSHER_CLUSTER)?)
            .with_tls(use_tls_from_env_value(lookup(ENV_PUSHER_USE_TLS))?);
        if let Some(host) = optional(lookup, ENV_PUSHER_HOST) {
            endpoint = endpoint.with_host(host);
        }
        Ok(endpoint)
    }
}

/// Credentials for publishing through the broker. All four values are mandatory.
#[derive(Clone)]
pub struct BrokerCredentials {
    app_id: String,
    key: String,
    secret: String,
    endpoint: BrokerEndpoint,
}

impl BrokerCredentials {
    /// Create new `BrokerCredentials`.
    pub fn new(
        app_id: impl Into<String>,
        key: impl Into<String>,
        secret: impl Into<String>,
        endpoint: BrokerEndpoint,
    ) -> RelayResult<Self> {
        let app_id = app_id.into();
        let key = key.into();
        let secret = secret.into();

        for (name, value) in [
            (ENV_PUSHER_APP_ID, &app_id),
            (ENV_PUSHER_KEY, &key),
            (ENV_PUSHER_SECRET, &secret),
            (ENV_PUSHER_CLUSTER, &endpoint.cluster),
        ] {
            if value.trim().is_empty() {
                return Err(RelayError::MissingConfig(name));
            }
        }

        Ok(Self {
            app_id,
            key,
            secret,
            endpoint,
        })
    }

    /// Resolve credentials from `PUSHER_APP_ID`, `PUSHER_KEY`, `PUSHER_SECRET`,
    /// `PUSHER_CLUSTER` and the optional `PUSHER_HOST` / `PUSHER_USE_TLS`.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::MissingConfig` naming the first absent variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RelayResult<Self> {
        let app_id = required(&lookup, ENV_PUSHER_APP_ID)?;
        let key = required(&lookup, ENV_PUSHER_KEY)?;
        let secret = required(&lookup, ENV_PUSHER_SECRET)?;
        let endpoint = BrokerEndpoint::from_lookup(&lookup)?;
        Self::new(app_id, key, secret, endpoint)
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }
}

impl std::fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("app_id", &self.app_id)
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Public settings a subscriber needs. No secret is involved in subscribing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriberConfig {
    key: String,
    endpoint: BrokerEndpoint,
}

impl SubscriberConfig {
    pub fn new(key: impl Into<String>, endpoint: BrokerEndpoint) -> RelayResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(RelayError::MissingConfig(ENV_PUSHER_KEY));
        }
        Ok(Self { key, endpoint })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RelayResult<Self> {
        let key = required(&lookup, ENV_PUSHER_KEY)?;
        let endpoint = BrokerEndpoint::from_lookup(&lookup)?;
        Self::new(key, endpoint)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }
}

/// The channel and event every envelope travels on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topic {
    channel: String,
    event: String,
}

impl Topic {
    pub fn new(channel: impl Into<String>, event: impl Into<String>) -> RelayResult<Self> {
        let channel = channel.into();
        let event = event.into();
        validate_topic_name(ENV_RELAY_CHANNEL, &channel)?;
        validate_topic_name(ENV_RELAY_EVENT, &event)?;
        Ok(Self { channel, event })
    }

    /// `RELAY_CHANNEL` / `RELAY_EVENT`, falling back to the fixed defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RelayResult<Self> {
        Self::new(
            optional(&lookup, ENV_RELAY_CHANNEL).unwrap_or_else(|| DEFAULT_CHANNEL.into()),
            optional(&lookup, ENV_RELAY_EVENT).unwrap_or_else(|| DEFAULT_EVENT.into()),
        )
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn event(&self) -> &str {
        &self.event
    }
}

impl Default for Topic {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.into(),
            event: DEFAULT_EVENT.into(),
        }
    }
}

/// Parse the debounce quiet window from an optional millisecond value.
///
/// If `value` is `None` or empty/whitespace, returns the default window.
pub fn quiet_window_from_env_value(value: Option<String>) -> RelayResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let millis = match value {
        Some(v) => v.parse::<u64>().map_err(|e| RelayError::InvalidConfig {
            name: ENV_RELAY_DEBOUNCE_MS,
            reason: e.to_string(),
        })?,
        None => DEFAULT_QUIET_WINDOW_MS,
    };
    if millis == 0 {
        return Err(RelayError::InvalidConfig {
            name: ENV_RELAY_DEBOUNCE_MS,
            reason: "must be greater than zero".into(),
        });
    }

    Ok(Duration::from_millis(millis))
}

/// Parse a boolean TLS flag. Absent means `true`.
pub fn use_tls_from_env_value(value: Option<String>) -> RelayResult<bool> {
    let value = value
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());
    match value.as_deref() {
        None | Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(RelayError::InvalidConfig {
            name: ENV_PUSHER_USE_TLS,
            reason: format!("expected true/false, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const FULL: &[(&str, &str)] = &[
        ("PUSHER_APP_ID", "1234"),
        ("PUSHER_KEY", "public-key"),
        ("PUSHER_SECRET", "s3cret"),
        ("PUSHER_CLUSTER", "ap1"),
    ];

    #[test]
    fn broker_credentials_from_complete_environment() {
        let creds = BrokerCredentials::from_lookup(lookup_from(FULL)).expect("complete");
        assert_eq!(creds.app_id(), "1234");
        assert_eq!(creds.key(), "public-key");
        assert_eq!(creds.secret(), "s3cret");
        assert_eq!(creds.endpoint().rest_base_url(), "https://api-ap1.pusher.com");
        assert_eq!(creds.endpoint().ws_base_url(), "wss://ws-ap1.pusher.com");
    }

    #[test]
    fn each_missing_credential_is_named() {
        for missing in ["PUSHER_APP_ID", "PUSHER_KEY", "PUSHER_SECRET", "PUSHER_CLUSTER"] {
            let pairs: Vec<(&str, &str)> = FULL
                .iter()
                .copied()
                .filter(|(k, _)| *k != missing)
                .collect();
            let err = BrokerCredentials::from_lookup(lookup_from(&pairs)).expect_err("missing");
            assert!(
                matches!(err, RelayError::MissingConfig(name) if name == missing),
                "expected {missing} to be reported, got {err}"
            );
        }
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let mut pairs = FULL.to_vec();
        pairs[2] = ("PUSHER_SECRET", "   ");
        let err = BrokerCredentials::from_lookup(lookup_from(&pairs)).expect_err("blank");
        assert!(matches!(err, RelayError::MissingConfig("PUSHER_SECRET")));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let creds = BrokerCredentials::from_lookup(lookup_from(FULL)).expect("complete");
        let debug = format!("{creds:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn host_override_and_plain_transport() {
        let mut pairs = FULL.to_vec();
        pairs.push(("PUSHER_HOST", "localhost:6001"));
        pairs.push(("PUSHER_USE_TLS", "false"));

        let sub = SubscriberConfig::from_lookup(lookup_from(&pairs)).expect("subscriber");
        assert_eq!(sub.key(), "public-key");
        assert_eq!(sub.endpoint().rest_base_url(), "http://localhost:6001");
        assert_eq!(sub.endpoint().ws_base_url(), "ws://localhost:6001");
    }

    #[test]
    fn subscriber_does_not_need_the_secret() {
        let pairs = [("PUSHER_KEY", "public-key"), ("PUSHER_CLUSTER", "eu")];
        assert!(SubscriberConfig::from_lookup(lookup_from(&pairs)).is_ok());
    }

    #[test]
    fn topic_defaults_and_overrides() {
        let topic = Topic::from_lookup(lookup_from(&[])).expect("defaults");
        assert_eq!(topic, Topic::default());
        assert_eq!(topic.channel(), "hospital-form");
        assert_eq!(topic.event(), "patient-update");

        let topic = Topic::from_lookup(lookup_from(&[("RELAY_CHANNEL", "ward-3")]))
            .expect("override");
        assert_eq!(topic.channel(), "ward-3");

        assert!(Topic::from_lookup(lookup_from(&[("RELAY_EVENT", "bad event")])).is_err());
    }

    #[test]
    fn quiet_window_parsing() {
        assert_eq!(
            quiet_window_from_env_value(None).expect("default"),
            Duration::from_millis(500)
        );
        assert_eq!(
            quiet_window_from_env_value(Some(" 250 ".into())).expect("explicit"),
            Duration::from_millis(250)
        );
        assert!(quiet_window_from_env_value(Some("0".into())).is_err());
        assert!(quiet_window_from_env_value(Some("fast".into())).is_err());
    }

    #[test]
    fn tls_flag_parsing() {
        assert!(use_tls_from_env_value(None).expect("default"));
        assert!(!use_tls_from_env_value(Some("FALSE".into())).expect("false"));
        assert!(use_tls_from_env_value(Some("maybe".into())).is_err());
    }
}
