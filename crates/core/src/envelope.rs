//! The message relayed from the patient form to the staff dashboard.
//!
//! On the wire an envelope is one flat JSON object: the form fields side by side with `status`
//! and `timestamp`, e.g.
//!
//! ```json
//! {"firstName":"Elon","status":"typing","timestamp":"2024-01-01T00:00:00Z"}
//! ```
//!
//! A `reset` envelope carries no form fields at all.

use crate::patient::{PatientForm, PatientRecord};
use crate::{RelayError, RelayResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Why an envelope was sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Debounced snapshot of an in-progress form. May be partial or invalid.
    Typing,
    /// Final, validated registration.
    Submitted,
    /// The patient cleared the form.
    Reset,
}

impl SyncStatus {
    /// Wire format string.
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Typing => "typing",
            SyncStatus::Submitted => "submitted",
            SyncStatus::Reset => "reset",
        }
    }

    /// Upper-case label shown on the dashboard status badge.
    pub fn badge(self) -> &'static str {
        match self {
            SyncStatus::Typing => "TYPING",
            SyncStatus::Submitted => "SUBMITTED",
            SyncStatus::Reset => "RESET",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status-tagged, timestamped form snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SyncEnvelope {
    #[serde(flatten)]
    pub record: PatientForm,
    pub status: SyncStatus,
    /// When the envelope was produced, ISO 8601.
    pub timestamp: DateTime<Utc>,
}

impl SyncEnvelope {
    pub fn typing(form: PatientForm, timestamp: DateTime<Utc>) -> Self {
        Self {
            record: form,
            status: SyncStatus::Typing,
            timestamp,
        }
    }

    pub fn submitted(record: &PatientRecord, timestamp: DateTime<Utc>) -> Self {
        Self {
            record: PatientForm::from(record),
            status: SyncStatus::Submitted,
            timestamp,
        }
    }

    pub fn reset(timestamp: DateTime<Utc>) -> Self {
        Self {
            record: PatientForm::default(),
            status: SyncStatus::Reset,
            timestamp,
        }
    }

    /// Strictly older than `other`. Equal timestamps are not stale.
    pub fn is_older_than(&self, other: DateTime<Utc>) -> bool {
        self.timestamp < other
    }

    pub fn to_json_value(&self) -> RelayResult<serde_json::Value> {
        serde_json::to_value(self).map_err(RelayError::Serialization)
    }

    pub fn to_json_string(&self) -> RelayResult<String> {
        serde_json::to_string(self).map_err(RelayError::Serialization)
    }

    pub fn from_json_str(input: &str) -> RelayResult<Self> {
        serde_json::from_str(input).map_err(RelayError::Deserialization)
    }

    pub fn from_json_value(value: serde_json::Value) -> RelayResult<Self> {
        serde_json::from_value(value).map_err(RelayError::Deserialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::Field;
    use serde_json::json;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid timestamp")
    }

    #[test]
    fn typing_envelope_is_flat_on_the_wire() {
        let mut form = PatientForm::default();
        form.set(Field::FirstName, "Elon");

        let envelope = SyncEnvelope::typing(form, at("2024-01-01T00:00:00Z"));
        assert_eq!(
            envelope.to_json_value().expect("serialize"),
            json!({
                "firstName": "Elon",
                "status": "typing",
                "timestamp": "2024-01-01T00:00:00Z"
            })
        );
    }

    #[test]
    fn reset_envelope_has_no_fields() {
        let envelope = SyncEnvelope::reset(at("2024-01-01T00:00:05Z"));
        assert_eq!(
            envelope.to_json_value().expect("serialize"),
            json!({ "status": "reset", "timestamp": "2024-01-01T00:00:05Z" })
        );
    }

    #[test]
    fn parses_browser_style_timestamps() {
        let envelope = SyncEnvelope::from_json_str(
            r#"{"lastName":"Musk","status":"submitted","timestamp":"2024-01-01T00:00:00.123Z"}"#,
        )
        .expect("valid envelope");

        assert_eq!(envelope.status, SyncStatus::Submitted);
        assert_eq!(envelope.record.get(Field::LastName), Some("Musk"));
        assert_eq!(
            envelope.timestamp.timestamp_millis(),
            at("2024-01-01T00:00:00Z").timestamp_millis() + 123
        );
    }

    #[test]
    fn rejects_unknown_status_and_missing_timestamp() {
        let unknown = SyncEnvelope::from_json_str(
            r#"{"status":"inactive","timestamp":"2024-01-01T00:00:00Z"}"#,
        );
        assert!(matches!(unknown, Err(RelayError::Deserialization(_))));

        let missing = SyncEnvelope::from_json_value(json!({ "status": "typing" }));
        assert!(matches!(missing, Err(RelayError::Deserialization(_))));
    }

    #[test]
    fn staleness_is_strict() {
        let envelope = SyncEnvelope::reset(at("2024-01-01T00:00:01Z"));
        assert!(envelope.is_older_than(at("2024-01-01T00:00:02Z")));
        assert!(!envelope.is_older_than(at("2024-01-01T00:00:01Z")));
        assert!(!envelope.is_older_than(at("2024-01-01T00:00:00Z")));
    }

    #[test]
    fn badge_labels() {
        assert_eq!(SyncStatus::Typing.badge(), "TYPING");
        assert_eq!(SyncStatus::Submitted.badge(), "SUBMITTED");
        assert_eq!(SyncStatus::Reset.to_string(), "reset");
    }
}
