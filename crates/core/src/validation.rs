//! Input validation utilities.
//!
//! This module contains the field-level rules applied to a patient form before submission, and
//! the guardrails applied to broker topic names resolved from configuration.

use crate::constants::MAX_TOPIC_NAME_LEN;
use crate::patient::Field;
use crate::{RelayError, RelayResult};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{9,10}$").expect("phone pattern is valid"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9_'+\-]+(\.[A-Za-z0-9_'+\-]+)*@([A-Za-z0-9]([A-Za-z0-9\-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}$",
    )
    .expect("email pattern is valid")
});

/// Per-field validation failures, keyed by field in form order.
///
/// Surfaced inline next to each field; never blocks `typing` sync of the same values.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(BTreeMap<Field, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }
}

/// Phone numbers are 9 or 10 ASCII digits with no separators.
pub fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value)
}

/// Standard `local@domain.tld` shape. Deliverability is not checked.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Parses a `YYYY-MM-DD` date of birth and rejects dates after `today`.
pub fn parse_date_of_birth(value: &str, today: NaiveDate) -> Result<NaiveDate, &'static str> {
    let value = value.trim();
    if value.is_empty() {
        return Err("Date of birth is required");
    }
    let date =
        NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| "Invalid date of birth")?;
    if date > today {
        return Err("Date of birth cannot be in the future");
    }
    Ok(date)
}

/// Validates that a channel or event name is acceptable to the broker.
///
/// Names are resolved from configuration and embedded into broker requests, so the same
/// guardrails apply to both:
/// - Rejects empty or whitespace-only strings
/// - Bounds the length to the broker's limit
/// - Restricts characters to the set the broker accepts in channel names
///
/// # Errors
///
/// Returns a `RelayError::InvalidConfig` naming `setting` if the value is invalid.
pub fn validate_topic_name(setting: &'static str, name: &str) -> RelayResult<()> {
    if name.trim().is_empty() {
        return Err(RelayError::InvalidConfig {
            name: setting,
            reason: "cannot be empty".into(),
        });
    }

    if name.len() > MAX_TOPIC_NAME_LEN {
        return Err(RelayError::InvalidConfig {
            name: setting,
            reason: format!("exceeds maximum length of {} characters", MAX_TOPIC_NAME_LEN),
        });
    }

    let ok = name.bytes().all(|b| {
        matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'-' | b'=' | b'@' | b',' | b'.' | b';')
    });

    if !ok {
        return Err(RelayError::InvalidConfig {
            name: setting,
            reason: "contains invalid characters (only alphanumeric and '_-=@,.;' allowed)"
                .into(),
        });
    }

    Ok(())
}
