//! Patient registration form and the validated record it produces.
//!
//! Two shapes are kept apart on purpose:
//! - [`PatientForm`] is the in-progress form value. Every field is optional free text, exactly as
//!   typed, and it is what `typing` envelopes carry.
//! - [`PatientRecord`] only exists after [`PatientForm::validate`] succeeds and is what a
//!   `submitted` envelope carries.
//!
//! Both serialise to the same flat camelCase JSON object so the dashboard reads one shape.

use crate::constants::MIN_ADDRESS_LEN;
use crate::validation::{is_valid_email, is_valid_phone, parse_date_of_birth, ValidationErrors};
use crate::RelayError;
use chrono::NaiveDate;
use relay_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

/// Administrative gender as offered on the registration form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Wire format string.
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(RelayError::InvalidInput(format!("unknown gender: {other}"))),
        }
    }
}

/// A single input on the registration form, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    FirstName,
    MiddleName,
    LastName,
    DateOfBirth,
    Gender,
    PhoneNumber,
    Email,
    Address,
    PreferredLanguage,
    Nationality,
    Religion,
    EmergencyContactName,
    EmergencyContactRelationship,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::FirstName,
        Field::MiddleName,
        Field::LastName,
        Field::DateOfBirth,
        Field::Gender,
        Field::PhoneNumber,
        Field::Email,
        Field::Address,
        Field::PreferredLanguage,
        Field::Nationality,
        Field::Religion,
        Field::EmergencyContactName,
        Field::EmergencyContactRelationship,
    ];

    /// JSON key used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Field::FirstName => "firstName",
            Field::MiddleName => "middleName",
            Field::LastName => "lastName",
            Field::DateOfBirth => "dateOfBirth",
            Field::Gender => "gender",
            Field::PhoneNumber => "phoneNumber",
            Field::Email => "email",
            Field::Address => "address",
            Field::PreferredLanguage => "preferredLanguage",
            Field::Nationality => "nationality",
            Field::Religion => "religion",
            Field::EmergencyContactName => "emergencyContactName",
            Field::EmergencyContactRelationship => "emergencyContactRelationship",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Field::FirstName => "First Name",
            Field::MiddleName => "Middle Name",
            Field::LastName => "Last Name",
            Field::DateOfBirth => "Date of Birth",
            Field::Gender => "Gender",
            Field::PhoneNumber => "Phone Number",
            Field::Email => "Email",
            Field::Address => "Address",
            Field::PreferredLanguage => "Preferred Language",
            Field::Nationality => "Nationality",
            Field::Religion => "Religion",
            Field::EmergencyContactName => "Emergency Contact Name",
            Field::EmergencyContactRelationship => "Emergency Contact Relationship",
        }
    }

    pub fn is_optional(self) -> bool {
        matches!(
            self,
            Field::MiddleName
                | Field::Religion
                | Field::EmergencyContactName
                | Field::EmergencyContactRelationship
        )
    }
}

impl FromStr for Field {
    type Err = RelayError;

    /// Accepts the wire name (`firstName`) or its snake_case form (`first_name`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| *c != '_').collect();
        Field::ALL
            .into_iter()
            .find(|f| f.wire_name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| RelayError::InvalidInput(format!("unknown form field: {s}")))
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// In-progress form value. Absent keys are fields the patient has not touched yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub religion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact_relationship: Option<String>,
}

impl PatientForm {
    fn slot(&self, field: Field) -> &Option<String> {
        match field {
            Field::FirstName => &self.first_name,
            Field::MiddleName => &self.middle_name,
            Field::LastName => &self.last_name,
            Field::DateOfBirth => &self.date_of_birth,
            Field::Gender => &self.gender,
            Field::PhoneNumber => &self.phone_number,
            Field::Email => &self.email,
            Field::Address => &self.address,
            Field::PreferredLanguage => &self.preferred_language,
            Field::Nationality => &self.nationality,
            Field::Religion => &self.religion,
            Field::EmergencyContactName => &self.emergency_contact_name,
            Field::EmergencyContactRelationship => &self.emergency_contact_relationship,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::FirstName => &mut self.first_name,
            Field::MiddleName => &mut self.middle_name,
            Field::LastName => &mut self.last_name,
            Field::DateOfBirth => &mut self.date_of_birth,
            Field::Gender => &mut self.gender,
            Field::PhoneNumber => &mut self.phone_number,
            Field::Email => &mut self.email,
            Field::Address => &mut self.address,
            Field::PreferredLanguage => &mut self.preferred_language,
            Field::Nationality => &mut self.nationality,
            Field::Religion => &mut self.religion,
            Field::EmergencyContactName => &mut self.emergency_contact_name,
            Field::EmergencyContactRelationship => &mut self.emergency_contact_relationship,
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Stores the value exactly as typed, including an empty string for a cleared input.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        *self.slot_mut(field) = Some(value.into());
    }

    /// True when no field has been touched.
    pub fn is_empty(&self) -> bool {
        Field::ALL.into_iter().all(|f| self.slot(f).is_none())
    }

    /// Applies the registration rules and builds a [`PatientRecord`].
    ///
    /// `today` is the reference date for the "not in the future" rule.
    ///
    /// # Errors
    ///
    /// Returns every failing field at once, each with its inline message.
    pub fn validate(&self, today: NaiveDate) -> Result<PatientRecord, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let value = |field: Field| self.get(field).unwrap_or("");

        let mut required = |field: Field, message: &str| match NonEmptyText::new(value(field)) {
            Ok(text) => Some(text),
            Err(_) => {
                errors.insert(field, message);
                None
            }
        };

        let first_name = required(Field::FirstName, "First name is required");
        let last_name = required(Field::LastName, "Last name is required");
        let preferred_language =
            required(Field::PreferredLanguage, "Preferred language is required");
        let nationality = required(Field::Nationality, "Nationality is required");

        let date_of_birth = match parse_date_of_birth(value(Field::DateOfBirth), today) {
            Ok(date) => Some(date),
            Err(message) => {
                errors.insert(Field::DateOfBirth, message);
                None
            }
        };

        let gender = match value(Field::Gender).parse::<Gender>() {
            Ok(gender) => Some(gender),
            Err(_) => {
                errors.insert(Field::Gender, "Please select a gender");
                None
            }
        };

        let phone_number = value(Field::PhoneNumber);
        if !is_valid_phone(phone_number) {
            errors.insert(Field::PhoneNumber, "Invalid phone number format");
        }

        let email = value(Field::Email);
        if !is_valid_email(email) {
            errors.insert(Field::Email, "Invalid email address");
        }

        let address = match NonEmptyText::with_min_len(value(Field::Address), MIN_ADDRESS_LEN) {
            Ok(text) => Some(text),
            Err(_) => {
                errors.insert(
                    Field::Address,
                    format!("Address must be at least {MIN_ADDRESS_LEN} characters"),
                );
                None
            }
        };

        match (
            first_name,
            last_name,
            date_of_birth,
            gender,
            address,
            preferred_language,
            nationality,
        ) {
            (
                Some(first_name),
                Some(last_name),
                Some(date_of_birth),
                Some(gender),
                Some(address),
                Some(preferred_language),
                Some(nationality),
            ) if errors.is_empty() => {
                let contact = EmergencyContact {
                    name: NonEmptyText::optional(self.get(Field::EmergencyContactName)),
                    relationship: NonEmptyText::optional(
                        self.get(Field::EmergencyContactRelationship),
                    ),
                };
                Ok(PatientRecord {
                    first_name,
                    middle_name: NonEmptyText::optional(self.get(Field::MiddleName)),
                    last_name,
                    date_of_birth,
                    gender,
                    phone_number: phone_number.to_owned(),
                    email: email.to_owned(),
                    address,
                    preferred_language,
                    nationality,
                    religion: NonEmptyText::optional(self.get(Field::Religion)),
                    emergency_contact: (!contact.is_empty()).then_some(contact),
                })
            }
            _ => Err(errors),
        }
    }
}

/// Optional emergency contact. Either part may be given on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmergencyContact {
    pub name: Option<NonEmptyText>,
    pub relationship: Option<NonEmptyText>,
}

impl EmergencyContact {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.relationship.is_none()
    }
}

/// A patient record that passed every registration rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientRecord {
    pub first_name: NonEmptyText,
    pub middle_name: Option<NonEmptyText>,
    pub last_name: NonEmptyText,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone_number: String,
    pub email: String,
    pub address: NonEmptyText,
    pub preferred_language: NonEmptyText,
    pub nationality: NonEmptyText,
    pub religion: Option<NonEmptyText>,
    pub emergency_contact: Option<EmergencyContact>,
}

impl From<&PatientRecord> for PatientForm {
    fn from(record: &PatientRecord) -> Self {
        let text = |t: &NonEmptyText| Some(t.as_str().to_owned());
        let opt = |t: &Option<NonEmptyText>| t.as_ref().map(|t| t.as_str().to_owned());
        let contact = record.emergency_contact.as_ref();

        PatientForm {
            first_name: text(&record.first_name),
            middle_name: opt(&record.middle_name),
            last_name: text(&record.last_name),
            date_of_birth: Some(record.date_of_birth.format("%Y-%m-%d").to_string()),
            gender: Some(record.gender.as_str().to_owned()),
            phone_number: Some(record.phone_number.clone()),
            email: Some(record.email.clone()),
            address: text(&record.address),
            preferred_language: text(&record.preferred_language),
            nationality: text(&record.nationality),
            religion: opt(&record.religion),
            emergency_contact_name: contact.and_then(|c| opt(&c.name)),
            emergency_contact_relationship: contact.and_then(|c| opt(&c.relationship)),
        }
    }
}
