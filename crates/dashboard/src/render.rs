//! Plain-text rendering of the staff dashboard.

use crate::{DashboardState, Snapshot};
use relay_core::{Field, PatientForm};
use std::fmt::Write;

const NOT_PROVIDED: &str = "Not provided";

/// Renders the whole dashboard: header, connection badge and either the waiting panel or the
/// patient card.
pub fn render(state: &DashboardState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Staff Dashboard");
    let _ = writeln!(out, "Real-time Patient Monitoring System");
    let _ = writeln!(out, "● {}", state.connection().label());
    let _ = writeln!(out);

    match state.current() {
        None => {
            let _ = writeln!(out, "Waiting for patient activity...");
            let _ = writeln!(
                out,
                "Open the Patient Form in another window and start typing."
            );
        }
        Some(snapshot) => patient_card(&mut out, snapshot),
    }
    out
}

fn patient_card(out: &mut String, snapshot: &Snapshot) {
    let form = &snapshot.envelope.record;
    let first = present(form, Field::FirstName);
    let last = present(form, Field::LastName);

    let initial = first
        .and_then(|f| f.chars().next())
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "?".into());
    let heading = match last {
        Some(last) => format!("{} {}", first.unwrap_or("Unknown"), last),
        None => first.unwrap_or("Unknown").to_owned(),
    };

    let _ = writeln!(
        out,
        "[{initial}] {heading}    {}",
        snapshot.envelope.status.badge()
    );
    let _ = writeln!(
        out,
        "Last updated: {}",
        snapshot.received_at.format("%H:%M:%S")
    );
    let _ = writeln!(out);

    let full_name = [Field::FirstName, Field::MiddleName, Field::LastName]
        .into_iter()
        .filter_map(|f| present(form, f))
        .collect::<Vec<_>>()
        .join(" ");
    data_field(out, "Full Name", Some(full_name.as_str()).filter(|s| !s.is_empty()));
    for field in [
        Field::DateOfBirth,
        Field::Gender,
        Field::PhoneNumber,
        Field::Email,
        Field::Nationality,
        Field::Address,
    ] {
        data_field(out, field.label(), present(form, field));
    }

    let contact_name = present(form, Field::EmergencyContactName);
    let contact_relationship = present(form, Field::EmergencyContactRelationship);
    if contact_name.is_some() || contact_relationship.is_some() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Emergency Contact");
        data_field(out, "Name", contact_name);
        data_field(out, "Relationship", contact_relationship);
    }
}

fn data_field(out: &mut String, label: &str, value: Option<&str>) {
    let _ = writeln!(
        out,
        "  {:<14} {}",
        format!("{label}:"),
        value.unwrap_or(NOT_PROVIDED)
    );
}

/// Field value, treating blank input as absent.
fn present(form: &PatientForm, field: Field) -> Option<&str> {
    form.get(field).map(str::trim).filter(|v| !v.is_empty())
}
