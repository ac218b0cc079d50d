//! The patient's in-progress form.

use crate::{FormSync, SubmitError};
use chrono::NaiveDate;
use relay_core::{Field, PatientForm, PatientRecord, ValidationErrors};

/// In-progress form value wired to a [`FormSync`].
///
/// Every mutation is relayed, valid or not, so staff can watch the form being filled in.
/// Validation only gates submission.
pub struct FormSession {
    form: PatientForm,
    errors: ValidationErrors,
    sync: FormSync,
}

impl FormSession {
    pub fn new(sync: FormSync) -> Self {
        Self {
            form: PatientForm::default(),
            errors: ValidationErrors::new(),
            sync,
        }
    }

    pub fn form(&self) -> &PatientForm {
        &self.form
    }

    /// Inline errors from the last failed submit.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        self.form.set(field, value);
        self.sync.observe(self.form.clone());
    }

    /// Validates against `today` and, when valid, publishes the record as `submitted`.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::Invalid`] with every failing field; nothing is published.
    /// - [`SubmitError::Publish`] when the relay did not accept the submission. The form keeps
    ///   its contents so the patient can retry.
    pub async fn submit(&mut self, today: NaiveDate) -> Result<PatientRecord, SubmitError> {
        let record = match self.form.validate(today) {
            Ok(record) => record,
            Err(errors) => {
                self.errors = errors.clone();
                return Err(SubmitError::Invalid(errors));
            }
        };
        self.errors = ValidationErrors::new();
        self.sync.submit(&record).await?;
        Ok(record)
    }

    /// Empties the form and tells the dashboard to clear.
    pub fn clear(&mut self) {
        self.form = PatientForm::default();
        self.errors = ValidationErrors::new();
        self.sync.clear();
    }

    /// Tears the session down, discarding any edit still inside its quiet window.
    pub async fn close(self) {
        self.sync.shutdown().await;
    }
}
