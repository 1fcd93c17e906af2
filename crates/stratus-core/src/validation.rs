//! Validation utilities.

use crate::{FieldError, StratusError};
use validator::{Validate, ValidationErrors};

/// Extension trait for validation.
pub trait ValidateExt: Validate {
    /// Validates the struct and returns a `StratusError` on failure.
    fn validate_request(&self) -> Result<(), StratusError> {
        self.validate().map_err(validation_errors_to_stratus_error)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Flattens `validator::ValidationErrors` into field errors.
#[must_use]
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: (*field).to_string(),
                message: error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string),
                code: error.code.to_string(),
            })
        })
        .collect()
}

/// Converts `validator::ValidationErrors` to `StratusError`.
#[must_use]
pub fn validation_errors_to_stratus_error(errors: ValidationErrors) -> StratusError {
    let message = field_errors(&errors)
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");

    StratusError::Validation(message)
}

/// Common validation functions.
pub mod rules {
    use chrono::{Duration, NaiveDate};
    use validator::ValidationError;

    /// Validates that a string is not blank (not empty after trimming).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("not_blank"));
        }
        Ok(())
    }

    /// Validates that `date` lies in `[today, today + max_days_ahead]`.
    pub fn within_days_ahead(
        date: NaiveDate,
        today: NaiveDate,
        max_days_ahead: u32,
    ) -> Result<(), ValidationError> {
        if date < today {
            let mut err = ValidationError::new("date_in_past");
            err.message = Some(format!("date {date} is before {today}").into());
            return Err(err);
        }
        if date > today + Duration::days(i64::from(max_days_ahead)) {
            let mut err = ValidationError::new("date_too_far_ahead");
            err.message = Some(
                format!("date {date} is more than {max_days_ahead} days after {today}").into(),
            );
            return Err(err);
        }
        Ok(())
    }
}
