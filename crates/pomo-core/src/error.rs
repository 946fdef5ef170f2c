//! Validation error types following the panic-free policy.

use thiserror::Error;

/// Errors produced when a record fails schema validation.
///
/// Validation failures carry the offending field, the rejected value,
/// and the expectation, so a caller can report exactly what was wrong
/// without re-inspecting the record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A field value fell outside its declared range or shape.
    #[error("invalid {field}: {value} (expected {expected})")]
    InvalidField {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ValidationError {
    /// Creates a field validation error.
    pub fn invalid(
        field: &'static str,
        value: impl ToString,
        expected: &'static str,
    ) -> Self {
        Self::InvalidField {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// Parse-don't-trust boundary check.
///
/// Any record entering or leaving the persistence layer or the wire
/// passes through this before it is acted on.
pub trait Validate {
    /// Returns `Ok(())` if the record satisfies its schema.
    fn validate(&self) -> Result<(), ValidationError>;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        self.iter().try_for_each(Validate::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::invalid("work_duration", 0, "1..=120 minutes");
        assert_eq!(
            err.to_string(),
            "invalid work_duration: 0 (expected 1..=120 minutes)"
        );
    }
}
