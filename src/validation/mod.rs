use std::fmt;

use crate::domain::{Credits, LedgerError};

pub const DESCRIPTION_MAX_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        match err.field {
            "amount" => LedgerError::InvalidAmount(err.message),
            _ => LedgerError::InvalidEntry(err.to_string()),
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control() || ch.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: Credits) -> ValidationResult {
    if amount <= 0 {
        return Err(ValidationError::new(
            "amount",
            format!("must be greater than zero, got {}", amount),
        ));
    }

    Ok(())
}

/// Sanitizes a free-text description and checks its length.
pub fn clean_description(value: &str) -> Result<String, ValidationError> {
    let cleaned = sanitize_string(value);
    validate_max_len("description", &cleaned, DESCRIPTION_MAX_LEN)?;
    Ok(cleaned)
}
