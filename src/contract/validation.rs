//! Input validation for the contract form.
//!
//! Errors keep the field name the browser posted so the message can be
//! matched back to the form.

use std::fmt;

/// Validation error with a user-facing message.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The form field that failed validation
    pub field: String,
    pub message: String,
    /// Suggestion for how to fix the error
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create error for empty required field
    pub fn empty_field(field: &str, label: &str) -> Self {
        Self::new(field, format!("{} es obligatorio", label))
            .with_suggestion(format!("Complete el campo {}", label.to_lowercase()))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors, in the order they were found.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    /// Short message shown by the HTML form: `Faltan campos obligatorios: nombre, dni`.
    pub fn to_form_message(&self) -> String {
        format!("Faltan campos obligatorios: {}", self.fields().join(", "))
    }

    /// Detailed message, one numbered line per error.
    pub fn to_detailed_message(&self) -> String {
        self.errors
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {}", i + 1, e))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_form_message())
    }
}

/// Validate that a string is not empty after trimming
pub fn validate_required(value: &str, field: &str, label: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.add(ValidationError::empty_field(field, label));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_message_lists_fields_in_order() {
        let mut errors = ValidationErrors::new();
        validate_required("", "nombre", "Nombre", &mut errors);
        validate_required("  ", "dni", "DNI", &mut errors);
        validate_required("x", "email", "Email", &mut errors);

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.to_form_message(), "Faltan campos obligatorios: nombre, dni");
    }

    #[test]
    fn test_detailed_message() {
        let mut errors = ValidationErrors::new();
        validate_required("", "firma", "Firma", &mut errors);
        let msg = errors.to_detailed_message();
        assert!(msg.starts_with("1. [firma] Firma es obligatorio"));
        assert!(msg.contains("Complete el campo firma"));
    }
}
