//! Traits shared by contract requests.

use super::validation::ValidationErrors;

/// Trait for validating request objects.
pub trait Validator {
    /// Validate the state of the object.
    fn validate(&self) -> Result<(), ValidationErrors>;
}
