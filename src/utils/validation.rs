use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

pub fn validate<T: Validate>(val: &T) -> Result<(), ValidationErrors> {
    val.validate()
}

/// Builds a `ValidationError` carrying an owned human-readable message, for
/// checks that cannot be expressed as derive attributes (cross-field rules,
/// employer-defined form fields).
pub fn error_with_message(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

/// Single-field failure shorthand.
pub fn field_error(field: &'static str, code: &'static str, message: String) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(field, error_with_message(code, message));
    errors
}
