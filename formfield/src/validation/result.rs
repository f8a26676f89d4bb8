use serde::Deserialize;
use serde::Serialize;

/// Information about a single field validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Canonical field path.
    pub path: String,
    /// Field id (for focusing).
    pub field_id: String,
    /// Error message.
    pub message: String,
}

/// Result of validating one or more fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ValidationResult {
    /// All fields passed validation.
    #[default]
    Valid,
    /// One or more fields failed validation.
    Invalid(Vec<FieldError>),
}

impl ValidationResult {
    /// Build a result from collected errors.
    pub fn from_errors(errors: Vec<FieldError>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(errors)
        }
    }

    /// Check if all fields passed validation.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Check if any field failed validation.
    pub fn is_invalid(&self) -> bool {
        !self.is_valid()
    }

    /// Get all validation errors.
    pub fn errors(&self) -> &[FieldError] {
        match self {
            Self::Valid => &[],
            Self::Invalid(errors) => errors,
        }
    }

    /// Get the first validation error (if any).
    pub fn first_error(&self) -> Option<&FieldError> {
        self.errors().first()
    }

    /// Get the id of the first invalid field (for focusing).
    pub fn first_invalid_field(&self) -> Option<&str> {
        self.first_error().map(|e| e.field_id.as_str())
    }
}

/// Per-field validation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// Never validated, or validation was reset.
    #[default]
    Clean,
    /// A pass is running or waits for an external result.
    Pending,
    Valid,
    Invalid,
}

/// Outcome of an externally driven asynchronous check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncData {
    pub valid: bool,
    pub message: String,
}
