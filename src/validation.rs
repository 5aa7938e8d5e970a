// 🛂 Input Validation - Preconditions checked before the comparison core runs
//
// The core assumes well-formed sequences. Empty uploads, uploads missing
// the identity columns, and oversized uploads are rejected here instead.

use crate::changeset::PriceChange;
use crate::normalizer::{CARD_NUMBER, PRODUCT_NAME};
use crate::record::TabularRecord;

/// Default row ceiling for uploads and exports
pub const DEFAULT_MAX_ROWS: usize = 50_000;

/// Columns the first uploaded row must carry
pub const REQUIRED_COLUMNS: [&str; 2] = [PRODUCT_NAME, CARD_NUMBER];

// ============================================================================
// VALIDATION ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl ValidationError {
    fn new(field: &str, message: &str, context: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.to_string(),
            context: context.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// All problems found in one request, surfaced as a single error
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub errors: Vec<ValidationError>,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationFailure {}

pub type ValidationResult = Result<(), ValidationFailure>;

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure { errors })
    }
}

// ============================================================================
// INPUT VALIDATOR
// ============================================================================

pub struct InputValidator {
    pub max_rows: usize,
}

impl InputValidator {
    pub fn new() -> Self {
        InputValidator {
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    pub fn with_max_rows(max_rows: usize) -> Self {
        InputValidator { max_rows }
    }

    /// Validate an uploaded export (comparison or baseline replacement)
    ///
    /// Only the first row is sampled for the identity columns.
    pub fn validate_upload(&self, rows: &[TabularRecord]) -> ValidationResult {
        let mut errors = Vec::new();

        let first = match rows.first() {
            Some(first) => first,
            None => {
                errors.push(ValidationError::new("rows", "No data provided", "Upload"));
                return finish(errors);
            }
        };

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| !first.contains_column(column))
            .collect();

        if !missing.is_empty() {
            errors.push(ValidationError::new(
                "columns",
                &format!("Invalid CSV format: missing required columns ({})", missing.join(", ")),
                "Upload",
            ));
        }

        if rows.len() > self.max_rows {
            errors.push(ValidationError::new(
                "rows",
                &format!("Too many rows. Maximum {} rows allowed.", self.max_rows),
                "Upload",
            ));
        }

        finish(errors)
    }

    /// Validate a change-set submitted for export
    pub fn validate_export(&self, changes: &[PriceChange]) -> ValidationResult {
        let mut errors = Vec::new();

        if changes.is_empty() {
            errors.push(ValidationError::new(
                "priceChanges",
                "No price changes provided",
                "Export",
            ));
        }

        if changes.len() > self.max_rows {
            errors.push(ValidationError::new(
                "priceChanges",
                &format!("Too many rows. Maximum {} rows allowed.", self.max_rows),
                "Export",
            ));
        }

        finish(errors)
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
