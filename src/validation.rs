//! Structural input validation.
//!
//! Checks the integrity of allocation and venue snapshots before
//! planning. Detects:
//! - Duplicate ids
//! - Non-positive durations, capacities, headcounts
//! - Empty allowed-day sets and inverted time windows
//! - Allocations belonging to a different term
//!
//! These are caller bugs and always fatal. Feasibility problems (a window
//! too short for its duration, no eligible venue) are planning-time
//! failures handled by the planner itself, where `skip_on_failure`
//! applies.

use std::collections::HashSet;

use crate::models::{Allocation, Venue};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same id.
    DuplicateId,
    /// Duration, capacity or headcount is zero or negative.
    NonPositiveValue,
    /// An allocation has no allowed days.
    NoAllowedDays,
    /// A time window with end <= start.
    EmptyWindow,
    /// An allocation's term does not match the planned term.
    TermMismatch,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates allocation and venue snapshots for a term.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(
    term_id: i64,
    allocations: &[Allocation],
    venues: &[Venue],
) -> ValidationResult {
    let mut errors = Vec::new();

    let mut venue_ids = HashSet::new();
    for v in venues {
        if !venue_ids.insert(v.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate venue id: {}", v.id),
            ));
        }
        if v.capacity <= 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::NonPositiveValue,
                format!("Venue {} has non-positive capacity {}", v.id, v.capacity),
            ));
        }
    }

    let mut allocation_ids = HashSet::new();
    for a in allocations {
        if !allocation_ids.insert(a.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate allocation id: {}", a.id),
            ));
        }
        if a.term_id != term_id {
            errors.push(ValidationError::new(
                ValidationErrorKind::TermMismatch,
                format!(
                    "Allocation {} belongs to term {}, not term {}",
                    a.id, a.term_id, term_id
                ),
            ));
        }
        if a.duration_min <= 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::NonPositiveValue,
                format!("Allocation {} has non-positive duration {}", a.id, a.duration_min),
            ));
        }
        if a.headcount < 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::NonPositiveValue,
                format!("Allocation {} has negative headcount {}", a.id, a.headcount),
            ));
        }
        if a.allowed_days.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::NoAllowedDays,
                format!("Allocation {} has no allowed days", a.id),
            ));
        }
        if a.window.duration_min() <= 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyWindow,
                format!(
                    "Allocation {} has an empty time window [{}, {})",
                    a.id, a.window.start_min, a.window.end_min
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
