//! Planning error taxonomy.
//!
//! Feasibility failures (`NoVenues`, `Unplaceable`) describe the input;
//! `AttemptsExceeded` guards against runaway backtracking;
//! `StateOutOfSync` signals an engine defect, never bad input. Relaxed
//! soft constraints are warnings on the returned plan, not errors.

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors raised while building a term plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The venue snapshot is empty; nothing can be placed.
    #[error("no venues available")]
    NoVenues,

    /// The input snapshot is structurally broken (caller bug).
    #[error("invalid planning input: {} problem(s) found", .0.len())]
    InvalidInput(Vec<ValidationError>),

    /// No placement exists for an allocation under any relaxation tier.
    ///
    /// Covers both infeasible input (no eligible venue, window shorter
    /// than the duration) and constraint exhaustion after backtracking.
    /// Converted to a skip warning under `skip_on_failure`.
    #[error("unable to allocate slot for allocation {allocation_id}")]
    Unplaceable { allocation_id: i64 },

    /// Placement attempts exceeded twice the allocation count.
    #[error("maximum placement attempts exceeded ({attempts} attempts for {allocation_count} allocations)")]
    AttemptsExceeded {
        attempts: usize,
        allocation_count: usize,
    },

    /// Internal invariant violation: an index referenced a missing slot
    /// or the final plan failed its completeness check.
    #[error("slot state out of sync: {0}")]
    StateOutOfSync(String),
}

/// Convenience alias for planning results.
pub type PlanResult<T> = std::result::Result<T, PlanError>;
