//! Plan (solution) model.
//!
//! A term plan is the complete weekly timetable for one term: one
//! `PlannedSlot` per scheduled room booking, each carrying the
//! allocations merged into it. Planning warnings (relaxed soft
//! constraints, skipped allocations) travel with the plan.

use serde::{Deserialize, Serialize};

use super::Weekday;

/// A scheduled weekly room booking.
///
/// One slot hosts one or more allocations that were merged because they
/// share lecturer, module, class type and duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedSlot {
    /// Term this slot belongs to.
    pub term_id: i64,
    /// Hosting venue.
    pub venue_id: i64,
    /// Day of week.
    pub day: Weekday,
    /// Start (minute of day, inclusive).
    pub start_min: i32,
    /// End (minute of day, exclusive).
    pub end_min: i32,
    /// Total headcount across member allocations.
    pub headcount: i32,
    /// Member allocations, in placement order.
    pub allocation_ids: Vec<i64>,
}

impl PlannedSlot {
    /// Slot duration in minutes.
    #[inline]
    pub fn duration_min(&self) -> i32 {
        self.end_min - self.start_min
    }

    /// Whether this slot hosts the given allocation.
    pub fn contains_allocation(&self, allocation_id: i64) -> bool {
        self.allocation_ids.contains(&allocation_id)
    }
}

/// Category of a planning warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Placement accepted a consecutive-run soft violation.
    RelaxedConsecutive,
    /// Placement accepted a max-slots-per-day soft violation
    /// (possibly alongside a consecutive-run one).
    RelaxedDailyLimit,
    /// Allocation dropped under `skip_on_failure`.
    Skipped,
}

/// A non-fatal planning event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWarning {
    /// Warning category.
    pub kind: WarningKind,
    /// Allocation the warning concerns.
    pub allocation_id: i64,
    /// Human-readable description.
    pub message: String,
}

impl PlanWarning {
    pub(crate) fn new(kind: WarningKind, allocation_id: i64, message: impl Into<String>) -> Self {
        Self {
            kind,
            allocation_id,
            message: message.into(),
        }
    }
}

/// A complete term timetable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermPlan {
    /// Planned term.
    pub term_id: i64,
    /// All slots, ordered by (day, start, venue).
    pub slots: Vec<PlannedSlot>,
    /// Warnings emitted while planning.
    pub warnings: Vec<PlanWarning>,
}

impl TermPlan {
    /// Finds the slot hosting a given allocation.
    pub fn slot_for_allocation(&self, allocation_id: i64) -> Option<&PlannedSlot> {
        self.slots.iter().find(|s| s.contains_allocation(allocation_id))
    }

    /// Returns all slots in a given venue.
    pub fn slots_for_venue(&self, venue_id: i64) -> Vec<&PlannedSlot> {
        self.slots.iter().filter(|s| s.venue_id == venue_id).collect()
    }

    /// Returns all slots on a given day.
    pub fn slots_for_day(&self, day: Weekday) -> Vec<&PlannedSlot> {
        self.slots.iter().filter(|s| s.day == day).collect()
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether no soft constraint was relaxed and nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
