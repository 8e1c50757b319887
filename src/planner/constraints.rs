//! Placement constraint checks.
//!
//! Hard constraints (lecturer and class double-booking) must never hold
//! in a committed plan. Soft constraints (consecutive-run length,
//! max-slots-per-day) may be relaxed by the placement selector, in
//! priority order, when nothing compliant exists.
//!
//! Checks apply to new-slot placements only: a combinable slot already
//! contains the lecturer at the same time, so merging cannot introduce a
//! conflict.

use std::fmt;

use crate::error::PlanResult;
use crate::models::{Allocation, TimeWindow, Weekday};

use super::state::{PlanState, SlotId};

/// Longest tolerated chain of back-to-back slots per lecturer or class.
const MAX_CONSECUTIVE_RUN: usize = 2;

/// A violated placement constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The lecturer already teaches an overlapping slot.
    LecturerConflict,
    /// The class (or an affected group) already sits in an overlapping slot.
    ClassConflict,
    /// The placement would create a run of more than two back-to-back slots.
    ConsecutiveRun,
    /// The lecturer or class would exceed the per-day slot count.
    DailyLimit,
}

impl ViolationKind {
    /// Whether this violation may never be committed.
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::LecturerConflict | Self::ClassConflict)
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LecturerConflict => "lecturer double-booked",
            Self::ClassConflict => "class double-booked",
            Self::ConsecutiveRun => "more than 2 back-to-back slots",
            Self::DailyLimit => "daily slot limit exceeded",
        };
        f.write_str(s)
    }
}

/// Checks a new-slot placement against all constraints.
///
/// Returns the distinct violations, hard ones first. Soft constraints are
/// evaluated only when every hard constraint passes.
pub fn check_placement(
    alloc: &Allocation,
    venue_id: i64,
    day: Weekday,
    start_min: i32,
    end_min: i32,
    state: &PlanState<'_>,
    max_slots_per_day: usize,
) -> PlanResult<Vec<ViolationKind>> {
    let mut violations = Vec::new();

    if lecturer_conflict(alloc, venue_id, day, start_min, end_min, state)? {
        violations.push(ViolationKind::LecturerConflict);
    }
    let class_slots = affected_class_slots(alloc, day, state);
    if class_conflict(&class_slots, start_min, end_min, state)? {
        violations.push(ViolationKind::ClassConflict);
    }
    if !violations.is_empty() {
        return Ok(violations);
    }

    let lecturer_slots = state.lecturer_day_slots(alloc.lecturer_id, day);
    if exceeds_run(lecturer_slots, start_min, end_min, state)?
        || exceeds_run(&class_slots, start_min, end_min, state)?
    {
        violations.push(ViolationKind::ConsecutiveRun);
    }
    if lecturer_slots.len() + 1 > max_slots_per_day || class_slots.len() + 1 > max_slots_per_day {
        violations.push(ViolationKind::DailyLimit);
    }

    Ok(violations)
}

/// Whether the lecturer holds an overlapping slot that day.
///
/// An overlap with a slot matching module, class type and venue is
/// tolerated: such a slot is the combination target, not a conflict.
fn lecturer_conflict(
    alloc: &Allocation,
    venue_id: i64,
    day: Weekday,
    start_min: i32,
    end_min: i32,
    state: &PlanState<'_>,
) -> PlanResult<bool> {
    for &sid in state.lecturer_day_slots(alloc.lecturer_id, day) {
        let slot = state.slot(sid)?;
        if !TimeWindow::overlaps(start_min, end_min, slot.start_min, slot.end_min) {
            continue;
        }
        let combinable_shape = slot.module_code == alloc.module_code
            && slot.class_type == alloc.class_type
            && slot.venue_id == venue_id;
        if !combinable_shape {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The slots students of this allocation would attend on `day`.
///
/// A named group sees its own slots and the class-wide ones; a
/// class-wide allocation sees every group's slots.
fn affected_class_slots(alloc: &Allocation, day: Weekday, state: &PlanState<'_>) -> Vec<SlotId> {
    let class_id = match alloc.class_id {
        Some(id) => id,
        None => return Vec::new(),
    };

    let mut slots: Vec<SlotId> = Vec::new();
    let push_all = |ids: &[SlotId], slots: &mut Vec<SlotId>| {
        for &id in ids {
            if !slots.contains(&id) {
                slots.push(id);
            }
        }
    };

    match alloc.group_key() {
        Some(group) => {
            push_all(state.class_day_slots(class_id, None, day), &mut slots);
            push_all(state.class_day_slots(class_id, Some(group), day), &mut slots);
        }
        None => {
            for key in state.class_group_keys(class_id) {
                push_all(state.class_day_slots(class_id, key.as_deref(), day), &mut slots);
            }
        }
    }
    slots
}

fn class_conflict(
    class_slots: &[SlotId],
    start_min: i32,
    end_min: i32,
    state: &PlanState<'_>,
) -> PlanResult<bool> {
    for &sid in class_slots {
        let slot = state.slot(sid)?;
        if TimeWindow::overlaps(start_min, end_min, slot.start_min, slot.end_min) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Whether adding [start, end) creates a back-to-back run longer than
/// `MAX_CONSECUTIVE_RUN` among the given slots.
fn exceeds_run(
    slot_ids: &[SlotId],
    start_min: i32,
    end_min: i32,
    state: &PlanState<'_>,
) -> PlanResult<bool> {
    let mut intervals = Vec::with_capacity(slot_ids.len());
    for &sid in slot_ids {
        let slot = state.slot(sid)?;
        intervals.push((slot.start_min, slot.end_min));
    }

    let mut run = 1;
    // Extend leftwards over touching predecessors
    let mut cursor = start_min;
    while let Some(&(s, _)) = intervals.iter().find(|&&(_, e)| e == cursor) {
        run += 1;
        cursor = s;
    }
    // Extend rightwards over touching successors
    let mut cursor = end_min;
    while let Some(&(_, e)) = intervals.iter().find(|&&(s, _)| s == cursor) {
        run += 1;
        cursor = e;
    }
    Ok(run > MAX_CONSECUTIVE_RUN)
}
