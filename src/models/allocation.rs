//! Teaching allocation model.
//!
//! An allocation is the atomic planning requirement: a lecturer teaches a
//! module as one class type (lecture, tutorial, lab) for a fixed weekly
//! duration, optionally bound to a specific class and group. The planner
//! never mutates allocations; it only assigns each one a weekly slot.

use serde::{Deserialize, Serialize};

use super::{TimeWindow, Weekday, WEEKDAYS};

/// A weekly teaching requirement to be placed in the term timetable.
///
/// Read-only input to the planner. Ids are database ids supplied by the
/// surrounding service together with the lecturer's school memberships,
/// so the engine needs no further lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    /// Unique allocation identifier.
    pub id: i64,
    /// Term this allocation belongs to.
    pub term_id: i64,
    /// Teaching lecturer.
    pub lecturer_id: i64,
    /// Module code (e.g. "CS101").
    pub module_code: String,
    /// Specific class (program semester). `None` = not tied to a class.
    pub class_id: Option<i64>,
    /// Named group within the class. `None` = class-wide (all groups).
    pub group: Option<String>,
    /// Class type tag: "lecture", "tutorial", "lab", ...
    pub class_type: String,
    /// Weekly session duration in minutes.
    pub duration_min: i32,
    /// Expected student headcount.
    pub headcount: i32,
    /// Weekdays the session may be placed on.
    pub allowed_days: Vec<Weekday>,
    /// Time-of-day window the session must lie within.
    pub window: TimeWindow,
    /// Required venue type ids. Empty = any venue type.
    pub required_venue_types: Vec<i64>,
    /// Schools the lecturer may teach in (venue eligibility).
    pub lecturer_school_ids: Vec<i64>,
}

impl Allocation {
    /// Creates an allocation with working-week defaults:
    /// Monday-Friday, 08:00-18:00, 60 minutes, class type "lecture".
    pub fn new(
        id: i64,
        term_id: i64,
        lecturer_id: i64,
        module_code: impl Into<String>,
    ) -> Self {
        Self {
            id,
            term_id,
            lecturer_id,
            module_code: module_code.into(),
            class_id: None,
            group: None,
            class_type: "lecture".to_string(),
            duration_min: 60,
            headcount: 0,
            allowed_days: WEEKDAYS.to_vec(),
            window: TimeWindow::new(8 * 60, 18 * 60),
            required_venue_types: Vec::new(),
            lecturer_school_ids: Vec::new(),
        }
    }

    /// Binds the allocation to a class (program semester).
    pub fn with_class(mut self, class_id: i64) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Restricts the allocation to a named group within its class.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets the class type tag.
    pub fn with_class_type(mut self, class_type: impl Into<String>) -> Self {
        self.class_type = class_type.into();
        self
    }

    /// Sets the weekly duration in minutes.
    pub fn with_duration(mut self, duration_min: i32) -> Self {
        self.duration_min = duration_min;
        self
    }

    /// Sets the student headcount.
    pub fn with_headcount(mut self, headcount: i32) -> Self {
        self.headcount = headcount;
        self
    }

    /// Sets the allowed weekdays.
    pub fn with_days(mut self, days: impl Into<Vec<Weekday>>) -> Self {
        self.allowed_days = days.into();
        self
    }

    /// Sets the allowed time-of-day window.
    pub fn with_window(mut self, start_min: i32, end_min: i32) -> Self {
        self.window = TimeWindow::new(start_min, end_min);
        self
    }

    /// Adds a required venue type.
    pub fn with_required_venue_type(mut self, venue_type_id: i64) -> Self {
        self.required_venue_types.push(venue_type_id);
        self
    }

    /// Sets the lecturer's school memberships.
    pub fn with_schools(mut self, school_ids: impl Into<Vec<i64>>) -> Self {
        self.lecturer_school_ids = school_ids.into();
        self
    }

    /// The group key used for class-conflict indexing.
    ///
    /// `None` means class-wide: the session concerns every group.
    #[inline]
    pub fn group_key(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Whether this allocation could share a slot with `other`.
    ///
    /// Sharing requires the same lecturer, module code, class type and
    /// duration; venue capacity and window fit are checked at placement.
    pub fn is_mergeable_with(&self, other: &Allocation) -> bool {
        self.lecturer_id == other.lecturer_id
            && self.module_code == other.module_code
            && self.class_type == other.class_type
            && self.duration_min == other.duration_min
    }
}
