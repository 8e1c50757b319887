//! Venue model.
//!
//! Venues are the rooms sessions are placed in: lecture halls, tutorial
//! rooms, labs. Each venue has a capacity, a type, and the set of schools
//! whose lecturers may use it.

use serde::{Deserialize, Serialize};

/// A room that can host planned slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    /// Unique venue identifier.
    pub id: i64,
    /// Human-readable name.
    pub name: String,
    /// Seated capacity.
    pub capacity: i32,
    /// Venue type id (lecture hall, lab, ...).
    pub venue_type_id: i64,
    /// Schools eligible to use this venue.
    pub school_ids: Vec<i64>,
}

impl Venue {
    /// Creates a new venue.
    pub fn new(id: i64, venue_type_id: i64, capacity: i32) -> Self {
        Self {
            id,
            name: String::new(),
            capacity,
            venue_type_id,
            school_ids: Vec::new(),
        }
    }

    /// Sets the venue name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the eligible schools.
    pub fn with_schools(mut self, school_ids: impl Into<Vec<i64>>) -> Self {
        self.school_ids = school_ids.into();
        self
    }

    /// Maximum headcount a slot in this venue may accumulate.
    ///
    /// Capacity with 10% overbooking tolerance, rounded down.
    #[inline]
    pub fn capacity_limit(&self) -> i32 {
        self.capacity * 11 / 10
    }

    /// Whether a headcount fits within the overbooking limit.
    #[inline]
    pub fn fits(&self, headcount: i32) -> bool {
        headcount <= self.capacity_limit()
    }

    /// Whether a lecturer with the given school memberships may use this venue.
    pub fn admits_schools(&self, lecturer_school_ids: &[i64]) -> bool {
        self.school_ids
            .iter()
            .any(|s| lecturer_school_ids.contains(s))
    }
}
