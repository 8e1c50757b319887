//! Term timetable planning engine.
//!
//! Computes a complete weekly timetable for one term: given teaching
//! allocations (lecturer x module x class type x group, with a fixed
//! weekly duration) and venues (capacity, type, eligible schools), every
//! allocation receives a concrete day, start time and venue such that
//! hard constraints are never violated, soft constraints are relaxed only
//! when nothing compliant exists, and compatible allocations share slots.
//!
//! The engine is a pure computation over in-memory snapshots: no I/O, no
//! persistence, no internal parallelism. The surrounding service loads
//! the snapshots, calls [`planner::build_term_plan`], and atomically
//! replaces the term's stored slot set with the result.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `Allocation`, `Venue`, `PlannedSlot`,
//!   `TermPlan`, `TimeWindow`, `Weekday`
//! - **`ordering`**: Most-constrained-first placement ranking
//! - **`planner`**: The planning pipeline — candidates, constraints,
//!   scoring, relaxation ladder, bounded backtracking
//! - **`validation`**: Structural input integrity checks
//! - **`error`**: The planning error taxonomy
//!
//! # References
//!
//! - Schaerf (1999), "A Survey of Automated Timetabling"
//! - Burke & Petrovic (2002), "Recent Research Directions in Automated
//!   Timetabling"

pub mod error;
pub mod models;
pub mod ordering;
pub mod planner;
pub mod validation;
