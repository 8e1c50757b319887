//! Term plan construction.
//!
//! `build_term_plan` recomputes a term's whole weekly timetable from the
//! current allocation and venue snapshots: allocations are ranked most
//! constrained first, then placed one at a time through the candidate
//! generator, constraint validator, scorer and placement selector, with
//! bounded backtracking when the greedy pass dead-ends.
//!
//! The engine is synchronous and holds no resources across calls. The
//! caller owns atomicity: recompute and persist inside one transaction so
//! a partially applied plan is never observable. Given identical inputs
//! the set of feasible outcomes is stable, but bounded random
//! tie-breaking means the specific assignment may vary between runs
//! unless a seed is pinned.
//!
//! # Usage
//!
//! ```
//! use term_planner::models::{Allocation, Venue};
//! use term_planner::planner::{build_term_plan, PlanOptions};
//!
//! let allocations = vec![Allocation::new(1, 10, 7, "CS101")
//!     .with_duration(120)
//!     .with_headcount(40)
//!     .with_schools(vec![1])];
//! let venues = vec![Venue::new(1, 1, 60).with_schools(vec![1])];
//!
//! let plan = build_term_plan(10, &allocations, &venues, PlanOptions::default()).unwrap();
//! assert_eq!(plan.slot_count(), 1);
//! ```

mod candidates;
mod constraints;
mod place;
mod score;
mod state;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::error::{PlanError, PlanResult};
use crate::models::{Allocation, PlanWarning, PlannedSlot, TermPlan, Venue, WarningKind};
use crate::ordering;
use crate::validation::validate_input;

use place::Placer;
use state::PlanState;

/// Scalar planning parameters shared by the placement pipeline.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlanConfig {
    pub max_slots_per_day: usize,
    pub day_start_min: i32,
    pub grid_step_min: i32,
}

/// Receives planning warnings as the run settles.
///
/// All warnings are also returned on the `TermPlan`; a sink exists for
/// callers that forward them elsewhere (logs, UI notifications).
pub trait WarningSink {
    fn emit(&mut self, warning: &PlanWarning);
}

/// Default sink: forwards warnings to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl WarningSink for LogSink {
    fn emit(&mut self, warning: &PlanWarning) {
        tracing::warn!(
            allocation_id = warning.allocation_id,
            kind = ?warning.kind,
            "{}", warning.message
        );
    }
}

/// Sink collecting warnings into a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    warnings: Rc<RefCell<Vec<PlanWarning>>>,
}

impl CollectSink {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything collected so far.
    pub fn collected(&self) -> Vec<PlanWarning> {
        self.warnings.borrow().clone()
    }
}

impl WarningSink for CollectSink {
    fn emit(&mut self, warning: &PlanWarning) {
        self.warnings.borrow_mut().push(warning.clone());
    }
}

/// Options for a planning run.
pub struct PlanOptions {
    /// Soft cap on slots per lecturer/class per day.
    pub max_slots_per_day: usize,
    /// Grid origin and drift reference (minute of day).
    pub day_start_min: i32,
    /// Start-time grid step in minutes.
    pub grid_step_min: i32,
    /// Drop unplaceable allocations with a warning instead of failing.
    pub skip_on_failure: bool,
    /// RNG seed for deterministic runs. `None` = OS entropy.
    pub seed: Option<u64>,
    /// Where warnings are delivered.
    pub warning_sink: Box<dyn WarningSink>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            max_slots_per_day: 4,
            day_start_min: 8 * 60,
            grid_step_min: 30,
            skip_on_failure: false,
            seed: None,
            warning_sink: Box::new(LogSink),
        }
    }
}

impl PlanOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-day slot cap.
    pub fn with_max_slots_per_day(mut self, max: usize) -> Self {
        self.max_slots_per_day = max;
        self
    }

    /// Sets the grid origin / drift reference.
    pub fn with_day_start(mut self, minute_of_day: i32) -> Self {
        self.day_start_min = minute_of_day;
        self
    }

    /// Sets the start-time grid step.
    pub fn with_grid_step(mut self, minutes: i32) -> Self {
        self.grid_step_min = minutes;
        self
    }

    /// Drops unplaceable allocations instead of failing the run.
    /// The completeness check is skipped as a consequence.
    pub fn with_skip_on_failure(mut self, skip: bool) -> Self {
        self.skip_on_failure = skip;
        self
    }

    /// Pins the RNG seed for a deterministic run.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the warning sink.
    pub fn with_warning_sink<S: WarningSink + 'static>(mut self, sink: S) -> Self {
        self.warning_sink = Box::new(sink);
        self
    }
}

impl fmt::Debug for PlanOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanOptions")
            .field("max_slots_per_day", &self.max_slots_per_day)
            .field("day_start_min", &self.day_start_min)
            .field("grid_step_min", &self.grid_step_min)
            .field("skip_on_failure", &self.skip_on_failure)
            .field("seed", &self.seed)
            .finish()
    }
}

/// Builds the complete weekly timetable for one term.
///
/// Every allocation is assigned a venue, day and start time such that
/// hard constraints (lecturer and class double-booking) are never
/// violated, soft constraints are relaxed only when nothing compliant
/// exists, and compatible allocations share slots.
///
/// # Errors
///
/// * [`PlanError::InvalidInput`] - structurally broken snapshots.
/// * [`PlanError::NoVenues`] - allocations given but no venues.
/// * [`PlanError::Unplaceable`] - an allocation has no placement at any
///   relaxation tier (suppressed by `skip_on_failure`).
/// * [`PlanError::AttemptsExceeded`] - the runaway-loop guard tripped.
/// * [`PlanError::StateOutOfSync`] - internal invariant violation.
pub fn build_term_plan(
    term_id: i64,
    allocations: &[Allocation],
    venues: &[Venue],
    options: PlanOptions,
) -> PlanResult<TermPlan> {
    validate_input(term_id, allocations, venues).map_err(PlanError::InvalidInput)?;
    if venues.is_empty() && !allocations.is_empty() {
        return Err(PlanError::NoVenues);
    }

    let PlanOptions {
        max_slots_per_day,
        day_start_min,
        grid_step_min,
        skip_on_failure,
        seed,
        mut warning_sink,
    } = options;
    let config = PlanConfig {
        max_slots_per_day,
        day_start_min,
        grid_step_min,
    };
    let rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };

    tracing::debug!(
        term_id,
        allocations = allocations.len(),
        venues = venues.len(),
        "building term plan"
    );

    let mut placer = Placer::new(allocations, venues, config, rng);
    for index in ordering::plan_order(allocations) {
        let alloc = &allocations[index];
        match placer.place(alloc, 0)? {
            Some(tier) => {
                tracing::debug!(allocation_id = alloc.id, tier = ?tier, "allocation placed");
            }
            None if skip_on_failure => {
                placer.warn(
                    WarningKind::Skipped,
                    alloc.id,
                    format!(
                        "Unable to allocate slot for allocation {}; dropped from the plan",
                        alloc.id
                    ),
                );
            }
            None => {
                return Err(PlanError::Unplaceable {
                    allocation_id: alloc.id,
                })
            }
        }
    }

    let plan = export(
        term_id,
        &placer.state,
        placer.warnings,
        allocations,
        skip_on_failure,
    )?;
    for warning in &plan.warnings {
        warning_sink.emit(warning);
    }
    Ok(plan)
}

/// Confirms completeness and converts internal slots to output records.
fn export(
    term_id: i64,
    state: &PlanState<'_>,
    warnings: Vec<PlanWarning>,
    allocations: &[Allocation],
    skip_on_failure: bool,
) -> PlanResult<TermPlan> {
    if !skip_on_failure {
        if state.placed_count() != allocations.len() {
            return Err(PlanError::StateOutOfSync(format!(
                "{} of {} allocations placed in the final plan",
                state.placed_count(),
                allocations.len()
            )));
        }
        for alloc in allocations {
            let sid = state.placement(alloc.id).ok_or_else(|| {
                PlanError::StateOutOfSync(format!(
                    "allocation {} missing from the final plan",
                    alloc.id
                ))
            })?;
            if !state.slot(sid)?.allocation_ids.contains(&alloc.id) {
                return Err(PlanError::StateOutOfSync(format!(
                    "slot does not list allocation {}",
                    alloc.id
                )));
            }
        }
    }

    let mut slots = Vec::new();
    for (_, slot) in state.iter_slots() {
        if slot.allocation_ids.is_empty() {
            return Err(PlanError::StateOutOfSync("empty slot in final plan".into()));
        }
        slots.push(PlannedSlot {
            term_id,
            venue_id: slot.venue_id,
            day: slot.day,
            start_min: slot.start_min,
            end_min: slot.end_min,
            headcount: slot.headcount,
            allocation_ids: slot.allocation_ids.clone(),
        });
    }
    slots.sort_by(|a, b| {
        (a.day, a.start_min, a.venue_id).cmp(&(b.day, b.start_min, b.venue_id))
    });

    Ok(TermPlan {
        term_id,
        slots,
        warnings,
    })
}
