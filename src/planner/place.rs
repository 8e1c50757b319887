//! Placement selection and bounded backtracking.
//!
//! For one allocation the selector walks a relaxation ladder and stops at
//! the first tier that applies:
//!
//! 1. **Combine** into a zero-violation existing slot (lowest cost).
//! 2. **Place clean**: a new slot chosen uniformly at random among the
//!    candidates within `TIE_WINDOW_COST` of the best, so near-optimal
//!    venues, days and lecturers are treated fairly.
//! 3. **Relax consecutive**: accept a consecutive-run violation, warn.
//! 4. **Relax daily limit**: accept any soft violations, warn.
//! 5. **Backtrack**: evict a recently placed allocation and retry.
//!
//! Hard constraints are never committed: when backtracking also fails,
//! the allocation is unplaceable and the run fails (or skips it).

use rand::prelude::IndexedRandom;
use rand::rngs::SmallRng;

use crate::error::{PlanError, PlanResult};
use crate::models::{Allocation, PlanWarning, Venue, WarningKind};

use super::candidates::{eligible_venues, generate, Candidate};
use super::state::PlanState;
use super::PlanConfig;

/// Cost band above the best candidate considered "near optimal".
const TIE_WINDOW_COST: f64 = 200.0;

/// How many recent placements the reallocator may evict.
const REALLOC_WINDOW: usize = 5;

/// Maximum recursion depth of the reallocator.
const MAX_BACKTRACK_DEPTH: u32 = 2;

/// Which relaxation tier placed an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementTier {
    Combined,
    Clean,
    RelaxedConsecutive,
    RelaxedDailyLimit,
    Backtracked,
}

/// Mutable driver of one planning run: state, RNG, attempt budget.
pub struct Placer<'a, 'v> {
    pub(super) state: PlanState<'a>,
    pub(super) warnings: Vec<PlanWarning>,
    venues: &'v [Venue],
    config: PlanConfig,
    rng: SmallRng,
    attempts: usize,
    allocation_count: usize,
}

impl<'a, 'v> Placer<'a, 'v> {
    pub fn new(
        allocations: &'a [Allocation],
        venues: &'v [Venue],
        config: PlanConfig,
        rng: SmallRng,
    ) -> Self {
        Self {
            state: PlanState::new(allocations),
            warnings: Vec::new(),
            venues,
            config,
            rng,
            attempts: 0,
            allocation_count: allocations.len(),
        }
    }

    /// Places one allocation, walking the relaxation ladder.
    ///
    /// `Ok(None)` means no placement exists at any tier; the caller
    /// decides between failing the run and skipping the allocation.
    pub fn place(&mut self, alloc: &Allocation, depth: u32) -> PlanResult<Option<PlacementTier>> {
        self.attempts += 1;
        if self.attempts > 2 * self.allocation_count {
            return Err(PlanError::AttemptsExceeded {
                attempts: self.attempts,
                allocation_count: self.allocation_count,
            });
        }

        let venues = eligible_venues(alloc, self.venues, &mut self.rng);
        if venues.is_empty() {
            return Ok(None);
        }
        let candidates = generate(alloc, &venues, &self.state, &self.config)?;

        // 1. Combine
        if let Some(best) = lowest_cost(candidates.iter().filter(|c| c.merge_into.is_some())) {
            let best = best.clone();
            self.commit(alloc, &best)?;
            return Ok(Some(PlacementTier::Combined));
        }

        // 2. Place clean, tie-breaking uniformly among near-best candidates
        let clean: Vec<&Candidate> = candidates.iter().filter(|c| c.is_clean()).collect();
        if let Some(best_cost) = clean
            .iter()
            .map(|c| c.cost)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        {
            let near: Vec<&Candidate> = clean
                .into_iter()
                .filter(|c| c.cost <= best_cost + TIE_WINDOW_COST)
                .collect();
            if let Some(&chosen) = near.choose(&mut self.rng) {
                let chosen = chosen.clone();
                self.commit(alloc, &chosen)?;
                return Ok(Some(PlacementTier::Clean));
            }
        }

        // 3. Relax the consecutive-run constraint
        if let Some(best) = lowest_cost(candidates.iter().filter(|c| c.is_consecutive_only())) {
            let best = best.clone();
            self.commit(alloc, &best)?;
            self.warn(
                WarningKind::RelaxedConsecutive,
                alloc.id,
                format!(
                    "Allocation {} placed with more than 2 back-to-back slots",
                    alloc.id
                ),
            );
            return Ok(Some(PlacementTier::RelaxedConsecutive));
        }

        // 4. Relax the daily limit as well
        if let Some(best) = lowest_cost(candidates.iter().filter(|c| c.is_soft_only())) {
            let best = best.clone();
            self.commit(alloc, &best)?;
            self.warn(
                WarningKind::RelaxedDailyLimit,
                alloc.id,
                format!("Allocation {} placed over the daily slot limit", alloc.id),
            );
            return Ok(Some(PlacementTier::RelaxedDailyLimit));
        }

        // 5. Backtrack: every remaining candidate violates a hard constraint
        if depth < MAX_BACKTRACK_DEPTH && self.backtrack(alloc, depth)? {
            return Ok(Some(PlacementTier::Backtracked));
        }

        Ok(None)
    }

    /// Evicts recently placed allocations, newest first, trying to place
    /// `alloc` and re-place the evictee. Rolls back every failed attempt.
    fn backtrack(&mut self, alloc: &Allocation, depth: u32) -> PlanResult<bool> {
        for victim_id in self.state.recent_placements(REALLOC_WINDOW) {
            let victim = self.state.allocation(victim_id)?;
            let checkpoint = self.state.checkpoint();
            let warn_mark = self.warnings.len();

            self.state.evict(victim_id)?;
            let placed = self.place(alloc, depth + 1)?.is_some()
                && self.place(victim, depth + 1)?.is_some();
            if placed {
                return Ok(true);
            }
            self.state.rollback_to(checkpoint)?;
            self.warnings.truncate(warn_mark);
        }
        Ok(false)
    }

    fn commit(&mut self, alloc: &Allocation, candidate: &Candidate) -> PlanResult<()> {
        match candidate.merge_into {
            Some(sid) => self.state.place_merge(alloc, sid),
            None => self
                .state
                .place_new(alloc, candidate.venue_id, candidate.day, candidate.start_min)
                .map(|_| ()),
        }
    }

    pub(super) fn warn(&mut self, kind: WarningKind, allocation_id: i64, message: String) {
        self.warnings
            .push(PlanWarning::new(kind, allocation_id, message));
    }
}

fn lowest_cost<'c>(iter: impl Iterator<Item = &'c Candidate>) -> Option<&'c Candidate> {
    iter.min_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Weekday::Monday;
    use rand::SeedableRng;

    fn make_alloc(id: i64, lecturer_id: i64) -> Allocation {
        Allocation::new(id, 10, lecturer_id, "CS101")
            .with_duration(120)
            .with_headcount(30)
            .with_days(vec![Monday])
            .with_window(480, 960)
            .with_schools(vec![1])
    }

    fn config() -> PlanConfig {
        PlanConfig {
            max_slots_per_day: 4,
            day_start_min: 480,
            grid_step_min: 30,
        }
    }

    fn placer<'a, 'v>(
        allocations: &'a [Allocation],
        venues: &'v [Venue],
        seed: u64,
    ) -> Placer<'a, 'v> {
        Placer::new(
            allocations,
            venues,
            config(),
            SmallRng::seed_from_u64(seed),
        )
    }

    #[test]
    fn test_combine_preferred_over_new_slot() {
        let allocations = vec![make_alloc(1, 7), make_alloc(2, 7)];
        let venues = vec![Venue::new(1, 1, 80).with_schools(vec![1])];
        let mut p = placer(&allocations, &venues, 42);

        assert_eq!(
            p.place(&allocations[0], 0).unwrap(),
            Some(PlacementTier::Clean)
        );
        assert_eq!(
            p.place(&allocations[1], 0).unwrap(),
            Some(PlacementTier::Combined)
        );

        let sid = p.state.placement(1).unwrap();
        assert_eq!(p.state.placement(2), Some(sid));
        assert_eq!(p.state.slot(sid).unwrap().headcount, 60);
    }

    #[test]
    fn test_clean_placement_respects_grid_and_window() {
        let allocations = vec![make_alloc(1, 7)];
        let venues = vec![Venue::new(1, 1, 80).with_schools(vec![1])];

        for seed in 0..10 {
            let mut p = placer(&allocations, &venues, seed);
            p.place(&allocations[0], 0).unwrap().unwrap();
            let sid = p.state.placement(1).unwrap();
            let slot = p.state.slot(sid).unwrap();
            assert_eq!((slot.start_min - 480) % 30, 0);
            assert!(slot.start_min >= 480 && slot.end_min <= 960);
            // Random tie-break stays within the near-best cost band
            assert!(slot.start_min <= 480 + TIE_WINDOW_COST as i32);
        }
    }

    // Distinct module codes keep single-start allocations from merging.
    trait AllocationExt {
        fn with_module(self, code: &str) -> Self;
    }
    impl AllocationExt for Allocation {
        fn with_module(mut self, code: &str) -> Self {
            self.module_code = code.to_string();
            self
        }
    }

    #[test]
    fn test_relax_consecutive_emits_warning() {
        // Three single-start windows forcing a chain of three
        let allocations = vec![
            make_alloc(1, 7).with_window(480, 600),
            make_alloc(2, 7).with_window(600, 720).with_module("MA201"),
            make_alloc(3, 7).with_window(720, 840).with_module("PH301"),
        ];
        let venues = vec![Venue::new(1, 1, 80).with_schools(vec![1])];
        let mut p = placer(&allocations, &venues, 42);

        assert!(p.place(&allocations[0], 0).unwrap().is_some());
        assert!(p.place(&allocations[1], 0).unwrap().is_some());
        assert_eq!(
            p.place(&allocations[2], 0).unwrap(),
            Some(PlacementTier::RelaxedConsecutive)
        );
        assert_eq!(p.warnings.len(), 1);
        assert_eq!(p.warnings[0].kind, WarningKind::RelaxedConsecutive);
        assert_eq!(p.warnings[0].allocation_id, 3);
    }

    #[test]
    fn test_relax_daily_limit_emits_warning() {
        let allocations = vec![
            make_alloc(1, 7).with_window(480, 600),
            make_alloc(2, 7).with_window(660, 780).with_module("MA201"),
            make_alloc(3, 7).with_window(840, 960).with_module("PH301"),
        ];
        let venues = vec![Venue::new(1, 1, 80).with_schools(vec![1])];
        let mut p = Placer::new(
            &allocations,
            &venues,
            PlanConfig {
                max_slots_per_day: 2,
                day_start_min: 480,
                grid_step_min: 30,
            },
            SmallRng::seed_from_u64(42),
        );

        assert!(p.place(&allocations[0], 0).unwrap().is_some());
        assert!(p.place(&allocations[1], 0).unwrap().is_some());
        assert_eq!(
            p.place(&allocations[2], 0).unwrap(),
            Some(PlacementTier::RelaxedDailyLimit)
        );
        assert_eq!(p.warnings[0].kind, WarningKind::RelaxedDailyLimit);
    }

    #[test]
    fn test_backtrack_moves_recent_placement() {
        // X needs venue 1 at 08:00; Y sits there but can move to venue 2.
        let x = make_alloc(1, 100)
            .with_window(480, 600)
            .with_required_venue_type(1);
        let y = make_alloc(2, 101).with_window(480, 600);
        let allocations = vec![x, y];
        let venues = vec![
            Venue::new(1, 1, 30).with_schools(vec![1]),
            Venue::new(2, 2, 30).with_schools(vec![1]),
        ];
        let mut p = placer(&allocations, &venues, 42);

        // Park Y in venue 1 directly, then ask for X
        p.state.place_new(&allocations[1], 1, Monday, 480).unwrap();
        assert_eq!(
            p.place(&allocations[0], 0).unwrap(),
            Some(PlacementTier::Backtracked)
        );

        let x_slot = p.state.slot(p.state.placement(1).unwrap()).unwrap();
        let y_slot = p.state.slot(p.state.placement(2).unwrap()).unwrap();
        assert_eq!(x_slot.venue_id, 1);
        assert_eq!(x_slot.start_min, 480);
        assert_eq!(y_slot.venue_id, 2);
    }

    #[test]
    fn test_backtrack_rolls_back_on_failure() {
        // X wants venue 1 at 08:00, Y occupies it and has nowhere to go.
        // Spare allocations pad the attempt budget so the nested
        // backtracking runs to exhaustion instead of tripping the cap.
        let x = make_alloc(1, 100)
            .with_window(480, 600)
            .with_required_venue_type(1);
        let y = make_alloc(2, 101).with_window(480, 600);
        let mut allocations = vec![x, y];
        for id in 3..=6 {
            allocations.push(make_alloc(id, 100 + id));
        }
        let venues = vec![Venue::new(1, 1, 30).with_schools(vec![1])];
        let mut p = placer(&allocations, &venues, 42);

        p.state.place_new(&allocations[1], 1, Monday, 480).unwrap();
        assert_eq!(p.place(&allocations[0], 0).unwrap(), None);

        // Y's placement survived the failed backtracking
        let y_slot = p.state.slot(p.state.placement(2).unwrap()).unwrap();
        assert_eq!(y_slot.venue_id, 1);
        assert_eq!(y_slot.start_min, 480);
        assert_eq!(p.state.placement(1), None);
    }

    #[test]
    fn test_no_eligible_venue_returns_none() {
        let allocations = vec![make_alloc(1, 7).with_required_venue_type(9)];
        let venues = vec![Venue::new(1, 1, 80).with_schools(vec![1])];
        let mut p = placer(&allocations, &venues, 42);
        assert_eq!(p.place(&allocations[0], 0).unwrap(), None);
    }

    #[test]
    fn test_attempt_cap_aborts() {
        let allocations = vec![make_alloc(1, 7).with_required_venue_type(9)];
        let venues = vec![Venue::new(1, 1, 80).with_schools(vec![1])];
        let mut p = placer(&allocations, &venues, 42);

        // Cap is 2 x allocation count = 2
        assert!(p.place(&allocations[0], 0).unwrap().is_none());
        assert!(p.place(&allocations[0], 0).unwrap().is_none());
        assert!(matches!(
            p.place(&allocations[0], 0),
            Err(PlanError::AttemptsExceeded { .. })
        ));
    }

    #[test]
    fn test_hard_violations_never_committed() {
        // One lecturer, two modules, identical single-start windows and
        // two venues: every candidate for the second module overlaps the
        // first (lecturer conflict) and nothing can move out of the way.
        // The second placement must fail rather than double-book.
        let a = make_alloc(1, 7).with_window(480, 600);
        let b = make_alloc(2, 7).with_window(480, 600).with_module("MA201");
        let mut allocations = vec![a, b];
        for id in 3..=6 {
            allocations.push(make_alloc(id, 100 + id));
        }
        let venues = vec![
            Venue::new(1, 1, 80).with_schools(vec![1]),
            Venue::new(2, 1, 80).with_schools(vec![1]),
        ];
        let mut p = placer(&allocations, &venues, 42);

        assert!(p.place(&allocations[0], 0).unwrap().is_some());
        assert_eq!(p.place(&allocations[1], 0).unwrap(), None);

        // Exactly one slot exists and lecturer 7 holds no overlapping pair
        assert_eq!(p.state.placed_count(), 1);
        assert_eq!(p.state.iter_slots().count(), 1);
        assert_eq!(p.state.placement(2), None);
    }
}
