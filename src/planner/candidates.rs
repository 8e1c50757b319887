//! Candidate generation.
//!
//! For each eligible venue and allowed day, a placement candidate is
//! either the first combinable existing slot or one of the valid new
//! start times found by walking the free gaps between that day's slots.
//! New-slot starts snap to the configured grid; combinations are exempt
//! from constraint checks because a combinable slot already proves
//! compatibility.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::PlanResult;
use crate::models::{Allocation, Venue, Weekday};

use super::constraints::{check_placement, ViolationKind};
use super::score::placement_cost;
use super::state::{PlanState, SlotId};
use super::PlanConfig;

/// One possible placement for an allocation.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub venue_id: i64,
    pub day: Weekday,
    pub start_min: i32,
    pub end_min: i32,
    /// Existing slot to merge into, if this is a combination.
    pub merge_into: Option<SlotId>,
    pub violations: Vec<ViolationKind>,
    pub cost: f64,
}

impl Candidate {
    /// Whether the candidate violates nothing.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether every violation is a soft constraint.
    pub fn is_soft_only(&self) -> bool {
        !self.violations.is_empty() && self.violations.iter().all(|v| !v.is_hard())
    }

    /// Whether the only violation is the consecutive-run constraint.
    pub fn is_consecutive_only(&self) -> bool {
        !self.violations.is_empty()
            && self
                .violations
                .iter()
                .all(|v| *v == ViolationKind::ConsecutiveRun)
    }
}

/// Venues that can host the allocation, best capacity fit first.
///
/// Eligibility: headcount within the 110% capacity limit, venue type in
/// the required set (when one is given), and a school shared with the
/// lecturer. Ties on capacity fit are shuffled so equally good venues
/// rotate fairly between runs.
pub fn eligible_venues<'v, R: Rng>(
    alloc: &Allocation,
    venues: &'v [Venue],
    rng: &mut R,
) -> Vec<&'v Venue> {
    let mut eligible: Vec<&Venue> = venues
        .iter()
        .filter(|v| v.fits(alloc.headcount))
        .filter(|v| {
            alloc.required_venue_types.is_empty()
                || alloc.required_venue_types.contains(&v.venue_type_id)
        })
        .filter(|v| v.admits_schools(&alloc.lecturer_school_ids))
        .collect();

    let fit = |v: &Venue| (v.capacity - alloc.headcount).abs();
    eligible.sort_by_key(|v| fit(v));

    let mut i = 0;
    while i < eligible.len() {
        let key = fit(eligible[i]);
        let mut j = i + 1;
        while j < eligible.len() && fit(eligible[j]) == key {
            j += 1;
        }
        eligible[i..j].shuffle(rng);
        i = j;
    }
    eligible
}

/// Generates all placement candidates for an allocation.
///
/// Per (venue, day): the combinable slot when one exists, otherwise every
/// grid-aligned start inside the free gaps of the allocation's window.
pub fn generate(
    alloc: &Allocation,
    venues: &[&Venue],
    state: &PlanState<'_>,
    config: &PlanConfig,
) -> PlanResult<Vec<Candidate>> {
    let mut candidates = Vec::new();

    for venue in venues {
        for &day in &alloc.allowed_days {
            if let Some(sid) = find_combinable(alloc, venue, day, state)? {
                let slot = state.slot(sid)?;
                let cost = placement_cost(
                    slot.start_min,
                    config.day_start_min,
                    state.venue_load(venue.id),
                    state.day_load(venue.id, day),
                    venue.capacity,
                    slot.headcount + alloc.headcount,
                    true,
                    0,
                );
                candidates.push(Candidate {
                    venue_id: venue.id,
                    day,
                    start_min: slot.start_min,
                    end_min: slot.end_min,
                    merge_into: Some(sid),
                    violations: Vec::new(),
                    cost,
                });
                continue;
            }

            for start_min in new_start_times(alloc, venue.id, day, state, config)? {
                let end_min = start_min + alloc.duration_min;
                let violations = check_placement(
                    alloc,
                    venue.id,
                    day,
                    start_min,
                    end_min,
                    state,
                    config.max_slots_per_day,
                )?;
                let cost = placement_cost(
                    start_min,
                    config.day_start_min,
                    state.venue_load(venue.id),
                    state.day_load(venue.id, day),
                    venue.capacity,
                    alloc.headcount,
                    false,
                    violations.len(),
                );
                candidates.push(Candidate {
                    venue_id: venue.id,
                    day,
                    start_min,
                    end_min,
                    merge_into: None,
                    violations,
                    cost,
                });
            }
        }
    }

    Ok(candidates)
}

/// The first slot in (venue, day) the allocation can merge into.
///
/// Combinable: same module code and class type, already contains the
/// lecturer, equal duration, inside the allocation's window, and the
/// merged headcount stays within the capacity limit.
fn find_combinable(
    alloc: &Allocation,
    venue: &Venue,
    day: Weekday,
    state: &PlanState<'_>,
) -> PlanResult<Option<SlotId>> {
    for &sid in state.venue_day_slots(venue.id, day) {
        let slot = state.slot(sid)?;
        if slot.module_code == alloc.module_code
            && slot.class_type == alloc.class_type
            && slot.lecturer_ids.contains(&alloc.lecturer_id)
            && slot.duration_min() == alloc.duration_min
            && alloc.window.contains_interval(slot.start_min, slot.end_min)
            && venue.fits(slot.headcount + alloc.headcount)
        {
            return Ok(Some(sid));
        }
    }
    Ok(None)
}

/// Grid-aligned start times inside the free gaps of (venue, day),
/// clipped to the allocation's window.
fn new_start_times(
    alloc: &Allocation,
    venue_id: i64,
    day: Weekday,
    state: &PlanState<'_>,
    config: &PlanConfig,
) -> PlanResult<Vec<i32>> {
    let window = alloc.window;
    let duration = alloc.duration_min;
    let mut starts = Vec::new();

    let mut push_gap = |gap_start: i32, gap_end: i32, starts: &mut Vec<i32>| {
        let rem = (gap_start - config.day_start_min).rem_euclid(config.grid_step_min);
        let mut start = if rem == 0 {
            gap_start
        } else {
            gap_start + (config.grid_step_min - rem)
        };
        while start + duration <= gap_end {
            starts.push(start);
            start += config.grid_step_min;
        }
    };

    let mut cursor = window.start_min;
    for &sid in state.venue_day_slots(venue_id, day) {
        let slot = state.slot(sid)?;
        if slot.start_min > cursor {
            push_gap(cursor, slot.start_min.min(window.end_min), &mut starts);
        }
        cursor = cursor.max(slot.end_min);
        if cursor >= window.end_min {
            break;
        }
    }
    if cursor < window.end_min {
        push_gap(cursor, window.end_min, &mut starts);
    }

    Ok(starts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Weekday::Monday;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn make_alloc(id: i64) -> Allocation {
        Allocation::new(id, 10, 7, "CS101")
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

    #[test]
    fn test_venue_eligibility_filters() {
        let alloc = make_alloc(1).with_required_venue_type(2);
        let venues = vec![
            Venue::new(1, 2, 40).with_schools(vec![1]),  // Eligible
            Venue::new(2, 1, 40).with_schools(vec![1]),  // Wrong type
            Venue::new(3, 2, 20).with_schools(vec![1]),  // Too small: limit 22 < 30
            Venue::new(4, 2, 40).with_schools(vec![9]),  // Wrong school
        ];
        let mut rng = SmallRng::seed_from_u64(42);
        let eligible = eligible_venues(&alloc, &venues, &mut rng);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, 1);
    }

    #[test]
    fn test_capacity_overbooking_boundary() {
        // Limit floor(28 * 1.1) = 30 admits exactly 30
        let alloc = make_alloc(1);
        let venues = vec![Venue::new(1, 1, 28).with_schools(vec![1])];
        let mut rng = SmallRng::seed_from_u64(42);
        assert_eq!(eligible_venues(&alloc, &venues, &mut rng).len(), 1);

        let venues = vec![Venue::new(1, 1, 27).with_schools(vec![1])];
        assert!(eligible_venues(&alloc, &venues, &mut rng).is_empty());
    }

    #[test]
    fn test_best_capacity_fit_first() {
        let alloc = make_alloc(1);
        let venues = vec![
            Venue::new(1, 1, 200).with_schools(vec![1]),
            Venue::new(2, 1, 35).with_schools(vec![1]),
            Venue::new(3, 1, 80).with_schools(vec![1]),
        ];
        let mut rng = SmallRng::seed_from_u64(42);
        let eligible = eligible_venues(&alloc, &venues, &mut rng);
        assert_eq!(eligible[0].id, 2);
        assert_eq!(eligible[1].id, 3);
        assert_eq!(eligible[2].id, 1);
    }

    #[test]
    fn test_empty_day_enumerates_grid() {
        let alloc = make_alloc(1).with_window(480, 720);
        let state = PlanState::new(std::slice::from_ref(&alloc));
        let starts = new_start_times(&alloc, 1, Monday, &state, &config()).unwrap();
        // 120-minute duration in [480, 720): starts 480, 510, 540, 570, 600
        assert_eq!(starts, vec![480, 510, 540, 570, 600]);
    }

    #[test]
    fn test_gap_between_slots() {
        let allocations = vec![make_alloc(1), make_alloc(2).with_class_type("lab")];
        let mut state = PlanState::new(&allocations);
        // Occupy 09:00-11:00
        state.place_new(&allocations[0], 1, Monday, 540).unwrap();

        let probe = make_alloc(3).with_duration(60).with_window(480, 780);
        let starts = new_start_times(&probe, 1, Monday, &state, &config()).unwrap();
        // Gap [480, 540): start 480. Gap [660, 780): starts 660, 690, 720
        assert_eq!(starts, vec![480, 660, 690, 720]);
    }

    #[test]
    fn test_window_too_short_yields_nothing() {
        let alloc = make_alloc(1).with_duration(90).with_window(480, 540);
        let state = PlanState::new(std::slice::from_ref(&alloc));
        assert!(new_start_times(&alloc, 1, Monday, &state, &config())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_grid_alignment_inside_gap() {
        let alloc = make_alloc(1).with_duration(60).with_window(500, 720);
        let state = PlanState::new(std::slice::from_ref(&alloc));
        let starts = new_start_times(&alloc, 1, Monday, &state, &config()).unwrap();
        // Window opens at 08:20; first grid point is 08:30
        assert_eq!(starts, vec![510, 540, 570, 600, 630, 660]);
    }

    #[test]
    fn test_find_combinable() {
        let allocations = vec![make_alloc(1), make_alloc(2)];
        let venue = Venue::new(1, 1, 80).with_schools(vec![1]);
        let mut state = PlanState::new(&allocations);
        let sid = state.place_new(&allocations[0], 1, Monday, 540).unwrap();

        let found = find_combinable(&allocations[1], &venue, Monday, &state).unwrap();
        assert_eq!(found, Some(sid));
    }

    #[test]
    fn test_combinable_rejects_mismatches() {
        let allocations = vec![make_alloc(1)];
        let venue = Venue::new(1, 1, 80).with_schools(vec![1]);
        let mut state = PlanState::new(&allocations);
        state.place_new(&allocations[0], 1, Monday, 540).unwrap();

        // Different class type
        let tutorial = make_alloc(2).with_class_type("tutorial");
        assert!(find_combinable(&tutorial, &venue, Monday, &state)
            .unwrap()
            .is_none());

        // Different duration
        let shorter = make_alloc(3).with_duration(60);
        assert!(find_combinable(&shorter, &venue, Monday, &state)
            .unwrap()
            .is_none());

        // Slot outside the window
        let narrow = make_alloc(4).with_window(480, 600);
        assert!(find_combinable(&narrow, &venue, Monday, &state)
            .unwrap()
            .is_none());

        // Merged headcount over the limit: floor(50 * 1.1) = 55 < 30 + 30
        let small_venue = Venue::new(1, 1, 50).with_schools(vec![1]);
        assert!(find_combinable(&make_alloc(5), &small_venue, Monday, &state)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_generate_prefers_combination_per_venue_day() {
        let allocations = vec![make_alloc(1), make_alloc(2)];
        let venues = vec![Venue::new(1, 1, 80).with_schools(vec![1])];
        let mut state = PlanState::new(&allocations);
        state.place_new(&allocations[0], 1, Monday, 540).unwrap();

        let venue_refs: Vec<&Venue> = venues.iter().collect();
        let candidates = generate(&allocations[1], &venue_refs, &state, &config()).unwrap();
        // One combination candidate, no new-slot candidates for that day
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].merge_into.is_some());
        assert!(candidates[0].is_clean());
    }

    #[test]
    fn test_generate_scores_and_checks_new_slots() {
        let allocations = vec![make_alloc(1).with_class_type("lab"), make_alloc(2)];
        let venues = vec![Venue::new(1, 1, 40).with_schools(vec![1])];
        let mut state = PlanState::new(&allocations);
        state.place_new(&allocations[0], 1, Monday, 480).unwrap();

        let venue_refs: Vec<&Venue> = venues.iter().collect();
        let candidates = generate(&allocations[1], &venue_refs, &state, &config()).unwrap();
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.merge_into.is_none()));
        // All starts avoid the occupied 08:00-10:00 block
        assert!(candidates.iter().all(|c| c.start_min >= 600));
        // Later starts cost more
        let first = candidates
            .iter()
            .min_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap();
        assert_eq!(first.start_min, 600);
    }
}
