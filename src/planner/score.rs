//! Placement cost function.
//!
//! Trades off time-of-day drift, venue and day load balancing, capacity
//! fit, slot reuse, and constraint violations. Lower cost is preferred;
//! the violation penalty is large enough that any violating candidate
//! ranks below every compliant one.

/// Reuse bonus granted to combinations.
const COMBINE_BONUS: f64 = 50.0;

/// Penalty per constraint violation.
const VIOLATION_PENALTY: f64 = 1000.0;

/// Scores one placement candidate. Lower is better.
///
/// `headcount` is the resulting slot total (post-merge for combinations),
/// so capacity fit reflects the slot as it would be committed.
#[allow(clippy::too_many_arguments)]
pub fn placement_cost(
    start_min: i32,
    day_start_min: i32,
    venue_load: usize,
    day_load: usize,
    capacity: i32,
    headcount: i32,
    combinable: bool,
    violation_count: usize,
) -> f64 {
    let drift = (start_min - day_start_min).max(0) as f64;
    let load = 10.0 * venue_load as f64 + 3.0 * day_load as f64;
    let fit = 30.0 * (capacity - headcount).abs() as f64 / capacity as f64;
    let reuse = if combinable { -COMBINE_BONUS } else { 0.0 };
    let penalty = VIOLATION_PENALTY * violation_count as f64;
    drift + load + fit + reuse + penalty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_earlier_start_is_cheaper() {
        let early = placement_cost(480, 480, 0, 0, 100, 50, false, 0);
        let late = placement_cost(600, 480, 0, 0, 100, 50, false, 0);
        assert!(early < late);
        // Starts before the day start incur no negative drift
        let before = placement_cost(420, 480, 0, 0, 100, 50, false, 0);
        assert!((before - early).abs() < 1e-10);
    }

    #[test]
    fn test_loaded_venue_is_dearer() {
        let empty = placement_cost(480, 480, 0, 0, 100, 50, false, 0);
        let loaded = placement_cost(480, 480, 3, 2, 100, 50, false, 0);
        // 10*3 + 3*2 = 36
        assert!((loaded - empty - 36.0).abs() < 1e-10);
    }

    #[test]
    fn test_tight_capacity_fit_wins() {
        let snug = placement_cost(480, 480, 0, 0, 60, 50, false, 0);
        let oversized = placement_cost(480, 480, 0, 0, 300, 50, false, 0);
        assert!(snug < oversized);
    }

    #[test]
    fn test_combination_bonus() {
        let fresh = placement_cost(480, 480, 0, 0, 100, 50, false, 0);
        let merged = placement_cost(480, 480, 0, 0, 100, 50, true, 0);
        assert!((fresh - merged - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_violations_dominate() {
        // A violating candidate never beats a compliant one
        let bad = placement_cost(480, 480, 0, 0, 100, 100, true, 1);
        let good = placement_cost(1020, 480, 5, 5, 1000, 10, false, 0);
        assert!(good < bad);
    }
}
