//! Placement ordering.
//!
//! Ranks allocations from most- to least-constrained so the hardest ones
//! are placed while the timetable is still empty. The comparator chain:
//!
//! 1. Constrainedness score, descending
//! 2. Flexibility (window x days - duration), ascending
//! 3. Headcount, descending
//! 4. Id, ascending (determinism)
//!
//! # Score Convention
//! Higher constrainedness = scheduled earlier, mirroring the
//! most-constrained-variable-first heuristic of CSP search.
//!
//! # Reference
//! Schaerf (1999), "A Survey of Automated Timetabling"

use std::cmp::Ordering;

use crate::models::Allocation;

/// How constrained an allocation is: higher = fewer viable placements.
///
/// Components: venue-type requirement (+10), tight window, i.e. window
/// within an hour of the duration (+5), up to +5 for fewer allowed days,
/// large headcount over 100 (+3).
pub fn constrainedness(allocation: &Allocation) -> i32 {
    let mut score = 0;
    if !allocation.required_venue_types.is_empty() {
        score += 10;
    }
    if allocation.window.duration_min() <= allocation.duration_min + 60 {
        score += 5;
    }
    score += (5 - allocation.allowed_days.len() as i32).max(0);
    if allocation.headcount > 100 {
        score += 3;
    }
    score
}

/// Placement freedom: the volume of the search space left after the
/// duration is spent. Smaller = less flexible = scheduled first.
pub fn flexibility(allocation: &Allocation) -> i64 {
    allocation.window.duration_min() as i64 * allocation.allowed_days.len() as i64
        - allocation.duration_min as i64
}

/// Compares two allocations for planning order.
pub fn compare(a: &Allocation, b: &Allocation) -> Ordering {
    constrainedness(b)
        .cmp(&constrainedness(a))
        .then_with(|| flexibility(a).cmp(&flexibility(b)))
        .then_with(|| b.headcount.cmp(&a.headcount))
        .then_with(|| a.id.cmp(&b.id))
}

/// Returns allocation indices in planning order (most constrained first).
pub fn plan_order(allocations: &[Allocation]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..allocations.len()).collect();
    indices.sort_by(|&a, &b| compare(&allocations[a], &allocations[b]));
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Weekday;

    fn base(id: i64) -> Allocation {
        Allocation::new(id, 10, 7, "CS101")
            .with_duration(120)
            .with_headcount(30)
            .with_schools(vec![1])
    }

    #[test]
    fn test_constrainedness_components() {
        // Default: 5-day week, 600-minute window, duration 120, headcount 30
        assert_eq!(constrainedness(&base(1)), 0);

        let typed = base(1).with_required_venue_type(3);
        assert_eq!(constrainedness(&typed), 10);

        // Window 150 <= 120 + 60 → tight
        let tight = base(1).with_window(480, 630);
        assert_eq!(constrainedness(&tight), 5);

        let two_days = base(1).with_days(vec![Weekday::Monday, Weekday::Tuesday]);
        assert_eq!(constrainedness(&two_days), 3);

        let large = base(1).with_headcount(150);
        assert_eq!(constrainedness(&large), 3);
    }

    #[test]
    fn test_flexibility() {
        // 600 * 5 - 120 = 2880
        assert_eq!(flexibility(&base(1)), 2880);
        let narrow = base(1).with_days(vec![Weekday::Monday]).with_window(480, 720);
        // 240 * 1 - 120 = 120
        assert_eq!(flexibility(&narrow), 120);
    }

    #[test]
    fn test_most_constrained_first() {
        let allocations = vec![
            base(1),
            base(2).with_required_venue_type(3),
            base(3).with_days(vec![Weekday::Monday]),
        ];
        let order = plan_order(&allocations);
        // Venue-type requirement (+10) beats few-days (+4)
        assert_eq!(allocations[order[0]].id, 2);
        assert_eq!(allocations[order[1]].id, 3);
        assert_eq!(allocations[order[2]].id, 1);
    }

    #[test]
    fn test_flexibility_breaks_constrainedness_ties() {
        let wide = base(1).with_window(480, 1080);
        let narrow = base(2).with_window(480, 840);
        assert_eq!(constrainedness(&wide), constrainedness(&narrow));
        let order = plan_order(&[wide, narrow]);
        // Narrower window = less flexible = first
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_headcount_then_id_break_remaining_ties() {
        let small = base(1).with_headcount(20);
        let big = base(2).with_headcount(90);
        let order = plan_order(&[small, big]);
        assert_eq!(order, vec![1, 0]);

        let twin_a = base(5);
        let twin_b = base(3);
        let order = plan_order(&[twin_a, twin_b]);
        // Identical scores → ascending id
        assert_eq!(order, vec![1, 0]);
    }
}
