//! Mutable planning state.
//!
//! One slot arena is the single source of truth; every other view
//! (per-venue-day, per-lecturer-day, per-class-group-day, venue load,
//! placement map, placement order) is an index over arena handles,
//! maintained on every mutation. Rollback replays an undo log of exact
//! mutations in reverse, so backtracking never copies the whole state.
//!
//! Invariant: a handle stored in any index resolves in the arena. A
//! lookup that fails raises `PlanError::StateOutOfSync`, which signals an
//! engine defect rather than bad input.

use std::collections::HashMap;

use crate::error::{PlanError, PlanResult};
use crate::models::{Allocation, Weekday};

/// Handle into the slot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u32);

/// Key of the per-class index: class id, group key, day.
///
/// A `None` group key is a class-wide entry.
type ClassDayKey = (i64, Option<String>, Weekday);

/// A slot under construction.
///
/// Grown when compatible allocations merge into it; removed from the
/// arena only when its last member is evicted during rollback.
#[derive(Debug, Clone)]
pub struct Slot {
    /// Hosting venue.
    pub venue_id: i64,
    /// Day of week.
    pub day: Weekday,
    /// Start (minute of day, inclusive).
    pub start_min: i32,
    /// End (minute of day, exclusive).
    pub end_min: i32,
    /// Accumulated headcount.
    pub headcount: i32,
    /// Module code shared by all members.
    pub module_code: String,
    /// Class type shared by all members.
    pub class_type: String,
    /// Member allocations, in placement order.
    pub allocation_ids: Vec<i64>,
    /// Distinct member lecturers.
    pub lecturer_ids: Vec<i64>,
    /// Distinct member class ids.
    pub class_ids: Vec<i64>,
}

impl Slot {
    /// Slot duration in minutes.
    #[inline]
    pub fn duration_min(&self) -> i32 {
        self.end_min - self.start_min
    }
}

/// Inverse record of one state mutation.
#[derive(Debug)]
enum UndoOp {
    /// An allocation was placed; `detach` is the inverse.
    Place { allocation_id: i64 },
    /// An allocation was evicted; re-attach is the inverse.
    Evict {
        slot: SlotId,
        allocation_id: i64,
        member_pos: usize,
        order_pos: usize,
        /// The whole slot, when evicting its last member removed it.
        removed: Option<Box<Slot>>,
    },
}

/// Record returned by `detach`, mirroring `UndoOp::Evict`.
struct Detached {
    slot: SlotId,
    member_pos: usize,
    order_pos: usize,
    removed: Option<Box<Slot>>,
}

/// The mutable index of slots and views for one planning run.
pub struct PlanState<'a> {
    allocations: HashMap<i64, &'a Allocation>,
    slots: HashMap<SlotId, Slot>,
    next_slot: u32,
    /// Slots per (venue, day), ordered by start time for gap search.
    by_venue_day: HashMap<(i64, Weekday), Vec<SlotId>>,
    /// Slots per (lecturer, day).
    by_lecturer_day: HashMap<(i64, Weekday), Vec<SlotId>>,
    /// Slots per (class, group, day).
    by_class_day: HashMap<ClassDayKey, Vec<SlotId>>,
    /// Group keys ever seen per class. Grow-only: stale keys resolve to
    /// empty lists after rollback, which reads the same as absent.
    class_groups: HashMap<i64, Vec<Option<String>>>,
    /// Planned slot count per venue.
    venue_load: HashMap<i64, usize>,
    /// Allocation -> hosting slot.
    placements: HashMap<i64, SlotId>,
    /// Chronological placement order, for the reallocator window.
    placed_order: Vec<i64>,
    undo_log: Vec<UndoOp>,
}

impl<'a> PlanState<'a> {
    /// Creates an empty state over the allocation snapshot.
    pub fn new(allocations: &'a [Allocation]) -> Self {
        Self {
            allocations: allocations.iter().map(|a| (a.id, a)).collect(),
            slots: HashMap::new(),
            next_slot: 0,
            by_venue_day: HashMap::new(),
            by_lecturer_day: HashMap::new(),
            by_class_day: HashMap::new(),
            class_groups: HashMap::new(),
            venue_load: HashMap::new(),
            placements: HashMap::new(),
            placed_order: Vec::new(),
            undo_log: Vec::new(),
        }
    }

    fn out_of_sync(what: impl Into<String>) -> PlanError {
        PlanError::StateOutOfSync(what.into())
    }

    /// Resolves an allocation id.
    pub fn allocation(&self, id: i64) -> PlanResult<&'a Allocation> {
        self.allocations
            .get(&id)
            .copied()
            .ok_or_else(|| Self::out_of_sync(format!("unknown allocation {id}")))
    }

    /// Resolves a slot handle.
    pub fn slot(&self, id: SlotId) -> PlanResult<&Slot> {
        self.slots
            .get(&id)
            .ok_or_else(|| Self::out_of_sync(format!("slot handle {:?} not in arena", id)))
    }

    /// Slots in a (venue, day), ordered by start time.
    pub fn venue_day_slots(&self, venue_id: i64, day: Weekday) -> &[SlotId] {
        self.by_venue_day
            .get(&(venue_id, day))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Slots a lecturer holds on a day.
    pub fn lecturer_day_slots(&self, lecturer_id: i64, day: Weekday) -> &[SlotId] {
        self.by_lecturer_day
            .get(&(lecturer_id, day))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Slots of one (class, group) on a day. `None` = class-wide entries.
    pub fn class_day_slots(&self, class_id: i64, group: Option<&str>, day: Weekday) -> &[SlotId] {
        self.by_class_day
            .get(&(class_id, group.map(str::to_string), day))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Group keys ever seen for a class.
    pub fn class_group_keys(&self, class_id: i64) -> &[Option<String>] {
        self.class_groups
            .get(&class_id)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Planned slot count in a venue across the week.
    pub fn venue_load(&self, venue_id: i64) -> usize {
        self.venue_load.get(&venue_id).copied().unwrap_or(0)
    }

    /// Planned slot count in a (venue, day).
    pub fn day_load(&self, venue_id: i64, day: Weekday) -> usize {
        self.venue_day_slots(venue_id, day).len()
    }

    /// The slot hosting an allocation, if placed.
    pub fn placement(&self, allocation_id: i64) -> Option<SlotId> {
        self.placements.get(&allocation_id).copied()
    }

    /// Number of placed allocations.
    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    /// The `n` most recently placed allocations, newest first.
    pub fn recent_placements(&self, n: usize) -> Vec<i64> {
        self.placed_order.iter().rev().take(n).copied().collect()
    }

    /// Iterates all live slots.
    pub fn iter_slots(&self) -> impl Iterator<Item = (SlotId, &Slot)> {
        self.slots.iter().map(|(&id, slot)| (id, slot))
    }

    /// Marks the current undo-log position for a later rollback.
    pub fn checkpoint(&self) -> usize {
        self.undo_log.len()
    }

    /// Creates a new slot for an allocation and indexes it everywhere.
    pub fn place_new(
        &mut self,
        alloc: &Allocation,
        venue_id: i64,
        day: Weekday,
        start_min: i32,
    ) -> PlanResult<SlotId> {
        let id = SlotId(self.next_slot);
        self.next_slot += 1;

        let slot = Slot {
            venue_id,
            day,
            start_min,
            end_min: start_min + alloc.duration_min,
            headcount: alloc.headcount,
            module_code: alloc.module_code.clone(),
            class_type: alloc.class_type.clone(),
            allocation_ids: vec![alloc.id],
            lecturer_ids: vec![alloc.lecturer_id],
            class_ids: alloc.class_id.into_iter().collect(),
        };
        self.slots.insert(id, slot);

        self.insert_venue_day(venue_id, day, id, start_min);
        *self.venue_load.entry(venue_id).or_insert(0) += 1;
        self.by_lecturer_day
            .entry((alloc.lecturer_id, day))
            .or_default()
            .push(id);
        self.index_class_member(alloc, day, id);

        self.placements.insert(alloc.id, id);
        self.placed_order.push(alloc.id);
        self.undo_log.push(UndoOp::Place {
            allocation_id: alloc.id,
        });
        Ok(id)
    }

    /// Merges an allocation into an existing slot.
    pub fn place_merge(&mut self, alloc: &Allocation, id: SlotId) -> PlanResult<()> {
        let day = self.slot(id)?.day;
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or_else(|| Self::out_of_sync(format!("merge into missing slot {:?}", id)))?;

        slot.headcount += alloc.headcount;
        slot.allocation_ids.push(alloc.id);
        let new_lecturer = !slot.lecturer_ids.contains(&alloc.lecturer_id);
        if new_lecturer {
            slot.lecturer_ids.push(alloc.lecturer_id);
        }
        if let Some(class_id) = alloc.class_id {
            if !slot.class_ids.contains(&class_id) {
                slot.class_ids.push(class_id);
            }
        }
        if new_lecturer {
            self.by_lecturer_day
                .entry((alloc.lecturer_id, day))
                .or_default()
                .push(id);
        }
        self.index_class_member(alloc, day, id);

        self.placements.insert(alloc.id, id);
        self.placed_order.push(alloc.id);
        self.undo_log.push(UndoOp::Place {
            allocation_id: alloc.id,
        });
        Ok(())
    }

    /// Evicts a placed allocation, recording the inverse for rollback.
    ///
    /// Removing a slot's last member removes the slot from the arena and
    /// every index.
    pub fn evict(&mut self, allocation_id: i64) -> PlanResult<()> {
        let detached = self.detach(allocation_id)?;
        self.undo_log.push(UndoOp::Evict {
            slot: detached.slot,
            allocation_id,
            member_pos: detached.member_pos,
            order_pos: detached.order_pos,
            removed: detached.removed,
        });
        Ok(())
    }

    /// Rolls the state back to a checkpoint by undoing mutations in
    /// reverse order.
    pub fn rollback_to(&mut self, checkpoint: usize) -> PlanResult<()> {
        while self.undo_log.len() > checkpoint {
            let op = match self.undo_log.pop() {
                Some(op) => op,
                None => return Err(Self::out_of_sync("undo log underrun")),
            };
            match op {
                UndoOp::Place { allocation_id } => {
                    self.detach(allocation_id)?;
                }
                UndoOp::Evict {
                    slot,
                    allocation_id,
                    member_pos,
                    order_pos,
                    removed,
                } => {
                    self.reattach(slot, allocation_id, member_pos, order_pos, removed)?;
                }
            }
        }
        Ok(())
    }

    /// Removes an allocation from its slot and all indexes.
    fn detach(&mut self, allocation_id: i64) -> PlanResult<Detached> {
        let alloc = self.allocation(allocation_id)?;
        let id = self
            .placements
            .remove(&allocation_id)
            .ok_or_else(|| Self::out_of_sync(format!("allocation {allocation_id} not placed")))?;
        let order_pos = self
            .placed_order
            .iter()
            .rposition(|&a| a == allocation_id)
            .ok_or_else(|| Self::out_of_sync("placement order missing allocation"))?;
        self.placed_order.remove(order_pos);

        let slot_ref = self.slot(id)?;
        let member_pos = slot_ref
            .allocation_ids
            .iter()
            .position(|&a| a == allocation_id)
            .ok_or_else(|| Self::out_of_sync("slot does not list its member"))?;

        if slot_ref.allocation_ids.len() == 1 {
            // Last member: the slot goes with it.
            let slot = match self.slots.remove(&id) {
                Some(s) => s,
                None => return Err(Self::out_of_sync("slot vanished during eviction")),
            };
            if let Some(list) = self.by_venue_day.get_mut(&(slot.venue_id, slot.day)) {
                list.retain(|&s| s != id);
            }
            if let Some(load) = self.venue_load.get_mut(&slot.venue_id) {
                *load = load.saturating_sub(1);
            }
            for &lecturer_id in &slot.lecturer_ids {
                if let Some(list) = self.by_lecturer_day.get_mut(&(lecturer_id, slot.day)) {
                    list.retain(|&s| s != id);
                }
            }
            if let Some(class_id) = alloc.class_id {
                let key = (class_id, alloc.group.clone(), slot.day);
                if let Some(list) = self.by_class_day.get_mut(&key) {
                    list.retain(|&s| s != id);
                }
            }
            return Ok(Detached {
                slot: id,
                member_pos,
                order_pos,
                removed: Some(Box::new(slot)),
            });
        }

        // Other members remain: shrink the slot and drop index entries no
        // remaining member justifies.
        let remaining: Vec<&Allocation> = slot_ref
            .allocation_ids
            .iter()
            .filter(|&&a| a != allocation_id)
            .map(|&a| self.allocation(a))
            .collect::<PlanResult<_>>()?;
        let day = slot_ref.day;

        let keeps_lecturer = remaining
            .iter()
            .any(|m| m.lecturer_id == alloc.lecturer_id);
        let keeps_class = alloc
            .class_id
            .map(|c| remaining.iter().any(|m| m.class_id == Some(c)));
        let keeps_class_group = alloc.class_id.map(|c| {
            remaining
                .iter()
                .any(|m| m.class_id == Some(c) && m.group == alloc.group)
        });

        let slot = self
            .slots
            .get_mut(&id)
            .ok_or_else(|| Self::out_of_sync("slot vanished during eviction"))?;
        slot.allocation_ids.remove(member_pos);
        slot.headcount -= alloc.headcount;
        if !keeps_lecturer {
            slot.lecturer_ids.retain(|&l| l != alloc.lecturer_id);
            if let Some(list) = self.by_lecturer_day.get_mut(&(alloc.lecturer_id, day)) {
                list.retain(|&s| s != id);
            }
        }
        if let Some(class_id) = alloc.class_id {
            if keeps_class == Some(false) {
                if let Some(slot) = self.slots.get_mut(&id) {
                    slot.class_ids.retain(|&c| c != class_id);
                }
            }
            if keeps_class_group == Some(false) {
                let key = (class_id, alloc.group.clone(), day);
                if let Some(list) = self.by_class_day.get_mut(&key) {
                    list.retain(|&s| s != id);
                }
            }
        }

        Ok(Detached {
            slot: id,
            member_pos,
            order_pos,
            removed: None,
        })
    }

    /// Restores an evicted allocation (inverse of `detach`).
    fn reattach(
        &mut self,
        id: SlotId,
        allocation_id: i64,
        member_pos: usize,
        order_pos: usize,
        removed: Option<Box<Slot>>,
    ) -> PlanResult<()> {
        let alloc = self.allocation(allocation_id)?;

        if let Some(slot) = removed {
            // The eviction removed the whole slot: rebuild it verbatim.
            let start_min = slot.start_min;
            let venue_id = slot.venue_id;
            let day = slot.day;
            self.insert_venue_day(venue_id, day, id, start_min);
            *self.venue_load.entry(venue_id).or_insert(0) += 1;
            for &lecturer_id in &slot.lecturer_ids {
                self.by_lecturer_day
                    .entry((lecturer_id, day))
                    .or_default()
                    .push(id);
            }
            self.index_class_member(alloc, day, id);
            self.slots.insert(id, *slot);
        } else {
            let day = self.slot(id)?.day;
            let slot = self
                .slots
                .get_mut(&id)
                .ok_or_else(|| Self::out_of_sync("reattach into missing slot"))?;
            if member_pos > slot.allocation_ids.len() {
                return Err(Self::out_of_sync("reattach position out of range"));
            }
            slot.allocation_ids.insert(member_pos, allocation_id);
            slot.headcount += alloc.headcount;
            let new_lecturer = !slot.lecturer_ids.contains(&alloc.lecturer_id);
            if new_lecturer {
                slot.lecturer_ids.push(alloc.lecturer_id);
            }
            if let Some(class_id) = alloc.class_id {
                if !slot.class_ids.contains(&class_id) {
                    slot.class_ids.push(class_id);
                }
            }
            if new_lecturer {
                self.by_lecturer_day
                    .entry((alloc.lecturer_id, day))
                    .or_default()
                    .push(id);
            }
            self.index_class_member(alloc, day, id);
        }

        if order_pos > self.placed_order.len() {
            return Err(Self::out_of_sync("placement order position out of range"));
        }
        self.placements.insert(allocation_id, id);
        self.placed_order.insert(order_pos, allocation_id);
        Ok(())
    }

    /// Inserts into the per-(venue, day) list, keeping start-time order.
    fn insert_venue_day(&mut self, venue_id: i64, day: Weekday, id: SlotId, start_min: i32) {
        let slots = &self.slots;
        let list = self.by_venue_day.entry((venue_id, day)).or_default();
        let pos = list
            .iter()
            .position(|sid| slots.get(sid).is_some_and(|s| s.start_min > start_min))
            .unwrap_or(list.len());
        list.insert(pos, id);
    }

    /// Adds an allocation's class membership to the class indexes.
    fn index_class_member(&mut self, alloc: &Allocation, day: Weekday, id: SlotId) {
        if let Some(class_id) = alloc.class_id {
            let key = (class_id, alloc.group.clone(), day);
            let list = self.by_class_day.entry(key).or_default();
            if !list.contains(&id) {
                list.push(id);
            }
            let groups = self.class_groups.entry(class_id).or_default();
            if !groups.contains(&alloc.group) {
                groups.push(alloc.group.clone());
            }
        }
    }
}
