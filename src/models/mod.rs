//! Planning domain models.
//!
//! Input records (`Allocation`, `Venue`) are immutable snapshots supplied
//! by the surrounding service; output records (`TermPlan`, `PlannedSlot`)
//! are what the persistence layer stores when it replaces a term's slot
//! set. The planner's own mutable state lives in `crate::planner`, not
//! here.

mod allocation;
mod plan;
mod time;
mod venue;

pub use allocation::Allocation;
pub use plan::{PlanWarning, PlannedSlot, TermPlan, WarningKind};
pub use time::{TimeWindow, Weekday, WEEKDAYS};
pub use venue::Venue;
