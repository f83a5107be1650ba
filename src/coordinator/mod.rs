mod coordinator;
mod phase;
mod report;
mod roster;

pub use coordinator::{Coordinator, CoordinatorAccess, COORDINATOR_CAPABILITY};
pub use phase::RoundPhase;
pub use report::{GameReport, RoundRecord};
pub use roster::Roster;
