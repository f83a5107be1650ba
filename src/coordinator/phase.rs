use serde::Serialize;
use strum_macros::{Display, IntoStaticStr};

/// Where the coordinator stands within a round.
#[derive(Serialize, PartialEq, Eq, Clone, Copy, Debug, Display, IntoStaticStr)]
pub enum RoundPhase {
    AnnounceRound,
    CollectStock,
    AdjustPrices,
    DrawEvent,
    BroadcastUpdate,
    CollectSales,
    RoundDone,
    GameEnd,
}

impl RoundPhase {
    /// Successor of this phase once `rounds_done` rounds have completed.
    pub fn next(self, rounds_done: u32, total_rounds: u32) -> RoundPhase {
        match self {
            RoundPhase::AnnounceRound => RoundPhase::CollectStock,
            RoundPhase::CollectStock => RoundPhase::AdjustPrices,
            RoundPhase::AdjustPrices => RoundPhase::DrawEvent,
            RoundPhase::DrawEvent => RoundPhase::BroadcastUpdate,
            RoundPhase::BroadcastUpdate => RoundPhase::CollectSales,
            RoundPhase::CollectSales => RoundPhase::RoundDone,
            RoundPhase::RoundDone if rounds_done >= total_rounds => RoundPhase::GameEnd,
            RoundPhase::RoundDone => RoundPhase::AnnounceRound,
            RoundPhase::GameEnd => RoundPhase::GameEnd,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == RoundPhase::GameEnd
    }
}
