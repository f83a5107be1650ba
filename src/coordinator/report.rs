use serde::Serialize;

use crate::common::{
    error::BazaarError,
    types::{ParticipantId, PriceTable, StockTable},
};
use crate::event::RoundEvent;

/// What happened in one round, as seen by the coordinator.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoundRecord {
    /// 1-based, as announced to traders.
    pub round: u32,
    /// Sum of every valid stock reply this round.
    pub aggregate: StockTable,
    /// Prices broadcast after adjustment.
    pub prices: PriceTable,
    /// Drawn the round before, applied to this round's prices.
    pub event_applied: RoundEvent,
    /// Announced this round, applied next round.
    pub event_drawn: RoundEvent,
    /// Roster size once this round's non-responders were removed.
    pub roster_size: usize,
    pub removed: Vec<ParticipantId>,
    pub coins_credited: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameReport {
    pub rounds_played: u32,
    pub final_prices: PriceTable,
    /// Balances in order of first credit.
    pub wallets: Vec<(ParticipantId, u64)>,
    pub winner: Option<(ParticipantId, u64)>,
    pub roster: Vec<ParticipantId>,
    pub round_history: Vec<RoundRecord>,
}

impl GameReport {
    pub fn to_json(&self) -> Result<String, BazaarError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
