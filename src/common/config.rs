use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::{
    error::BazaarError,
    types::{Commodity, CommodityTable, ParticipantId, StockTable},
};

/// How a proposer picks among several peers accepting the same proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Uniform random choice among every Accept received in the response window.
    Random,
    /// Commit to the first Accept in arrival order.
    FirstArrival,
}

/// Which side of an accepted trade moves stock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// Proposer confirms the chosen acceptor, both sides commit mirrored changes.
    Bilateral,
    /// Only the proposer updates its own stock.
    ProposerOnly,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommodityProfile {
    pub initial_price: u32,
    pub price_floor: u32,
    pub initial_stock: u32,
    /// Per participant, scaled by the market factor.
    pub scarcity_threshold: u32,
    /// Per participant, scaled by the market factor.
    pub glut_threshold: u32,
    /// Divided by the market factor before it is added.
    pub scarcity_bump: u32,
    pub glut_drop: u32,
}

impl CommodityProfile {
    pub fn default_for(commodity: Commodity) -> Self {
        let (initial_price, price_floor, initial_stock, scarcity_bump, glut_drop) = match commodity
        {
            Commodity::Cravinho => (20, 5, 10, 10, 4),
            Commodity::Cinnamon => (5, 2, 15, 10, 1),
            Commodity::Nutmeg => (15, 5, 20, 10, 3),
            Commodity::Cardamom => (10, 3, 12, 5, 2),
        };
        Self {
            initial_price,
            price_floor,
            initial_stock,
            scarcity_threshold: initial_stock,
            glut_threshold: initial_stock * 2,
            scarcity_bump,
            glut_drop,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraderProfile {
    pub name: ParticipantId,
    pub risk: f64,
    #[serde(default)]
    pub initial_stock: Option<StockTable>,
}

impl TraderProfile {
    pub fn new(name: impl Into<ParticipantId>, risk: f64) -> Self {
        Self {
            name: name.into(),
            risk,
            initial_stock: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BazaarConfig {
    pub total_rounds: u32,
    pub capability: String,
    pub coordinator_name: ParticipantId,
    pub ack_timeout_ms: u64,
    pub stock_timeout_ms: u64,
    pub sale_timeout_ms: u64,
    pub negotiation_timeout_ms: u64,
    pub tie_break: TieBreak,
    pub settlement: Settlement,
    pub sultan_tax_factor: f64,
    pub trade_route_factor: f64,
    pub event_seed: Option<u64>,
    pub commodities: CommodityTable<CommodityProfile>,
    pub traders: Vec<TraderProfile>,
}

impl Default for BazaarConfig {
    fn default() -> Self {
        Self {
            total_rounds: 15,
            capability: "market".to_string(),
            coordinator_name: ParticipantId::from("baz"),
            ack_timeout_ms: 2_000,
            stock_timeout_ms: 5_000,
            sale_timeout_ms: 30_000,
            negotiation_timeout_ms: 10_000,
            tie_break: TieBreak::Random,
            settlement: Settlement::Bilateral,
            sultan_tax_factor: 0.9,
            trade_route_factor: 0.8,
            event_seed: None,
            commodities: CommodityTable::from_fn(CommodityProfile::default_for),
            traders: vec![
                TraderProfile::new("m1", 0.1),
                TraderProfile::new("m2", 0.5),
                TraderProfile::new("m3", 0.9),
            ],
        }
    }
}

impl BazaarConfig {
    pub fn from_json_str(json: &str) -> Result<Self, BazaarError> {
        let config: BazaarConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BazaarError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), BazaarError> {
        if self.total_rounds == 0 {
            return Err(BazaarError::Simple(
                "total_rounds must be at least 1".to_string(),
            ));
        }

        for commodity in Commodity::iter() {
            let profile = &self.commodities[commodity];
            if profile.price_floor == 0 || profile.price_floor > profile.initial_price {
                return Err(BazaarError::Simple(format!(
                    "{} price floor {} must be positive and not above initial price {}",
                    commodity, profile.price_floor, profile.initial_price
                )));
            }
        }

        for trader in self.traders.iter() {
            if !(0.0..=1.0).contains(&trader.risk) {
                return Err(BazaarError::Simple(format!(
                    "Trader {} risk factor {} outside [0, 1]",
                    trader.name, trader.risk
                )));
            }
            if trader.name == self.coordinator_name {
                return Err(BazaarError::Simple(format!(
                    "Trader name {} clashes with the coordinator",
                    trader.name
                )));
            }
        }
        Ok(())
    }

    pub fn initial_prices(&self) -> CommodityTable<u32> {
        self.commodities.map(|_, profile| profile.initial_price)
    }

    pub fn initial_stock(&self) -> StockTable {
        self.commodities.map(|_, profile| profile.initial_stock)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn stock_timeout(&self) -> Duration {
        Duration::from_millis(self.stock_timeout_ms)
    }

    pub fn sale_timeout(&self) -> Duration {
        Duration::from_millis(self.sale_timeout_ms)
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }
}
