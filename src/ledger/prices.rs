use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::debug;

use crate::common::{
    config::{BazaarConfig, CommodityProfile},
    types::{Commodity, CommodityTable, PriceTable, StockTable},
};
use crate::event::RoundEvent;

/// Canonical prices and the current round's aggregate stock.
///
/// Every adjustment returns a new ledger; nothing is changed in place.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommodityLedger {
    profiles: CommodityTable<CommodityProfile>,
    prices: PriceTable,
    aggregate: StockTable,
    sultan_tax_factor: f64,
    trade_route_factor: f64,
}

impl CommodityLedger {
    pub fn new(config: &BazaarConfig) -> Self {
        Self {
            profiles: config.commodities.clone(),
            prices: config.initial_prices(),
            aggregate: StockTable::default(),
            sultan_tax_factor: config.sultan_tax_factor,
            trade_route_factor: config.trade_route_factor,
        }
    }

    pub fn prices(&self) -> PriceTable {
        self.prices
    }

    pub fn price(&self, commodity: Commodity) -> u32 {
        self.prices[commodity]
    }

    pub fn floor(&self, commodity: Commodity) -> u32 {
        self.profiles[commodity].price_floor
    }

    pub fn aggregate(&self) -> StockTable {
        self.aggregate
    }

    pub fn with_prices(&self, prices: PriceTable) -> Self {
        let prices = prices.map(|commodity, price| (*price).max(self.floor(commodity)));
        Self {
            prices,
            ..self.clone()
        }
    }

    pub fn with_aggregate(&self, aggregate: StockTable) -> Self {
        Self {
            aggregate,
            ..self.clone()
        }
    }

    /// Applies the supply rule for this round's aggregate, then `event`.
    pub fn adjusted(&self, market_factor: usize, event: &RoundEvent) -> Self {
        let supplied = self.supply_adjusted(market_factor);
        let prices = supplied.event_adjusted(event);
        Self {
            prices,
            ..supplied
        }
    }

    fn supply_adjusted(&self, market_factor: usize) -> Self {
        if market_factor == 0 {
            debug!("CommodityLedger empty market, supply rule skipped");
            return self.clone();
        }

        let factor = market_factor as u32;
        let mut prices = self.prices;
        for commodity in Commodity::iter() {
            let profile = &self.profiles[commodity];
            let supply = self.aggregate[commodity];
            let price = self.prices[commodity];

            if supply < profile.scarcity_threshold.saturating_mul(factor) {
                let bump = profile.scarcity_bump / factor;
                prices[commodity] = price.saturating_add(bump);
                debug!(
                    "CommodityLedger {} scarce ({}), price {} -> {}",
                    commodity, supply, price, prices[commodity]
                );
            } else if supply > profile.glut_threshold.saturating_mul(factor) {
                prices[commodity] = price
                    .saturating_sub(profile.glut_drop)
                    .max(profile.price_floor);
                debug!(
                    "CommodityLedger {} glutted ({}), price {} -> {}",
                    commodity, supply, price, prices[commodity]
                );
            }
        }

        Self {
            prices,
            ..self.clone()
        }
    }

    fn event_adjusted(&self, event: &RoundEvent) -> PriceTable {
        match event {
            RoundEvent::SultanTax => self
                .prices
                .map(|commodity, price| self.scaled(commodity, *price, self.sultan_tax_factor)),
            RoundEvent::TradeRoute(target) => self.prices.map(|commodity, price| {
                if commodity == *target {
                    self.scaled(commodity, *price, self.trade_route_factor)
                } else {
                    *price
                }
            }),
            // Storms act on trader stock, the price follows through the supply rule.
            RoundEvent::Storm(_) | RoundEvent::None => self.prices,
        }
    }

    fn scaled(&self, commodity: Commodity, price: u32, factor: f64) -> u32 {
        let scaled = (price as f64 * factor).floor() as u32;
        scaled.max(self.floor(commodity))
    }
}
