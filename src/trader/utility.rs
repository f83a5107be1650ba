use strum::IntoEnumIterator;

use crate::common::types::{Commodity, PriceTable, StockTable};
use crate::event::RoundEvent;

const STORM_PRICE_RISE: f64 = 1.5;
const STORM_STOCK_LOSS: f64 = 0.5;
const TRADE_ROUTE_DISCOUNT: f64 = 0.8;
const SULTAN_TAX_DISCOUNT: f64 = 0.9;

/// A trader's scoring of selling now versus holding, for one snapshot of its
/// beliefs. `risk` near 0 favours liquidation, near 1 favours holding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UtilityModel {
    pub risk: f64,
    pub prices: PriceTable,
    pub event: RoundEvent,
    pub round: u32,
    pub total_rounds: u32,
}

impl UtilityModel {
    fn round_weight(&self) -> f64 {
        if self.total_rounds == 0 {
            0.0
        } else {
            self.round as f64 / self.total_rounds as f64
        }
    }

    pub fn expected_price(&self, commodity: Commodity) -> f64 {
        let price = self.prices[commodity] as f64;
        match self.event {
            RoundEvent::Storm(target) if target == commodity => {
                price * STORM_PRICE_RISE * STORM_STOCK_LOSS
            }
            RoundEvent::TradeRoute(target) if target == commodity => price * TRADE_ROUTE_DISCOUNT,
            RoundEvent::SultanTax => price * SULTAN_TAX_DISCOUNT,
            _ => price,
        }
    }

    pub fn utility_sell(&self, commodity: Commodity) -> f64 {
        let price = self.prices[commodity] as f64;
        let keep = 1.0 - self.risk;
        price * keep + self.round_weight() * self.expected_price(commodity) * keep
    }

    pub fn utility_hold(&self, commodity: Commodity) -> f64 {
        self.expected_price(commodity) * (1.0 + self.risk)
    }

    pub fn sell_fraction(&self, commodity: Commodity) -> f64 {
        let sell = self.utility_sell(commodity);
        let total = sell + self.utility_hold(commodity);
        if total > 0.0 {
            sell / total
        } else {
            0.0
        }
    }

    pub fn hold_fraction(&self, commodity: Commodity) -> f64 {
        let hold = self.utility_hold(commodity);
        let total = self.utility_sell(commodity) + hold;
        if total > 0.0 {
            hold / total
        } else {
            0.0
        }
    }

    pub fn quantity_to_sell(&self, commodity: Commodity, stock: u32) -> u32 {
        let quantity = (self.sell_fraction(commodity) * stock as f64).round() as u32;
        quantity.min(stock)
    }

    /// Units of `buy` asked per unit of `sell` given away.
    pub fn trade_ratio(&self, sell: Commodity, buy: Commodity) -> Option<f64> {
        let expected_buy = self.expected_price(buy);
        if expected_buy <= 0.0 {
            return None;
        }
        let base = self.expected_price(sell) / expected_buy;
        if self.risk < 0.5 {
            Some(base * (1.0 - self.risk))
        } else {
            Some(base * (1.0 + self.risk))
        }
    }

    /// Commodity with the highest sell fraction among those in stock.
    pub fn best_to_sell(&self, stock: &StockTable) -> Option<Commodity> {
        Self::argmax(
            Commodity::iter().filter(|commodity| stock[*commodity] > 0),
            |commodity| self.sell_fraction(commodity),
        )
    }

    /// Commodity other than `offered` with the highest hold fraction.
    pub fn best_to_hold(&self, offered: Commodity) -> Option<Commodity> {
        Self::argmax(
            Commodity::iter().filter(|commodity| *commodity != offered),
            |commodity| self.hold_fraction(commodity),
        )
    }

    // Earliest commodity wins ties.
    fn argmax(
        candidates: impl Iterator<Item = Commodity>,
        score: impl Fn(Commodity) -> f64,
    ) -> Option<Commodity> {
        let mut best: Option<(Commodity, f64)> = None;
        for commodity in candidates {
            let value = score(commodity);
            match best {
                Some((_, top)) if value <= top => {}
                _ => best = Some((commodity, value)),
            }
        }
        best.map(|(commodity, _)| commodity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(risk: f64, event: RoundEvent) -> UtilityModel {
        UtilityModel {
            risk,
            prices: PriceTable::new([20, 5, 15, 10]),
            event,
            round: 5,
            total_rounds: 10,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_expected_price_per_event() {
        let calm = model(0.5, RoundEvent::None);
        assert!(close(calm.expected_price(Commodity::Cravinho), 20.0));

        let storm = model(0.5, RoundEvent::Storm(Commodity::Cravinho));
        assert!(close(storm.expected_price(Commodity::Cravinho), 15.0));
        assert!(close(storm.expected_price(Commodity::Nutmeg), 15.0));

        let route = model(0.5, RoundEvent::TradeRoute(Commodity::Cardamom));
        assert!(close(route.expected_price(Commodity::Cardamom), 8.0));
        assert!(close(route.expected_price(Commodity::Cinnamon), 5.0));

        let tax = model(0.5, RoundEvent::SultanTax);
        assert!(close(tax.expected_price(Commodity::Nutmeg), 13.5));
    }

    #[test]
    fn test_utilities() {
        let calm = model(0.1, RoundEvent::None);
        // 20 * 0.9 + 0.5 * 20 * 0.9
        assert!(close(calm.utility_sell(Commodity::Cravinho), 27.0));
        // 20 * 1.1
        assert!(close(calm.utility_hold(Commodity::Cravinho), 22.0));
        assert!(close(calm.sell_fraction(Commodity::Cravinho), 27.0 / 49.0));
        assert!(close(
            calm.sell_fraction(Commodity::Cravinho) + calm.hold_fraction(Commodity::Cravinho),
            1.0
        ));
    }

    #[test]
    fn test_risk_shifts_towards_holding() {
        let cautious = model(0.1, RoundEvent::None);
        let bold = model(0.9, RoundEvent::None);
        for commodity in Commodity::iter() {
            assert!(cautious.sell_fraction(commodity) > bold.sell_fraction(commodity));
        }
        assert_eq!(cautious.quantity_to_sell(Commodity::Nutmeg, 20), 11);
        assert_eq!(bold.quantity_to_sell(Commodity::Nutmeg, 20), 1);
    }

    #[test]
    fn test_quantity_never_exceeds_stock() {
        let model = UtilityModel {
            risk: 0.0,
            ..model(0.0, RoundEvent::None)
        };
        for stock in 0..50 {
            assert!(model.quantity_to_sell(Commodity::Cinnamon, stock) <= stock);
        }
    }

    #[test]
    fn test_zero_prices_sell_nothing() {
        let model = UtilityModel {
            prices: PriceTable::default(),
            ..model(0.5, RoundEvent::None)
        };
        assert_eq!(model.sell_fraction(Commodity::Nutmeg), 0.0);
        assert_eq!(model.quantity_to_sell(Commodity::Nutmeg, 20), 0);
        assert_eq!(model.trade_ratio(Commodity::Nutmeg, Commodity::Cinnamon), None);
    }

    #[test]
    fn test_zero_total_rounds_has_no_round_weight() {
        let model = UtilityModel {
            total_rounds: 0,
            ..model(0.0, RoundEvent::None)
        };
        assert!(close(model.utility_sell(Commodity::Cravinho), 20.0));
    }

    #[test]
    fn test_trade_ratio_skew() {
        let cautious = model(0.2, RoundEvent::None);
        // 20 / 5 * 0.8
        assert!(close(
            cautious.trade_ratio(Commodity::Cravinho, Commodity::Cinnamon).unwrap(),
            3.2
        ));
        let bold = model(0.5, RoundEvent::None);
        // 5 / 20 * 1.5
        assert!(close(
            bold.trade_ratio(Commodity::Cinnamon, Commodity::Cravinho).unwrap(),
            0.375
        ));
    }

    #[test]
    fn test_best_to_sell_skips_empty_stock() {
        let model = model(0.5, RoundEvent::None);
        assert_eq!(model.best_to_sell(&StockTable::default()), None);
        let stock = StockTable::new([0, 0, 3, 0]);
        assert_eq!(model.best_to_sell(&stock), Some(Commodity::Nutmeg));
    }

    #[test]
    fn test_best_to_hold_excludes_offered() {
        // Calm market: every hold fraction is equal, the earliest other wins.
        let model = model(0.5, RoundEvent::None);
        assert_eq!(model.best_to_hold(Commodity::Cravinho), Some(Commodity::Cinnamon));
        assert_eq!(model.best_to_hold(Commodity::Cinnamon), Some(Commodity::Cravinho));

        // A trade route on Cravinho lowers its expected price and so its hold share.
        let route = UtilityModel {
            event: RoundEvent::TradeRoute(Commodity::Cravinho),
            ..model
        };
        assert_eq!(route.best_to_hold(Commodity::Cinnamon), Some(Commodity::Nutmeg));
    }
}
