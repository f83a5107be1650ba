use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::debug;

use crate::common::types::{Commodity, StockTable};
use crate::event::RoundEvent;
use crate::protocol::{SaleDecision, SaleLine};

use super::utility::UtilityModel;

/// A trader's private stock and the storm it still has to suffer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Holdings {
    pub stock: StockTable,
    pub pending_storm: Option<Commodity>,
}

impl Holdings {
    pub fn new(stock: StockTable) -> Self {
        Self {
            stock,
            pending_storm: None,
        }
    }

    /// Remembers a storm announced with the round's prices. Other events
    /// leave stock alone.
    pub fn note_event(&mut self, event: &RoundEvent) {
        if let RoundEvent::Storm(target) = event {
            self.pending_storm = Some(*target);
        }
    }

    /// Halves the stormed commodity, rounding down, and clears the storm.
    /// Returns the target with its stock before and after.
    pub fn apply_storm_impact(&mut self) -> Option<(Commodity, u32, u32)> {
        let target = self.pending_storm.take()?;
        let before = self.stock[target];
        self.stock[target] = before / 2;
        debug!("Storm on {} cut stock {} -> {}", target, before, self.stock[target]);
        Some((target, before, self.stock[target]))
    }

    /// Sells the utility model's share of every commodity at the believed
    /// price, taking the sold quantities out of stock.
    pub fn decide_sale(&mut self, model: &UtilityModel) -> SaleDecision {
        let mut lines = Vec::new();
        for commodity in Commodity::iter() {
            let quantity = model.quantity_to_sell(commodity, self.stock[commodity]);
            if quantity == 0 {
                continue;
            }
            self.stock[commodity] -= quantity;
            lines.push(SaleLine {
                commodity,
                quantity,
                proceeds: quantity as u64 * model.prices[commodity] as u64,
            });
        }

        if lines.is_empty() {
            SaleDecision::Hold
        } else {
            SaleDecision::Sell(lines)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::PriceTable;

    fn model(risk: f64) -> UtilityModel {
        UtilityModel {
            risk,
            prices: PriceTable::new([20, 5, 15, 10]),
            event: RoundEvent::None,
            round: 1,
            total_rounds: 2,
        }
    }

    #[test]
    fn test_storm_halves_target_and_clears() {
        let mut holdings = Holdings::new(StockTable::new([10, 15, 20, 12]));
        holdings.note_event(&RoundEvent::Storm(Commodity::Cinnamon));
        assert_eq!(
            holdings.apply_storm_impact(),
            Some((Commodity::Cinnamon, 15, 7))
        );
        assert_eq!(holdings.stock, StockTable::new([10, 7, 20, 12]));
        assert_eq!(holdings.pending_storm, None);
        assert_eq!(holdings.apply_storm_impact(), None);
    }

    #[test]
    fn test_other_events_are_not_storms() {
        let mut holdings = Holdings::new(StockTable::new([1, 1, 1, 1]));
        holdings.note_event(&RoundEvent::SultanTax);
        holdings.note_event(&RoundEvent::TradeRoute(Commodity::Nutmeg));
        holdings.note_event(&RoundEvent::None);
        assert_eq!(holdings.apply_storm_impact(), None);
        assert_eq!(holdings.stock, StockTable::new([1, 1, 1, 1]));
    }

    #[test]
    fn test_storm_on_empty_stock() {
        let mut holdings = Holdings::default();
        holdings.note_event(&RoundEvent::Storm(Commodity::Nutmeg));
        assert_eq!(holdings.apply_storm_impact(), Some((Commodity::Nutmeg, 0, 0)));
    }

    #[test]
    fn test_sale_takes_from_stock() {
        let mut holdings = Holdings::new(StockTable::new([10, 15, 20, 12]));
        // sell fraction (0.9 + 0.45) / (1.35 + 1.1) = 27/49
        let decision = holdings.decide_sale(&model(0.1));
        let expected = vec![
            SaleLine {
                commodity: Commodity::Cravinho,
                quantity: 6,
                proceeds: 120,
            },
            SaleLine {
                commodity: Commodity::Cinnamon,
                quantity: 8,
                proceeds: 40,
            },
            SaleLine {
                commodity: Commodity::Nutmeg,
                quantity: 11,
                proceeds: 165,
            },
            SaleLine {
                commodity: Commodity::Cardamom,
                quantity: 7,
                proceeds: 70,
            },
        ];
        assert_eq!(decision, SaleDecision::Sell(expected));
        assert_eq!(decision.proceeds(), 395);
        assert_eq!(holdings.stock, StockTable::new([4, 7, 9, 5]));
    }

    #[test]
    fn test_repeated_sales_never_go_below_zero() {
        let mut holdings = Holdings::new(StockTable::new([3, 1, 0, 50]));
        for _ in 0..20 {
            let before = holdings.stock;
            let decision = holdings.decide_sale(&model(0.0));
            for line in decision.lines() {
                assert!(line.quantity <= before[line.commodity]);
            }
        }
        assert_eq!(holdings.decide_sale(&model(0.0)), SaleDecision::Hold);
    }

    #[test]
    fn test_nothing_to_sell_holds() {
        let mut holdings = Holdings::default();
        assert_eq!(holdings.decide_sale(&model(0.5)), SaleDecision::Hold);
    }
}
