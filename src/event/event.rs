use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, IntoStaticStr};
use tracing::warn;

use crate::common::types::Commodity;

/// Market perturbation drawn once per round by the coordinator.
#[derive(
    Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default, Display, IntoStaticStr,
)]
pub enum RoundEvent {
    #[default]
    None,
    Storm(Commodity),
    SultanTax,
    TradeRoute(Commodity),
}

const STORM_PREFIX: &str = "A storm destroyed";
const SULTAN_TAX_PREFIX: &str = "The Sultan has imposed a new tax";
const TRADE_ROUTE_PREFIX: &str = "A new trade route";

impl RoundEvent {
    pub fn target(&self) -> Option<Commodity> {
        match self {
            RoundEvent::Storm(commodity) | RoundEvent::TradeRoute(commodity) => Some(*commodity),
            RoundEvent::None | RoundEvent::SultanTax => None,
        }
    }

    /// Free text form carried in the `EVENT,` field of the price broadcast.
    pub fn describe(&self) -> String {
        match self {
            RoundEvent::None => "The market is calm".to_string(),
            RoundEvent::Storm(commodity) => {
                format!("{} {} crops across the region", STORM_PREFIX, commodity)
            }
            RoundEvent::SultanTax => format!("{} on all spices", SULTAN_TAX_PREFIX),
            RoundEvent::TradeRoute(commodity) => format!(
                "{} has opened, lowering the {} price",
                TRADE_ROUTE_PREFIX, commodity
            ),
        }
    }

    /// Decodes a description by its leading phrase. A targeted event whose
    /// commodity cannot be found, and any unknown text, decode to `None`.
    pub fn from_description(description: &str) -> RoundEvent {
        let description = description.trim();

        if description.starts_with(SULTAN_TAX_PREFIX) {
            return RoundEvent::SultanTax;
        }

        let targeted: Option<fn(Commodity) -> RoundEvent> =
            if description.starts_with(STORM_PREFIX) {
                Some(RoundEvent::Storm)
            } else if description.starts_with(TRADE_ROUTE_PREFIX) {
                Some(RoundEvent::TradeRoute)
            } else {
                None
            };

        let Some(targeted) = targeted else {
            return RoundEvent::None;
        };

        let target = description
            .split(|c: char| !c.is_alphanumeric())
            .find_map(|word| Commodity::iter().find(|commodity| word == <&'static str>::from(*commodity)));

        match target {
            Some(commodity) => targeted(commodity),
            None => {
                warn!("Event description '{}' names no known commodity", description);
                RoundEvent::None
            }
        }
    }
}
