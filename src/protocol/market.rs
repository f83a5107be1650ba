use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::{
    error::BazaarError,
    types::{Commodity, ParticipantId, PriceTable},
};
use crate::event::RoundEvent;

pub const STOCK_REQUEST: &str = "STOCK";
pub const ACK: &str = "ACK";
pub const HOLD: &str = "HOLD";

const TOTAL_ROUNDS_KEY: &str = "TOTAL_ROUNDS";
const CURRENT_ROUND_KEY: &str = "CURRENT_ROUND";
const PRICES_TAG: &str = "PRICES,";
const EVENT_TAG: &str = "EVENT,";
const PEERS_TAG: &str = "PEERS,";

/// Round bookkeeping pushed from the coordinator and acknowledged with `ACK`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundNotice {
    TotalRounds(u32),
    CurrentRound(u32),
}

impl fmt::Display for RoundNotice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RoundNotice::TotalRounds(total) => write!(f, "{}={}", TOTAL_ROUNDS_KEY, total),
            RoundNotice::CurrentRound(round) => write!(f, "{}={}", CURRENT_ROUND_KEY, round),
        }
    }
}

impl FromStr for RoundNotice {
    type Err = BazaarError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let Some((key, value)) = content.split_once('=') else {
            return Err(BazaarError::malformed(content, "expected KEY=value"));
        };
        let value: u32 = value
            .trim()
            .parse()
            .map_err(|error: std::num::ParseIntError| BazaarError::malformed(content, error.to_string()))?;

        match key.trim() {
            TOTAL_ROUNDS_KEY => Ok(RoundNotice::TotalRounds(value)),
            CURRENT_ROUND_KEY => Ok(RoundNotice::CurrentRound(value)),
            other => Err(BazaarError::malformed(
                content,
                format!("unknown round key {}", other),
            )),
        }
    }
}

/// The per round broadcast: canonical prices, the event drawn for the next
/// round and, optionally, the roster traders negotiate with.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceUpdate {
    pub prices: PriceTable,
    pub event: RoundEvent,
    pub peers: Option<Vec<ParticipantId>>,
}

impl fmt::Display for PriceUpdate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}|{}{}",
            PRICES_TAG,
            self.prices,
            EVENT_TAG,
            self.event.describe()
        )?;
        if let Some(peers) = &self.peers {
            let peers: Vec<&str> = peers.iter().map(|peer| peer.as_str()).collect();
            write!(f, "|{}{}", PEERS_TAG, peers.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for PriceUpdate {
    type Err = BazaarError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let mut segments = content.split('|');

        let prices = match segments.next().and_then(|s| s.trim().strip_prefix(PRICES_TAG)) {
            Some(prices) => PriceTable::from_str(prices)
                .map_err(|error| BazaarError::malformed(content, error.to_string()))?,
            None => return Err(BazaarError::malformed(content, "missing PRICES segment")),
        };

        let event = match segments.next().and_then(|s| s.trim().strip_prefix(EVENT_TAG)) {
            Some(description) => RoundEvent::from_description(description),
            None => return Err(BazaarError::malformed(content, "missing EVENT segment")),
        };

        let peers = match segments.next() {
            Some(segment) => match segment.trim().strip_prefix(PEERS_TAG) {
                Some(list) => Some(
                    list.split(',')
                        .map(str::trim)
                        .filter(|peer| !peer.is_empty())
                        .map(ParticipantId::from)
                        .collect(),
                ),
                None => return Err(BazaarError::malformed(content, "unknown trailing segment")),
            },
            None => None,
        };

        Ok(PriceUpdate {
            prices,
            event,
            peers,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub commodity: Commodity,
    pub quantity: u32,
    pub proceeds: u64,
}

/// What a trader sells to the market at the end of a round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleDecision {
    Hold,
    Sell(Vec<SaleLine>),
}

impl SaleDecision {
    pub fn proceeds(&self) -> u64 {
        match self {
            SaleDecision::Hold => 0,
            SaleDecision::Sell(lines) => lines.iter().map(|line| line.proceeds).sum(),
        }
    }

    pub fn lines(&self) -> &[SaleLine] {
        match self {
            SaleDecision::Hold => &[],
            SaleDecision::Sell(lines) => lines,
        }
    }
}

impl fmt::Display for SaleDecision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SaleDecision::Hold => write!(f, "{}", HOLD),
            SaleDecision::Sell(lines) => {
                let lines: Vec<String> = lines
                    .iter()
                    .map(|line| format!("{},{},{}", line.commodity, line.quantity, line.proceeds))
                    .collect();
                write!(f, "{}", lines.join(";"))
            }
        }
    }
}

impl FromStr for SaleDecision {
    type Err = BazaarError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let content = content.trim();
        if content == HOLD {
            return Ok(SaleDecision::Hold);
        }

        let mut lines = Vec::new();
        for line in content.split(';').filter(|line| !line.trim().is_empty()) {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [commodity, quantity, proceeds] = fields.as_slice() else {
                return Err(BazaarError::malformed(
                    content,
                    format!("sale line '{}' needs 3 fields", line),
                ));
            };
            let malformed = |reason: String| BazaarError::malformed(content, reason);
            lines.push(SaleLine {
                commodity: Commodity::from_str(commodity).map_err(|e| malformed(e.to_string()))?,
                quantity: quantity.parse().map_err(|e: std::num::ParseIntError| malformed(e.to_string()))?,
                proceeds: proceeds.parse().map_err(|e: std::num::ParseIntError| malformed(e.to_string()))?,
            });
        }

        if lines.is_empty() {
            return Err(BazaarError::malformed(content, "no sale lines"));
        }
        Ok(SaleDecision::Sell(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_notice_wire() {
        assert_eq!(RoundNotice::TotalRounds(15).to_string(), "TOTAL_ROUNDS=15");
        assert_eq!(
            RoundNotice::from_str("CURRENT_ROUND=3").unwrap(),
            RoundNotice::CurrentRound(3)
        );
        assert!(RoundNotice::from_str("CURRENT_ROUND").is_err());
        assert!(RoundNotice::from_str("CURRENT_ROUND=x").is_err());
        assert!(RoundNotice::from_str("NEXT_ROUND=1").is_err());
    }

    #[test]
    fn test_price_update_reference_layout() {
        let update = PriceUpdate {
            prices: PriceTable::new([20, 5, 15, 10]),
            event: RoundEvent::TradeRoute(Commodity::Nutmeg),
            peers: None,
        };
        let wire = update.to_string();
        assert_eq!(
            wire,
            "PRICES,20,5,15,10|EVENT,A new trade route has opened, lowering the Nutmeg price"
        );
        assert_eq!(PriceUpdate::from_str(&wire).unwrap(), update);
    }

    #[test]
    fn test_price_update_with_peers() {
        let update = PriceUpdate::from_str("PRICES,1,2,3,4|EVENT,The market is calm|PEERS,m1,m3")
            .unwrap();
        assert_eq!(update.event, RoundEvent::None);
        assert_eq!(
            update.peers,
            Some(vec![ParticipantId::from("m1"), ParticipantId::from("m3")])
        );

        let empty = PriceUpdate::from_str("PRICES,1,2,3,4|EVENT,calm|PEERS,").unwrap();
        assert_eq!(empty.peers, Some(vec![]));
    }

    #[test]
    fn test_price_update_malformed() {
        assert!(PriceUpdate::from_str("PRICES,1,2,3|EVENT,calm").is_err());
        assert!(PriceUpdate::from_str("PRICES,1,2,3,4").is_err());
        assert!(PriceUpdate::from_str("1,2,3,4|EVENT,calm").is_err());
        assert!(PriceUpdate::from_str("PRICES,1,2,3,4|EVENT,calm|BOGUS").is_err());
    }

    #[test]
    fn test_sale_decision_wire() {
        let decision = SaleDecision::Sell(vec![
            SaleLine {
                commodity: Commodity::Cravinho,
                quantity: 5,
                proceeds: 100,
            },
            SaleLine {
                commodity: Commodity::Cardamom,
                quantity: 2,
                proceeds: 20,
            },
        ]);
        assert_eq!(decision.to_string(), "Cravinho,5,100;Cardamom,2,20");
        assert_eq!(decision.proceeds(), 120);
        assert_eq!(SaleDecision::from_str("Cravinho,5,100;Cardamom,2,20;").unwrap(), decision);
        assert_eq!(SaleDecision::from_str("HOLD").unwrap(), SaleDecision::Hold);
        assert_eq!(SaleDecision::Hold.proceeds(), 0);
    }

    #[test]
    fn test_sale_decision_malformed() {
        assert!(SaleDecision::from_str("").is_err());
        assert!(SaleDecision::from_str("Saffron,1,2").is_err());
        assert!(SaleDecision::from_str("Nutmeg,1").is_err());
        assert!(SaleDecision::from_str("Nutmeg,1,-4").is_err());
    }
}
