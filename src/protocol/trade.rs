use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::{
    error::BazaarError,
    types::{Commodity, ParticipantId},
};

pub const NO_TRADE: &str = "NO_TRADE";
pub const RELEASE: &str = "RELEASE";
const SETTLE_TAG: &str = "SETTLE,";

/// Spice for spice swap terms, seen from the proposer: it gives
/// `offered_qty` of `offered` and wants `requested_qty` of `requested`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTerms {
    pub offered: Commodity,
    pub offered_qty: u32,
    pub requested: Commodity,
    pub requested_qty: u32,
}

impl fmt::Display for TradeTerms {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.offered, self.offered_qty, self.requested, self.requested_qty
        )
    }
}

impl FromStr for TradeTerms {
    type Err = BazaarError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = content.split(',').map(str::trim).collect();
        let [offered, offered_qty, requested, requested_qty] = fields.as_slice() else {
            return Err(BazaarError::malformed(content, "trade terms need 4 fields"));
        };

        let malformed = |reason: String| BazaarError::malformed(content, reason);
        let terms = TradeTerms {
            offered: Commodity::from_str(offered).map_err(|e| malformed(e.to_string()))?,
            offered_qty: offered_qty
                .parse()
                .map_err(|e: std::num::ParseIntError| malformed(e.to_string()))?,
            requested: Commodity::from_str(requested).map_err(|e| malformed(e.to_string()))?,
            requested_qty: requested_qty
                .parse()
                .map_err(|e: std::num::ParseIntError| malformed(e.to_string()))?,
        };

        if terms.offered == terms.requested {
            return Err(malformed("offered and requested commodity match".to_string()));
        }
        if terms.offered_qty == 0 || terms.requested_qty == 0 {
            return Err(malformed("zero quantity".to_string()));
        }
        Ok(terms)
    }
}

/// Terms together with the peer that proposed them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeProposal {
    pub proposer: ParticipantId,
    pub terms: TradeTerms,
}

/// Content of a `Propose` envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposalContent {
    Offer(TradeTerms),
    NoTrade,
}

impl fmt::Display for ProposalContent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProposalContent::Offer(terms) => write!(f, "{}", terms),
            ProposalContent::NoTrade => write!(f, "{}", NO_TRADE),
        }
    }
}

impl FromStr for ProposalContent {
    type Err = BazaarError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        if content.trim() == NO_TRADE {
            Ok(ProposalContent::NoTrade)
        } else {
            Ok(ProposalContent::Offer(TradeTerms::from_str(content)?))
        }
    }
}

/// Sent by a proposer to peers that accepted: the chosen one settles, the
/// rest are released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementNotice {
    Settle(TradeTerms),
    Release,
}

impl fmt::Display for SettlementNotice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SettlementNotice::Settle(terms) => write!(f, "{}{}", SETTLE_TAG, terms),
            SettlementNotice::Release => write!(f, "{}", RELEASE),
        }
    }
}

impl FromStr for SettlementNotice {
    type Err = BazaarError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let content = content.trim();
        if content == RELEASE {
            return Ok(SettlementNotice::Release);
        }
        match content.strip_prefix(SETTLE_TAG) {
            Some(terms) => Ok(SettlementNotice::Settle(TradeTerms::from_str(terms)?)),
            None => Err(BazaarError::malformed(content, "expected SETTLE or RELEASE")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_wire() {
        let terms = TradeTerms {
            offered: Commodity::Nutmeg,
            offered_qty: 7,
            requested: Commodity::Cravinho,
            requested_qty: 4,
        };
        assert_eq!(terms.to_string(), "Nutmeg,7,Cravinho,4");
        assert_eq!(TradeTerms::from_str("Nutmeg, 7, Cravinho, 4").unwrap(), terms);
    }

    #[test]
    fn test_terms_rejects_nonsense() {
        assert!(TradeTerms::from_str("Nutmeg,7,Nutmeg,4").is_err());
        assert!(TradeTerms::from_str("Nutmeg,0,Cravinho,4").is_err());
        assert!(TradeTerms::from_str("Nutmeg,7,Cravinho").is_err());
        assert!(TradeTerms::from_str("Pepper,7,Cravinho,4").is_err());
    }

    #[test]
    fn test_no_trade_content() {
        assert_eq!(ProposalContent::NoTrade.to_string(), "NO_TRADE");
        assert_eq!(
            ProposalContent::from_str("NO_TRADE").unwrap(),
            ProposalContent::NoTrade
        );
        assert!(ProposalContent::from_str("NO TRADE").is_err());
    }

    #[test]
    fn test_settlement_wire() {
        let terms = TradeTerms::from_str("Cinnamon,6,Cardamom,3").unwrap();
        let settle = SettlementNotice::Settle(terms);
        assert_eq!(settle.to_string(), "SETTLE,Cinnamon,6,Cardamom,3");
        assert_eq!(SettlementNotice::from_str(&settle.to_string()).unwrap(), settle);
        assert_eq!(
            SettlementNotice::from_str("RELEASE").unwrap(),
            SettlementNotice::Release
        );
        assert!(SettlementNotice::from_str("SETTLE,").is_err());
    }
}
