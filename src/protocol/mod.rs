//! Content strings exchanged between the coordinator and traders, and among
//! traders while negotiating. Every type encodes with `Display` and decodes
//! with `FromStr`, failing with `BazaarError::MalformedMessage`.

mod market;
mod trade;

pub use market::{PriceUpdate, RoundNotice, SaleDecision, SaleLine, ACK, HOLD, STOCK_REQUEST};
pub use trade::{ProposalContent, SettlementNotice, TradeProposal, TradeTerms, NO_TRADE, RELEASE};
