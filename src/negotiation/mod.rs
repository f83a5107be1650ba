//! One-shot peer to peer trade negotiation run by each trader after the
//! round's price broadcast: propose, answer every peer, settle at most once.

mod session;
mod strategy;

pub use session::{
    is_negotiation_message, NegotiationOutcome, NegotiationSession, NegotiationSettings,
};
pub use strategy::{draft_proposal, is_acceptable, pick_counterparty};
