pub mod bazaar;
pub mod common;
pub mod comms;
pub mod coordinator;
pub mod event;
pub mod ledger;
pub mod negotiation;
pub mod protocol;
pub mod trader;

pub use bazaar::Bazaar;
