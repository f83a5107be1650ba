mod prices;
mod wallet;

pub use prices::CommodityLedger;
pub use wallet::WalletLedger;
