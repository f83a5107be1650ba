mod holdings;
mod trader;
mod utility;

pub use holdings::Holdings;
pub use trader::{Trader, TraderAccess, TraderSnapshot};
pub use utility::UtilityModel;
