use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use crate::common::error::BazaarError;

pub const COMMODITY_COUNT: usize = 4;

/// The fixed set of goods traded at the bazaar. Declaration order is the wire
/// order of every comma separated quantity or price list.
#[derive(
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Clone,
    Copy,
    Debug,
    EnumString,
    EnumIter,
    EnumCount,
    Display,
    IntoStaticStr,
)]
pub enum Commodity {
    Cravinho,
    Cinnamon,
    Nutmeg,
    Cardamom,
}

impl Commodity {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Commodity> {
        Commodity::iter().nth(index)
    }
}

/// Enum indexed container holding one value per [`Commodity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommodityTable<T>([T; COMMODITY_COUNT]);

pub type PriceTable = CommodityTable<u32>;
pub type StockTable = CommodityTable<u32>;

impl<T> CommodityTable<T> {
    pub fn new(values: [T; COMMODITY_COUNT]) -> Self {
        Self(values)
    }

    pub fn from_fn(mut f: impl FnMut(Commodity) -> T) -> Self {
        let mut commodities = Commodity::iter();
        Self(std::array::from_fn(|_| match commodities.next() {
            Some(commodity) => f(commodity),
            None => unreachable!("COMMODITY_COUNT matches the Commodity variants"),
        }))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Commodity, &T)> {
        Commodity::iter().zip(self.0.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Commodity, &T) -> U) -> CommodityTable<U> {
        CommodityTable::from_fn(|commodity| f(commodity, &self[commodity]))
    }

    pub fn values(&self) -> &[T; COMMODITY_COUNT] {
        &self.0
    }
}

impl CommodityTable<u32> {
    pub fn total(&self) -> u64 {
        self.0.iter().map(|value| *value as u64).sum()
    }

    pub fn saturating_add(&self, other: &CommodityTable<u32>) -> CommodityTable<u32> {
        self.map(|commodity, value| value.saturating_add(other[commodity]))
    }
}

impl<T> Index<Commodity> for CommodityTable<T> {
    type Output = T;

    fn index(&self, commodity: Commodity) -> &T {
        &self.0[commodity.index()]
    }
}

impl<T> IndexMut<Commodity> for CommodityTable<T> {
    fn index_mut(&mut self, commodity: Commodity) -> &mut T {
        &mut self.0[commodity.index()]
    }
}

impl<T: fmt::Display> fmt::Display for CommodityTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let values: Vec<String> = self.0.iter().map(|value| value.to_string()).collect();
        write!(f, "{}", values.join(","))
    }
}

impl FromStr for CommodityTable<u32> {
    type Err = BazaarError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = content.split(',').map(str::trim).collect();
        if fields.len() != COMMODITY_COUNT {
            return Err(BazaarError::malformed(
                content,
                format!("expected {} fields, got {}", COMMODITY_COUNT, fields.len()),
            ));
        }

        let mut table = CommodityTable::default();
        for (commodity, field) in Commodity::iter().zip(fields) {
            table[commodity] = field
                .parse::<u32>()
                .map_err(|error| BazaarError::malformed(content, error.to_string()))?;
        }
        Ok(table)
    }
}

/// Identity of a participant as known to discovery and the message transport.
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Debug)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::EnumCount;

    #[test]
    fn test_commodity_count_matches_table_width() {
        assert_eq!(Commodity::COUNT, COMMODITY_COUNT);
        assert_eq!(Commodity::from_index(3), Some(Commodity::Cardamom));
        assert_eq!(Commodity::from_index(4), None);
    }

    #[test]
    fn test_commodity_names_parse() {
        assert_eq!(Commodity::from_str("Nutmeg").unwrap(), Commodity::Nutmeg);
        assert!(Commodity::from_str("nutmeg").is_err());
        assert_eq!(Commodity::Cravinho.to_string(), "Cravinho");
    }

    #[test]
    fn test_stock_table_wire_format() {
        let table = StockTable::new([10, 15, 20, 12]);
        assert_eq!(table.to_string(), "10,15,20,12");
        assert_eq!(StockTable::from_str(" 10, 15,20 ,12").unwrap(), table);
    }

    #[test]
    fn test_stock_table_rejects_bad_field_count() {
        let result = StockTable::from_str("10,15,20");
        assert!(matches!(result, Err(BazaarError::MalformedMessage(_))));
        let result = StockTable::from_str("10,15,twenty,12");
        assert!(matches!(result, Err(BazaarError::MalformedMessage(_))));
        let result = StockTable::from_str("10,-1,20,12");
        assert!(matches!(result, Err(BazaarError::MalformedMessage(_))));
    }

    #[test]
    fn test_saturating_add_and_total() {
        let a = StockTable::new([10, 15, 20, 12]);
        let b = StockTable::new([1, 0, u32::MAX, 3]);
        let sum = a.saturating_add(&b);
        assert_eq!(sum, StockTable::new([11, 15, u32::MAX, 15]));
        assert_eq!(a.total(), 57);
    }
}
