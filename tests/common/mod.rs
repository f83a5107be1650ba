#![allow(dead_code)]

pub mod logger;
pub mod participants;

use spice_bazaar::common::config::{BazaarConfig, TraderProfile};

/// Defaults with waits short enough for tests.
pub fn fast_config(total_rounds: u32, traders: Vec<TraderProfile>) -> BazaarConfig {
    BazaarConfig {
        total_rounds,
        ack_timeout_ms: 200,
        stock_timeout_ms: 300,
        sale_timeout_ms: 5_000,
        negotiation_timeout_ms: 500,
        event_seed: Some(7),
        traders,
        ..BazaarConfig::default()
    }
}
