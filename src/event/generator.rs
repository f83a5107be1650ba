use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::common::types::{Commodity, COMMODITY_COUNT};

use super::RoundEvent;

pub const STORM_CUTOFF: f64 = 0.15;
pub const SULTAN_TAX_CUTOFF: f64 = 0.30;
pub const TRADE_ROUTE_CUTOFF: f64 = 0.45;

/// Source of uniform draws behind [`EventGenerator`].
#[cfg_attr(test, mockall::automock)]
pub trait UniformSource: Send + Sync {
    /// Uniform draw in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform index in `0..len`.
    fn index(&mut self, len: usize) -> usize;
}

pub struct RngSource<R: Rng + Send + Sync> {
    rng: R,
}

impl<R: Rng + Send + Sync> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng + Send + Sync> UniformSource for RngSource<R> {
    fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn index(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

/// Maps a draw to an event over the stationary probability table.
/// `target` is only consulted for targeted events.
pub fn event_for_draw(u: f64, target: impl FnOnce() -> Commodity) -> RoundEvent {
    if u < STORM_CUTOFF {
        RoundEvent::Storm(target())
    } else if u < SULTAN_TAX_CUTOFF {
        RoundEvent::SultanTax
    } else if u < TRADE_ROUTE_CUTOFF {
        RoundEvent::TradeRoute(target())
    } else {
        RoundEvent::None
    }
}

pub struct EventGenerator {
    source: Box<dyn UniformSource>,
}

impl EventGenerator {
    pub fn new(source: Box<dyn UniformSource>) -> Self {
        Self { source }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(RngSource::seeded(seed)))
    }

    pub fn from_entropy() -> Self {
        Self::new(Box::new(RngSource::from_entropy()))
    }

    pub fn draw(&mut self) -> RoundEvent {
        let u = self.source.unit();
        let source = &mut self.source;
        let event = event_for_draw(u, || {
            let index = source.index(COMMODITY_COUNT);
            Commodity::from_index(index).unwrap_or(Commodity::Cravinho)
        });
        debug!("EventGenerator drew {:?} from u = {:.4}", event, u);
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        let target = || Commodity::Nutmeg;
        assert_eq!(event_for_draw(0.0, target), RoundEvent::Storm(Commodity::Nutmeg));
        assert_eq!(event_for_draw(0.1499, target), RoundEvent::Storm(Commodity::Nutmeg));
        assert_eq!(event_for_draw(0.15, target), RoundEvent::SultanTax);
        assert_eq!(event_for_draw(0.2999, target), RoundEvent::SultanTax);
        assert_eq!(event_for_draw(0.30, target), RoundEvent::TradeRoute(Commodity::Nutmeg));
        assert_eq!(event_for_draw(0.4499, target), RoundEvent::TradeRoute(Commodity::Nutmeg));
        assert_eq!(event_for_draw(0.45, target), RoundEvent::None);
        assert_eq!(event_for_draw(0.9999, target), RoundEvent::None);
    }

    // Actors hold a generator across awaits inside spawned tasks.
    #[test]
    fn test_sources_are_send_and_sync() {
        fn shareable<T: Send + Sync>() {}
        shareable::<EventGenerator>();
        shareable::<RngSource<StdRng>>();
        shareable::<MockUniformSource>();
    }

    #[test]
    fn test_mocked_storm_picks_target_index() {
        let mut source = MockUniformSource::new();
        source.expect_unit().times(1).return_const(0.05);
        source
            .expect_index()
            .withf(|len| *len == COMMODITY_COUNT)
            .times(1)
            .return_const(1usize);

        let mut generator = EventGenerator::new(Box::new(source));
        assert_eq!(generator.draw(), RoundEvent::Storm(Commodity::Cinnamon));
    }

    #[test]
    fn test_mocked_untargeted_skips_index_draw() {
        let mut source = MockUniformSource::new();
        source.expect_unit().times(1).return_const(0.2);
        source.expect_index().never();

        let mut generator = EventGenerator::new(Box::new(source));
        assert_eq!(generator.draw(), RoundEvent::SultanTax);
    }

    #[test]
    fn test_seeded_distribution_matches_table() {
        let mut generator = EventGenerator::seeded(7);
        let trials = 100_000;
        let (mut storm, mut tax, mut route, mut none) = (0usize, 0usize, 0usize, 0usize);
        let mut storm_targets = [0usize; COMMODITY_COUNT];

        for _ in 0..trials {
            match generator.draw() {
                RoundEvent::Storm(commodity) => {
                    storm += 1;
                    storm_targets[commodity.index()] += 1;
                }
                RoundEvent::SultanTax => tax += 1,
                RoundEvent::TradeRoute(_) => route += 1,
                RoundEvent::None => none += 1,
            }
        }

        let share = |count: usize| count as f64 / trials as f64;
        assert!((share(storm) - 0.15).abs() < 0.01);
        assert!((share(tax) - 0.15).abs() < 0.01);
        assert!((share(route) - 0.15).abs() < 0.01);
        assert!((share(none) - 0.55).abs() < 0.01);

        for count in storm_targets {
            let target_share = count as f64 / storm as f64;
            assert!((target_share - 0.25).abs() < 0.03);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = EventGenerator::seeded(42);
        let mut b = EventGenerator::seeded(42);
        for _ in 0..50 {
            assert_eq!(a.draw(), b.draw());
        }
    }
}
