use tracing::{debug, info};

use crate::common::{config::BazaarConfig, error::BazaarError, types::ParticipantId};
use crate::comms::{Comms, CommsAccess};
use crate::coordinator::{Coordinator, CoordinatorAccess, GameReport};
use crate::event::{EventGenerator, RngSource, UniformSource};
use crate::trader::{Trader, TraderAccess};

/// Owns a whole market: the in-process transport, one coordinator and the
/// configured traders.
pub struct Bazaar {
    config: BazaarConfig,
    comms: Comms,
    comms_accessor: CommsAccess,
    coordinator: Coordinator,
    traders: Vec<Trader>,
}

impl Bazaar {
    // Constructors

    pub async fn new(config: BazaarConfig) -> Result<Bazaar, BazaarError> {
        config.validate()?;
        let comms = Comms::new();
        let comms_accessor = comms.new_accessor();

        let mut traders = Vec::with_capacity(config.traders.len());
        for (index, profile) in config.traders.iter().enumerate() {
            let source: Box<dyn UniformSource> = match config.event_seed {
                Some(seed) => Box::new(RngSource::seeded(seed.wrapping_add(index as u64 + 1))),
                None => Box::new(RngSource::from_entropy()),
            };
            let trader =
                Trader::new(comms_accessor.clone(), profile.clone(), &config, source).await?;
            traders.push(trader);
        }

        let generator = match config.event_seed {
            Some(seed) => EventGenerator::seeded(seed),
            None => EventGenerator::from_entropy(),
        };
        let coordinator =
            Coordinator::new(comms_accessor.clone(), config.clone(), generator).await?;

        info!(
            "Bazaar opened with {} traders for {} rounds",
            traders.len(),
            config.total_rounds
        );
        Ok(Bazaar {
            config,
            comms,
            comms_accessor,
            coordinator,
            traders,
        })
    }

    pub fn config(&self) -> &BazaarConfig {
        &self.config
    }

    // Participant Management

    /// Transport handle, for attaching participants not owned by the bazaar.
    pub fn comms_accessor(&self) -> CommsAccess {
        self.comms_accessor.clone()
    }

    pub fn coordinator_accessor(&self) -> CoordinatorAccess {
        self.coordinator.new_accessor()
    }

    pub fn trader_ids(&self) -> Vec<ParticipantId> {
        self.traders.iter().map(|trader| trader.id().clone()).collect()
    }

    pub fn trader_accessor(&self, id: &ParticipantId) -> Option<TraderAccess> {
        self.traders
            .iter()
            .find(|trader| trader.id() == id)
            .map(|trader| trader.new_accessor())
    }

    // Game

    pub async fn run_game(&self) -> Result<GameReport, BazaarError> {
        self.coordinator.new_accessor().run_game().await
    }

    pub async fn shutdown(self) -> Result<(), BazaarError> {
        // A coordinator that found nobody to play with has already exited.
        if let Err(error) = self.coordinator.new_accessor().shutdown().await {
            debug!("Bazaar coordinator already stopped - {}", error);
        }
        join("Coordinator", self.coordinator.task_handle).await?;

        for trader in self.traders {
            debug!("Bazaar shutting down Trader {}", trader.id());
            trader.new_accessor().shutdown().await?;
            join("Trader", trader.task_handle).await?;
        }

        self.comms_accessor.shutdown().await?;
        join("Comms", self.comms.task_handle).await?;
        info!("Bazaar closed");
        Ok(())
    }
}

async fn join(name: &str, handle: tokio::task::JoinHandle<()>) -> Result<(), BazaarError> {
    handle
        .await
        .map_err(|error| BazaarError::Simple(format!("{} task failed to join - {}", name, error)))
}
