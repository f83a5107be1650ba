use std::str::FromStr;
use std::time::Duration;

use strum_macros::{Display, IntoStaticStr};
use tokio::{
    select,
    sync::{mpsc, oneshot},
    time::Instant,
};
use tracing::{debug, error, info, trace, warn};

use crate::common::{
    config::BazaarConfig,
    error::BazaarError,
    types::{ParticipantId, PriceTable, StockTable},
};
use crate::comms::{CommsAccess, Envelope, Inbox, Performative};
use crate::event::{EventGenerator, RoundEvent};
use crate::ledger::{CommodityLedger, WalletLedger};
use crate::protocol::{PriceUpdate, RoundNotice, SaleDecision, ACK, STOCK_REQUEST};

use super::phase::RoundPhase;
use super::report::{GameReport, RoundRecord};
use super::roster::Roster;

pub const COORDINATOR_CAPABILITY: &str = "bazaar";

#[derive(Clone)]
pub struct CoordinatorAccess {
    tx: mpsc::Sender<CoordinatorRequest>,
}

impl CoordinatorAccess {
    pub(super) fn new(tx: mpsc::Sender<CoordinatorRequest>) -> Self {
        Self { tx }
    }

    /// Plays every round against the participants discovered under the
    /// market capability. A coordinator plays a single game.
    pub async fn run_game(&self) -> Result<GameReport, BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<GameReport, BazaarError>>();
        let request = CoordinatorRequest::RunGame { rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn query_prices(&self) -> Result<PriceTable, BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<PriceTable>();
        let request = CoordinatorRequest::QueryPrices { rsp_tx };
        self.tx.send(request).await?;
        Ok(rsp_rx.await?)
    }

    pub async fn query_wallets(&self) -> Result<WalletLedger, BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<WalletLedger>();
        let request = CoordinatorRequest::QueryWallets { rsp_tx };
        self.tx.send(request).await?;
        Ok(rsp_rx.await?)
    }

    pub async fn shutdown(&self) -> Result<(), BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<()>();
        let request = CoordinatorRequest::Shutdown { rsp_tx };
        self.tx.send(request).await?; // Shutdown is allowed to fail if already shutdown
        Ok(rsp_rx.await?)
    }
}

pub struct Coordinator {
    tx: mpsc::Sender<CoordinatorRequest>,
    pub task_handle: tokio::task::JoinHandle<()>,
}

impl Coordinator {
    const COORDINATOR_REQUEST_CHANNEL_SIZE: usize = 10;

    pub async fn new(
        comms_accessor: CommsAccess,
        config: BazaarConfig,
        generator: EventGenerator,
    ) -> Result<Self, BazaarError> {
        let inbox = comms_accessor
            .open_inbox(config.coordinator_name.clone(), COORDINATOR_CAPABILITY)
            .await?;

        let (tx, rx) =
            mpsc::channel::<CoordinatorRequest>(Self::COORDINATOR_REQUEST_CHANNEL_SIZE);
        let actor = CoordinatorActor::new(rx, comms_accessor, inbox, config, generator);
        let task_handle = tokio::spawn(async move { actor.run().await });
        Ok(Self { tx, task_handle })
    }

    pub fn new_accessor(&self) -> CoordinatorAccess {
        CoordinatorAccess::new(self.tx.clone())
    }
}

#[derive(Display, IntoStaticStr)]
pub(super) enum CoordinatorRequest {
    RunGame {
        rsp_tx: oneshot::Sender<Result<GameReport, BazaarError>>,
    },
    QueryPrices {
        rsp_tx: oneshot::Sender<PriceTable>,
    },
    QueryWallets {
        rsp_tx: oneshot::Sender<WalletLedger>,
    },
    Shutdown {
        rsp_tx: oneshot::Sender<()>,
    },
}

// A request sent to the roster and who it actually reached.
struct Dispatch {
    request: Envelope,
    reached: Vec<ParticipantId>,
    failed: Vec<ParticipantId>,
}

struct Collected {
    replies: Vec<Envelope>,
    missing: Vec<ParticipantId>,
}

// Scratch state of the round in progress.
struct RoundDraft {
    round: u32,
    aggregate: StockTable,
    event_applied: RoundEvent,
    event_drawn: RoundEvent,
    removed: Vec<ParticipantId>,
    update: Option<Dispatch>,
    coins_credited: u64,
}

impl RoundDraft {
    fn new(round: u32) -> Self {
        Self {
            round,
            aggregate: StockTable::default(),
            event_applied: RoundEvent::None,
            event_drawn: RoundEvent::None,
            removed: Vec::new(),
            update: None,
            coins_credited: 0,
        }
    }
}

struct CoordinatorActor {
    rx: mpsc::Receiver<CoordinatorRequest>,
    comms_accessor: CommsAccess,
    inbox: Inbox,
    config: BazaarConfig,
    id: ParticipantId,
    generator: EventGenerator,
    ledger: CommodityLedger,
    wallets: WalletLedger,
    roster: Roster,
    pending_event: RoundEvent,
    phase: RoundPhase,
    rounds_done: u32,
    history: Vec<RoundRecord>,
    played: bool,
}

impl CoordinatorActor {
    fn new(
        rx: mpsc::Receiver<CoordinatorRequest>,
        comms_accessor: CommsAccess,
        inbox: Inbox,
        config: BazaarConfig,
        generator: EventGenerator,
    ) -> Self {
        let ledger = CommodityLedger::new(&config);
        CoordinatorActor {
            rx,
            comms_accessor,
            inbox,
            id: config.coordinator_name.clone(),
            config,
            generator,
            ledger,
            wallets: WalletLedger::new(),
            roster: Roster::default(),
            pending_event: RoundEvent::None,
            phase: RoundPhase::AnnounceRound,
            rounds_done: 0,
            history: Vec::new(),
            played: false,
        }
    }

    async fn run(mut self) {
        loop {
            select! {
                Some(request) = self.rx.recv() => {
                    if self.handle_request(request).await {
                        break;
                    }
                },
                Some(envelope) = self.inbox.recv() => {
                    debug!(
                        "Coordinator dropped {} from {} outside a game",
                        envelope.performative, envelope.sender
                    );
                },
                else => break,
            }
        }

        if let Err(error) = self.comms_accessor.deregister(self.id.clone()).await {
            debug!("Coordinator deregistration failed - {}", error);
        }
        info!("Coordinator terminating");
    }

    async fn handle_request(&mut self, request: CoordinatorRequest) -> bool {
        let mut terminate = false;
        debug!("Coordinator handle_request() of type {}", request);

        match request {
            CoordinatorRequest::RunGame { rsp_tx } => {
                let result = self.run_game().await;
                if let Err(BazaarError::NoParticipants(_)) = result {
                    terminate = true;
                }
                if rsp_tx.send(result).is_err() {
                    warn!("Coordinator game requester went away before the report");
                }
            }
            CoordinatorRequest::QueryPrices { rsp_tx } => {
                let _ = rsp_tx.send(self.ledger.prices());
            }
            CoordinatorRequest::QueryWallets { rsp_tx } => {
                let _ = rsp_tx.send(self.wallets.clone());
            }
            CoordinatorRequest::Shutdown { rsp_tx } => {
                let _ = rsp_tx.send(());
                terminate = true;
            }
        }
        terminate
    }

    // Game Flow

    async fn run_game(&mut self) -> Result<GameReport, BazaarError> {
        if self.played {
            return Err(BazaarError::Simple(
                "Coordinator already played its game".to_string(),
            ));
        }
        self.played = true;

        let found = self
            .comms_accessor
            .search(self.config.capability.clone())
            .await?;
        if found.is_empty() {
            error!(
                "Coordinator found no participants under '{}', not starting",
                self.config.capability
            );
            return Err(BazaarError::NoParticipants(self.config.capability.clone()));
        }
        self.roster = Roster::new(found);
        info!(
            "Coordinator starting {} rounds with {:?}",
            self.config.total_rounds,
            self.roster.members()
        );
        self.start_game().await?;

        let total_rounds = self.config.total_rounds;
        let mut draft = RoundDraft::new(1);
        self.phase = RoundPhase::AnnounceRound;

        while !self.phase.is_terminal() {
            trace!("Coordinator round {} entering {}", draft.round, self.phase);
            match self.phase {
                RoundPhase::AnnounceRound => {
                    draft = RoundDraft::new(self.rounds_done + 1);
                    self.announce_round(draft.round).await?;
                }
                RoundPhase::CollectStock => self.collect_stock(&mut draft).await?,
                RoundPhase::AdjustPrices => self.adjust_prices(&mut draft),
                RoundPhase::DrawEvent => self.draw_event(&mut draft),
                RoundPhase::BroadcastUpdate => self.broadcast_update(&mut draft).await?,
                RoundPhase::CollectSales => self.collect_sales(&mut draft).await,
                RoundPhase::RoundDone => self.round_done(&mut draft),
                RoundPhase::GameEnd => break,
            }
            self.phase = self.phase.next(self.rounds_done, total_rounds);
        }

        let report = self.report();
        match &report.winner {
            Some((winner, coins)) => info!(
                "Coordinator game over after {} rounds, {} wins with {} coins",
                report.rounds_played, winner, coins
            ),
            None => warn!(
                "Coordinator game over after {} rounds without a winner",
                report.rounds_played
            ),
        }
        Ok(report)
    }

    async fn start_game(&mut self) -> Result<(), BazaarError> {
        let notice = RoundNotice::TotalRounds(self.config.total_rounds);
        let dispatch = self
            .dispatch(Performative::Request, notice.to_string(), 0)
            .await?;
        let timeout = self.config.ack_timeout();
        let collected = self
            .collect(&dispatch, Performative::Confirm, timeout, "GameStart")
            .await;
        self.check_acks(&collected);
        Ok(())
    }

    async fn announce_round(&mut self, round: u32) -> Result<(), BazaarError> {
        let stale = self.inbox.discard_parked(|envelope| envelope.round < round);
        if stale > 0 {
            debug!("Coordinator dropped {} stale replies before round {}", stale, round);
        }

        let notice = RoundNotice::CurrentRound(round);
        let dispatch = self
            .dispatch(Performative::Request, notice.to_string(), round)
            .await?;
        let timeout = self.config.ack_timeout();
        let collected = self
            .collect(&dispatch, Performative::Confirm, timeout, "AnnounceRound")
            .await;
        // Missing acknowledgements never cost a roster place.
        self.check_acks(&collected);
        Ok(())
    }

    async fn collect_stock(&mut self, draft: &mut RoundDraft) -> Result<(), BazaarError> {
        let dispatch = self
            .dispatch(Performative::Request, STOCK_REQUEST, draft.round)
            .await?;
        let timeout = self.config.stock_timeout();
        let collected = self
            .collect(&dispatch, Performative::Inform, timeout, "CollectStock")
            .await;

        for reply in collected.replies.iter() {
            match StockTable::from_str(&reply.content) {
                Ok(stock) => {
                    trace!("Coordinator stock from {}: {}", reply.sender, stock);
                    draft.aggregate = draft.aggregate.saturating_add(&stock);
                }
                Err(error) => warn!(
                    "Coordinator skipped stock reply from {} - {}",
                    reply.sender, error
                ),
            }
        }

        let mut missing = dispatch.failed;
        missing.extend(collected.missing);
        if !missing.is_empty() {
            draft.removed = self.roster.remove_all(&missing);
            warn!(
                "Coordinator removed {:?} from the roster, {} left",
                draft.removed,
                self.roster.len()
            );
        }
        debug!(
            "Coordinator round {} aggregate stock {}",
            draft.round, draft.aggregate
        );
        Ok(())
    }

    fn adjust_prices(&mut self, draft: &mut RoundDraft) {
        let before = self.ledger.prices();
        draft.event_applied = self.pending_event;
        self.ledger = self
            .ledger
            .with_aggregate(draft.aggregate)
            .adjusted(self.roster.len(), &self.pending_event);
        info!(
            "Coordinator round {} prices {} -> {} under {:?}",
            draft.round,
            before,
            self.ledger.prices(),
            draft.event_applied
        );
    }

    fn draw_event(&mut self, draft: &mut RoundDraft) {
        let drawn = self.generator.draw();
        self.pending_event = drawn;
        draft.event_drawn = drawn;
        info!("Coordinator round {} drew {}", draft.round, drawn.describe());
    }

    async fn broadcast_update(&mut self, draft: &mut RoundDraft) -> Result<(), BazaarError> {
        let update = PriceUpdate {
            prices: self.ledger.prices(),
            event: draft.event_drawn,
            peers: Some(self.roster.members().to_vec()),
        };
        let dispatch = self
            .dispatch(Performative::Inform, update.to_string(), draft.round)
            .await?;
        draft.update = Some(dispatch);
        Ok(())
    }

    async fn collect_sales(&mut self, draft: &mut RoundDraft) {
        let Some(dispatch) = draft.update.take() else {
            return;
        };
        let timeout = self.config.sale_timeout();
        let collected = self
            .collect(&dispatch, Performative::Inform, timeout, "CollectSales")
            .await;

        for reply in collected.replies.iter() {
            match SaleDecision::from_str(&reply.content) {
                Ok(decision) => {
                    let proceeds = decision.proceeds();
                    self.wallets.credit(&reply.sender, proceeds);
                    draft.coins_credited += proceeds;
                    debug!(
                        "Coordinator credited {} with {} for {}",
                        reply.sender, proceeds, decision
                    );
                }
                Err(error) => warn!(
                    "Coordinator skipped sale decision from {} - {}",
                    reply.sender, error
                ),
            }
        }
    }

    fn round_done(&mut self, draft: &mut RoundDraft) {
        self.rounds_done += 1;
        self.history.push(RoundRecord {
            round: draft.round,
            aggregate: draft.aggregate,
            prices: self.ledger.prices(),
            event_applied: draft.event_applied,
            event_drawn: draft.event_drawn,
            roster_size: self.roster.len(),
            removed: std::mem::take(&mut draft.removed),
            coins_credited: draft.coins_credited,
        });
        info!(
            "Coordinator round {} of {} done",
            draft.round, self.config.total_rounds
        );
    }

    fn report(&self) -> GameReport {
        GameReport {
            rounds_played: self.rounds_done,
            final_prices: self.ledger.prices(),
            wallets: self.wallets.entries().to_vec(),
            winner: self.wallets.winner(|id| self.roster.contains(id)),
            roster: self.roster.members().to_vec(),
            round_history: self.history.clone(),
        }
    }

    // Messaging

    async fn dispatch(
        &self,
        performative: Performative,
        content: impl Into<String>,
        round: u32,
    ) -> Result<Dispatch, BazaarError> {
        let request = Envelope::new(self.id.clone(), round, performative, content);
        let failures = self
            .comms_accessor
            .broadcast(self.roster.members(), request.clone())
            .await?;

        let mut failed = Vec::new();
        for (recipient, error) in failures {
            warn!("Coordinator could not reach {} - {}", recipient, error);
            failed.push(recipient);
        }
        let reached = self
            .roster
            .members()
            .iter()
            .filter(|member| !failed.contains(member))
            .cloned()
            .collect();

        Ok(Dispatch {
            request,
            reached,
            failed,
        })
    }

    /// Waits for one `expected` reply to `dispatch` from every participant it
    /// reached, or until `timeout` elapses.
    async fn collect(
        &mut self,
        dispatch: &Dispatch,
        expected: Performative,
        timeout: Duration,
        phase: &str,
    ) -> Collected {
        let request_id = dispatch.request.id;
        let round = dispatch.request.round;
        let deadline = Instant::now() + timeout;
        let mut pending = dispatch.reached.clone();
        let mut replies = Vec::new();

        while !pending.is_empty() {
            let next = self
                .inbox
                .next_matching(Some(deadline), |envelope| {
                    envelope.is_reply_to(request_id)
                        && envelope.round == round
                        && envelope.performative == expected
                        && pending.contains(&envelope.sender)
                })
                .await;
            let Some(reply) = next else {
                break;
            };
            pending.retain(|participant| participant != &reply.sender);
            replies.push(reply);
        }

        if !pending.is_empty() {
            let error = BazaarError::Timeout {
                phase: phase.to_string(),
                missing: pending.clone(),
            };
            warn!("Coordinator round {} - {}", round, error);
        }
        Collected {
            replies,
            missing: pending,
        }
    }

    fn check_acks(&self, collected: &Collected) {
        for reply in collected.replies.iter() {
            if reply.content.trim() != ACK {
                let error = BazaarError::malformed(&reply.content, "expected ACK");
                warn!("Coordinator ack from {} - {}", reply.sender, error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::Comms;
    use crate::event::MockUniformSource;

    fn quiet_generator() -> EventGenerator {
        let mut source = MockUniformSource::new();
        source.expect_unit().return_const(0.99);
        EventGenerator::new(Box::new(source))
    }

    fn config(total_rounds: u32) -> BazaarConfig {
        BazaarConfig {
            total_rounds,
            ack_timeout_ms: 100,
            stock_timeout_ms: 100,
            sale_timeout_ms: 100,
            ..BazaarConfig::default()
        }
    }

    #[tokio::test]
    async fn test_no_participants_is_fatal() {
        let comms = Comms::new();
        let coordinator = Coordinator::new(comms.new_accessor(), config(3), quiet_generator())
            .await
            .unwrap();
        let coordinator_access = coordinator.new_accessor();
        let result = coordinator_access.run_game().await;
        assert!(matches!(result, Err(BazaarError::NoParticipants(_))));

        // The actor exits and leaves discovery on its own.
        coordinator.task_handle.await.unwrap();
        assert!(coordinator_access.query_prices().await.is_err());
        let access = comms.new_accessor();
        assert!(access.search(COORDINATOR_CAPABILITY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_silent_participant_dropped_after_stock_timeout() {
        let comms = Comms::new();
        let access = comms.new_accessor();
        let _silent = access
            .open_inbox(ParticipantId::from("m1"), "market")
            .await
            .unwrap();
        let coordinator = Coordinator::new(access.clone(), config(2), quiet_generator())
            .await
            .unwrap();

        let report = coordinator.new_accessor().run_game().await.unwrap();
        assert_eq!(report.rounds_played, 2);
        assert!(report.roster.is_empty());
        assert_eq!(report.winner, None);
        assert_eq!(report.round_history[0].removed, vec![ParticipantId::from("m1")]);
        assert_eq!(report.round_history[0].roster_size, 0);
        assert_eq!(report.round_history[1].aggregate, StockTable::default());
        // An empty market leaves prices alone.
        assert_eq!(report.final_prices, PriceTable::new([20, 5, 15, 10]));
    }

    #[tokio::test]
    async fn test_second_game_refused() {
        let comms = Comms::new();
        let access = comms.new_accessor();
        let _silent = access
            .open_inbox(ParticipantId::from("m1"), "market")
            .await
            .unwrap();
        let coordinator = Coordinator::new(access, config(1), quiet_generator())
            .await
            .unwrap();
        let coordinator_access = coordinator.new_accessor();
        coordinator_access.run_game().await.unwrap();
        assert!(coordinator_access.run_game().await.is_err());

        coordinator_access.shutdown().await.unwrap();
        coordinator.task_handle.await.unwrap();
    }
}
