use std::str::FromStr;

use serde::Serialize;
use strum_macros::{Display, IntoStaticStr};
use tokio::{
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, info, trace, warn};

use crate::common::{
    config::{BazaarConfig, TraderProfile},
    error::BazaarError,
    types::{ParticipantId, PriceTable, StockTable},
};
use crate::comms::{CommsAccess, Envelope, Inbox, Performative};
use crate::event::{RoundEvent, UniformSource};
use crate::negotiation::{
    is_negotiation_message, NegotiationOutcome, NegotiationSession, NegotiationSettings,
};
use crate::protocol::{PriceUpdate, RoundNotice, ACK, STOCK_REQUEST};

use super::holdings::Holdings;
use super::utility::UtilityModel;

/// Point in time view of a trader's private state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraderSnapshot {
    pub id: ParticipantId,
    pub risk: f64,
    pub holdings: Holdings,
    pub prices: PriceTable,
    pub event: RoundEvent,
    pub current_round: u32,
    pub total_rounds: u32,
    pub rounds_negotiated: u32,
    /// Own proposals committed with an acceptor.
    pub trades_proposed: u32,
    /// Peers' proposals settled against this trader's stock.
    pub trades_settled: u32,
}

#[derive(Clone)]
pub struct TraderAccess {
    tx: mpsc::Sender<TraderRequest>,
}

impl TraderAccess {
    pub(super) fn new(tx: mpsc::Sender<TraderRequest>) -> Self {
        Self { tx }
    }

    pub async fn query_stock(&self) -> Result<StockTable, BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<StockTable>();
        let request = TraderRequest::QueryStock { rsp_tx };
        self.tx.send(request).await?;
        Ok(rsp_rx.await?)
    }

    pub async fn query_snapshot(&self) -> Result<TraderSnapshot, BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<TraderSnapshot>();
        let request = TraderRequest::QuerySnapshot { rsp_tx };
        self.tx.send(request).await?;
        Ok(rsp_rx.await?)
    }

    pub async fn shutdown(&self) -> Result<(), BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<()>();
        let request = TraderRequest::Shutdown { rsp_tx };
        self.tx.send(request).await?; // Shutdown is allowed to fail if already shutdown
        Ok(rsp_rx.await?)
    }
}

pub struct Trader {
    id: ParticipantId,
    tx: mpsc::Sender<TraderRequest>,
    pub task_handle: tokio::task::JoinHandle<()>,
}

impl Trader {
    const TRADER_REQUEST_CHANNEL_SIZE: usize = 10;

    /// Opens the trader's mailbox under the market capability and starts it.
    pub async fn new(
        comms_accessor: CommsAccess,
        profile: TraderProfile,
        config: &BazaarConfig,
        source: Box<dyn UniformSource>,
    ) -> Result<Self, BazaarError> {
        let id = profile.name.clone();
        let inbox = comms_accessor
            .open_inbox(id.clone(), config.capability.clone())
            .await?;

        let (tx, rx) = mpsc::channel::<TraderRequest>(Self::TRADER_REQUEST_CHANNEL_SIZE);
        let actor = TraderActor::new(rx, comms_accessor, inbox, profile, config, source);
        let task_handle = tokio::spawn(async move { actor.run().await });
        Ok(Self {
            id,
            tx,
            task_handle,
        })
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn new_accessor(&self) -> TraderAccess {
        TraderAccess::new(self.tx.clone())
    }
}

#[derive(Display, IntoStaticStr)]
pub(super) enum TraderRequest {
    QueryStock {
        rsp_tx: oneshot::Sender<StockTable>,
    },
    QuerySnapshot {
        rsp_tx: oneshot::Sender<TraderSnapshot>,
    },
    Shutdown {
        rsp_tx: oneshot::Sender<()>,
    },
}

struct TraderActor {
    rx: mpsc::Receiver<TraderRequest>,
    comms_accessor: CommsAccess,
    inbox: Inbox,
    source: Box<dyn UniformSource>,
    id: ParticipantId,
    risk: f64,
    capability: String,
    negotiation: NegotiationSettings,
    holdings: Holdings,
    prices: PriceTable,
    event: RoundEvent,
    current_round: u32,
    total_rounds: u32,
    rounds_negotiated: u32,
    trades_proposed: u32,
    trades_settled: u32,
}

impl TraderActor {
    fn new(
        rx: mpsc::Receiver<TraderRequest>,
        comms_accessor: CommsAccess,
        inbox: Inbox,
        profile: TraderProfile,
        config: &BazaarConfig,
        source: Box<dyn UniformSource>,
    ) -> Self {
        let stock = profile.initial_stock.unwrap_or_else(|| config.initial_stock());
        TraderActor {
            rx,
            comms_accessor,
            inbox,
            source,
            id: profile.name,
            risk: profile.risk,
            capability: config.capability.clone(),
            negotiation: NegotiationSettings::from_config(config),
            holdings: Holdings::new(stock),
            prices: config.initial_prices(),
            event: RoundEvent::None,
            current_round: 0,
            total_rounds: config.total_rounds,
            rounds_negotiated: 0,
            trades_proposed: 0,
            trades_settled: 0,
        }
    }

    async fn run(mut self) {
        info!(
            "Trader {} started with risk {} and stock {}",
            self.id, self.risk, self.holdings.stock
        );

        loop {
            // Coordinator messages parked during a negotiation come first.
            if let Some(envelope) = self
                .inbox
                .take_parked(|envelope| !is_negotiation_message(envelope))
            {
                self.handle_envelope(envelope).await;
                continue;
            }

            select! {
                Some(request) = self.rx.recv() => {
                    if self.handle_request(request) {
                        break;
                    }
                },
                Some(envelope) = self.inbox.recv() => {
                    self.handle_envelope(envelope).await;
                },
                else => break,
            }
        }

        if let Err(error) = self.comms_accessor.deregister(self.id.clone()).await {
            debug!("Trader {} deregistration failed - {}", self.id, error);
        }
        info!("Trader {} terminating", self.id);
    }

    // Owner Request Handling

    fn handle_request(&mut self, request: TraderRequest) -> bool {
        let mut terminate = false;
        debug!("Trader {} handle_request() of type {}", self.id, request);

        match request {
            TraderRequest::QueryStock { rsp_tx } => {
                if rsp_tx.send(self.holdings.stock).is_err() {
                    warn!("Trader {} stock requester went away", self.id);
                }
            }
            TraderRequest::QuerySnapshot { rsp_tx } => {
                if rsp_tx.send(self.snapshot()).is_err() {
                    warn!("Trader {} snapshot requester went away", self.id);
                }
            }
            TraderRequest::Shutdown { rsp_tx } => {
                let _ = rsp_tx.send(());
                terminate = true;
            }
        }
        terminate
    }

    fn snapshot(&self) -> TraderSnapshot {
        TraderSnapshot {
            id: self.id.clone(),
            risk: self.risk,
            holdings: self.holdings.clone(),
            prices: self.prices,
            event: self.event,
            current_round: self.current_round,
            total_rounds: self.total_rounds,
            rounds_negotiated: self.rounds_negotiated,
            trades_proposed: self.trades_proposed,
            trades_settled: self.trades_settled,
        }
    }

    fn utility_model(&self) -> UtilityModel {
        UtilityModel {
            risk: self.risk,
            prices: self.prices,
            event: self.event,
            round: self.current_round,
            total_rounds: self.total_rounds,
        }
    }

    // Envelope Handling

    async fn handle_envelope(&mut self, envelope: Envelope) {
        trace!(
            "Trader {} received {} '{}' from {}",
            self.id,
            envelope.performative,
            envelope.content,
            envelope.sender
        );

        let result = match envelope.performative {
            Performative::Request if envelope.content == STOCK_REQUEST => {
                self.reply_stock(&envelope).await
            }
            Performative::Request => self.acknowledge_round(&envelope).await,
            Performative::Inform => self.trade_and_sell(&envelope).await,
            _ if is_negotiation_message(&envelope) => {
                // A peer already negotiating this round, ahead of our broadcast.
                self.inbox.park(envelope);
                return;
            }
            _ => Err(BazaarError::malformed(
                &envelope.content,
                format!("unexpected {}", envelope.performative),
            )),
        };

        if let Err(error) = result {
            warn!(
                "Trader {} skipped {} from {} - {}",
                self.id, envelope.performative, envelope.sender, error
            );
        }
    }

    async fn reply_stock(&mut self, request: &Envelope) -> Result<(), BazaarError> {
        if let Some((target, before, after)) = self.holdings.apply_storm_impact() {
            info!(
                "Trader {} lost {} to the storm on {}",
                self.id,
                before - after,
                target
            );
        }
        let reply = request.reply(
            self.id.clone(),
            Performative::Inform,
            self.holdings.stock.to_string(),
        );
        self.comms_accessor.send(&request.sender, reply).await
    }

    async fn acknowledge_round(&mut self, request: &Envelope) -> Result<(), BazaarError> {
        match RoundNotice::from_str(&request.content)? {
            RoundNotice::TotalRounds(total) => self.total_rounds = total,
            RoundNotice::CurrentRound(round) => self.current_round = round,
        }
        let reply = request.reply(self.id.clone(), Performative::Confirm, ACK);
        self.comms_accessor.send(&request.sender, reply).await
    }

    async fn trade_and_sell(&mut self, broadcast: &Envelope) -> Result<(), BazaarError> {
        let update = PriceUpdate::from_str(&broadcast.content)?;
        self.prices = update.prices;
        self.event = update.event;
        self.holdings.note_event(&update.event);

        let peers = match update.peers {
            Some(peers) => peers,
            None => self.comms_accessor.search(self.capability.clone()).await?,
        };

        let outcome = self.negotiate(broadcast.round, peers).await;
        debug!(
            "Trader {} round {} negotiation: {} proposals, {} accepted, counterparty {:?}, {} settled",
            self.id,
            broadcast.round,
            outcome.proposals_received,
            outcome.accepted.len(),
            outcome.counterparty,
            outcome.settled.len()
        );

        let decision = self.holdings.decide_sale(&self.utility_model());
        info!(
            "Trader {} round {} sells {} for {} coins",
            self.id,
            broadcast.round,
            decision,
            decision.proceeds()
        );
        let reply = broadcast.reply(self.id.clone(), Performative::Inform, decision.to_string());
        self.comms_accessor.send(&broadcast.sender, reply).await
    }

    async fn negotiate(&mut self, round: u32, peers: Vec<ParticipantId>) -> NegotiationOutcome {
        let model = self.utility_model();
        let session = NegotiationSession::new(
            &self.id,
            round,
            peers,
            &self.comms_accessor,
            &mut self.inbox,
            self.source.as_mut(),
            self.negotiation,
        );
        let outcome = session.run(&model, &mut self.holdings.stock).await;
        self.rounds_negotiated += 1;
        if outcome.counterparty.is_some() {
            self.trades_proposed += 1;
        }
        self.trades_settled += outcome.settled.len() as u32;
        if !outcome.timeouts.is_empty() {
            warn!(
                "Trader {} round {} negotiation waits expired: {:?}",
                self.id, round, outcome.timeouts
            );
        }
        outcome
    }
}
