use std::str::FromStr;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::common::{
    config::{BazaarConfig, Settlement, TieBreak},
    error::BazaarError,
    types::{Commodity, ParticipantId, StockTable},
};
use crate::comms::{CommsAccess, Envelope, Inbox, Performative};
use crate::event::UniformSource;
use crate::protocol::{ProposalContent, SettlementNotice, TradeProposal, TradeTerms};
use crate::trader::UtilityModel;

use super::strategy::{draft_proposal, is_acceptable, pick_counterparty};

pub fn is_negotiation_message(envelope: &Envelope) -> bool {
    matches!(
        envelope.performative,
        Performative::Propose
            | Performative::AcceptProposal
            | Performative::RejectProposal
            | Performative::Confirm
            | Performative::Cancel
    )
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NegotiationSettings {
    pub timeout: Duration,
    pub tie_break: TieBreak,
    pub settlement: Settlement,
}

impl NegotiationSettings {
    pub fn from_config(config: &BazaarConfig) -> Self {
        Self {
            timeout: config.negotiation_timeout(),
            tie_break: config.tie_break,
            settlement: config.settlement,
        }
    }
}

/// What one round of negotiation did to a trader.
#[derive(Clone, Debug, PartialEq)]
pub struct NegotiationOutcome {
    pub proposal: ProposalContent,
    pub proposals_received: usize,
    /// Peers whose proposals this trader accepted.
    pub accepted: Vec<ParticipantId>,
    /// Acceptor this trader's own proposal was committed with.
    pub counterparty: Option<ParticipantId>,
    /// Peers' proposals settled against this trader's stock.
    pub settled: Vec<TradeProposal>,
    /// Waits that ended on the deadline.
    pub timeouts: Vec<&'static str>,
}

impl NegotiationOutcome {
    fn new(proposal: ProposalContent) -> Self {
        Self {
            proposal,
            proposals_received: 0,
            accepted: Vec::new(),
            counterparty: None,
            settled: Vec::new(),
            timeouts: Vec::new(),
        }
    }
}

struct Reservation {
    accept_id: Uuid,
    proposer: ParticipantId,
    terms: TradeTerms,
}

/// One negotiation round for one trader: broadcast a proposal, answer every
/// peer's proposal, settle on at most one acceptor of its own.
pub struct NegotiationSession<'a> {
    id: &'a ParticipantId,
    round: u32,
    peers: Vec<ParticipantId>,
    comms: &'a CommsAccess,
    inbox: &'a mut Inbox,
    source: &'a mut dyn UniformSource,
    settings: NegotiationSettings,
}

impl<'a> NegotiationSession<'a> {
    pub fn new(
        id: &'a ParticipantId,
        round: u32,
        peers: Vec<ParticipantId>,
        comms: &'a CommsAccess,
        inbox: &'a mut Inbox,
        source: &'a mut dyn UniformSource,
        settings: NegotiationSettings,
    ) -> Self {
        let peers = peers.into_iter().filter(|peer| peer != id).collect();
        Self {
            id,
            round,
            peers,
            comms,
            inbox,
            source,
            settings,
        }
    }

    pub async fn run(mut self, model: &UtilityModel, stock: &mut StockTable) -> NegotiationOutcome {
        let round = self.round;
        let dropped = self
            .inbox
            .discard_parked(|envelope| is_negotiation_message(envelope) && envelope.round < round);
        if dropped > 0 {
            debug!(
                "Trader {} dropped {} stale negotiation messages before round {}",
                self.id, dropped, round
            );
        }

        let proposal = draft_proposal(model, stock);
        let mut outcome = NegotiationOutcome::new(proposal);
        info!("Trader {} round {} proposes {}", self.id, round, proposal);

        let (proposal_id, reached) = self.broadcast_proposal(proposal).await;
        let proposals = self.collect_proposals(&mut outcome).await;
        let reservations = self
            .respond(model, stock, &proposal, proposals, &mut outcome)
            .await;

        // A NoTrade broadcast expects no answer.
        if let ProposalContent::Offer(terms) = proposal {
            let accepts = self.collect_responses(proposal_id, reached, &mut outcome).await;
            self.finalize(terms, accepts, stock, &mut outcome).await;
        }

        if self.settings.settlement == Settlement::Bilateral && !reservations.is_empty() {
            self.await_settlements(reservations, stock, &mut outcome).await;
        }
        outcome
    }

    async fn broadcast_proposal(&mut self, proposal: ProposalContent) -> (Uuid, Vec<ParticipantId>) {
        let envelope = Envelope::new(
            self.id.clone(),
            self.round,
            Performative::Propose,
            proposal.to_string(),
        );
        let proposal_id = envelope.id;

        let mut reached = self.peers.clone();
        match self.comms.broadcast(&self.peers, envelope).await {
            Ok(failures) => {
                for (peer, error) in failures {
                    warn!("Trader {} could not propose to {} - {}", self.id, peer, error);
                    reached.retain(|reached_peer| reached_peer != &peer);
                }
            }
            Err(error) => {
                warn!("Trader {} proposal broadcast failed - {}", self.id, error);
                reached.clear();
            }
        }
        (proposal_id, reached)
    }

    async fn collect_proposals(
        &mut self,
        outcome: &mut NegotiationOutcome,
    ) -> Vec<(Envelope, ProposalContent)> {
        let round = self.round;
        let deadline = Instant::now() + self.settings.timeout;
        let mut pending = self.peers.clone();
        let mut proposals = Vec::new();

        while !pending.is_empty() {
            let next = self
                .inbox
                .next_matching(Some(deadline), |envelope| {
                    envelope.round == round
                        && envelope.performative == Performative::Propose
                        && pending.contains(&envelope.sender)
                })
                .await;
            let Some(envelope) = next else {
                self.timed_out("CollectProposals", pending, outcome);
                break;
            };

            pending.retain(|peer| peer != &envelope.sender);
            outcome.proposals_received += 1;
            match ProposalContent::from_str(&envelope.content) {
                Ok(content) => {
                    trace!(
                        "Trader {} received proposal {} from {}",
                        self.id,
                        content,
                        envelope.sender
                    );
                    proposals.push((envelope, content));
                }
                Err(error) => warn!(
                    "Trader {} skipping proposal from {} - {}",
                    self.id, envelope.sender, error
                ),
            }
        }
        proposals
    }

    async fn respond(
        &mut self,
        model: &UtilityModel,
        stock: &StockTable,
        own: &ProposalContent,
        proposals: Vec<(Envelope, ProposalContent)>,
        outcome: &mut NegotiationOutcome,
    ) -> Vec<Reservation> {
        let mut reserved = StockTable::default();
        let mut reservations = Vec::new();

        for (envelope, content) in proposals {
            let ProposalContent::Offer(terms) = content else {
                continue;
            };

            let available = available(stock, own, &reserved, terms.requested);
            let accept = is_acceptable(model, &terms) && available >= terms.requested_qty;
            let performative = if accept {
                Performative::AcceptProposal
            } else {
                Performative::RejectProposal
            };

            let response = envelope.reply(self.id.clone(), performative, envelope.content.clone());
            let accept_id = response.id;
            if let Err(error) = self.comms.send(&envelope.sender, response).await {
                warn!(
                    "Trader {} could not answer {} - {}",
                    self.id, envelope.sender, error
                );
                continue;
            }
            debug!(
                "Trader {} {} {} from {}",
                self.id, performative, terms, envelope.sender
            );

            if !accept {
                continue;
            }
            outcome.accepted.push(envelope.sender.clone());
            if self.settings.settlement == Settlement::Bilateral {
                reserved[terms.requested] += terms.requested_qty;
                reservations.push(Reservation {
                    accept_id,
                    proposer: envelope.sender,
                    terms,
                });
            }
        }
        reservations
    }

    async fn collect_responses(
        &mut self,
        proposal_id: Uuid,
        reached: Vec<ParticipantId>,
        outcome: &mut NegotiationOutcome,
    ) -> Vec<Envelope> {
        let round = self.round;
        let deadline = Instant::now() + self.settings.timeout;
        let mut pending = reached;
        let mut accepts = Vec::new();

        while !pending.is_empty() {
            let next = self
                .inbox
                .next_matching(Some(deadline), |envelope| {
                    envelope.round == round
                        && matches!(
                            envelope.performative,
                            Performative::AcceptProposal | Performative::RejectProposal
                        )
                        && envelope.is_reply_to(proposal_id)
                        && pending.contains(&envelope.sender)
                })
                .await;
            let Some(envelope) = next else {
                self.timed_out("CollectResponses", pending, outcome);
                break;
            };

            pending.retain(|peer| peer != &envelope.sender);
            if envelope.performative == Performative::AcceptProposal {
                accepts.push(envelope);
            }
        }
        accepts
    }

    async fn finalize(
        &mut self,
        terms: TradeTerms,
        accepts: Vec<Envelope>,
        stock: &mut StockTable,
        outcome: &mut NegotiationOutcome,
    ) {
        let Some(chosen) = pick_counterparty(accepts.len(), self.settings.tie_break, &mut *self.source)
        else {
            debug!("Trader {} proposal {} found no acceptor", self.id, terms);
            return;
        };

        if self.settings.settlement == Settlement::Bilateral {
            for (index, accept) in accepts.iter().enumerate() {
                let notice = if index == chosen {
                    SettlementNotice::Settle(terms)
                } else {
                    SettlementNotice::Release
                };
                let performative = match notice {
                    SettlementNotice::Settle(_) => Performative::Confirm,
                    SettlementNotice::Release => Performative::Cancel,
                };
                let envelope = accept.reply(self.id.clone(), performative, notice.to_string());
                if let Err(error) = self.comms.send(&accept.sender, envelope).await {
                    warn!(
                        "Trader {} could not send {} to {} - {}",
                        self.id, notice, accept.sender, error
                    );
                    if index == chosen {
                        return;
                    }
                }
            }
        }

        stock[terms.offered] = stock[terms.offered].saturating_sub(terms.offered_qty);
        stock[terms.requested] = stock[terms.requested].saturating_add(terms.requested_qty);
        let counterparty = accepts[chosen].sender.clone();
        info!(
            "Trader {} traded {} with {} out of {} accepts",
            self.id,
            terms,
            counterparty,
            accepts.len()
        );
        outcome.counterparty = Some(counterparty);
    }

    async fn await_settlements(
        &mut self,
        mut reservations: Vec<Reservation>,
        stock: &mut StockTable,
        outcome: &mut NegotiationOutcome,
    ) {
        let round = self.round;
        let deadline = Instant::now() + self.settings.timeout;

        while !reservations.is_empty() {
            let next = self
                .inbox
                .next_matching(Some(deadline), |envelope| {
                    envelope.round == round
                        && matches!(
                            envelope.performative,
                            Performative::Confirm | Performative::Cancel
                        )
                        && reservations
                            .iter()
                            .any(|reservation| envelope.is_reply_to(reservation.accept_id))
                })
                .await;
            let Some(envelope) = next else {
                let pending = reservations.iter().map(|r| r.proposer.clone()).collect();
                self.timed_out("AwaitSettlement", pending, outcome);
                break;
            };

            let Some(position) = reservations
                .iter()
                .position(|reservation| envelope.is_reply_to(reservation.accept_id))
            else {
                continue;
            };
            let reservation = reservations.swap_remove(position);

            match SettlementNotice::from_str(&envelope.content) {
                Ok(SettlementNotice::Settle(terms)) if terms == reservation.terms => {
                    stock[terms.requested] = stock[terms.requested].saturating_sub(terms.requested_qty);
                    stock[terms.offered] = stock[terms.offered].saturating_add(terms.offered_qty);
                    info!(
                        "Trader {} settled {} proposed by {}",
                        self.id, terms, reservation.proposer
                    );
                    outcome.settled.push(TradeProposal {
                        proposer: reservation.proposer,
                        terms,
                    });
                }
                Ok(SettlementNotice::Settle(terms)) => warn!(
                    "Trader {} ignoring settlement {} from {} not matching accepted {}",
                    self.id, terms, reservation.proposer, reservation.terms
                ),
                Ok(SettlementNotice::Release) => debug!(
                    "Trader {} released by {} for {}",
                    self.id, reservation.proposer, reservation.terms
                ),
                Err(error) => warn!(
                    "Trader {} skipping settlement from {} - {}",
                    self.id, reservation.proposer, error
                ),
            }
        }
    }

    fn timed_out(
        &self,
        phase: &'static str,
        missing: Vec<ParticipantId>,
        outcome: &mut NegotiationOutcome,
    ) {
        let error = BazaarError::Timeout {
            phase: phase.to_string(),
            missing,
        };
        warn!("Trader {} round {} - {}", self.id, self.round, error);
        outcome.timeouts.push(phase);
    }
}

// Stock of `commodity` not yet promised to the own offer or earlier accepts.
fn available(
    stock: &StockTable,
    own: &ProposalContent,
    reserved: &StockTable,
    commodity: Commodity,
) -> u32 {
    let offered = match own {
        ProposalContent::Offer(terms) if terms.offered == commodity => terms.offered_qty,
        _ => 0,
    };
    stock[commodity]
        .saturating_sub(offered)
        .saturating_sub(reserved[commodity])
}
