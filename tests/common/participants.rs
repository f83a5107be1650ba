use std::str::FromStr;

use spice_bazaar::{
    common::types::{ParticipantId, StockTable},
    comms::{CommsAccess, Envelope, Inbox, Performative},
    protocol::{PriceUpdate, ProposalContent, ACK, HOLD, NO_TRADE, STOCK_REQUEST},
};

/// How a scripted participant answers the coordinator.
#[derive(Clone, Copy, Debug)]
pub enum FakeBehaviour {
    /// Receives everything, answers nothing.
    Silent,
    /// Acknowledges rounds but sends garbage for stock and sales.
    Malformed,
    /// Always reports the same stock, holds, and never trades.
    Fixed(StockTable),
}

/// A participant under the market capability driven by a script instead of
/// a utility model.
pub struct FakeParticipant {
    pub id: ParticipantId,
    pub task_handle: tokio::task::JoinHandle<()>,
}

impl FakeParticipant {
    pub async fn start(
        comms: &CommsAccess,
        name: &str,
        behaviour: FakeBehaviour,
    ) -> anyhow::Result<Self> {
        let id = ParticipantId::from(name);
        let inbox = comms.open_inbox(id.clone(), "market").await?;
        let actor = FakeActor {
            id: id.clone(),
            comms: comms.clone(),
            inbox,
            behaviour,
        };
        let task_handle = tokio::spawn(async move { actor.run().await });
        Ok(Self { id, task_handle })
    }
}

struct FakeActor {
    id: ParticipantId,
    comms: CommsAccess,
    inbox: Inbox,
    behaviour: FakeBehaviour,
}

impl FakeActor {
    async fn run(mut self) {
        while let Some(envelope) = self.inbox.recv().await {
            match self.behaviour {
                FakeBehaviour::Silent => {}
                FakeBehaviour::Malformed => self.garbled(envelope).await,
                FakeBehaviour::Fixed(stock) => self.fixed(stock, envelope).await,
            }
        }
    }

    async fn garbled(&self, envelope: Envelope) {
        let content = match envelope.performative {
            Performative::Request if envelope.content == STOCK_REQUEST => "ten,fifteen",
            Performative::Request => ACK,
            Performative::Inform => "lots of spice",
            _ => return,
        };
        let performative = match content {
            ACK => Performative::Confirm,
            _ => Performative::Inform,
        };
        self.reply(&envelope, performative, content).await;
    }

    async fn fixed(&self, stock: StockTable, envelope: Envelope) {
        match envelope.performative {
            Performative::Request if envelope.content == STOCK_REQUEST => {
                self.reply(&envelope, Performative::Inform, &stock.to_string())
                    .await;
            }
            Performative::Request => self.reply(&envelope, Performative::Confirm, ACK).await,
            Performative::Inform => {
                if let Ok(update) = PriceUpdate::from_str(&envelope.content) {
                    let peers: Vec<ParticipantId> = update
                        .peers
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|peer| peer != &self.id)
                        .collect();
                    let no_trade =
                        Envelope::new(self.id.clone(), envelope.round, Performative::Propose, NO_TRADE);
                    let _ = self.comms.broadcast(&peers, no_trade).await;
                }
                self.reply(&envelope, Performative::Inform, HOLD).await;
            }
            Performative::Propose => {
                if let Ok(ProposalContent::Offer(_)) = ProposalContent::from_str(&envelope.content) {
                    let content = envelope.content.clone();
                    self.reply(&envelope, Performative::RejectProposal, &content)
                        .await;
                }
            }
            _ => {}
        }
    }

    async fn reply(&self, envelope: &Envelope, performative: Performative, content: &str) {
        let reply = envelope.reply(self.id.clone(), performative, content);
        let _ = self.comms.send(&envelope.sender, reply).await;
    }
}
