use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};
use uuid::Uuid;

use crate::common::types::ParticipantId;

/// Communicative act carried alongside the content string.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Display, IntoStaticStr)]
pub enum Performative {
    Request,
    Inform,
    Confirm,
    Propose,
    AcceptProposal,
    RejectProposal,
    Cancel,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub sender: ParticipantId,
    pub in_reply_to: Option<Uuid>,
    pub round: u32,
    pub performative: Performative,
    pub content: String,
}

impl Envelope {
    pub fn new(
        sender: ParticipantId,
        round: u32,
        performative: Performative,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            in_reply_to: None,
            round,
            performative,
            content: content.into(),
        }
    }

    /// Builds a reply from `sender`, tagged with this envelope's round and id.
    pub fn reply(
        &self,
        sender: ParticipantId,
        performative: Performative,
        content: impl Into<String>,
    ) -> Envelope {
        Envelope {
            id: Uuid::new_v4(),
            sender,
            in_reply_to: Some(self.id),
            round: self.round,
            performative,
            content: content.into(),
        }
    }

    pub fn is_reply_to(&self, id: Uuid) -> bool {
        self.in_reply_to == Some(id)
    }
}
