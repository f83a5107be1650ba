use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use crate::common::{error::BazaarError, types::ParticipantId};

use super::envelope::Envelope;

pub(super) struct Router {
    inbox_tx_map: HashMap<ParticipantId, mpsc::Sender<Envelope>>,
}

impl Router {
    pub(super) fn new() -> Self {
        Router {
            inbox_tx_map: HashMap::new(),
        }
    }

    pub(super) fn register_inbox_tx(
        &mut self,
        id: ParticipantId,
        tx: mpsc::Sender<Envelope>,
    ) -> Result<(), BazaarError> {
        debug!("register_inbox_tx() for {}", id);
        if self.inbox_tx_map.contains_key(&id) {
            let error = BazaarError::Simple(format!(
                "register_inbox_tx() for {} already registered",
                id
            ));
            Err(error)
        } else {
            self.inbox_tx_map.insert(id, tx);
            Ok(())
        }
    }

    pub(super) fn unregister_inbox_tx(&mut self, id: &ParticipantId) -> Result<(), BazaarError> {
        debug!("unregister_inbox_tx() for {}", id);
        if self.inbox_tx_map.remove(id).is_none() {
            Err(BazaarError::UnknownParticipant(id.clone()))
        } else {
            Ok(())
        }
    }

    /// Hands the envelope to the recipient's inbox without waiting on a full
    /// inbox, so one stuck participant cannot stall the router.
    pub(super) fn route(
        &self,
        to: &ParticipantId,
        envelope: Envelope,
    ) -> Result<(), BazaarError> {
        let Some(tx) = self.inbox_tx_map.get(to) else {
            return Err(BazaarError::UnknownParticipant(to.clone()));
        };
        tx.try_send(envelope)?;
        Ok(())
    }
}
