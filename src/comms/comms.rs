use strum_macros::{Display, IntoStaticStr};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::common::{error::BazaarError, types::ParticipantId};

use super::directory::Directory;
use super::envelope::Envelope;
use super::inbox::Inbox;
use super::router::Router;

pub type DeliveryFailure = (ParticipantId, BazaarError);

#[derive(Clone)]
pub struct CommsAccess {
    tx: mpsc::Sender<CommsRequest>,
}

impl CommsAccess {
    pub(super) fn new(tx: mpsc::Sender<CommsRequest>) -> Self {
        Self { tx }
    }

    /// Creates a mailbox for `id`, registers it for routing and advertises it
    /// under `capability`.
    pub async fn open_inbox(
        &self,
        id: ParticipantId,
        capability: impl Into<String>,
    ) -> Result<Inbox, BazaarError> {
        let (inbox_tx, inbox_rx) = mpsc::channel::<Envelope>(Comms::INBOX_CHANNEL_SIZE);
        self.register(id, capability, inbox_tx).await?;
        Ok(Inbox::new(inbox_rx))
    }

    pub async fn register(
        &self,
        id: ParticipantId,
        capability: impl Into<String>,
        inbox_tx: mpsc::Sender<Envelope>,
    ) -> Result<(), BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), BazaarError>>();
        let request = CommsRequest::Register {
            id,
            capability: capability.into(),
            inbox_tx,
            rsp_tx,
        };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn deregister(&self, id: ParticipantId) -> Result<(), BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), BazaarError>>();
        let request = CommsRequest::Deregister { id, rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn search(&self, capability: impl Into<String>) -> Result<Vec<ParticipantId>, BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Vec<ParticipantId>>();
        let request = CommsRequest::Search {
            capability: capability.into(),
            rsp_tx,
        };
        self.tx.send(request).await?;
        Ok(rsp_rx.await?)
    }

    pub async fn send(&self, to: &ParticipantId, envelope: Envelope) -> Result<(), BazaarError> {
        let mut failures = self.broadcast(std::slice::from_ref(to), envelope).await?;
        match failures.pop() {
            Some((_, error)) => Err(error),
            None => Ok(()),
        }
    }

    /// Delivers a copy of `envelope` to every recipient. Per recipient failures
    /// are returned rather than failing the whole delivery.
    pub async fn broadcast(
        &self,
        recipients: &[ParticipantId],
        envelope: Envelope,
    ) -> Result<Vec<DeliveryFailure>, BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Vec<DeliveryFailure>>();
        let request = CommsRequest::Deliver {
            recipients: recipients.to_vec(),
            envelope,
            rsp_tx,
        };
        self.tx.send(request).await?;
        Ok(rsp_rx.await?)
    }

    pub async fn shutdown(&self) -> Result<(), BazaarError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<()>();
        let request = CommsRequest::Shutdown { rsp_tx };
        self.tx.send(request).await?; // Shutdown is allowed to fail if already shutdown
        Ok(rsp_rx.await?)
    }
}

pub struct Comms {
    tx: mpsc::Sender<CommsRequest>,
    pub task_handle: tokio::task::JoinHandle<()>,
}

impl Comms {
    const COMMS_REQUEST_CHANNEL_SIZE: usize = 100;
    pub(crate) const INBOX_CHANNEL_SIZE: usize = 256;

    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<CommsRequest>(Self::COMMS_REQUEST_CHANNEL_SIZE);
        let actor = CommsActor::new(rx);
        let task_handle = tokio::spawn(async move { actor.run().await });
        Self { tx, task_handle }
    }

    pub fn new_accessor(&self) -> CommsAccess {
        CommsAccess::new(self.tx.clone())
    }
}

impl Default for Comms {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Display, IntoStaticStr)]
pub(super) enum CommsRequest {
    Register {
        id: ParticipantId,
        capability: String,
        inbox_tx: mpsc::Sender<Envelope>,
        rsp_tx: oneshot::Sender<Result<(), BazaarError>>,
    },
    Deregister {
        id: ParticipantId,
        rsp_tx: oneshot::Sender<Result<(), BazaarError>>,
    },
    Search {
        capability: String,
        rsp_tx: oneshot::Sender<Vec<ParticipantId>>,
    },
    Deliver {
        recipients: Vec<ParticipantId>,
        envelope: Envelope,
        rsp_tx: oneshot::Sender<Vec<DeliveryFailure>>,
    },
    Shutdown {
        rsp_tx: oneshot::Sender<()>,
    },
}

struct CommsActor {
    rx: mpsc::Receiver<CommsRequest>,
    router: Router,
    directory: Directory,
}

impl CommsActor {
    fn new(rx: mpsc::Receiver<CommsRequest>) -> Self {
        CommsActor {
            rx,
            router: Router::new(),
            directory: Directory::new(),
        }
    }

    async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            if self.handle_request(request) {
                break;
            }
        }
        info!("Comms terminating");
    }

    fn handle_request(&mut self, request: CommsRequest) -> bool {
        let mut terminate = false;
        trace!("Comms handle_request() of type {}", request);

        match request {
            CommsRequest::Register {
                id,
                capability,
                inbox_tx,
                rsp_tx,
            } => {
                let result = self.register(id, capability, inbox_tx);
                if rsp_tx.send(result).is_err() {
                    warn!("Comms register requester went away before the response");
                }
            }
            CommsRequest::Deregister { id, rsp_tx } => {
                self.directory.deregister(&id);
                let result = self.router.unregister_inbox_tx(&id);
                if rsp_tx.send(result).is_err() {
                    warn!("Comms deregister requester went away before the response");
                }
            }
            CommsRequest::Search { capability, rsp_tx } => {
                let found = self.directory.search(&capability);
                if rsp_tx.send(found).is_err() {
                    warn!("Comms search requester went away before the response");
                }
            }
            CommsRequest::Deliver {
                recipients,
                envelope,
                rsp_tx,
            } => {
                let failures = self.deliver(recipients, envelope);
                if rsp_tx.send(failures).is_err() {
                    warn!("Comms deliver requester went away before the response");
                }
            }
            CommsRequest::Shutdown { rsp_tx } => {
                let _ = rsp_tx.send(());
                terminate = true;
            }
        }
        terminate
    }

    fn register(
        &mut self,
        id: ParticipantId,
        capability: String,
        inbox_tx: mpsc::Sender<Envelope>,
    ) -> Result<(), BazaarError> {
        self.router.register_inbox_tx(id.clone(), inbox_tx)?;
        debug!("Comms registered {} under capability '{}'", id, capability);
        self.directory.register(id, capability);
        Ok(())
    }

    fn deliver(&mut self, recipients: Vec<ParticipantId>, envelope: Envelope) -> Vec<DeliveryFailure> {
        let mut failures = Vec::new();
        for recipient in recipients {
            trace!(
                "Comms routing {} '{}' from {} to {}",
                envelope.performative,
                envelope.content,
                envelope.sender,
                recipient
            );
            if let Err(error) = self.router.route(&recipient, envelope.clone()) {
                failures.push((recipient, error));
            }
        }
        failures
    }
}
