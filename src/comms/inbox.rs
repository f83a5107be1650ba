use std::collections::VecDeque;

use tokio::{
    sync::mpsc,
    time::{timeout_at, Instant},
};
use tracing::trace;

use super::envelope::Envelope;

/// Receiving end of a participant's mailbox.
///
/// Envelopes pulled off the channel that the current wait is not interested in
/// are parked, and later waits look at parked envelopes before the channel.
/// Per sender ordering is kept since parking is FIFO.
pub struct Inbox {
    rx: mpsc::Receiver<Envelope>,
    parked: VecDeque<Envelope>,
}

impl Inbox {
    pub fn new(rx: mpsc::Receiver<Envelope>) -> Self {
        Self {
            rx,
            parked: VecDeque::new(),
        }
    }

    /// Next envelope straight off the channel. Cancel safe.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Next envelope off the channel, or `None` once `deadline` passes or the
    /// channel closes. A `None` deadline waits without bound.
    pub async fn recv_until(&mut self, deadline: Option<Instant>) -> Option<Envelope> {
        match deadline {
            Some(deadline) => timeout_at(deadline, self.rx.recv()).await.ok().flatten(),
            None => self.rx.recv().await,
        }
    }

    pub fn park(&mut self, envelope: Envelope) {
        trace!(
            "Parking {} envelope {} from {}",
            envelope.performative,
            envelope.id,
            envelope.sender
        );
        self.parked.push_back(envelope);
    }

    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    /// Removes and returns the first parked envelope matching `pred`.
    pub fn take_parked(&mut self, mut pred: impl FnMut(&Envelope) -> bool) -> Option<Envelope> {
        let position = self.parked.iter().position(|envelope| pred(envelope))?;
        self.parked.remove(position)
    }

    /// Drops parked envelopes matching `pred`, returning how many were dropped.
    pub fn discard_parked(&mut self, mut pred: impl FnMut(&Envelope) -> bool) -> usize {
        let before = self.parked.len();
        self.parked.retain(|envelope| !pred(envelope));
        before - self.parked.len()
    }

    /// Waits for the first envelope matching `pred`, parked ones first. Anything
    /// else received in the meantime is parked. Returns `None` on deadline.
    pub async fn next_matching(
        &mut self,
        deadline: Option<Instant>,
        mut pred: impl FnMut(&Envelope) -> bool,
    ) -> Option<Envelope> {
        if let Some(envelope) = self.take_parked(&mut pred) {
            return Some(envelope);
        }

        loop {
            let envelope = self.recv_until(deadline).await?;
            if pred(&envelope) {
                return Some(envelope);
            }
            self.park(envelope);
        }
    }
}
