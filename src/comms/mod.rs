mod comms;
mod directory;
mod envelope;
mod inbox;
mod router;

pub use comms::{Comms, CommsAccess, DeliveryFailure};
pub use envelope::{Envelope, Performative};
pub use inbox::Inbox;
