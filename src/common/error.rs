use std::{error::Error, fmt};

use super::types::ParticipantId;

#[derive(Debug)]
pub enum BazaarError {
    Simple(String),
    MalformedMessage(String),
    Timeout {
        phase: String,
        missing: Vec<ParticipantId>,
    },
    NoParticipants(String),
    UnknownParticipant(ParticipantId),
    StrumParsing(strum::ParseError),
    IntParsing(std::num::ParseIntError),
    SerdesJson(serde_json::Error),
    Io(std::io::Error),
    MpscSend(String),
    OneshotRecv(String),
}

impl BazaarError {
    pub fn malformed(content: impl AsRef<str>, reason: impl AsRef<str>) -> Self {
        BazaarError::MalformedMessage(format!(
            "'{}' - {}",
            content.as_ref(),
            reason.as_ref()
        ))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BazaarError::Timeout { .. })
    }
}

impl Error for BazaarError {}

impl fmt::Display for BazaarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let error_string = match self {
            BazaarError::Simple(msg) => format!("Bazaar-Error | Other - {}", msg),
            BazaarError::MalformedMessage(msg) => {
                format!("Bazaar-Error | MalformedMessage - {}", msg)
            }
            BazaarError::Timeout { phase, missing } => {
                let missing: Vec<String> = missing.iter().map(|id| id.to_string()).collect();
                format!(
                    "Bazaar-Error | Timeout - {} expired waiting on [{}]",
                    phase,
                    missing.join(", ")
                )
            }
            BazaarError::NoParticipants(capability) => {
                format!(
                    "Bazaar-Error | NoParticipants - No participant registered for capability '{}'",
                    capability
                )
            }
            BazaarError::UnknownParticipant(id) => {
                format!("Bazaar-Error | UnknownParticipant - {}", id)
            }
            BazaarError::StrumParsing(err) => {
                format!("Bazaar-Error | StrumParseError - {}", err)
            }
            BazaarError::IntParsing(err) => {
                format!("Bazaar-Error | ParseIntError - {}", err)
            }
            BazaarError::SerdesJson(err) => {
                format!("Bazaar-Error | SerdesJsonError - {}", err)
            }
            BazaarError::Io(err) => format!("Bazaar-Error | IoError - {}", err),
            BazaarError::MpscSend(msg) => {
                format!("Bazaar-Error | MpscSendError - {}", msg)
            }
            BazaarError::OneshotRecv(msg) => {
                format!("Bazaar-Error | OneshotRecvError - {}", msg)
            }
        };
        write!(f, "{}", error_string)
    }
}

impl From<strum::ParseError> for BazaarError {
    fn from(e: strum::ParseError) -> BazaarError {
        BazaarError::StrumParsing(e)
    }
}

impl From<std::num::ParseIntError> for BazaarError {
    fn from(e: std::num::ParseIntError) -> BazaarError {
        BazaarError::IntParsing(e)
    }
}

impl From<serde_json::Error> for BazaarError {
    fn from(e: serde_json::Error) -> BazaarError {
        BazaarError::SerdesJson(e)
    }
}

impl From<std::io::Error> for BazaarError {
    fn from(e: std::io::Error) -> BazaarError {
        BazaarError::Io(e)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for BazaarError {
    fn from(e: tokio::sync::mpsc::error::SendError<T>) -> BazaarError {
        BazaarError::MpscSend(e.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::TrySendError<T>> for BazaarError {
    fn from(e: tokio::sync::mpsc::error::TrySendError<T>) -> BazaarError {
        BazaarError::MpscSend(e.to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for BazaarError {
    fn from(e: tokio::sync::oneshot::error::RecvError) -> BazaarError {
        BazaarError::OneshotRecv(e.to_string())
    }
}
