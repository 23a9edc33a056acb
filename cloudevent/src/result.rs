//! Delivery outcomes of send, request and receive operations.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};

/// What happened to an event handed to a transport.
#[derive(Debug)]
pub enum DeliveryResult {
    /// Delivered and accepted.
    Ack,
    /// Delivered, not accepted.
    Nack { status: u16 },
    /// Never reached the peer.
    Undelivered(Error),
    /// The terminal result of a retry loop.
    Retries {
        last: Box<DeliveryResult>,
        retries: u32,
        duration: Duration,
        history: Vec<DeliveryResult>,
    },
}

impl DeliveryResult {
    /// Map a peer status: 2xx acknowledges, anything else rejects.
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            DeliveryResult::Ack
        } else {
            DeliveryResult::Nack { status }
        }
    }

    /// The result with any retry wrapper removed.
    pub fn terminal(&self) -> &DeliveryResult {
        match self {
            DeliveryResult::Retries { last, .. } => last.terminal(),
            other => other,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self.terminal(), DeliveryResult::Ack)
    }

    pub fn is_nack(&self) -> bool {
        matches!(self.terminal(), DeliveryResult::Nack { .. })
    }

    pub fn is_undelivered(&self) -> bool {
        matches!(self.terminal(), DeliveryResult::Undelivered(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self.terminal() {
            DeliveryResult::Nack { status } => Some(*status),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self.terminal() {
            DeliveryResult::Undelivered(err) => Some(err),
            _ => None,
        }
    }

    /// Number of retries performed, zero outside a retry loop.
    pub fn retries(&self) -> u32 {
        match self {
            DeliveryResult::Retries { retries, .. } => *retries,
            _ => 0,
        }
    }

    pub fn history(&self) -> &[DeliveryResult] {
        match self {
            DeliveryResult::Retries { history, .. } => history,
            _ => &[],
        }
    }

    /// Collapse into a plain result; a NACK becomes a protocol error.
    pub fn into_result(self) -> Result<()> {
        match self {
            DeliveryResult::Ack => Ok(()),
            DeliveryResult::Nack { status } => Err(Error::Protocol { status }),
            DeliveryResult::Undelivered(err) => Err(err),
            DeliveryResult::Retries { last, .. } => last.into_result(),
        }
    }
}

impl From<Error> for DeliveryResult {
    fn from(err: Error) -> Self {
        match err {
            Error::Protocol { status } => DeliveryResult::Nack { status },
            err => DeliveryResult::Undelivered(err),
        }
    }
}

impl From<Result<()>> for DeliveryResult {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => DeliveryResult::Ack,
            Err(err) => err.into(),
        }
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryResult::Ack => f.write_str("ACK"),
            DeliveryResult::Nack { status } => write!(f, "NACK({status})"),
            DeliveryResult::Undelivered(err) => {
                if err.kind() == ErrorKind::Cancellation {
                    f.write_str("undelivered: cancelled")
                } else {
                    write!(f, "undelivered: {err}")
                }
            }
            DeliveryResult::Retries {
                last,
                retries,
                duration,
                ..
            } => write!(f, "{last} after {retries} retries in {duration:?}"),
        }
    }
}
