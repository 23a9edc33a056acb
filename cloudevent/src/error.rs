use thiserror::Error;

use crate::message::Encoding;

/// Coarse classification of an [`Error`], used by retry and result mapping.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// The event violates an invariant. Never retried.
    Validation,
    /// The message encoding is unknown or a conversion is impossible.
    Encoding,
    /// Media type unregistered or payload malformed.
    Format,
    /// I/O failure before the peer answered.
    Transport,
    /// The peer answered with a non-success status.
    Protocol,
    /// The caller cancelled the operation.
    Cancellation,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid event: {message}")]
    Validation { message: String },

    #[error("unknown message encoding")]
    UnknownEncoding,

    #[error("message has {actual} encoding, cannot read it as {expected}")]
    WrongEncoding { expected: Encoding, actual: Encoding },

    #[error("no writer available for {0} encoding")]
    NoWriter(Encoding),

    #[error("message was already read")]
    AlreadyRead,

    #[error("no format registered for media type '{media_type}'")]
    FormatNotFound { media_type: String },

    #[error("{}", decode_message(.field, .message))]
    Decode {
        field: Option<String>,
        message: String,
    },

    #[error("cannot encode event: {message}")]
    Encode { message: String },

    #[error("transport error: {message}")]
    Transport { message: String, timeout: bool },

    #[error("peer answered with status {status}")]
    Protocol { status: u16 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{primary} (finish also failed: {secondary})")]
    Finish {
        #[source]
        primary: Box<Error>,
        secondary: Box<Error>,
    },
}

fn decode_message(field: &Option<String>, message: &str) -> String {
    match field {
        Some(field) => format!("cannot decode field '{field}': {message}"),
        None => format!("cannot decode event: {message}"),
    }
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Error::Decode {
            field: None,
            message: message.into(),
        }
    }

    pub fn decode_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Decode {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Error::Encode {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
            timeout: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
            timeout: true,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::UnknownEncoding
            | Error::WrongEncoding { .. }
            | Error::NoWriter(_)
            | Error::AlreadyRead => ErrorKind::Encoding,
            Error::FormatNotFound { .. } | Error::Decode { .. } | Error::Encode { .. } => {
                ErrorKind::Format
            }
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Protocol { .. } => ErrorKind::Protocol,
            Error::Cancelled => ErrorKind::Cancellation,
            Error::Finish { primary, .. } => primary.kind(),
        }
    }

    /// True for timeout-class transport failures, the only errors the retry
    /// loop retries without looking at a status code.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Transport { timeout, .. } => *timeout,
            Error::Finish { primary, .. } => primary.is_timeout(),
            _ => false,
        }
    }

    /// Combine an operation outcome with the outcome of `finish`.
    ///
    /// A prior error wins; a finish error is only reported on its own when the
    /// operation itself succeeded.
    pub fn merge_finish<T>(result: Result<T, Error>, finish: Result<(), Error>) -> Result<T, Error> {
        match (result, finish) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(finish)) => Err(finish),
            (Err(primary), Ok(())) => Err(primary),
            (Err(primary), Err(secondary)) => Err(Error::Finish {
                primary: Box::new(primary),
                secondary: Box::new(secondary),
            }),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
