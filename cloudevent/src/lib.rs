//! Transport-neutral CloudEvents core.
//!
//! An [`Event`] is the in-memory form of a CloudEvent in any of the supported
//! spec versions. A [`Message`] is the same event as a transport sees it, in
//! structured, binary or event encoding, and [`write`] moves a message into
//! whichever writer the destination offers, running [`Transformers`] on the
//! way. Transport bindings for Kafka, NATS and AMQP live in [`binding`]; the
//! HTTP binding is a separate crate.

pub mod binding;
pub mod buffering;
pub mod context;
pub mod error;
pub mod event;
pub mod format;
pub mod message;
pub mod observability;
pub mod result;
pub mod retry;
pub mod sql;
pub mod transformer;
pub mod types;
pub mod version;
pub mod write;

pub use buffering::{buffer, copy_message, BufferedMessage};
pub use context::Context;
pub use error::{Error, ErrorKind, Result};
pub use event::{Event, EventBuilder, Reader, Writer};
pub use format::Format;
pub use message::{BinaryWriter, Encoding, EventMessage, Message, StructuredWriter};
pub use observability::ObservabilityService;
pub use result::DeliveryResult;
pub use retry::{Backoff, RetryParams};
pub use transformer::{TransformerFactory, Transformers};
pub use types::Value;
pub use version::{Attribute, AttributeKind, SpecVersion, Versions};
pub use write::{forward, to_event, write};
