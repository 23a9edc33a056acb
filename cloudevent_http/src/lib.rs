//! HTTP binding for the `cloudevent` core.
//!
//! Binary mode carries attributes in `ce-` headers with `datacontenttype`
//! in `Content-Type`; structured mode carries the serialised event in the
//! body. [`receiver::Receiver`] serves events to a handler on actix-web and
//! [`sender::Sender`] delivers them through a pluggable [`sender::Requester`].

pub mod message;
pub mod receiver;
pub mod response_writer;
pub mod sender;
pub mod status;
pub mod writer;

use std::sync::OnceLock;

use cloudevent::Versions;

pub use message::HttpMessage;
pub use receiver::{Handler, Receiver, ReceiverConfig, WebhookConfig};
pub use sender::{Requester, Sender};
pub use writer::{write_request, HeaderWriter, InboundResponse, OutboundRequest};

pub const PREFIX: &str = "ce-";

/// The attribute registry with `ce-` headers and `Content-Type` for
/// `datacontenttype`.
pub fn versions() -> &'static Versions {
    static VERSIONS: OnceLock<Versions> = OnceLock::new();
    VERSIONS.get_or_init(|| Versions::new(PREFIX).with_content_type("content-type"))
}
