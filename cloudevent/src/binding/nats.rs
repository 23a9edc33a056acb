//! NATS messages. The subject carries no event metadata, so only
//! structured mode exists on the wire.

use bytes::Bytes;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::format::{self, Format, JsonFormat};
use crate::message::{Encoding, Message, StructuredWriter};
use crate::transformer::Transformers;
use crate::write;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NatsMsg {
    pub subject: String,
    pub reply: Option<String>,
    pub data: Bytes,
}

/// Inbound NATS message, decoded with the JSON format.
#[derive(Debug, Clone)]
pub struct NatsMessage {
    msg: NatsMsg,
}

impl NatsMessage {
    pub fn new(msg: NatsMsg) -> Self {
        NatsMessage { msg }
    }

    pub fn subject(&self) -> &str {
        &self.msg.subject
    }
}

impl Message for NatsMessage {
    fn read_encoding(&self) -> Encoding {
        Encoding::Structured
    }

    fn read_structured(&mut self, writer: &mut dyn StructuredWriter) -> Result<()> {
        writer.set_structured_event(&JsonFormat, self.msg.data.clone())
    }
}

#[derive(Debug)]
pub struct NatsWriter {
    msg: NatsMsg,
}

impl NatsWriter {
    pub fn new(subject: impl Into<String>) -> Self {
        NatsWriter {
            msg: NatsMsg {
                subject: subject.into(),
                ..NatsMsg::default()
            },
        }
    }

    pub fn into_msg(self) -> NatsMsg {
        self.msg
    }
}

impl StructuredWriter for NatsWriter {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        if !format::is_json_media_type(format.media_type()) {
            return Err(Error::encode(format!(
                "nats carries JSON only, not {}",
                format.media_type()
            )));
        }
        self.msg.data = body;
        Ok(())
    }
}

/// Encode `message` for publishing on `subject`.
pub fn write_nats_msg(
    ctx: &Context,
    message: &mut dyn Message,
    subject: &str,
    transformers: &Transformers,
) -> Result<NatsMsg> {
    let mut writer = NatsWriter::new(subject);
    write::write(ctx, message, Some(&mut writer), None, transformers)?;
    Ok(writer.into_msg())
}

/// What a JetStream stream does with acknowledged messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    #[default]
    Limits,
    Interest,
    WorkQueue,
}

/// Publishing through JetStream additionally needs a stream to bind to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JetStreamOptions {
    pub stream: String,
    pub subjects: Vec<String>,
    pub retention: Retention,
}

impl JetStreamOptions {
    pub fn new(stream: impl Into<String>, subject: impl Into<String>) -> Self {
        JetStreamOptions {
            stream: stream.into(),
            subjects: vec![subject.into()],
            retention: Retention::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream.is_empty() {
            return Err(Error::validation("jetstream needs a stream name"));
        }
        if self.stream.contains(['.', '*', '>', ' ']) {
            return Err(Error::validation(format!(
                "invalid jetstream stream name '{}'",
                self.stream
            )));
        }
        if self.subjects.iter().any(String::is_empty) {
            return Err(Error::validation("jetstream subjects must not be empty"));
        }
        Ok(())
    }
}
