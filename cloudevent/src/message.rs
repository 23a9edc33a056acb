//! Binding-mode messages and the writers they are read into.
//!
//! A [`Message`] has exactly one read encoding. Structured messages hand a
//! serialised blob to a [`StructuredWriter`]; binary messages stream their
//! attributes, extensions and data into a [`BinaryWriter`]; event messages
//! already hold a decoded [`Event`].

use std::fmt;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::format::{self, Format};
use crate::types::Value;
use crate::version::{Attribute, AttributeKind};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Encoding {
    Structured,
    Binary,
    Event,
    Unknown,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Structured => "structured",
            Encoding::Binary => "binary",
            Encoding::Event => "event",
            Encoding::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Sink for a structured-mode blob.
pub trait StructuredWriter {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()>;
}

/// Sink for a binary-mode attribute stream.
///
/// Calls arrive as `start`, any number of `set_attribute`/`set_extension`,
/// at most one `set_data`, then `end`. Wrappers may defer work to `end`.
pub trait BinaryWriter {
    fn start(&mut self) -> Result<()>;

    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> Result<()>;

    fn set_extension(&mut self, name: &str, value: Value) -> Result<()>;

    fn set_data(&mut self, data: Bytes) -> Result<()>;

    fn end(&mut self) -> Result<()>;
}

impl<W: StructuredWriter + ?Sized> StructuredWriter for &mut W {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        (**self).set_structured_event(format, body)
    }
}

impl<W: StructuredWriter + ?Sized> StructuredWriter for Box<W> {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        (**self).set_structured_event(format, body)
    }
}

impl<W: BinaryWriter + ?Sized> BinaryWriter for &mut W {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> Result<()> {
        (**self).set_attribute(attribute, value)
    }

    fn set_extension(&mut self, name: &str, value: Value) -> Result<()> {
        (**self).set_extension(name, value)
    }

    fn set_data(&mut self, data: Bytes) -> Result<()> {
        (**self).set_data(data)
    }

    fn end(&mut self) -> Result<()> {
        (**self).end()
    }
}

impl<W: BinaryWriter + ?Sized> BinaryWriter for Box<W> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> Result<()> {
        (**self).set_attribute(attribute, value)
    }

    fn set_extension(&mut self, name: &str, value: Value) -> Result<()> {
        (**self).set_extension(name, value)
    }

    fn set_data(&mut self, data: Bytes) -> Result<()> {
        (**self).set_data(data)
    }

    fn end(&mut self) -> Result<()> {
        (**self).end()
    }
}

/// An inbound message in one of the binding modes.
///
/// `read_structured`/`read_binary` are only valid for the matching encoding
/// and are called at most once. `finish` consumes the message, so it runs at
/// most once by construction; the write dispatcher guarantees it runs.
pub trait Message {
    fn read_encoding(&self) -> Encoding;

    fn read_structured(&mut self, writer: &mut dyn StructuredWriter) -> Result<()> {
        let _ = writer;
        Err(Error::WrongEncoding {
            expected: Encoding::Structured,
            actual: self.read_encoding(),
        })
    }

    fn read_binary(&mut self, writer: &mut dyn BinaryWriter) -> Result<()> {
        let _ = writer;
        Err(Error::WrongEncoding {
            expected: Encoding::Binary,
            actual: self.read_encoding(),
        })
    }

    /// Fully decode the message.
    fn to_event(&mut self) -> Result<Event> {
        let mut writer = EventWriter::new();
        match self.read_encoding() {
            Encoding::Structured => self.read_structured(&mut writer)?,
            Encoding::Binary => self.read_binary(&mut writer)?,
            Encoding::Event | Encoding::Unknown => return Err(Error::UnknownEncoding),
        }
        writer.into_event()
    }

    /// Cheap metadata lookup without decoding, when the binding supports it.
    fn get_attribute(&self, kind: AttributeKind) -> Option<Value> {
        let _ = kind;
        None
    }

    fn get_extension(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }

    /// Acknowledge (`err` is `None`) or reject the message and release its
    /// resources.
    fn finish(self: Box<Self>, err: Option<&Error>) -> Result<()> {
        let _ = err;
        Ok(())
    }
}

/// Collects either write path into an [`Event`].
#[derive(Debug, Default)]
pub struct EventWriter {
    attributes: Vec<(Attribute, Value)>,
    extensions: Vec<(String, Value)>,
    data: Option<Bytes>,
    structured: Option<Event>,
}

impl EventWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_event(self) -> Result<Event> {
        if let Some(event) = self.structured {
            return Ok(event);
        }
        let version = self
            .attributes
            .iter()
            .find(|(a, _)| a.kind() == AttributeKind::SpecVersion)
            .or_else(|| self.attributes.first())
            .map(|(a, _)| a.version())
            .ok_or_else(|| Error::validation("binary message carries no attributes"))?;
        let mut event = Event::empty(version);
        for (attr, value) in self.attributes {
            if attr.kind() == AttributeKind::SpecVersion {
                continue;
            }
            if attr.version() != version {
                return Err(Error::validation(format!(
                    "attribute {attr} belongs to spec version {}, not {version}",
                    attr.version()
                )));
            }
            event.set_attribute(attr.kind(), Some(value))?;
        }
        for (name, value) in self.extensions {
            event.set_extension(&name, value)?;
        }
        match (&self.data, event.datacontenttype()) {
            (Some(_), None) => event.set_datacontenttype(Some(format::APPLICATION_JSON.to_string()))?,
            // A transport content type on an empty body describes no data.
            (None, Some(_)) => event.set_datacontenttype(None)?,
            _ => {}
        }
        event.set_data_bytes(self.data);
        event.validate()?;
        Ok(event)
    }
}

impl StructuredWriter for EventWriter {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        self.structured = Some(format.unmarshal(&body)?);
        Ok(())
    }
}

impl BinaryWriter for EventWriter {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> Result<()> {
        self.attributes.push((attribute, value));
        Ok(())
    }

    fn set_extension(&mut self, name: &str, value: Value) -> Result<()> {
        self.extensions.push((name.to_string(), value));
        Ok(())
    }

    fn set_data(&mut self, data: Bytes) -> Result<()> {
        if !data.is_empty() {
            self.data = Some(data);
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Stream an event into a binary writer.
pub fn write_event_binary(event: &Event, writer: &mut dyn BinaryWriter) -> Result<()> {
    writer.start()?;
    for (attr, value) in event.iter_attributes() {
        writer.set_attribute(attr, value)?;
    }
    for (name, value) in event.extensions() {
        writer.set_extension(name, value.clone())?;
    }
    if let Some(data) = event.data() {
        writer.set_data(data.clone())?;
    }
    writer.end()
}

/// Serialise an event with `format` into a structured writer.
pub fn write_event_structured(
    event: &Event,
    format: &dyn Format,
    writer: &mut dyn StructuredWriter,
) -> Result<()> {
    let body = format.marshal(event)?;
    writer.set_structured_event(format, body)
}

/// An already decoded event viewed as a message.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        EventMessage { event }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_inner(self) -> Event {
        self.event
    }
}

impl From<Event> for EventMessage {
    fn from(event: Event) -> Self {
        EventMessage::new(event)
    }
}

impl Message for EventMessage {
    fn read_encoding(&self) -> Encoding {
        Encoding::Event
    }

    fn read_structured(&mut self, writer: &mut dyn StructuredWriter) -> Result<()> {
        write_event_structured(&self.event, &format::JsonFormat, writer)
    }

    fn read_binary(&mut self, writer: &mut dyn BinaryWriter) -> Result<()> {
        write_event_binary(&self.event, writer)
    }

    fn to_event(&mut self) -> Result<Event> {
        Ok(self.event.clone())
    }

    fn get_attribute(&self, kind: AttributeKind) -> Option<Value> {
        self.event.attribute(kind)
    }

    fn get_extension(&self, name: &str) -> Option<Value> {
        self.event.extension(name).cloned()
    }
}
