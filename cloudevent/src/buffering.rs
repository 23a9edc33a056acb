//! In-memory copies of messages.
//!
//! Transport messages are often single-read streams. A [`BufferedMessage`]
//! owns its bytes, keeps the source encoding and can be read any number of
//! times, e.g. to fan one inbound message out to several writers.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::format::{self, Format};
use crate::message::{BinaryWriter, Encoding, EventWriter, Message, StructuredWriter};
use crate::types::Value;
use crate::version::{Attribute, AttributeKind};

#[derive(Debug, Clone)]
pub enum BufferedMessage {
    Structured {
        format: Arc<dyn Format>,
        body: Bytes,
    },
    Binary {
        attributes: Vec<(Attribute, Value)>,
        extensions: Vec<(String, Value)>,
        data: Option<Bytes>,
    },
    Event(Event),
}

/// Copy `message` without finishing it.
///
/// Structured formats are resolved again through the global registry, so a
/// structured source must use a registered media type.
pub fn copy_message(message: &mut dyn Message) -> Result<BufferedMessage> {
    match message.read_encoding() {
        Encoding::Structured => {
            let mut recorder = StructuredRecorder::default();
            message.read_structured(&mut recorder)?;
            recorder.into_message()
        }
        Encoding::Binary => {
            let mut recorder = BinaryRecorder::default();
            message.read_binary(&mut recorder)?;
            Ok(BufferedMessage::Binary {
                attributes: recorder.attributes,
                extensions: recorder.extensions,
                data: recorder.data,
            })
        }
        Encoding::Event => Ok(BufferedMessage::Event(message.to_event()?)),
        Encoding::Unknown => Err(Error::UnknownEncoding),
    }
}

/// Copy `message`, then finish it. The source is released even when the
/// copy fails.
pub fn buffer(message: Box<dyn Message + '_>) -> Result<BufferedMessage> {
    let mut message = message;
    let copied = copy_message(&mut *message);
    let finished = message.finish(copied.as_ref().err());
    Error::merge_finish(copied, finished)
}

#[derive(Default)]
struct StructuredRecorder {
    media_type: Option<String>,
    body: Bytes,
}

impl StructuredRecorder {
    fn into_message(self) -> Result<BufferedMessage> {
        let media_type = self.media_type.ok_or(Error::AlreadyRead)?;
        let format = format::registry().get(&media_type)?;
        Ok(BufferedMessage::Structured {
            format,
            body: self.body,
        })
    }
}

impl StructuredWriter for StructuredRecorder {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        self.media_type = Some(format.media_type().to_string());
        self.body = body;
        Ok(())
    }
}

#[derive(Default)]
struct BinaryRecorder {
    attributes: Vec<(Attribute, Value)>,
    extensions: Vec<(String, Value)>,
    data: Option<Bytes>,
}

impl BinaryWriter for BinaryRecorder {
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
        self.data = Some(data);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

impl BufferedMessage {
    pub fn encoding(&self) -> Encoding {
        match self {
            BufferedMessage::Structured { .. } => Encoding::Structured,
            BufferedMessage::Binary { .. } => Encoding::Binary,
            BufferedMessage::Event(_) => Encoding::Event,
        }
    }
}

impl Message for BufferedMessage {
    fn read_encoding(&self) -> Encoding {
        self.encoding()
    }

    fn read_structured(&mut self, writer: &mut dyn StructuredWriter) -> Result<()> {
        match self {
            BufferedMessage::Structured { format, body } => {
                writer.set_structured_event(format.as_ref(), body.clone())
            }
            other => Err(Error::WrongEncoding {
                expected: Encoding::Structured,
                actual: other.encoding(),
            }),
        }
    }

    fn read_binary(&mut self, writer: &mut dyn BinaryWriter) -> Result<()> {
        let actual = self.encoding();
        let BufferedMessage::Binary {
            attributes,
            extensions,
            data,
        } = self
        else {
            return Err(Error::WrongEncoding {
                expected: Encoding::Binary,
                actual,
            });
        };
        writer.start()?;
        for (attribute, value) in attributes.iter() {
            writer.set_attribute(*attribute, value.clone())?;
        }
        for (name, value) in extensions.iter() {
            writer.set_extension(name, value.clone())?;
        }
        if let Some(data) = data {
            writer.set_data(data.clone())?;
        }
        writer.end()
    }

    fn to_event(&mut self) -> Result<Event> {
        if let BufferedMessage::Event(event) = self {
            return Ok(event.clone());
        }
        let mut writer = EventWriter::new();
        if self.encoding() == Encoding::Structured {
            self.read_structured(&mut writer)?;
        } else {
            self.read_binary(&mut writer)?;
        }
        writer.into_event()
    }

    fn get_attribute(&self, kind: AttributeKind) -> Option<Value> {
        match self {
            BufferedMessage::Binary { attributes, .. } => attributes
                .iter()
                .find(|(a, _)| a.kind() == kind)
                .map(|(_, v)| v.clone()),
            BufferedMessage::Event(event) => event.attribute(kind),
            BufferedMessage::Structured { .. } => None,
        }
    }

    fn get_extension(&self, name: &str) -> Option<Value> {
        match self {
            BufferedMessage::Binary { extensions, .. } => extensions
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone()),
            BufferedMessage::Event(event) => event.extension(name).cloned(),
            BufferedMessage::Structured { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::format::JsonFormat;
    use crate::message::{write_event_binary, EventMessage};
    use crate::transformer::Transformers;
    use crate::write::write;

    fn sample() -> Event {
        Event::builder()
            .id("1")
            .source("/s")
            .ty("t")
            .extension("ext", "v")
            .data("text/plain", "hello")
            .build()
            .unwrap()
    }

    /// A binary message that can only be read once.
    struct OneShot {
        event: Option<Event>,
        finished: bool,
    }

    impl Message for OneShot {
        fn read_encoding(&self) -> Encoding {
            Encoding::Binary
        }

        fn read_binary(&mut self, writer: &mut dyn BinaryWriter) -> Result<()> {
            let event = self.event.take().ok_or(Error::AlreadyRead)?;
            write_event_binary(&event, writer)
        }

        fn finish(mut self: Box<Self>, _err: Option<&Error>) -> Result<()> {
            assert!(!self.finished);
            self.finished = true;
            Ok(())
        }
    }

    #[test]
    fn buffered_binary_can_be_read_many_times() {
        let source = OneShot {
            event: Some(sample()),
            finished: false,
        };
        let mut buffered = buffer(Box::new(source)).unwrap();
        assert_eq!(buffered.read_encoding(), Encoding::Binary);
        assert_eq!(buffered.get_extension("EXT"), Some(Value::from("v")));
        for _ in 0..3 {
            let mut writer = EventWriter::new();
            write(&Context::new(), &mut buffered, None, Some(&mut writer), &Transformers::new()).unwrap();
            assert_eq!(writer.into_event().unwrap(), sample());
        }
    }

    #[test]
    fn copy_does_not_consume_event_messages() {
        let mut message = EventMessage::new(sample());
        let copy = copy_message(&mut message).unwrap();
        assert_eq!(copy.encoding(), Encoding::Event);
        assert_eq!(message.to_event().unwrap(), sample());
    }

    #[test]
    fn structured_copy_keeps_format() {
        let body = JsonFormat.marshal(&sample()).unwrap();
        let mut buffered = BufferedMessage::Structured {
            format: Arc::new(JsonFormat),
            body: body.clone(),
        };
        let copy = copy_message(&mut buffered).unwrap();
        match copy {
            BufferedMessage::Structured { format, body: copied } => {
                assert_eq!(format.media_type(), JsonFormat.media_type());
                assert_eq!(copied, body);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn second_read_of_one_shot_source_fails() {
        let mut source = OneShot {
            event: Some(sample()),
            finished: false,
        };
        copy_message(&mut source).unwrap();
        assert!(matches!(copy_message(&mut source), Err(Error::AlreadyRead)));
    }
}
