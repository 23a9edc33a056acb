//! The write dispatcher: moves a message into whichever writer needs the
//! least transcoding while honouring the caller's context.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::format::{self, Format, JsonFormat};
use crate::message::{self, BinaryWriter, Encoding, Message, StructuredWriter};
use crate::transformer::Transformers;

/// Write `message` into the structured writer, the binary writer, or through
/// a decoded event into either of them.
///
/// Structured and binary messages are copied straight through when the
/// matching writer exists and the context allows it; a structured copy also
/// needs every transformer to accept the structured view. Everything else is
/// decoded, run through the event transformers and encoded again. Returns
/// the encoding that was emitted.
///
/// A decoded structured message is re-encoded in its own format when that
/// format is registered, and in JSON otherwise.
///
/// `finish` is not called; see [`forward`].
pub fn write(
    ctx: &Context,
    message: &mut dyn Message,
    mut structured: Option<&mut dyn StructuredWriter>,
    mut binary: Option<&mut dyn BinaryWriter>,
    transformers: &Transformers,
) -> Result<Encoding> {
    let encoding = message.read_encoding();
    match encoding {
        Encoding::Unknown => return Err(Error::UnknownEncoding),
        Encoding::Structured if !ctx.skip_direct_structured() && !ctx.force_binary() => {
            if let Some(writer) = structured.as_deref_mut() {
                if let Some(mut wrapped) = transformers.structured(writer) {
                    debug!("writing structured message as structured");
                    message.read_structured(&mut *wrapped)?;
                    return Ok(Encoding::Structured);
                }
                debug!("structured view declined by a transformer");
            }
        }
        Encoding::Binary if !ctx.skip_direct_binary() && !ctx.force_structured() => {
            if let Some(writer) = binary.as_deref_mut() {
                debug!("writing binary message as binary");
                let mut wrapped = transformers.binary(writer);
                message.read_binary(&mut *wrapped)?;
                return Ok(Encoding::Binary);
            }
        }
        _ => {}
    }

    let (mut event, source_format) = decode(message, encoding)?;
    transformers.apply(&mut event)?;
    let format: &dyn Format = source_format.as_deref().unwrap_or(&JsonFormat);
    write_event(ctx, encoding, &event, format, structured, binary)
}

/// Collects a structured blob as an event together with the registered
/// format it was written in.
#[derive(Default)]
struct StructuredDecoder {
    event: Option<Event>,
    format: Option<Arc<dyn Format>>,
}

impl StructuredWriter for StructuredDecoder {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        self.event = Some(format.unmarshal(&body)?);
        self.format = format::lookup(format.media_type());
        Ok(())
    }
}

fn decode(message: &mut dyn Message, encoding: Encoding) -> Result<(Event, Option<Arc<dyn Format>>)> {
    if encoding != Encoding::Structured {
        return Ok((message.to_event()?, None));
    }
    let mut decoder = StructuredDecoder::default();
    message.read_structured(&mut decoder)?;
    let event = decoder
        .event
        .ok_or_else(|| Error::decode("structured message carried no event"))?;
    Ok((event, decoder.format))
}

/// Encode an already transformed event. Structured output is chosen only
/// when forced or when no binary writer exists; binary is the default.
fn write_event(
    ctx: &Context,
    source: Encoding,
    event: &Event,
    format: &dyn Format,
    structured: Option<&mut dyn StructuredWriter>,
    binary: Option<&mut dyn BinaryWriter>,
) -> Result<Encoding> {
    match (structured, binary) {
        (Some(writer), Some(_)) if ctx.force_structured() => encode_structured(source, event, format, writer),
        (_, Some(writer)) => encode_binary(source, event, writer),
        (Some(writer), None) => encode_structured(source, event, format, writer),
        (None, None) => Err(Error::NoWriter(source)),
    }
}

fn encode_structured(
    source: Encoding,
    event: &Event,
    format: &dyn Format,
    writer: &mut dyn StructuredWriter,
) -> Result<Encoding> {
    debug!(%source, id = event.id(), media_type = format.media_type(), "encoding event as structured");
    message::write_event_structured(event, format, writer)?;
    Ok(Encoding::Structured)
}

fn encode_binary(source: Encoding, event: &Event, writer: &mut dyn BinaryWriter) -> Result<Encoding> {
    debug!(%source, id = event.id(), "encoding event as binary");
    message::write_event_binary(event, writer)?;
    Ok(Encoding::Binary)
}

/// [`write`] followed by `finish` on the source message, exactly once,
/// whatever the outcome.
pub fn forward(
    ctx: &Context,
    message: Box<dyn Message + '_>,
    structured: Option<&mut dyn StructuredWriter>,
    binary: Option<&mut dyn BinaryWriter>,
    transformers: &Transformers,
) -> Result<Encoding> {
    let mut message = message;
    let result = write(ctx, &mut *message, structured, binary, transformers);
    let finished = message.finish(result.as_ref().err());
    Error::merge_finish(result, finished)
}

/// Decode `message`, apply the event transformers and finish it.
pub fn to_event(message: Box<dyn Message + '_>, transformers: &Transformers) -> Result<Event> {
    let mut message = message;
    let result = message.to_event().and_then(|mut event| {
        transformers.apply(&mut event)?;
        Ok(event)
    });
    let finished = message.finish(result.as_ref().err());
    Error::merge_finish(result, finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use bytes::Bytes;

    use crate::format::{Format, JSON_MEDIA_TYPE};
    use crate::message::{EventMessage, EventWriter};
    use crate::transformer::{AddExtension, SetVersion};
    use crate::types::Value;
    use crate::version::SpecVersion;

    fn sample() -> Event {
        Event::builder()
            .id("1")
            .source("/s")
            .ty("t")
            .data("application/json", r#"{"a":1}"#)
            .build()
            .unwrap()
    }

    struct Structured {
        format: &'static dyn Format,
        body: Bytes,
        finished: Rc<Cell<u32>>,
    }

    impl Message for Structured {
        fn read_encoding(&self) -> Encoding {
            Encoding::Structured
        }

        fn read_structured(&mut self, writer: &mut dyn StructuredWriter) -> Result<()> {
            writer.set_structured_event(self.format, self.body.clone())
        }

        fn finish(self: Box<Self>, _err: Option<&Error>) -> Result<()> {
            self.finished.set(self.finished.get() + 1);
            Ok(())
        }
    }

    fn structured(finished: &Rc<Cell<u32>>) -> Structured {
        Structured {
            format: &JsonFormat,
            body: JsonFormat.marshal(&sample()).unwrap(),
            finished: finished.clone(),
        }
    }

    /// JSON behind a one-line envelope, under its own media type.
    #[derive(Debug)]
    struct Enveloped;

    const ENVELOPED_MEDIA_TYPE: &str = "application/cloudevents+enveloped";

    impl Format for Enveloped {
        fn media_type(&self) -> &str {
            ENVELOPED_MEDIA_TYPE
        }

        fn marshal(&self, event: &Event) -> Result<Bytes> {
            let mut out = b"ce\n".to_vec();
            out.extend_from_slice(&JsonFormat.marshal(event)?);
            Ok(Bytes::from(out))
        }

        fn unmarshal(&self, bytes: &[u8]) -> Result<Event> {
            let body = bytes
                .strip_prefix(b"ce\n")
                .ok_or_else(|| Error::decode("missing envelope"))?;
            JsonFormat.unmarshal(body)
        }
    }

    #[derive(Default)]
    struct Capture {
        media_type: Option<String>,
        body: Bytes,
    }

    impl StructuredWriter for Capture {
        fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
            self.media_type = Some(format.media_type().to_string());
            self.body = body;
            Ok(())
        }
    }

    #[test]
    fn structured_goes_straight_through() {
        let finished = Rc::new(Cell::new(0));
        let mut source = structured(&finished);
        let mut capture = Capture::default();
        let mut binary = EventWriter::new();
        let encoding = write(
            &Context::new(),
            &mut source,
            Some(&mut capture),
            Some(&mut binary),
            &Transformers::new(),
        )
        .unwrap();
        assert_eq!(encoding, Encoding::Structured);
        assert_eq!(capture.media_type.as_deref(), Some(JSON_MEDIA_TYPE));
        assert_eq!(capture.body, source.body);
    }

    #[test]
    fn declined_structured_view_writes_binary() {
        let finished = Rc::new(Cell::new(0));
        let mut source = structured(&finished);
        let mut capture = Capture::default();
        let mut binary = EventWriter::new();
        let transformers = Transformers::from(SetVersion::new(SpecVersion::V03));
        let encoding = write(
            &Context::new(),
            &mut source,
            Some(&mut capture),
            Some(&mut binary),
            &transformers,
        )
        .unwrap();
        assert_eq!(encoding, Encoding::Binary);
        assert!(capture.media_type.is_none());
        assert_eq!(binary.into_event().unwrap().spec_version(), SpecVersion::V03);
    }

    #[test]
    fn declined_structured_view_without_binary_writer_reencodes() {
        let finished = Rc::new(Cell::new(0));
        let mut source = structured(&finished);
        let mut capture = Capture::default();
        let transformers = Transformers::from(SetVersion::new(SpecVersion::V03));
        let encoding = write(&Context::new(), &mut source, Some(&mut capture), None, &transformers).unwrap();
        assert_eq!(encoding, Encoding::Structured);
        let out = JsonFormat.unmarshal(&capture.body).unwrap();
        assert_eq!(out.spec_version(), SpecVersion::V03);
    }

    #[test]
    fn reencoding_keeps_a_registered_source_format() {
        format::add(Arc::new(Enveloped));
        let finished = Rc::new(Cell::new(0));
        let mut source = Structured {
            format: &Enveloped,
            body: Enveloped.marshal(&sample()).unwrap(),
            finished: finished.clone(),
        };
        let mut capture = Capture::default();
        let transformers = Transformers::from(SetVersion::new(SpecVersion::V03));
        let encoding = write(&Context::new(), &mut source, Some(&mut capture), None, &transformers).unwrap();
        assert_eq!(encoding, Encoding::Structured);
        assert_eq!(capture.media_type.as_deref(), Some(ENVELOPED_MEDIA_TYPE));
        let out = Enveloped.unmarshal(&capture.body).unwrap();
        assert_eq!(out.spec_version(), SpecVersion::V03);
    }

    #[test]
    fn force_binary_decodes_structured() {
        let finished = Rc::new(Cell::new(0));
        let mut source = structured(&finished);
        let mut capture = Capture::default();
        let mut binary = EventWriter::new();
        let ctx = Context::new().with_force_binary();
        let encoding = write(&ctx, &mut source, Some(&mut capture), Some(&mut binary), &Transformers::new()).unwrap();
        assert_eq!(encoding, Encoding::Binary);
        assert!(capture.media_type.is_none());
        assert_eq!(binary.into_event().unwrap(), sample());
    }

    #[test]
    fn skip_direct_structured_decodes_to_binary() {
        let finished = Rc::new(Cell::new(0));
        let mut source = structured(&finished);
        let mut capture = Capture::default();
        let mut binary = EventWriter::new();
        let ctx = Context::new().with_skip_direct_structured();
        let transformers = Transformers::from(AddExtension::new("seen", true));
        let encoding = write(&ctx, &mut source, Some(&mut capture), Some(&mut binary), &transformers).unwrap();
        assert_eq!(encoding, Encoding::Binary);
        assert!(capture.media_type.is_none());
        let out = binary.into_event().unwrap();
        assert_eq!(out.extension("seen"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn skip_direct_structured_with_force_structured_reencodes() {
        let finished = Rc::new(Cell::new(0));
        let mut source = structured(&finished);
        let mut capture = Capture::default();
        let mut binary = EventWriter::new();
        let ctx = Context::new().with_skip_direct_structured().with_force_structured();
        let transformers = Transformers::from(AddExtension::new("seen", true));
        let encoding = write(&ctx, &mut source, Some(&mut capture), Some(&mut binary), &transformers).unwrap();
        assert_eq!(encoding, Encoding::Structured);
        assert_eq!(capture.media_type.as_deref(), Some(JSON_MEDIA_TYPE));
        let out = JsonFormat.unmarshal(&capture.body).unwrap();
        assert_eq!(out.extension("seen"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn event_message_prefers_binary_unless_forced() {
        let mut capture = Capture::default();
        let mut binary = EventWriter::new();
        let mut message = EventMessage::new(sample());
        let encoding = write(
            &Context::new(),
            &mut message,
            Some(&mut capture),
            Some(&mut binary),
            &Transformers::new(),
        )
        .unwrap();
        assert_eq!(encoding, Encoding::Binary);

        let ctx = Context::new().with_force_structured();
        let mut binary = EventWriter::new();
        let encoding = write(&ctx, &mut message, Some(&mut capture), Some(&mut binary), &Transformers::new()).unwrap();
        assert_eq!(encoding, Encoding::Structured);
    }

    #[test]
    fn no_writer_is_an_error() {
        let mut message = EventMessage::new(sample());
        let err = write(&Context::new(), &mut message, None, None, &Transformers::new()).unwrap_err();
        assert!(matches!(err, Error::NoWriter(Encoding::Event)));
    }

    struct Unknown(Rc<Cell<u32>>);

    impl Message for Unknown {
        fn read_encoding(&self) -> Encoding {
            Encoding::Unknown
        }

        fn finish(self: Box<Self>, err: Option<&Error>) -> Result<()> {
            assert!(err.is_some());
            self.0.set(self.0.get() + 1);
            Err(Error::transport("nack failed"))
        }
    }

    #[test]
    fn forward_finishes_once_and_keeps_prior_error() {
        let finished = Rc::new(Cell::new(0));
        let mut binary = EventWriter::new();
        let err = forward(
            &Context::new(),
            Box::new(Unknown(finished.clone())),
            None,
            Some(&mut binary),
            &Transformers::new(),
        )
        .unwrap_err();
        assert_eq!(finished.get(), 1);
        assert!(matches!(err, Error::Finish { ref primary, .. } if matches!(**primary, Error::UnknownEncoding)));
    }

    #[test]
    fn to_event_finishes_source() {
        let finished = Rc::new(Cell::new(0));
        let event = to_event(Box::new(structured(&finished)), &Transformers::new()).unwrap();
        assert_eq!(event, sample());
        assert_eq!(finished.get(), 1);
    }
}
