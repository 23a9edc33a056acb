//! Transport bindings without a network client: record types for Kafka,
//! NATS and AMQP, their inbound messages and outbound writers, and the
//! header codec they share.

pub mod amqp;
pub mod kafka;
pub mod nats;

use std::cell::RefCell;

use bytes::Bytes;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::format::{self, Format};
use crate::message::{BinaryWriter, Encoding, Message, StructuredWriter};
use crate::transformer::Transformers;
use crate::types::Value;
use crate::version::{Attribute, AttributeKind, SpecVersion, Versions};
use crate::write;

/// Classify an inbound message from its spec version header and its
/// content type.
///
/// A known specversion header means binary mode; otherwise a content type
/// with a registered format means structured mode.
pub fn detect_encoding(spec_version: Option<SpecVersion>, content_type: Option<&str>) -> Encoding {
    if spec_version.is_some() {
        return Encoding::Binary;
    }
    match content_type.and_then(format::lookup) {
        Some(_) => Encoding::Structured,
        None => Encoding::Unknown,
    }
}

/// Route one string-valued inbound header into a binary writer.
///
/// Known attribute names (prefixed, or the content-type alias) become
/// attributes; other prefixed names become lowercased extensions; anything
/// else is not part of the event.
pub fn read_header(
    versions: &Versions,
    version: SpecVersion,
    name: &str,
    value: &str,
    writer: &mut dyn BinaryWriter,
) -> Result<()> {
    read_typed_header(versions, version, name, Value::String(value.to_string()), writer)
}

/// Like [`read_header`] for transports with typed header values.
pub fn read_typed_header(
    versions: &Versions,
    version: SpecVersion,
    name: &str,
    value: Value,
    writer: &mut dyn BinaryWriter,
) -> Result<()> {
    if let Some((kind, _)) = versions.lookup(version, name) {
        let attribute = Attribute::new(version, kind)
            .ok_or_else(|| Error::decode_field(name, "attribute not in spec version"))?;
        return writer.set_attribute(attribute, value);
    }
    if let Some(extension) = versions.extension_name(name) {
        return writer.set_extension(&extension, value);
    }
    Ok(())
}

/// Look an attribute up among string headers without decoding the message.
pub fn header_attribute<'a>(
    versions: &Versions,
    version: SpecVersion,
    kind: AttributeKind,
    get: impl Fn(&str) -> Option<&'a str>,
) -> Option<Value> {
    let name = versions.attribute_name(version, kind)?;
    get(&name).map(|v| Value::String(v.to_string()))
}

/// Wire name and canonical string of an outbound attribute. `None` when the
/// attribute has no name in its version.
pub fn attribute_header(versions: &Versions, attribute: Attribute, value: &Value) -> Option<(String, String)> {
    let name = versions.attribute_name(attribute.version(), attribute.kind())?;
    Some((name, value.to_string()))
}

pub fn extension_header(versions: &Versions, name: &str, value: &Value) -> (String, String) {
    (versions.extension_wire_name(name), value.to_string())
}

/// Lets a single writer serve as both the structured and the binary
/// writer of one dispatch.
struct Shared<'a, W>(&'a RefCell<W>);

impl<W> Shared<'_, W> {
    fn with<T>(&self, f: impl FnOnce(&mut W) -> Result<T>) -> Result<T> {
        let mut writer = self
            .0
            .try_borrow_mut()
            .map_err(|_| Error::encode("writer is already in use"))?;
        f(&mut writer)
    }
}

impl<W: StructuredWriter> StructuredWriter for Shared<'_, W> {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        self.with(|w| w.set_structured_event(format, body))
    }
}

impl<W: BinaryWriter> BinaryWriter for Shared<'_, W> {
    fn start(&mut self) -> Result<()> {
        self.with(|w| w.start())
    }

    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> Result<()> {
        self.with(|w| w.set_attribute(attribute, value))
    }

    fn set_extension(&mut self, name: &str, value: Value) -> Result<()> {
        self.with(|w| w.set_extension(name, value))
    }

    fn set_data(&mut self, data: Bytes) -> Result<()> {
        self.with(|w| w.set_data(data))
    }

    fn end(&mut self) -> Result<()> {
        self.with(|w| w.end())
    }
}

/// Dispatch `message` into a writer that implements both modes, returning
/// the writer and the emitted encoding.
pub fn write_into<W>(
    ctx: &Context,
    message: &mut dyn Message,
    writer: W,
    transformers: &Transformers,
) -> Result<(W, Encoding)>
where
    W: StructuredWriter + BinaryWriter,
{
    let cell = RefCell::new(writer);
    let encoding = {
        let mut structured = Shared(&cell);
        let mut binary = Shared(&cell);
        write::write(ctx, message, Some(&mut structured), Some(&mut binary), transformers)?
    };
    Ok((cell.into_inner(), encoding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::JSON_MEDIA_TYPE;
    use crate::message::EventWriter;

    #[test]
    fn encoding_detection() {
        assert_eq!(detect_encoding(Some(SpecVersion::V10), None), Encoding::Binary);
        assert_eq!(
            detect_encoding(None, Some("application/cloudevents+json; charset=utf-8")),
            Encoding::Structured
        );
        assert_eq!(detect_encoding(None, Some("application/json")), Encoding::Unknown);
        assert_eq!(detect_encoding(None, None), Encoding::Unknown);
    }

    #[test]
    fn headers_route_to_attributes_and_extensions() {
        let versions = Versions::new("ce-").with_content_type("content-type");
        let mut writer = EventWriter::new();
        let headers = [
            ("ce-specversion", "1.0"),
            ("ce-id", "1"),
            ("CE-Source", "/s"),
            ("ce-type", "t"),
            ("ce-MyExt", "x"),
            ("content-type", "text/plain"),
            ("accept", "*/*"),
        ];
        for (name, value) in headers {
            read_header(&versions, SpecVersion::V10, name, value, &mut writer).unwrap();
        }
        writer.set_data(Bytes::from_static(b"hi")).unwrap();
        let event = writer.into_event().unwrap();
        assert_eq!(event.source(), "/s");
        assert_eq!(event.datacontenttype(), Some("text/plain"));
        assert_eq!(event.extension("myext"), Some(&Value::from("x")));
    }

    #[test]
    fn outbound_names_use_prefix_and_alias() {
        let versions = Versions::new("ce_").with_content_type("content-type");
        let ct = Attribute::new(SpecVersion::V10, AttributeKind::DataContentType).unwrap();
        assert_eq!(
            attribute_header(&versions, ct, &Value::from(JSON_MEDIA_TYPE)),
            Some(("content-type".to_string(), JSON_MEDIA_TYPE.to_string()))
        );
        assert_eq!(
            extension_header(&versions, "key", &Value::Integer(3)),
            ("ce_key".to_string(), "3".to_string())
        );
    }
}
