//! Kafka records.
//!
//! Binary mode carries attributes in `ce_` headers, the data content type in
//! the `content-type` header and the data in the record value. The `key`
//! extension maps to the record key unless the context sets `skip_key`.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;

use super::{detect_encoding, extension_header, read_header, read_typed_header};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::format::{self, Format};
use crate::message::{BinaryWriter, Encoding, Message, StructuredWriter};
use crate::transformer::Transformers;
use crate::types::Value;
use crate::version::{Attribute, AttributeKind, SpecVersion, Versions};

pub const PREFIX: &str = "ce_";
pub const CONTENT_TYPE: &str = "content-type";
pub const KEY_EXTENSION: &str = "key";

pub fn versions() -> &'static Versions {
    static VERSIONS: OnceLock<Versions> = OnceLock::new();
    VERSIONS.get_or_init(|| Versions::new(PREFIX).with_content_type(CONTENT_TYPE))
}

/// A record as handed out by a consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Bytes>,
    pub headers: Vec<(String, Bytes)>,
    pub value: Option<Bytes>,
}

impl ConsumerRecord {
    /// First header with `name`, compared case-insensitively, if it is UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| std::str::from_utf8(v).ok())
    }
}

/// A record to hand to a producer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerRecord {
    pub topic: String,
    pub key: Option<Bytes>,
    pub headers: Vec<(String, Bytes)>,
    pub value: Option<Bytes>,
}

impl ProducerRecord {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| std::str::from_utf8(v).ok())
    }
}

/// Inbound Kafka message.
#[derive(Debug)]
pub struct KafkaMessage {
    record: ConsumerRecord,
    version: Option<SpecVersion>,
    format: Option<Arc<dyn Format>>,
}

impl KafkaMessage {
    pub fn new(record: ConsumerRecord) -> Self {
        let version = versions().spec_version_of(|name| record.header(name));
        let format = match version {
            Some(_) => None,
            None => record.header(CONTENT_TYPE).and_then(format::lookup),
        };
        KafkaMessage {
            record,
            version,
            format,
        }
    }

    pub fn record(&self) -> &ConsumerRecord {
        &self.record
    }
}

impl Message for KafkaMessage {
    fn read_encoding(&self) -> Encoding {
        match (&self.format, self.version) {
            (Some(_), _) => Encoding::Structured,
            (None, version) => detect_encoding(version, None),
        }
    }

    fn read_structured(&mut self, writer: &mut dyn StructuredWriter) -> Result<()> {
        let Some(format) = &self.format else {
            return Err(Error::WrongEncoding {
                expected: Encoding::Structured,
                actual: self.read_encoding(),
            });
        };
        let body = self.record.value.clone().unwrap_or_default();
        writer.set_structured_event(format.as_ref(), body)
    }

    fn read_binary(&mut self, writer: &mut dyn BinaryWriter) -> Result<()> {
        let Some(version) = self.version else {
            return Err(Error::WrongEncoding {
                expected: Encoding::Binary,
                actual: self.read_encoding(),
            });
        };
        writer.start()?;
        if let Some(key) = &self.record.key {
            let key = String::from_utf8(key.to_vec())
                .map(Value::String)
                .unwrap_or_else(|e| Value::Binary(e.into_bytes()));
            writer.set_extension(KEY_EXTENSION, key)?;
        }
        for (name, value) in &self.record.headers {
            match std::str::from_utf8(value) {
                Ok(value) => read_header(versions(), version, name, value, writer)?,
                Err(_) => read_typed_header(versions(), version, name, Value::Binary(value.to_vec()), writer)?,
            }
        }
        if let Some(value) = &self.record.value {
            writer.set_data(value.clone())?;
        }
        writer.end()
    }

    fn get_attribute(&self, kind: AttributeKind) -> Option<Value> {
        super::header_attribute(versions(), self.version?, kind, |name| self.record.header(name))
    }

    fn get_extension(&self, name: &str) -> Option<Value> {
        self.version?;
        let wire = versions().extension_wire_name(name);
        match self.record.header(&wire) {
            Some(value) => Some(Value::String(value.to_string())),
            None if name.eq_ignore_ascii_case(KEY_EXTENSION) => self
                .record
                .key
                .as_ref()
                .map(|k| Value::String(String::from_utf8_lossy(k).into_owned())),
            None => None,
        }
    }
}

/// Outbound writer producing a [`ProducerRecord`].
#[derive(Debug)]
pub struct ProducerRecordWriter {
    record: ProducerRecord,
    skip_key: bool,
}

impl ProducerRecordWriter {
    pub fn new(topic: impl Into<String>, skip_key: bool) -> Self {
        ProducerRecordWriter {
            record: ProducerRecord {
                topic: topic.into(),
                ..ProducerRecord::default()
            },
            skip_key,
        }
    }

    pub fn into_record(self) -> ProducerRecord {
        self.record
    }

    fn push_header(&mut self, name: String, value: String) {
        self.record.headers.push((name, Bytes::from(value)));
    }
}

impl StructuredWriter for ProducerRecordWriter {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        self.push_header(CONTENT_TYPE.to_string(), format.media_type().to_string());
        self.record.value = Some(body);
        Ok(())
    }
}

impl BinaryWriter for ProducerRecordWriter {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> Result<()> {
        if let Some((name, value)) = super::attribute_header(versions(), attribute, &value) {
            self.push_header(name, value);
        }
        Ok(())
    }

    fn set_extension(&mut self, name: &str, value: Value) -> Result<()> {
        if !self.skip_key && name.eq_ignore_ascii_case(KEY_EXTENSION) {
            self.record.key = Some(match value {
                Value::Binary(bytes) => Bytes::from(bytes),
                other => Bytes::from(other.to_string()),
            });
            return Ok(());
        }
        let (name, value) = extension_header(versions(), name, &value);
        self.push_header(name, value);
        Ok(())
    }

    fn set_data(&mut self, data: Bytes) -> Result<()> {
        self.record.value = Some(data);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Encode `message` as a producer record for `topic`.
pub fn write_producer_record(
    ctx: &Context,
    message: &mut dyn Message,
    topic: &str,
    transformers: &Transformers,
) -> Result<ProducerRecord> {
    let writer = ProducerRecordWriter::new(topic, ctx.skip_key());
    let (writer, _) = super::write_into(ctx, message, writer, transformers)?;
    Ok(writer.into_record())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::format::JSON_MEDIA_TYPE;
    use crate::message::EventMessage;

    fn sample() -> Event {
        Event::builder()
            .id("1")
            .source("/s")
            .ty("t")
            .data("application/json", r#"{"k":"v"}"#)
            .build()
            .unwrap()
    }

    fn consumer(record: ProducerRecord) -> ConsumerRecord {
        ConsumerRecord {
            topic: record.topic,
            key: record.key,
            headers: record.headers,
            value: record.value,
            ..ConsumerRecord::default()
        }
    }

    #[test]
    fn binary_record_layout() {
        let mut message = EventMessage::new(sample());
        let record = write_producer_record(&Context::new(), &mut message, "events", &Transformers::new()).unwrap();
        assert_eq!(record.topic, "events");
        assert_eq!(record.header("ce_id"), Some("1"));
        assert_eq!(record.header("ce_specversion"), Some("1.0"));
        assert_eq!(record.header("content-type"), Some("application/json"));
        assert_eq!(record.header("ce_datacontenttype"), None);
        assert_eq!(record.value.as_deref(), Some(&br#"{"k":"v"}"#[..]));
    }

    #[test]
    fn structured_record_layout() {
        let mut message = EventMessage::new(sample());
        let ctx = Context::new().with_force_structured();
        let record = write_producer_record(&ctx, &mut message, "events", &Transformers::new()).unwrap();
        assert_eq!(record.header("content-type"), Some(JSON_MEDIA_TYPE));
        assert_eq!(record.header("ce_id"), None);

        let mut inbound = KafkaMessage::new(consumer(record));
        assert_eq!(inbound.read_encoding(), Encoding::Structured);
        assert_eq!(inbound.to_event().unwrap(), sample());
    }

    #[test]
    fn binary_records_round_trip() {
        let mut event = sample();
        event.set_extension("key", "abc").unwrap();
        event.set_extension("other", 7).unwrap();
        let mut message = EventMessage::new(event.clone());
        let record = write_producer_record(&Context::new(), &mut message, "t", &Transformers::new()).unwrap();

        let mut inbound = KafkaMessage::new(consumer(record));
        assert_eq!(inbound.read_encoding(), Encoding::Binary);
        assert_eq!(inbound.get_attribute(AttributeKind::Id), Some(Value::from("1")));
        assert_eq!(inbound.get_extension("key"), Some(Value::from("abc")));
        let decoded = inbound.to_event().unwrap();
        assert_eq!(decoded.extension("key"), Some(&Value::from("abc")));
        assert_eq!(decoded.extension("other"), Some(&Value::from("7")));
        assert_eq!(decoded.data(), event.data());
    }

    #[test]
    fn record_without_cloudevent_headers_is_unknown() {
        let record = ConsumerRecord {
            headers: vec![("content-type".into(), Bytes::from("text/plain"))],
            value: Some(Bytes::from("x")),
            ..ConsumerRecord::default()
        };
        let mut message = KafkaMessage::new(record);
        assert_eq!(message.read_encoding(), Encoding::Unknown);
        assert!(message.to_event().is_err());
    }
}
