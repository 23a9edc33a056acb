//! AMQP 1.0 messages.
//!
//! Binary mode puts attributes into `cloudEvents:`-prefixed
//! application-properties, keeping their AMQP types where one exists, and
//! `datacontenttype` into the `content-type` message property. Structured
//! mode puts the format media type into `content-type`.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{detect_encoding, read_typed_header};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::format::{self, Format};
use crate::message::{BinaryWriter, Encoding, Message, StructuredWriter};
use crate::transformer::Transformers;
use crate::types::Value;
use crate::version::{Attribute, AttributeKind, SpecVersion, Versions};

pub const PREFIX: &str = "cloudEvents:";
pub const CONTENT_TYPE: &str = "content-type";

pub fn versions() -> &'static Versions {
    static VERSIONS: OnceLock<Versions> = OnceLock::new();
    VERSIONS.get_or_init(|| Versions::new(PREFIX).with_content_type(CONTENT_TYPE))
}

/// The subset of AMQP primitive types used for application-properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmqpValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    String(String),
    Binary(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl From<Value> for AmqpValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Boolean(b) => AmqpValue::Bool(b),
            Value::Integer(i) => AmqpValue::Int(i),
            Value::Binary(b) => AmqpValue::Binary(b),
            Value::Time(t) => AmqpValue::Timestamp(t),
            other => AmqpValue::String(other.to_string()),
        }
    }
}

impl TryFrom<AmqpValue> for Value {
    type Error = Error;

    fn try_from(value: AmqpValue) -> Result<Self> {
        Ok(match value {
            AmqpValue::Bool(b) => Value::Boolean(b),
            AmqpValue::Int(i) => Value::Integer(i),
            AmqpValue::Long(l) => Value::Integer(
                i32::try_from(l).map_err(|_| Error::decode(format!("{l} does not fit an Integer")))?,
            ),
            AmqpValue::String(s) => Value::String(s),
            AmqpValue::Binary(b) => Value::Binary(b),
            AmqpValue::Timestamp(t) => Value::Time(t),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub content_type: Option<String>,
    pub application_properties: BTreeMap<String, AmqpValue>,
    pub body: Bytes,
}

impl Delivery {
    fn property_str(&self, name: &str) -> Option<&str> {
        self.application_properties
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| match v {
                AmqpValue::String(s) => Some(s.as_str()),
                _ => None,
            })
    }

    fn property(&self, name: &str) -> Option<&AmqpValue> {
        self.application_properties
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

/// Inbound AMQP delivery.
#[derive(Debug)]
pub struct AmqpMessage {
    delivery: Delivery,
    version: Option<SpecVersion>,
    format: Option<Arc<dyn Format>>,
}

impl AmqpMessage {
    pub fn new(delivery: Delivery) -> Self {
        let version = versions().spec_version_of(|name| delivery.property_str(name));
        let format = match version {
            Some(_) => None,
            None => delivery.content_type.as_deref().and_then(format::lookup),
        };
        AmqpMessage {
            delivery,
            version,
            format,
        }
    }
}

impl Message for AmqpMessage {
    fn read_encoding(&self) -> Encoding {
        match &self.format {
            Some(_) => Encoding::Structured,
            None => detect_encoding(self.version, None),
        }
    }

    fn read_structured(&mut self, writer: &mut dyn StructuredWriter) -> Result<()> {
        let Some(format) = &self.format else {
            return Err(Error::WrongEncoding {
                expected: Encoding::Structured,
                actual: self.read_encoding(),
            });
        };
        writer.set_structured_event(format.as_ref(), self.delivery.body.clone())
    }

    fn read_binary(&mut self, writer: &mut dyn BinaryWriter) -> Result<()> {
        let Some(version) = self.version else {
            return Err(Error::WrongEncoding {
                expected: Encoding::Binary,
                actual: self.read_encoding(),
            });
        };
        writer.start()?;
        if let Some(content_type) = &self.delivery.content_type {
            if let Some(attr) = Attribute::new(version, AttributeKind::DataContentType) {
                writer.set_attribute(attr, Value::String(content_type.clone()))?;
            }
        }
        for (name, value) in &self.delivery.application_properties {
            let value = Value::try_from(value.clone())
                .map_err(|e| Error::decode_field(name.as_str(), e.to_string()))?;
            read_typed_header(versions(), version, name, value, writer)?;
        }
        if !self.delivery.body.is_empty() {
            writer.set_data(self.delivery.body.clone())?;
        }
        writer.end()
    }

    fn get_attribute(&self, kind: AttributeKind) -> Option<Value> {
        let version = self.version?;
        if kind == AttributeKind::DataContentType {
            return self.delivery.content_type.clone().map(Value::String);
        }
        let name = versions().attribute_name(version, kind)?;
        self.delivery
            .property(&name)
            .and_then(|v| Value::try_from(v.clone()).ok())
    }

    fn get_extension(&self, name: &str) -> Option<Value> {
        self.version?;
        self.delivery
            .property(&versions().extension_wire_name(name))
            .and_then(|v| Value::try_from(v.clone()).ok())
    }
}

#[derive(Debug, Default)]
pub struct DeliveryWriter {
    delivery: Delivery,
}

impl DeliveryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_delivery(self) -> Delivery {
        self.delivery
    }
}

impl StructuredWriter for DeliveryWriter {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        self.delivery.content_type = Some(format.media_type().to_string());
        self.delivery.body = body;
        Ok(())
    }
}

impl BinaryWriter for DeliveryWriter {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> Result<()> {
        if attribute.kind() == AttributeKind::DataContentType {
            self.delivery.content_type = Some(value.to_string());
            return Ok(());
        }
        if let Some(name) = versions().attribute_name(attribute.version(), attribute.kind()) {
            self.delivery.application_properties.insert(name, value.into());
        }
        Ok(())
    }

    fn set_extension(&mut self, name: &str, value: Value) -> Result<()> {
        self.delivery
            .application_properties
            .insert(versions().extension_wire_name(name), value.into());
        Ok(())
    }

    fn set_data(&mut self, data: Bytes) -> Result<()> {
        self.delivery.body = data;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn write_delivery(
    ctx: &Context,
    message: &mut dyn Message,
    transformers: &Transformers,
) -> Result<Delivery> {
    let (writer, _) = super::write_into(ctx, message, DeliveryWriter::new(), transformers)?;
    Ok(writer.into_delivery())
}
