//! The CloudEvent data model.

mod attributes;
mod builder;
mod convert;
mod payload;

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{self, Value};
use crate::version::{Attribute, AttributeKind, SpecVersion};

pub use attributes::Attributes;
pub use builder::EventBuilder;
pub use payload::{Reader, Writer};

const DEFAULT_TYPE: &str = "generated.cloudevent";
const DEFAULT_SOURCE: &str = "cloudevent.local";

/// A CloudEvent: version-tagged context attributes, extensions and an
/// optional data payload with its media type.
#[derive(Debug, Clone)]
pub struct Event {
    pub(crate) attributes: Attributes,
    pub(crate) data: Option<Bytes>,
    pub(crate) extensions: BTreeMap<String, Value>,
    pub(crate) data_base64: bool,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes
            && self.data == other.data
            && self.extensions == other.extensions
    }
}

impl Default for Event {
    fn default() -> Self {
        Event::new()
    }
}

impl Event {
    /// A fresh 1.0 event with a random id and a source derived from the
    /// hostname.
    pub fn new() -> Event {
        let source = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| types::validate_uri_ref(h).is_ok())
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let mut attributes = Attributes::empty(SpecVersion::V10);
        attributes.id = Uuid::new_v4().to_string();
        attributes.source = source;
        attributes.ty = DEFAULT_TYPE.to_string();
        Event {
            attributes,
            data: None,
            extensions: BTreeMap::new(),
            data_base64: false,
        }
    }

    pub fn builder() -> EventBuilder {
        EventBuilder::new()
    }

    /// An event with no attribute set yet; only valid after the required
    /// attributes have been filled in.
    pub(crate) fn empty(spec_version: SpecVersion) -> Event {
        Event {
            attributes: Attributes::empty(spec_version),
            data: None,
            extensions: BTreeMap::new(),
            data_base64: false,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn spec_version(&self) -> SpecVersion {
        self.attributes.spec_version
    }

    pub fn id(&self) -> &str {
        &self.attributes.id
    }

    pub fn source(&self) -> &str {
        &self.attributes.source
    }

    pub fn event_type(&self) -> &str {
        &self.attributes.ty
    }

    pub fn datacontenttype(&self) -> Option<&str> {
        self.attributes.datacontenttype.as_deref()
    }

    pub fn dataschema(&self) -> Option<&str> {
        self.attributes.dataschema.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.attributes.subject.as_deref()
    }

    pub fn time(&self) -> Option<&DateTime<Utc>> {
        self.attributes.time.as_ref()
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    /// Whether the payload was (or will be) carried as `data_base64` in
    /// structured 1.0 JSON.
    pub fn data_base64(&self) -> bool {
        self.data_base64
    }

    pub fn set_data_base64(&mut self, value: bool) {
        self.data_base64 = value;
    }

    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions.get(&name.to_ascii_lowercase())
    }

    pub fn extensions(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.extensions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn attribute(&self, kind: AttributeKind) -> Option<Value> {
        self.attributes.get(kind)
    }

    /// Look an attribute up by its name in this event's version.
    pub fn attribute_by_name(&self, name: &str) -> Option<Value> {
        let (kind, _) = self.spec_version().lookup(name)?;
        self.attribute(kind)
    }

    /// Set (`Some`) or remove (`None`) an attribute by kind.
    pub fn set_attribute(&mut self, kind: AttributeKind, value: Option<Value>) -> Result<()> {
        self.attributes.set(kind, value.as_ref())
    }

    pub fn set_id(&mut self, id: impl Into<String>) -> Result<()> {
        self.set_attribute(AttributeKind::Id, Some(Value::String(id.into())))
    }

    pub fn set_source(&mut self, source: impl Into<String>) -> Result<()> {
        self.set_attribute(AttributeKind::Source, Some(Value::UriRef(source.into())))
    }

    pub fn set_type(&mut self, ty: impl Into<String>) -> Result<()> {
        self.set_attribute(AttributeKind::Type, Some(Value::String(ty.into())))
    }

    pub fn set_subject(&mut self, subject: Option<String>) -> Result<()> {
        self.set_attribute(AttributeKind::Subject, subject.map(Value::String))
    }

    pub fn set_time(&mut self, time: Option<DateTime<Utc>>) -> Result<()> {
        self.set_attribute(AttributeKind::Time, time.map(Value::Time))
    }

    pub fn set_dataschema(&mut self, dataschema: Option<String>) -> Result<()> {
        self.set_attribute(AttributeKind::DataSchema, dataschema.map(Value::UriRef))
    }

    pub fn set_datacontenttype(&mut self, content_type: Option<String>) -> Result<()> {
        self.set_attribute(AttributeKind::DataContentType, content_type.map(Value::String))
    }

    /// Replace the payload and its media type together.
    pub fn set_data(&mut self, content_type: impl Into<String>, data: impl Into<Bytes>) -> Result<()> {
        self.set_datacontenttype(Some(content_type.into()))?;
        self.data = Some(data.into());
        Ok(())
    }

    /// Payload only, keeping whatever `datacontenttype` is set.
    pub(crate) fn set_data_bytes(&mut self, data: Option<Bytes>) {
        self.data = data;
    }

    pub fn take_data(&mut self) -> Option<Bytes> {
        self.data_base64 = false;
        self.data.take()
    }

    /// Drop the payload and its media type.
    pub fn remove_data(&mut self) -> Result<()> {
        self.data = None;
        self.data_base64 = false;
        self.set_datacontenttype(None)
    }

    /// Set an extension. Names are lowercased; an empty string removes the
    /// extension.
    pub fn set_extension(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let name = name.to_ascii_lowercase();
        validate_extension_name(self.spec_version(), &name)?;
        let value = value.into();
        if value.is_empty() {
            self.extensions.remove(&name);
        } else {
            self.extensions.insert(name, value);
        }
        Ok(())
    }

    pub fn remove_extension(&mut self, name: &str) -> Option<Value> {
        self.extensions.remove(&name.to_ascii_lowercase())
    }

    /// Check every event invariant.
    pub fn validate(&self) -> Result<()> {
        let attrs = &self.attributes;
        for kind in AttributeKind::ALL {
            if kind.is_required() && attrs.get(kind).is_none() {
                return Err(Error::validation(format!("missing required attribute {kind}")));
            }
        }
        types::validate_uri_ref(&attrs.source)?;
        if let Some(schema) = &attrs.dataschema {
            types::validate_uri_ref(schema)?;
        }
        if attrs.subject.is_some() && !attrs.spec_version.has(AttributeKind::Subject) {
            return Err(Error::validation(format!(
                "subject does not exist in spec version {}",
                attrs.spec_version
            )));
        }
        match (&self.data, attrs.get(AttributeKind::DataContentType)) {
            (Some(_), None) => return Err(Error::validation("data is present without datacontenttype")),
            (None, Some(_)) => return Err(Error::validation("datacontenttype is present without data")),
            _ => {}
        }
        for name in self.extensions.keys() {
            validate_extension_name(attrs.spec_version, name)?;
        }
        Ok(())
    }

    /// Present attributes in wire order.
    pub fn iter_attributes(&self) -> impl Iterator<Item = (Attribute, Value)> + '_ {
        self.attributes.iter()
    }

    /// Convert to another spec version, renaming and re-homing attributes.
    pub fn convert_to(&self, version: SpecVersion) -> Event {
        convert::convert(self, version)
    }

    pub fn set_spec_version(&mut self, version: SpecVersion) {
        if self.spec_version() != version {
            *self = convert::convert(self, version);
        }
    }
}

fn validate_extension_name(version: SpecVersion, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("extension name is empty"));
    }
    if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return Err(Error::validation(format!(
            "extension name '{name}' must only contain a-z and 0-9"
        )));
    }
    if version.is_reserved_name(name) {
        return Err(Error::validation(format!(
            "extension name '{name}' collides with an attribute of spec version {version}"
        )));
    }
    Ok(())
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CloudEvent:")?;
        for (attr, value) in self.iter_attributes() {
            writeln!(f, "  {attr}: {value}")?;
        }
        for (name, value) in self.extensions() {
            writeln!(f, "  {name}: {value}")?;
        }
        if let Some(data) = &self.data {
            match std::str::from_utf8(data) {
                Ok(s) => writeln!(f, "  data: {s}")?,
                Err(_) => writeln!(f, "  data: <{} bytes>", data.len())?,
            }
        }
        Ok(())
    }
}
