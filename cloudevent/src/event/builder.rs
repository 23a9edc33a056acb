use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::Event;
use crate::error::{Error, Result};
use crate::types::Value;
use crate::version::SpecVersion;

/// Builds a validated [`Event`].
///
/// Setters never fail; all checks run in [`build`](EventBuilder::build).
#[derive(Debug, Clone, Default)]
pub struct EventBuilder {
    spec_version: Option<SpecVersion>,
    id: Option<String>,
    source: Option<String>,
    ty: Option<String>,
    subject: Option<String>,
    dataschema: Option<String>,
    time: Option<DateTime<Utc>>,
    data: Option<(String, Bytes)>,
    extensions: Vec<(String, Value)>,
}

impl EventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spec_version(mut self, version: SpecVersion) -> Self {
        self.spec_version = Some(version);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn ty(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn dataschema(mut self, dataschema: impl Into<String>) -> Self {
        self.dataschema = Some(dataschema.into());
        self
    }

    pub fn time(mut self, time: impl Into<DateTime<Utc>>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn data(mut self, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.data = Some((content_type.into(), data.into()));
        self
    }

    pub fn extension(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<Event> {
        let mut event = Event::empty(self.spec_version.unwrap_or(SpecVersion::V10));
        event.set_id(required("id", self.id)?)?;
        event.set_source(required("source", self.source)?)?;
        event.set_type(required("type", self.ty)?)?;
        if self.subject.is_some() {
            event.set_subject(self.subject)?;
        }
        event.set_dataschema(self.dataschema)?;
        event.set_time(self.time)?;
        if let Some((content_type, data)) = self.data {
            event.set_data(content_type, data)?;
        }
        for (name, value) in self.extensions {
            event.set_extension(&name, value)?;
        }
        event.validate()?;
        Ok(event)
    }
}

fn required(name: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| Error::validation(format!("missing required attribute {name}")))
}
