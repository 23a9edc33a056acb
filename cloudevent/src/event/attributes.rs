use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::types::{self, Value};
use crate::version::{Attribute, AttributeKind, SpecVersion};

/// Version-tagged context attributes of an event.
///
/// Every kind has one slot; whether a kind may be set, and what it is called
/// on the wire, is decided by `spec_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub(crate) spec_version: SpecVersion,
    pub(crate) id: String,
    pub(crate) source: String,
    pub(crate) ty: String,
    pub(crate) datacontenttype: Option<String>,
    pub(crate) dataschema: Option<String>,
    pub(crate) subject: Option<String>,
    pub(crate) time: Option<DateTime<Utc>>,
}

impl Attributes {
    pub(crate) fn empty(spec_version: SpecVersion) -> Self {
        Attributes {
            spec_version,
            id: String::new(),
            source: String::new(),
            ty: String::new(),
            datacontenttype: None,
            dataschema: None,
            subject: None,
            time: None,
        }
    }

    pub fn spec_version(&self) -> SpecVersion {
        self.spec_version
    }

    pub fn get(&self, kind: AttributeKind) -> Option<Value> {
        let non_empty = |s: &String| (!s.is_empty()).then(|| Value::String(s.clone()));
        match kind {
            AttributeKind::SpecVersion => Some(Value::String(self.spec_version.to_string())),
            AttributeKind::Id => non_empty(&self.id),
            AttributeKind::Source => (!self.source.is_empty()).then(|| Value::UriRef(self.source.clone())),
            AttributeKind::Type => non_empty(&self.ty),
            AttributeKind::DataContentType => self.datacontenttype.as_ref().and_then(non_empty),
            AttributeKind::DataSchema => self
                .dataschema
                .as_ref()
                .map(|s| Value::UriRef(s.clone())),
            AttributeKind::Subject => self.subject.as_ref().and_then(non_empty),
            AttributeKind::Time => self.time.map(Value::Time),
        }
    }

    /// Set or clear (`None`) an attribute, coercing the value to the kind's
    /// type. The spec version itself is changed through the converter.
    pub(crate) fn set(&mut self, kind: AttributeKind, value: Option<&Value>) -> Result<()> {
        if !self.spec_version.has(kind) {
            return Err(Error::validation(format!(
                "attribute {kind} does not exist in spec version {}",
                self.spec_version
            )));
        }
        let value = value.filter(|v| !v.is_empty());
        if value.is_none() && kind.is_required() {
            return Err(Error::validation(format!(
                "required attribute {kind} cannot be removed"
            )));
        }
        match kind {
            AttributeKind::SpecVersion => {
                let requested = value.map(types::to_string).transpose()?.unwrap_or_default();
                if SpecVersion::try_from(requested.as_str())? != self.spec_version {
                    return Err(Error::validation(
                        "spec version changes go through the version converter",
                    ));
                }
            }
            AttributeKind::Id => self.id = required_string(value)?,
            AttributeKind::Type => self.ty = required_string(value)?,
            AttributeKind::Source => {
                self.source = value.map(types::to_uri_ref).transpose()?.unwrap_or_default()
            }
            AttributeKind::DataContentType => {
                self.datacontenttype = value.map(types::to_string).transpose()?
            }
            AttributeKind::DataSchema => {
                self.dataschema = value.map(types::to_uri_ref).transpose()?
            }
            AttributeKind::Subject => self.subject = value.map(types::to_string).transpose()?,
            AttributeKind::Time => {
                self.time = match value {
                    Some(v) => types::to_time(v)?,
                    None => None,
                }
            }
        }
        Ok(())
    }

    /// Present attributes in the version's table order, specversion first.
    pub fn iter(&self) -> impl Iterator<Item = (Attribute, Value)> + '_ {
        self.spec_version.attributes().iter().filter_map(move |(kind, _)| {
            let value = self.get(*kind)?;
            Attribute::new(self.spec_version, *kind).map(|attr| (attr, value))
        })
    }
}

fn required_string(value: Option<&Value>) -> Result<String> {
    value
        .map(types::to_string)
        .transpose()
        .map(|s| s.unwrap_or_default())
}
