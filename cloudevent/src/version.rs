//! Spec versions and the attribute registry.
//!
//! Attribute kinds carry no name of their own: the wire name of a kind depends
//! on the spec version and, for transport headers, on a prefix. [`Versions`]
//! bundles the per-version tables with that prefix.

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Semantic identity of a context attribute, independent of its name.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum AttributeKind {
    Id,
    Source,
    SpecVersion,
    Type,
    DataContentType,
    DataSchema,
    Subject,
    Time,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 8] = [
        AttributeKind::SpecVersion,
        AttributeKind::Id,
        AttributeKind::Source,
        AttributeKind::Type,
        AttributeKind::DataContentType,
        AttributeKind::DataSchema,
        AttributeKind::Subject,
        AttributeKind::Time,
    ];

    pub fn is_required(self) -> bool {
        matches!(
            self,
            AttributeKind::Id | AttributeKind::Source | AttributeKind::SpecVersion | AttributeKind::Type
        )
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Id => "id",
            AttributeKind::Source => "source",
            AttributeKind::SpecVersion => "specversion",
            AttributeKind::Type => "type",
            AttributeKind::DataContentType => "datacontenttype",
            AttributeKind::DataSchema => "dataschema",
            AttributeKind::Subject => "subject",
            AttributeKind::Time => "time",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Debug, Clone, Copy, PartialOrd, Ord)]
pub enum SpecVersion {
    #[serde(rename = "0.1")]
    V01,
    #[serde(rename = "0.2")]
    V02,
    #[serde(rename = "0.3")]
    V03,
    #[serde(rename = "1.0")]
    V10,
}

/// Known versions, newest first.
pub const VERSIONS: [SpecVersion; 4] = [
    SpecVersion::V10,
    SpecVersion::V03,
    SpecVersion::V02,
    SpecVersion::V01,
];

const V01_ATTRIBUTES: &[(AttributeKind, &str)] = &[
    (AttributeKind::SpecVersion, "cloudEventsVersion"),
    (AttributeKind::Type, "eventType"),
    (AttributeKind::Source, "source"),
    (AttributeKind::Id, "eventID"),
    (AttributeKind::Time, "eventTime"),
    (AttributeKind::DataSchema, "schemaURL"),
    (AttributeKind::DataContentType, "contentType"),
];

const V02_ATTRIBUTES: &[(AttributeKind, &str)] = &[
    (AttributeKind::SpecVersion, "specversion"),
    (AttributeKind::Type, "type"),
    (AttributeKind::Source, "source"),
    (AttributeKind::Id, "id"),
    (AttributeKind::Time, "time"),
    (AttributeKind::DataSchema, "schemaurl"),
    (AttributeKind::DataContentType, "contenttype"),
];

const V03_ATTRIBUTES: &[(AttributeKind, &str)] = &[
    (AttributeKind::SpecVersion, "specversion"),
    (AttributeKind::Type, "type"),
    (AttributeKind::Source, "source"),
    (AttributeKind::Id, "id"),
    (AttributeKind::Time, "time"),
    (AttributeKind::DataSchema, "schemaurl"),
    (AttributeKind::DataContentType, "datacontenttype"),
    (AttributeKind::Subject, "subject"),
];

const V10_ATTRIBUTES: &[(AttributeKind, &str)] = &[
    (AttributeKind::SpecVersion, "specversion"),
    (AttributeKind::Type, "type"),
    (AttributeKind::Source, "source"),
    (AttributeKind::Id, "id"),
    (AttributeKind::Time, "time"),
    (AttributeKind::DataSchema, "dataschema"),
    (AttributeKind::DataContentType, "datacontenttype"),
    (AttributeKind::Subject, "subject"),
];

impl SpecVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecVersion::V01 => "0.1",
            SpecVersion::V02 => "0.2",
            SpecVersion::V03 => "0.3",
            SpecVersion::V10 => "1.0",
        }
    }

    /// Ordered `(kind, name)` pairs of this version.
    pub fn attributes(self) -> &'static [(AttributeKind, &'static str)] {
        match self {
            SpecVersion::V01 => V01_ATTRIBUTES,
            SpecVersion::V02 => V02_ATTRIBUTES,
            SpecVersion::V03 => V03_ATTRIBUTES,
            SpecVersion::V10 => V10_ATTRIBUTES,
        }
    }

    /// Case-insensitive lookup of an unprefixed attribute name.
    pub fn lookup(self, name: &str) -> Option<(AttributeKind, &'static str)> {
        self.attributes()
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .copied()
    }

    pub fn attribute_name(self, kind: AttributeKind) -> Option<&'static str> {
        self.attributes()
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, n)| *n)
    }

    pub fn has(self, kind: AttributeKind) -> bool {
        self.attribute_name(kind).is_some()
    }

    /// True when `name` clashes with an attribute (or a structural member of
    /// the JSON format) of this version, ignoring case.
    pub fn is_reserved_name(self, name: &str) -> bool {
        self.lookup(name).is_some()
            || name.eq_ignore_ascii_case("data")
            || (self == SpecVersion::V10 && name.eq_ignore_ascii_case("data_base64"))
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SpecVersion {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Error> {
        match value.trim() {
            "0.1" => Ok(SpecVersion::V01),
            "0.2" => Ok(SpecVersion::V02),
            "0.3" => Ok(SpecVersion::V03),
            "1.0" | "1.0-rc1" => Ok(SpecVersion::V10),
            other => Err(Error::validation(format!("invalid specversion '{other}'"))),
        }
    }
}

impl TryFrom<String> for SpecVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> {
        SpecVersion::try_from(value.as_str())
    }
}

impl FromStr for SpecVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        SpecVersion::try_from(s)
    }
}

/// A kind bound to a version, which is enough to know its wire name.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Attribute {
    version: SpecVersion,
    kind: AttributeKind,
}

impl Attribute {
    /// `None` when the kind does not exist in `version`.
    pub fn new(version: SpecVersion, kind: AttributeKind) -> Option<Self> {
        version.has(kind).then_some(Attribute { version, kind })
    }

    pub fn version(&self) -> SpecVersion {
        self.version
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.version.attribute_name(self.kind).unwrap_or("")
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute registry bound to a transport naming scheme.
///
/// Transports put attributes into prefixed headers (`ce-` for HTTP, `ce_`
/// for Kafka) and carry `datacontenttype` in their native content-type slot.
#[derive(Debug, Clone, Default)]
pub struct Versions {
    prefix: String,
    content_type: Option<String>,
}

impl Versions {
    pub fn new(prefix: impl Into<String>) -> Self {
        Versions {
            prefix: prefix.into(),
            content_type: None,
        }
    }

    /// Alias `datacontenttype` to a transport header instead of a prefixed name.
    pub fn with_content_type(mut self, header: impl Into<String>) -> Self {
        self.content_type = Some(header.into());
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn content_type_header(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn versions(&self) -> &'static [SpecVersion] {
        &VERSIONS
    }

    /// Resolve a wire name (prefixed, or the content-type header) for
    /// `version`, case-insensitively.
    pub fn lookup(&self, version: SpecVersion, wire: &str) -> Option<(AttributeKind, &'static str)> {
        if let Some(ct) = &self.content_type {
            if ct.eq_ignore_ascii_case(wire) {
                return version
                    .attribute_name(AttributeKind::DataContentType)
                    .map(|n| (AttributeKind::DataContentType, n));
            }
        }
        let name = strip_prefix_ignore_case(wire, &self.prefix)?;
        let found = version.lookup(name)?;
        if found.0 == AttributeKind::DataContentType && self.content_type.is_some() {
            return None;
        }
        Some(found)
    }

    /// The wire name of `kind` in `version`, or `None` if the kind did not
    /// exist in that version.
    pub fn attribute_name(&self, version: SpecVersion, kind: AttributeKind) -> Option<String> {
        let name = version.attribute_name(kind)?;
        if kind == AttributeKind::DataContentType {
            if let Some(ct) = &self.content_type {
                return Some(ct.clone());
            }
        }
        Some(format!("{}{}", self.prefix, name))
    }

    /// Distinct specversion header names, newest version first.
    pub fn spec_version_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for version in VERSIONS {
            if let Some(name) = self.attribute_name(version, AttributeKind::SpecVersion) {
                if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Infer the spec version from whichever specversion header is present.
    ///
    /// Candidate names are tried newest-first; values that are not a known
    /// version, or that were found under a name the version does not use,
    /// are ignored.
    pub fn spec_version_of<'a>(&self, get: impl Fn(&str) -> Option<&'a str>) -> Option<SpecVersion> {
        for name in self.spec_version_names() {
            let Some(value) = get(&name) else {
                continue;
            };
            let Ok(version) = SpecVersion::try_from(value) else {
                continue;
            };
            let expected = self.attribute_name(version, AttributeKind::SpecVersion);
            if expected.is_some_and(|e| e.eq_ignore_ascii_case(&name)) {
                return Some(version);
            }
        }
        None
    }

    /// Extension name carried by `wire`: the prefix stripped and lowercased.
    /// `None` when `wire` does not carry the prefix.
    pub fn extension_name(&self, wire: &str) -> Option<String> {
        let name = strip_prefix_ignore_case(wire, &self.prefix)?;
        if name.is_empty() {
            return None;
        }
        Some(name.to_ascii_lowercase())
    }

    pub fn extension_wire_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() < prefix.len() || !s.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, tail) = s.split_at(prefix.len());
    head.eq_ignore_ascii_case(prefix).then_some(tail)
}
