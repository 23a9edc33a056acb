//! Structured-mode formats keyed by media type.

mod json;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::event::Event;

pub use json::{JsonFormat, is_json_media_type};

pub const JSON_MEDIA_TYPE: &str = "application/cloudevents+json";
pub const JSON_BATCH_MEDIA_TYPE: &str = "application/cloudevents-batch+json";
pub const APPLICATION_JSON: &str = "application/json";

/// A structured-mode serialiser.
pub trait Format: Send + Sync + fmt::Debug {
    fn media_type(&self) -> &str;

    fn marshal(&self, event: &Event) -> Result<Bytes>;

    fn unmarshal(&self, bytes: &[u8]) -> Result<Event>;
}

/// Strip media type parameters and fold case: `Application/JSON; charset=utf-8`
/// becomes `application/json`.
pub fn normalize_media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_batch_media_type(content_type: &str) -> bool {
    normalize_media_type(content_type) == JSON_BATCH_MEDIA_TYPE
}

/// Media type to format lookup table.
///
/// Reads take a shared lock; registration is serialised behind the write lock.
pub struct FormatRegistry {
    formats: RwLock<HashMap<String, Arc<dyn Format>>>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        FormatRegistry {
            formats: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding the built-in JSON format.
    pub fn with_defaults() -> Self {
        let registry = FormatRegistry::new();
        registry.add(Arc::new(JsonFormat));
        registry
    }

    pub fn add(&self, format: Arc<dyn Format>) {
        let key = normalize_media_type(format.media_type());
        self.formats.write().insert(key, format);
    }

    pub fn lookup(&self, content_type: &str) -> Option<Arc<dyn Format>> {
        self.formats
            .read()
            .get(&normalize_media_type(content_type))
            .cloned()
    }

    pub fn get(&self, content_type: &str) -> Result<Arc<dyn Format>> {
        self.lookup(content_type).ok_or_else(|| Error::FormatNotFound {
            media_type: content_type.to_string(),
        })
    }

    pub fn marshal(&self, content_type: &str, event: &Event) -> Result<Bytes> {
        self.get(content_type)?.marshal(event)
    }

    pub fn unmarshal(&self, content_type: &str, bytes: &[u8]) -> Result<Event> {
        self.get(content_type)?.unmarshal(bytes)
    }

    pub fn media_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.formats.read().keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        FormatRegistry::with_defaults()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("media_types", &self.media_types())
            .finish()
    }
}

static REGISTRY: OnceLock<FormatRegistry> = OnceLock::new();

/// The process-wide registry, initialised with the JSON format.
pub fn registry() -> &'static FormatRegistry {
    REGISTRY.get_or_init(FormatRegistry::with_defaults)
}

pub fn lookup(content_type: &str) -> Option<Arc<dyn Format>> {
    registry().lookup(content_type)
}

pub fn add(format: Arc<dyn Format>) {
    registry().add(format)
}
