//! Spec-version conversion.
//!
//! Attributes that exist in both versions keep their value under the new
//! name. Attributes the target version lacks move into extensions, and
//! extensions that name an attribute of the target version move back into
//! the context. `datacontentencoding` does not survive a move to 1.0, where
//! base64 payloads are signalled by the format itself.

use tracing::{debug, warn};

use super::Event;
use crate::version::{AttributeKind, SpecVersion};

const DATA_CONTENT_ENCODING: &str = "datacontentencoding";

pub(crate) fn convert(event: &Event, target: SpecVersion) -> Event {
    let from = event.spec_version();
    if from == target {
        return event.clone();
    }

    let mut out = Event::empty(target);
    out.attributes = event.attributes.clone();
    out.attributes.spec_version = target;
    out.data = event.data.clone();
    out.data_base64 = event.data_base64;

    for kind in AttributeKind::ALL {
        if target.has(kind) {
            continue;
        }
        let Some(value) = event.attribute(kind) else {
            continue;
        };
        let name = from.attribute_name(kind).unwrap_or_default().to_ascii_lowercase();
        debug!(%from, %target, attribute = %name, "attribute moved to extensions");
        clear(&mut out, kind);
        out.extensions.insert(name, value);
    }

    for (name, value) in &event.extensions {
        if target == SpecVersion::V10 && name == DATA_CONTENT_ENCODING {
            debug!(%from, %target, "dropping datacontentencoding");
            continue;
        }
        if let Some((kind, _)) = target.lookup(name) {
            let free = kind != AttributeKind::SpecVersion && out.attribute(kind).is_none();
            if free && out.attributes.set(kind, Some(value)).is_ok() {
                continue;
            }
            warn!(%from, %target, extension = %name, "extension collides with an attribute, dropped");
            continue;
        }
        if target.is_reserved_name(name) {
            warn!(%from, %target, extension = %name, "extension name is reserved, dropped");
            continue;
        }
        out.extensions.insert(name.clone(), value.clone());
    }
    out
}

fn clear(event: &mut Event, kind: AttributeKind) {
    let attrs = &mut event.attributes;
    match kind {
        AttributeKind::Subject => attrs.subject = None,
        AttributeKind::DataSchema => attrs.dataschema = None,
        AttributeKind::DataContentType => attrs.datacontenttype = None,
        AttributeKind::Time => attrs.time = None,
        AttributeKind::Id | AttributeKind::Source | AttributeKind::Type | AttributeKind::SpecVersion => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use crate::version::VERSIONS;

    fn v10() -> Event {
        Event::builder()
            .id("1")
            .source("/source")
            .ty("example.type")
            .subject("sub")
            .dataschema("http://example.com")
            .data("application/json", "{}")
            .extension("ext", "value")
            .build()
            .unwrap()
    }

    #[test]
    fn downgrade_renames_dataschema() {
        let event = v10().convert_to(SpecVersion::V03);
        assert_eq!(event.spec_version(), SpecVersion::V03);
        assert_eq!(
            event.attribute_by_name("schemaurl"),
            Some(Value::UriRef("http://example.com".into()))
        );
        assert_eq!(event.attribute_by_name("dataschema"), None);
    }

    #[test]
    fn missing_kind_becomes_extension_and_comes_back() {
        let v02 = v10().convert_to(SpecVersion::V02);
        assert_eq!(v02.subject(), None);
        assert_eq!(v02.extension("subject"), Some(&Value::from("sub")));
        v02.validate().unwrap();

        let back = v02.convert_to(SpecVersion::V10);
        assert_eq!(back.subject(), Some("sub"));
        assert!(back.extension("subject").is_none());
        assert_eq!(back, v10());
    }

    #[test]
    fn datacontentencoding_is_dropped_for_1_0() {
        let mut v03 = v10().convert_to(SpecVersion::V03);
        v03.extensions
            .insert(DATA_CONTENT_ENCODING.to_string(), Value::from("base64"));
        let v10 = v03.convert_to(SpecVersion::V10);
        assert!(v10.extension(DATA_CONTENT_ENCODING).is_none());
    }

    #[test]
    fn required_attributes_survive_every_conversion() {
        for from in VERSIONS {
            for to in VERSIONS {
                let event = v10().convert_to(from).convert_to(to);
                event.validate().unwrap();
                assert_eq!(event.id(), "1");
                assert_eq!(event.source(), "/source");
                assert_eq!(event.event_type(), "example.type");
                assert_eq!(event.spec_version(), to);
            }
        }
    }
}
