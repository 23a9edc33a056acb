use std::sync::Arc;

use actix_web::http::header::{HeaderMap, CONTENT_TYPE};
use actix_web::HttpRequest;
use bytes::Bytes;
use cloudevent::binding::{self, detect_encoding, read_header};
use cloudevent::format::{self, is_batch_media_type, Format, JsonFormat};
use cloudevent::{AttributeKind, BinaryWriter, Encoding, Error, Event, Message, Result, SpecVersion, StructuredWriter, Value};

use crate::versions;

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// An inbound HTTP request or response carrying an event.
///
/// A `ce-specversion` header means binary mode; otherwise a `Content-Type`
/// with a registered format means structured mode. Batch bodies are neither
/// and are read with [`HttpMessage::read_batch`].
#[derive(Debug)]
pub struct HttpMessage {
    headers: HeaderMap,
    body: Bytes,
    version: Option<SpecVersion>,
    format: Option<Arc<dyn Format>>,
}

impl HttpMessage {
    pub fn new(headers: HeaderMap, body: Bytes) -> Self {
        let version = versions().spec_version_of(|name| header_str(&headers, name));
        let format = match version {
            Some(_) => None,
            None => header_str(&headers, CONTENT_TYPE.as_str()).and_then(format::lookup),
        };
        HttpMessage {
            headers,
            body,
            version,
            format,
        }
    }

    pub fn from_request(req: &HttpRequest, body: Bytes) -> Self {
        Self::new(req.headers().clone(), body)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_batch(&self) -> bool {
        header_str(&self.headers, CONTENT_TYPE.as_str()).is_some_and(is_batch_media_type)
    }

    pub fn read_batch(&self) -> Result<Vec<Event>> {
        if !self.is_batch() {
            return Err(Error::WrongEncoding {
                expected: Encoding::Structured,
                actual: self.read_encoding(),
            });
        }
        JsonFormat.unmarshal_batch(&self.body)
    }
}

impl Message for HttpMessage {
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
        writer.set_structured_event(format.as_ref(), self.body.clone())
    }

    fn read_binary(&mut self, writer: &mut dyn BinaryWriter) -> Result<()> {
        let Some(version) = self.version else {
            return Err(Error::WrongEncoding {
                expected: Encoding::Binary,
                actual: self.read_encoding(),
            });
        };
        writer.start()?;
        let registry = versions();
        for (name, value) in self.headers.iter() {
            let name = name.as_str();
            // Only event headers have to be text; others may carry obs-text.
            if registry.lookup(version, name).is_none() && registry.extension_name(name).is_none() {
                continue;
            }
            let value = value
                .to_str()
                .map_err(|e| Error::decode_field(name, e.to_string()))?;
            read_header(registry, version, name, value, writer)?;
        }
        if !self.body.is_empty() {
            writer.set_data(self.body.clone())?;
        }
        writer.end()
    }

    fn get_attribute(&self, kind: AttributeKind) -> Option<Value> {
        binding::header_attribute(versions(), self.version?, kind, |name| {
            header_str(&self.headers, name)
        })
    }

    fn get_extension(&self, name: &str) -> Option<Value> {
        self.version?;
        header_str(&self.headers, &versions().extension_wire_name(name))
            .map(|v| Value::String(v.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn binary_request() {
        let mut message = HttpMessage::new(
            headers(&[
                ("Ce-Specversion", "1.0"),
                ("ce-id", "ABC-123"),
                ("ce-type", "unit.test"),
                ("ce-source", "/unit/test"),
                ("CE-Traceparent", "00-abc"),
                ("content-type", "application/json"),
                ("user-agent", "test"),
            ]),
            Bytes::from_static(br#"{"hello":"unittest"}"#),
        );
        assert_eq!(message.read_encoding(), Encoding::Binary);
        assert_eq!(message.get_attribute(AttributeKind::Id), Some(Value::from("ABC-123")));
        assert_eq!(message.get_extension("traceparent"), Some(Value::from("00-abc")));

        let event = message.to_event().unwrap();
        assert_eq!(event.id(), "ABC-123");
        assert_eq!(event.datacontenttype(), Some("application/json"));
        assert_eq!(event.extension("traceparent"), Some(&Value::from("00-abc")));
        assert!(event.extension("user-agent").is_none());
        assert_eq!(event.data().unwrap().as_ref(), br#"{"hello":"unittest"}"#);
    }

    fn binary_headers() -> HeaderMap {
        headers(&[
            ("ce-specversion", "1.0"),
            ("ce-id", "ABC-123"),
            ("ce-type", "unit.test"),
            ("ce-source", "/unit/test"),
            ("content-type", "application/json"),
        ])
    }

    #[test]
    fn empty_body_has_no_data_or_content_type() {
        let mut message = HttpMessage::new(binary_headers(), Bytes::new());
        let event = message.to_event().unwrap();
        assert!(event.data().is_none());
        assert_eq!(event.datacontenttype(), None);
        event.validate().unwrap();
    }

    #[test]
    fn opaque_non_event_headers_are_ignored() {
        let mut map = binary_headers();
        map.append(
            HeaderName::from_static("x-forwarded-note"),
            HeaderValue::from_bytes(b"caf\xe9").unwrap(),
        );
        let mut message = HttpMessage::new(map, Bytes::from_static(b"{}"));
        let event = message.to_event().unwrap();
        assert_eq!(event.id(), "ABC-123");
        assert!(event.extension("x-forwarded-note").is_none());
    }

    #[test]
    fn opaque_event_header_is_a_decode_error() {
        let mut map = binary_headers();
        map.append(
            HeaderName::from_static("ce-note"),
            HeaderValue::from_bytes(b"caf\xe9").unwrap(),
        );
        let err = HttpMessage::new(map, Bytes::from_static(b"{}")).to_event().unwrap_err();
        assert!(matches!(err, Error::Decode { field: Some(ref f), .. } if f == "ce-note"));
    }

    #[test]
    fn structured_request() {
        let body = br#"{"specversion":"1.0","id":"1","source":"/s","type":"t"}"#;
        let mut message = HttpMessage::new(
            headers(&[("content-type", "application/cloudevents+json; charset=utf-8")]),
            Bytes::from_static(body),
        );
        assert_eq!(message.read_encoding(), Encoding::Structured);
        assert!(message.get_attribute(AttributeKind::Id).is_none());
        assert_eq!(message.to_event().unwrap().id(), "1");
    }

    #[test]
    fn plain_requests_have_unknown_encoding() {
        let message = HttpMessage::new(
            headers(&[("content-type", "application/json")]),
            Bytes::from_static(b"{}"),
        );
        assert_eq!(message.read_encoding(), Encoding::Unknown);
        assert!(!message.is_batch());
        assert!(message.read_batch().is_err());
    }

    #[test]
    fn batch_request() {
        let body = br#"[{"specversion":"1.0","id":"1","source":"/s","type":"t"},
                       {"specversion":"1.0","id":"2","source":"/s","type":"t"}]"#;
        let message = HttpMessage::new(
            headers(&[("content-type", "application/cloudevents-batch+json")]),
            Bytes::from_static(body),
        );
        assert!(message.is_batch());
        let events = message.read_batch().unwrap();
        assert_eq!(events.iter().map(|e| e.id()).collect::<Vec<_>>(), ["1", "2"]);
    }
}
