//! Outbound encoding: headers plus body, shared by requests and responses.

use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use actix_web::http::{Method, StatusCode};
use bytes::Bytes;
use cloudevent::binding::{attribute_header, extension_header, write_into};
use cloudevent::{Attribute, BinaryWriter, Context, Encoding, Error, Format, Message, Result, StructuredWriter, Transformers, Value};

use crate::message::HttpMessage;
use crate::versions;

/// Collects an event as HTTP headers and a body.
#[derive(Debug, Default)]
pub struct HeaderWriter {
    headers: HeaderMap,
    body: Bytes,
}

impl HeaderWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_parts(self) -> (HeaderMap, Bytes) {
        (self.headers, self.body)
    }

    fn insert(&mut self, name: &str, value: &str) -> Result<()> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::encode(format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::encode(format!("invalid value for header {name}: {e}")))?;
        self.headers.insert(header, value);
        Ok(())
    }
}

impl StructuredWriter for HeaderWriter {
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        self.insert(CONTENT_TYPE.as_str(), format.media_type())?;
        self.body = body;
        Ok(())
    }
}

impl BinaryWriter for HeaderWriter {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> Result<()> {
        match attribute_header(versions(), attribute, &value) {
            Some((name, value)) => self.insert(&name, &value),
            None => Ok(()),
        }
    }

    fn set_extension(&mut self, name: &str, value: Value) -> Result<()> {
        let (name, value) = extension_header(versions(), name, &value);
        self.insert(&name, &value)
    }

    fn set_data(&mut self, data: Bytes) -> Result<()> {
        self.body = data;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An HTTP request ready for a [`Requester`](crate::sender::Requester).
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What a [`Requester`](crate::sender::Requester) got back.
#[derive(Debug, Clone)]
pub struct InboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundResponse {
    pub fn new(status: StatusCode) -> Self {
        InboundResponse {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn into_message(self) -> HttpMessage {
        HttpMessage::new(self.headers, self.body)
    }
}

/// Encode `message` as a `POST` to `url`.
pub fn write_request(
    ctx: &Context,
    message: &mut dyn Message,
    url: &str,
    transformers: &Transformers,
) -> Result<(OutboundRequest, Encoding)> {
    let (writer, encoding) = write_into(ctx, message, HeaderWriter::new(), transformers)?;
    let (headers, body) = writer.into_parts();
    let request = OutboundRequest {
        method: Method::POST,
        url: url.to_string(),
        headers,
        body,
    };
    Ok((request, encoding))
}
