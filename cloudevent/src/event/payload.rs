use serde_json::Value as Json;

use super::Event;
use crate::error::{Error, Result};

type PayloadResult<T> = Option<Result<T>>;

/// Writes a typed payload into an event together with its media type.
pub trait Writer<T>
where
    Self: Sized + Clone,
{
    fn write_payload(&mut self, content_type: &str, value: T) -> Result<()>;

    fn clone_with_new_payload(&self, content_type: &str, value: T) -> Result<Self> {
        let mut new = self.clone();
        new.write_payload(content_type, value)?;
        Ok(new)
    }
}

/// Reads the payload of an event as `T`. `None` when there is no payload.
pub trait Reader<T> {
    fn read_payload(&self) -> PayloadResult<T> {
        self.read_payload_with_content_type()
            .map(|res| res.map(|(_, val)| val))
    }

    fn read_payload_with_content_type(&self) -> PayloadResult<(String, T)>;
}

impl Writer<Json> for Event {
    fn write_payload(&mut self, content_type: &str, value: Json) -> Result<()> {
        let serialized = serde_json::to_vec(&value).map_err(|e| Error::encode(e.to_string()))?;
        self.set_data(content_type, serialized)
    }
}

impl Reader<Json> for Event {
    fn read_payload_with_content_type(&self) -> PayloadResult<(String, Json)> {
        let data = self.data()?;
        let content_type = self.datacontenttype().unwrap_or_default().to_string();
        Some(
            serde_json::from_slice::<Json>(data)
                .map(|j| (content_type, j))
                .map_err(|e| Error::decode_field("data", e.to_string())),
        )
    }
}

impl Writer<String> for Event {
    fn write_payload(&mut self, content_type: &str, value: String) -> Result<()> {
        self.set_data(content_type, value)
    }
}

impl Reader<String> for Event {
    fn read_payload_with_content_type(&self) -> PayloadResult<(String, String)> {
        let data = self.data()?;
        let content_type = self.datacontenttype().unwrap_or_default().to_string();
        Some(
            String::from_utf8(data.to_vec())
                .map(|s| (content_type, s))
                .map_err(|e| Error::decode_field("data", e.to_string())),
        )
    }
}

impl<T> Reader<T> for Option<Event>
where
    Event: Reader<T>,
{
    fn read_payload_with_content_type(&self) -> PayloadResult<(String, T)> {
        self.as_ref()?.read_payload_with_content_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_payload_round_trips() {
        let mut event = Event::new();
        event
            .write_payload("application/json", json!({"hello": "world"}))
            .unwrap();
        let read: Json = event.read_payload().unwrap().unwrap();
        assert_eq!(read, json!({"hello": "world"}));
        assert_eq!(event.datacontenttype(), Some("application/json"));
    }

    #[test]
    fn missing_payload_reads_as_none() {
        let event = Event::new();
        let read: Option<Result<Json>> = event.read_payload();
        assert!(read.is_none());
        let none: Option<Event> = None;
        let read: Option<Result<String>> = none.read_payload();
        assert!(read.is_none());
    }

    #[test]
    fn clone_with_new_payload_leaves_original() {
        let event = Event::new();
        let copy = event
            .clone_with_new_payload("text/plain", "hi".to_string())
            .unwrap();
        assert!(event.data().is_none());
        let text: String = copy.read_payload().unwrap().unwrap();
        assert_eq!(text, "hi");
    }
}
