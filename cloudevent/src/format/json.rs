use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::ser::{Error as _, SerializeMap, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use super::{Format, JSON_MEDIA_TYPE, normalize_media_type};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::types::{self, Value};
use crate::version::{AttributeKind, SpecVersion};

const DATA: &str = "data";
const DATA_BASE64: &str = "data_base64";
const DATA_CONTENT_ENCODING: &str = "datacontentencoding";
const BASE64_ENCODING: &str = "base64";
const V01_EXTENSIONS: &str = "extensions";

/// `application/cloudevents+json`.
///
/// JSON payloads are embedded verbatim under `data`. Other payloads travel
/// as a `data` string when they are text, and otherwise as `data_base64`
/// (1.0) or a base64 `data` string flagged with `datacontentencoding`
/// (0.3).
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormat;

pub fn is_json_media_type(content_type: &str) -> bool {
    let media = normalize_media_type(content_type);
    media == "application/json" || media == "text/json" || media.ends_with("+json")
}

enum DataField {
    Json(Box<RawValue>),
    Text(String),
    Base64(String),
}

impl JsonFormat {
    pub fn marshal_batch(&self, events: &[Event]) -> Result<Bytes> {
        let mut out = Vec::with_capacity(events.len() * 128 + 2);
        out.push(b'[');
        for (i, event) in events.iter().enumerate() {
            if i > 0 {
                out.push(b',');
            }
            out.extend_from_slice(&self.marshal(event)?);
        }
        out.push(b']');
        Ok(Bytes::from(out))
    }

    pub fn unmarshal_batch(&self, bytes: &[u8]) -> Result<Vec<Event>> {
        let items: Vec<Box<RawValue>> =
            serde_json::from_slice(bytes).map_err(|e| Error::decode(e.to_string()))?;
        items
            .iter()
            .map(|raw| self.unmarshal(raw.get().as_bytes()))
            .collect()
    }

    fn data_field(event: &Event) -> Result<Option<DataField>> {
        let Some(data) = event.data() else {
            return Ok(None);
        };
        let content_type = event.datacontenttype().unwrap_or_default();
        if !event.data_base64() && is_json_media_type(content_type) {
            if let Ok(text) = std::str::from_utf8(data) {
                if let Ok(raw) = RawValue::from_string(text.to_string()) {
                    return Ok(Some(DataField::Json(raw)));
                }
            }
            // Bytes that are not JSON only survive under a base64 marker.
            return match event.spec_version() {
                SpecVersion::V10 | SpecVersion::V03 => Ok(Some(DataField::Base64(BASE64.encode(data)))),
                version => Err(Error::encode(format!(
                    "data is not valid JSON for datacontenttype {content_type} and {version} has no base64 marker"
                ))),
            };
        }
        if !event.data_base64() {
            if let Ok(text) = std::str::from_utf8(data) {
                return Ok(Some(DataField::Text(text.to_string())));
            }
        }
        Ok(Some(DataField::Base64(BASE64.encode(data))))
    }

    fn write<S: Serializer>(&self, event: &Event, serializer: S) -> Result<S::Ok, S::Error> {
        let version = event.spec_version();
        let data = Self::data_field(event).map_err(S::Error::custom)?;
        let mut map = serializer.serialize_map(None)?;
        for (attr, value) in event.iter_attributes() {
            map.serialize_entry(attr.name(), &types::to_json(&value))?;
        }
        match data {
            Some(DataField::Json(raw)) => map.serialize_entry(DATA, &raw)?,
            Some(DataField::Text(text)) => map.serialize_entry(DATA, &text)?,
            Some(DataField::Base64(encoded)) => match version {
                SpecVersion::V10 => map.serialize_entry(DATA_BASE64, &encoded)?,
                SpecVersion::V03 => {
                    map.serialize_entry(DATA_CONTENT_ENCODING, BASE64_ENCODING)?;
                    map.serialize_entry(DATA, &encoded)?;
                }
                SpecVersion::V01 | SpecVersion::V02 => map.serialize_entry(DATA, &encoded)?,
            },
            None => {}
        }
        if version == SpecVersion::V01 {
            if event.extensions().next().is_some() {
                let extensions: serde_json::Map<String, serde_json::Value> = event
                    .extensions()
                    .map(|(k, v)| (k.to_string(), types::to_json(v)))
                    .collect();
                map.serialize_entry(V01_EXTENSIONS, &extensions)?;
            }
        } else {
            for (name, value) in event.extensions() {
                map.serialize_entry(name, &types::to_json(value))?;
            }
        }
        map.end()
    }

    fn read(&self, fields: HashMap<String, Box<RawValue>>) -> Result<Event> {
        let version = spec_version(&fields)?;
        let mut event = Event::empty(version);
        let mut data: Option<&RawValue> = None;
        let mut data_base64: Option<String> = None;
        let mut content_encoding: Option<String> = None;

        for (key, raw) in &fields {
            if let Some((kind, _)) = version.lookup(key) {
                if kind == AttributeKind::SpecVersion {
                    continue;
                }
                let value = match parse_field(key, raw)? {
                    serde_json::Value::Null => continue,
                    serde_json::Value::String(s) => Value::String(s),
                    _ => return Err(Error::decode_field(key, "expected a string")),
                };
                event
                    .set_attribute(kind, Some(value))
                    .map_err(|e| Error::decode_field(key, e.to_string()))?;
                continue;
            }
            match key.as_str() {
                DATA => data = Some(&**raw),
                DATA_BASE64 if version == SpecVersion::V10 => {
                    data_base64 = Some(parse_string(key, raw)?);
                }
                DATA_CONTENT_ENCODING if version == SpecVersion::V03 => {
                    content_encoding = Some(parse_string(key, raw)?);
                }
                V01_EXTENSIONS if version == SpecVersion::V01 => {
                    let serde_json::Value::Object(extensions) = parse_field(key, raw)? else {
                        return Err(Error::decode_field(key, "expected an object"));
                    };
                    for (name, json) in &extensions {
                        set_extension(&mut event, name, json)?;
                    }
                }
                _ => set_extension(&mut event, key, &parse_field(key, raw)?)?,
            }
        }

        if data.is_some() && data_base64.is_some() {
            return Err(Error::decode("both data and data_base64 are present"));
        }
        if let Some(encoded) = data_base64 {
            event.set_data_bytes(Some(decode_base64(DATA_BASE64, &encoded)?));
            event.set_data_base64(true);
        } else if let Some(raw) = data {
            let base64 = content_encoding
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(BASE64_ENCODING));
            let text = raw.get();
            let bytes = if text == "null" {
                None
            } else if base64 {
                event.set_data_base64(true);
                Some(decode_base64(DATA, &parse_string(DATA, raw)?)?)
            } else if text.starts_with('"')
                && !is_json_media_type(event.datacontenttype().unwrap_or_default())
            {
                Some(Bytes::from(parse_string(DATA, raw)?))
            } else {
                Some(Bytes::copy_from_slice(text.as_bytes()))
            };
            if bytes.is_some() && event.datacontenttype().is_none() {
                event.set_datacontenttype(Some(super::APPLICATION_JSON.to_string()))?;
            }
            event.set_data_bytes(bytes);
        }
        if event.data().is_none() && event.datacontenttype().is_some() {
            event.set_datacontenttype(None)?;
        }

        event.validate()?;
        Ok(event)
    }
}

impl Format for JsonFormat {
    fn media_type(&self) -> &str {
        JSON_MEDIA_TYPE
    }

    fn marshal(&self, event: &Event) -> Result<Bytes> {
        let mut out = Vec::with_capacity(256);
        let mut serializer = serde_json::Serializer::new(&mut out);
        self.write(event, &mut serializer)
            .map_err(|e| Error::encode(e.to_string()))?;
        Ok(Bytes::from(out))
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Event> {
        let fields: HashMap<String, Box<RawValue>> =
            serde_json::from_slice(bytes).map_err(|e| Error::decode(e.to_string()))?;
        self.read(fields)
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        JsonFormat.write(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        let bytes = serde_json::to_vec(&json).map_err(serde::de::Error::custom)?;
        JsonFormat
            .unmarshal(&bytes)
            .map_err(serde::de::Error::custom)
    }
}

fn spec_version(fields: &HashMap<String, Box<RawValue>>) -> Result<SpecVersion> {
    let (key, raw) = fields
        .get_key_value("specversion")
        .or_else(|| fields.get_key_value("cloudEventsVersion"))
        .ok_or_else(|| Error::decode_field("specversion", "missing"))?;
    let version = parse_string(key, raw)?;
    let version = SpecVersion::try_from(version.as_str())
        .map_err(|e| Error::decode_field(key, e.to_string()))?;
    if version.attribute_name(AttributeKind::SpecVersion) != Some(key.as_str()) {
        return Err(Error::decode_field(
            key,
            format!("spec version {version} is not named '{key}'"),
        ));
    }
    Ok(version)
}

fn parse_field(key: &str, raw: &RawValue) -> Result<serde_json::Value> {
    serde_json::from_str(raw.get()).map_err(|e| Error::decode_field(key, e.to_string()))
}

fn parse_string(key: &str, raw: &RawValue) -> Result<String> {
    serde_json::from_str(raw.get()).map_err(|_| Error::decode_field(key, "expected a string"))
}

fn decode_base64(key: &str, encoded: &str) -> Result<Bytes> {
    BASE64
        .decode(encoded)
        .map(Bytes::from)
        .map_err(|e| Error::decode_field(key, e.to_string()))
}

fn set_extension(event: &mut Event, name: &str, json: &serde_json::Value) -> Result<()> {
    if json.is_null() {
        return Ok(());
    }
    let value = types::from_json(json).map_err(|e| Error::decode_field(name, e.to_string()))?;
    event
        .set_extension(name, value)
        .map_err(|e| Error::decode_field(name, e.to_string()))
}
