//! Mutators applied while a message is written.
//!
//! A [`TransformerFactory`] provides one view per encoding: a wrapper around
//! a structured writer (or `None` when it cannot work on a serialised blob),
//! a wrapper around a binary writer, and an in-place event mutation.
//! [`Transformers`] chains factories so that list order is application order.

use std::fmt;

use bytes::Bytes;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::event::Event;
use crate::format::Format;
use crate::message::{BinaryWriter, StructuredWriter};
use crate::types::Value;
use crate::version::{Attribute, AttributeKind, SpecVersion};

pub trait TransformerFactory: Send + Sync {
    /// Wrap a structured writer. `None` forces the dispatcher off the
    /// structured-to-structured path.
    fn structured_transformer<'a>(
        &'a self,
        writer: Box<dyn StructuredWriter + 'a>,
    ) -> Option<Box<dyn StructuredWriter + 'a>>;

    fn binary_transformer<'a>(
        &'a self,
        writer: Box<dyn BinaryWriter + 'a>,
    ) -> Box<dyn BinaryWriter + 'a>;

    fn transform_event(&self, event: &mut Event) -> Result<()>;
}

/// An ordered list of transformer factories.
#[derive(Default)]
pub struct Transformers {
    factories: Vec<Box<dyn TransformerFactory>>,
}

impl Transformers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, factory: impl TransformerFactory + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }

    pub fn push(&mut self, factory: Box<dyn TransformerFactory>) {
        self.factories.push(factory);
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Wrap `writer` with every structured view, or `None` as soon as one
    /// factory declines.
    pub fn structured<'a>(
        &'a self,
        writer: &'a mut dyn StructuredWriter,
    ) -> Option<Box<dyn StructuredWriter + 'a>> {
        let mut current: Box<dyn StructuredWriter + 'a> = Box::new(writer);
        for factory in self.factories.iter().rev() {
            current = factory.structured_transformer(current)?;
        }
        Some(current)
    }

    pub fn binary<'a>(&'a self, writer: &'a mut dyn BinaryWriter) -> Box<dyn BinaryWriter + 'a> {
        let mut current: Box<dyn BinaryWriter + 'a> = Box::new(writer);
        for factory in self.factories.iter().rev() {
            current = factory.binary_transformer(current);
        }
        current
    }

    pub fn apply(&self, event: &mut Event) -> Result<()> {
        for factory in &self.factories {
            factory.transform_event(event)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Transformers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformers")
            .field("len", &self.factories.len())
            .finish()
    }
}

impl<T: TransformerFactory + 'static> From<T> for Transformers {
    fn from(factory: T) -> Self {
        Transformers::new().with(factory)
    }
}

/// Structured view that decodes with the blob's own format, mutates the
/// event and re-encodes with the same format, so the media type is kept.
struct Reencode<'a, F> {
    inner: Box<dyn StructuredWriter + 'a>,
    op: F,
}

impl<F> StructuredWriter for Reencode<'_, F>
where
    F: Fn(&mut Event) -> Result<()>,
{
    fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
        let mut event = format.unmarshal(&body)?;
        (self.op)(&mut event)?;
        let body = format.marshal(&event)?;
        self.inner.set_structured_event(format, body)
    }
}

fn reencode<'a, F>(inner: Box<dyn StructuredWriter + 'a>, op: F) -> Box<dyn StructuredWriter + 'a>
where
    F: Fn(&mut Event) -> Result<()> + 'a,
{
    Box::new(Reencode { inner, op })
}

/// Interception points of a binary writer wrapper. The defaults forward.
trait BinaryHook {
    fn attribute(&mut self, inner: &mut dyn BinaryWriter, attribute: Attribute, value: Value) -> Result<()> {
        inner.set_attribute(attribute, value)
    }

    fn extension(&mut self, inner: &mut dyn BinaryWriter, name: &str, value: Value) -> Result<()> {
        inner.set_extension(name, value)
    }

    /// Runs before the inner writer's `end`.
    fn end(&mut self, inner: &mut dyn BinaryWriter) -> Result<()> {
        let _ = inner;
        Ok(())
    }
}

struct Hooked<'a, H> {
    inner: Box<dyn BinaryWriter + 'a>,
    hook: H,
}

fn hooked<'a, H: BinaryHook + 'a>(inner: Box<dyn BinaryWriter + 'a>, hook: H) -> Box<dyn BinaryWriter + 'a> {
    Box::new(Hooked { inner, hook })
}

impl<H: BinaryHook> BinaryWriter for Hooked<'_, H> {
    fn start(&mut self) -> Result<()> {
        self.inner.start()
    }

    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> Result<()> {
        self.hook.attribute(&mut *self.inner, attribute, value)
    }

    fn set_extension(&mut self, name: &str, value: Value) -> Result<()> {
        self.hook.extension(&mut *self.inner, name, value)
    }

    fn set_data(&mut self, data: Bytes) -> Result<()> {
        self.inner.set_data(data)
    }

    fn end(&mut self) -> Result<()> {
        self.hook.end(&mut *self.inner)?;
        self.inner.end()
    }
}

enum Source {
    Fixed(Value),
    Generated(fn() -> Value),
}

impl Source {
    fn value(&self) -> Value {
        match self {
            Source::Fixed(value) => value.clone(),
            Source::Generated(generate) => generate(),
        }
    }
}

/// Sets an attribute when it is absent.
pub struct AddAttribute {
    kind: AttributeKind,
    source: Source,
}

impl AddAttribute {
    pub fn new(kind: AttributeKind, value: impl Into<Value>) -> Self {
        AddAttribute {
            kind,
            source: Source::Fixed(value.into()),
        }
    }

    /// The value is produced fresh for every message.
    pub fn generated(kind: AttributeKind, generate: fn() -> Value) -> Self {
        AddAttribute {
            kind,
            source: Source::Generated(generate),
        }
    }

    fn add(&self, event: &mut Event) -> Result<()> {
        if event.attribute(self.kind).is_some() {
            return Ok(());
        }
        if !event.spec_version().has(self.kind) {
            debug!(kind = %self.kind, version = %event.spec_version(), "attribute not in spec version, not added");
            return Ok(());
        }
        event.set_attribute(self.kind, Some(self.source.value()))
    }
}

struct AddAttributeHook<'a> {
    factory: &'a AddAttribute,
    version: Option<SpecVersion>,
    seen: bool,
}

impl BinaryHook for AddAttributeHook<'_> {
    fn attribute(&mut self, inner: &mut dyn BinaryWriter, attribute: Attribute, value: Value) -> Result<()> {
        self.version = Some(attribute.version());
        if attribute.kind() == self.factory.kind {
            self.seen = true;
        }
        inner.set_attribute(attribute, value)
    }

    fn end(&mut self, inner: &mut dyn BinaryWriter) -> Result<()> {
        if self.seen {
            return Ok(());
        }
        let attribute = self
            .version
            .and_then(|version| Attribute::new(version, self.factory.kind));
        match attribute {
            Some(attribute) => inner.set_attribute(attribute, self.factory.source.value()),
            None => Ok(()),
        }
    }
}

impl TransformerFactory for AddAttribute {
    fn structured_transformer<'a>(
        &'a self,
        writer: Box<dyn StructuredWriter + 'a>,
    ) -> Option<Box<dyn StructuredWriter + 'a>> {
        Some(reencode(writer, move |event: &mut Event| self.add(event)))
    }

    fn binary_transformer<'a>(&'a self, writer: Box<dyn BinaryWriter + 'a>) -> Box<dyn BinaryWriter + 'a> {
        hooked(
            writer,
            AddAttributeHook {
                factory: self,
                version: None,
                seen: false,
            },
        )
    }

    fn transform_event(&self, event: &mut Event) -> Result<()> {
        self.add(event)
    }
}

/// Sets a fresh UUID v4 `id` when the message has none.
pub fn add_uuid_if_missing() -> AddAttribute {
    AddAttribute::generated(AttributeKind::Id, || Value::String(Uuid::new_v4().to_string()))
}

/// Sets `time` to the current instant when the message has none.
pub fn add_time_now_if_missing() -> AddAttribute {
    AddAttribute::generated(AttributeKind::Time, || Value::Time(Utc::now()))
}

/// Sets an extension when it is absent.
pub struct AddExtension {
    name: String,
    value: Value,
}

impl AddExtension {
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        AddExtension {
            name: name.to_ascii_lowercase(),
            value: value.into(),
        }
    }

    fn add(&self, event: &mut Event) -> Result<()> {
        if event.extension(&self.name).is_some() {
            return Ok(());
        }
        event.set_extension(&self.name, self.value.clone())
    }
}

struct AddExtensionHook<'a> {
    factory: &'a AddExtension,
    seen: bool,
}

impl BinaryHook for AddExtensionHook<'_> {
    fn extension(&mut self, inner: &mut dyn BinaryWriter, name: &str, value: Value) -> Result<()> {
        if name.eq_ignore_ascii_case(&self.factory.name) {
            self.seen = true;
        }
        inner.set_extension(name, value)
    }

    fn end(&mut self, inner: &mut dyn BinaryWriter) -> Result<()> {
        if self.seen {
            return Ok(());
        }
        inner.set_extension(&self.factory.name, self.factory.value.clone())
    }
}

impl TransformerFactory for AddExtension {
    fn structured_transformer<'a>(
        &'a self,
        writer: Box<dyn StructuredWriter + 'a>,
    ) -> Option<Box<dyn StructuredWriter + 'a>> {
        Some(reencode(writer, move |event: &mut Event| self.add(event)))
    }

    fn binary_transformer<'a>(&'a self, writer: Box<dyn BinaryWriter + 'a>) -> Box<dyn BinaryWriter + 'a> {
        hooked(writer, AddExtensionHook { factory: self, seen: false })
    }

    fn transform_event(&self, event: &mut Event) -> Result<()> {
        self.add(event)
    }
}

type UpdateFn = Box<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Replaces a present attribute with `f(old)`.
///
/// `f` returning `None` deletes the attribute on the event and binary paths.
/// On the structured path the attribute is left untouched.
pub struct UpdateAttribute {
    kind: AttributeKind,
    update: UpdateFn,
}

impl UpdateAttribute {
    pub fn new<F>(kind: AttributeKind, update: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        UpdateAttribute {
            kind,
            update: Box::new(update),
        }
    }

    fn update(&self, event: &mut Event, delete_on_absent: bool) -> Result<()> {
        let Some(old) = event.attribute(self.kind) else {
            return Ok(());
        };
        match (self.update)(&old) {
            Some(new) => event.set_attribute(self.kind, Some(new)),
            None if delete_on_absent => event.set_attribute(self.kind, None),
            None => {
                debug!(kind = %self.kind, "update returned no value in structured mode, attribute kept");
                Ok(())
            }
        }
    }
}

struct UpdateAttributeHook<'a>(&'a UpdateAttribute);

impl BinaryHook for UpdateAttributeHook<'_> {
    fn attribute(&mut self, inner: &mut dyn BinaryWriter, attribute: Attribute, value: Value) -> Result<()> {
        if attribute.kind() != self.0.kind {
            return inner.set_attribute(attribute, value);
        }
        match (self.0.update)(&value) {
            Some(new) => inner.set_attribute(attribute, new),
            None => Ok(()),
        }
    }
}

impl TransformerFactory for UpdateAttribute {
    fn structured_transformer<'a>(
        &'a self,
        writer: Box<dyn StructuredWriter + 'a>,
    ) -> Option<Box<dyn StructuredWriter + 'a>> {
        Some(reencode(writer, move |event: &mut Event| self.update(event, false)))
    }

    fn binary_transformer<'a>(&'a self, writer: Box<dyn BinaryWriter + 'a>) -> Box<dyn BinaryWriter + 'a> {
        hooked(writer, UpdateAttributeHook(self))
    }

    fn transform_event(&self, event: &mut Event) -> Result<()> {
        self.update(event, true)
    }
}

/// Replaces a present extension with `f(old)`; same absent rules as
/// [`UpdateAttribute`].
pub struct UpdateExtension {
    name: String,
    update: UpdateFn,
}

impl UpdateExtension {
    pub fn new<F>(name: &str, update: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        UpdateExtension {
            name: name.to_ascii_lowercase(),
            update: Box::new(update),
        }
    }

    fn update(&self, event: &mut Event, delete_on_absent: bool) -> Result<()> {
        let Some(old) = event.extension(&self.name).cloned() else {
            return Ok(());
        };
        match (self.update)(&old) {
            Some(new) => event.set_extension(&self.name, new),
            None if delete_on_absent => {
                event.remove_extension(&self.name);
                Ok(())
            }
            None => {
                debug!(extension = %self.name, "update returned no value in structured mode, extension kept");
                Ok(())
            }
        }
    }
}

struct UpdateExtensionHook<'a>(&'a UpdateExtension);

impl BinaryHook for UpdateExtensionHook<'_> {
    fn extension(&mut self, inner: &mut dyn BinaryWriter, name: &str, value: Value) -> Result<()> {
        if !name.eq_ignore_ascii_case(&self.0.name) {
            return inner.set_extension(name, value);
        }
        match (self.0.update)(&value) {
            Some(new) => inner.set_extension(name, new),
            None => Ok(()),
        }
    }
}

impl TransformerFactory for UpdateExtension {
    fn structured_transformer<'a>(
        &'a self,
        writer: Box<dyn StructuredWriter + 'a>,
    ) -> Option<Box<dyn StructuredWriter + 'a>> {
        Some(reencode(writer, move |event: &mut Event| self.update(event, false)))
    }

    fn binary_transformer<'a>(&'a self, writer: Box<dyn BinaryWriter + 'a>) -> Box<dyn BinaryWriter + 'a> {
        hooked(writer, UpdateExtensionHook(self))
    }

    fn transform_event(&self, event: &mut Event) -> Result<()> {
        self.update(event, true)
    }
}

/// Removes an attribute. Required attributes cannot be removed from a
/// decoded event.
pub struct DeleteAttribute {
    kind: AttributeKind,
}

impl DeleteAttribute {
    pub fn new(kind: AttributeKind) -> Self {
        DeleteAttribute { kind }
    }

    fn delete(&self, event: &mut Event) -> Result<()> {
        if event.attribute(self.kind).is_none() {
            return Ok(());
        }
        event.set_attribute(self.kind, None)
    }
}

struct DeleteAttributeHook(AttributeKind);

impl BinaryHook for DeleteAttributeHook {
    fn attribute(&mut self, inner: &mut dyn BinaryWriter, attribute: Attribute, value: Value) -> Result<()> {
        if attribute.kind() == self.0 {
            return Ok(());
        }
        inner.set_attribute(attribute, value)
    }
}

impl TransformerFactory for DeleteAttribute {
    fn structured_transformer<'a>(
        &'a self,
        writer: Box<dyn StructuredWriter + 'a>,
    ) -> Option<Box<dyn StructuredWriter + 'a>> {
        Some(reencode(writer, move |event: &mut Event| self.delete(event)))
    }

    fn binary_transformer<'a>(&'a self, writer: Box<dyn BinaryWriter + 'a>) -> Box<dyn BinaryWriter + 'a> {
        hooked(writer, DeleteAttributeHook(self.kind))
    }

    fn transform_event(&self, event: &mut Event) -> Result<()> {
        self.delete(event)
    }
}

pub struct DeleteExtension {
    name: String,
}

impl DeleteExtension {
    pub fn new(name: &str) -> Self {
        DeleteExtension {
            name: name.to_ascii_lowercase(),
        }
    }
}

struct DeleteExtensionHook<'a>(&'a str);

impl BinaryHook for DeleteExtensionHook<'_> {
    fn extension(&mut self, inner: &mut dyn BinaryWriter, name: &str, value: Value) -> Result<()> {
        if name.eq_ignore_ascii_case(self.0) {
            return Ok(());
        }
        inner.set_extension(name, value)
    }
}

impl TransformerFactory for DeleteExtension {
    fn structured_transformer<'a>(
        &'a self,
        writer: Box<dyn StructuredWriter + 'a>,
    ) -> Option<Box<dyn StructuredWriter + 'a>> {
        Some(reencode(writer, move |event: &mut Event| {
            event.remove_extension(&self.name);
            Ok(())
        }))
    }

    fn binary_transformer<'a>(&'a self, writer: Box<dyn BinaryWriter + 'a>) -> Box<dyn BinaryWriter + 'a> {
        hooked(writer, DeleteExtensionHook(&self.name))
    }

    fn transform_event(&self, event: &mut Event) -> Result<()> {
        event.remove_extension(&self.name);
        Ok(())
    }
}

/// Converts messages to another spec version.
///
/// A structured blob cannot be rewritten attribute by attribute, so this
/// factory declines the structured view and the dispatcher decodes instead.
pub struct SetVersion {
    version: SpecVersion,
}

impl SetVersion {
    pub fn new(version: SpecVersion) -> Self {
        SetVersion { version }
    }
}

struct SetVersionHook(SpecVersion);

impl BinaryHook for SetVersionHook {
    fn attribute(&mut self, inner: &mut dyn BinaryWriter, attribute: Attribute, value: Value) -> Result<()> {
        let target = self.0;
        if attribute.kind() == AttributeKind::SpecVersion {
            return match Attribute::new(target, AttributeKind::SpecVersion) {
                Some(attr) => inner.set_attribute(attr, Value::String(target.to_string())),
                None => Ok(()),
            };
        }
        match Attribute::new(target, attribute.kind()) {
            Some(attr) => inner.set_attribute(attr, value),
            None => inner.set_extension(&attribute.name().to_ascii_lowercase(), value),
        }
    }

    fn extension(&mut self, inner: &mut dyn BinaryWriter, name: &str, value: Value) -> Result<()> {
        let target = self.0;
        if target == SpecVersion::V10 && name.eq_ignore_ascii_case("datacontentencoding") {
            return Ok(());
        }
        match target.lookup(name).and_then(|(kind, _)| Attribute::new(target, kind)) {
            Some(attr) if attr.kind() != AttributeKind::SpecVersion => inner.set_attribute(attr, value),
            _ => inner.set_extension(name, value),
        }
    }
}

impl TransformerFactory for SetVersion {
    fn structured_transformer<'a>(
        &'a self,
        _writer: Box<dyn StructuredWriter + 'a>,
    ) -> Option<Box<dyn StructuredWriter + 'a>> {
        None
    }

    fn binary_transformer<'a>(&'a self, writer: Box<dyn BinaryWriter + 'a>) -> Box<dyn BinaryWriter + 'a> {
        hooked(writer, SetVersionHook(self.version))
    }

    fn transform_event(&self, event: &mut Event) -> Result<()> {
        event.set_spec_version(self.version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{JsonFormat, JSON_MEDIA_TYPE};
    use crate::message::{write_event_binary, write_event_structured, EventWriter};

    fn sample() -> Event {
        Event::builder()
            .id("1")
            .source("/s")
            .ty("t")
            .extension("ext", "v")
            .build()
            .unwrap()
    }

    #[derive(Default)]
    struct Capture {
        media_type: String,
        body: Bytes,
    }

    impl StructuredWriter for Capture {
        fn set_structured_event(&mut self, format: &dyn Format, body: Bytes) -> Result<()> {
            self.media_type = format.media_type().to_string();
            self.body = body;
            Ok(())
        }
    }

    fn through_binary(transformers: &Transformers, event: &Event) -> Event {
        let mut writer = EventWriter::new();
        {
            let mut wrapped = transformers.binary(&mut writer);
            write_event_binary(event, &mut *wrapped).unwrap();
        }
        writer.into_event().unwrap()
    }

    fn through_structured(transformers: &Transformers, event: &Event) -> Event {
        let mut capture = Capture::default();
        {
            let mut wrapped = transformers.structured(&mut capture).unwrap();
            write_event_structured(event, &JsonFormat, &mut *wrapped).unwrap();
        }
        assert_eq!(capture.media_type, JSON_MEDIA_TYPE);
        JsonFormat.unmarshal(&capture.body).unwrap()
    }

    fn through_event(transformers: &Transformers, event: &Event) -> Event {
        let mut event = event.clone();
        transformers.apply(&mut event).unwrap();
        event
    }

    #[test]
    fn add_attribute_sets_only_when_absent() {
        let transformers = Transformers::from(AddAttribute::new(AttributeKind::Subject, "added"));
        for out in [
            through_event(&transformers, &sample()),
            through_binary(&transformers, &sample()),
            through_structured(&transformers, &sample()),
        ] {
            assert_eq!(out.subject(), Some("added"));
        }

        let mut with_subject = sample();
        with_subject.set_subject(Some("kept".into())).unwrap();
        assert_eq!(through_binary(&transformers, &with_subject).subject(), Some("kept"));
        assert_eq!(through_event(&transformers, &with_subject).subject(), Some("kept"));
    }

    #[test]
    fn add_attribute_twice_equals_once() {
        let once = Transformers::from(AddAttribute::new(AttributeKind::Subject, "a"));
        let twice = Transformers::new()
            .with(AddAttribute::new(AttributeKind::Subject, "a"))
            .with(AddAttribute::new(AttributeKind::Subject, "a"));
        assert_eq!(through_event(&once, &sample()), through_event(&twice, &sample()));
        assert_eq!(through_binary(&once, &sample()), through_binary(&twice, &sample()));
    }

    #[test]
    fn delete_extension_is_idempotent() {
        let once = Transformers::from(DeleteExtension::new("ext"));
        let twice = Transformers::new()
            .with(DeleteExtension::new("ext"))
            .with(DeleteExtension::new("EXT"));
        let a = through_binary(&once, &sample());
        assert!(a.extension("ext").is_none());
        assert_eq!(a, through_binary(&twice, &sample()));
        assert_eq!(through_event(&once, &sample()), through_event(&twice, &sample()));
    }

    #[test]
    fn add_and_update_compose_to_set_with_default() {
        let transformers = Transformers::new()
            .with(AddExtension::new("count", 0))
            .with(UpdateExtension::new("count", |v| match v {
                Value::Integer(i) => Some(Value::Integer(i + 1)),
                _ => None,
            }));
        assert_eq!(
            through_event(&transformers, &sample()).extension("count"),
            Some(&Value::Integer(1))
        );
        assert_eq!(
            through_structured(&transformers, &sample()).extension("count"),
            Some(&Value::Integer(1))
        );
        assert_eq!(
            through_binary(&transformers, &sample()).extension("count"),
            Some(&Value::Integer(1))
        );
    }

    #[test]
    fn update_to_absent_deletes_except_in_structured_mode() {
        let transformers = Transformers::from(UpdateExtension::new("ext", |_| None));
        assert!(through_event(&transformers, &sample()).extension("ext").is_none());
        assert!(through_binary(&transformers, &sample()).extension("ext").is_none());
        assert_eq!(
            through_structured(&transformers, &sample()).extension("ext"),
            Some(&Value::from("v"))
        );
    }

    #[test]
    fn update_attribute_rewrites_value() {
        let transformers = Transformers::from(UpdateAttribute::new(AttributeKind::Type, |v| {
            Some(Value::String(format!("{v}.v2")))
        }));
        assert_eq!(through_binary(&transformers, &sample()).event_type(), "t.v2");
        assert_eq!(through_event(&transformers, &sample()).event_type(), "t.v2");
    }

    #[test]
    fn deleting_required_attribute_from_event_fails() {
        let transformers = Transformers::from(DeleteAttribute::new(AttributeKind::Id));
        let mut event = sample();
        assert!(transformers.apply(&mut event).is_err());
    }

    #[test]
    fn set_version_declines_structured_and_renames_binary() {
        let transformers = Transformers::from(SetVersion::new(SpecVersion::V02));
        let mut capture = Capture::default();
        assert!(transformers.structured(&mut capture).is_none());

        let mut event = sample();
        event.set_subject(Some("moved".into())).unwrap();
        let out = through_binary(&transformers, &event);
        assert_eq!(out.spec_version(), SpecVersion::V02);
        assert_eq!(out.extension("subject"), Some(&Value::from("moved")));
        assert_eq!(out, event.convert_to(SpecVersion::V02));
    }

    #[test]
    fn generated_values_are_fresh_per_message() {
        let transformers = Transformers::from(add_time_now_if_missing());
        let out = through_binary(&transformers, &sample());
        assert!(out.time().is_some());

        let ids = Transformers::from(add_uuid_if_missing());
        let mut event = Event::empty(SpecVersion::V10);
        event.set_source("/s").unwrap();
        event.set_type("t").unwrap();
        let mut other = event.clone();
        ids.apply(&mut event).unwrap();
        ids.apply(&mut other).unwrap();
        assert_ne!(event.id(), other.id());
        assert!(Uuid::parse_str(event.id()).is_ok());
    }

    #[test]
    fn list_order_is_application_order() {
        let transformers = Transformers::new()
            .with(UpdateAttribute::new(AttributeKind::Type, |v| {
                Some(Value::String(format!("{v}-first")))
            }))
            .with(UpdateAttribute::new(AttributeKind::Type, |v| {
                Some(Value::String(format!("{v}-second")))
            }));
        assert_eq!(through_binary(&transformers, &sample()).event_type(), "t-first-second");
        assert_eq!(through_event(&transformers, &sample()).event_type(), "t-first-second");
        assert_eq!(
            through_structured(&transformers, &sample()).event_type(),
            "t-first-second"
        );
    }
}
