//! Hooks around send, request and receive.
//!
//! Each `record_*` call opens an operation and returns a callback that closes
//! it with the final result. The core calls the callback exactly once and
//! does not look at what it does.

use std::time::Instant;

use tracing::{debug, info_span, warn, Span};

use crate::error::Error;
use crate::event::Event;
use crate::result::DeliveryResult;

pub type Completion = Box<dyn FnOnce(&DeliveryResult) + Send>;

pub trait ObservabilityService: Send + Sync {
    fn record_sending(&self, event: &Event) -> Completion;

    fn record_requesting(&self, event: &Event) -> Completion;

    fn record_receiving(&self, event: &Event) -> Completion;

    fn record_malformed(&self, err: &Error);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObservability;

impl ObservabilityService for NoopObservability {
    fn record_sending(&self, _event: &Event) -> Completion {
        Box::new(|_| {})
    }

    fn record_requesting(&self, _event: &Event) -> Completion {
        Box::new(|_| {})
    }

    fn record_receiving(&self, _event: &Event) -> Completion {
        Box::new(|_| {})
    }

    fn record_malformed(&self, _err: &Error) {}
}

/// Opens a `tracing` span per operation and logs its outcome and latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObservability;

impl TracingObservability {
    fn record(operation: &'static str, event: &Event) -> Completion {
        let span = info_span!(
            "cloudevent",
            operation,
            id = event.id(),
            source = event.source(),
            event_type = event.event_type(),
        );
        let started = Instant::now();
        Box::new(move |result: &DeliveryResult| finish(&span, started, result))
    }
}

fn finish(span: &Span, started: Instant, result: &DeliveryResult) {
    let _entered = span.enter();
    let elapsed = started.elapsed();
    if result.is_ack() {
        debug!(?elapsed, %result, "delivered");
    } else {
        warn!(?elapsed, %result, "not delivered");
    }
}

impl ObservabilityService for TracingObservability {
    fn record_sending(&self, event: &Event) -> Completion {
        Self::record("send", event)
    }

    fn record_requesting(&self, event: &Event) -> Completion {
        Self::record("request", event)
    }

    fn record_receiving(&self, event: &Event) -> Completion {
        Self::record("receive", event)
    }

    fn record_malformed(&self, err: &Error) {
        warn!(error = %err, "malformed event");
    }
}
