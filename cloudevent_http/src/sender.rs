//! Outbound HTTP: encode, hand to a [`Requester`], map the status, retry.

use std::sync::Arc;

use async_trait::async_trait;
use cloudevent::observability::NoopObservability;
use cloudevent::retry::retry;
use cloudevent::{
    to_event, Context, DeliveryResult, Encoding, Event, EventMessage, Message, ObservabilityService, Result,
    Transformers,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::status::delivery_result;
use crate::writer::{write_request, InboundResponse, OutboundRequest};

/// The network client the sender runs on. Failures before the peer
/// answered are transport errors ([`cloudevent::Error::transport`], or
/// [`cloudevent::Error::timeout`] for timeouts, which are retried).
#[async_trait]
pub trait Requester: Send + Sync {
    async fn request(&self, request: OutboundRequest) -> Result<InboundResponse>;
}

pub struct Sender<R> {
    requester: R,
    target: String,
    transformers: Transformers,
    observability: Arc<dyn ObservabilityService>,
}

impl<R: Requester> Sender<R> {
    pub fn new(requester: R, target: impl Into<String>) -> Self {
        Sender {
            requester,
            target: target.into(),
            transformers: Transformers::new(),
            observability: Arc::new(NoopObservability),
        }
    }

    pub fn with_transformers(mut self, transformers: Transformers) -> Self {
        self.transformers = transformers;
        self
    }

    pub fn with_observability(mut self, observability: Arc<dyn ObservabilityService>) -> Self {
        self.observability = observability;
        self
    }

    pub fn requester(&self) -> &R {
        &self.requester
    }

    /// Deliver `event`; the peer's answer only matters through its status.
    pub async fn send(&self, ctx: &Context, event: &Event) -> DeliveryResult {
        let completion = self.observability.record_sending(event);
        let (result, _) = self.deliver(ctx, event).await;
        completion(&result);
        result
    }

    /// Deliver `event` and decode the event the peer answered with, if any.
    pub async fn request(&self, ctx: &Context, event: &Event) -> (DeliveryResult, Option<Event>) {
        let completion = self.observability.record_requesting(event);
        let (mut result, response) = self.deliver(ctx, event).await;

        let reply = match response {
            Some(response) if result.terminal().is_ack() => {
                let message = response.into_message();
                match message.read_encoding() {
                    Encoding::Unknown => None,
                    _ => match to_event(Box::new(message), &Transformers::new()) {
                        Ok(reply) => Some(reply),
                        Err(err) => {
                            debug!(error = %err, "reply is not a valid event");
                            result = DeliveryResult::Undelivered(err);
                            None
                        }
                    },
                }
            }
            _ => None,
        };
        completion(&result);
        (result, reply)
    }

    async fn deliver(&self, ctx: &Context, event: &Event) -> (DeliveryResult, Option<InboundResponse>) {
        let mut message = EventMessage::new(event.clone());
        let request = match write_request(ctx, &mut message, &self.target, &self.transformers) {
            Ok((request, encoding)) => {
                debug!(%encoding, target = %self.target, "sending event");
                request
            }
            Err(err) => return (DeliveryResult::Undelivered(err), None),
        };

        let last_response = Mutex::new(None);
        let attempt = || {
            let request = request.clone();
            let last_response = &last_response;
            async move {
                match self.requester.request(request).await {
                    Ok(response) => {
                        let result = delivery_result(response.status);
                        *last_response.lock() = Some(response);
                        result
                    }
                    Err(err) => DeliveryResult::Undelivered(err),
                }
            }
        };

        let result = match ctx.retry() {
            Some(params) => retry(params, ctx.cancellation(), attempt).await,
            None if ctx.is_cancelled() => DeliveryResult::Undelivered(cloudevent::Error::Cancelled),
            None => attempt().await,
        };
        (result, last_response.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use cloudevent::RetryParams;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct Scripted {
        statuses: Mutex<VecDeque<u16>>,
        seen: Mutex<Vec<OutboundRequest>>,
    }

    impl Scripted {
        fn new(statuses: &[u16]) -> Self {
            Scripted {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Requester for Scripted {
        async fn request(&self, request: OutboundRequest) -> Result<InboundResponse> {
            self.seen.lock().push(request);
            match self.statuses.lock().pop_front() {
                Some(status) => Ok(InboundResponse::new(StatusCode::from_u16(status).unwrap())),
                None => Err(cloudevent::Error::transport("connection reset")),
            }
        }
    }

    fn event() -> Event {
        Event::builder().id("1").source("/s").ty("t").build().unwrap()
    }

    #[tokio::test]
    async fn single_attempt_without_retry_params() {
        let sender = Sender::new(Scripted::new(&[503]), "http://localhost/");
        let result = sender.send(&Context::new(), &event()).await;
        assert_eq!(result.status(), Some(503));
        assert_eq!(sender.requester().seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn transport_errors_are_undelivered() {
        let sender = Sender::new(Scripted::new(&[]), "http://localhost/");
        let result = sender.send(&Context::new(), &event()).await;
        assert!(result.is_undelivered());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_accepted() {
        let sender = Sender::new(Scripted::new(&[503, 429, 202]), "http://localhost/");
        let ctx = Context::new().with_retry(RetryParams::linear(Duration::from_millis(10), 5));
        let result = sender.send(&ctx, &event()).await;
        assert!(result.terminal().is_ack());
        assert_eq!(result.retries(), 2);
        assert_eq!(sender.requester().seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn cancelled_context_sends_nothing() {
        let sender = Sender::new(Scripted::new(&[200]), "http://localhost/");
        let ctx = Context::new();
        ctx.cancellation().cancel();
        assert!(sender.send(&ctx, &event()).await.is_undelivered());
        assert!(sender.requester().seen.lock().is_empty());
    }
}
