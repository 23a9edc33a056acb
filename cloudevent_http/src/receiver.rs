//! actix-web server that turns inbound requests into events for a handler.

use std::env;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actix_web::http::header::ALLOW;
use actix_web::http::Method;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use async_trait::async_trait;
use cloudevent::observability::NoopObservability;
use cloudevent::{to_event, DeliveryResult, Encoding, Error, Event, Message, ObservabilityService, Transformers};
use derive_builder::Builder;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::message::{header_str, HttpMessage};
use crate::response_writer::{reply_context, write_batch, write_cloud_event};
use crate::status::into_actix_error;

const PORT_ENV: &str = "PORT";
const DEFAULT_PORT: u16 = 8080;

pub const WEBHOOK_REQUEST_ORIGIN: &str = "webhook-request-origin";
pub const WEBHOOK_REQUEST_RATE: &str = "webhook-request-rate";
pub const WEBHOOK_ALLOWED_ORIGIN: &str = "webhook-allowed-origin";
pub const WEBHOOK_ALLOWED_RATE: &str = "webhook-allowed-rate";

/// Called once per inbound event. `None` means the request carried no
/// event at all; returning `Some` sends a reply event back.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, event: Option<Event>) -> cloudevent::Result<Option<Event>>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Option<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = cloudevent::Result<Option<Event>>> + Send + 'static,
{
    async fn handle(&self, event: Option<Event>) -> cloudevent::Result<Option<Event>> {
        self(event).await
    }
}

/// Answers to the webhook validation handshake sent as an `OPTIONS`
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into), default)]
pub struct WebhookConfig {
    allowed_methods: Vec<String>,
    #[builder(setter(strip_option))]
    allowed_rate: Option<u32>,
    /// Origin prefixes; `*` allows any origin.
    allowed_origins: Vec<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        WebhookConfig {
            allowed_methods: vec![Method::POST.to_string()],
            allowed_rate: None,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl WebhookConfig {
    pub fn builder() -> WebhookConfigBuilder {
        WebhookConfigBuilder::default()
    }

    fn allowed_origin(&self, request_origin: &str) -> Option<String> {
        self.allowed_origins
            .iter()
            .find(|allowed| allowed.as_str() == "*" || request_origin.starts_with(allowed.as_str()))
            .cloned()
    }
}

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub bind: SocketAddr,
    pub path: String,
    pub webhook: Option<WebhookConfig>,
}

impl ReceiverConfig {
    /// Listen on every interface, on `$PORT` or 8080.
    pub fn from_env() -> Self {
        let port = env::var(PORT_ENV)
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        ReceiverConfig {
            bind: ([0, 0, 0, 0], port).into(),
            path: "/".to_string(),
            webhook: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_webhook(mut self, webhook: WebhookConfig) -> Self {
        self.webhook = Some(webhook);
        self
    }
}

#[derive(Clone)]
struct ReceiverState {
    handler: Arc<dyn Handler>,
    transformers: Arc<Transformers>,
    observability: Arc<dyn ObservabilityService>,
    webhook: Option<WebhookConfig>,
}

impl ReceiverState {
    fn malformed(&self, err: Error) -> actix_web::Error {
        warn!(error = %err, "rejecting malformed event");
        self.observability.record_malformed(&err);
        into_actix_error(err)
    }

    async fn receive(&self, event: Option<Event>) -> Result<Option<Event>, actix_web::Error> {
        let completion = event.as_ref().map(|e| self.observability.record_receiving(e));
        let outcome = self.handler.handle(event).await;
        match outcome {
            Ok(reply) => {
                if let Some(done) = completion {
                    done(&DeliveryResult::Ack);
                }
                Ok(reply)
            }
            Err(err) => {
                let message = err.to_string();
                if let Some(done) = completion {
                    done(&DeliveryResult::Undelivered(err));
                }
                Err(actix_web::error::ErrorInternalServerError(message))
            }
        }
    }
}

pub struct Receiver {
    config: ReceiverConfig,
    state: ReceiverState,
}

static LISTENING: AtomicBool = AtomicBool::new(false);

/// Held while a receiver owns the listening socket.
struct ListenGuard;

impl ListenGuard {
    fn acquire() -> io::Result<Self> {
        if LISTENING.swap(true, Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                "a receiver is already listening",
            ));
        }
        Ok(ListenGuard)
    }
}

impl Drop for ListenGuard {
    fn drop(&mut self) {
        LISTENING.store(false, Ordering::SeqCst);
    }
}

impl Receiver {
    pub fn new(config: ReceiverConfig, handler: impl Handler) -> Self {
        let state = ReceiverState {
            handler: Arc::new(handler),
            transformers: Arc::new(Transformers::new()),
            observability: Arc::new(NoopObservability),
            webhook: config.webhook.clone(),
        };
        Receiver { config, state }
    }

    /// Transformers applied to every inbound event before the handler
    /// sees it.
    pub fn with_transformers(mut self, transformers: Transformers) -> Self {
        self.state.transformers = Arc::new(transformers);
        self
    }

    pub fn with_observability(mut self, observability: Arc<dyn ObservabilityService>) -> Self {
        self.state.observability = observability;
        self
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Register the receiver's routes, e.g. on an `App` under test.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        configure_routes(cfg, &self.config.path, web::Data::new(self.state.clone()));
    }

    /// Serve until `cancel` fires. Fails fast when another receiver in this
    /// process is already listening.
    pub async fn run(self, cancel: CancellationToken) -> io::Result<()> {
        let _guard = ListenGuard::acquire()?;
        let state = web::Data::new(self.state.clone());
        let path = self.config.path.clone();
        let server = HttpServer::new(move || {
            let state = state.clone();
            let path = path.clone();
            App::new().configure(move |cfg| configure_routes(cfg, &path, state))
        })
        .bind(self.config.bind)?
        .run();

        info!(bind = %self.config.bind, path = %self.config.path, "receiver listening");
        let handle = server.handle();
        actix_rt::spawn(async move {
            cancel.cancelled().await;
            handle.stop(true).await;
        });
        server.await
    }
}

fn configure_routes(cfg: &mut web::ServiceConfig, path: &str, state: web::Data<ReceiverState>) {
    cfg.app_data(state).service(
        web::resource(path)
            .route(web::post().to(handle_event))
            .route(web::get().to(handle_event))
            .route(web::method(Method::OPTIONS).to(handle_options)),
    );
}

// An unknown encoding with an empty body is a request without an event.
// Anything else the message cannot be decoded from is rejected.
async fn handle_event(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<ReceiverState>,
) -> Result<HttpResponse, actix_web::Error> {
    let message = HttpMessage::from_request(&req, body);

    if message.is_batch() {
        let events = message.read_batch().map_err(|e| state.malformed(e))?;
        debug!(count = events.len(), "received batch");
        let replies = try_join_all(events.into_iter().map(|event| state.receive(Some(event)))).await?;
        let replies: Vec<Event> = replies.into_iter().flatten().collect();
        return write_batch(&replies);
    }

    let encoding = message.read_encoding();
    let event = match encoding {
        Encoding::Unknown if message.body().is_empty() => None,
        Encoding::Unknown => return Err(state.malformed(Error::UnknownEncoding)),
        _ => Some(to_event(Box::new(message), &state.transformers).map_err(|e| state.malformed(e))?),
    };
    debug!(%encoding, has_event = event.is_some(), "received request");

    let reply = state.receive(event).await?;
    write_cloud_event(&reply_context(encoding), reply, &Transformers::new())
}

async fn handle_options(req: HttpRequest, state: web::Data<ReceiverState>) -> HttpResponse {
    let Some(webhook) = &state.webhook else {
        return HttpResponse::MethodNotAllowed().finish();
    };
    let request_origin = header_str(req.headers(), WEBHOOK_REQUEST_ORIGIN).unwrap_or_default();
    let Some(origin) = webhook.allowed_origin(request_origin) else {
        debug!(origin = request_origin, "webhook origin not allowed");
        return HttpResponse::BadRequest().finish();
    };

    let mut response = HttpResponse::Ok();
    response.insert_header((WEBHOOK_ALLOWED_ORIGIN, origin));
    match webhook.allowed_rate {
        Some(rate) => {
            response.insert_header((WEBHOOK_ALLOWED_RATE, rate.to_string()));
        }
        None if req.headers().contains_key(WEBHOOK_REQUEST_RATE) => {
            response.insert_header((WEBHOOK_ALLOWED_RATE, "*"));
        }
        None => {}
    }
    let methods = if webhook.allowed_methods.is_empty() {
        Method::POST.to_string()
    } else {
        webhook.allowed_methods.join(", ")
    };
    response.insert_header((ALLOW, methods));
    response.finish()
}
