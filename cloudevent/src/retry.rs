//! Retry loop for request/response transports.

use std::future::Future;
use std::time::Duration;

use derive_builder::Builder;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Error;
use crate::result::DeliveryResult;

pub const DEFAULT_RETRIABLE_STATUSES: [u16; 5] = [404, 425, 429, 503, 504];

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    #[default]
    None,
    Constant(Duration),
    Linear(Duration),
    Exponential(Duration),
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Constant(delay) => delay,
            Backoff::Linear(delay) => delay.saturating_mul(retry),
            Backoff::Exponential(base) => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                base.saturating_mul(factor)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into), default)]
pub struct RetryParams {
    pub backoff: Backoff,
    /// Maximum number of retries after the first attempt.
    pub max_tries: u32,
    pub retriable_statuses: Vec<u16>,
}

impl Default for RetryParams {
    fn default() -> Self {
        RetryParams {
            backoff: Backoff::None,
            max_tries: 0,
            retriable_statuses: DEFAULT_RETRIABLE_STATUSES.to_vec(),
        }
    }
}

impl RetryParams {
    pub fn builder() -> RetryParamsBuilder {
        RetryParamsBuilder::default()
    }

    pub fn linear(delay: Duration, max_tries: u32) -> Self {
        RetryParams {
            backoff: Backoff::Linear(delay),
            max_tries,
            ..RetryParams::default()
        }
    }

    pub fn constant(delay: Duration, max_tries: u32) -> Self {
        RetryParams {
            backoff: Backoff::Constant(delay),
            max_tries,
            ..RetryParams::default()
        }
    }

    pub fn exponential(base: Duration, max_tries: u32) -> Self {
        RetryParams {
            backoff: Backoff::Exponential(base),
            max_tries,
            ..RetryParams::default()
        }
    }

    /// Timeout-class transport errors and NACKs with a retriable status.
    pub fn is_retriable(&self, result: &DeliveryResult) -> bool {
        match result.terminal() {
            DeliveryResult::Undelivered(err) => err.is_timeout(),
            DeliveryResult::Nack { status } => self.retriable_statuses.contains(status),
            _ => false,
        }
    }

    /// Sum of the delays slept by a loop that exhausts its retries.
    pub fn total_delay(&self) -> Duration {
        (1..=self.max_tries)
            .map(|retry| self.backoff.delay(retry))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Run `attempt` until it yields a non-retriable result, the retries are
/// exhausted or `cancel` fires.
///
/// The returned result is always wrapped in [`DeliveryResult::Retries`],
/// with the non-terminal attempts in `history`. Cancellation ends the loop
/// with `Undelivered(Cancelled)` without sleeping again.
pub async fn retry<F, Fut>(
    params: &RetryParams,
    cancel: &CancellationToken,
    mut attempt: F,
) -> DeliveryResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DeliveryResult>,
{
    let started = Instant::now();
    let mut history = Vec::new();
    let mut retries = 0;
    let wrap = |last: DeliveryResult, retries: u32, history: Vec<DeliveryResult>| {
        DeliveryResult::Retries {
            last: Box::new(last),
            retries,
            duration: started.elapsed(),
            history,
        }
    };

    loop {
        if cancel.is_cancelled() {
            return wrap(DeliveryResult::Undelivered(Error::Cancelled), retries, history);
        }
        let result = attempt().await;
        if retries >= params.max_tries || !params.is_retriable(&result) {
            return wrap(result, retries, history);
        }
        retries += 1;
        let delay = params.backoff.delay(retries);
        debug!(%result, retry = retries, ?delay, "retrying delivery");
        history.push(result);
        tokio::select! {
            _ = cancel.cancelled() => {
                return wrap(DeliveryResult::Undelivered(Error::Cancelled), retries, history);
            }
            _ = sleep(delay) => {}
        }
    }
}
