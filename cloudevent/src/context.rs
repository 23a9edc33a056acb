//! Per-operation options read by the write dispatcher, the bindings and the
//! retry loop.

use tokio_util::sync::CancellationToken;

use crate::message::Encoding;
use crate::retry::RetryParams;

#[derive(Debug, Clone, Default)]
pub struct Context {
    preferred: Option<Encoding>,
    skip_direct_structured: bool,
    skip_direct_binary: bool,
    skip_key: bool,
    retry: Option<RetryParams>,
    cancellation: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always emit structured mode when a structured writer is available.
    pub fn with_force_structured(mut self) -> Self {
        self.preferred = Some(Encoding::Structured);
        self
    }

    /// Always emit binary mode when a binary writer is available.
    pub fn with_force_binary(mut self) -> Self {
        self.preferred = Some(Encoding::Binary);
        self
    }

    /// Decode structured messages to an event even when they could be copied
    /// straight through.
    pub fn with_skip_direct_structured(mut self) -> Self {
        self.skip_direct_structured = true;
        self
    }

    pub fn with_skip_direct_binary(mut self) -> Self {
        self.skip_direct_binary = true;
        self
    }

    /// Keep the `key` extension as a header instead of the Kafka record key.
    pub fn with_skip_key(mut self) -> Self {
        self.skip_key = true;
        self
    }

    pub fn with_retry(mut self, params: RetryParams) -> Self {
        self.retry = Some(params);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn force_structured(&self) -> bool {
        self.preferred == Some(Encoding::Structured)
    }

    pub fn force_binary(&self) -> bool {
        self.preferred == Some(Encoding::Binary)
    }

    pub fn skip_direct_structured(&self) -> bool {
        self.skip_direct_structured
    }

    pub fn skip_direct_binary(&self) -> bool {
        self.skip_direct_binary
    }

    pub fn skip_key(&self) -> bool {
        self.skip_key
    }

    pub fn retry(&self) -> Option<&RetryParams> {
        self.retry.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_preference_is_exclusive() {
        let ctx = Context::new().with_force_structured().with_force_binary();
        assert!(ctx.force_binary());
        assert!(!ctx.force_structured());
    }

    #[test]
    fn cancellation_is_shared_with_clones() {
        let ctx = Context::new();
        let copy = ctx.clone();
        ctx.cancellation().cancel();
        assert!(copy.is_cancelled());
    }
}
