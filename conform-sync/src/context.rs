//! Per-pass context: the tracing span every phase nests under, and the
//! cancellation signal every suspension point observes.

use tokio_util::sync::CancellationToken;
use tracing::Span;

use conform_core::ConformError;

/// Handed explicitly to every step of a pass; nothing here is global.
#[derive(Debug, Clone)]
pub struct ConformContext {
    span: Span,
    cancel: CancellationToken,
}

impl ConformContext {
    pub fn new(span: Span, cancel: CancellationToken) -> Self {
        Self { span, cancel }
    }

    /// A context with its own root span and a token nobody else holds.
    pub fn detached() -> Self {
        Self::new(tracing::info_span!("conform"), CancellationToken::new())
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Child span for one phase of the pass.
    pub fn phase(&self, name: &'static str) -> Span {
        tracing::info_span!(parent: &self.span, "phase", phase = name)
    }

    /// Called before every backend or filesystem call. Calls already in
    /// flight are never interrupted; the pass unwinds at the next checkpoint.
    pub fn checkpoint(&self) -> Result<(), ConformError> {
        if self.cancel.is_cancelled() {
            return Err(ConformError::Cancelled);
        }
        Ok(())
    }
}
