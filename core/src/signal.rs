//! Per-request cancellation: a deadline composed with an optional caller token.
//!
//! # Design
//! The timer is a `tokio::time::Sleep` owned by the signal, so it lives
//! exactly as long as the request that created it. There is no spawned task
//! to forget about: when the executor returns, by whatever path, the signal
//! is dropped and the timer goes with it.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;

/// Which source aborted the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    Timeout,
    Caller,
}

/// A single signal that fires when either the deadline passes or the
/// caller's token is cancelled, whichever happens first.
#[derive(Debug)]
pub struct RequestSignal {
    token: CancellationToken,
    deadline: Pin<Box<Sleep>>,
    cause: Option<CancelCause>,
}

impl RequestSignal {
    /// Composes a deadline `timeout` from now with `external`.
    ///
    /// The composed token is a child of `external`, so cancelling the caller's
    /// token cancels it, while firing the deadline never touches the caller's.
    pub fn derive(timeout: Duration, external: Option<&CancellationToken>) -> Self {
        let token = external
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        Self {
            token,
            deadline: Box::pin(tokio::time::sleep(timeout)),
            cause: None,
        }
    }

    /// The composed token. Cancelled once `fired` has observed either cause.
    #[cfg(test)]
    fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[cfg(test)]
    fn cause(&self) -> Option<CancelCause> {
        self.cause
    }

    /// Resolves with the first cause to fire. Later calls return the same cause.
    pub async fn fired(&mut self) -> CancelCause {
        if let Some(cause) = self.cause {
            return cause;
        }
        let cause = tokio::select! {
            biased;
            _ = self.token.cancelled() => CancelCause::Caller,
            _ = self.deadline.as_mut() => CancelCause::Timeout,
        };
        if cause == CancelCause::Timeout {
            self.token.cancel();
        }
        self.cause = Some(cause);
        cause
    }
}
