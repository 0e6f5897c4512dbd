//! Settling a started body invocation under its timeout.
//!
//! The timeout is a race against the *wait*, not the work: when the timer
//! fires first the pending future or completion receiver is dropped, any
//! later settlement is discarded, and the caller moves on immediately. A
//! synchronous body has no suspension point, so it cannot be interrupted by
//! this mechanism at all; that is a documented limitation of cooperative
//! cancellation, not something the engine masks.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::timeout;

use gauntlet_core::{DoneMisuse, Failure, Invocation};

/// How a single invocation failed, before attribution to a test or hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InvokeError {
    Failed(Failure),
    Timeout(Duration),
    Misuse(DoneMisuse),
}

/// Result of settling one invocation.
pub(crate) struct Settled {
    pub(crate) result: Result<(), InvokeError>,
    /// Invocations of the completion callback beyond the first one that were
    /// observed by the time the wait ended.
    pub(crate) extra_done_calls: u32,
}

impl Settled {
    fn done(result: Result<(), InvokeError>) -> Self {
        Self {
            result,
            extra_done_calls: 0,
        }
    }
}

/// Await whatever remains of `invocation`, bounded by `limit`.
pub(crate) async fn settle(invocation: Invocation, limit: Duration) -> Settled {
    match invocation {
        Invocation::Ready(result) => Settled::done(result.map_err(InvokeError::Failed)),

        Invocation::Pending(fut) => {
            let guarded = AssertUnwindSafe(fut).catch_unwind();
            let result = match timeout(limit, guarded).await {
                Ok(Ok(body_result)) => body_result.map_err(InvokeError::Failed),
                Ok(Err(payload)) => Err(InvokeError::Failed(Failure::from_panic(payload))),
                Err(_) => {
                    tracing::debug!(limit_ms = limit.as_millis() as u64, "body future timed out");
                    Err(InvokeError::Timeout(limit))
                }
            };
            Settled::done(result)
        }

        Invocation::Waiting(mut wait) => {
            let result = match timeout(limit, wait.recv()).await {
                Ok(body_result) => body_result.map_err(InvokeError::Failed),
                Err(_) => {
                    tracing::debug!(
                        limit_ms = limit.as_millis() as u64,
                        "completion callback timed out"
                    );
                    Err(InvokeError::Timeout(limit))
                }
            };
            Settled {
                result,
                extra_done_calls: wait.extra_calls(),
            }
        }

        Invocation::Both(fut, mut wait) => {
            if wait.fired() {
                // The callback already ran inside the synchronous part of
                // the body; the returned future makes this a misuse.
                return Settled::done(Err(InvokeError::Misuse(DoneMisuse::CombinedWithFuture)));
            }
            let mut guarded = Box::pin(AssertUnwindSafe(fut).catch_unwind());
            let race = async {
                tokio::select! {
                    _ = wait.recv() => Err(InvokeError::Misuse(DoneMisuse::CombinedWithFuture)),
                    settled = &mut guarded => match settled {
                        Ok(body_result) => body_result.map_err(InvokeError::Failed),
                        Err(payload) => Err(InvokeError::Failed(Failure::from_panic(payload))),
                    },
                }
            };
            let mut result = match timeout(limit, race).await {
                Ok(r) => r,
                Err(_) => Err(InvokeError::Timeout(limit)),
            };
            // The future may have settled in the same poll the callback
            // fired; both completing is still a misuse.
            if result.is_ok() && wait.fired() {
                result = Err(InvokeError::Misuse(DoneMisuse::CombinedWithFuture));
            }
            Settled::done(result)
        }
    }
}
