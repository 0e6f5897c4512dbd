//! Body descriptors for tests and hooks.
//!
//! A body is declared in exactly one of three shapes, decided once at
//! registration and never re-inspected per invocation:
//!
//! - [`Body::sync`] — runs to completion or panics/returns an error.
//! - [`Body::async_fn`] — produces a future that is awaited to settlement.
//! - [`Body::callback`] — receives a [`Done`] handle and signals completion
//!   through it; the engine waits for the signal (or a timeout).
//!
//! Bodies are `FnMut` because the same declaration may run once per
//! repetition of the whole pass.

use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures::future::LocalBoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::Failure;

/// Outcome of one body invocation.
pub type BodyResult = Result<(), Failure>;

/// A boxed, single-threaded body future.
pub type BodyFuture = LocalBoxFuture<'static, BodyResult>;

/// Conversion from the value a body closure returns into a [`BodyResult`].
///
/// Lets bodies be written as plain `|| { assert!(..) }` closures as well as
/// `|| -> Result<(), Failure>` ones.
pub trait IntoBodyResult {
    fn into_body_result(self) -> BodyResult;
}

impl IntoBodyResult for () {
    fn into_body_result(self) -> BodyResult {
        Ok(())
    }
}

impl<E: Into<Failure>> IntoBodyResult for Result<(), E> {
    fn into_body_result(self) -> BodyResult {
        self.map_err(Into::into)
    }
}

/// What a callback-shaped body returned in addition to taking a [`Done`].
pub enum CallbackReturn {
    /// Nothing: completion comes exclusively through the `Done` handle.
    Unit,
    /// A future. Combining this with invoking the `Done` handle is a
    /// reportable misuse.
    Future(BodyFuture),
}

/// The shape a body was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    Sync,
    Async,
    Callback,
}

/// A test or hook body, tagged with its shape at registration time.
pub enum Body {
    Sync(Box<dyn FnMut() -> BodyResult>),
    Async(Box<dyn FnMut() -> BodyFuture>),
    Callback(Box<dyn FnMut(Done) -> CallbackReturn>),
}

impl Body {
    /// A synchronous body.
    pub fn sync<R, F>(mut f: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoBodyResult,
    {
        Self::Sync(Box::new(move || f().into_body_result()))
    }

    /// An asynchronous body: `f` is called once per invocation to produce a
    /// fresh future.
    pub fn async_fn<R, Fut, F>(mut f: F) -> Self
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: IntoBodyResult,
    {
        Self::Async(Box::new(move || {
            let fut = f();
            Box::pin(async move { fut.await.into_body_result() })
        }))
    }

    /// A callback-shaped body: completion is signalled through the [`Done`]
    /// handle, which may be cloned and moved anywhere (including other
    /// threads).
    pub fn callback<F>(mut f: F) -> Self
    where
        F: FnMut(Done) + 'static,
    {
        Self::Callback(Box::new(move |done| {
            f(done);
            CallbackReturn::Unit
        }))
    }

    /// A callback-shaped body that also returns a future. Declared for
    /// completeness: invoking the `Done` handle from such a body is a
    /// reportable misuse.
    pub fn callback_with_future<R, Fut, F>(mut f: F) -> Self
    where
        F: FnMut(Done) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: IntoBodyResult,
    {
        Self::Callback(Box::new(move |done| {
            let fut = f(done);
            CallbackReturn::Future(Box::pin(async move { fut.await.into_body_result() }))
        }))
    }

    /// The shape this body was registered with.
    pub fn shape(&self) -> BodyShape {
        match self {
            Self::Sync(_) => BodyShape::Sync,
            Self::Async(_) => BodyShape::Async,
            Self::Callback(_) => BodyShape::Callback,
        }
    }

    /// Start one invocation of this body.
    ///
    /// The synchronous part of the body runs here, with panics caught and
    /// converted to failures. Whatever remains to be awaited is returned as
    /// an [`Invocation`] for the executor to settle under its timeout.
    pub fn begin(&mut self) -> Invocation {
        match self {
            Self::Sync(f) => {
                let result = catch_unwind(AssertUnwindSafe(|| f()))
                    .unwrap_or_else(|payload| Err(Failure::from_panic(payload)));
                Invocation::Ready(result)
            }
            Self::Async(f) => match catch_unwind(AssertUnwindSafe(|| f())) {
                Ok(fut) => Invocation::Pending(fut),
                Err(payload) => Invocation::Ready(Err(Failure::from_panic(payload))),
            },
            Self::Callback(f) => {
                let (done, wait) = Done::channel();
                match catch_unwind(AssertUnwindSafe(|| f(done))) {
                    Ok(CallbackReturn::Unit) => Invocation::Waiting(wait),
                    Ok(CallbackReturn::Future(fut)) => Invocation::Both(fut, wait),
                    Err(payload) => Invocation::Ready(Err(Failure::from_panic(payload))),
                }
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Body").field(&self.shape()).finish()
    }
}

/// A started body invocation, ready to be settled by the executor.
pub enum Invocation {
    /// The body already ran synchronously.
    Ready(BodyResult),
    /// An async body's future, not yet polled.
    Pending(BodyFuture),
    /// A callback body waiting on its completion signal.
    Waiting(DoneWait),
    /// A callback body that also returned a future.
    Both(BodyFuture, DoneWait),
}

struct DoneInner {
    tx: Option<oneshot::Sender<BodyResult>>,
    calls: u32,
}

/// Completion handle passed to callback-shaped bodies.
///
/// The first invocation of [`Done::ok`] or [`Done::err`] determines the
/// outcome; further invocations are counted and reported as misuse.
#[derive(Clone)]
pub struct Done {
    inner: Arc<Mutex<DoneInner>>,
}

impl Done {
    /// Create a linked handle/wait pair.
    pub fn channel() -> (Done, DoneWait) {
        let (tx, rx) = oneshot::channel();
        let inner = Arc::new(Mutex::new(DoneInner {
            tx: Some(tx),
            calls: 0,
        }));
        let done = Done {
            inner: Arc::clone(&inner),
        };
        (done, DoneWait { rx, inner })
    }

    /// Signal successful completion.
    pub fn ok(&self) {
        self.finish(Ok(()));
    }

    /// Signal completion with a failure value.
    pub fn err(&self, failure: impl Into<Failure>) {
        self.finish(Err(failure.into()));
    }

    fn finish(&self, result: BodyResult) {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        if let Some(tx) = inner.tx.take() {
            // The wait side may already have been abandoned by a timeout;
            // late completions are discarded.
            let _ = tx.send(result);
        }
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("calls", &self.inner.lock().calls)
            .finish()
    }
}

/// Receiving side of a [`Done`] pair, held by the executor.
pub struct DoneWait {
    rx: oneshot::Receiver<BodyResult>,
    inner: Arc<Mutex<DoneInner>>,
}

impl DoneWait {
    /// Wait for the first completion signal.
    pub async fn recv(&mut self) -> BodyResult {
        match (&mut self.rx).await {
            Ok(result) => result,
            // Unreachable in practice: the sender lives inside the shared
            // state this side also holds.
            Err(_) => Err(Failure::new("completion signal dropped")),
        }
    }

    /// Whether the handle has been invoked at least once.
    pub fn fired(&self) -> bool {
        self.inner.lock().calls > 0
    }

    /// Invocations beyond the first.
    pub fn extra_calls(&self) -> u32 {
        self.inner.lock().calls.saturating_sub(1)
    }
}
