//! Single-resolution command results
//!
//! A [`CommandFuture`] is the consumer side of one asynchronous unit of work.
//! The producer completes it through a [`Resolver`]; the first completion wins
//! and every later attempt is a silent no-op. Consumers observe the result by:
//! - blocking with [`CommandFuture::wait_timeout`]
//! - awaiting it (`future.await` or [`CommandFuture::result`])
//! - polling with [`CommandFuture::state`] / [`CommandFuture::peek`]
//! - registering callbacks with [`CommandFuture::on_completion`]
//!
//! Cancellation is cooperative: [`CommandFuture::cancel`] moves a pending
//! future to [`Outcome::Cancelled`] and raises the [`CancellationSignal`] that
//! the producing work can observe.

mod cancel;
mod combinators;

use std::fmt;
use std::future::IntoFuture;
use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::watch;

use crate::prelude::*;

pub use cancel::CancellationSignal;

/// Bounds shared by every value carried through a [`CommandFuture`]
pub trait FutureValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> FutureValue for T {}

type Callback<T> = Box<dyn FnOnce(&Outcome<T>) + Send + 'static>;
type CancelHandler = Box<dyn FnOnce() + Send + 'static>;

/// Terminal state of a future
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Succeeded(T),
    Failed(Error),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Succeeded(value),
            Err(err) => Outcome::Failed(err),
        }
    }

    /// Convert into a `Result`, mapping cancellation to [`Error::Cancelled`]
    pub fn into_result(self) -> Result<T> {
        match self {
            Outcome::Succeeded(value) => Ok(value),
            Outcome::Failed(err) => Err(err),
            Outcome::Cancelled => Err(Error::Cancelled),
        }
    }

    pub fn state(&self) -> FutureState {
        match self {
            Outcome::Succeeded(_) => FutureState::Succeeded,
            Outcome::Failed(_) => FutureState::Failed,
            Outcome::Cancelled => FutureState::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }
}

/// Observable state of a future, without its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl FutureState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FutureState::Pending)
    }
}

impl fmt::Display for FutureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FutureState::Pending => write!(f, "pending"),
            FutureState::Succeeded => write!(f, "succeeded"),
            FutureState::Failed => write!(f, "failed"),
            FutureState::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Shared State
// ─────────────────────────────────────────────────────────────────

struct Inner<T> {
    outcome: Option<Arc<Outcome<T>>>,
    /// Continuations queued before resolution, in registration order
    callbacks: Vec<Callback<T>>,
    cancel_handlers: Vec<CancelHandler>,
    /// Outcome is set but queued callbacks are still running
    dispatching: bool,
}

impl<T> Inner<T> {
    /// Terminal with every queued callback delivered
    fn settled(&self) -> bool {
        self.outcome.is_some() && !self.dispatching
    }
}

struct Shared<T> {
    description: String,
    inner: Mutex<Inner<T>>,
    /// Wakes blocking waiters
    resolved: Condvar,
    /// Wakes async waiters
    completed: watch::Sender<bool>,
    /// Raised only on cancellation
    cancel: watch::Sender<bool>,
}

impl<T> Shared<T> {
    fn new(description: String) -> Self {
        let (completed, _) = watch::channel(false);
        let (cancel, _) = watch::channel(false);
        Self {
            description,
            inner: Mutex::new(Inner {
                outcome: None,
                callbacks: Vec::new(),
                cancel_handlers: Vec::new(),
                dispatching: false,
            }),
            resolved: Condvar::new(),
            completed,
            cancel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> FutureState {
        self.lock()
            .outcome
            .as_ref()
            .map_or(FutureState::Pending, |outcome| outcome.state())
    }

    /// Move Pending to a terminal state. Returns false if already terminal.
    ///
    /// Callbacks and cancel handlers run after the lock is released. Callbacks
    /// registered while the queue drains are appended to it, and waiters are
    /// only woken once the queue is empty.
    fn complete(&self, outcome: Outcome<T>) -> bool {
        let (outcome, cancel_handlers) = {
            let mut inner = self.lock();
            if inner.outcome.is_some() {
                trace!("Ignoring late completion of '{}'", self.description);
                return false;
            }
            let outcome = Arc::new(outcome);
            inner.outcome = Some(Arc::clone(&outcome));
            inner.dispatching = true;
            (outcome, mem::take(&mut inner.cancel_handlers))
        };

        debug!("Future '{}' {}", self.description, outcome.state());

        if matches!(*outcome, Outcome::Cancelled) {
            self.cancel.send_replace(true);
            for handler in cancel_handlers {
                handler();
            }
        }

        loop {
            let callbacks = {
                let mut inner = self.lock();
                if inner.callbacks.is_empty() {
                    inner.dispatching = false;
                    break;
                }
                mem::take(&mut inner.callbacks)
            };
            for callback in callbacks {
                callback(&outcome);
            }
        }

        self.resolved.notify_all();
        self.completed.send_replace(true);

        true
    }
}

// ─────────────────────────────────────────────────────────────────
// Consumer Handle
// ─────────────────────────────────────────────────────────────────

/// The eventual result of one command
///
/// Cloning is cheap; every clone observes the same state.
pub struct CommandFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for CommandFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for CommandFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFuture")
            .field("description", &self.shared.description)
            .field("state", &self.shared.state())
            .finish()
    }
}

impl<T: FutureValue> CommandFuture<T> {
    /// Create a pending future and the resolver that completes it
    pub fn pending(description: impl Into<String>) -> (Self, Resolver<T>) {
        let shared = Arc::new(Shared::new(description.into()));
        let resolver = Resolver {
            handle: Arc::new(ResolverHandle {
                shared: Arc::clone(&shared),
            }),
        };
        (Self { shared }, resolver)
    }

    /// Create an already-succeeded future
    pub fn resolved(value: T) -> Self {
        Self::from_outcome("resolved", Outcome::Succeeded(value))
    }

    /// Create an already-failed future
    pub fn failed(err: Error) -> Self {
        Self::from_outcome("failed", Outcome::Failed(err))
    }

    pub fn from_result(result: Result<T>) -> Self {
        Self::from_outcome("completed", Outcome::from_result(result))
    }

    fn from_outcome(description: &str, outcome: Outcome<T>) -> Self {
        let shared = Arc::new(Shared::new(description.to_string()));
        shared.complete(outcome);
        Self { shared }
    }

    /// Run `work` on the tokio runtime and resolve with its result
    ///
    /// The work receives the future's [`CancellationSignal`]. Must be called
    /// from within a tokio runtime.
    pub fn spawn<F, Fut>(description: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(CancellationSignal) -> Fut,
        Fut: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        let (future, resolver) = Self::pending(description);
        let task = work(resolver.signal());
        tokio::spawn(async move {
            resolver.complete(Outcome::from_result(task.await));
        });
        future
    }

    pub fn description(&self) -> &str {
        &self.shared.description
    }

    pub fn state(&self) -> FutureState {
        self.shared.state()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Snapshot of the terminal outcome, or `None` while pending
    pub fn peek(&self) -> Option<Outcome<T>> {
        self.shared
            .lock()
            .outcome
            .as_ref()
            .map(|outcome| Outcome::clone(outcome))
    }

    /// Request cancellation
    ///
    /// Returns true if this call moved the future to `Cancelled`. A terminal
    /// future is left untouched.
    pub fn cancel(&self) -> bool {
        self.shared.complete(Outcome::Cancelled)
    }

    /// Register a continuation that fires exactly once with the terminal outcome
    ///
    /// If the future is already terminal the callback runs immediately on the
    /// calling thread; otherwise it is queued behind earlier registrations.
    /// While earlier callbacks are still being delivered, it is queued too and
    /// runs on the completing thread after them.
    pub fn on_completion<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let outcome = {
            let mut inner = self.shared.lock();
            match inner.outcome.clone() {
                Some(outcome) if !inner.dispatching => outcome,
                _ => {
                    inner.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(&outcome);
    }

    /// Like [`on_completion`](Self::on_completion), but the callback runs as a
    /// task on the given runtime
    pub fn on_completion_in<F>(&self, runtime: &tokio::runtime::Handle, callback: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let runtime = runtime.clone();
        self.on_completion(move |outcome| {
            let outcome = outcome.clone();
            runtime.spawn(async move { callback(&outcome) });
        });
    }

    /// Block the current thread until terminal or until `timeout` elapses
    ///
    /// A timeout returns [`Error::Timeout`] and leaves the future pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T> {
        let inner = self.shared.lock();
        let (inner, _) = self
            .shared
            .resolved
            .wait_timeout_while(inner, timeout, |inner| !inner.settled())
            .unwrap_or_else(PoisonError::into_inner);

        match &inner.outcome {
            Some(outcome) if !inner.dispatching => Outcome::clone(outcome).into_result(),
            _ => {
                debug!("Wait on '{}' timed out after {:?}", self.shared.description, timeout);
                Err(Error::timeout(timeout))
            }
        }
    }

    /// Wait asynchronously for the terminal outcome
    pub async fn result(&self) -> Result<T> {
        let mut completed = self.shared.completed.subscribe();
        if completed.wait_for(|done| *done).await.is_err() {
            return Err(Error::ChannelClosed);
        }
        self.peek()
            .map(Outcome::into_result)
            .unwrap_or(Err(Error::ChannelClosed))
    }

    /// Wait asynchronously, giving up after `timeout` without touching the future
    pub async fn result_timeout(&self, timeout: Duration) -> Result<T> {
        tokio::time::timeout(timeout, self.result())
            .await
            .map_err(|_| Error::timeout(timeout))?
    }

    fn downgrade(&self) -> WeakFuture<T> {
        WeakFuture {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<T: FutureValue> IntoFuture for CommandFuture<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.result().await }.boxed()
    }
}

/// Non-owning reference used by derived futures to reach their source
struct WeakFuture<T> {
    shared: Weak<Shared<T>>,
}

impl<T> WeakFuture<T> {
    fn upgrade(&self) -> Option<CommandFuture<T>> {
        self.shared.upgrade().map(|shared| CommandFuture { shared })
    }
}

// ─────────────────────────────────────────────────────────────────
// Producer Handle
// ─────────────────────────────────────────────────────────────────

struct ResolverHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Drop for ResolverHandle<T> {
    fn drop(&mut self) {
        if self.shared.complete(Outcome::Failed(Error::ChannelClosed)) {
            warn!(
                "Resolver for '{}' dropped before completion",
                self.shared.description
            );
        }
    }
}

/// Producer side of a [`CommandFuture`]
///
/// Clones share one producer; when the last clone is dropped while the future
/// is still pending, the future fails with [`Error::ChannelClosed`].
pub struct Resolver<T> {
    handle: Arc<ResolverHandle<T>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("description", &self.handle.shared.description)
            .field("state", &self.handle.shared.state())
            .finish()
    }
}

impl<T: FutureValue> Resolver<T> {
    fn shared(&self) -> &Shared<T> {
        &self.handle.shared
    }

    /// Succeed with `value`. Returns false if the future was already terminal.
    pub fn resolve(&self, value: T) -> bool {
        self.shared().complete(Outcome::Succeeded(value))
    }

    /// Fail with `err`. Returns false if the future was already terminal.
    pub fn fail(&self, err: Error) -> bool {
        self.shared().complete(Outcome::Failed(err))
    }

    pub fn complete(&self, outcome: Outcome<T>) -> bool {
        self.shared().complete(outcome)
    }

    pub fn complete_with(&self, result: Result<T>) -> bool {
        self.shared().complete(Outcome::from_result(result))
    }

    pub fn cancel(&self) -> bool {
        self.shared().complete(Outcome::Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared().state() == FutureState::Cancelled
    }

    /// Signal the producing work should watch for cancellation
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal::new(self.shared().cancel.subscribe())
    }

    /// Run `handler` if and when the future is cancelled
    ///
    /// Runs immediately if already cancelled; discarded if the future
    /// completes any other way.
    pub fn on_cancel<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let run_now = {
            let mut inner = self.shared().lock();
            match inner.outcome.as_ref().map(|outcome| outcome.state()) {
                Some(state) => state == FutureState::Cancelled,
                None => {
                    inner.cancel_handlers.push(Box::new(handler));
                    return;
                }
            }
        };
        if run_now {
            handler();
        }
    }

    /// Consumer handle for the future this resolver completes
    pub fn future(&self) -> CommandFuture<T> {
        CommandFuture {
            shared: Arc::clone(&self.handle.shared),
        }
    }
}
