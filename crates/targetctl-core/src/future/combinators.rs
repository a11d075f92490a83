//! Combinators over [`CommandFuture`]
//!
//! Failure and cancellation flow through every combinator untouched; only
//! successful values are transformed.

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use super::{CommandFuture, FutureValue, Outcome, WeakFuture};
use crate::prelude::*;

/// Per-input slots for aggregate futures, filled in completion order
struct Slots<V> {
    values: Vec<Option<V>>,
    remaining: usize,
}

impl<V> Slots<V> {
    fn new(len: usize) -> Self {
        Self {
            values: (0..len).map(|_| None).collect(),
            remaining: len,
        }
    }

    /// Store `value` at `index`; returns every value in input order once the
    /// last slot is filled
    fn fill(&mut self, index: usize, value: V) -> Option<Vec<V>> {
        if self.values[index].replace(value).is_none() {
            self.remaining -= 1;
        }
        if self.remaining == 0 {
            Some(mem::take(&mut self.values).into_iter().flatten().collect())
        } else {
            None
        }
    }
}

fn fill_slot<V>(slots: &Mutex<Slots<V>>, index: usize, value: V) -> Option<Vec<V>> {
    slots
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .fill(index, value)
}

impl<T: FutureValue> CommandFuture<T> {
    /// New future resolving with `transform(value)` once this one succeeds
    ///
    /// Cancelling the derived future also cancels this one.
    pub fn then<U, F>(&self, transform: F) -> CommandFuture<U>
    where
        U: FutureValue,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (derived, resolver) = CommandFuture::pending(format!("{} (then)", self.description()));

        let source = self.downgrade();
        resolver.on_cancel(move || {
            if let Some(source) = source.upgrade() {
                source.cancel();
            }
        });

        self.on_completion(move |outcome| {
            match outcome {
                Outcome::Succeeded(value) => resolver.resolve(transform(value.clone())),
                Outcome::Failed(err) => resolver.fail(err.clone()),
                Outcome::Cancelled => resolver.cancel(),
            };
        });

        derived
    }

    /// Chain a follow-up command that starts once this one succeeds
    ///
    /// Cancelling the derived future cancels whichever stage is running.
    pub fn and_then<U, F>(&self, next: F) -> CommandFuture<U>
    where
        U: FutureValue,
        F: FnOnce(T) -> CommandFuture<U> + Send + 'static,
    {
        let (derived, resolver) =
            CommandFuture::pending(format!("{} (and_then)", self.description()));
        let stage: Arc<Mutex<Option<WeakFuture<U>>>> = Arc::new(Mutex::new(None));

        let source = self.downgrade();
        let running = Arc::clone(&stage);
        resolver.on_cancel(move || {
            if let Some(source) = source.upgrade() {
                source.cancel();
            }
            let running = running
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(stage) = running.and_then(|weak| weak.upgrade()) {
                stage.cancel();
            }
        });

        self.on_completion(move |outcome| match outcome {
            Outcome::Succeeded(value) => {
                let follow_up = next(value.clone());
                *stage.lock().unwrap_or_else(PoisonError::into_inner) = Some(follow_up.downgrade());
                if resolver.is_cancelled() {
                    follow_up.cancel();
                }
                follow_up.on_completion(move |outcome| {
                    resolver.complete(outcome.clone());
                });
            }
            Outcome::Failed(err) => {
                resolver.fail(err.clone());
            }
            Outcome::Cancelled => {
                resolver.cancel();
            }
        });

        derived
    }

    /// Resolve with every value, in input order, once all inputs succeed
    ///
    /// The first failure or cancellation completes the aggregate immediately.
    /// Remaining inputs keep running; cancel them explicitly if needed.
    pub fn all<I>(futures: I) -> CommandFuture<Vec<T>>
    where
        I: IntoIterator<Item = CommandFuture<T>>,
    {
        let futures: Vec<CommandFuture<T>> = futures.into_iter().collect();
        if futures.is_empty() {
            return CommandFuture::resolved(Vec::new());
        }

        let (aggregate, resolver) = CommandFuture::pending(format!("all of {}", futures.len()));
        let slots = Arc::new(Mutex::new(Slots::new(futures.len())));

        for (index, future) in futures.iter().enumerate() {
            let slots = Arc::clone(&slots);
            let resolver = resolver.clone();
            future.on_completion(move |outcome| match outcome {
                Outcome::Succeeded(value) => {
                    if let Some(values) = fill_slot(&slots, index, value.clone()) {
                        resolver.resolve(values);
                    }
                }
                Outcome::Failed(err) => {
                    debug!("Input {} failed, failing aggregate: {}", index, err);
                    resolver.fail(err.clone());
                }
                Outcome::Cancelled => {
                    resolver.cancel();
                }
            });
        }

        aggregate
    }

    /// Resolve once every input is terminal, with each input's result in order
    ///
    /// Never fails: failures and cancellations are reported per input.
    pub fn settle_all<I>(futures: I) -> CommandFuture<Vec<Result<T>>>
    where
        I: IntoIterator<Item = CommandFuture<T>>,
    {
        let futures: Vec<CommandFuture<T>> = futures.into_iter().collect();
        if futures.is_empty() {
            return CommandFuture::resolved(Vec::new());
        }

        let (aggregate, resolver) =
            CommandFuture::pending(format!("settle {} futures", futures.len()));
        let slots = Arc::new(Mutex::new(Slots::new(futures.len())));

        for (index, future) in futures.iter().enumerate() {
            let slots = Arc::clone(&slots);
            let resolver = resolver.clone();
            future.on_completion(move |outcome| {
                let result = outcome.clone().into_result();
                if let Some(results) = fill_slot(&slots, index, result) {
                    resolver.resolve(results);
                }
            });
        }

        aggregate
    }
}
