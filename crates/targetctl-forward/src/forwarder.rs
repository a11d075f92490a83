//! Routing of capability calls to the backends that implement them
//!
//! The forwarder holds no per-call state: every call resolves its backend
//! from the [`TargetRegistry`] and hands the backend to the caller-supplied
//! operation. Fan-out variants dispatch one call per target and report the
//! results in the order the targets were given.

use std::sync::Arc;
use std::thread;

use targetctl_core::prelude::*;
use targetctl_core::{CommandFuture, FutureValue, TargetId};

use crate::registry::{Capability, TargetRegistry};

/// Outcome of one target's part in a fan-out call
#[derive(Debug, Clone)]
pub struct TargetResult<T> {
    pub target: TargetId,
    pub result: Result<T>,
}

impl<T> TargetResult<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T> {
        self.result
    }
}

/// Single entry point for capability calls
#[derive(Debug, Clone)]
pub struct CommandForwarder {
    registry: Arc<TargetRegistry>,
}

impl CommandForwarder {
    pub fn new(registry: Arc<TargetRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<TargetRegistry> {
        &self.registry
    }

    /// Resolve `C` on `target` and run `operation` against the backend
    ///
    /// Fails with [`Error::CapabilityNotSupported`] without calling
    /// `operation` when nothing is registered. Whatever the operation returns
    /// (a future or a direct result) is passed through untouched.
    pub fn invoke<C, R, F>(&self, target: &TargetId, operation: F) -> Result<R>
    where
        C: Capability,
        F: FnOnce(&C::Backend) -> R,
    {
        let backend = self.registry.resolve::<C>(target)?;
        trace!("Forwarding '{}' call to {}", C::NAME, target);
        Ok(operation(&backend))
    }

    /// [`invoke`](Self::invoke) for synchronous operations, folding routing
    /// errors into the operation's own error channel
    pub fn invoke_sync<C, T, F>(&self, target: &TargetId, operation: F) -> Result<T>
    where
        C: Capability,
        F: FnOnce(&C::Backend) -> Result<T>,
    {
        self.invoke::<C, _, _>(target, operation)?
    }

    /// [`invoke`](Self::invoke) for asynchronous operations; routing errors
    /// become an already-failed future
    pub fn invoke_future<C, T, F>(&self, target: &TargetId, operation: F) -> CommandFuture<T>
    where
        C: Capability,
        T: FutureValue,
        F: FnOnce(&C::Backend) -> CommandFuture<T>,
    {
        self.invoke::<C, _, _>(target, operation)
            .unwrap_or_else(CommandFuture::failed)
    }

    /// Send the same asynchronous call to every target
    ///
    /// Every target is called concurrently and all calls are dispatched before
    /// any result is awaited. The aggregate
    /// resolves once every target is done, with one [`TargetResult`] per
    /// target in input order; a failing target never hides another's success.
    pub fn invoke_all<C, T, F>(
        &self,
        targets: &[TargetId],
        operation: F,
    ) -> CommandFuture<Vec<TargetResult<T>>>
    where
        C: Capability,
        T: FutureValue,
        F: Fn(&C::Backend) -> CommandFuture<T> + Sync,
    {
        debug!("Fanning out '{}' call to {} targets", C::NAME, targets.len());

        let futures = self.dispatch_all::<C, T, F>(targets, &operation);
        let targets = targets.to_vec();

        CommandFuture::settle_all(futures).then(move |results| {
            targets
                .into_iter()
                .zip(results)
                .map(|(target, result)| TargetResult { target, result })
                .collect()
        })
    }

    /// Send the same asynchronous call to every target, failing fast
    ///
    /// Resolves with the values in input order, or with the first failure.
    /// Calls still running on other targets are not cancelled.
    pub fn invoke_all_fail_fast<C, T, F>(&self, targets: &[TargetId], operation: F) -> CommandFuture<Vec<T>>
    where
        C: Capability,
        T: FutureValue,
        F: Fn(&C::Backend) -> CommandFuture<T> + Sync,
    {
        let futures = self.dispatch_all::<C, T, F>(targets, &operation);
        CommandFuture::all(futures)
    }

    /// Start `operation` on every target at once and collect the futures in
    /// input order
    ///
    /// Backends may do real work before handing back their future, so each
    /// call runs on its own scoped thread.
    fn dispatch_all<C, T, F>(&self, targets: &[TargetId], operation: &F) -> Vec<CommandFuture<T>>
    where
        C: Capability,
        T: FutureValue,
        F: Fn(&C::Backend) -> CommandFuture<T> + Sync,
    {
        if targets.len() <= 1 {
            return targets
                .iter()
                .map(|target| self.invoke_future::<C, T, _>(target, operation))
                .collect();
        }

        thread::scope(|scope| {
            let handles: Vec<_> = targets
                .iter()
                .map(|target| scope.spawn(move || self.invoke_future::<C, T, _>(target, operation)))
                .collect();

            targets
                .iter()
                .zip(handles)
                .map(|(target, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        error!("'{}' call panicked on {}", C::NAME, target);
                        CommandFuture::failed(Error::backend(format!(
                            "{} call panicked on {}",
                            C::NAME, target
                        )))
                    })
                })
                .collect()
        })
    }

    /// Run the same synchronous call on every target concurrently
    ///
    /// Each target runs on its own scoped thread; results come back in input
    /// order once every call has returned.
    pub fn invoke_all_sync<C, T, F>(&self, targets: &[TargetId], operation: F) -> Vec<TargetResult<T>>
    where
        C: Capability,
        T: Send,
        F: Fn(&C::Backend) -> Result<T> + Sync,
    {
        debug!("Fanning out sync '{}' call to {} targets", C::NAME, targets.len());

        let operation = &operation;
        thread::scope(|scope| {
            let handles: Vec<_> = targets
                .iter()
                .map(|target| scope.spawn(move || self.invoke_sync::<C, T, _>(target, operation)))
                .collect();

            targets
                .iter()
                .zip(handles)
                .map(|(target, handle)| TargetResult {
                    target: target.clone(),
                    result: handle.join().unwrap_or_else(|_| {
                        error!("'{}' call panicked on {}", C::NAME, target);
                        Err(Error::backend(format!("{} call panicked on {}", C::NAME, target)))
                    }),
                })
                .collect()
        })
    }
}
