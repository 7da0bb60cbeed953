//! Single-assignment completion primitive
//!
//! A [`Completion`] holds either a value or a [`ClientError`] and is
//! completed exactly once. Every clone observes the same outcome. It can be
//! awaited from async code ([`Completion::wait`]), waited on from a plain
//! thread ([`Completion::wait_blocking`]), or observed through a callback
//! ([`Completion::on_complete`]).
//!
//! Completing twice is a bug in the caller and panics.

use crate::error::{ClientError, Result};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

type Callback<T> = Box<dyn FnOnce(&Result<T>) + Send>;

struct Slot<T> {
    outcome: Option<Result<T>>,
    callbacks: Vec<Callback<T>>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
    notify: Notify,
}

/// Single-assignment future with a value-or-error outcome.
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Completion<T> {
    /// Create a pending completion.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    outcome: None,
                    callbacks: Vec::new(),
                }),
                ready: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Create a completion whose outcome is already known.
    ///
    /// Indistinguishable from one completed later: callbacks registered on
    /// it fire, and waiters return immediately.
    pub fn ready(outcome: Result<T>) -> Self {
        let completion = Self::new();
        completion.complete(outcome);
        completion
    }

    /// Resolve the completion and run registered callbacks.
    ///
    /// Callbacks run on the calling thread after the internal lock is
    /// released, so they may freely inspect this completion.
    ///
    /// # Panics
    ///
    /// Panics if the completion was already resolved.
    pub fn complete(&self, outcome: Result<T>) {
        let callbacks = {
            let mut slot = self.lock();
            if slot.outcome.is_some() {
                drop(slot);
                panic!("completion resolved twice");
            }
            slot.outcome = Some(outcome.clone());
            std::mem::take(&mut slot.callbacks)
        };

        self.shared.ready.notify_all();
        self.shared.notify.notify_waiters();

        for callback in callbacks {
            callback(&outcome);
        }
    }

    /// Resolve with a value.
    pub fn succeed(&self, value: T) {
        self.complete(Ok(value));
    }

    /// Resolve with an error.
    pub fn fail(&self, error: ClientError) {
        self.complete(Err(error));
    }

    /// Register a callback fired once with the outcome.
    ///
    /// If the completion is already resolved the callback runs immediately
    /// on the registering thread.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Result<T>) + Send + 'static,
    {
        let outcome = {
            let mut slot = self.lock();
            match slot.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    slot.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(&outcome);
    }

    pub fn is_completed(&self) -> bool {
        self.lock().outcome.is_some()
    }

    /// Non-blocking peek at the outcome.
    pub fn try_result(&self) -> Option<Result<T>> {
        self.lock().outcome.clone()
    }

    /// Read the outcome, re-raising a stored error.
    ///
    /// Reading a pending completion is an `InvalidState` error.
    pub fn result(&self) -> Result<T> {
        self.try_result()
            .unwrap_or_else(|| Err(ClientError::invalid_state("completed", "pending")))
    }

    /// Wait for the outcome.
    pub async fn wait(&self) -> Result<T> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a completion racing this
            // check still wakes us.
            notified.as_mut().enable();

            if let Some(outcome) = self.try_result() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Block the current thread until resolved or `timeout` elapses.
    ///
    /// Returns `None` on timeout. Must not be called from a thread the
    /// pump needs to make progress.
    pub fn wait_blocking(&self, timeout: Duration) -> Option<Result<T>> {
        let slot = self.lock();
        let (slot, _) = self
            .shared
            .ready
            .wait_timeout_while(slot, timeout, |slot| slot.outcome.is_none())
            .unwrap_or_else(|e| e.into_inner());
        slot.outcome.clone()
    }

    /// Whether both handles refer to the same completion.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.shared.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.shared.slot.try_lock() {
            Ok(slot) => match &slot.outcome {
                None => "pending",
                Some(Ok(_)) => "completed",
                Some(Err(_)) => "failed",
            },
            Err(_) => "locked",
        };
        f.debug_struct("Completion").field("state", &state).finish()
    }
}
