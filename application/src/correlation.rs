//! Request/response correlation
//!
//! [`CorrelationTable`] maps outstanding [`CorrelationToken`]s to the
//! [`Completion`] waiting for their [`Response`]. Each registered token ends
//! in exactly one of: resolved with a value, resolved with an error, or
//! dropped unresolved.
//!
//! The map lives behind a single mutex held only for insert and remove;
//! completions are resolved after the guard is released so callbacks may
//! call back into the table.

use crate::completion::Completion;
use crate::error::ClientError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use voxlink_domain::{CorrelationToken, Response};

pub struct CorrelationTable {
    next: AtomicU64,
    pending: Mutex<HashMap<CorrelationToken, Completion<Response>>>,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Generate a fresh token. Tokens are never reused.
    pub fn next_token(&self) -> CorrelationToken {
        CorrelationToken::new(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a pending completion for `token`.
    pub fn register(&self, token: CorrelationToken) -> Completion<Response> {
        let completion = Completion::new();
        let replaced = self.lock().insert(token, completion.clone());
        if let Some(previous) = replaced {
            warn!("Correlation: token {} registered twice, canceling previous", token);
            previous.fail(ClientError::Canceled(format!("token {} reused", token)));
        }
        completion
    }

    /// Resolve the completion registered for the response's token.
    ///
    /// A nonzero status resolves it with [`ClientError::BackendStatus`].
    /// Unknown tokens (late, duplicate, or already timed out) are ignored.
    /// Returns whether a completion was resolved.
    pub fn resolve(&self, response: Response) -> bool {
        let Some(completion) = self.lock().remove(&response.token) else {
            debug!(
                "Correlation: no pending completion for response {}",
                response.token
            );
            return false;
        };

        if response.is_success() {
            completion.succeed(response);
        } else {
            completion.fail(ClientError::backend(
                response.status_code,
                Some(response.token),
                response.status_text,
            ));
        }
        true
    }

    /// Forget `token` without resolving its completion.
    ///
    /// Returns `false` when the token was already resolved or never
    /// registered; the caller then owns whatever outcome was stored.
    pub fn drop_if_present(&self, token: CorrelationToken) -> bool {
        self.lock().remove(&token).is_some()
    }

    /// Resolve `token` with an error, if still pending.
    pub fn fail(&self, token: CorrelationToken, error: ClientError) -> bool {
        let Some(completion) = self.lock().remove(&token) else {
            return false;
        };
        completion.fail(error);
        true
    }

    /// Resolve every pending completion with `error`.
    pub fn fail_all(&self, error: ClientError) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (token, completion) in drained {
            debug!("Correlation: failing pending request {}", token);
            completion.fail(error.clone());
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_pending(&self, token: CorrelationToken) -> bool {
        self.lock().contains_key(&token)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationToken, Completion<Response>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}
