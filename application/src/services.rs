//! Collaborators shared by every session of one runtime.

use crate::completion::Completion;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::ports::token_provider::{TokenProvider, TokenRequest};
use crate::pump::MessagePump;
use std::sync::Arc;
use tracing::{debug, warn};
use voxlink_domain::{Request, Response};

pub(crate) struct Services {
    pub(crate) pump: Arc<MessagePump>,
    pub(crate) tokens: Arc<dyn TokenProvider>,
    pub(crate) config: ClientConfig,
}

impl Services {
    /// Issue `request` and wait for its response, bounded by
    /// `request_timeout`.
    pub(crate) async fn call(&self, request: Request, operation: &'static str) -> Result<Response> {
        let (token, completion) = self.pump.issue(request)?;
        let deadline = self.config.request_timeout;

        match tokio::time::timeout(deadline, completion.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                if self.pump.correlation().drop_if_present(token) {
                    warn!("{} {} timed out after {:?}", operation, token, deadline);
                    Err(ClientError::timeout(operation, deadline))
                } else {
                    // Resolved while the deadline fired
                    completion
                        .try_result()
                        .unwrap_or_else(|| Err(ClientError::timeout(operation, deadline)))
                }
            }
        }
    }

    /// Issue `request` without waiting; a failed response is logged.
    pub(crate) fn fire_and_log(&self, request: Request, operation: &'static str) -> Result<()> {
        let (token, completion) = self.pump.issue(request)?;
        completion.on_complete(move |outcome| match outcome {
            Ok(_) => debug!("{} {} acknowledged", operation, token),
            Err(e) => warn!("{} {} failed: {}", operation, token, e),
        });
        Ok(())
    }

    /// Best-effort cleanup request. Failures are logged and swallowed.
    pub(crate) fn compensate(&self, request: Request) {
        let kind = request.kind();
        if let Err(e) = self.pump.issue_untracked(request) {
            debug!("Cleanup {} not sent: {}", kind, e);
        }
    }

    /// Use `supplied` or ask the token provider.
    pub(crate) async fn access_token(
        &self,
        supplied: Option<String>,
        request: TokenRequest,
    ) -> Result<String> {
        match supplied {
            Some(token) => Ok(token),
            None => self.tokens.token(&request).await,
        }
    }
}

/// Work collected under a session lock and run after it is released:
/// completions, broadcasts and outbound requests.
#[derive(Default)]
pub(crate) struct Deferred {
    actions: Vec<Box<dyn FnOnce() + Send>>,
}

impl Deferred {
    pub(crate) fn push<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.actions.push(Box::new(action));
    }

    pub(crate) fn succeed<T: Clone + Send + 'static>(&mut self, completion: Option<Completion<T>>, value: T) {
        if let Some(completion) = completion {
            self.push(move || completion.succeed(value));
        }
    }

    pub(crate) fn fail<T: Clone + Send + 'static>(
        &mut self,
        completion: Option<Completion<T>>,
        error: ClientError,
    ) {
        if let Some(completion) = completion {
            self.push(move || completion.fail(error));
        }
    }

    pub(crate) fn run(self) {
        for action in self.actions {
            action();
        }
    }
}
