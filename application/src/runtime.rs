//! Client runtime: the explicit context owning the pump, the correlation
//! table and every login session.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::login::LoginSession;
use crate::ports::protocol_logger::{NoProtocolLogger, ProtocolLogger};
use crate::ports::token_provider::{NoTokenProvider, TokenProvider};
use crate::ports::transport::Transport;
use crate::pump::MessagePump;
use crate::services::Services;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voxlink_domain::{AccountId, LoginState};

/// Login sessions of one runtime, keyed by account.
///
/// A session is created on first use and registers itself when it starts
/// logging in; it leaves the registry when it returns to `LoggedOut`.
#[derive(Default)]
pub(crate) struct LoginRegistry {
    sessions: Mutex<HashMap<AccountId, Arc<LoginSession>>>,
}

impl LoginRegistry {
    fn get(&self, account: &AccountId) -> Option<Arc<LoginSession>> {
        self.lock().get(account).cloned()
    }

    fn snapshot(&self) -> Vec<Arc<LoginSession>> {
        self.lock().values().cloned().collect()
    }

    /// Register `session`, failing if another session owns its account.
    pub(crate) fn adopt(&self, session: &Arc<LoginSession>) -> Result<()> {
        let mut sessions = self.lock();
        match sessions.get(session.account()) {
            Some(existing) if !Arc::ptr_eq(existing, session) => Err(ClientError::invalid_state(
                "account not logged in elsewhere",
                format!("{} already has a login session", session.account()),
            )),
            Some(_) => Ok(()),
            None => {
                sessions.insert(session.account().clone(), Arc::clone(session));
                Ok(())
            }
        }
    }

    /// Remove `session` if it is still the registered one for its account.
    pub(crate) fn release(&self, session: &LoginSession) {
        let mut sessions = self.lock();
        if sessions
            .get(session.account())
            .is_some_and(|existing| std::ptr::eq(Arc::as_ptr(existing), session))
        {
            sessions.remove(session.account());
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AccountId, Arc<LoginSession>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Builder for [`ClientRuntime`].
pub struct ClientRuntimeBuilder {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    logger: Arc<dyn ProtocolLogger>,
    config: ClientConfig,
}

impl ClientRuntimeBuilder {
    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_protocol_logger(mut self, logger: Arc<dyn ProtocolLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ClientRuntime {
        let pump = Arc::new(MessagePump::new(
            self.transport,
            self.config.pump_idle_interval,
            self.logger,
        ));
        ClientRuntime {
            services: Arc::new(Services {
                pump,
                tokens: self.tokens,
                config: self.config,
            }),
            registry: Arc::new(LoginRegistry::default()),
            created: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            driver: Mutex::new(None),
        }
    }
}

/// Owns the message pump and every login session.
///
/// Nothing runs until [`start`](Self::start) spawns the pump driver, or the
/// caller ticks the pump itself.
pub struct ClientRuntime {
    services: Arc<Services>,
    registry: Arc<LoginRegistry>,
    /// Every session handed out that is still alive, so repeated lookups
    /// agree. The registry keeps active sessions alive; entries for dropped
    /// sessions are pruned on the next creation.
    created: Mutex<HashMap<AccountId, Weak<LoginSession>>>,
    cancel: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ClientRuntime {
    pub fn builder(transport: Arc<dyn Transport>) -> ClientRuntimeBuilder {
        ClientRuntimeBuilder {
            transport,
            tokens: Arc::new(NoTokenProvider),
            logger: Arc::new(NoProtocolLogger),
            config: ClientConfig::default(),
        }
    }

    pub fn pump(&self) -> &Arc<MessagePump> {
        &self.services.pump
    }

    pub fn config(&self) -> &ClientConfig {
        &self.services.config
    }

    /// Get the login session for `account`, creating it if needed.
    pub fn login_session(&self, account: &AccountId) -> Arc<LoginSession> {
        if let Some(session) = self.registry.get(account) {
            return session;
        }
        let mut created = self.lock_created();
        // Sessions that went back to LoggedOut are reusable while held
        if let Some(session) = created.get(account).and_then(Weak::upgrade) {
            return session;
        }
        created.retain(|_, session| session.strong_count() > 0);
        let session = LoginSession::new(
            account.clone(),
            Arc::clone(&self.services),
            Arc::downgrade(&self.registry),
        );
        created.insert(account.clone(), Arc::downgrade(&session));
        session
    }

    /// The session currently registered (logging in, logged in or logging
    /// out) for `account`.
    pub fn existing_session(&self, account: &AccountId) -> Option<Arc<LoginSession>> {
        self.registry.get(account)
    }

    pub fn sessions(&self) -> Vec<Arc<LoginSession>> {
        self.registry.snapshot()
    }

    /// Spawn the pump driver on the current tokio runtime. Idempotent.
    pub fn start(&self) {
        let mut driver = self.lock_driver();
        if driver.is_some() {
            return;
        }
        *driver = Some(Arc::clone(&self.services.pump).spawn_driver(self.cancel.child_token()));
        info!("Runtime: pump driver started");
    }

    pub fn is_running(&self) -> bool {
        self.lock_driver()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Block the calling thread, ticking the pump until `predicate` holds
    /// or `deadline` passes. For callers without a driver.
    pub fn run_until<P>(&self, predicate: P, deadline: Instant) -> bool
    where
        P: FnMut() -> bool,
    {
        self.services.pump.run_until(predicate, deadline)
    }

    /// Log every session out (best effort), stop the driver and fail
    /// whatever is still pending with `Canceled`.
    ///
    /// Without a running driver nobody would answer a logout, so sessions
    /// are torn down locally instead.
    pub async fn shutdown(&self) {
        let driven = self.is_running();
        for session in self.registry.snapshot() {
            if driven
                && session.state() != LoginState::LoggedOut
                && let Err(e) = session.logout().await
            {
                debug!("Runtime: logout of {} during shutdown: {}", session.account(), e);
            }
            if session.state() != LoginState::LoggedOut {
                session.force_logged_out(ClientError::Canceled("runtime shut down".into()));
            }
        }

        self.cancel.cancel();
        let driver = self.lock_driver().take();
        if let Some(handle) = driver
            && let Err(e) = handle.await
        {
            warn!("Runtime: pump driver ended abnormally: {}", e);
        }

        let failed = self
            .services
            .pump
            .correlation()
            .fail_all(ClientError::Canceled("runtime shut down".into()));
        if failed > 0 {
            debug!("Runtime: canceled {} pending requests", failed);
        }
        info!("Runtime: shut down");
    }

    fn lock_driver(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.driver.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_created(&self) -> MutexGuard<'_, HashMap<AccountId, Weak<LoginSession>>> {
        self.created.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ClientRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, alice, bob, runtime};
    use voxlink_domain::{AccountHandle, Event, Message, Request, Response};

    #[test]
    fn test_login_session_is_stable_per_account() {
        let transport = Arc::new(FakeTransport::new());
        let rt = runtime(&transport);
        let a = rt.login_session(&alice());
        assert!(Arc::ptr_eq(&a, &rt.login_session(&alice())));
        assert!(!Arc::ptr_eq(&a, &rt.login_session(&bob())));
        assert!(rt.sessions().is_empty());

        a.begin_login("t", None).unwrap();
        assert!(Arc::ptr_eq(&rt.existing_session(&alice()).unwrap(), &a));
        assert_eq!(rt.sessions().len(), 1);
    }

    #[test]
    fn test_dropped_sessions_are_evicted() {
        let transport = Arc::new(FakeTransport::new());
        let rt = runtime(&transport);
        drop(rt.login_session(&alice()));
        assert!(rt.lock_created().get(&alice()).unwrap().upgrade().is_none());

        let held = rt.login_session(&bob());
        assert_eq!(rt.lock_created().len(), 1);
        assert!(Arc::ptr_eq(&held, &rt.login_session(&bob())));

        // A logged-in session stays reachable through the registry
        let active = rt.login_session(&alice());
        active.begin_login("t", None).unwrap();
        let active_ptr = Arc::as_ptr(&active);
        drop(active);
        assert_eq!(Arc::as_ptr(&rt.login_session(&alice())), active_ptr);
    }

    #[test]
    fn test_run_until_without_driver() {
        let transport = Arc::new(FakeTransport::new());
        let rt = runtime(&transport);
        let session = rt.login_session(&alice());
        let completion = session.begin_login("t", None).unwrap();
        transport.push_event(Event::LoginStateChanged {
            account_handle: AccountHandle::for_account(&alice()),
            state: LoginState::LoggedIn,
            status_code: 0,
        });

        let c = completion.clone();
        let deadline = Instant::now() + std::time::Duration::from_secs(1);
        assert!(rt.run_until(move || c.is_completed(), deadline));
        assert_eq!(completion.result(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_logs_out_and_cancels_pending() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond_with(|envelope| {
            let mut replies = vec![Message::Response(Response::ok(envelope.token))];
            let state = match &envelope.request {
                Request::Login { .. } => Some(LoginState::LoggedIn),
                Request::Logout { .. } => Some(LoginState::LoggedOut),
                _ => None,
            };
            if let Some(state) = state {
                replies.push(Message::Event(Event::LoginStateChanged {
                    account_handle: AccountHandle::for_account(&alice()),
                    state,
                    status_code: 0,
                }));
            }
            replies
        });
        let rt = runtime(&transport);
        rt.start();
        rt.start();
        assert!(rt.is_running());

        let session = rt.login_session(&alice());
        session
            .login(crate::login::LoginOptions::default())
            .await
            .unwrap();
        rt.shutdown().await;
        assert_eq!(session.state(), LoginState::LoggedOut);
        assert!(!rt.is_running());
        assert!(rt.sessions().is_empty());
        assert_eq!(
            transport.issued_kinds(),
            vec!["login", "logout"]
        );
    }

    #[tokio::test]
    async fn test_shutdown_fails_outstanding_requests() {
        let transport = Arc::new(FakeTransport::new());
        let rt = runtime(&transport);
        let (_, pending) = rt
            .pump()
            .issue(Request::Logout {
                account_handle: AccountHandle::for_account(&bob()),
            })
            .unwrap();

        rt.shutdown().await;
        assert!(pending.result().unwrap_err().is_canceled());
    }
}
