//! Login session state machine
//!
//! One [`LoginSession`] per account. States move
//! `LoggedOut → LoggingIn → LoggedIn → LoggingOut → LoggedOut`; only the
//! backend's own logged-out event (or a caller-side deadline) enters
//! `LoggedOut`, and every path into it runs the same teardown:
//!
//! 1. unsubscribe from the pump
//! 2. detach every channel session (their pending futures are rejected)
//! 3. clear presence, allow/block sets and message queues
//! 4. leave the runtime registry
//!
//! Connection recovery is a separate, purely observational axis.

use crate::channel::ChannelSession;
use crate::completion::Completion;
use crate::error::{ClientError, Result};
use crate::observable::StateCell;
use crate::ports::token_provider::TokenRequest;
use crate::pump::{EventSubscriber, SubscriptionId, WeakSubscriber};
use crate::runtime::LoginRegistry;
use crate::services::{Deferred, Services};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};
use voxlink_domain::{
    AccountHandle, AccountId, ChannelId, ConnectionRecoveryState, ConnectionState,
    CorrelationToken, DirectMessage, Event, LoginState, Presence, PresenceStatus, Request,
    TransmissionMode, TransmitTarget, strip_resource_suffix,
};

/// Options for [`LoginSession::login`].
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    /// Signed login token. Requested from the token provider when absent.
    pub access_token: Option<String>,
    pub display_name: Option<String>,
}

impl LoginOptions {
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// The part of a login session its channel sessions can see.
pub(crate) struct LoginLink {
    pub(crate) account: AccountId,
    pub(crate) handle: AccountHandle,
    pub(crate) state: StateCell<LoginState>,
    transmission: Mutex<TransmissionMode>,
}

impl LoginLink {
    pub(crate) fn transmission(&self) -> TransmissionMode {
        self.transmission
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn set_transmission(&self, mode: TransmissionMode) {
        *self.transmission.lock().unwrap_or_else(|e| e.into_inner()) = mode;
    }
}

#[derive(Default)]
struct LoginInner {
    subscription: Option<SubscriptionId>,
    pending_login: Option<Completion<()>>,
    pending_logout: Option<Completion<()>>,
    /// State a logout started from, restored if the backend rejects it.
    logout_from: Option<LoginState>,
    login_token: Option<CorrelationToken>,
    logout_token: Option<CorrelationToken>,
    channels: HashMap<ChannelId, Arc<ChannelSession>>,
    presence_subscriptions: HashSet<AccountId>,
    presence: HashMap<AccountId, Presence>,
    allowed: HashSet<AccountId>,
    blocked: HashSet<AccountId>,
    direct_messages: VecDeque<DirectMessage>,
    subscription_requests: VecDeque<AccountId>,
}

/// What is left to do after a session enters `LoggedOut`, outside its lock.
struct Teardown {
    subscription: Option<SubscriptionId>,
    channels: Vec<Arc<ChannelSession>>,
}

pub struct LoginSession {
    link: Arc<LoginLink>,
    recovery: StateCell<ConnectionRecoveryState>,
    services: Arc<Services>,
    registry: Weak<LoginRegistry>,
    inner: Mutex<LoginInner>,
}

impl LoginSession {
    pub(crate) fn new(
        account: AccountId,
        services: Arc<Services>,
        registry: Weak<LoginRegistry>,
    ) -> Arc<Self> {
        let handle = AccountHandle::for_account(&account);
        Arc::new(Self {
            link: Arc::new(LoginLink {
                account,
                handle,
                state: StateCell::new(LoginState::LoggedOut),
                transmission: Mutex::new(TransmissionMode::None),
            }),
            recovery: StateCell::new(ConnectionRecoveryState::Disconnected),
            services,
            registry,
            inner: Mutex::new(LoginInner::default()),
        })
    }

    pub fn account(&self) -> &AccountId {
        &self.link.account
    }

    pub fn handle(&self) -> &AccountHandle {
        &self.link.handle
    }

    pub fn state(&self) -> LoginState {
        self.link.state.get()
    }

    pub fn recovery_state(&self) -> ConnectionRecoveryState {
        self.recovery.get()
    }

    pub fn watch_login_state(&self) -> watch::Receiver<LoginState> {
        self.link.state.subscribe()
    }

    pub fn watch_recovery_state(&self) -> watch::Receiver<ConnectionRecoveryState> {
        self.recovery.subscribe()
    }

    pub fn transmission_mode(&self) -> TransmissionMode {
        self.link.transmission()
    }

    // ==================== Login ====================

    /// Start logging in with a signed token.
    ///
    /// Fails with `InvalidState`, without issuing anything, unless the
    /// session is `LoggedOut`. The returned completion resolves when the
    /// backend reports `LoggedIn`.
    pub fn begin_login(
        self: &Arc<Self>,
        access_token: impl Into<String>,
        display_name: Option<String>,
    ) -> Result<Completion<()>> {
        let completion = Completion::new();
        {
            let mut inner = self.lock();
            let current = self.link.state.get();
            if current != LoginState::LoggedOut {
                return Err(ClientError::invalid_state(LoginState::LoggedOut, current));
            }
            if let Some(registry) = self.registry.upgrade() {
                registry.adopt(self)?;
            }
            if inner.subscription.is_none() {
                let subscriber = Arc::new(WeakSubscriber::new(self));
                inner.subscription = Some(self.services.pump.subscribe(subscriber));
            }
            inner.pending_login = Some(completion.clone());
            self.link.state.set(LoginState::LoggingIn);
        }
        info!("Login: {} logging in", self.link.account);

        let request = Request::Login {
            account_handle: self.link.handle.clone(),
            access_token: access_token.into(),
            display_name,
        };
        let weak = Arc::downgrade(self);
        self.services.pump.issue_with(request, |token, response| {
            self.lock().login_token = Some(token);
            response.on_complete(move |outcome| {
                if let (Err(e), Some(session)) = (outcome, weak.upgrade()) {
                    session.on_login_rejected(token, e.clone());
                }
            });
        })?;
        Ok(completion)
    }

    /// Log in and wait for the backend, bounded by `login_timeout`.
    ///
    /// On expiry the session is forced back to `LoggedOut`; whatever the
    /// backend reports afterwards is discarded.
    pub async fn login(self: &Arc<Self>, options: LoginOptions) -> Result<()> {
        let current = self.state();
        if current != LoginState::LoggedOut {
            return Err(ClientError::invalid_state(LoginState::LoggedOut, current));
        }
        let access_token = self
            .services
            .access_token(options.access_token, TokenRequest::login(&self.link.account))
            .await?;
        let completion = self.begin_login(access_token, options.display_name)?;

        let deadline = self.services.config.login_timeout;
        match tokio::time::timeout(deadline, completion.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => self.abort_login(&completion, deadline),
        }
    }

    fn on_login_rejected(&self, token: CorrelationToken, error: ClientError) {
        let mut deferred = Deferred::default();
        let teardown = {
            let mut inner = self.lock();
            if self.link.state.get() != LoginState::LoggingIn || inner.login_token != Some(token) {
                debug!("Login: ignoring stale login failure for {}", token);
                return;
            }
            warn!("Login: {} rejected: {}", self.link.account, error);
            deferred.fail(inner.pending_login.take(), error);
            self.enter_logged_out(&mut inner, &mut deferred)
        };
        self.finish_teardown(teardown);
        deferred.run();
    }

    fn abort_login(&self, completion: &Completion<()>, deadline: Duration) -> Result<()> {
        let error = ClientError::timeout("login", deadline);
        let mut deferred = Deferred::default();
        let teardown = {
            let mut inner = self.lock();
            if !inner
                .pending_login
                .as_ref()
                .is_some_and(|pending| pending.ptr_eq(completion))
            {
                return completion.try_result().unwrap_or(Err(error));
            }
            warn!("Login: {} timed out after {:?}", self.link.account, deadline);
            deferred.fail(inner.pending_login.take(), error.clone());
            self.enter_logged_out(&mut inner, &mut deferred)
        };
        self.finish_teardown(teardown);
        self.services.compensate(Request::Logout {
            account_handle: self.link.handle.clone(),
        });
        deferred.run();
        Err(error)
    }

    // ==================== Logout ====================

    /// Start logging out.
    ///
    /// Accepted from `LoggedIn` or `LoggingIn` (a pending login is rejected
    /// with `Canceled`). Already `LoggedOut` resolves immediately; a logout
    /// in flight returns its completion.
    pub fn begin_logout(self: &Arc<Self>) -> Result<Completion<()>> {
        let completion = Completion::new();
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            let current = self.link.state.get();
            match current {
                LoginState::LoggedOut => return Ok(Completion::ready(Ok(()))),
                LoginState::LoggingOut => {
                    return inner
                        .pending_logout
                        .clone()
                        .ok_or_else(|| ClientError::invalid_state("pending logout", current));
                }
                LoginState::LoggingIn => {
                    if let Some(token) = inner.login_token.take() {
                        self.services.pump.correlation().drop_if_present(token);
                    }
                    deferred.fail(
                        inner.pending_login.take(),
                        ClientError::Canceled("logout requested before login completed".into()),
                    );
                }
                LoginState::LoggedIn => {}
            }
            inner.logout_from = Some(current);
            inner.pending_logout = Some(completion.clone());
            self.link.state.set(LoginState::LoggingOut);
        }
        deferred.run();
        info!("Login: {} logging out", self.link.account);

        let request = Request::Logout {
            account_handle: self.link.handle.clone(),
        };
        let weak = Arc::downgrade(self);
        self.services.pump.issue_with(request, |token, response| {
            self.lock().logout_token = Some(token);
            response.on_complete(move |outcome| {
                if let (Err(e), Some(session)) = (outcome, weak.upgrade()) {
                    session.on_logout_rejected(token, e.clone());
                }
            });
        })?;
        Ok(completion)
    }

    /// Log out and wait for the backend, bounded by `logout_timeout`.
    /// On expiry the session is torn down locally.
    pub async fn logout(self: &Arc<Self>) -> Result<()> {
        let completion = self.begin_logout()?;
        let deadline = self.services.config.logout_timeout;
        match tokio::time::timeout(deadline, completion.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let error = ClientError::timeout("logout", deadline);
                let mut deferred = Deferred::default();
                let teardown = {
                    let mut inner = self.lock();
                    if !inner
                        .pending_logout
                        .as_ref()
                        .is_some_and(|pending| pending.ptr_eq(&completion))
                    {
                        return completion.try_result().unwrap_or(Err(error));
                    }
                    warn!("Login: {} logout timed out, tearing down", self.link.account);
                    deferred.fail(inner.pending_logout.take(), error.clone());
                    self.enter_logged_out(&mut inner, &mut deferred)
                };
                self.finish_teardown(teardown);
                deferred.run();
                Err(error)
            }
        }
    }

    fn on_logout_rejected(&self, token: CorrelationToken, error: ClientError) {
        let mut deferred = Deferred::default();
        let teardown = {
            let mut inner = self.lock();
            if self.link.state.get() != LoginState::LoggingOut || inner.logout_token != Some(token)
            {
                debug!("Login: ignoring stale logout failure for {}", token);
                return;
            }
            inner.logout_token = None;
            warn!("Login: {} logout rejected: {}", self.link.account, error);
            deferred.fail(inner.pending_logout.take(), error);
            match inner.logout_from.take() {
                Some(LoginState::LoggedIn) => {
                    self.link.state.set(LoginState::LoggedIn);
                    None
                }
                // Nothing to return to from an interrupted login.
                _ => Some(self.enter_logged_out(&mut inner, &mut deferred)),
            }
        };
        if let Some(teardown) = teardown {
            self.finish_teardown(teardown);
        }
        deferred.run();
    }

    /// Tear the session down locally, rejecting pending operations with
    /// `reason`. Used on runtime shutdown.
    pub(crate) fn force_logged_out(&self, reason: ClientError) {
        let mut deferred = Deferred::default();
        let teardown = {
            let mut inner = self.lock();
            deferred.fail(inner.pending_login.take(), reason.clone());
            deferred.fail(inner.pending_logout.take(), reason);
            self.enter_logged_out(&mut inner, &mut deferred)
        };
        self.finish_teardown(teardown);
        deferred.run();
    }

    /// Move to `LoggedOut` and clear owned state. Leftover pending
    /// operations resolve: a login is canceled, a logout succeeds.
    fn enter_logged_out(&self, inner: &mut LoginInner, deferred: &mut Deferred) -> Teardown {
        let correlation = self.services.pump.correlation();
        for token in [inner.login_token.take(), inner.logout_token.take()]
            .into_iter()
            .flatten()
        {
            correlation.drop_if_present(token);
        }

        deferred.fail(
            inner.pending_login.take(),
            ClientError::Canceled("logged out before login completed".into()),
        );
        deferred.succeed(inner.pending_logout.take(), ());
        inner.logout_from = None;

        inner.presence_subscriptions.clear();
        inner.presence.clear();
        inner.allowed.clear();
        inner.blocked.clear();
        inner.direct_messages.clear();
        inner.subscription_requests.clear();
        self.link.state.set(LoginState::LoggedOut);

        Teardown {
            subscription: inner.subscription.take(),
            channels: inner.channels.drain().map(|(_, channel)| channel).collect(),
        }
    }

    fn finish_teardown(&self, teardown: Teardown) {
        if let Some(id) = teardown.subscription {
            self.services.pump.unsubscribe(id);
        }
        for channel in teardown.channels {
            channel.detach("login session ended");
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self);
        }
        info!("Login: {} logged out", self.link.account);
    }

    // ==================== Events ====================

    fn on_login_state(&self, state: LoginState, status_code: i32) {
        let mut deferred = Deferred::default();
        let teardown = {
            let mut inner = self.lock();
            let current = self.link.state.get();

            if status_code != 0 && current == LoginState::LoggingIn {
                let error = ClientError::backend(status_code, inner.login_token, None);
                warn!("Login: {} failed: {}", self.link.account, error);
                deferred.fail(inner.pending_login.take(), error);
                Some(self.enter_logged_out(&mut inner, &mut deferred))
            } else {
                match state {
                    LoginState::LoggedIn if current == LoginState::LoggingIn => {
                        inner.login_token = None;
                        self.link.state.set(LoginState::LoggedIn);
                        deferred.succeed(inner.pending_login.take(), ());
                        info!("Login: {} logged in", self.link.account);
                        None
                    }
                    LoginState::LoggedIn => {
                        debug!("Login: ignoring logged_in while {}", current);
                        None
                    }
                    LoginState::LoggedOut if current == LoginState::LoggedOut => None,
                    LoginState::LoggedOut => {
                        if status_code != 0 {
                            warn!(
                                "Login: {} logged out by backend (status {})",
                                self.link.account, status_code
                            );
                        }
                        Some(self.enter_logged_out(&mut inner, &mut deferred))
                    }
                    LoginState::LoggingIn | LoginState::LoggingOut => {
                        trace!("Login: backend reports {} while {}", state, current);
                        None
                    }
                }
            }
        };
        if let Some(teardown) = teardown {
            self.finish_teardown(teardown);
        }
        deferred.run();
    }

    fn on_presence(&self, account_uri: &str, status: PresenceStatus, message: Option<String>) {
        let Some(account) = parse_backend_account(account_uri) else {
            debug!("Login: presence for unparseable account '{}'", account_uri);
            return;
        };
        trace!("Login: presence of {} is {:?}", account, status);
        self.lock()
            .presence
            .insert(account, Presence { status, message });
    }

    // ==================== Channels ====================

    /// Get or create the channel session for `channel`.
    pub fn channel(&self, channel: &ChannelId) -> Arc<ChannelSession> {
        let mut inner = self.lock();
        if let Some(existing) = inner.channels.get(channel) {
            return Arc::clone(existing);
        }
        let session = ChannelSession::new(
            channel.clone(),
            Arc::clone(&self.link),
            Arc::clone(&self.services),
        );
        inner.channels.insert(channel.clone(), Arc::clone(&session));
        session
    }

    pub fn existing_channel(&self, channel: &ChannelId) -> Option<Arc<ChannelSession>> {
        self.lock().channels.get(channel).cloned()
    }

    pub fn channels(&self) -> Vec<Arc<ChannelSession>> {
        self.lock().channels.values().cloned().collect()
    }

    /// Drop a channel session. It must be `Disconnected`.
    ///
    /// Returns whether a session was removed.
    pub fn remove_channel(&self, channel: &ChannelId) -> Result<bool> {
        let removed = {
            let mut inner = self.lock();
            match inner.channels.get(channel) {
                None => return Ok(false),
                Some(session) => {
                    let state = session.channel_state();
                    if state != ConnectionState::Disconnected {
                        return Err(ClientError::invalid_state(
                            ConnectionState::Disconnected,
                            state,
                        ));
                    }
                }
            }
            inner.channels.remove(channel)
        };
        if let Some(session) = removed {
            session.detach("channel removed");
        }
        Ok(true)
    }

    /// Choose which channel(s) receive local audio.
    ///
    /// Sent immediately when the target is ready; a `Single` target whose
    /// audio is not yet connected is applied when it connects.
    pub fn set_transmission_mode(&self, mode: TransmissionMode) -> Result<()> {
        self.link.set_transmission(mode.clone());
        if self.state() != LoginState::LoggedIn {
            debug!("Login: transmission {} stored until logged in", mode);
            return Ok(());
        }

        let target = match &mode {
            TransmissionMode::None => Some(TransmitTarget::None),
            TransmissionMode::All => Some(TransmitTarget::All),
            TransmissionMode::Single(channel) => self
                .existing_channel(channel)
                .filter(|session| session.audio_state() == ConnectionState::Connected)
                .map(|session| TransmitTarget::Session(session.handle().clone())),
        };
        match target {
            Some(target) => self.services.fire_and_log(
                Request::SetTransmission {
                    account_handle: self.link.handle.clone(),
                    target,
                },
                "set_transmission",
            ),
            None => {
                debug!("Login: transmission {} applied when audio connects", mode);
                Ok(())
            }
        }
    }

    // ==================== Presence & messaging ====================

    /// Allow `account` to see our presence, then subscribe to theirs.
    ///
    /// If subscribing fails, the allow added by this call is rolled back.
    pub async fn add_presence_subscription(&self, account: &AccountId) -> Result<()> {
        self.require_logged_in()?;
        let account_uri = account.to_uri();

        let newly_allowed = !self.lock().allowed.contains(account);
        if newly_allowed {
            self.services
                .call(
                    Request::AddAllowed {
                        account_handle: self.link.handle.clone(),
                        account_uri: account_uri.clone(),
                    },
                    "add_allowed",
                )
                .await?;
            self.lock().allowed.insert(account.clone());
        }

        let subscribed = self
            .services
            .call(
                Request::AddSubscription {
                    account_handle: self.link.handle.clone(),
                    account_uri: account_uri.clone(),
                },
                "add_subscription",
            )
            .await;
        if let Err(e) = subscribed {
            if newly_allowed {
                warn!("Login: subscribing to {} failed, rolling back allow", account);
                let rollback = self
                    .services
                    .call(
                        Request::RemoveAllowed {
                            account_handle: self.link.handle.clone(),
                            account_uri,
                        },
                        "remove_allowed",
                    )
                    .await;
                match rollback {
                    Ok(_) => {
                        self.lock().allowed.remove(account);
                    }
                    Err(rollback_error) => {
                        warn!("Login: rollback for {} failed: {}", account, rollback_error)
                    }
                }
            }
            return Err(e);
        }

        self.lock().presence_subscriptions.insert(account.clone());
        Ok(())
    }

    /// Unsubscribe from `account`'s presence and withdraw its allow.
    pub async fn remove_presence_subscription(&self, account: &AccountId) -> Result<()> {
        self.require_logged_in()?;
        let account_uri = account.to_uri();
        self.services
            .call(
                Request::RemoveSubscription {
                    account_handle: self.link.handle.clone(),
                    account_uri: account_uri.clone(),
                },
                "remove_subscription",
            )
            .await?;
        {
            let mut inner = self.lock();
            inner.presence_subscriptions.remove(account);
            inner.presence.remove(account);
        }

        let allowed = self.lock().allowed.contains(account);
        if allowed {
            self.services
                .call(
                    Request::RemoveAllowed {
                        account_handle: self.link.handle.clone(),
                        account_uri,
                    },
                    "remove_allowed",
                )
                .await?;
            self.lock().allowed.remove(account);
        }
        Ok(())
    }

    pub async fn block_account(&self, account: &AccountId) -> Result<()> {
        self.require_logged_in()?;
        self.services
            .call(
                Request::AddBlocked {
                    account_handle: self.link.handle.clone(),
                    account_uri: account.to_uri(),
                },
                "add_blocked",
            )
            .await?;
        self.lock().blocked.insert(account.clone());
        Ok(())
    }

    pub async fn unblock_account(&self, account: &AccountId) -> Result<()> {
        self.require_logged_in()?;
        self.services
            .call(
                Request::RemoveBlocked {
                    account_handle: self.link.handle.clone(),
                    account_uri: account.to_uri(),
                },
                "remove_blocked",
            )
            .await?;
        self.lock().blocked.remove(account);
        Ok(())
    }

    pub async fn send_direct_message(
        &self,
        recipient: &AccountId,
        text: impl Into<String>,
        language: Option<String>,
    ) -> Result<()> {
        let text = text.into();
        if text.is_empty() {
            return Err(ClientError::Argument("message text is empty".into()));
        }
        self.require_logged_in()?;
        self.services
            .call(
                Request::SendDirectMessage {
                    account_handle: self.link.handle.clone(),
                    recipient_uri: recipient.to_uri(),
                    text,
                    language,
                },
                "send_direct_message",
            )
            .await?;
        Ok(())
    }

    /// Take every direct message received since the last drain.
    pub fn drain_direct_messages(&self) -> Vec<DirectMessage> {
        self.lock().direct_messages.drain(..).collect()
    }

    /// Take every pending presence subscription request.
    pub fn drain_subscription_requests(&self) -> Vec<AccountId> {
        self.lock().subscription_requests.drain(..).collect()
    }

    pub fn presence_of(&self, account: &AccountId) -> Option<Presence> {
        self.lock().presence.get(account).cloned()
    }

    pub fn presence_subscriptions(&self) -> Vec<AccountId> {
        let mut accounts: Vec<_> = self.lock().presence_subscriptions.iter().cloned().collect();
        accounts.sort_by_key(|a| a.to_uri());
        accounts
    }

    pub fn blocked_accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<_> = self.lock().blocked.iter().cloned().collect();
        accounts.sort_by_key(|a| a.to_uri());
        accounts
    }

    fn require_logged_in(&self) -> Result<()> {
        match self.state() {
            LoginState::LoggedIn => Ok(()),
            other => Err(ClientError::invalid_state(LoginState::LoggedIn, other)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoginInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSubscriber for LoginSession {
    fn on_event(&self, event: &Event) {
        if event.account_handle() != Some(&self.link.handle) {
            return;
        }
        match event {
            Event::LoginStateChanged {
                state, status_code, ..
            } => self.on_login_state(*state, *status_code),
            Event::ConnectionRecoveryChanged { state, .. } => {
                if self.recovery.set(*state) {
                    info!("Login: {} connection {}", self.link.account, state);
                }
            }
            Event::DirectMessage { message, .. } => {
                let mut message = message.clone();
                message.sender_uri = strip_resource_suffix(&message.sender_uri).to_string();
                self.lock().direct_messages.push_back(message);
            }
            Event::PresenceUpdated {
                account_uri,
                status,
                custom_message,
                ..
            } => self.on_presence(account_uri, *status, custom_message.clone()),
            Event::SubscriptionRequest { requester_uri, .. } => {
                match parse_backend_account(requester_uri) {
                    Some(account) => self.lock().subscription_requests.push_back(account),
                    None => debug!("Login: subscription request from '{}'", requester_uri),
                }
            }
            // Channel sessions subscribe for these themselves
            Event::SessionAdded { .. }
            | Event::SessionRemoved { .. }
            | Event::MediaStreamUpdated { .. }
            | Event::TextStreamUpdated { .. }
            | Event::ParticipantAdded { .. }
            | Event::ParticipantUpdated { .. }
            | Event::ParticipantRemoved { .. }
            | Event::ChannelMessage { .. }
            | Event::TranscribedMessage { .. }
            | Event::HistoryMessage { .. }
            | Event::HistoryQueryEnd { .. } => {}
        }
    }
}

fn parse_backend_account(uri: &str) -> Option<AccountId> {
    strip_resource_suffix(uri).parse().ok()
}
