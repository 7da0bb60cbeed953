//! Channel session state machine
//!
//! A [`ChannelSession`] tracks three connection axes: `audio`, `text` and the
//! overall `channel` state. While connecting or connected the overall state
//! is derived:
//!
//! ```text
//! channel == Connected  ⟺  audio ≠ Connecting ∧ text ≠ Connecting ∧ self present
//! ```
//!
//! so the order in which stream updates and the self-participant event
//! arrive does not matter. Disconnects resolve on the backend's
//! session-removed event, or when the owning login is torn down.

use crate::completion::Completion;
use crate::error::{ClientError, Result};
use crate::history::{HISTORY_PAGE_SIZE, HistoryAggregator, HistoryCompletion, HistoryQuery};
use crate::login::LoginLink;
use crate::observable::StateCell;
use crate::ports::token_provider::TokenRequest;
use crate::pump::{EventSubscriber, SubscriptionId, WeakSubscriber};
use crate::services::{Deferred, Services};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace, warn};
use voxlink_domain::{
    AccountId, ChannelId, ChannelTextMessage, ConnectionState, CorrelationToken, Event,
    HistoryFilter, LoginState, Participant, ParticipantHandle, ParticipantUpdate, Request,
    Response, ResponseBody, SessionHandle, TranscribedMessage, TransmissionMode, TransmitTarget,
    sort_chronologically, strip_resource_suffix,
};

const UPDATE_CAPACITY: usize = 256;

/// Options for [`ChannelSession::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub audio: bool,
    pub text: bool,
    /// Route local audio to this channel alone once its audio connects.
    pub switch_transmission: bool,
    /// Signed join token. Requested from the token provider when absent.
    pub access_token: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            audio: true,
            text: true,
            switch_transmission: true,
            access_token: None,
        }
    }
}

impl ConnectOptions {
    pub fn audio_only() -> Self {
        Self {
            text: false,
            ..Self::default()
        }
    }

    pub fn text_only() -> Self {
        Self {
            audio: false,
            switch_transmission: false,
            ..Self::default()
        }
    }

    pub fn with_switch_transmission(mut self, switch: bool) -> Self {
        self.switch_transmission = switch;
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Speaker and listener placement in a positional channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialPosition {
    pub speaker: [f32; 3],
    pub listener: [f32; 3],
    pub forward: [f32; 3],
    pub up: [f32; 3],
}

impl SpatialPosition {
    /// Speaker and listener at the same point, facing `-z` with `+y` up.
    pub fn at(point: [f32; 3]) -> Self {
        Self {
            speaker: point,
            listener: point,
            forward: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
        }
    }
}

/// Change notifications published by a channel session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelUpdate {
    ParticipantAdded(Participant),
    /// Only sent when a property actually changed.
    ParticipantUpdated(Participant),
    ParticipantRemoved(Participant),
    MessageReceived(ChannelTextMessage),
    TranscriptionReceived(TranscribedMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Audio,
    Text,
}

impl Stream {
    fn as_str(&self) -> &'static str {
        match self {
            Stream::Audio => "audio",
            Stream::Text => "text",
        }
    }
}

#[derive(Default)]
struct ChannelInner {
    subscription: Option<SubscriptionId>,
    pending_connect: Option<Completion<()>>,
    pending_disconnect: Option<Completion<()>>,
    join_token: Option<CorrelationToken>,
    leave_token: Option<CorrelationToken>,
    self_present: bool,
    participants: BTreeMap<ParticipantHandle, Participant>,
    messages: Vec<ChannelTextMessage>,
    transcripts: Vec<TranscribedMessage>,
    history: HistoryAggregator,
    transcribing: bool,
}

type PendingSlot = fn(&mut ChannelInner) -> &mut Option<Completion<()>>;

fn pending_connect(inner: &mut ChannelInner) -> &mut Option<Completion<()>> {
    &mut inner.pending_connect
}

fn pending_disconnect(inner: &mut ChannelInner) -> &mut Option<Completion<()>> {
    &mut inner.pending_disconnect
}

pub struct ChannelSession {
    channel: ChannelId,
    handle: SessionHandle,
    login: Arc<LoginLink>,
    services: Arc<Services>,
    audio: StateCell<ConnectionState>,
    text: StateCell<ConnectionState>,
    overall: StateCell<ConnectionState>,
    updates: broadcast::Sender<ChannelUpdate>,
    inner: Mutex<ChannelInner>,
}

impl ChannelSession {
    pub(crate) fn new(
        channel: ChannelId,
        login: Arc<LoginLink>,
        services: Arc<Services>,
    ) -> Arc<Self> {
        let handle = SessionHandle::for_channel(&login.handle, &channel);
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Arc::new(Self {
            channel,
            handle,
            login,
            services,
            audio: StateCell::default(),
            text: StateCell::default(),
            overall: StateCell::default(),
            updates,
            inner: Mutex::new(ChannelInner::default()),
        })
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn audio_state(&self) -> ConnectionState {
        self.audio.get()
    }

    pub fn text_state(&self) -> ConnectionState {
        self.text.get()
    }

    pub fn channel_state(&self) -> ConnectionState {
        self.overall.get()
    }

    pub fn watch_audio_state(&self) -> watch::Receiver<ConnectionState> {
        self.audio.subscribe()
    }

    pub fn watch_text_state(&self) -> watch::Receiver<ConnectionState> {
        self.text.subscribe()
    }

    pub fn watch_channel_state(&self) -> watch::Receiver<ConnectionState> {
        self.overall.subscribe()
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<ChannelUpdate> {
        self.updates.subscribe()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.lock().participants.values().cloned().collect()
    }

    pub fn participant(&self, handle: &ParticipantHandle) -> Option<Participant> {
        self.lock().participants.get(handle).cloned()
    }

    pub fn messages(&self) -> Vec<ChannelTextMessage> {
        self.lock().messages.clone()
    }

    pub fn transcripts(&self) -> Vec<TranscribedMessage> {
        self.lock().transcripts.clone()
    }

    pub fn pending_history_queries(&self) -> usize {
        self.lock().history.pending_count()
    }

    pub fn is_transcribing(&self) -> bool {
        self.lock().transcribing
    }

    // ==================== Connect ====================

    /// Start joining the channel with a signed join token.
    ///
    /// Fails with `InvalidState`, without issuing anything, when no stream
    /// is requested, the owning login is not `LoggedIn`, or any axis is not
    /// `Disconnected`. The completion resolves when the channel state
    /// becomes `Connected`.
    pub fn begin_connect(
        self: &Arc<Self>,
        options: &ConnectOptions,
        access_token: String,
    ) -> Result<Completion<()>> {
        let completion = Completion::new();
        {
            let mut inner = self.lock();
            self.check_connectable(options)?;

            if options.switch_transmission && options.audio {
                self.login
                    .set_transmission(TransmissionMode::Single(self.channel.clone()));
            }
            if options.audio {
                self.audio.set(ConnectionState::Connecting);
            }
            if options.text {
                self.text.set(ConnectionState::Connecting);
            }
            self.overall.set(ConnectionState::Connecting);

            inner.self_present = false;
            inner.messages.clear();
            inner.transcripts.clear();
            inner.pending_connect = Some(completion.clone());
            if inner.subscription.is_none() {
                let subscriber = Arc::new(WeakSubscriber::new(self));
                inner.subscription = Some(self.services.pump.subscribe(subscriber));
            }
        }
        info!("Channel: joining {}", self.channel);

        let request = Request::JoinChannel {
            account_handle: self.login.handle.clone(),
            session_handle: self.handle.clone(),
            channel_uri: self.channel.to_uri(),
            connect_audio: options.audio,
            connect_text: options.text,
            access_token,
        };
        let weak = Arc::downgrade(self);
        self.services.pump.issue_with(request, |token, response| {
            self.lock().join_token = Some(token);
            response.on_complete(move |outcome| {
                if let (Err(e), Some(session)) = (outcome, weak.upgrade()) {
                    session.on_join_rejected(token, e.clone());
                }
            });
        })?;
        Ok(completion)
    }

    /// Join the channel and wait until it is connected, bounded by
    /// `connect_timeout`.
    pub async fn connect(self: &Arc<Self>, options: ConnectOptions) -> Result<()> {
        self.check_connectable(&options)?;
        let request = TokenRequest::join(&self.login.account, &self.channel);
        let access_token = self
            .services
            .access_token(options.access_token.clone(), request)
            .await?;
        let completion = self.begin_connect(&options, access_token)?;

        let deadline = self.services.config.connect_timeout;
        match tokio::time::timeout(deadline, completion.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => self.abort(&completion, "connect", deadline, pending_connect),
        }
    }

    fn check_connectable(&self, options: &ConnectOptions) -> Result<()> {
        if !options.audio && !options.text {
            return Err(ClientError::invalid_state(
                "audio or text requested",
                "neither requested",
            ));
        }
        let login = self.login.state.get();
        if login != LoginState::LoggedIn {
            return Err(ClientError::invalid_state(LoginState::LoggedIn, login));
        }
        for state in [self.audio.get(), self.text.get(), self.overall.get()] {
            if state != ConnectionState::Disconnected {
                return Err(ClientError::invalid_state(
                    ConnectionState::Disconnected,
                    state,
                ));
            }
        }
        Ok(())
    }

    fn on_join_rejected(&self, token: CorrelationToken, error: ClientError) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            if inner.join_token != Some(token) {
                debug!("Channel: ignoring stale join failure for {}", token);
                return;
            }
            warn!("Channel: join {} rejected: {}", self.channel, error);
            self.reset_locked(&mut inner, &mut deferred, error);
        }
        deferred.run();
    }

    // ==================== Disconnect ====================

    /// Start leaving the channel.
    ///
    /// Resolves immediately when every axis is already `Disconnected`; a
    /// disconnect in flight returns its completion. A pending connect is
    /// rejected with `Canceled`.
    pub fn begin_disconnect(self: &Arc<Self>) -> Result<Completion<()>> {
        let completion = Completion::new();
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            let overall = self.overall.get();
            if overall == ConnectionState::Disconnected
                && self.audio.get().is_disconnected()
                && self.text.get().is_disconnected()
            {
                return Ok(Completion::ready(Ok(())));
            }
            if overall == ConnectionState::Disconnecting {
                return inner
                    .pending_disconnect
                    .clone()
                    .ok_or_else(|| ClientError::invalid_state("pending disconnect", overall));
            }

            if let Some(token) = inner.join_token.take() {
                self.services.pump.correlation().drop_if_present(token);
            }
            deferred.fail(
                inner.pending_connect.take(),
                ClientError::Canceled("disconnect requested before connect completed".into()),
            );
            for axis in [&self.audio, &self.text] {
                if !axis.get().is_disconnected() {
                    axis.set(ConnectionState::Disconnecting);
                }
            }
            self.overall.set(ConnectionState::Disconnecting);
            inner.pending_disconnect = Some(completion.clone());
        }
        deferred.run();
        info!("Channel: leaving {}", self.channel);

        let request = Request::LeaveChannel {
            session_handle: self.handle.clone(),
        };
        let weak = Arc::downgrade(self);
        self.services.pump.issue_with(request, |token, response| {
            self.lock().leave_token = Some(token);
            response.on_complete(move |outcome| {
                if let (Err(e), Some(session)) = (outcome, weak.upgrade()) {
                    session.on_leave_rejected(token, e.clone());
                }
            });
        })?;
        Ok(completion)
    }

    /// Leave the channel and wait for the backend, bounded by
    /// `disconnect_timeout`. On expiry the session resets locally.
    pub async fn disconnect(self: &Arc<Self>) -> Result<()> {
        let completion = self.begin_disconnect()?;
        let deadline = self.services.config.disconnect_timeout;
        match tokio::time::timeout(deadline, completion.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => self.abort(&completion, "disconnect", deadline, pending_disconnect),
        }
    }

    fn on_leave_rejected(&self, token: CorrelationToken, error: ClientError) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            if inner.leave_token != Some(token) {
                debug!("Channel: ignoring stale leave failure for {}", token);
                return;
            }
            warn!("Channel: leave {} rejected: {}", self.channel, error);
            deferred.fail(inner.pending_disconnect.take(), error.clone());
            self.reset_locked(&mut inner, &mut deferred, error);
        }
        deferred.run();
    }

    /// Caller-side deadline expired: reject `completion`, reset locally and
    /// send a best-effort leave.
    fn abort(
        &self,
        completion: &Completion<()>,
        operation: &'static str,
        deadline: Duration,
        slot: PendingSlot,
    ) -> Result<()> {
        let error = ClientError::timeout(operation, deadline);
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            let pending = slot(&mut *inner);
            if !pending.as_ref().is_some_and(|p| p.ptr_eq(completion)) {
                return completion.try_result().unwrap_or(Err(error));
            }
            warn!("Channel: {} {} timed out after {:?}", operation, self.channel, deadline);
            deferred.fail(pending.take(), error.clone());
            self.reset_locked(&mut inner, &mut deferred, error.clone());
        }
        self.services.compensate(Request::LeaveChannel {
            session_handle: self.handle.clone(),
        });
        deferred.run();
        Err(error)
    }

    /// Reset to `Disconnected` because the owning login went away or the
    /// session is being dropped.
    pub(crate) fn detach(&self, reason: &str) {
        let mut deferred = Deferred::default();
        let subscription = {
            let mut inner = self.lock();
            self.reset_locked(
                &mut inner,
                &mut deferred,
                ClientError::Canceled(reason.to_string()),
            );
            inner.subscription.take()
        };
        if let Some(id) = subscription {
            self.services.pump.unsubscribe(id);
        }
        deferred.run();
    }

    /// Clear everything the connection owned and move every axis to
    /// `Disconnected`. A pending connect fails with `connect_error`; a
    /// pending disconnect succeeds; history queries are canceled.
    fn reset_locked(
        &self,
        inner: &mut ChannelInner,
        deferred: &mut Deferred,
        connect_error: ClientError,
    ) {
        let correlation = self.services.pump.correlation();
        for token in [inner.join_token.take(), inner.leave_token.take()]
            .into_iter()
            .flatten()
        {
            correlation.drop_if_present(token);
        }

        deferred.fail(inner.pending_connect.take(), connect_error);
        deferred.succeed(inner.pending_disconnect.take(), ());
        for query in inner.history.cancel_all() {
            deferred.fail(
                Some(query),
                ClientError::Canceled("channel disconnected".into()),
            );
        }

        inner.self_present = false;
        inner.transcribing = false;
        inner.participants.clear();
        inner.messages.clear();
        inner.transcripts.clear();

        self.audio.set(ConnectionState::Disconnected);
        self.text.set(ConnectionState::Disconnected);
        if self.overall.set(ConnectionState::Disconnected) {
            info!("Channel: {} disconnected", self.channel);
        }
    }

    // ==================== Event handling ====================

    fn on_stream(&self, stream: Stream, state: ConnectionState, status_code: i32) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            let overall = self.overall.get();
            if overall == ConnectionState::Disconnected {
                trace!("Channel: {} {} update while disconnected", stream.as_str(), state);
                return;
            }
            let axis = match stream {
                Stream::Audio => &self.audio,
                Stream::Text => &self.text,
            };
            if axis.get() == ConnectionState::Disconnected && state != ConnectionState::Disconnected
            {
                debug!("Channel: stale {} {} update ignored", stream.as_str(), state);
                return;
            }
            if overall == ConnectionState::Disconnecting
                && matches!(state, ConnectionState::Connecting | ConnectionState::Connected)
            {
                return;
            }

            if axis.set(state) {
                debug!("Channel: {} {} is {}", self.channel, stream.as_str(), state);
            }
            if stream == Stream::Audio && state == ConnectionState::Connected {
                self.route_transmission(&mut deferred);
            }

            let streams_gone = self.audio.get().is_disconnected() && self.text.get().is_disconnected();
            if streams_gone && overall != ConnectionState::Disconnecting {
                let error = if status_code != 0 {
                    ClientError::backend(status_code, inner.join_token, None)
                } else {
                    ClientError::Canceled("every stream disconnected".into())
                };
                warn!("Channel: {} lost every stream: {}", self.channel, error);
                self.reset_locked(&mut inner, &mut deferred, error);
                let services = Arc::clone(&self.services);
                let handle = self.handle.clone();
                deferred.push(move || {
                    services.compensate(Request::LeaveChannel {
                        session_handle: handle,
                    })
                });
            } else {
                self.recompute(&mut inner, &mut deferred);
            }
        }
        deferred.run();
    }

    /// Send a set-transmission request if the login routes audio here.
    fn route_transmission(&self, deferred: &mut Deferred) {
        let target = match self.login.transmission() {
            TransmissionMode::All => TransmitTarget::All,
            mode if mode.targets(&self.channel) => TransmitTarget::Session(self.handle.clone()),
            _ => return,
        };
        let services = Arc::clone(&self.services);
        let request = Request::SetTransmission {
            account_handle: self.login.handle.clone(),
            target,
        };
        deferred.push(move || {
            if let Err(e) = services.fire_and_log(request, "set_transmission") {
                warn!("Channel: set_transmission not sent: {}", e);
            }
        });
    }

    /// Derive the channel state from the axes and self presence.
    fn recompute(&self, inner: &mut ChannelInner, deferred: &mut Deferred) {
        let overall = self.overall.get();
        if !matches!(
            overall,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return;
        }
        let ready = self.audio.get() != ConnectionState::Connecting
            && self.text.get() != ConnectionState::Connecting
            && inner.self_present;
        let next = if ready {
            ConnectionState::Connected
        } else {
            ConnectionState::Connecting
        };
        if self.overall.set(next) && next == ConnectionState::Connected {
            inner.join_token = None;
            info!("Channel: {} connected", self.channel);
            deferred.succeed(inner.pending_connect.take(), ());
        }
    }

    fn on_participant_added(
        &self,
        handle: &ParticipantHandle,
        account_uri: &str,
        display_name: Option<String>,
        flagged_self: bool,
    ) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            if self.overall.get() == ConnectionState::Disconnected {
                return;
            }
            let uri = strip_resource_suffix(account_uri);
            let is_self = flagged_self
                || uri
                    .parse::<AccountId>()
                    .is_ok_and(|account| account == self.login.account);
            let mut participant = Participant::new(handle.clone(), uri, is_self);
            participant.display_name = display_name;
            debug!("Channel: {} joined {}", participant.account_uri, self.channel);

            inner.participants.insert(handle.clone(), participant.clone());
            if is_self {
                inner.self_present = true;
                self.recompute(&mut inner, &mut deferred);
            }
            self.publish(&mut deferred, ChannelUpdate::ParticipantAdded(participant));
        }
        deferred.run();
    }

    fn on_participant_removed(&self, handle: &ParticipantHandle) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            let Some(participant) = inner.participants.remove(handle) else {
                return;
            };
            if participant.is_self {
                inner.self_present = false;
                self.recompute(&mut inner, &mut deferred);
            }
            self.publish(&mut deferred, ChannelUpdate::ParticipantRemoved(participant));
        }
        deferred.run();
    }

    fn on_participant_updated(&self, handle: &ParticipantHandle, update: &ParticipantUpdate) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            if self.overall.get() == ConnectionState::Disconnected {
                return;
            }
            if let Some(participant) = inner.participants.get_mut(handle)
                && participant.apply(update)
            {
                let updated = participant.clone();
                self.publish(&mut deferred, ChannelUpdate::ParticipantUpdated(updated));
            }
        }
        deferred.run();
    }

    fn on_channel_message(&self, message: &ChannelTextMessage) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            if self.overall.get() == ConnectionState::Disconnected {
                debug!("Channel: dropping message {} for torn-down {}", message.id, self.channel);
                return;
            }
            let mut message = message.clone();
            message.sender_uri = strip_resource_suffix(&message.sender_uri).to_string();
            trace!("Channel: message {} in {}", message.id, self.channel);
            inner.messages.push(message.clone());
            self.publish(&mut deferred, ChannelUpdate::MessageReceived(message));
        }
        deferred.run();
    }

    fn on_transcription(&self, message: &TranscribedMessage) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            if self.overall.get() == ConnectionState::Disconnected {
                debug!("Channel: dropping transcript for torn-down {}", self.channel);
                return;
            }
            let mut message = message.clone();
            message.speaker_uri = strip_resource_suffix(&message.speaker_uri).to_string();
            inner.transcripts.push(message.clone());
            self.publish(&mut deferred, ChannelUpdate::TranscriptionReceived(message));
        }
        deferred.run();
    }

    fn on_session_removed(&self, status_code: i32) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            if self.overall.get() == ConnectionState::Disconnected {
                return;
            }
            let error = if status_code != 0 {
                ClientError::backend(status_code, inner.join_token, None)
            } else {
                ClientError::Canceled("session removed".into())
            };
            self.reset_locked(&mut inner, &mut deferred, error);
        }
        deferred.run();
    }

    fn publish(&self, deferred: &mut Deferred, update: ChannelUpdate) {
        let updates = self.updates.clone();
        deferred.push(move || {
            // No receivers is fine
            let _ = updates.send(update);
        });
    }

    // ==================== Messaging & moderation ====================

    /// Send a text message. The text stream must be `Connected`.
    pub async fn send_message(
        &self,
        text: impl Into<String>,
        language: Option<String>,
    ) -> Result<()> {
        let text = text.into();
        if text.is_empty() {
            return Err(ClientError::Argument("message text is empty".into()));
        }
        require(ConnectionState::Connected, self.text.get())?;
        self.services
            .call(
                Request::SendChannelMessage {
                    session_handle: self.handle.clone(),
                    text,
                    language,
                },
                "send_channel_message",
            )
            .await?;
        Ok(())
    }

    /// Turn speech-to-text on or off. Audio must be `Connected`.
    pub async fn set_transcription(
        &self,
        enabled: bool,
        access_token: Option<String>,
    ) -> Result<()> {
        require(ConnectionState::Connected, self.audio.get())?;
        let access_token = self
            .services
            .access_token(
                access_token,
                TokenRequest::transcribe(&self.login.account, &self.channel),
            )
            .await?;
        self.services
            .call(
                Request::SetTranscription {
                    session_handle: self.handle.clone(),
                    enabled,
                    access_token,
                },
                "set_transcription",
            )
            .await?;
        self.lock().transcribing = enabled;
        Ok(())
    }

    /// Mute or unmute a participant for everyone in the channel.
    pub async fn set_participant_muted_for_all(
        &self,
        participant: &ParticipantHandle,
        muted: bool,
        access_token: Option<String>,
    ) -> Result<()> {
        require(ConnectionState::Connected, self.audio.get())?;
        let participant_uri = self.participant_uri(participant)?;
        let access_token = self
            .services
            .access_token(
                access_token,
                TokenRequest::mute(&self.login.account, &self.channel, participant_uri.clone()),
            )
            .await?;
        self.services
            .call(
                Request::MuteParticipantForAll {
                    session_handle: self.handle.clone(),
                    participant_uri,
                    muted,
                    access_token,
                },
                "mute_participant_for_all",
            )
            .await?;
        Ok(())
    }

    /// Mute or unmute a participant for this client only.
    pub fn set_local_mute(&self, participant: &ParticipantHandle, muted: bool) -> Result<()> {
        let mut deferred = Deferred::default();
        let participant_uri = {
            let mut inner = self.lock();
            let entry = inner
                .participants
                .get_mut(participant)
                .ok_or_else(|| unknown_participant(participant))?;
            if entry.local_mute != muted {
                entry.local_mute = muted;
                let updated = entry.clone();
                self.publish(&mut deferred, ChannelUpdate::ParticipantUpdated(updated));
            }
            entry.account_uri.clone()
        };
        deferred.run();
        self.services.fire_and_log(
            Request::SetLocalMute {
                session_handle: self.handle.clone(),
                participant_uri,
                muted,
            },
            "set_local_mute",
        )
    }

    /// Update speaker and listener placement. Positional channels only.
    pub fn set_position(&self, position: SpatialPosition) -> Result<()> {
        if !self.channel.is_positional() {
            return Err(ClientError::Argument(format!(
                "{} is not a positional channel",
                self.channel
            )));
        }
        require(ConnectionState::Connected, self.audio.get())?;
        self.services.pump.issue_untracked(Request::UpdatePosition {
            session_handle: self.handle.clone(),
            speaker: position.speaker,
            listener: position.listener,
            forward: position.forward,
            up: position.up,
        })?;
        Ok(())
    }

    fn participant_uri(&self, participant: &ParticipantHandle) -> Result<String> {
        self.lock()
            .participants
            .get(participant)
            .map(|p| p.account_uri.clone())
            .ok_or_else(|| unknown_participant(participant))
    }

    // ==================== History ====================

    /// Issue one history query. The completion resolves with the streamed
    /// messages once the backend ends the query.
    pub fn begin_history_query(self: &Arc<Self>, query: HistoryQuery) -> Result<HistoryCompletion> {
        self.start_history_query(query).map(|(_, completion)| completion)
    }

    fn start_history_query(
        self: &Arc<Self>,
        query: HistoryQuery,
    ) -> Result<(CorrelationToken, HistoryCompletion)> {
        if query.max_messages == 0 {
            return Err(ClientError::Argument("max_messages must be positive".into()));
        }
        require(ConnectionState::Connected, self.text.get())?;

        let completion = HistoryCompletion::new();
        let request = Request::HistoryQuery {
            session_handle: self.handle.clone(),
            max_messages: query.max_messages,
            filter: query.filter,
        };
        let weak = Arc::downgrade(self);
        let (token, _) = self.services.pump.issue_with(request, |token, response| {
            self.lock().history.track(token, completion.clone());
            response.on_complete(move |outcome| {
                if let Some(session) = weak.upgrade() {
                    session.on_history_response(token, outcome);
                }
            });
        })?;
        Ok((token, completion))
    }

    fn on_history_response(&self, token: CorrelationToken, outcome: &Result<Response>) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.lock();
            match outcome {
                Ok(response) => match &response.body {
                    ResponseBody::HistoryQueryStarted { query_id } => {
                        trace!("Channel: history {} is query {}", token, query_id);
                        inner.history.attach(token, query_id.clone());
                    }
                    ResponseBody::Empty => deferred.fail(
                        inner.history.reject(token),
                        ClientError::invalid_state("history query id", "empty response"),
                    ),
                },
                Err(e) => deferred.fail(inner.history.reject(token), e.clone()),
            }
        }
        deferred.run();
    }

    /// Run one history query, bounded by `history_page_timeout`. On expiry
    /// only this query is canceled.
    pub async fn history_query(
        self: &Arc<Self>,
        query: HistoryQuery,
    ) -> Result<Vec<ChannelTextMessage>> {
        let (token, completion) = self.start_history_query(query)?;
        let deadline = self.services.config.history_page_timeout;
        match tokio::time::timeout(deadline, completion.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let error = ClientError::timeout("history_query", deadline);
                self.services.pump.correlation().drop_if_present(token);
                let canceled = self.lock().history.cancel_token(token);
                match canceled {
                    Some(query) => {
                        warn!("Channel: history query {} timed out", token);
                        query.fail(error.clone());
                        Err(error)
                    }
                    None => completion.try_result().unwrap_or(Err(error)),
                }
            }
        }
    }

    /// Fetch up to `total` of the most recent messages matching `filter`,
    /// oldest first, in pages of [`HISTORY_PAGE_SIZE`].
    ///
    /// Each page ends where the previous one began; a page shorter than
    /// requested means history is exhausted. A page timeout aborts the
    /// whole fetch.
    pub async fn fetch_history(
        self: &Arc<Self>,
        total: u32,
        filter: HistoryFilter,
    ) -> Result<Vec<ChannelTextMessage>> {
        let pages = total.div_ceil(HISTORY_PAGE_SIZE);
        let mut collected: Vec<ChannelTextMessage> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor = filter.time_end;

        for page in 0..pages {
            let remaining = total.saturating_sub(collected.len() as u32);
            if remaining == 0 {
                break;
            }
            let requested = remaining.min(HISTORY_PAGE_SIZE);
            let page_filter = HistoryFilter {
                time_end: cursor,
                ..filter.clone()
            };
            let mut batch = self
                .history_query(HistoryQuery::new(requested).with_filter(page_filter))
                .await?;
            let received = batch.len();
            debug!(
                "Channel: history page {} of {} returned {} of {}",
                page + 1,
                pages,
                received,
                requested
            );

            sort_chronologically(&mut batch);
            if let Some(oldest) = batch.first() {
                cursor = Some(oldest.timestamp);
            }
            batch.retain(|message| seen.insert(message.id.clone()));
            batch.append(&mut collected);
            collected = batch;

            if (received as u32) < requested {
                break;
            }
        }
        Ok(collected)
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSubscriber for ChannelSession {
    fn on_event(&self, event: &Event) {
        if event.session_handle() != Some(&self.handle) {
            return;
        }
        match event {
            Event::MediaStreamUpdated {
                state, status_code, ..
            } => self.on_stream(Stream::Audio, *state, *status_code),
            Event::TextStreamUpdated {
                state, status_code, ..
            } => self.on_stream(Stream::Text, *state, *status_code),
            Event::ParticipantAdded {
                participant_handle,
                account_uri,
                display_name,
                is_self,
                ..
            } => self.on_participant_added(
                participant_handle,
                account_uri,
                display_name.clone(),
                *is_self,
            ),
            Event::ParticipantUpdated {
                participant_handle,
                update,
                ..
            } => self.on_participant_updated(participant_handle, update),
            Event::ParticipantRemoved {
                participant_handle, ..
            } => self.on_participant_removed(participant_handle),
            Event::ChannelMessage { message, .. } => self.on_channel_message(message),
            Event::TranscribedMessage { message, .. } => self.on_transcription(message),
            Event::HistoryMessage {
                query_id, message, ..
            } => {
                self.lock().history.push(query_id, message.clone());
            }
            Event::HistoryQueryEnd {
                query_id,
                status_code,
                ..
            } => {
                let finished = self.lock().history.finish(query_id, *status_code);
                if let Some((completion, outcome)) = finished {
                    completion.complete(outcome);
                }
            }
            Event::SessionAdded { channel_uri, .. } => {
                debug!("Channel: backend added session for {}", channel_uri);
            }
            Event::SessionRemoved { status_code, .. } => self.on_session_removed(*status_code),
            // Login-level events carry no session handle
            Event::LoginStateChanged { .. }
            | Event::ConnectionRecoveryChanged { .. }
            | Event::DirectMessage { .. }
            | Event::PresenceUpdated { .. }
            | Event::SubscriptionRequest { .. } => {}
        }
    }
}

fn require(expected: ConnectionState, actual: ConnectionState) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(ClientError::invalid_state(expected, actual))
    }
}

fn unknown_participant(handle: &ParticipantHandle) -> ClientError {
    ClientError::Argument(format!("unknown participant {}", handle.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ClientRuntime;
    use crate::login::LoginSession;
    use crate::testing::{FakeTransport, alice, arena, bob, lobby, runtime};
    use chrono::{DateTime, TimeZone, Utc};
    use voxlink_domain::{AccountHandle, Message, ParticipantUpdate};

    struct Fixture {
        transport: Arc<FakeTransport>,
        rt: ClientRuntime,
        login: Arc<LoginSession>,
        channel: Arc<ChannelSession>,
    }

    impl Fixture {
        fn new(channel: ChannelId) -> Self {
            let transport = Arc::new(FakeTransport::new());
            let rt = runtime(&transport);
            let login = rt.login_session(&alice());
            let completion = login.begin_login("t", None).unwrap();
            transport.push_event(Event::LoginStateChanged {
                account_handle: AccountHandle::for_account(&alice()),
                state: LoginState::LoggedIn,
                status_code: 0,
            });
            rt.pump().tick();
            completion.result().unwrap();
            let channel = login.channel(&channel);
            Self {
                transport,
                rt,
                login,
                channel,
            }
        }

        fn media(&self, state: ConnectionState, status_code: i32) -> Event {
            Event::MediaStreamUpdated {
                session_handle: self.channel.handle().clone(),
                state,
                status_code,
            }
        }

        fn text(&self, state: ConnectionState, status_code: i32) -> Event {
            Event::TextStreamUpdated {
                session_handle: self.channel.handle().clone(),
                state,
                status_code,
            }
        }

        fn joined(&self, id: &str, account: &AccountId) -> Event {
            Event::ParticipantAdded {
                session_handle: self.channel.handle().clone(),
                participant_handle: ParticipantHandle::new(id),
                account_uri: format!("{}/{}", account.to_uri(), "x".repeat(34)),
                display_name: None,
                is_self: false,
            }
        }

        fn session_removed(&self, status_code: i32) -> Event {
            Event::SessionRemoved {
                account_handle: self.login.handle().clone(),
                session_handle: self.channel.handle().clone(),
                status_code,
            }
        }

        fn deliver(&self, events: impl IntoIterator<Item = Event>) {
            for event in events {
                self.transport.push_event(event);
            }
            self.rt.pump().tick();
        }

        fn connect(&self) -> Completion<()> {
            let completion = self
                .channel
                .begin_connect(&ConnectOptions::default(), "join".into())
                .unwrap();
            self.deliver([
                self.media(ConnectionState::Connected, 0),
                self.text(ConnectionState::Connected, 0),
                self.joined("p-self", &alice()),
            ]);
            assert_eq!(self.channel.channel_state(), ConnectionState::Connected);
            completion
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn history_message(n: i64) -> ChannelTextMessage {
        ChannelTextMessage {
            id: format!("m{}", n),
            sender_uri: bob().to_uri(),
            sender_display_name: None,
            text: format!("message {}", n),
            language: None,
            timestamp: at(n),
            from_self: false,
        }
    }

    /// A message, a transcript and a participant update for `f`'s channel.
    fn late_traffic(f: &Fixture) -> Vec<Event> {
        let session_handle = f.channel.handle().clone();
        vec![
            Event::ChannelMessage {
                session_handle: session_handle.clone(),
                message: history_message(7),
            },
            Event::TranscribedMessage {
                session_handle: session_handle.clone(),
                message: TranscribedMessage {
                    speaker_uri: bob().to_uri(),
                    text: "too late".into(),
                    language: None,
                    timestamp: at(7),
                    from_self: false,
                },
            },
            Event::ParticipantUpdated {
                session_handle,
                participant_handle: ParticipantHandle::new("p-self"),
                update: ParticipantUpdate {
                    speaking: true,
                    muted: false,
                    energy: 0.5,
                    in_audio: true,
                    in_text: true,
                },
            },
        ]
    }

    /// Answer history queries from `store` like the backend: the newest
    /// `max` messages before `time_end`, streamed newest first.
    fn serve_history(transport: &FakeTransport, store: Vec<ChannelTextMessage>) {
        transport.respond_with(move |envelope| match &envelope.request {
            Request::HistoryQuery {
                session_handle,
                max_messages,
                filter,
            } => {
                let query_id = format!("q{}", envelope.token.value());
                let mut page: Vec<_> = store
                    .iter()
                    .filter(|m| filter.time_end.is_none_or(|end| m.timestamp < end))
                    .cloned()
                    .collect();
                page.sort_by_key(|m| std::cmp::Reverse(m.timestamp));
                page.truncate(*max_messages as usize);

                let mut replies = vec![Message::Response(Response::with_body(
                    envelope.token,
                    ResponseBody::HistoryQueryStarted {
                        query_id: query_id.clone(),
                    },
                ))];
                replies.extend(page.into_iter().map(|message| {
                    Message::Event(Event::HistoryMessage {
                        session_handle: session_handle.clone(),
                        query_id: query_id.clone(),
                        message,
                    })
                }));
                replies.push(Message::Event(Event::HistoryQueryEnd {
                    session_handle: session_handle.clone(),
                    query_id,
                    status_code: 0,
                }));
                replies
            }
            _ => vec![Message::Response(Response::ok(envelope.token))],
        });
    }

    #[test]
    fn test_connected_invariant_for_every_event_order() {
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let f = Fixture::new(lobby());
            let completion = f
                .channel
                .begin_connect(&ConnectOptions::default(), "join".into())
                .unwrap();
            let events = [
                f.media(ConnectionState::Connected, 0),
                f.text(ConnectionState::Connected, 0),
                f.joined("p-self", &alice()),
            ];

            for (step, index) in order.iter().enumerate() {
                f.deliver([events[*index].clone()]);
                let expected = if step == 2 {
                    ConnectionState::Connected
                } else {
                    ConnectionState::Connecting
                };
                assert_eq!(f.channel.channel_state(), expected, "order {:?}", order);
            }
            assert_eq!(completion.result(), Ok(()));
        }
    }

    #[test]
    fn test_other_participant_does_not_complete_connect() {
        let f = Fixture::new(lobby());
        let completion = f
            .channel
            .begin_connect(&ConnectOptions::default(), "join".into())
            .unwrap();
        f.deliver([
            f.media(ConnectionState::Connected, 0),
            f.text(ConnectionState::Connected, 0),
            f.joined("p-bob", &bob()),
        ]);
        assert_eq!(f.channel.channel_state(), ConnectionState::Connecting);
        assert!(!completion.is_completed());
        assert_eq!(f.channel.participants().len(), 1);
        assert!(!f.channel.participants()[0].is_self);
    }

    #[test]
    fn test_losing_self_moves_back_to_connecting() {
        let f = Fixture::new(lobby());
        f.connect();
        f.deliver([Event::ParticipantRemoved {
            session_handle: f.channel.handle().clone(),
            participant_handle: ParticipantHandle::new("p-self"),
        }]);
        assert_eq!(f.channel.channel_state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_connect_preconditions() {
        let f = Fixture::new(lobby());
        let neither = ConnectOptions {
            audio: false,
            text: false,
            ..ConnectOptions::default()
        };
        assert!(matches!(
            f.channel.begin_connect(&neither, "j".into()),
            Err(ClientError::InvalidState { .. })
        ));

        f.channel
            .begin_connect(&ConnectOptions::default(), "j".into())
            .unwrap();
        assert!(matches!(
            f.channel.begin_connect(&ConnectOptions::default(), "j".into()),
            Err(ClientError::InvalidState { .. })
        ));
        assert_eq!(f.transport.issued_kinds(), vec!["login", "join_channel"]);
    }

    #[test]
    fn test_connect_requires_login() {
        let transport = Arc::new(FakeTransport::new());
        let rt = runtime(&transport);
        let channel = rt.login_session(&alice()).channel(&lobby());
        let err = channel
            .begin_connect(&ConnectOptions::default(), "j".into())
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::invalid_state(LoginState::LoggedIn, LoginState::LoggedOut)
        );
        assert!(transport.issued().is_empty());
    }

    #[test]
    fn test_join_rejected_resets_axes() {
        let f = Fixture::new(lobby());
        let completion = f
            .channel
            .begin_connect(&ConnectOptions::default(), "j".into())
            .unwrap();
        let token = f.transport.last_token("join_channel").unwrap();
        f.transport.push_response(Response::error(token, 20_003, "no such channel"));
        f.rt.pump().tick();

        assert_eq!(completion.result().unwrap_err().status_code(), Some(20_003));
        assert_eq!(f.channel.audio_state(), ConnectionState::Disconnected);
        assert_eq!(f.channel.text_state(), ConnectionState::Disconnected);
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_streams_failing_during_connect() {
        let f = Fixture::new(lobby());
        let completion = f
            .channel
            .begin_connect(&ConnectOptions::default(), "j".into())
            .unwrap();
        f.deliver([f.media(ConnectionState::Disconnected, 5001)]);
        // Text is still connecting
        assert_eq!(f.channel.channel_state(), ConnectionState::Connecting);

        f.deliver([f.text(ConnectionState::Disconnected, 5001)]);
        assert_eq!(completion.result().unwrap_err().status_code(), Some(5001));
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnected);
        assert_eq!(f.transport.issued_kinds().last(), Some(&"leave_channel"));
    }

    #[test]
    fn test_stale_stream_update_ignored() {
        let f = Fixture::new(lobby());
        let completion = f
            .channel
            .begin_connect(&ConnectOptions::text_only(), "j".into())
            .unwrap();
        f.deliver([
            f.media(ConnectionState::Connected, 0),
            f.text(ConnectionState::Connected, 0),
            f.joined("p-self", &alice()),
        ]);
        assert_eq!(f.channel.audio_state(), ConnectionState::Disconnected);
        assert_eq!(completion.result(), Ok(()));
    }

    #[test]
    fn test_disconnect_resolves_on_session_removed() {
        let f = Fixture::new(lobby());
        f.connect();
        f.deliver([f.joined("p-bob", &bob())]);

        let disconnect = f.channel.begin_disconnect().unwrap();
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnecting);
        assert!(f.channel.begin_disconnect().unwrap().ptr_eq(&disconnect));

        f.deliver([
            f.media(ConnectionState::Disconnected, 0),
            f.text(ConnectionState::Disconnected, 0),
        ]);
        assert!(!disconnect.is_completed());

        f.deliver([f.session_removed(0)]);
        assert_eq!(disconnect.result(), Ok(()));
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnected);
        assert!(f.channel.participants().is_empty());

        // Already disconnected
        assert_eq!(f.channel.begin_disconnect().unwrap().result(), Ok(()));
    }

    #[test]
    fn test_disconnect_cancels_pending_connect() {
        let f = Fixture::new(lobby());
        let connect = f
            .channel
            .begin_connect(&ConnectOptions::default(), "j".into())
            .unwrap();
        f.channel.begin_disconnect().unwrap();
        assert!(connect.result().unwrap_err().is_canceled());

        // Streams completing late do not reconnect
        f.deliver([f.media(ConnectionState::Connected, 0)]);
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnecting);
    }

    #[test]
    fn test_participant_updates_published_on_change_only() {
        let f = Fixture::new(lobby());
        f.connect();
        let mut updates = f.channel.subscribe_updates();
        f.deliver([f.joined("p-bob", &bob())]);

        let update = ParticipantUpdate {
            speaking: true,
            muted: false,
            energy: 0.5,
            in_audio: true,
            in_text: true,
        };
        let event = Event::ParticipantUpdated {
            session_handle: f.channel.handle().clone(),
            participant_handle: ParticipantHandle::new("p-bob"),
            update,
        };
        f.deliver([event.clone(), event]);

        assert!(matches!(
            updates.try_recv(),
            Ok(ChannelUpdate::ParticipantAdded(p)) if p.account_uri == bob().to_uri()
        ));
        assert!(matches!(
            updates.try_recv(),
            Ok(ChannelUpdate::ParticipantUpdated(p)) if p.speaking
        ));
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn test_messages_logged_and_cleared_on_disconnect() {
        let f = Fixture::new(lobby());
        f.connect();
        let mut message = history_message(1);
        message.sender_uri = format!("{}/{}", bob().to_uri(), "y".repeat(34));
        f.deliver([Event::ChannelMessage {
            session_handle: f.channel.handle().clone(),
            message,
        }]);
        assert_eq!(f.channel.messages()[0].sender_uri, bob().to_uri());

        f.deliver([f.session_removed(0)]);
        assert!(f.channel.messages().is_empty());
    }

    #[test]
    fn test_transmission_routed_when_audio_connects() {
        let f = Fixture::new(lobby());
        f.connect();
        let sent: Vec<_> = f
            .transport
            .issued()
            .into_iter()
            .filter_map(|e| match e.request {
                Request::SetTransmission { target, .. } => Some(target),
                _ => None,
            })
            .collect();
        assert_eq!(sent, vec![TransmitTarget::Session(f.channel.handle().clone())]);
        assert_eq!(
            f.login.transmission_mode(),
            TransmissionMode::Single(lobby())
        );
    }

    #[test]
    fn test_transmission_not_routed_elsewhere() {
        let f = Fixture::new(lobby());
        f.login
            .set_transmission_mode(TransmissionMode::Single(arena()))
            .unwrap();
        f.channel
            .begin_connect(
                &ConnectOptions::default().with_switch_transmission(false),
                "j".into(),
            )
            .unwrap();
        f.deliver([f.media(ConnectionState::Connected, 0)]);
        assert!(!f.transport.issued_kinds().contains(&"set_transmission"));
    }

    #[test]
    fn test_set_position_requires_positional_channel() {
        let f = Fixture::new(lobby());
        f.connect();
        let err = f.channel.set_position(SpatialPosition::at([0.0; 3])).unwrap_err();
        assert!(matches!(err, ClientError::Argument(_)));

        let f = Fixture::new(arena());
        f.connect();
        f.channel.set_position(SpatialPosition::at([1.0, 0.0, 2.0])).unwrap();
        assert_eq!(f.transport.issued_kinds().last(), Some(&"update_position"));
        assert_eq!(f.rt.pump().correlation().pending_count(), 2);
    }

    #[test]
    fn test_local_mute_unknown_participant() {
        let f = Fixture::new(lobby());
        f.connect();
        let err = f
            .channel
            .set_local_mute(&ParticipantHandle::new("ghost"), true)
            .unwrap_err();
        assert!(matches!(err, ClientError::Argument(_)));

        f.deliver([f.joined("p-bob", &bob())]);
        f.channel
            .set_local_mute(&ParticipantHandle::new("p-bob"), true)
            .unwrap();
        assert!(f.channel.participant(&ParticipantHandle::new("p-bob")).unwrap().local_mute);
    }

    #[test]
    fn test_history_canceled_on_disconnect() {
        let f = Fixture::new(lobby());
        f.connect();
        let query = f.channel.begin_history_query(HistoryQuery::new(5)).unwrap();
        assert_eq!(f.channel.pending_history_queries(), 1);

        f.deliver([f.session_removed(0)]);
        assert!(query.result().unwrap_err().is_canceled());
        assert_eq!(f.channel.pending_history_queries(), 0);
    }

    #[test]
    fn test_history_query_rejects_zero() {
        let f = Fixture::new(lobby());
        f.connect();
        assert!(matches!(
            f.channel.begin_history_query(HistoryQuery::new(0)),
            Err(ClientError::Argument(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_history_pages_until_short_page() {
        let f = Fixture::new(lobby());
        f.connect();
        serve_history(&f.transport, (1..=24).map(history_message).collect());
        f.rt.start();

        let messages = f
            .channel
            .fetch_history(25, HistoryFilter::default())
            .await
            .unwrap();

        assert_eq!(messages.len(), 24);
        let ids: Vec<_> = messages.iter().map(|m| m.id.clone()).collect();
        let expected: Vec<_> = (1..=24).map(|n| format!("m{}", n)).collect();
        assert_eq!(ids, expected);
        let queries = f
            .transport
            .issued_kinds()
            .into_iter()
            .filter(|k| *k == "history_query")
            .count();
        assert_eq!(queries, 3);
        f.rt.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_history_single_full_page() {
        let f = Fixture::new(lobby());
        f.connect();
        serve_history(&f.transport, (1..=30).map(history_message).collect());
        f.rt.start();

        let messages = f
            .channel
            .fetch_history(10, HistoryFilter::default())
            .await
            .unwrap();

        assert_eq!(messages.len(), 10);
        assert_eq!(messages[0].id, "m21");
        assert_eq!(messages[9].id, "m30");
        let queries = f
            .transport
            .issued_kinds()
            .into_iter()
            .filter(|k| *k == "history_query")
            .count();
        assert_eq!(queries, 1);
        f.rt.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_resets_and_ignores_late_events() {
        let f = Fixture::new(lobby());
        f.rt.start();

        let err = f
            .channel
            .connect(ConnectOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnected);
        assert_eq!(
            f.transport.issued_kinds(),
            vec!["login", "join_channel", "leave_channel"]
        );

        let token = f.transport.last_token("join_channel").unwrap();
        f.transport.push_response(Response::ok(token));
        f.deliver([
            f.media(ConnectionState::Connected, 0),
            f.text(ConnectionState::Connected, 0),
            f.joined("p-self", &alice()),
        ]);
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnected);
        assert!(f.channel.participants().is_empty());
        f.rt.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_channel_events_after_connect_timeout_are_dropped() {
        let f = Fixture::new(lobby());
        let mut updates = f.channel.subscribe_updates();
        f.rt.start();

        let err = f
            .channel
            .connect(ConnectOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnected);

        f.deliver(late_traffic(&f));
        assert!(f.channel.messages().is_empty());
        assert!(f.channel.transcripts().is_empty());
        assert!(f.channel.participants().is_empty());
        assert!(updates.try_recv().is_err());
        f.rt.shutdown().await;
    }

    #[test]
    fn test_late_channel_events_after_session_removed_are_dropped() {
        let f = Fixture::new(lobby());
        f.connect();
        f.deliver([Event::ChannelMessage {
            session_handle: f.channel.handle().clone(),
            message: history_message(1),
        }]);
        assert_eq!(f.channel.messages().len(), 1);

        f.deliver([f.session_removed(0)]);
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnected);
        assert!(f.channel.messages().is_empty());

        let mut updates = f.channel.subscribe_updates();
        f.deliver(late_traffic(&f));
        assert!(f.channel.messages().is_empty());
        assert!(f.channel.transcripts().is_empty());
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_timeout_resets_and_sends_leave() {
        let f = Fixture::new(lobby());
        let connect = f.connect();
        assert_eq!(connect.result(), Ok(()));
        f.rt.start();

        let err = f.channel.disconnect().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnected);
        assert_eq!(f.channel.audio_state(), ConnectionState::Disconnected);
        assert_eq!(f.channel.text_state(), ConnectionState::Disconnected);
        assert!(f.channel.participants().is_empty());
        let leaves = f
            .transport
            .issued_kinds()
            .into_iter()
            .filter(|kind| *kind == "leave_channel")
            .count();
        assert_eq!(leaves, 2);

        // The backend finally answers; nothing changes
        let token = f.transport.last_token("leave_channel").unwrap();
        f.transport.push_response(Response::ok(token));
        f.deliver([f.session_removed(0)]);
        assert_eq!(f.channel.channel_state(), ConnectionState::Disconnected);
        assert!(f.channel.begin_disconnect().unwrap().is_completed());
        f.rt.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_query_timeout_cancels_only_that_query() {
        let f = Fixture::new(lobby());
        f.connect();
        f.rt.start();
        let other = f.channel.begin_history_query(HistoryQuery::new(3)).unwrap();

        let err = f
            .channel
            .history_query(HistoryQuery::new(3))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!other.is_completed());
        assert_eq!(f.channel.pending_history_queries(), 1);
        f.rt.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_message_requires_text() {
        let f = Fixture::new(lobby());
        let err = f.channel.send_message("hi", None).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::invalid_state(ConnectionState::Connected, ConnectionState::Disconnected)
        );

        f.connect();
        f.transport
            .respond_with(|envelope| vec![Message::Response(Response::ok(envelope.token))]);
        f.rt.start();
        f.channel.send_message("hi", None).await.unwrap();
        f.channel.set_transcription(true, None).await.unwrap();
        assert!(f.channel.is_transcribing());
        f.rt.shutdown().await;
    }
}
