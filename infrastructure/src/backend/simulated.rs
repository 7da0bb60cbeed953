//! In-process voice backend.
//!
//! [`SimulatedBackend`] implements the [`Transport`] port the way the native
//! engine behaves: every request is answered with a response carrying its
//! correlation token, followed by the events the real service would push.
//!
//! | Request | Events after the response |
//! |---------|---------------------------|
//! | login | recovery `connected`, login `logged_in` |
//! | logout | `session_removed` per channel, login `logged_out` |
//! | join | `session_added`, stream `connecting`/`connected`, self + peers added |
//! | leave | streams `disconnected`, `session_removed` |
//! | history query | one `history_message` per match, `history_query_end` |
//!
//! Delivery is delayed by `latency_ticks`: a message queued at tick `t`
//! becomes visible at tick `t + latency`. The clock advances whenever the
//! queue is polled and nothing is due.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};
use voxlink_application::ports::transport::{Transport, TransportError};
use voxlink_domain::{
    AccountHandle, AccountId, ChannelTextMessage, ConnectionRecoveryState, ConnectionState,
    CorrelationToken, DirectMessage, Event, HistoryFilter, LoginState, Message, ParticipantHandle,
    ParticipantUpdate, PresenceStatus, Request, RequestEnvelope, Response, ResponseBody,
    SessionHandle, TranscribedMessage, sort_chronologically,
};

/// Status codes the simulated service answers with.
pub mod status {
    pub const NOT_LOGGED_IN: i32 = 1001;
    pub const ALREADY_LOGGED_IN: i32 = 1005;
    pub const UNKNOWN_SESSION: i32 = 1009;
    pub const ACCESS_DENIED: i32 = 20200;
}

/// Behavior knobs for [`SimulatedBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOptions {
    /// Ticks between queuing a message and delivering it.
    pub latency_ticks: u64,
    /// Messages seeded into each channel's history on first join.
    pub history_seed: usize,
    /// Names of simulated peers present in every channel.
    pub peers: Vec<String>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            latency_ticks: 1,
            history_seed: 25,
            peers: vec!["bob".to_string(), "carol".to_string()],
        }
    }
}

impl BackendOptions {
    pub fn with_latency_ticks(mut self, ticks: u64) -> Self {
        self.latency_ticks = ticks;
        self
    }

    pub fn with_history_seed(mut self, count: usize) -> Self {
        self.history_seed = count;
        self
    }

    pub fn with_peers(mut self, peers: Vec<String>) -> Self {
        self.peers = peers;
        self
    }
}

struct Joined {
    account: AccountHandle,
    channel_uri: String,
    self_handle: ParticipantHandle,
    /// Peer participants: handle and account URI.
    peers: Vec<(ParticipantHandle, String)>,
}

#[derive(Default)]
struct BackendState {
    clock: u64,
    queue: VecDeque<(u64, Message)>,
    closed: bool,
    logged_in: HashMap<AccountHandle, String>,
    sessions: HashMap<SessionHandle, Joined>,
    /// Channel URI to its message history, oldest first.
    history: HashMap<String, Vec<ChannelTextMessage>>,
    next_id: u64,
}

impl BackendState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }
}

/// In-process backend implementing [`Transport`].
pub struct SimulatedBackend {
    options: BackendOptions,
    state: Mutex<BackendState>,
}

impl SimulatedBackend {
    pub fn new(options: BackendOptions) -> Self {
        Self {
            options,
            state: Mutex::new(BackendState::default()),
        }
    }

    pub fn options(&self) -> &BackendOptions {
        &self.options
    }

    /// Refuse every further request, as an engine that shut down would.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// Push an event as if the service had sent it unprompted.
    pub fn inject(&self, event: Event) {
        let mut state = self.lock();
        self.enqueue(&mut state, Message::Event(event));
    }

    /// Messages queued but not yet drained.
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Accounts currently logged in.
    pub fn logged_in_count(&self) -> usize {
        self.lock().logged_in.len()
    }

    /// Drop an account as if the service ended its login.
    pub fn kick(&self, account: &AccountHandle, status_code: i32) {
        let mut state = self.lock();
        if state.logged_in.remove(account).is_none() {
            return;
        }
        self.drop_sessions_of(&mut state, account, status_code);
        self.enqueue(
            &mut state,
            Message::Event(Event::LoginStateChanged {
                account_handle: account.clone(),
                state: LoginState::LoggedOut,
                status_code,
            }),
        );
    }

    fn enqueue(&self, state: &mut BackendState, message: Message) {
        let due = state.clock + self.options.latency_ticks;
        state.queue.push_back((due, message));
    }

    fn respond(&self, state: &mut BackendState, response: Response) {
        self.enqueue(state, Message::Response(response));
    }

    fn event(&self, state: &mut BackendState, event: Event) {
        self.enqueue(state, Message::Event(event));
    }

    fn handle(&self, state: &mut BackendState, envelope: RequestEnvelope) {
        let token = envelope.token;
        match envelope.request {
            Request::Login {
                account_handle,
                access_token,
                ..
            } => self.login(state, token, account_handle, &access_token),
            Request::Logout { account_handle } => {
                if state.logged_in.remove(&account_handle).is_none() {
                    return self.reject(state, token, status::NOT_LOGGED_IN, "not logged in");
                }
                self.respond(state, Response::ok(token));
                self.drop_sessions_of(state, &account_handle, 0);
                self.event(
                    state,
                    Event::LoginStateChanged {
                        account_handle,
                        state: LoginState::LoggedOut,
                        status_code: 0,
                    },
                );
            }
            Request::JoinChannel {
                account_handle,
                session_handle,
                channel_uri,
                connect_audio,
                connect_text,
                access_token,
            } => {
                if !state.logged_in.contains_key(&account_handle) {
                    return self.reject(state, token, status::NOT_LOGGED_IN, "not logged in");
                }
                if access_token.is_empty() {
                    return self.reject(state, token, status::ACCESS_DENIED, "missing join token");
                }
                self.respond(state, Response::ok(token));
                self.join(
                    state,
                    account_handle,
                    session_handle,
                    channel_uri,
                    connect_audio,
                    connect_text,
                );
            }
            Request::LeaveChannel { session_handle } => {
                let Some(joined) = state.sessions.remove(&session_handle) else {
                    return self.reject(state, token, status::UNKNOWN_SESSION, "unknown session");
                };
                self.respond(state, Response::ok(token));
                self.leave(state, session_handle, joined.account, 0);
            }
            Request::SendChannelMessage {
                session_handle,
                text,
                language,
            } => {
                let Some(joined) = state.sessions.get(&session_handle) else {
                    return self.reject(state, token, status::UNKNOWN_SESSION, "unknown session");
                };
                let sender_uri = joined.account.as_str().to_string();
                let channel_uri = joined.channel_uri.clone();
                let message = ChannelTextMessage {
                    id: state.next_id("msg-"),
                    sender_uri,
                    sender_display_name: None,
                    text,
                    language,
                    timestamp: Utc::now(),
                    from_self: true,
                };
                state
                    .history
                    .entry(channel_uri)
                    .or_default()
                    .push(message.clone());
                self.respond(state, Response::ok(token));
                self.event(
                    state,
                    Event::ChannelMessage {
                        session_handle,
                        message,
                    },
                );
            }
            Request::SetTranscription {
                session_handle,
                enabled,
                ..
            } => {
                let Some(joined) = state.sessions.get(&session_handle) else {
                    return self.reject(state, token, status::UNKNOWN_SESSION, "unknown session");
                };
                let speaker = joined.peers.first().map(|(_, uri)| uri.clone());
                self.respond(state, Response::ok(token));
                if enabled && let Some(speaker_uri) = speaker {
                    self.event(
                        state,
                        Event::TranscribedMessage {
                            session_handle,
                            message: TranscribedMessage {
                                speaker_uri,
                                text: "can everyone hear me".to_string(),
                                language: Some("en".to_string()),
                                timestamp: Utc::now(),
                                from_self: false,
                            },
                        },
                    );
                }
            }
            Request::MuteParticipantForAll {
                session_handle,
                participant_uri,
                muted,
                ..
            } => {
                let Some(joined) = state.sessions.get(&session_handle) else {
                    return self.reject(state, token, status::UNKNOWN_SESSION, "unknown session");
                };
                let target = joined
                    .peers
                    .iter()
                    .find(|(_, uri)| *uri == participant_uri)
                    .map(|(handle, _)| handle.clone())
                    .or_else(|| {
                        (joined.account.as_str() == participant_uri)
                            .then(|| joined.self_handle.clone())
                    });
                self.respond(state, Response::ok(token));
                if let Some(participant_handle) = target {
                    self.event(
                        state,
                        Event::ParticipantUpdated {
                            session_handle,
                            participant_handle,
                            update: ParticipantUpdate {
                                speaking: false,
                                muted,
                                energy: 0.0,
                                in_audio: true,
                                in_text: true,
                            },
                        },
                    );
                }
            }
            Request::HistoryQuery {
                session_handle,
                max_messages,
                filter,
            } => {
                let Some(joined) = state.sessions.get(&session_handle) else {
                    return self.reject(state, token, status::UNKNOWN_SESSION, "unknown session");
                };
                let page = query_history(
                    state.history.get(&joined.channel_uri).map(Vec::as_slice).unwrap_or(&[]),
                    &filter,
                    max_messages as usize,
                );
                let query_id = state.next_id("query-");
                self.respond(
                    state,
                    Response::with_body(
                        token,
                        ResponseBody::HistoryQueryStarted {
                            query_id: query_id.clone(),
                        },
                    ),
                );
                for message in page {
                    self.event(
                        state,
                        Event::HistoryMessage {
                            session_handle: session_handle.clone(),
                            query_id: query_id.clone(),
                            message,
                        },
                    );
                }
                self.event(
                    state,
                    Event::HistoryQueryEnd {
                        session_handle,
                        query_id,
                        status_code: 0,
                    },
                );
            }
            Request::SendDirectMessage {
                account_handle,
                recipient_uri,
                text,
                language,
            } => {
                if !state.logged_in.contains_key(&account_handle) {
                    return self.reject(state, token, status::NOT_LOGGED_IN, "not logged in");
                }
                self.respond(state, Response::ok(token));
                let recipient = state
                    .logged_in
                    .keys()
                    .find(|handle| handle.as_str() == recipient_uri)
                    .cloned();
                if let Some(recipient) = recipient {
                    self.event(
                        state,
                        Event::DirectMessage {
                            account_handle: recipient,
                            message: DirectMessage {
                                sender_uri: account_handle.as_str().to_string(),
                                text,
                                language,
                                timestamp: Utc::now(),
                            },
                        },
                    );
                }
            }
            Request::AddSubscription {
                account_handle,
                account_uri,
            } => {
                if !state.logged_in.contains_key(&account_handle) {
                    return self.reject(state, token, status::NOT_LOGGED_IN, "not logged in");
                }
                let online = state.logged_in.keys().any(|h| h.as_str() == account_uri)
                    || self.is_peer(&account_uri);
                self.respond(state, Response::ok(token));
                self.event(
                    state,
                    Event::PresenceUpdated {
                        account_handle,
                        account_uri,
                        status: if online {
                            PresenceStatus::Available
                        } else {
                            PresenceStatus::Unavailable
                        },
                        custom_message: None,
                    },
                );
            }
            Request::SetTransmission { account_handle, .. }
            | Request::AddAllowed { account_handle, .. }
            | Request::RemoveAllowed { account_handle, .. }
            | Request::RemoveSubscription { account_handle, .. }
            | Request::AddBlocked { account_handle, .. }
            | Request::RemoveBlocked { account_handle, .. } => {
                if state.logged_in.contains_key(&account_handle) {
                    self.respond(state, Response::ok(token));
                } else {
                    self.reject(state, token, status::NOT_LOGGED_IN, "not logged in");
                }
            }
            Request::SetLocalMute { session_handle, .. }
            | Request::UpdatePosition { session_handle, .. } => {
                if state.sessions.contains_key(&session_handle) {
                    self.respond(state, Response::ok(token));
                } else {
                    self.reject(state, token, status::UNKNOWN_SESSION, "unknown session");
                }
            }
        }
    }

    fn reject(&self, state: &mut BackendState, token: CorrelationToken, code: i32, text: &str) {
        debug!("Backend: rejecting {} with {} ({})", token, code, text);
        self.respond(state, Response::error(token, code, text));
    }

    fn login(
        &self,
        state: &mut BackendState,
        token: CorrelationToken,
        account_handle: AccountHandle,
        access_token: &str,
    ) {
        if access_token.is_empty() {
            return self.reject(state, token, status::ACCESS_DENIED, "missing login token");
        }
        if state.logged_in.contains_key(&account_handle) {
            return self.reject(state, token, status::ALREADY_LOGGED_IN, "already logged in");
        }
        state
            .logged_in
            .insert(account_handle.clone(), account_handle.as_str().to_string());
        self.respond(state, Response::ok(token));
        self.event(
            state,
            Event::ConnectionRecoveryChanged {
                account_handle: account_handle.clone(),
                state: ConnectionRecoveryState::Connected,
            },
        );
        self.event(
            state,
            Event::LoginStateChanged {
                account_handle,
                state: LoginState::LoggedIn,
                status_code: 0,
            },
        );
    }

    fn join(
        &self,
        state: &mut BackendState,
        account: AccountHandle,
        session_handle: SessionHandle,
        channel_uri: String,
        audio: bool,
        text: bool,
    ) {
        if !state.history.contains_key(&channel_uri) {
            let seeded = self.seed_history(state, &channel_uri, account.as_str());
            state.history.insert(channel_uri.clone(), seeded);
        }

        let self_handle = ParticipantHandle::new(state.next_id("participant-"));
        let peers: Vec<_> = self
            .peer_uris(account.as_str())
            .into_iter()
            .map(|uri| (ParticipantHandle::new(state.next_id("participant-")), uri))
            .collect();

        self.event(
            state,
            Event::SessionAdded {
                account_handle: account.clone(),
                session_handle: session_handle.clone(),
                channel_uri: channel_uri.clone(),
            },
        );
        for (enabled, connecting, connected) in [
            (
                audio,
                stream_event(&session_handle, true, ConnectionState::Connecting),
                stream_event(&session_handle, true, ConnectionState::Connected),
            ),
            (
                text,
                stream_event(&session_handle, false, ConnectionState::Connecting),
                stream_event(&session_handle, false, ConnectionState::Connected),
            ),
        ] {
            if enabled {
                self.event(state, connecting);
                self.event(state, connected);
            }
        }

        // The service appends a resource tag to participant URIs
        self.event(
            state,
            Event::ParticipantAdded {
                session_handle: session_handle.clone(),
                participant_handle: self_handle.clone(),
                account_uri: with_resource_tag(account.as_str()),
                display_name: None,
                is_self: false,
            },
        );
        for (handle, uri) in &peers {
            self.event(
                state,
                Event::ParticipantAdded {
                    session_handle: session_handle.clone(),
                    participant_handle: handle.clone(),
                    account_uri: with_resource_tag(uri),
                    display_name: display_name_of(uri),
                    is_self: false,
                },
            );
        }

        trace!("Backend: {} joined {}", account, channel_uri);
        state.sessions.insert(
            session_handle,
            Joined {
                account,
                channel_uri,
                self_handle,
                peers,
            },
        );
    }

    fn leave(
        &self,
        state: &mut BackendState,
        session_handle: SessionHandle,
        account_handle: AccountHandle,
        status_code: i32,
    ) {
        for audio in [true, false] {
            self.event(
                state,
                stream_event(&session_handle, audio, ConnectionState::Disconnected),
            );
        }
        self.event(
            state,
            Event::SessionRemoved {
                account_handle,
                session_handle,
                status_code,
            },
        );
    }

    fn drop_sessions_of(&self, state: &mut BackendState, account: &AccountHandle, status_code: i32) {
        let owned: Vec<SessionHandle> = state
            .sessions
            .iter()
            .filter(|(_, joined)| joined.account == *account)
            .map(|(handle, _)| handle.clone())
            .collect();
        for handle in owned {
            state.sessions.remove(&handle);
            self.leave(state, handle, account.clone(), status_code);
        }
    }

    fn seed_history(
        &self,
        state: &mut BackendState,
        channel_uri: &str,
        joiner_uri: &str,
    ) -> Vec<ChannelTextMessage> {
        let peers = self.peer_uris(joiner_uri);
        if peers.is_empty() {
            return Vec::new();
        }
        let start = Utc::now() - ChronoDuration::minutes(self.options.history_seed as i64 + 1);
        (0..self.options.history_seed)
            .map(|n| {
                let sender = &peers[n % peers.len()];
                ChannelTextMessage {
                    id: state.next_id("msg-"),
                    sender_uri: sender.clone(),
                    sender_display_name: display_name_of(sender),
                    text: format!("earlier message {} in {}", n + 1, channel_uri),
                    language: None,
                    timestamp: start + ChronoDuration::minutes(n as i64),
                    from_self: false,
                }
            })
            .collect()
    }

    /// URIs of the configured peers, in the domain of `like` when it parses.
    fn peer_uris(&self, like: &str) -> Vec<String> {
        let template = like.parse::<AccountId>().ok();
        self.options
            .peers
            .iter()
            .filter_map(|name| {
                let (issuer, domain) = match &template {
                    Some(account) => (account.issuer().to_string(), account.domain().to_string()),
                    None => ("demo".to_string(), "voice.example.com".to_string()),
                };
                AccountId::new(issuer, name.as_str(), domain, None)
                    .ok()
                    .map(|account| account.to_uri())
                    .filter(|uri| uri != like)
            })
            .collect()
    }

    fn is_peer(&self, account_uri: &str) -> bool {
        account_uri
            .parse::<AccountId>()
            .is_ok_and(|account| self.options.peers.iter().any(|p| p == account.name()))
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(BackendOptions::default())
    }
}

impl Transport for SimulatedBackend {
    fn issue(&self, request: RequestEnvelope) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        trace!("Backend: received {} {}", request.request.kind(), request.token);
        self.handle(&mut state, request);
        Ok(())
    }

    fn next_message(&self) -> Option<Message> {
        let mut state = self.lock();
        match state.queue.front() {
            Some((due, _)) if *due <= state.clock => state.queue.pop_front().map(|(_, m)| m),
            _ => {
                state.clock += 1;
                None
            }
        }
    }
}

fn stream_event(session_handle: &SessionHandle, audio: bool, state: ConnectionState) -> Event {
    if audio {
        Event::MediaStreamUpdated {
            session_handle: session_handle.clone(),
            state,
            status_code: 0,
        }
    } else {
        Event::TextStreamUpdated {
            session_handle: session_handle.clone(),
            state,
            status_code: 0,
        }
    }
}

fn with_resource_tag(uri: &str) -> String {
    format!("{}/{:034x}", uri, uri.len())
}

fn display_name_of(uri: &str) -> Option<String> {
    uri.parse::<AccountId>().ok().map(|account| {
        let mut name = account.name().to_string();
        if let Some(first) = name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        name
    })
}

/// The newest `max` messages matching `filter`, newest first.
fn query_history(
    history: &[ChannelTextMessage],
    filter: &HistoryFilter,
    max: usize,
) -> Vec<ChannelTextMessage> {
    let matches = |m: &ChannelTextMessage| {
        filter.time_start.is_none_or(|start| m.timestamp >= start)
            && filter.time_end.is_none_or(|end| m.timestamp < end)
            && filter
                .search_text
                .as_deref()
                .is_none_or(|needle| m.text.contains(needle))
            && filter
                .participant_uri
                .as_deref()
                .is_none_or(|uri| m.sender_uri == uri)
    };
    let mut page: Vec<_> = history.iter().filter(|m| matches(m)).cloned().collect();
    sort_chronologically(&mut page);
    page.reverse();
    page.truncate(max);
    page
}
