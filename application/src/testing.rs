//! Test doubles shared by unit tests in this crate.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::ports::token_provider::{TokenAction, TokenProvider, TokenRequest};
use crate::ports::transport::{Transport, TransportError};
use crate::runtime::ClientRuntime;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use voxlink_domain::{
    AccountId, ChannelId, ChannelType, CorrelationToken, Event, Message, Request, RequestEnvelope,
    Response,
};

type Responder = Box<dyn Fn(&RequestEnvelope) -> Vec<Message> + Send + Sync>;

/// Scripted in-memory engine.
///
/// Records every issued request and hands out queued messages in order.
/// An optional responder queues messages in reaction to each request.
#[derive(Default)]
pub(crate) struct FakeTransport {
    issued: Mutex<Vec<RequestEnvelope>>,
    inbound: Mutex<VecDeque<Message>>,
    reject: Mutex<Option<TransportError>>,
    responder: Mutex<Option<Responder>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, message: Message) {
        self.inbound.lock().unwrap().push_back(message);
    }

    pub(crate) fn push_event(&self, event: Event) {
        self.push(Message::Event(event));
    }

    pub(crate) fn push_response(&self, response: Response) {
        self.push(Message::Response(response));
    }

    pub(crate) fn reject_next(&self, error: TransportError) {
        *self.reject.lock().unwrap() = Some(error);
    }

    pub(crate) fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&RequestEnvelope) -> Vec<Message> + Send + Sync + 'static,
    {
        *self.responder.lock().unwrap() = Some(Box::new(responder));
    }

    pub(crate) fn issued(&self) -> Vec<RequestEnvelope> {
        self.issued.lock().unwrap().clone()
    }

    pub(crate) fn issued_kinds(&self) -> Vec<&'static str> {
        self.issued
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.request.kind())
            .collect()
    }

    /// Token of the most recent request of the given kind.
    pub(crate) fn last_token(&self, kind: &str) -> Option<CorrelationToken> {
        self.issued
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|e| e.request.kind() == kind)
            .map(|e| e.token)
    }

    pub(crate) fn last_request(&self) -> Option<Request> {
        self.issued.lock().unwrap().last().map(|e| e.request.clone())
    }
}

impl Transport for FakeTransport {
    fn issue(&self, request: RequestEnvelope) -> Result<(), TransportError> {
        if let Some(error) = self.reject.lock().unwrap().take() {
            return Err(error);
        }
        let replies = match self.responder.lock().unwrap().as_ref() {
            Some(responder) => responder(&request),
            None => Vec::new(),
        };
        self.issued.lock().unwrap().push(request);
        self.inbound.lock().unwrap().extend(replies);
        Ok(())
    }

    fn next_message(&self) -> Option<Message> {
        self.inbound.lock().unwrap().pop_front()
    }
}

/// Token provider returning `"{action}-token"` and recording requests.
#[derive(Default)]
pub(crate) struct FakeTokens {
    requests: Mutex<Vec<TokenRequest>>,
}

impl FakeTokens {
    /// Actions requested so far, in order.
    pub(crate) fn actions(&self) -> Vec<TokenAction> {
        self.requests.lock().unwrap().iter().map(|r| r.action).collect()
    }
}

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn token(&self, request: &TokenRequest) -> Result<String, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(format!("{}-token", request.action))
    }
}

pub(crate) fn alice() -> AccountId {
    AccountId::new("acme", "alice", "voice.example.com", None).unwrap()
}

pub(crate) fn bob() -> AccountId {
    AccountId::new("acme", "bob", "voice.example.com", None).unwrap()
}

pub(crate) fn lobby() -> ChannelId {
    ChannelId::new("acme", "lobby", "voice.example.com", ChannelType::NonPositional).unwrap()
}

pub(crate) fn arena() -> ChannelId {
    ChannelId::new("acme", "arena", "voice.example.com", ChannelType::Positional).unwrap()
}

pub(crate) fn runtime(transport: &Arc<FakeTransport>) -> ClientRuntime {
    runtime_with_tokens(transport, Arc::new(FakeTokens::default()))
}

pub(crate) fn runtime_with_tokens(
    transport: &Arc<FakeTransport>,
    tokens: Arc<FakeTokens>,
) -> ClientRuntime {
    ClientRuntime::builder(transport.clone())
        .with_token_provider(tokens)
        .with_config(ClientConfig::default())
        .build()
}
