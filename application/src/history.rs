//! Chat-history fan-in
//!
//! A history query is answered in three steps: the response assigns a
//! query id, per-message events stream in under that id, and a terminal
//! query-end event closes it. [`HistoryAggregator`] accumulates the
//! messages of each open query and hands back the completion to resolve
//! when the terminal event arrives.
//!
//! The aggregator never resolves completions itself. It lives inside the
//! channel session's lock; callers resolve what it returns after releasing
//! that lock.

use crate::completion::Completion;
use crate::error::{ClientError, Result};
use std::collections::HashMap;
use tracing::debug;
use voxlink_domain::{ChannelTextMessage, CorrelationToken, HistoryFilter};

/// Messages fetched per page by the history pager.
pub const HISTORY_PAGE_SIZE: u32 = 10;

pub type HistoryCompletion = Completion<Vec<ChannelTextMessage>>;

/// One history request: at most `max_messages` matching `filter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub max_messages: u32,
    pub filter: HistoryFilter,
}

impl HistoryQuery {
    pub fn new(max_messages: u32) -> Self {
        Self {
            max_messages,
            filter: HistoryFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: HistoryFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// An open query, keyed by its backend-assigned id.
pub struct PendingHistoryQuery {
    pub token: CorrelationToken,
    pub messages: Vec<ChannelTextMessage>,
    completion: HistoryCompletion,
}

#[derive(Default)]
pub struct HistoryAggregator {
    /// Issued, waiting for the response that carries the query id.
    awaiting: HashMap<CorrelationToken, HistoryCompletion>,
    /// Query id known, accumulating messages.
    open: HashMap<String, PendingHistoryQuery>,
}

impl HistoryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, token: CorrelationToken, completion: HistoryCompletion) {
        self.awaiting.insert(token, completion);
    }

    /// Bind the backend's query id to a tracked request.
    pub fn attach(&mut self, token: CorrelationToken, query_id: String) -> bool {
        let Some(completion) = self.awaiting.remove(&token) else {
            debug!("History: no tracked query for {}", token);
            return false;
        };
        self.open.insert(
            query_id,
            PendingHistoryQuery {
                token,
                messages: Vec::new(),
                completion,
            },
        );
        true
    }

    /// Stop tracking a request whose response failed.
    pub fn reject(&mut self, token: CorrelationToken) -> Option<HistoryCompletion> {
        self.awaiting.remove(&token)
    }

    /// Append a streamed message. Messages for unknown ids are ignored.
    pub fn push(&mut self, query_id: &str, message: ChannelTextMessage) -> bool {
        match self.open.get_mut(query_id) {
            Some(query) => {
                query.messages.push(message);
                true
            }
            None => {
                debug!("History: message for unknown query {}", query_id);
                false
            }
        }
    }

    /// Close a query. Returns the completion and the outcome to resolve it
    /// with: the accumulated messages, or `BackendStatus` on a nonzero
    /// status.
    pub fn finish(
        &mut self,
        query_id: &str,
        status_code: i32,
    ) -> Option<(HistoryCompletion, Result<Vec<ChannelTextMessage>>)> {
        let query = self.open.remove(query_id)?;
        let outcome = if status_code == 0 {
            Ok(query.messages)
        } else {
            Err(ClientError::backend(status_code, Some(query.token), None))
        };
        Some((query.completion, outcome))
    }

    /// Forget one query, wherever it is in its lifecycle.
    pub fn cancel_token(&mut self, token: CorrelationToken) -> Option<HistoryCompletion> {
        if let Some(completion) = self.awaiting.remove(&token) {
            return Some(completion);
        }
        let query_id = self
            .open
            .iter()
            .find(|(_, query)| query.token == token)
            .map(|(id, _)| id.clone())?;
        self.open.remove(&query_id).map(|query| query.completion)
    }

    /// Forget every query.
    pub fn cancel_all(&mut self) -> Vec<HistoryCompletion> {
        let mut completions: Vec<_> = self.awaiting.drain().map(|(_, c)| c).collect();
        completions.extend(self.open.drain().map(|(_, q)| q.completion));
        completions
    }

    pub fn pending_count(&self) -> usize {
        self.awaiting.len() + self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(id: &str, secs: i64) -> ChannelTextMessage {
        ChannelTextMessage {
            id: id.to_string(),
            sender_uri: "sip:.acme.bob.@voice.example.com".to_string(),
            sender_display_name: None,
            text: format!("message {}", id),
            language: None,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            from_self: false,
        }
    }

    #[test]
    fn test_query_lifecycle() {
        let mut agg = HistoryAggregator::new();
        let token = CorrelationToken::new(1);
        let completion = Completion::new();
        agg.track(token, completion.clone());
        assert_eq!(agg.pending_count(), 1);

        assert!(agg.attach(token, "q1".into()));
        assert!(agg.push("q1", message("a", 1)));
        assert!(agg.push("q1", message("b", 2)));

        let (c, outcome) = agg.finish("q1", 0).unwrap();
        assert!(c.ptr_eq(&completion));
        assert_eq!(outcome.unwrap().len(), 2);
        assert_eq!(agg.pending_count(), 0);
    }

    #[test]
    fn test_messages_after_finish_are_ignored() {
        let mut agg = HistoryAggregator::new();
        let token = CorrelationToken::new(1);
        agg.track(token, Completion::new());
        agg.attach(token, "q1".into());
        agg.finish("q1", 0);

        assert!(!agg.push("q1", message("late", 3)));
        assert!(agg.finish("q1", 0).is_none());
    }

    #[test]
    fn test_unknown_query_ignored() {
        let mut agg = HistoryAggregator::new();
        assert!(!agg.push("nope", message("a", 1)));
        assert!(!agg.attach(CorrelationToken::new(9), "q".into()));
    }

    #[test]
    fn test_nonzero_status_is_backend_error() {
        let mut agg = HistoryAggregator::new();
        let token = CorrelationToken::new(4);
        agg.track(token, Completion::new());
        agg.attach(token, "q".into());
        agg.push("q", message("a", 1));

        let (_, outcome) = agg.finish("q", 20_000).unwrap();
        assert_eq!(outcome.unwrap_err().status_code(), Some(20_000));
    }

    #[test]
    fn test_cancel_token_in_either_phase() {
        let mut agg = HistoryAggregator::new();
        let waiting = CorrelationToken::new(1);
        let open = CorrelationToken::new(2);
        agg.track(waiting, Completion::new());
        agg.track(open, Completion::new());
        agg.attach(open, "q2".into());

        assert!(agg.cancel_token(waiting).is_some());
        assert!(agg.cancel_token(open).is_some());
        assert!(agg.cancel_token(open).is_none());
        assert_eq!(agg.pending_count(), 0);
    }

    #[test]
    fn test_cancel_all() {
        let mut agg = HistoryAggregator::new();
        agg.track(CorrelationToken::new(1), Completion::new());
        agg.track(CorrelationToken::new(2), Completion::new());
        agg.attach(CorrelationToken::new(2), "q".into());

        assert_eq!(agg.cancel_all().len(), 2);
        assert_eq!(agg.pending_count(), 0);
    }
}
