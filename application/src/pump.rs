//! Cooperative message pump
//!
//! The native engine never calls back on its own: everything it has to say
//! sits in a queue until drained. [`MessagePump::tick`] drains that queue,
//! routing each message by kind:
//!
//! - **Response** → [`CorrelationTable`] (request correlation)
//! - **Event** → every registered [`EventSubscriber`] (sessions filter by
//!   their own handle)
//!
//! A tick is not reentrant. Calling it from inside a subscriber or
//! completion callback, or from a second thread while another tick runs,
//! returns `false` immediately.

use crate::correlation::CorrelationTable;
use crate::completion::Completion;
use crate::error::{ClientError, Result};
use crate::ports::protocol_logger::{Direction, ProtocolLogger, ProtocolRecord};
use crate::ports::transport::Transport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use voxlink_domain::{CorrelationToken, Event, Message, Request, RequestEnvelope, Response};

/// Receiver of events drained by the pump.
///
/// Called on the pump's thread, outside every pump lock. Implementations
/// must not block and must not call [`MessagePump::tick`].
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &Event);
}

/// Forwards events to a subscriber without keeping it alive.
pub(crate) struct WeakSubscriber<T>(Weak<T>);

impl<T> WeakSubscriber<T> {
    pub(crate) fn new(target: &Arc<T>) -> Self {
        Self(Arc::downgrade(target))
    }
}

impl<T: EventSubscriber> EventSubscriber for WeakSubscriber<T> {
    fn on_event(&self, event: &Event) {
        if let Some(target) = self.0.upgrade() {
            target.on_event(event);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SubscriberList = Vec<(SubscriptionId, Arc<dyn EventSubscriber>)>;

pub struct MessagePump {
    transport: Arc<dyn Transport>,
    correlation: Arc<CorrelationTable>,
    subscribers: Mutex<SubscriberList>,
    next_subscription: AtomicU64,
    tick_guard: Mutex<()>,
    idle_interval: Duration,
    logger: Arc<dyn ProtocolLogger>,
}

impl MessagePump {
    pub fn new(
        transport: Arc<dyn Transport>,
        idle_interval: Duration,
        logger: Arc<dyn ProtocolLogger>,
    ) -> Self {
        Self {
            transport,
            correlation: Arc::new(CorrelationTable::new()),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            tick_guard: Mutex::new(()),
            idle_interval,
            logger,
        }
    }

    pub fn correlation(&self) -> &Arc<CorrelationTable> {
        &self.correlation
    }

    pub fn idle_interval(&self) -> Duration {
        self.idle_interval
    }

    // ==================== Subscribers ====================

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.lock_subscribers().push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    // ==================== Outbound ====================

    /// Issue a tracked request.
    ///
    /// The returned completion resolves with the backend's response, or
    /// with [`ClientError::BackendStatus`] when its status is nonzero.
    pub fn issue(&self, request: Request) -> Result<(CorrelationToken, Completion<Response>)> {
        self.issue_with(request, |_, _| {})
    }

    /// Issue a tracked request, running `prepare` after the token is
    /// registered but before the engine sees the request.
    ///
    /// Callbacks attached in `prepare` observe every outcome, including a
    /// synchronous transport rejection (the completion is failed with
    /// [`ClientError::Transport`] before this returns `Err`).
    pub fn issue_with<F>(
        &self,
        request: Request,
        prepare: F,
    ) -> Result<(CorrelationToken, Completion<Response>)>
    where
        F: FnOnce(CorrelationToken, &Completion<Response>),
    {
        let token = self.correlation.next_token();
        let completion = self.correlation.register(token);
        prepare(token, &completion);

        if let Err(e) = self.send(token, request) {
            self.correlation.fail(token, e.clone());
            return Err(e);
        }
        Ok((token, completion))
    }

    /// Issue a request whose response nobody waits for.
    ///
    /// Used for compensating cleanup (best-effort leave, logout after a
    /// timeout). The response, if any, is dropped by the correlation table.
    pub fn issue_untracked(&self, request: Request) -> Result<CorrelationToken> {
        let token = self.correlation.next_token();
        self.send(token, request)?;
        Ok(token)
    }

    fn send(&self, token: CorrelationToken, request: Request) -> Result<()> {
        let kind = request.kind();
        let envelope = RequestEnvelope::new(token, request);
        self.logger.log(ProtocolRecord::new(
            Direction::Outbound,
            kind,
            serde_json::to_value(&envelope).unwrap_or_default(),
        ));
        debug!("Pump: issuing {} {}", kind, token);

        self.transport.issue(envelope).map_err(|e| {
            warn!("Pump: engine rejected {} {}: {}", kind, token, e);
            ClientError::Transport(e)
        })
    }

    // ==================== Inbound ====================

    /// Drain every message the transport currently has queued.
    ///
    /// Returns whether any message was processed. A tick already in
    /// progress makes this return `false` without draining.
    pub fn tick(&self) -> bool {
        let _guard = match self.tick_guard.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => {
                warn!("Pump: tick already in progress, ignoring reentrant call");
                return false;
            }
        };

        let mut processed = false;
        while let Some(message) = self.transport.next_message() {
            processed = true;
            let description = message.describe();
            trace!("Pump: drained {}", description);
            self.logger.log(ProtocolRecord::new(
                Direction::Inbound,
                description,
                serde_json::to_value(&message).unwrap_or_default(),
            ));

            match message {
                Message::Response(response) => {
                    self.correlation.resolve(response);
                }
                Message::Event(event) => self.dispatch(&event),
            }
        }
        processed
    }

    fn dispatch(&self, event: &Event) {
        let snapshot: Vec<Arc<dyn EventSubscriber>> = self
            .lock_subscribers()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        if snapshot.is_empty() {
            debug!("Pump: no subscribers for event {}", event.kind());
        }
        for subscriber in snapshot {
            subscriber.on_event(event);
        }
    }

    /// Block the calling thread, ticking until `predicate` holds or
    /// `deadline` passes. Returns whether the predicate was satisfied.
    ///
    /// For synchronous callers on runtimes without a driver task; it must
    /// not run on a thread the pump needs.
    pub fn run_until<P>(&self, mut predicate: P, deadline: Instant) -> bool
    where
        P: FnMut() -> bool,
    {
        loop {
            while self.tick() {}
            if predicate() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(self.idle_interval.min(deadline - now));
        }
    }

    /// Spawn the driver task: tick while there is work, then sleep
    /// `idle_interval`, until `cancel` fires.
    pub fn spawn_driver(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("Pump: driver started");
            while !cancel.is_cancelled() {
                while self.tick() {
                    tokio::task::yield_now().await;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.idle_interval) => {}
                }
            }
            debug!("Pump: driver stopped");
        })
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, SubscriberList> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::protocol_logger::NoProtocolLogger;
    use crate::ports::transport::TransportError;
    use crate::testing::FakeTransport;
    use voxlink_domain::{AccountHandle, AccountId, ConnectionRecoveryState};

    fn handle() -> AccountHandle {
        AccountHandle::for_account(&AccountId::new("acme", "alice", "voice.example.com", None).unwrap())
    }

    fn recovery_event() -> Event {
        Event::ConnectionRecoveryChanged {
            account_handle: handle(),
            state: ConnectionRecoveryState::Connected,
        }
    }

    fn pump(transport: &Arc<FakeTransport>) -> Arc<MessagePump> {
        Arc::new(MessagePump::new(
            transport.clone(),
            Duration::from_millis(5),
            Arc::new(NoProtocolLogger),
        ))
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl EventSubscriber for Recorder {
        fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.kind().to_string());
        }
    }

    #[test]
    fn test_tick_reports_work() {
        let transport = Arc::new(FakeTransport::new());
        let pump = pump(&transport);
        assert!(!pump.tick());

        transport.push_event(recovery_event());
        assert!(pump.tick());
        assert!(!pump.tick());
    }

    #[test]
    fn test_tick_routes_responses_and_events() {
        let transport = Arc::new(FakeTransport::new());
        let pump = pump(&transport);
        let recorder = Arc::new(Recorder::default());
        pump.subscribe(recorder.clone());

        let (token, completion) = pump
            .issue(Request::Logout {
                account_handle: handle(),
            })
            .unwrap();
        assert_eq!(transport.issued().len(), 1);

        transport.push_response(Response::ok(token));
        transport.push_event(recovery_event());
        pump.tick();

        assert!(completion.result().is_ok());
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["connection_recovery_changed"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let transport = Arc::new(FakeTransport::new());
        let pump = pump(&transport);
        let recorder = Arc::new(Recorder::default());
        let id = pump.subscribe(recorder.clone());

        assert!(pump.unsubscribe(id));
        assert!(!pump.unsubscribe(id));
        transport.push_event(recovery_event());
        pump.tick();
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_weak_subscriber_does_not_keep_target_alive() {
        let transport = Arc::new(FakeTransport::new());
        let pump = pump(&transport);
        let recorder = Arc::new(Recorder::default());
        pump.subscribe(Arc::new(WeakSubscriber::new(&recorder)));
        drop(recorder);

        transport.push_event(recovery_event());
        // Dispatch to a dead target is a no-op.
        assert!(pump.tick());
    }

    struct Reentrant {
        pump: Mutex<Option<Arc<MessagePump>>>,
        nested: Mutex<Option<bool>>,
    }

    impl EventSubscriber for Reentrant {
        fn on_event(&self, _event: &Event) {
            let pump = self.pump.lock().unwrap().clone();
            if let Some(pump) = pump {
                *self.nested.lock().unwrap() = Some(pump.tick());
            }
        }
    }

    #[test]
    fn test_reentrant_tick_returns_false() {
        let transport = Arc::new(FakeTransport::new());
        let pump = pump(&transport);
        let subscriber = Arc::new(Reentrant {
            pump: Mutex::new(Some(pump.clone())),
            nested: Mutex::new(None),
        });
        pump.subscribe(subscriber.clone());

        transport.push_event(recovery_event());
        transport.push_event(recovery_event());
        assert!(pump.tick());
        assert_eq!(*subscriber.nested.lock().unwrap(), Some(false));
        // Break the cycle
        subscriber.pump.lock().unwrap().take();
    }

    #[test]
    fn test_transport_rejection_fails_and_drops_token() {
        let transport = Arc::new(FakeTransport::new());
        transport.reject_next(TransportError::Rejected { code: 1001 });
        let pump = pump(&transport);

        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        let result = pump.issue_with(
            Request::Logout {
                account_handle: handle(),
            },
            move |_, completion| {
                completion.on_complete(move |r| *s.lock().unwrap() = Some(r.clone()));
            },
        );

        let err = result.unwrap_err();
        assert_eq!(err, ClientError::Transport(TransportError::Rejected { code: 1001 }));
        assert_eq!(seen.lock().unwrap().clone(), Some(Err(err)));
        assert_eq!(pump.correlation().pending_count(), 0);
    }

    #[test]
    fn test_untracked_response_is_ignored() {
        let transport = Arc::new(FakeTransport::new());
        let pump = pump(&transport);
        let token = pump
            .issue_untracked(Request::Logout {
                account_handle: handle(),
            })
            .unwrap();
        assert_eq!(pump.correlation().pending_count(), 0);

        transport.push_response(Response::error(token, 5, "late"));
        assert!(pump.tick());
    }

    #[test]
    fn test_run_until_ticks_until_predicate() {
        let transport = Arc::new(FakeTransport::new());
        let pump = pump(&transport);
        let (token, completion) = pump
            .issue(Request::Logout {
                account_handle: handle(),
            })
            .unwrap();
        transport.push_response(Response::ok(token));

        let c = completion.clone();
        assert!(pump.run_until(move || c.is_completed(), Instant::now() + Duration::from_secs(1)));
    }

    #[test]
    fn test_run_until_times_out() {
        let transport = Arc::new(FakeTransport::new());
        let pump = pump(&transport);
        assert!(!pump.run_until(|| false, Instant::now() + Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_driver_delivers_until_canceled() {
        let transport = Arc::new(FakeTransport::new());
        let pump = pump(&transport);
        let cancel = CancellationToken::new();
        let driver = pump.clone().spawn_driver(cancel.clone());

        let (token, completion) = pump
            .issue(Request::Logout {
                account_handle: handle(),
            })
            .unwrap();
        transport.push_response(Response::ok(token));
        let response = tokio::time::timeout(Duration::from_secs(5), completion.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.token, token);

        cancel.cancel();
        driver.await.unwrap();
    }
}
