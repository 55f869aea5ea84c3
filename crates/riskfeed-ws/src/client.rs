//! Real-time event client with auto-reconnect and topic subscriptions.
//!
//! [`FeedClient`] owns the single logical connection to the event server.
//! It buffers subscriptions made while offline, replays every active topic
//! after each (re)connect, routes inbound events to matching callbacks and
//! reconnects with exponential backoff after an unplanned close.
//!
//! State machine:
//! ```text
//! Disconnected --connect()--> Connecting --open--> Open
//! Open --unplanned close--> Reconnecting --delay elapsed--> Connecting
//! Connecting --open failed--> Reconnecting
//! Reconnecting --attempts exhausted--> Failed --connect()--> Connecting
//! any --disconnect()--> Closed --connect()--> Connecting
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use riskfeed_core::{
    BackoffPolicy, Directive, Event, EventKind, FeedConfig, FeedError, ReconnectCounter, Topic,
};

use crate::metrics::{FeedMetrics, MetricsHandle};
use crate::router::EventRouter;
use crate::subscriptions::{CallbackId, SubscriptionRegistry};
use crate::transport::{Connection, FeedTransport, Frame, WsTransport};

/// Lifecycle state of the client's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected; events are flowing.
    Open,
    /// Lost the connection; a reconnect is scheduled.
    Reconnecting,
    /// Automatic reconnection gave up. Only an explicit `connect()` leaves this state.
    Failed,
    /// Explicitly disconnected. No automatic transitions out of this state.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

type ConnectFuture = Shared<BoxFuture<'static, Result<(), FeedError>>>;

struct ClientInner {
    state: ConnectionState,
    /// Last endpoint used; reconnects go back to it.
    endpoint: Option<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    in_flight: Option<(ConnectFuture, AbortHandle)>,
    retry: Option<AbortHandle>,
    reader: Option<AbortHandle>,
    attempts: ReconnectCounter,
    /// Bumped by every connect attempt and by `disconnect()`; stale tasks
    /// compare against it and bail out.
    generation: u64,
}

struct ClientShared {
    config: FeedConfig,
    transport: Arc<dyn FeedTransport>,
    backoff: BackoffPolicy,
    registry: SubscriptionRegistry,
    router: EventRouter,
    metrics: MetricsHandle,
    state_tx: watch::Sender<ConnectionState>,
    inner: Mutex<ClientInner>,
}

/// Handle to the event feed.
///
/// Construct one at startup and hand clones to every consumer; clones share
/// the same connection and subscriptions. Call [`disconnect`](Self::disconnect)
/// to tear it down.
#[derive(Clone)]
pub struct FeedClient {
    shared: Arc<ClientShared>,
}

impl FeedClient {
    pub fn new(config: FeedConfig, transport: Arc<dyn FeedTransport>) -> Self {
        let registry = SubscriptionRegistry::new();
        let metrics = MetricsHandle::new();
        let router = EventRouter::new(registry.clone(), metrics.clone());
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let backoff = BackoffPolicy::new(config.backoff());
        let attempts = ReconnectCounter::new(backoff.config.max_attempts);

        Self {
            shared: Arc::new(ClientShared {
                config,
                transport,
                backoff,
                registry,
                router,
                metrics,
                state_tx,
                inner: Mutex::new(ClientInner {
                    state: ConnectionState::Disconnected,
                    endpoint: None,
                    outbound: None,
                    in_flight: None,
                    retry: None,
                    reader: None,
                    attempts,
                    generation: 0,
                }),
            }),
        }
    }

    /// A client that connects over WebSocket.
    pub fn websocket(config: FeedConfig) -> Self {
        Self::new(config, Arc::new(WsTransport))
    }

    fn lock(&self) -> MutexGuard<'_, ClientInner> {
        // Subscriber callbacks never run under this lock.
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Connection lifecycle ────────────────────────────────────────────────

    /// Establish a connection, or confirm the one already open.
    ///
    /// `endpoint` overrides the configured URL and is remembered for
    /// reconnects. Concurrent calls share one in-flight attempt and all
    /// resolve with its outcome. A failed attempt is returned to the caller
    /// and also hands off to the reconnect schedule; the attempt that spends
    /// the last of the budget resolves with [`FeedError::RetriesExhausted`].
    /// An explicit call while a reconnect is pending cancels the timer and
    /// connects immediately.
    pub async fn connect(&self, endpoint: Option<&str>) -> Result<(), FeedError> {
        let pending = {
            let mut inner = self.lock();
            if inner.state == ConnectionState::Open {
                return Ok(());
            }
            let joined = inner.in_flight.as_ref().map(|(attempt, _)| attempt.clone());
            match joined {
                Some(attempt) => attempt,
                None => {
                    let url = match endpoint {
                        Some(url) => url.to_string(),
                        None => match inner.endpoint.clone() {
                            Some(url) => url,
                            None => self.shared.config.endpoint()?,
                        },
                    };
                    self.start_attempt(&mut inner, url)
                }
            }
        };
        pending.await
    }

    fn start_attempt(&self, inner: &mut ClientInner, url: String) -> ConnectFuture {
        if let Some(retry) = inner.retry.take() {
            retry.abort();
        }
        if matches!(
            inner.state,
            ConnectionState::Disconnected | ConnectionState::Failed | ConnectionState::Closed
        ) {
            inner.attempts.reset();
        }
        inner.generation += 1;
        inner.endpoint = Some(url.clone());
        self.set_state(inner, ConnectionState::Connecting);

        let task = tokio::spawn(self.clone().establish(url, inner.generation));
        let abort = task.abort_handle();
        let attempt = task
            .map(|joined| joined.unwrap_or(Err(FeedError::Closed)))
            .boxed()
            .shared();
        inner.in_flight = Some((attempt.clone(), abort));
        attempt
    }

    async fn establish(self, url: String, generation: u64) -> Result<(), FeedError> {
        let opened = self.shared.transport.open(&url).await;

        let mut inner = self.lock();
        if inner.generation != generation || inner.state == ConnectionState::Closed {
            return Err(FeedError::Closed);
        }
        inner.in_flight = None;

        match opened {
            Ok(conn) => {
                self.on_open(&mut inner, conn, &url, generation);
                Ok(())
            }
            Err(e) => {
                warn!(url = %url, error = %e, "connection attempt failed");
                self.on_unplanned_close(&mut inner);
                if inner.state == ConnectionState::Failed {
                    return Err(FeedError::RetriesExhausted {
                        attempts: self.shared.backoff.config.max_attempts,
                    });
                }
                Err(e)
            }
        }
    }

    fn on_open(&self, inner: &mut ClientInner, conn: Connection, url: &str, generation: u64) {
        let Connection { outbound, inbound } = conn;
        inner.attempts.reset();
        inner.outbound = Some(outbound);
        self.set_state(inner, ConnectionState::Open);
        info!(url = %url, "event feed connected");

        let topics = self.shared.registry.active_topics();
        for topic in &topics {
            self.send_directive(inner, &Directive::subscribe(topic.as_str()));
        }
        if !topics.is_empty() {
            info!(topics = topics.len(), "replayed subscriptions");
        }

        let reader = tokio::spawn(self.clone().read_loop(inbound, generation));
        inner.reader = Some(reader.abort_handle());
    }

    async fn read_loop(self, mut inbound: mpsc::UnboundedReceiver<Frame>, generation: u64) {
        while let Some(frame) = inbound.recv().await {
            match frame {
                Frame::Text(text) => {
                    self.shared.router.route_frame(&text);
                }
                // The close that follows, if any, drives reconnection.
                Frame::Error(e) => warn!(error = %e, "transport error"),
                Frame::Closed => break,
            }
        }

        let mut inner = self.lock();
        if inner.generation != generation || inner.state != ConnectionState::Open {
            return;
        }
        warn!("event feed connection closed unexpectedly");
        inner.outbound = None;
        inner.reader = None;
        self.on_unplanned_close(&mut inner);
    }

    /// Hand off to the backoff schedule, or give up once the budget is spent.
    fn on_unplanned_close(&self, inner: &mut ClientInner) {
        if inner.state == ConnectionState::Closed {
            return;
        }
        let attempt = inner.attempts.increment();
        let Some(delay) = self.shared.backoff.next_delay(attempt) else {
            error!(
                attempts = self.shared.backoff.config.max_attempts,
                "reconnection attempts exhausted, giving up"
            );
            self.set_state(inner, ConnectionState::Failed);
            return;
        };

        self.set_state(inner, ConnectionState::Reconnecting);
        self.shared.metrics.update(|m| m.reconnect_attempts += 1);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnecting after delay"
        );

        let client = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.retry().await;
        });
        inner.retry = Some(timer.abort_handle());
    }

    async fn retry(&self) {
        {
            let mut inner = self.lock();
            if inner.state != ConnectionState::Reconnecting {
                return;
            }
            inner.retry = None;
        }
        if let Err(e) = self.connect(None).await {
            debug!(error = %e, "reconnect attempt did not succeed");
        }
    }

    /// Close the connection and clear every subscription.
    ///
    /// Cancels any pending reconnect and any in-flight attempt. Idempotent.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        if let Some(retry) = inner.retry.take() {
            retry.abort();
        }
        if let Some((_, attempt)) = inner.in_flight.take() {
            attempt.abort();
        }
        if let Some(reader) = inner.reader.take() {
            reader.abort();
        }
        inner.outbound = None;
        inner.generation += 1;
        self.shared.registry.clear();

        if inner.state != ConnectionState::Closed {
            info!("event feed disconnected");
            self.set_state(&mut inner, ConnectionState::Closed);
        }
    }

    fn set_state(&self, inner: &mut ClientInner, next: ConnectionState) {
        if inner.state == next {
            return;
        }
        debug!(from = %inner.state, to = %next, "connection state change");
        inner.state = next;
        self.shared.state_tx.send_replace(next);
    }

    fn send_directive(&self, inner: &ClientInner, directive: &Directive) {
        let Some(outbound) = &inner.outbound else {
            return;
        };
        if outbound.send(directive.to_frame()).is_err() {
            debug!(topic = %directive.topic, "connection gone, directive not sent");
            return;
        }
        self.shared.metrics.update(|m| m.directives_sent += 1);
        debug!(action = %directive.action, topic = %directive.topic, "sent directive");
    }

    // ─── Subscriptions ───────────────────────────────────────────────────────

    /// Register `callback` for events matching `topic`.
    ///
    /// The first callback on a topic sends a subscribe directive if the
    /// connection is open; otherwise the topic is replayed on the next open.
    pub fn subscribe<F>(&self, topic: impl Into<String>, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let inner = self.lock();
        let (id, first) = self.shared.registry.insert(&topic, Arc::new(callback));
        if first {
            if inner.state == ConnectionState::Open {
                self.send_directive(&inner, &Directive::subscribe(topic.as_str()));
            } else {
                debug!(topic = %topic, "subscription queued until connected");
            }
        }
        SubscriptionHandle {
            client: Arc::downgrade(&self.shared),
            topic,
            id,
        }
    }

    /// Shorthand for `subscribe("event:<TYPE>", callback)`.
    pub fn on_event<F>(&self, kind: impl Into<EventKind>, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let topic = Topic::for_event(&kind.into());
        self.subscribe(topic.to_string(), callback)
    }

    fn unsubscribe(&self, topic: &str, id: CallbackId) {
        let inner = self.lock();
        if !self.shared.registry.remove(topic, id) {
            return;
        }
        if inner.state == ConnectionState::Open {
            self.send_directive(&inner, &Directive::unsubscribe(topic));
        }
    }

    // ─── Introspection ───────────────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Observe every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Topics that currently have at least one callback.
    pub fn active_topics(&self) -> Vec<String> {
        self.shared.registry.active_topics()
    }

    pub fn metrics(&self) -> FeedMetrics {
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.shared.config
    }
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("state", &self.state())
            .field("topics", &self.shared.registry.len())
            .finish()
    }
}

/// Returned by [`FeedClient::subscribe`]; removes exactly that callback.
///
/// Dropping the handle leaves the subscription in place.
#[must_use = "the handle is the only way to remove this callback"]
pub struct SubscriptionHandle {
    client: Weak<ClientShared>,
    topic: String,
    id: CallbackId,
}

impl SubscriptionHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove this callback. The last callback on a topic also unsubscribes
    /// the topic upstream.
    pub fn unsubscribe(self) {
        if let Some(shared) = self.client.upgrade() {
            FeedClient { shared }.unsubscribe(&self.topic, self.id);
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}
