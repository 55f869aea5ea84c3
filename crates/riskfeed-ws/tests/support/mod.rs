//! In-memory transport for driving `FeedClient` without a socket.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use riskfeed_core::{Directive, FeedError};
use riskfeed_ws::{Connection, ConnectionState, FeedClient, FeedTransport, Frame};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

#[derive(Default)]
pub struct MockState {
    opens: AtomicUsize,
    open_times: Mutex<Vec<Instant>>,
    refusals: Mutex<VecDeque<()>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

/// Client side of the mock: plugged into `FeedClient`.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
    accepted: mpsc::UnboundedSender<ServerSide>,
}

#[async_trait]
impl FeedTransport for MockTransport {
    async fn open(&self, url: &str) -> Result<Connection, FeedError> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        self.state.open_times.lock().unwrap().push(Instant::now());

        let gate = self.state.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.state.refusals.lock().unwrap().pop_front().is_some() {
            return Err(FeedError::ConnectFailed {
                url: url.to_string(),
                reason: "connection refused".into(),
            });
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = self.accepted.send(ServerSide {
            directives: out_rx,
            frames: in_tx,
        });
        Ok(Connection {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// Test side of the mock: observes opens and accepted connections.
pub struct MockServer {
    state: Arc<MockState>,
    accepted: mpsc::UnboundedReceiver<ServerSide>,
}

impl MockServer {
    pub async fn accept(&mut self) -> ServerSide {
        tokio::time::timeout(Duration::from_secs(300), self.accepted.recv())
            .await
            .expect("no connection accepted")
            .expect("transport dropped")
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Gaps between consecutive `open` calls.
    pub fn open_gaps(&self) -> Vec<Duration> {
        let times = self.state.open_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Refuse the next `n` open attempts.
    pub fn refuse_next(&self, n: usize) {
        let mut refusals = self.state.refusals.lock().unwrap();
        refusals.extend(std::iter::repeat(()).take(n));
    }

    /// Block the next open until the returned sender fires.
    pub fn hold_next_open(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.state.gate.lock().unwrap() = Some(rx);
        tx
    }
}

pub fn mock() -> (MockTransport, MockServer) {
    let state = Arc::new(MockState::default());
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            state: Arc::clone(&state),
            accepted: tx,
        },
        MockServer {
            state,
            accepted: rx,
        },
    )
}

/// Server end of one accepted connection.
pub struct ServerSide {
    directives: mpsc::UnboundedReceiver<String>,
    frames: mpsc::UnboundedSender<Frame>,
}

impl ServerSide {
    pub fn send_text(&self, text: &str) {
        let _ = self.frames.send(Frame::Text(text.to_string()));
    }

    pub fn send_event(&self, event: serde_json::Value) {
        self.send_text(&event.to_string());
    }

    pub fn send_error(&self, reason: &str) {
        let _ = self.frames.send(Frame::Error(reason.to_string()));
    }

    pub fn close(&self) {
        let _ = self.frames.send(Frame::Closed);
    }

    /// Every directive the client has sent so far.
    pub fn drain(&mut self) -> Vec<Directive> {
        let mut out = Vec::new();
        while let Ok(text) = self.directives.try_recv() {
            out.push(serde_json::from_str(&text).expect("directive is valid JSON"));
        }
        out
    }

    /// `true` once the client has dropped its end.
    pub fn client_closed(&mut self) -> bool {
        loop {
            match self.directives.try_recv() {
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }
}

pub async fn wait_for_state(client: &FeedClient, target: ConnectionState) {
    let mut rx = client.watch_state();
    tokio::time::timeout(Duration::from_secs(300), rx.wait_for(|s| *s == target))
        .await
        .unwrap_or_else(|_| panic!("client never reached {target}"))
        .expect("client dropped");
}
