//! riskfeed-ws: real-time event client over WebSocket.
//!
//! # Features
//! - Single logical connection, shared by every subscriber
//! - Topic subscriptions: exact (`event:<TYPE>`), wildcard (`<prefix>:*`), literal
//! - Subscriptions made while offline are replayed on every (re)connect
//! - Auto-reconnect with bounded exponential backoff
//! - Malformed frames and panicking callbacks are logged, never propagated

pub mod client;
pub mod metrics;
pub mod router;
pub mod subscriptions;
pub mod transport;

pub use client::{ConnectionState, FeedClient, SubscriptionHandle};
pub use metrics::FeedMetrics;
pub use router::EventRouter;
pub use subscriptions::{Callback, CallbackId, SubscriptionRegistry};
pub use transport::{Connection, FeedTransport, Frame, WsTransport};
