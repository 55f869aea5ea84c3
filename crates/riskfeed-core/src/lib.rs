//! riskfeed-core: foundation types for the RiskFeed event client.
//!
//! # Overview
//!
//! RiskFeed pushes covenant, alert, risk-score and document-status changes
//! from the server to in-process subscribers over a single WebSocket. The
//! core crate is transport-free and defines:
//!
//! - [`Event`] / [`EventKind`]: inbound wire types
//! - [`Directive`]: outbound subscribe/unsubscribe messages
//! - [`Topic`]: subscription keys and their matching rules
//! - [`BackoffPolicy`]: reconnect delay schedule
//! - [`FeedConfig`]: endpoint and retry settings
//! - [`FeedError`]: structured error type

pub mod backoff;
pub mod config;
pub mod directive;
pub mod error;
pub mod event;
pub mod topic;

pub use backoff::{BackoffConfig, BackoffPolicy, ReconnectCounter};
pub use config::FeedConfig;
pub use directive::{Action, Directive};
pub use error::FeedError;
pub use event::{Event, EventKind};
pub use topic::Topic;
