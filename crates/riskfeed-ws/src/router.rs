//! Inbound frame decoding and fan-out to subscribers.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use riskfeed_core::Event;
use tracing::{error, trace, warn};

use crate::metrics::MetricsHandle;
use crate::subscriptions::SubscriptionRegistry;

/// Longest slice of a bad frame echoed into the logs.
const FRAME_PREVIEW: usize = 120;

/// Decodes raw text frames and invokes every callback whose topic matches.
#[derive(Clone, Debug)]
pub struct EventRouter {
    registry: SubscriptionRegistry,
    metrics: MetricsHandle,
}

impl EventRouter {
    pub fn new(registry: SubscriptionRegistry, metrics: MetricsHandle) -> Self {
        Self { registry, metrics }
    }

    /// Parse and dispatch one inbound frame.
    ///
    /// Unparseable frames and frames without a `type` are logged and dropped.
    /// Returns the number of callbacks invoked.
    pub fn route_frame(&self, text: &str) -> usize {
        self.metrics.update(|m| m.frames_received += 1);
        match Event::parse(text) {
            Ok(event) => self.dispatch(&event),
            Err(e) => {
                warn!(error = %e, frame = preview(text), "dropping inbound frame");
                self.metrics.update(|m| m.frames_dropped += 1);
                0
            }
        }
    }

    /// Invoke every callback on every topic matching `event`, once each.
    ///
    /// A panicking callback is logged and does not stop the remaining ones.
    pub fn dispatch(&self, event: &Event) -> usize {
        let targets = self.registry.matching(event.event_type());
        if targets.is_empty() {
            trace!(event_type = %event.kind, "no subscribers for event");
            return 0;
        }

        let mut panics = 0u64;
        for (topic, callback) in &targets {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                panics += 1;
                error!(
                    topic = %topic,
                    event_type = %event.kind,
                    panic = panic_message(payload.as_ref()),
                    "subscriber callback panicked"
                );
            }
        }

        let invoked = targets.len();
        self.metrics.update(|m| {
            m.callbacks_invoked += invoked as u64;
            m.callback_panics += panics;
        });
        invoked
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(FRAME_PREVIEW) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter(reg: &SubscriptionRegistry, topic: &str) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        reg.insert(
            topic,
            Arc::new(move |_: &Event| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        hits
    }

    fn router() -> (EventRouter, SubscriptionRegistry, MetricsHandle) {
        let reg = SubscriptionRegistry::new();
        let metrics = MetricsHandle::new();
        (EventRouter::new(reg.clone(), metrics.clone()), reg, metrics)
    }

    #[test]
    fn wildcard_and_exact_topics_both_fire() {
        let (router, reg, _) = router();
        let wild = counter(&reg, "covenant:*");
        let exact = counter(&reg, "event:COVENANT_UPDATE");
        let other = counter(&reg, "event:ALERT_CREATED");

        let n = router.route_frame(r#"{"type":"COVENANT_UPDATE","payload":{},"timestamp":"2024-01-01T00:00:00Z"}"#);
        assert_eq!(n, 2);
        assert_eq!(wild.load(Ordering::SeqCst), 1);
        assert_eq!(exact.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn every_callback_on_a_topic_fires_once() {
        let (router, reg, _) = router();
        let hits: Vec<_> = (0..4).map(|_| counter(&reg, "event:ALERT_CREATED")).collect();

        router.route_frame(r#"{"type":"ALERT_CREATED"}"#);
        router.route_frame(r#"{"type":"ALERT_UPDATED"}"#);

        for h in hits {
            assert_eq!(h.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let (router, reg, metrics) = router();
        let hits = counter(&reg, "covenant:*");

        assert_eq!(router.route_frame("{not json"), 0);
        assert_eq!(router.route_frame(r#"{"payload":{"id":1}}"#), 0);
        assert_eq!(router.route_frame(r#"{"type":"COVENANT_UPDATE"}"#), 1);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let m = metrics.snapshot();
        assert_eq!(m.frames_received, 3);
        assert_eq!(m.frames_dropped, 2);
    }

    #[test]
    fn panicking_callback_does_not_stop_others() {
        let (router, reg, metrics) = router();
        reg.insert("event:RISK_SCORE_UPDATE", Arc::new(|_: &Event| panic!("boom")));
        let hits = counter(&reg, "event:RISK_SCORE_UPDATE");
        let wild = counter(&reg, "risk:*");

        let frame = r#"{"type":"RISK_SCORE_UPDATE","payload":{"score":71}}"#;
        assert_eq!(router.route_frame(frame), 3);
        assert_eq!(router.route_frame(frame), 3);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(wild.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.snapshot().callback_panics, 2);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let long = "é".repeat(200);
        assert_eq!(preview(&long).chars().count(), FRAME_PREVIEW);
        assert_eq!(preview("short"), "short");
    }
}
