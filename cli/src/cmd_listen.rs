//! `riskfeed listen`: print live events until Ctrl-C.

use anyhow::{Context, Result};
use riskfeed_core::{Event, EventKind, FeedConfig, Topic};
use riskfeed_ws::FeedClient;
use tracing::{info, warn};

pub async fn run(config: FeedConfig, topics: &[String], as_json: bool) -> Result<()> {
    let endpoint = config.endpoint()?;
    let client = FeedClient::websocket(config);

    let topics: Vec<String> = if topics.is_empty() {
        EventKind::KNOWN
            .iter()
            .map(|kind| Topic::for_event(kind).to_string())
            .collect()
    } else {
        topics.to_vec()
    };

    let handles: Vec<_> = topics
        .iter()
        .map(|topic| {
            let topic_label = topic.clone();
            client.subscribe(topic.as_str(), move |event: &Event| {
                print_event(&topic_label, event, as_json);
            })
        })
        .collect();

    println!("Listening on {endpoint}");
    println!("  Topics: {}", topics.join(", "));
    println!();

    if let Err(e) = client.connect(Some(&endpoint)).await {
        warn!(error = %e, "initial connect failed, retrying in the background");
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    for handle in handles {
        handle.unsubscribe();
    }
    client.disconnect();

    let metrics = client.metrics();
    info!(
        frames = metrics.frames_received,
        dropped = metrics.frames_dropped,
        reconnects = metrics.reconnect_attempts,
        "listener stopped"
    );
    Ok(())
}

fn print_event(topic: &str, event: &Event, as_json: bool) {
    if as_json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }
    let ts = if event.timestamp.is_empty() {
        "-"
    } else {
        event.timestamp.as_str()
    };
    println!("[{ts}] {} (via {topic})", event.kind);
    if !event.payload.is_null() {
        println!("  {}", event.payload);
    }
}
