//! Server-sent events feed for [`LocalEventBus`].

use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;

use super::{JenkinsClient, LocalEventBus};
use crate::error::{FlowError, Result};
use crate::flow::JobEvent;

/// Splits a byte stream into SSE message payloads.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    /// Feeds raw bytes and returns every message completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut messages = Vec::new();

        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    messages.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // `event:`, `id:`, `retry:` and `:` comments carry nothing we use.
        }

        messages
    }
}

/// Streams `url` and publishes every JSON `data:` payload onto `bus` until
/// the server closes the connection.
///
/// # Errors
///
/// Returns an error if the connection fails or the server answers non-2xx.
pub async fn pump_events(client: &JenkinsClient, url: &str, bus: &LocalEventBus) -> Result<()> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(FlowError::Api {
            status: status.as_u16(),
            message,
        });
    }

    info!("Listening for job events on {url}");
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::default();

    while let Some(chunk) = stream.next().await {
        for message in parser.feed(&chunk?) {
            publish_message(bus, &message);
        }
    }

    info!("Event stream closed");
    Ok(())
}

fn publish_message(bus: &LocalEventBus, message: &str) {
    match serde_json::from_str::<JobEvent>(message) {
        Ok(event) => {
            debug!("Received event {:?}", event.jenkins_event);
            bus.publish(&event);
        }
        Err(err) => warn!("Skipping unparseable event payload: {err}"),
    }
}
