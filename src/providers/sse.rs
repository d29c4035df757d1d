//! Server-sent events parsing for streamed model responses

use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::error::RelayError;

/// Parse an SSE byte stream and forward complete `data:` payloads to
/// `event_tx`.
///
/// Intended to run inside a `tokio::spawn`. It consumes the stream until it
/// ends, an error occurs, no chunk arrives within `idle_timeout`, or the
/// receiving side goes away.
///
/// SSE field processing:
///
/// - `data:` lines of one event are joined with `\n` and forwarded.
/// - `event: ping`, empty data and `data: [DONE]` are dropped.
/// - `id:`, `retry:` and comment lines are ignored.
///
/// Failures are forwarded as a final `Err` item: a broken byte stream as
/// [`RelayError::StreamInterrupted`], a stall as
/// [`RelayError::UpstreamTimeout`].
pub async fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    event_tx: mpsc::UnboundedSender<Result<String, RelayError>>,
    idle_timeout: Duration,
) {
    let mut buffer = String::new();
    // Bytes of a UTF-8 sequence split across two chunks
    let mut pending: Vec<u8> = Vec::new();

    tokio::pin!(byte_stream);

    loop {
        let next = match tokio::time::timeout(idle_timeout, byte_stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                tracing::warn!("Model stream idle for {:?}, giving up", idle_timeout);
                let _ = event_tx.send(Err(RelayError::UpstreamTimeout(format!(
                    "no data from model for {}s",
                    idle_timeout.as_secs()
                ))));
                return;
            }
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                tracing::warn!("Model stream broke: {}", e);
                let _ = event_tx.send(Err(RelayError::StreamInterrupted(e.to_string())));
                return;
            }
            None => break,
        };

        pending.extend_from_slice(&chunk);
        buffer.extend(take_utf8_prefix(&mut pending).chars().filter(|c| *c != '\r'));

        // SSE events are separated by blank lines (`\n\n`).
        while let Some(pos) = buffer.find("\n\n") {
            let event_block: String = buffer.drain(..pos + 2).collect();
            if !forward_event(&event_block, &event_tx) {
                return;
            }
        }
    }

    // Process any remaining partial event in the buffer.
    if !pending.is_empty() {
        buffer.push_str(&String::from_utf8_lossy(&pending));
    }
    if !buffer.trim().is_empty() {
        forward_event(&buffer, &event_tx);
    }
}

/// Take the decodable UTF-8 prefix out of `pending`
///
/// An incomplete trailing sequence stays in `pending` for the next chunk;
/// invalid bytes are replaced with U+FFFD.
pub fn take_utf8_prefix(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(valid) => {
                text.push_str(valid);
                pending.clear();
                return text;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match e.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + len);
                    }
                    None => {
                        pending.drain(..valid);
                        return text;
                    }
                }
            }
        }
    }
}

/// Forward one event block; returns `false` once the receiver is gone
fn forward_event(
    event_block: &str,
    event_tx: &mpsc::UnboundedSender<Result<String, RelayError>>,
) -> bool {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;

    for line in event_block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
        // Lines starting with `:` are SSE comments; `id:` and `retry:` are unused.
    }

    if event_type.is_some_and(|et| et.eq_ignore_ascii_case("ping")) {
        return true;
    }

    let data = data_lines.join("\n");
    if data.trim().is_empty() || data.trim() == "[DONE]" {
        return true;
    }

    event_tx.send(Ok(data)).is_ok()
}
