//! Line-delimited (NDJSON) relay.
//!
//! Ollama streams one JSON object per line. Network chunks do not line up with
//! line boundaries, so bytes are buffered until a `\n` arrives and each
//! complete line is yielded on its own, newline-terminated, in arrival order.

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::BridgeError;

/// Longest line the relay will buffer before giving up on the stream.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Split an upstream byte stream into newline-terminated lines.
///
/// Empty lines are skipped and a trailing `\r` is stripped. A final line
/// without a terminating newline is still emitted when the upstream closes.
/// An upstream read error is yielded once and ends the stream.
pub fn relay_lines<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, BridgeError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BridgeError>,
{
    relay_lines_with_limit(upstream, MAX_LINE_BYTES)
}

fn relay_lines_with_limit<S, E>(
    upstream: S,
    max_line: usize,
) -> impl Stream<Item = Result<Bytes, BridgeError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BridgeError>,
{
    async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        // Bytes before this offset are known to hold no newline.
        let mut scanned = 0;
        futures::pin_mut!(upstream);

        while let Some(chunk) = upstream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let err: BridgeError = e.into();
                    tracing::error!(error = %err, "upstream stream failed");
                    yield Err(err);
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(offset) = buffer[scanned..].iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=scanned + offset).collect();
                scanned = 0;
                if let Some(out) = frame_line(&line[..line.len() - 1]) {
                    yield Ok(out);
                }
            }
            scanned = buffer.len();

            if buffer.len() > max_line {
                let err = BridgeError::Internal(format!(
                    "stream line exceeds {} bytes",
                    max_line
                ));
                tracing::error!(error = %err, "dropping oversized stream line");
                yield Err(err);
                return;
            }
        }

        if let Some(out) = frame_line(&buffer) {
            yield Ok(out);
        }
    }
}

fn frame_line(line: &[u8]) -> Option<Bytes> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.is_empty() {
        return None;
    }
    let mut out = Vec::with_capacity(line.len() + 1);
    out.extend_from_slice(line);
    out.push(b'\n');
    Some(Bytes::from(out))
}
