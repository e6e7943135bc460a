//! Server-Sent Events decoding for provider streaming endpoints.
//!
//! Transport chunks split SSE lines at arbitrary byte offsets (including in the
//! middle of a multi-byte character), so raw bytes are buffered until a full
//! line is available. Only `data:` payloads are surfaced.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    /// Feeds one transport chunk and returns every complete `data:` payload in it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(&['\n', '\r'][..]);

            // Blank lines separate events; `:` lines are comments / keep-alives.
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }
        payloads
    }
}

/// Turns a response body stream into a stream of `data:` payloads, in order.
pub fn data_payloads<S>(body: S) -> impl Stream<Item = Result<String, reqwest::Error>>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    let mut decoder = SseDecoder::default();
    body.flat_map(move |chunk| {
        let items: Vec<Result<String, reqwest::Error>> = match chunk {
            Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(items)
    })
}
