use crate::{map_reqwest_error, map_status};
use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use mercato::ports::{StockFeed, StockFrames};
use reqwest::Client;
use shared::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental parser for the SSE wire format.
///
/// Feed it raw body chunks; it returns every event whose terminating blank
/// line has arrived, buffering the rest. Comment lines (the server's
/// keep-alives) and fields we do not use are skipped. Splitting on the
/// byte pair is safe for UTF-8 payloads: continuation bytes never look
/// like a newline.
#[derive(Default)]
pub(crate) struct SseParser {
    buf: BytesMut,
}

impl SseParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((frame, rest_at)) = next_frame(&self.buf) {
            if let Some(event) = parse_frame(&frame) {
                events.push(event);
            }
            let _ = self.buf.split_to(rest_at);
        }
        events
    }
}

/// Find the first complete frame (terminated by a blank line) and where
/// the remainder starts. Handles LF and CRLF line endings.
fn next_frame(buf: &[u8]) -> Option<(String, usize)> {
    let lf = find(buf, b"\n\n").map(|pos| (pos, 2));
    let crlf = find(buf, b"\r\n\r\n").map(|pos| (pos, 4));
    let (pos, sep_len) = match (lf, crlf) {
        (Some(a), Some(b)) if b.0 < a.0 => b,
        (Some(a), _) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let frame = String::from_utf8_lossy(&buf[..pos]).into_owned();
    Some((frame, pos + sep_len))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut name = "message".to_string();
    let mut data_lines = Vec::new();

    for line in frame.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => name = value.to_string(),
            "data" => data_lines.push(value.to_string()),
            // id and retry are not used by this client
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event: name,
        data: data_lines.join("\n"),
    })
}

/// SSE transport for the stock push stream.
pub struct SseStockFeed {
    client: Client,
    url: String,
}

impl SseStockFeed {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        // Connect timeout only: the connection itself is meant to stay
        // open indefinitely, so a total request timeout would kill it.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &shared::config::Config) -> Result<Self> {
        Self::new(&config.stream_url)
    }
}

#[async_trait]
impl StockFeed for SseStockFeed {
    async fn connect(&self) -> Result<StockFrames> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status));
        }

        let frames = response
            .bytes_stream()
            .scan(SseParser::new(), |parser, chunk| {
                let items: Vec<Result<SseEvent>> = match chunk {
                    Ok(bytes) => parser.push(&bytes).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(map_reqwest_error(e))],
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten()
            .filter_map(|item| {
                futures::future::ready(match item {
                    Ok(event) if event.event == "stockUpdate" => Some(Ok(event.data)),
                    Ok(event) => {
                        debug!("ignoring '{}' stream event", event.event);
                        None
                    }
                    Err(e) => Some(Err(e)),
                })
            })
            .boxed();
        Ok(frames)
    }
}
