//! Event-stream decoding for streamed chat completions.
//!
//! The endpoint answers with Server-Sent Events:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//! ```
//!
//! [`decode_event_stream`] turns the raw body into a stream of text chunks.
//! The body is split into lines as it arrives and every `data:` line is
//! decoded on its own, so a chunk is surfaced as soon as its line is complete.
//! Blank separator lines are optional and a final line without a trailing
//! newline is still decoded. Comments (`:`) and the `event`, `id` and `retry`
//! fields are ignored.
//!
//! Decoding is tolerant: a payload that is not valid JSON is logged and
//! skipped. Transport failures, and bodies that cannot be split into UTF-8
//! lines, end the stream with an error. A body that closes without a single
//! text chunk and without the `[DONE]` sentinel is reported as
//! [`Error::InvalidResponse`].

use crate::types::StreamChunk;
use crate::{Error, Result};
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::io;
use std::pin::Pin;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

/// End-of-stream sentinel sent as the final `data:` payload.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental text chunks of one completion.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// What a single `data:` payload turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Text content to surface
    Text(String),
    /// The `[DONE]` sentinel
    Done,
    /// Valid chunk without text (role announcements, finish reasons)
    Empty,
    /// Not a decodable chunk
    Malformed(String),
}

/// Longest accepted line, in bytes
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Classify one payload line.
pub fn parse_payload(data: &str) -> Payload {
    let data = data.trim();
    if data.is_empty() {
        return Payload::Empty;
    }
    if data == DONE_SENTINEL {
        return Payload::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => match chunk.text() {
            Some(text) => Payload::Text(text),
            None => Payload::Empty,
        },
        Err(e) => Payload::Malformed(e.to_string()),
    }
}

/// Value of a `data:` field line, without the optional leading space.
fn data_field(line: &str) -> Option<&str> {
    let value = line.strip_prefix("data:")?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

/// Recover the crate error carried through the line reader.
fn line_error(err: LinesCodecError) -> Error {
    match err {
        LinesCodecError::MaxLineLengthExceeded => Error::invalid_response(format!(
            "event-stream line longer than {} bytes",
            MAX_LINE_BYTES
        )),
        LinesCodecError::Io(io_err) => {
            let description = io_err.to_string();
            match io_err
                .into_inner()
                .and_then(|inner| inner.downcast::<Error>().ok())
            {
                Some(err) => *err,
                None => Error::invalid_response(format!("unreadable event stream: {}", description)),
            }
        }
    }
}

struct DecodeState<L> {
    lines: Pin<Box<L>>,
    chunks_seen: usize,
    sentinel_seen: bool,
    finished: bool,
}

/// Decode a byte stream carrying SSE into text chunks.
pub fn decode_event_stream<S, B, E>(body: S) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: Into<Bytes> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let reader = StreamReader::new(body.map(|chunk| {
        chunk
            .map(Into::<Bytes>::into)
            .map_err(|err| io::Error::other(Into::<Error>::into(err)))
    }));

    let state = DecodeState {
        lines: Box::pin(FramedRead::new(
            reader,
            LinesCodec::new_with_max_length(MAX_LINE_BYTES),
        )),
        chunks_seen: 0,
        sentinel_seen: false,
        finished: false,
    };

    let decoded = stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            match state.lines.next().await {
                Some(Ok(line)) => {
                    let Some(data) = data_field(&line) else {
                        continue;
                    };
                    match parse_payload(data) {
                        Payload::Text(text) => {
                            state.chunks_seen += 1;
                            return Some((Ok(text), state));
                        }
                        Payload::Done => {
                            log::debug!("stream finished after {} chunks", state.chunks_seen);
                            state.sentinel_seen = true;
                            state.finished = true;
                        }
                        Payload::Empty => {}
                        Payload::Malformed(reason) => {
                            log::debug!("skipping undecodable stream payload: {}", reason);
                        }
                    }
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(line_error(err)), state));
                }
                None => {
                    state.finished = true;
                    if state.chunks_seen == 0 && !state.sentinel_seen {
                        return Some((
                            Err(Error::invalid_response(
                                "stream ended without content or end-of-stream marker",
                            )),
                            state,
                        ));
                    }
                    log::debug!(
                        "stream closed after {} chunks without end-of-stream marker",
                        state.chunks_seen
                    );
                }
            }
        }
    });

    Box::pin(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>>> + Send + 'static {
        let owned: Vec<_> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    async fn collect(parts: &[&str]) -> Vec<Result<String>> {
        decode_event_stream(body(parts)).collect().await
    }

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload("[DONE]"), Payload::Done);
        assert_eq!(parse_payload(""), Payload::Empty);
        assert_eq!(
            parse_payload(r#"{"choices":[{"delta":{"content":"hi"}}]}"#),
            Payload::Text("hi".into())
        );
        assert_eq!(
            parse_payload(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            Payload::Empty
        );
        assert!(matches!(parse_payload("{not json"), Payload::Malformed(_)));
    }

    #[tokio::test]
    async fn test_decodes_chunks_until_sentinel() {
        let a = delta("Hel");
        let b = delta("lo");
        let tail = delta("ignored");
        let items = collect(&[&a, &b, "data: [DONE]\n\n", &tail]).await;

        let texts: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_chunk_boundaries_inside_lines() {
        let full = format!("{}{}data: [DONE]\n\n", delta("one"), delta("two"));
        let (left, right) = full.split_at(17);
        let items = collect(&[left, right]).await;

        let texts: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let good = delta("ok");
        let items = collect(&["data: {broken\n\n", ": keep-alive\n\n", &good, "data: [DONE]\n\n"]).await;

        let texts: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_empty_stream_is_invalid() {
        let items = collect(&[]).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::InvalidResponse(_))));

        let items = collect(&["data: {\"choices\":[]}\n\n"]).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_sentinel_only_is_a_valid_empty_completion() {
        let items = collect(&["data: [DONE]\n\n"]).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_missing_sentinel_after_content_ends_normally() {
        let a = delta("partial");
        let items = collect(&[&a]).await;
        let texts: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["partial"]);
    }

    fn texts(items: Vec<Result<String>>) -> Vec<String> {
        items.into_iter().map(|r| r.unwrap()).collect()
    }

    fn payload(text: &str) -> String {
        serde_json::json!({"choices": [{"delta": {"content": text}}]}).to_string()
    }

    #[tokio::test]
    async fn test_lines_without_blank_separators() {
        let raw = format!(
            "data: {}\ndata: {}\ndata: [DONE]\n",
            payload("Hi"),
            payload(" there")
        );
        let items = collect(&[&raw]).await;
        assert_eq!(texts(items), vec!["Hi", " there"]);
    }

    #[tokio::test]
    async fn test_last_line_without_trailing_blank_line() {
        let raw = format!("data: {}\n\ndata: {}\n", payload("Hi"), payload(" end"));
        assert_eq!(texts(collect(&[&raw]).await), vec!["Hi", " end"]);

        let raw = format!("data: {}\n\ndata: {}", payload("Hi"), payload(" end"));
        assert_eq!(texts(collect(&[&raw]).await), vec!["Hi", " end"]);
    }

    #[tokio::test]
    async fn test_crlf_and_field_lines() {
        let raw = format!(
            "event: message\r\nid: 1\r\ndata:{}\r\n\r\nretry: 1000\r\ndata: [DONE]\r\n",
            payload("ok")
        );
        assert_eq!(texts(collect(&[&raw]).await), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_transport_timeout_keeps_its_kind() {
        let first = delta("partial");
        let parts = vec![Ok(first.into_bytes()), Err(Error::timeout())];
        let items: Vec<Result<String>> = decode_event_stream(stream::iter(parts)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(items[1], Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_an_error() {
        let parts: Vec<Result<Vec<u8>>> = vec![Ok(vec![b'd', b'a', 0xff, b'\n'])];
        let items: Vec<Result<String>> = decode_event_stream(stream::iter(parts)).collect().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::InvalidResponse(_))));
    }
}
