use crate::errors::EventSourceError;
use crate::events::{EventStream, TurnEvent};
use crate::sse::{SseFrame, SseParser};
use crate::wire::decode_wire_event;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Reasoning-service turns run long; the transport timeout is a
/// deliberately loose upper bound.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Everything the remote service needs for one turn: the structured
/// history serialized by the transcript layer, plus the static
/// tool-name -> fixed-parameters table merged with model-supplied
/// arguments on the service side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub serialized_history: String,
    pub tool_config: BTreeMap<String, Value>,
}

/// Opens the per-turn event stream. Implementations own the transport;
/// callers cancel by dropping the stream.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self, request: TurnRequest) -> Result<EventStream, EventSourceError>;
}

/// HTTP event source: POSTs the turn request and decodes the SSE body.
#[derive(Clone, Debug)]
pub struct RemoteEventSource {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl RemoteEventSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EventSource for RemoteEventSource {
    async fn open(&self, request: TurnRequest) -> Result<EventStream, EventSourceError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&serde_json::json!({
                "messages_str": request.serialized_history,
                "tool_config_by_name": request.tool_config,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EventSourceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_byte_stream(
            response.bytes_stream().map(|chunk| chunk.map_err(EventSourceError::from)).boxed(),
        ))
    }
}

struct DecodeState {
    bytes: BoxStream<'static, Result<bytes::Bytes, EventSourceError>>,
    utf8_carry: Vec<u8>,
    parser: SseParser,
    pending: VecDeque<TurnEvent>,
    finished: bool,
}

/// Turn a raw byte stream into a `TurnEvent` stream: reassemble UTF-8
/// across chunk boundaries, frame with SSE, decode the wire JSON. A
/// decode failure terminates the stream after surfacing the error.
pub fn decode_byte_stream(
    bytes: BoxStream<'static, Result<bytes::Bytes, EventSourceError>>,
) -> EventStream {
    let state = DecodeState {
        bytes,
        utf8_carry: Vec::new(),
        parser: SseParser::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.utf8_carry.extend_from_slice(&chunk);
                    let text = take_valid_utf8(&mut state.utf8_carry);
                    let frames = state.parser.push(&text);
                    if let Err(error) = enqueue_frames(frames, &mut state.pending) {
                        state.finished = true;
                        return Some((Err(error), state));
                    }
                }
                Some(Err(error)) => {
                    state.finished = true;
                    return Some((Err(error), state));
                }
                None => {
                    state.finished = true;
                    let mut frames = Vec::new();
                    if !state.utf8_carry.is_empty() {
                        let tail = String::from_utf8_lossy(&state.utf8_carry).into_owned();
                        state.utf8_carry.clear();
                        frames.extend(state.parser.push(&tail));
                    }
                    frames.extend(state.parser.finish());
                    if let Err(error) = enqueue_frames(frames, &mut state.pending) {
                        return Some((Err(error), state));
                    }
                }
            }
        }
    })
    .boxed()
}

fn enqueue_frames(
    frames: Vec<SseFrame>,
    pending: &mut VecDeque<TurnEvent>,
) -> Result<(), EventSourceError> {
    for frame in frames {
        let data = frame.data.trim();
        if data.is_empty() || data == "[DONE]" {
            continue;
        }
        let raw: Value = serde_json::from_str(data).map_err(|err| {
            EventSourceError::Decoding(format!("frame is not valid JSON: {err}"))
        })?;
        if let Some(event) = decode_wire_event(raw)? {
            pending.push_back(event);
        }
    }
    Ok(())
}

/// Split off the longest valid UTF-8 prefix, keeping any truncated
/// trailing sequence for the next chunk.
fn take_valid_utf8(buffer: &mut Vec<u8>) -> String {
    match std::str::from_utf8(buffer) {
        Ok(text) => {
            let text = text.to_string();
            buffer.clear();
            text
        }
        Err(error) => {
            let valid = error.valid_up_to();
            let rest = buffer.split_off(valid);
            let text = String::from_utf8_lossy(buffer).into_owned();
            *buffer = rest;
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn byte_stream(chunks: Vec<&[u8]>) -> BoxStream<'static, Result<bytes::Bytes, EventSourceError>> {
        stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok(bytes::Bytes::copy_from_slice(chunk)))
                .collect::<Vec<_>>(),
        )
        .boxed()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn frames_split_across_chunks_decode_in_order() {
        let stream = decode_byte_stream(byte_stream(vec![
            b"data: {\"event\":\"on_chat_model_stream\",\"data\":{\"chunk\":{\"content\":\"Hel",
            b"lo\"}}}\n\ndata: {\"event\":\"on_tool_start\",\"name\":\"search\",\"run_id\":\"c1\",\"data\":{\"input\":{}}}\n\n",
        ]));

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0].as_ref().expect("first event should decode"),
            TurnEvent::TextDelta { delta, .. } if delta == "Hello"
        ));
        assert!(matches!(
            events[1].as_ref().expect("second event should decode"),
            TurnEvent::ToolStart { call_id, .. } if call_id == "c1"
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn multibyte_utf8_split_across_chunks_is_reassembled() {
        let frame = "data: {\"event\":\"on_chat_model_stream\",\"data\":{\"chunk\":{\"content\":\"héllo\"}}}\n\n";
        let bytes = frame.as_bytes();
        // Split in the middle of the two-byte 'é'.
        let split = frame.find('é').expect("test frame contains é") + 1;
        let stream = decode_byte_stream(byte_stream(vec![&bytes[..split], &bytes[split..]]));

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].as_ref().expect("event should decode"),
            TurnEvent::TextDelta { delta, .. } if delta == "héllo"
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_frame_surfaces_decoding_error_then_ends() {
        let stream = decode_byte_stream(byte_stream(vec![b"data: not-json\n\n"]));
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Err(EventSourceError::Decoding(_))
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn done_sentinel_and_blank_frames_are_skipped() {
        let stream = decode_byte_stream(byte_stream(vec![b"data: [DONE]\n\ndata:\n\n"]));
        let events: Vec<_> = stream.collect().await;
        assert!(events.is_empty());
    }
}
