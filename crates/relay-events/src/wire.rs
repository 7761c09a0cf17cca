//! Wire-shape decoding for reasoning-service events.
//!
//! Each SSE frame carries a JSON object
//! `{ event, name, run_id, data: { chunk | input | output }, metadata }`.
//! Text chunks differ by upstream provider: `chunk.content` is either a
//! plain string or a list of `{text}` blocks. Both map to `TextDelta`;
//! empty deltas are dropped so they never disturb an open text run.

use crate::errors::EventSourceError;
use crate::events::{RawPayload, TurnEvent};
use serde::Deserialize;
use serde_json::Value;

const TEXT_EVENTS: [&str; 2] = ["on_chat_model_stream", "on_llm_stream"];
const TOOL_START_EVENT: &str = "on_tool_start";
const TOOL_END_EVENT: &str = "on_tool_end";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WireEvent {
    pub event: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub data: WireEventData,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WireEventData {
    #[serde(default)]
    pub chunk: Option<Value>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
}

/// Decode one wire object into a `TurnEvent`. Returns `None` for
/// events the adapter must skip entirely (empty text deltas).
pub fn decode_wire_event(raw: Value) -> Result<Option<TurnEvent>, EventSourceError> {
    let wire: WireEvent = serde_json::from_value(raw.clone())
        .map_err(|err| EventSourceError::Decoding(format!("malformed wire event: {err}")))?;

    if TEXT_EVENTS.contains(&wire.event.as_str()) {
        let delta = wire.data.chunk.as_ref().and_then(chunk_delta);
        return Ok(delta.map(|delta| TurnEvent::TextDelta {
            delta,
            metadata: wire.metadata,
        }));
    }

    match wire.event.as_str() {
        TOOL_START_EVENT => Ok(Some(TurnEvent::ToolStart {
            call_id: wire.run_id,
            tool_name: wire.name,
            args: RawPayload::from_value(wire.data.input.unwrap_or_else(empty_object)),
            metadata: wire.metadata,
        })),
        TOOL_END_EVENT => Ok(Some(TurnEvent::ToolEnd {
            call_id: wire.run_id,
            tool_name: wire.name,
            output: RawPayload::from_value(wire.data.output.unwrap_or_else(empty_object)),
            metadata: wire.metadata,
        })),
        _ => Ok(Some(TurnEvent::Other {
            kind: wire.event,
            raw,
        })),
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Extract the token text from a provider chunk. String content is the
/// OpenAI shape; a `[{text}]` block list is the Anthropic shape.
fn chunk_delta(chunk: &Value) -> Option<String> {
    let content = chunk.get("content")?;

    let text = match content {
        Value::String(text) => text.as_str(),
        Value::Array(blocks) => blocks.first()?.get("text")?.as_str()?,
        _ => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
