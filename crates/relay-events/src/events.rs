use crate::errors::EventSourceError;
use futures::stream::BoxStream;
use serde_json::Value;

/// Tool payloads arrive with no schema guarantee: sometimes structured
/// JSON, sometimes a JSON document packed into a string. The variant is
/// decided once here; callers only ever see a `Value`.
#[derive(Clone, Debug, PartialEq)]
pub enum RawPayload {
    Json(Value),
    Encoded(String),
}

impl RawPayload {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Encoded(text),
            other => Self::Json(other),
        }
    }

    pub fn into_value(self) -> Result<Value, EventSourceError> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Encoded(text) => serde_json::from_str(&text).map_err(|err| {
                EventSourceError::Decoding(format!("payload is not valid JSON: {err}"))
            }),
        }
    }
}

/// One notification from the reasoning service while it produces a reply.
/// Transient: never persisted.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnEvent {
    TextDelta {
        delta: String,
        metadata: Value,
    },
    ToolStart {
        call_id: String,
        tool_name: String,
        args: RawPayload,
        metadata: Value,
    },
    ToolEnd {
        call_id: String,
        tool_name: String,
        output: RawPayload,
        metadata: Value,
    },
    Other {
        kind: String,
        raw: Value,
    },
}

pub type EventStream = BoxStream<'static, Result<TurnEvent, EventSourceError>>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_payload_string_form_is_parsed_lazily() {
        let payload = RawPayload::from_value(json!(r#"{"q":"x"}"#));
        assert!(matches!(payload, RawPayload::Encoded(_)));
        assert_eq!(
            payload.into_value().expect("payload should decode"),
            json!({"q": "x"})
        );
    }

    #[test]
    fn raw_payload_object_form_passes_through() {
        let payload = RawPayload::from_value(json!({"q": "x"}));
        assert_eq!(
            payload.into_value().expect("payload should decode"),
            json!({"q": "x"})
        );
    }

    #[test]
    fn raw_payload_invalid_string_expected_decoding_error() {
        let payload = RawPayload::Encoded("not json".to_string());
        assert!(matches!(
            payload.into_value(),
            Err(EventSourceError::Decoding(_))
        ));
    }
}
