//! Event folding: the text-accumulation and tool-pairing state
//! machines that turn the live event stream into persisted messages and
//! render nodes, one event at a time.

use crate::errors::TranscriptError;
use crate::render::{RenderNode, RenderSink, TextSink, agent_label};
use crate::sanitize::sanitize;
use relay_events::TurnEvent;
use relay_store::{
    AssistantTextMessage, AssistantToolCallMessage, Conversation, Message, ToolCallPart,
    ToolResultMessage, ToolResultPart,
};
use serde_json::Value;
use uuid::Uuid;

/// Text-accumulation state. A run opens on the first delta after a
/// boundary and closes on any non-delta event or stream exhaustion.
enum TextRun {
    Closed,
    Open {
        buffer: String,
        metadata: Value,
        sink: Box<dyn TextSink>,
    },
}

/// The single in-flight tool call. A second start before the matching
/// end overwrites it; concurrent calls within one turn are not
/// supported.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCall {
    pub call_id: String,
    pub tool_name: String,
    pub args: Value,
}

/// Folds events into the conversation and the render sink in lockstep.
/// State mutation for an event always happens together with its render
/// append, before the next event is pulled.
pub struct TranscriptFolder<'a> {
    sink: &'a mut dyn RenderSink,
    text_run: TextRun,
    pending_call: Option<PendingCall>,
}

impl<'a> TranscriptFolder<'a> {
    pub fn new(sink: &'a mut dyn RenderSink) -> Self {
        Self {
            sink,
            text_run: TextRun::Closed,
            pending_call: None,
        }
    }

    pub fn handle(
        &mut self,
        conversation: &mut Conversation,
        event: TurnEvent,
    ) -> Result<(), TranscriptError> {
        match event {
            TurnEvent::TextDelta { delta, metadata } => {
                self.append_delta(&delta, metadata);
                Ok(())
            }
            other => {
                // Tool and unknown events are text-run boundaries.
                self.finalize_text_run(conversation);
                match other {
                    TurnEvent::ToolStart {
                        call_id,
                        tool_name,
                        args,
                        ..
                    } => {
                        let args = args.into_value()?;
                        if let Some(previous) = &self.pending_call {
                            tracing::warn!(
                                previous = %previous.call_id,
                                call_id = %call_id,
                                "tool start while a call is already pending; overwriting"
                            );
                        }
                        self.sink.append(RenderNode::Separator);
                        self.sink.append(RenderNode::ToolCall {
                            tool_name: tool_name.clone(),
                            args: args.clone(),
                        });
                        self.pending_call = Some(PendingCall {
                            call_id,
                            tool_name,
                            args,
                        });
                        Ok(())
                    }
                    TurnEvent::ToolEnd {
                        call_id,
                        tool_name,
                        output,
                        ..
                    } => self.pair_tool_end(conversation, call_id, tool_name, output),
                    _ => Ok(()),
                }
            }
        }
    }

    /// Stream exhaustion: close any open text run so the final token
    /// run is never lost. Safe to call more than once.
    pub fn finish(&mut self, conversation: &mut Conversation) {
        self.finalize_text_run(conversation);
    }

    fn append_delta(&mut self, delta: &str, metadata: Value) {
        if matches!(self.text_run, TextRun::Closed) {
            self.sink.append(RenderNode::Separator);
            self.sink.append(RenderNode::TextStream {
                label: agent_label(&metadata),
            });
            self.text_run = TextRun::Open {
                buffer: String::new(),
                metadata,
                sink: self.sink.text_sink(),
            };
        }

        if let TextRun::Open { buffer, sink, .. } = &mut self.text_run {
            buffer.push_str(delta);
            sink.update(delta);
        }
    }

    fn finalize_text_run(&mut self, conversation: &mut Conversation) {
        if let TextRun::Open {
            buffer,
            metadata,
            mut sink,
        } = std::mem::replace(&mut self.text_run, TextRun::Closed)
        {
            conversation.push(Message::AssistantText(AssistantTextMessage {
                id: new_message_id(),
                content: buffer,
                metadata,
            }));
            sink.done();
        }
    }

    fn pair_tool_end(
        &mut self,
        conversation: &mut Conversation,
        call_id: String,
        tool_name: String,
        output: relay_events::RawPayload,
    ) -> Result<(), TranscriptError> {
        let raw_output = output.into_value()?;
        let result = sanitize(&raw_output);

        let args = match self.pending_call.take() {
            Some(pending) if pending.call_id == call_id => pending.args,
            pending => {
                // End without a matching start: degrade to empty args
                // rather than failing the turn.
                tracing::warn!(
                    call_id = %call_id,
                    tool_name = %tool_name,
                    pending = ?pending.as_ref().map(|call| call.call_id.as_str()),
                    "tool end without matching pending call"
                );
                Value::Object(serde_json::Map::new())
            }
        };

        conversation.push(Message::AssistantToolCall(AssistantToolCallMessage {
            id: new_message_id(),
            calls: vec![ToolCallPart {
                tool_name: tool_name.clone(),
                call_id: call_id.clone(),
                args,
            }],
        }));
        conversation.push(Message::ToolResult(ToolResultMessage {
            id: new_message_id(),
            results: vec![ToolResultPart {
                tool_name: tool_name.clone(),
                call_id,
                result: result.clone(),
            }],
        }));

        self.sink.append(RenderNode::Separator);
        self.sink.append(RenderNode::ToolResult { tool_name, result });
        Ok(())
    }
}

pub(crate) fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BufferedRenderSink;
    use relay_events::RawPayload;
    use serde_json::json;

    fn text_delta(delta: &str) -> TurnEvent {
        TurnEvent::TextDelta {
            delta: delta.to_string(),
            metadata: Value::Null,
        }
    }

    #[test]
    fn deltas_between_boundaries_concatenate_exactly() {
        let mut sink = BufferedRenderSink::new();
        let mut conversation = Conversation::new("conv-1");
        let mut folder = TranscriptFolder::new(&mut sink);

        for delta in ["Hel", "lo", " wor", "ld"] {
            folder
                .handle(&mut conversation, text_delta(delta))
                .expect("delta should fold");
        }
        folder.finish(&mut conversation);

        assert_eq!(conversation.messages.len(), 1);
        assert!(matches!(
            &conversation.messages[0],
            Message::AssistantText(message) if message.content == "Hello world"
        ));
        assert_eq!(sink.text_segments(), vec!["Hello world".to_string()]);
        assert!(sink.all_segments_closed());
    }

    #[test]
    fn non_text_event_closes_the_open_run() {
        let mut sink = BufferedRenderSink::new();
        let mut conversation = Conversation::new("conv-1");
        let mut folder = TranscriptFolder::new(&mut sink);

        folder
            .handle(&mut conversation, text_delta("thinking"))
            .expect("delta should fold");
        folder
            .handle(
                &mut conversation,
                TurnEvent::Other {
                    kind: "on_chain_start".to_string(),
                    raw: Value::Null,
                },
            )
            .expect("boundary should fold");
        folder
            .handle(&mut conversation, text_delta("answer"))
            .expect("delta should fold");
        folder.finish(&mut conversation);

        let texts: Vec<&str> = conversation
            .messages
            .iter()
            .filter_map(|message| match message {
                Message::AssistantText(text) => Some(text.content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["thinking", "answer"]);
        assert_eq!(sink.text_segments().len(), 2);
    }

    #[test]
    fn tool_pair_appends_call_then_result() {
        let mut sink = BufferedRenderSink::new();
        let mut conversation = Conversation::new("conv-1");
        let mut folder = TranscriptFolder::new(&mut sink);

        folder
            .handle(
                &mut conversation,
                TurnEvent::ToolStart {
                    call_id: "c1".to_string(),
                    tool_name: "search".to_string(),
                    args: RawPayload::Encoded(r#"{"q":"x"}"#.to_string()),
                    metadata: Value::Null,
                },
            )
            .expect("tool start should fold");
        folder
            .handle(
                &mut conversation,
                TurnEvent::ToolEnd {
                    call_id: "c1".to_string(),
                    tool_name: "search".to_string(),
                    output: RawPayload::Encoded(r#"{"response":"ok"}"#.to_string()),
                    metadata: Value::Null,
                },
            )
            .expect("tool end should fold");

        assert_eq!(conversation.messages.len(), 2);
        match &conversation.messages[0] {
            Message::AssistantToolCall(message) => {
                assert_eq!(message.calls[0].call_id, "c1");
                assert_eq!(message.calls[0].args, json!({"q": "x"}));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        match &conversation.messages[1] {
            Message::ToolResult(message) => {
                assert_eq!(message.results[0].result.response.as_deref(), Some("ok"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn tool_end_without_start_degrades_to_empty_args() {
        let mut sink = BufferedRenderSink::new();
        let mut conversation = Conversation::new("conv-1");
        let mut folder = TranscriptFolder::new(&mut sink);

        folder
            .handle(
                &mut conversation,
                TurnEvent::ToolEnd {
                    call_id: "orphan".to_string(),
                    tool_name: "search".to_string(),
                    output: RawPayload::Json(json!({"response": "ok"})),
                    metadata: Value::Null,
                },
            )
            .expect("orphan end should still fold");

        assert_eq!(conversation.messages.len(), 2);
        assert!(matches!(
            &conversation.messages[0],
            Message::AssistantToolCall(message) if message.calls[0].args == json!({})
        ));
    }

    #[test]
    fn second_start_overwrites_pending_call() {
        let mut sink = BufferedRenderSink::new();
        let mut conversation = Conversation::new("conv-1");
        let mut folder = TranscriptFolder::new(&mut sink);

        for call_id in ["c1", "c2"] {
            folder
                .handle(
                    &mut conversation,
                    TurnEvent::ToolStart {
                        call_id: call_id.to_string(),
                        tool_name: "search".to_string(),
                        args: RawPayload::Json(json!({"which": call_id})),
                        metadata: Value::Null,
                    },
                )
                .expect("tool start should fold");
        }
        folder
            .handle(
                &mut conversation,
                TurnEvent::ToolEnd {
                    call_id: "c2".to_string(),
                    tool_name: "search".to_string(),
                    output: RawPayload::Json(json!({"response": "ok"})),
                    metadata: Value::Null,
                },
            )
            .expect("tool end should fold");

        assert!(matches!(
            &conversation.messages[0],
            Message::AssistantToolCall(message) if message.calls[0].args == json!({"which": "c2"})
        ));
    }

    #[test]
    fn tool_start_closes_open_text_run_first() {
        let mut sink = BufferedRenderSink::new();
        let mut conversation = Conversation::new("conv-1");
        let mut folder = TranscriptFolder::new(&mut sink);

        folder
            .handle(&mut conversation, text_delta("let me check"))
            .expect("delta should fold");
        folder
            .handle(
                &mut conversation,
                TurnEvent::ToolStart {
                    call_id: "c1".to_string(),
                    tool_name: "search".to_string(),
                    args: RawPayload::Json(json!({})),
                    metadata: Value::Null,
                },
            )
            .expect("tool start should fold");

        assert!(matches!(
            &conversation.messages[0],
            Message::AssistantText(message) if message.content == "let me check"
        ));
        assert!(sink.all_segments_closed());
    }
}
