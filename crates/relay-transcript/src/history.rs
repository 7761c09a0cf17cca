//! History reconstitution: rebuilding the structured message sequence
//! the reasoning service expects from the flat persisted conversation
//! log, and the inverse fold used when replaying a saved chat.

use crate::errors::TranscriptError;
use crate::fold::new_message_id;
use crate::sanitize::sanitize;
use relay_store::{
    AssistantTextMessage, AssistantToolCallMessage, Conversation, Message, SanitizedResult,
    ToolCallPart, ToolResultMessage, ToolResultPart, UserContent,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One message in the wire-shaped history sent to the reasoning
/// service. An `Ai` message carries both the visible text and any tool
/// calls issued alongside it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum StructuredMessage {
    Human {
        content: Vec<UserContent>,
    },
    Ai {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallPart>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// Walks the persisted log and merges each assistant text message with
/// the tool-call message that immediately follows it, restoring the
/// shape the service emitted them in.
pub fn to_structured_messages(conversation: &Conversation) -> Vec<StructuredMessage> {
    let mut structured = Vec::with_capacity(conversation.messages.len());
    let mut messages = conversation.messages.iter().peekable();

    while let Some(message) = messages.next() {
        match message {
            Message::User(user) => structured.push(StructuredMessage::Human {
                content: user.content.clone(),
            }),
            Message::AssistantText(text) => {
                let tool_calls = match messages.peek() {
                    Some(Message::AssistantToolCall(calls)) => {
                        messages.next();
                        calls.calls.clone()
                    }
                    _ => Vec::new(),
                };
                structured.push(StructuredMessage::Ai {
                    content: text.content.clone(),
                    tool_calls,
                });
            }
            Message::AssistantToolCall(calls) => structured.push(StructuredMessage::Ai {
                content: String::new(),
                tool_calls: calls.calls.clone(),
            }),
            Message::ToolResult(results) => {
                for part in &results.results {
                    structured.push(StructuredMessage::Tool {
                        tool_call_id: part.call_id.clone(),
                        content: tool_content(&part.result),
                    });
                }
            }
        }
    }

    structured
}

/// Serializes the reconstituted history for the turn request body.
pub fn serialize_history(conversation: &Conversation) -> Result<String, TranscriptError> {
    serde_json::to_string_pretty(&to_structured_messages(conversation))
        .map_err(|error| TranscriptError::History(error.to_string()))
}

/// Inverse of [`to_structured_messages`]: folds a structured sequence
/// back into the persisted log shape. Used when importing a history
/// captured outside this store. Message ids are freshly generated.
pub fn fold_structured_messages(
    conversation_id: impl Into<String>,
    messages: &[StructuredMessage],
) -> Conversation {
    let mut conversation = Conversation::new(conversation_id);
    // call_id -> tool_name, learned from Ai tool_calls so Tool messages
    // can be restored with their tool name.
    let mut call_names: HashMap<String, String> = HashMap::new();

    for message in messages {
        match message {
            StructuredMessage::Human { content } => {
                conversation.push(Message::User(relay_store::UserMessage {
                    id: new_message_id(),
                    content: content.clone(),
                }));
            }
            StructuredMessage::Ai {
                content,
                tool_calls,
            } => {
                for call in tool_calls {
                    call_names.insert(call.call_id.clone(), call.tool_name.clone());
                }
                if tool_calls.is_empty() {
                    conversation.push(Message::AssistantText(AssistantTextMessage {
                        id: new_message_id(),
                        content: content.clone(),
                        metadata: Value::Null,
                    }));
                } else {
                    if !content.is_empty() {
                        conversation.push(Message::AssistantText(AssistantTextMessage {
                            id: new_message_id(),
                            content: content.clone(),
                            metadata: Value::Null,
                        }));
                    }
                    conversation.push(Message::AssistantToolCall(AssistantToolCallMessage {
                        id: new_message_id(),
                        calls: tool_calls.clone(),
                    }));
                }
            }
            StructuredMessage::Tool {
                tool_call_id,
                content,
            } => {
                let raw = serde_json::from_str(content)
                    .unwrap_or_else(|_| Value::String(content.clone()));
                conversation.push(Message::ToolResult(ToolResultMessage {
                    id: new_message_id(),
                    results: vec![ToolResultPart {
                        tool_name: call_names.get(tool_call_id).cloned().unwrap_or_default(),
                        call_id: tool_call_id.clone(),
                        result: sanitize(&raw),
                    }],
                }));
            }
        }
    }

    conversation
}

/// A tool message's content is the sanitized result, re-serialized.
/// Re-sanitizing here keeps the contract total even for results
/// persisted by older writers.
fn tool_content(result: &SanitizedResult) -> String {
    let value = serde_json::to_value(result).unwrap_or(Value::Null);
    serde_json::to_string(&sanitize(&value)).unwrap_or_else(|_| "{}".to_string())
}
